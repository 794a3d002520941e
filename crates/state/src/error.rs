use quire_model::ModelError;
use quire_transform::TransformError;

/// Errors raised by selections, transactions and editor states.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
	/// Malformed selection or state JSON; names the type being decoded.
	#[error("invalid input for {0}.from_json")]
	InvalidJson(&'static str),
	#[error("no selection type {0} defined")]
	UnknownSelectionType(String),
	/// A node selection pointed at a position with no node after it.
	#[error("no node after position {pos} to select")]
	NoNodeToSelect { pos: usize },
	#[error("selection passed to set_selection must point at the current document")]
	ForeignSelection,
	#[error("applying a mismatched transaction")]
	MismatchedTransaction,
	/// The state configuration cannot produce a document.
	#[error("{0}")]
	Config(&'static str),
	#[error(transparent)]
	Transform(#[from] TransformError),
	#[error(transparent)]
	Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, StateError>;
