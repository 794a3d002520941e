use quire_model::ModelError;

/// Why a step could not be applied to a document.
///
/// Returned by [`Step::apply`](crate::Step::apply) instead of an error so that
/// callers can try steps speculatively.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StepFailure {
	pub message: String,
}

impl StepFailure {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// Step registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	/// A tag was registered twice. Treat as a fatal configuration error.
	#[error("duplicate step type: {tag}")]
	DuplicateStepType { tag: String },
	#[error("no step type {tag} defined")]
	UnknownStepType { tag: String },
}

/// Errors raised by [`Transform`](crate::Transform) and step decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
	/// A step failed to apply.
	#[error("{0}")]
	Step(#[from] StepFailure),
	#[error(transparent)]
	Model(#[from] ModelError),
	#[error(transparent)]
	Registry(#[from] RegistryError),
	/// Malformed step JSON.
	#[error("invalid step: {0}")]
	InvalidStep(String),
	/// A structural helper was given arguments it cannot work with.
	#[error("{0}")]
	Structure(String),
}

pub type Result<T> = std::result::Result<T, TransformError>;
