//! Error types for the document model.

use thiserror::Error;

/// Errors raised while compiling a schema description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
	/// The description could not be parsed from its source format.
	#[error("invalid schema description: {0}")]
	Parse(String),

	/// The configured top node type does not exist.
	#[error("schema is missing its top node type ('{0}')")]
	MissingTopNode(String),

	/// Every schema needs a `text` node type.
	#[error("every schema needs a 'text' type")]
	MissingText,

	/// The `text` node type declared attributes.
	#[error("the text node type should not have attributes")]
	TextWithAttributes,

	/// A node type and a mark type share a name.
	#[error("{0} can not be both a node and a mark")]
	NameClash(String),

	/// A content expression failed to parse or resolve.
	#[error("{message} (in content expression '{expr}')")]
	ContentExpression {
		/// The offending expression.
		expr: String,
		/// What went wrong.
		message: String,
	},

	/// A mark list (`marks` or `excludes`) referenced an unknown mark or group.
	#[error("unknown mark type: '{0}'")]
	UnknownMark(String),

	/// An attribute default does not satisfy its own validator.
	#[error("default value of attribute {attr} on {owner} is invalid: {message}")]
	InvalidDefault {
		/// The attribute name.
		attr: String,
		/// The node or mark type owning the attribute.
		owner: String,
		/// Validation message.
		message: String,
	},
}

/// Errors raised by document model operations.
///
/// [`ModelError::Replace`] is the structural-invalidity signal of the replace
/// algorithm. Its message text is stable and may be matched on by callers
/// that want to fall back to a best-effort replace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
	/// A replace would produce a document violating the schema.
	#[error("{0}")]
	Replace(String),

	/// A document position is outside of the document.
	#[error("position {pos} out of range")]
	PositionOutOfRange {
		/// The requested position.
		pos: usize,
	},

	/// A fragment offset is outside of the fragment.
	#[error("position {pos} outside of fragment of size {size}")]
	OutsideFragment {
		/// The requested offset.
		pos: usize,
		/// Size of the fragment.
		size: usize,
	},

	/// A child index is outside of a fragment.
	#[error("index {index} out of range for fragment with {count} children")]
	IndexOutOfRange {
		/// The requested index.
		index: usize,
		/// Number of children.
		count: usize,
	},

	/// A generic range violation (non-flat removal, missing node at a position).
	#[error("{0}")]
	Range(String),

	/// Content does not satisfy a node type's content expression.
	#[error("invalid content for node {node_type}: {content}")]
	InvalidContent {
		/// Name of the node type.
		node_type: String,
		/// Abbreviated rendering of the content.
		content: String,
	},

	/// A node type name is not part of the schema.
	#[error("unknown node type: {0}")]
	UnknownNodeType(String),

	/// A mark type name is not part of the schema.
	#[error("there is no mark type {0} in this schema")]
	UnknownMarkType(String),

	/// A required attribute was not supplied.
	#[error("no value supplied for attribute {attr}")]
	MissingAttribute {
		/// The attribute name.
		attr: String,
	},

	/// An attribute is not declared by the type.
	#[error("unsupported attribute {attr} for {owner}")]
	UnsupportedAttribute {
		/// The attribute name.
		attr: String,
		/// Description of the owning type.
		owner: String,
	},

	/// An attribute value failed its type validation.
	#[error("expected value of type {expected} for attribute {attr} on type {owner}, got {found}")]
	InvalidAttribute {
		/// The attribute name.
		attr: String,
		/// The owning type name.
		owner: String,
		/// The accepted JSON type names.
		expected: String,
		/// The JSON type name found.
		found: String,
	},

	/// A node carries marks that are not a canonical, allowed set.
	#[error("invalid collection of marks for node {node_type}: {marks}")]
	InvalidMarks {
		/// Name of the node type.
		node_type: String,
		/// Names of the marks.
		marks: String,
	},

	/// `NodeType::create` was called on the text type.
	#[error("NodeType::create can't construct text nodes")]
	TextNodeCreate,

	/// Text nodes must contain at least one character.
	#[error("empty text nodes are not allowed")]
	EmptyText,

	/// A node's content does not match its own content expression.
	#[error("called content_match_at on a node with invalid content")]
	InvalidContentMatch,

	/// Malformed JSON input.
	#[error("{0}")]
	Json(String),

	/// Schema compilation failure.
	#[error(transparent)]
	Schema(#[from] SchemaError),
}

impl ModelError {
	pub(crate) fn replace(message: impl Into<String>) -> Self {
		Self::Replace(message.into())
	}

	pub(crate) fn json(message: impl Into<String>) -> Self {
		Self::Json(message.into())
	}

	/// Returns true for structural replace failures.
	pub fn is_replace_error(&self) -> bool {
		matches!(self, Self::Replace(_))
	}
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
