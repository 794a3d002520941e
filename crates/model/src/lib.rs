//! Persistent document model: schemas, nodes, marks, slices and positions.

/// Persistent insertion-ordered maps and node attributes.
pub mod attrs;
/// The built-in basic schema.
pub mod basic;
/// Content expressions and their automata.
pub mod content;
mod diff;
/// Error types.
pub mod error;
/// Sibling node sequences.
pub mod fragment;
/// Inline marks and mark sets.
pub mod mark;
/// Document nodes.
pub mod node;
mod replace;
/// Resolved positions, node ranges and the resolve cache.
pub mod resolve;
/// Compiled schemas, node types and mark types.
pub mod schema;
/// Slices of documents.
pub mod slice;
/// Declarative schema descriptions.
pub mod spec;
/// Node builders for tests.
#[cfg(any(test, feature = "test-support"))]
pub mod test_builder;

pub use attrs::{Attrs, OrderedMap};
pub use content::ContentMatch;
pub use error::{ModelError, Result, SchemaError};
pub use fragment::Fragment;
pub use mark::{Mark, MarkSet};
pub use node::{ChildAt, Node};
pub use resolve::{NodeRange, ResolveCache, ResolvedPos};
pub use schema::{MarkType, NodeTemplate, NodeType, Schema};
pub use slice::Slice;
pub use spec::{AttributeSpec, MarkSpec, NodeSpec, SchemaSpec, Whitespace};
