//! Editor state over quire documents: selections, transactions and list
//! commands.

/// Error types.
pub mod error;
/// List editing commands.
pub mod list;
/// Selection variants and selection search.
pub mod selection;
mod state;
/// Transactions.
pub mod transaction;

pub use error::{Result, StateError};
pub use list::{lift_list_item, sink_list_item, split_list_item, wrap_in_list};
pub use selection::{AllSelection, NodeSelection, Selection, SelectionRange, TextSelection};
pub use state::{EditorState, StateConfig};
pub use transaction::{Transaction, Updated};
