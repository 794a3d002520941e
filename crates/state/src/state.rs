use quire_model::{Fragment, Mark, MarkSet, Node, Schema};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, StateError};
use crate::selection::Selection;
use crate::transaction::Transaction;


/// Inputs for [`EditorState::create`]. Either `schema` or `doc` must be set.
#[derive(Debug, Clone, Default)]
pub struct StateConfig {
	pub schema: Option<Schema>,
	pub doc: Option<Node>,
	pub selection: Option<Selection>,
	pub stored_marks: Option<MarkSet>,
}

/// An immutable editor state: a document, a selection into it and the marks
/// stored for the next insertion. New states come from applying
/// transactions.
#[derive(Debug, Clone)]
pub struct EditorState {
	schema: Schema,
	doc: Node,
	selection: Selection,
	stored_marks: Option<MarkSet>,
}

impl EditorState {
	pub fn create(config: StateConfig) -> Result<Self> {
		let schema = match (&config.doc, config.schema) {
			(Some(doc), _) => doc.node_type().schema().clone(),
			(None, Some(schema)) => schema,
			(None, None) => return Err(StateError::Config("Must provide either a schema or a doc")),
		};
		let doc = match config.doc {
			Some(doc) => doc,
			None => schema
				.top_node_type()
				.create_and_fill(None, Fragment::empty(), &[])?
				.ok_or(StateError::Config("Top node type cannot be filled without content"))?,
		};
		let selection = match config.selection {
			Some(selection) => selection,
			None => Selection::at_start(&doc)?,
		};
		Ok(Self {
			schema,
			doc,
			selection,
			stored_marks: config.stored_marks,
		})
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	pub fn doc(&self) -> &Node {
		&self.doc
	}

	pub fn selection(&self) -> &Selection {
		&self.selection
	}

	pub fn stored_marks(&self) -> Option<&[Mark]> {
		self.stored_marks.as_deref()
	}

	/// Starts a transaction against this state.
	pub fn tr(&self) -> Transaction {
		Transaction::new(self.doc.clone(), self.selection.clone(), self.stored_marks.clone())
	}

	/// Produces the state that follows `tr`. The transaction must have been
	/// started from this state's document.
	pub fn apply(&self, tr: &Transaction) -> Result<EditorState> {
		if !tr.before().ptr_eq(&self.doc) && *tr.before() != self.doc {
			return Err(StateError::MismatchedTransaction);
		}
		let selection = tr.selection()?;
		let cursor = matches!(&selection, Selection::Text(text) if text.cursor_pos().is_some());
		let stored_marks = if cursor {
			tr.stored_marks().map(|marks| marks.iter().cloned().collect())
		} else {
			None
		};
		debug!(steps = tr.steps().len(), selection = ?selection.to_json(), "applied transaction");
		Ok(EditorState {
			schema: self.schema.clone(),
			doc: tr.doc().clone(),
			selection,
			stored_marks,
		})
	}

	pub fn to_json(&self) -> Value {
		let mut obj = Map::new();
		obj.insert("doc".into(), self.doc.to_json());
		obj.insert("selection".into(), self.selection.to_json());
		if let Some(marks) = &self.stored_marks {
			obj.insert("storedMarks".into(), Value::Array(marks.iter().map(Mark::to_json).collect()));
		}
		Value::Object(obj)
	}

	pub fn from_json(schema: &Schema, json: &Value) -> Result<EditorState> {
		let doc = json.get("doc").ok_or(StateError::InvalidJson("EditorState"))?;
		let doc = Node::from_json(schema, doc)?;
		let selection = json
			.get("selection")
			.map(|selection| Selection::from_json(&doc, selection))
			.transpose()?;
		let stored_marks = match json.get("storedMarks") {
			None | Some(Value::Null) => None,
			Some(Value::Array(marks)) => Some(
				marks
					.iter()
					.map(|mark| Mark::from_json(schema, mark))
					.collect::<quire_model::Result<MarkSet>>()?,
			),
			Some(_) => return Err(StateError::InvalidJson("EditorState")),
		};
		EditorState::create(StateConfig {
			schema: Some(schema.clone()),
			doc: Some(doc),
			selection,
			stored_marks,
		})
	}
}
