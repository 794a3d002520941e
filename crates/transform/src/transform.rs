use quire_model::{Fragment, Mark, ModelError, Node, Slice};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Result, TransformError};
use crate::map::Mapping;
use crate::mark::MarkMatch;
use crate::replace::replace_step;
use crate::step::{Step, StepResult};

/// An evolving document together with the steps that produced it.
///
/// `docs[i]` is the document `steps[i]` was applied to and `mapping` holds
/// one step map per step, so positions in [`before`](Self::before) can be
/// mapped into [`doc`](Self::doc).
#[derive(Debug, Clone)]
pub struct Transform {
	doc: Node,
	steps: Vec<Step>,
	docs: Vec<Node>,
	mapping: Mapping,
}

impl Transform {
	pub fn new(doc: Node) -> Self {
		Self {
			doc,
			steps: Vec::new(),
			docs: Vec::new(),
			mapping: Mapping::new(),
		}
	}

	/// The current document.
	pub fn doc(&self) -> &Node {
		&self.doc
	}

	/// The document before any step was applied.
	pub fn before(&self) -> &Node {
		self.docs.first().unwrap_or(&self.doc)
	}

	pub fn steps(&self) -> &[Step] {
		&self.steps
	}

	/// The document before each step.
	pub fn docs(&self) -> &[Node] {
		&self.docs
	}

	pub fn mapping(&self) -> &Mapping {
		&self.mapping
	}

	pub fn doc_changed(&self) -> bool {
		!self.steps.is_empty()
	}

	/// Applies `step`, failing when it does not apply.
	pub fn step(&mut self, step: Step) -> Result<&mut Self> {
		match self.maybe_step(step) {
			Ok(_) => Ok(self),
			Err(failure) => {
				debug!(message = %failure.message, "step failed");
				Err(TransformError::Step(failure))
			}
		}
	}

	/// Applies `step` if it applies, returning the new document or the
	/// failure. A failed step leaves the transform unchanged.
	pub fn maybe_step(&mut self, step: Step) -> StepResult {
		let doc = step.apply(&self.doc)?;
		trace!(step = step.tag(), "applied step");
		self.add_step(step, doc.clone());
		Ok(doc)
	}

	fn add_step(&mut self, step: Step, doc: Node) {
		let previous = std::mem::replace(&mut self.doc, doc);
		self.docs.push(previous);
		self.mapping.append_map(step.get_map(), None);
		self.steps.push(step);
	}

	/// Replaces `from..to` with `slice`, fitting the slice into the document.
	/// Does nothing when no fit exists.
	pub fn replace(&mut self, from: usize, to: usize, slice: Slice) -> Result<&mut Self> {
		if let Some(step) = replace_step(&self.doc, from, to, slice)? {
			self.step(step)?;
		}
		Ok(self)
	}

	/// Replaces `from..to` with `content`.
	pub fn replace_with(&mut self, from: usize, to: usize, content: impl Into<Fragment>) -> Result<&mut Self> {
		self.replace(from, to, Slice::new(content.into(), 0, 0))
	}

	pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self> {
		self.replace(from, to, Slice::empty())
	}

	/// Inserts `content` at `pos`.
	pub fn insert(&mut self, pos: usize, content: impl Into<Fragment>) -> Result<&mut Self> {
		self.replace_with(pos, pos, content)
	}

	/// Sets one attribute of the node at `pos`.
	pub fn set_node_attribute(&mut self, pos: usize, attr: impl Into<String>, value: Value) -> Result<&mut Self> {
		self.step(Step::Attr {
			pos,
			attr: attr.into(),
			value,
		})
	}

	/// Sets one attribute of the document node.
	pub fn set_doc_attribute(&mut self, attr: impl Into<String>, value: Value) -> Result<&mut Self> {
		self.step(Step::DocAttr {
			attr: attr.into(),
			value,
		})
	}

	pub fn add_node_mark(&mut self, pos: usize, mark: Mark) -> Result<&mut Self> {
		self.step(Step::AddNodeMark { pos, mark })
	}

	/// Removes the marks picked by `which` from the node at `pos`.
	pub fn remove_node_mark(&mut self, pos: usize, which: impl Into<MarkMatch>) -> Result<&mut Self> {
		let node = self
			.doc
			.node_at(pos)
			.ok_or_else(|| ModelError::Range(format!("No node at position {pos}")))?;
		let marks = which.into().select(node.marks());
		for mark in marks {
			self.step(Step::RemoveNodeMark { pos, mark })?;
		}
		Ok(self)
	}
}
