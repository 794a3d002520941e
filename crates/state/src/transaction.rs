use std::ops::{Deref, DerefMut};
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use quire_model::{Mark, MarkSet, Node, Slice};
use quire_transform::{Bias, MarkMatch, Transform};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Result, StateError};
use crate::selection::Selection;

#[cfg(test)]
mod tests;

bitflags! {
	/// What a transaction explicitly changed besides the document.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct Updated: u8 {
		const SELECTION = 1 << 0;
		const MARKS = 1 << 1;
		const SCROLL = 1 << 2;
	}
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// A [`Transform`] bound to an editor state: alongside the steps it tracks
/// the selection, stored marks, a timestamp and free-form metadata.
///
/// Derefs to the underlying transform, so every document operation is
/// available directly.
#[derive(Debug, Clone)]
pub struct Transaction {
	transform: Transform,
	time: u64,
	/// Selection as of `selection_for` steps; mapped forward on read.
	selection: Selection,
	selection_for: usize,
	/// Stored marks are only valid while no step was added after `marks_for`.
	stored_marks: Option<MarkSet>,
	marks_for: usize,
	updated: Updated,
	meta: FxHashMap<String, Value>,
}

impl Deref for Transaction {
	type Target = Transform;

	fn deref(&self) -> &Transform {
		&self.transform
	}
}

impl DerefMut for Transaction {
	fn deref_mut(&mut self) -> &mut Transform {
		&mut self.transform
	}
}

impl Transaction {
	pub(crate) fn new(doc: Node, selection: Selection, stored_marks: Option<MarkSet>) -> Self {
		Self {
			transform: Transform::new(doc),
			time: now_ms(),
			selection,
			selection_for: 0,
			stored_marks,
			marks_for: 0,
			updated: Updated::empty(),
			meta: FxHashMap::default(),
		}
	}

	pub fn time(&self) -> u64 {
		self.time
	}

	pub fn set_time(&mut self, time: u64) -> &mut Self {
		self.time = time;
		self
	}

	/// The current selection, mapped through any steps added since it was set.
	pub fn selection(&self) -> Result<Selection> {
		if self.selection_for == self.steps().len() {
			return Ok(self.selection.clone());
		}
		let mapping = self.mapping().slice_from(self.selection_for);
		self.selection.map(self.doc(), &mapping)
	}

	/// Replaces the selection. The selection must point into the current
	/// document. Clears the stored marks.
	pub fn set_selection(&mut self, selection: Selection) -> Result<&mut Self> {
		let target = selection.resolved_anchor().doc();
		if !target.ptr_eq(self.doc()) && target != self.doc() {
			return Err(StateError::ForeignSelection);
		}
		self.selection = selection;
		self.selection_for = self.steps().len();
		self.updated = (self.updated | Updated::SELECTION) - Updated::MARKS;
		self.stored_marks = None;
		Ok(self)
	}

	/// Whether the selection was explicitly set.
	pub fn selection_set(&self) -> bool {
		self.updated.contains(Updated::SELECTION)
	}

	/// Marks applied to the next typed text. Adding a step drops them.
	pub fn stored_marks(&self) -> Option<&[Mark]> {
		if self.marks_for != self.steps().len() {
			return None;
		}
		self.stored_marks.as_deref()
	}

	pub fn set_stored_marks(&mut self, marks: Option<MarkSet>) -> &mut Self {
		self.stored_marks = marks;
		self.marks_for = self.steps().len();
		self.updated |= Updated::MARKS;
		self
	}

	/// Whether the stored marks were explicitly set and no step came after.
	pub fn stored_marks_set(&self) -> bool {
		self.updated.contains(Updated::MARKS) && self.marks_for == self.steps().len()
	}

	/// Stores `marks` unless they equal the marks already in effect.
	pub fn ensure_marks(&mut self, marks: &[Mark]) -> Result<&mut Self> {
		let current = self.current_marks()?;
		if !Mark::same_set(&current, marks) {
			self.set_stored_marks(Some(marks.iter().cloned().collect()));
		}
		Ok(self)
	}

	pub fn add_stored_mark(&mut self, mark: &Mark) -> Result<&mut Self> {
		let current = self.head_marks()?;
		Ok(self.set_stored_marks(Some(mark.add_to_set(&current))))
	}

	pub fn remove_stored_mark(&mut self, which: impl Into<MarkMatch>) -> Result<&mut Self> {
		let current = self.head_marks()?;
		let remaining = match which.into() {
			MarkMatch::Any => Mark::none(),
			MarkMatch::Type(ty) => ty.remove_from_set(&current),
			MarkMatch::Mark(mark) => mark.remove_from_set(&current),
		};
		Ok(self.set_stored_marks(Some(remaining)))
	}

	fn current_marks(&self) -> Result<MarkSet> {
		match self.stored_marks() {
			Some(marks) => Ok(marks.iter().cloned().collect()),
			None => Ok(self.selection()?.resolved_from().marks()),
		}
	}

	fn head_marks(&self) -> Result<MarkSet> {
		match self.stored_marks() {
			Some(marks) => Ok(marks.iter().cloned().collect()),
			None => Ok(self.selection()?.resolved_head().marks()),
		}
	}

	/// Replaces the selection with `slice`.
	pub fn replace_selection(&mut self, slice: Slice) -> Result<&mut Self> {
		let selection = self.selection()?;
		selection.replace(self, slice)?;
		Ok(self)
	}

	/// Replaces the selection with `node`. With `inherit_marks`, the node
	/// takes the stored marks, or the marks at the selection.
	pub fn replace_selection_with(&mut self, node: Node, inherit_marks: bool) -> Result<&mut Self> {
		let selection = self.selection()?;
		let node = if inherit_marks {
			let marks = match self.stored_marks() {
				Some(marks) => marks.iter().cloned().collect(),
				None if selection.empty() => selection.resolved_from().marks(),
				None => selection
					.resolved_from()
					.marks_across(selection.resolved_to())
					.unwrap_or_else(Mark::none),
			};
			node.mark(&marks)
		} else {
			node
		};
		selection.replace_with(self, node)?;
		Ok(self)
	}

	pub fn delete_selection(&mut self) -> Result<&mut Self> {
		let selection = self.selection()?;
		selection.replace(self, Slice::empty())?;
		Ok(self)
	}

	/// Inserts `text`, replacing the selection when `from` is `None` or the
	/// range `from..to` otherwise. Empty text deletes. The text takes the
	/// stored marks, falling back to the marks at the insertion point.
	pub fn insert_text(&mut self, text: &str, from: Option<usize>, to: Option<usize>) -> Result<&mut Self> {
		let schema = self.doc().node_type().schema().clone();
		let Some(from) = from else {
			if text.is_empty() {
				return self.delete_selection();
			}
			let node = schema.text(text, &[])?;
			return self.replace_selection_with(node, true);
		};
		let to = to.unwrap_or(from);
		if text.is_empty() {
			self.delete_range(from, to)?;
			return Ok(self);
		}
		let marks = match self.stored_marks() {
			Some(marks) => marks.iter().cloned().collect(),
			None => {
				let start = self.doc().resolve(from)?;
				if from == to {
					start.marks()
				} else {
					start.marks_across(&self.doc().resolve(to)?).unwrap_or_else(Mark::none)
				}
			}
		};
		let node = schema.text(text, &marks)?;
		self.replace_range_with(from, to, node)?;
		let selection = self.selection()?;
		if !selection.empty() && selection.to() == from + text.chars().count() {
			let cursor = Selection::near(selection.resolved_to(), Bias::Right)?;
			self.set_selection(cursor)?;
		}
		Ok(self)
	}

	/// Attaches a metadata value under `key`.
	pub fn set_meta(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
		self.meta.insert(key.into(), value);
		self
	}

	pub fn get_meta(&self, key: &str) -> Option<&Value> {
		self.meta.get(key)
	}

	/// True when the transaction carries no metadata.
	pub fn is_generic(&self) -> bool {
		self.meta.is_empty()
	}

	pub fn scroll_into_view(&mut self) -> &mut Self {
		self.updated |= Updated::SCROLL;
		self
	}

	pub fn scrolled_into_view(&self) -> bool {
		self.updated.contains(Updated::SCROLL)
	}
}
