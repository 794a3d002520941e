use quire_model::{ContentMatch, Fragment, Mark, MarkType, ModelError, NodeType, Slice, Whitespace};

use crate::error::Result;
use crate::step::Step;
use crate::transform::Transform;


/// Which marks [`Transform::remove_mark`] removes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MarkMatch {
	/// Every mark.
	#[default]
	Any,
	/// Every mark of one type, whatever its attributes.
	Type(MarkType),
	/// One exact mark.
	Mark(Mark),
}

impl From<Mark> for MarkMatch {
	fn from(mark: Mark) -> Self {
		MarkMatch::Mark(mark)
	}
}

impl From<MarkType> for MarkMatch {
	fn from(mark_type: MarkType) -> Self {
		MarkMatch::Type(mark_type)
	}
}

impl MarkMatch {
	/// The marks in `set` this selector picks out.
	pub(crate) fn select(&self, set: &[Mark]) -> Vec<Mark> {
		match self {
			MarkMatch::Any => set.to_vec(),
			MarkMatch::Type(mark_type) => set.iter().filter(|m| m.mark_type() == mark_type).cloned().collect(),
			MarkMatch::Mark(mark) if mark.is_in_set(set) => vec![mark.clone()],
			MarkMatch::Mark(_) => Vec::new(),
		}
	}
}

struct Matched {
	mark: Mark,
	from: usize,
	to: usize,
	step: usize,
}

fn newlines(text: &str) -> Vec<(usize, usize)> {
	let chars: Vec<char> = text.chars().collect();
	let mut found = Vec::new();
	let mut i = 0;
	while i < chars.len() {
		match chars[i] {
			'\r' if chars.get(i + 1) == Some(&'\n') => {
				found.push((i, 2));
				i += 2;
			}
			'\r' | '\n' => {
				found.push((i, 1));
				i += 1;
			}
			_ => i += 1,
		}
	}
	found
}

impl Transform {
	/// Adds `mark` to the inline content in `from..to`, replacing marks it
	/// excludes. Parents that do not allow the mark are skipped.
	pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<&mut Self> {
		let mut removed: Vec<(usize, usize, Mark)> = Vec::new();
		let mut added: Vec<(usize, usize)> = Vec::new();
		let mut removing: Option<usize> = None;
		self.doc().nodes_between(from, to, |node, pos, parent, _| {
			if !node.is_inline() {
				return true;
			}
			let allowed = parent.is_some_and(|p| p.node_type().allows_mark_type(mark.mark_type()));
			if mark.is_in_set(node.marks()) || !allowed {
				return true;
			}
			let start = pos.max(from);
			let end = (pos + node.node_size()).min(to);
			let new_set = mark.add_to_set(node.marks());
			for old in node.marks().iter().filter(|m| !m.is_in_set(&new_set)) {
				let extends = removing
					.and_then(|i| removed.get_mut(i))
					.filter(|last| last.1 == start && last.2 == *old);
				if let Some(last) = extends {
					last.1 = end;
				} else {
					removed.push((start, end, old.clone()));
					removing = Some(removed.len() - 1);
				}
			}
			if let Some(last) = added.last_mut().filter(|last| last.1 == start) {
				last.1 = end;
			} else {
				added.push((start, end));
			}
			true
		});
		for (from, to, mark) in removed {
			self.step(Step::RemoveMark { from, to, mark })?;
		}
		for (from, to) in added {
			self.step(Step::AddMark {
				from,
				to,
				mark: mark.clone(),
			})?;
		}
		Ok(self)
	}

	/// Removes the marks picked by `which` from the inline content in
	/// `from..to`, merging adjacent removals of the same mark.
	pub fn remove_mark(&mut self, from: usize, to: usize, which: impl Into<MarkMatch>) -> Result<&mut Self> {
		let which = which.into();
		let mut matched: Vec<Matched> = Vec::new();
		let mut step = 0;
		self.doc().nodes_between(from, to, |node, pos, _, _| {
			if !node.is_inline() {
				return true;
			}
			step += 1;
			let end = (pos + node.node_size()).min(to);
			for mark in which.select(node.marks()) {
				match matched.iter_mut().find(|m| m.step + 1 == step && m.mark == mark) {
					Some(found) => {
						found.to = end;
						found.step = step;
					}
					None => matched.push(Matched {
						mark,
						from: pos.max(from),
						to: end,
						step,
					}),
				}
			}
			true
		});
		for m in matched {
			self.step(Step::RemoveMark {
				from: m.from,
				to: m.to,
				mark: m.mark,
			})?;
		}
		Ok(self)
	}

	/// Removes content and marks from the node at `pos` that a node of
	/// `parent_type` would not accept, starting from `content_match` (the
	/// type's start state by default). Newlines in text become spaces unless
	/// the type preserves whitespace, and required trailing content is
	/// filled in.
	pub fn clear_incompatible(
		&mut self,
		pos: usize,
		parent_type: &NodeType,
		content_match: Option<ContentMatch>,
	) -> Result<&mut Self> {
		let node = self
			.doc()
			.node_at(pos)
			.cloned()
			.ok_or_else(|| ModelError::Range(format!("No node at position {pos}")))?;
		let mut current = content_match.unwrap_or_else(|| parent_type.content_match());
		let mut replacements = Vec::new();
		let mut cur = pos + 1;
		for child in node.content() {
			let end = cur + child.node_size();
			match current.match_type(child.node_type()) {
				None => replacements.push(Step::replace(cur, end, Slice::empty())),
				Some(next) => {
					current = next;
					for mark in child.marks() {
						if !parent_type.allows_mark_type(mark.mark_type()) {
							self.step(Step::RemoveMark {
								from: cur,
								to: end,
								mark: mark.clone(),
							})?;
						}
					}
					if let Some(text) = child.text()
						&& parent_type.whitespace() != Whitespace::Pre
					{
						let breaks = newlines(text);
						if !breaks.is_empty() {
							let marks = parent_type.allowed_marks(child.marks());
							let space = parent_type.schema().text(" ", &marks)?;
							let slice = Slice::new(Fragment::from_node(space), 0, 0);
							for (index, len) in breaks {
								replacements.push(Step::replace(cur + index, cur + index + len, slice.clone()));
							}
						}
					}
				}
			}
			cur = end;
		}
		if !current.valid_end() {
			let fill = current.fill_before(&Fragment::empty(), true, 0).unwrap_or_else(Fragment::empty);
			self.replace(cur, cur, Slice::new(fill, 0, 0))?;
		}
		for step in replacements.into_iter().rev() {
			self.step(step)?;
		}
		Ok(self)
	}
}
