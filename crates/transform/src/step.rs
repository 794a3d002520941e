//! Atomic, invertible document changes.

use quire_model::{Fragment, Mark, ModelError, Node, Slice};
use serde_json::{Map, Value, json};

use crate::error::StepFailure;
use crate::map::{Bias, Mappable, StepMap};

#[cfg(test)]
mod tests;

/// Outcome of applying a step: the new document or the reason it failed.
pub type StepResult = std::result::Result<Node, StepFailure>;

/// A single document change.
///
/// Every step can be applied to a document, inverted against the document it
/// was applied to, mapped through position changes and serialized under its
/// [`tag`](Step::tag).
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
	/// Replaces `from..to` with `slice`. With `structure` set, the step fails
	/// unless the replaced range holds only opening and closing tokens.
	Replace {
		from: usize,
		to: usize,
		slice: Slice,
		structure: bool,
	},
	/// Replaces `from..to` with `slice`, keeping the content of
	/// `gap_from..gap_to` and moving it to offset `insert` inside the slice.
	ReplaceAround {
		from: usize,
		to: usize,
		gap_from: usize,
		gap_to: usize,
		slice: Slice,
		insert: usize,
		structure: bool,
	},
	/// Adds a mark to the inline content in `from..to`.
	AddMark { from: usize, to: usize, mark: Mark },
	/// Removes a mark from the inline content in `from..to`.
	RemoveMark { from: usize, to: usize, mark: Mark },
	/// Adds a mark to the node at `pos`.
	AddNodeMark { pos: usize, mark: Mark },
	/// Removes a mark from the node at `pos`.
	RemoveNodeMark { pos: usize, mark: Mark },
	/// Sets one attribute of the node at `pos`.
	Attr { pos: usize, attr: String, value: Value },
	/// Sets one attribute of the document node.
	DocAttr { attr: String, value: Value },
}

fn failure(err: ModelError) -> StepFailure {
	match err {
		ModelError::Replace(message) => StepFailure::new(message),
		other => StepFailure::new(other.to_string()),
	}
}

fn from_replace(doc: &Node, from: usize, to: usize, slice: &Slice) -> StepResult {
	doc.replace(from, to, slice).map_err(failure)
}

/// Whether `from..to` holds anything besides closing tokens followed by
/// opening tokens.
fn content_between(doc: &Node, from: usize, to: usize) -> Result<bool, ModelError> {
	let rfrom = doc.resolve(from)?;
	let mut dist = to.saturating_sub(from);
	let mut depth = rfrom.depth();
	while dist > 0 && depth > 0 && rfrom.index_after(depth) == rfrom.node(depth).child_count() {
		depth -= 1;
		dist -= 1;
	}
	if dist > 0 {
		let mut next = rfrom.node(depth).maybe_child(rfrom.index_after(depth)).cloned();
		while dist > 0 {
			match next {
				Some(node) if !node.is_leaf() => next = node.first_child().cloned(),
				_ => return Ok(true),
			}
			dist -= 1;
		}
	}
	Ok(false)
}

/// Rebuilds `fragment`, passing every inline node through `f` together with
/// its parent.
fn map_fragment(fragment: &Fragment, f: &mut dyn FnMut(&Node, &Node) -> Node, parent: &Node) -> Fragment {
	let mut mapped = Vec::with_capacity(fragment.child_count());
	for child in fragment {
		let mut child = child.clone();
		if child.content().size() > 0 {
			let inner = map_fragment(child.content(), f, &child);
			child = child.copy(inner);
		}
		if child.is_inline() {
			child = f(&child, parent);
		}
		mapped.push(child);
	}
	Fragment::from_array(mapped)
}

/// Replaces the single node at `pos` by `updated`, keeping its content.
fn replace_node_markup(doc: &Node, pos: usize, node: &Node, updated: Node) -> StepResult {
	let open_end = usize::from(!node.is_leaf());
	from_replace(doc, pos, pos + 1, &Slice::new(Fragment::from_node(updated), 0, open_end))
}

impl Step {
	/// A plain replace step.
	pub fn replace(from: usize, to: usize, slice: Slice) -> Step {
		Step::Replace {
			from,
			to,
			slice,
			structure: false,
		}
	}

	/// The tag this step serializes under.
	pub fn tag(&self) -> &'static str {
		match self {
			Step::Replace { .. } => "replace",
			Step::ReplaceAround { .. } => "replaceAround",
			Step::AddMark { .. } => "addMark",
			Step::RemoveMark { .. } => "removeMark",
			Step::AddNodeMark { .. } => "addNodeMark",
			Step::RemoveNodeMark { .. } => "removeNodeMark",
			Step::Attr { .. } => "attr",
			Step::DocAttr { .. } => "docAttr",
		}
	}

	/// Applies the step to `doc`.
	pub fn apply(&self, doc: &Node) -> StepResult {
		match self {
			Step::Replace {
				from,
				to,
				slice,
				structure,
			} => {
				if *structure && content_between(doc, *from, *to).map_err(failure)? {
					return Err(StepFailure::new("Structure replace would overwrite content"));
				}
				from_replace(doc, *from, *to, slice)
			}
			Step::ReplaceAround {
				from,
				to,
				gap_from,
				gap_to,
				slice,
				insert,
				structure,
			} => {
				if *structure
					&& (content_between(doc, *from, *gap_from).map_err(failure)?
						|| content_between(doc, *gap_to, *to).map_err(failure)?)
				{
					return Err(StepFailure::new("Structure gap-replace would overwrite content"));
				}
				let gap = doc.slice(*gap_from, *gap_to, false).map_err(failure)?;
				if gap.open_start() > 0 || gap.open_end() > 0 {
					return Err(StepFailure::new("Gap is not a flat range"));
				}
				let Some(inserted) = slice.insert_at(*insert, gap.content()).map_err(failure)? else {
					return Err(StepFailure::new("Content does not fit in gap"));
				};
				from_replace(doc, *from, *to, &inserted)
			}
			Step::AddMark { from, to, mark } => {
				let old = doc.slice(*from, *to, false).map_err(failure)?;
				let rfrom = doc.resolve(*from).map_err(failure)?;
				let parent = rfrom.node(rfrom.shared_depth(*to)).clone();
				let mut add = |node: &Node, parent: &Node| {
					if !node.is_atom() || !parent.node_type().allows_mark_type(mark.mark_type()) {
						return node.clone();
					}
					node.mark(&mark.add_to_set(node.marks()))
				};
				let content = map_fragment(old.content(), &mut add, &parent);
				from_replace(doc, *from, *to, &Slice::new(content, old.open_start(), old.open_end()))
			}
			Step::RemoveMark { from, to, mark } => {
				let old = doc.slice(*from, *to, false).map_err(failure)?;
				let mut remove = |node: &Node, _: &Node| node.mark(&mark.remove_from_set(node.marks()));
				let content = map_fragment(old.content(), &mut remove, doc);
				from_replace(doc, *from, *to, &Slice::new(content, old.open_start(), old.open_end()))
			}
			Step::AddNodeMark { pos, mark } => {
				let node = doc
					.node_at(*pos)
					.ok_or_else(|| StepFailure::new("No node at mark step's position"))?;
				let updated = node
					.node_type()
					.create(Some(node.attrs()), Fragment::empty(), &mark.add_to_set(node.marks()))
					.map_err(failure)?;
				replace_node_markup(doc, *pos, node, updated)
			}
			Step::RemoveNodeMark { pos, mark } => {
				let node = doc
					.node_at(*pos)
					.ok_or_else(|| StepFailure::new("No node at mark step's position"))?;
				let updated = node
					.node_type()
					.create(Some(node.attrs()), Fragment::empty(), &mark.remove_from_set(node.marks()))
					.map_err(failure)?;
				replace_node_markup(doc, *pos, node, updated)
			}
			Step::Attr { pos, attr, value } => {
				let node = doc
					.node_at(*pos)
					.ok_or_else(|| StepFailure::new("No node at attribute step's position"))?;
				let attrs = node.attrs().update(attr, value.clone(), None);
				let updated = node
					.node_type()
					.create(Some(&attrs), Fragment::empty(), node.marks())
					.map_err(failure)?;
				replace_node_markup(doc, *pos, node, updated)
			}
			Step::DocAttr { attr, value } => {
				let attrs = doc.attrs().update(attr, value.clone(), None);
				doc.node_type()
					.create(Some(&attrs), doc.content().clone(), doc.marks())
					.map_err(failure)
			}
		}
	}

	/// The position changes this step makes.
	pub fn get_map(&self) -> StepMap {
		match self {
			Step::Replace { from, to, slice, .. } => StepMap::new([(*from, to.saturating_sub(*from), slice.size())]),
			Step::ReplaceAround {
				from,
				to,
				gap_from,
				gap_to,
				slice,
				insert,
				..
			} => StepMap::new([
				(*from, gap_from.saturating_sub(*from), *insert),
				(*gap_to, to.saturating_sub(*gap_to), slice.size().saturating_sub(*insert)),
			]),
			_ => StepMap::empty(),
		}
	}

	/// The step that undoes this one. `doc` must be the document the step was
	/// applied to.
	pub fn invert(&self, doc: &Node) -> Result<Step, ModelError> {
		Ok(match self {
			Step::Replace { from, to, slice, .. } => Step::Replace {
				from: *from,
				to: from + slice.size(),
				slice: doc.slice(*from, *to, false)?,
				structure: false,
			},
			Step::ReplaceAround {
				from,
				to,
				gap_from,
				gap_to,
				slice,
				insert,
				structure,
			} => {
				let gap = gap_to - gap_from;
				Step::ReplaceAround {
					from: *from,
					to: from + slice.size() + gap,
					gap_from: from + insert,
					gap_to: from + insert + gap,
					slice: doc
						.slice(*from, *to, false)?
						.remove_between(gap_from - from, gap_to - from)?,
					insert: gap_from - from,
					structure: *structure,
				}
			}
			Step::AddMark { from, to, mark } => Step::RemoveMark {
				from: *from,
				to: *to,
				mark: mark.clone(),
			},
			Step::RemoveMark { from, to, mark } => Step::AddMark {
				from: *from,
				to: *to,
				mark: mark.clone(),
			},
			Step::AddNodeMark { pos, mark } => {
				if let Some(node) = doc.node_at(*pos) {
					let new_set = mark.add_to_set(node.marks());
					if new_set.len() == node.marks().len() {
						let replaced = node.marks().iter().find(|m| !m.is_in_set(&new_set));
						return Ok(Step::AddNodeMark {
							pos: *pos,
							mark: replaced.unwrap_or(mark).clone(),
						});
					}
				}
				Step::RemoveNodeMark {
					pos: *pos,
					mark: mark.clone(),
				}
			}
			Step::RemoveNodeMark { pos, mark } => match doc.node_at(*pos) {
				Some(node) if mark.is_in_set(node.marks()) => Step::AddNodeMark {
					pos: *pos,
					mark: mark.clone(),
				},
				_ => self.clone(),
			},
			Step::Attr { pos, attr, .. } => {
				let node = doc.node_at(*pos).ok_or(ModelError::PositionOutOfRange { pos: *pos })?;
				Step::Attr {
					pos: *pos,
					attr: attr.clone(),
					value: node.attrs().get(attr).cloned().unwrap_or(Value::Null),
				}
			}
			Step::DocAttr { attr, .. } => Step::DocAttr {
				attr: attr.clone(),
				value: doc.attrs().get(attr).cloned().unwrap_or(Value::Null),
			},
		})
	}

	/// Maps the step through position changes. Returns `None` when the
	/// changes deleted the content the step targets.
	pub fn map<M: Mappable + ?Sized>(&self, mapping: &M) -> Option<Step> {
		match self {
			Step::Replace {
				from,
				to,
				slice,
				structure,
			} => {
				let from = mapping.map_result(*from, Bias::Right);
				let to = mapping.map_result(*to, Bias::Left);
				if from.deleted_across() && to.deleted_across() {
					return None;
				}
				Some(Step::Replace {
					from: from.pos,
					to: from.pos.max(to.pos),
					slice: slice.clone(),
					structure: *structure,
				})
			}
			Step::ReplaceAround {
				from,
				to,
				gap_from,
				gap_to,
				slice,
				insert,
				structure,
			} => {
				let mapped_from = mapping.map_result(*from, Bias::Right);
				let mapped_to = mapping.map_result(*to, Bias::Left);
				let new_gap_from = if from == gap_from {
					mapped_from.pos
				} else {
					mapping.map(*gap_from, Bias::Left)
				};
				let new_gap_to = if to == gap_to {
					mapped_to.pos
				} else {
					mapping.map(*gap_to, Bias::Right)
				};
				if (mapped_from.deleted_across() && mapped_to.deleted_across())
					|| new_gap_from < mapped_from.pos
					|| new_gap_to > mapped_to.pos
				{
					return None;
				}
				Some(Step::ReplaceAround {
					from: mapped_from.pos,
					to: mapped_to.pos,
					gap_from: new_gap_from,
					gap_to: new_gap_to,
					slice: slice.clone(),
					insert: *insert,
					structure: *structure,
				})
			}
			Step::AddMark { from, to, mark } | Step::RemoveMark { from, to, mark } => {
				let from = mapping.map_result(*from, Bias::Right);
				let to = mapping.map_result(*to, Bias::Left);
				if (from.deleted() && to.deleted()) || from.pos >= to.pos {
					return None;
				}
				let (from, to, mark) = (from.pos, to.pos, mark.clone());
				Some(match self {
					Step::AddMark { .. } => Step::AddMark { from, to, mark },
					_ => Step::RemoveMark { from, to, mark },
				})
			}
			Step::AddNodeMark { pos, mark } | Step::RemoveNodeMark { pos, mark } => {
				let mapped = mapping.map_result(*pos, Bias::Right);
				if mapped.deleted_after() {
					return None;
				}
				let (pos, mark) = (mapped.pos, mark.clone());
				Some(match self {
					Step::AddNodeMark { .. } => Step::AddNodeMark { pos, mark },
					_ => Step::RemoveNodeMark { pos, mark },
				})
			}
			Step::Attr { pos, attr, value } => {
				let mapped = mapping.map_result(*pos, Bias::Right);
				(!mapped.deleted_after()).then(|| Step::Attr {
					pos: mapped.pos,
					attr: attr.clone(),
					value: value.clone(),
				})
			}
			Step::DocAttr { .. } => Some(self.clone()),
		}
	}

	/// Combines this step with `other`, which directly follows it, when the
	/// result is obviously equivalent.
	pub fn merge(&self, other: &Step) -> Option<Step> {
		match (self, other) {
			(
				Step::Replace {
					from,
					to,
					slice,
					structure: false,
				},
				Step::Replace {
					from: other_from,
					to: other_to,
					slice: other_slice,
					structure: false,
				},
			) => {
				let empty = slice.size() + other_slice.size() == 0;
				if from + slice.size() == *other_from && slice.open_end() == 0 && other_slice.open_start() == 0 {
					let merged = if empty {
						Slice::empty()
					} else {
						Slice::new(
							slice.content().append(other_slice.content()),
							slice.open_start(),
							other_slice.open_end(),
						)
					};
					Some(Step::replace(*from, to + (other_to - other_from), merged))
				} else if *other_to == *from && slice.open_start() == 0 && other_slice.open_end() == 0 {
					let merged = if empty {
						Slice::empty()
					} else {
						Slice::new(
							other_slice.content().append(slice.content()),
							other_slice.open_start(),
							slice.open_end(),
						)
					};
					Some(Step::replace(*other_from, *to, merged))
				} else {
					None
				}
			}
			(
				Step::AddMark { from, to, mark },
				Step::AddMark {
					from: other_from,
					to: other_to,
					mark: other_mark,
				},
			) if mark == other_mark && from <= other_to && to >= other_from => Some(Step::AddMark {
				from: *from.min(other_from),
				to: *to.max(other_to),
				mark: mark.clone(),
			}),
			(
				Step::RemoveMark { from, to, mark },
				Step::RemoveMark {
					from: other_from,
					to: other_to,
					mark: other_mark,
				},
			) if mark == other_mark && from <= other_to && to >= other_from => Some(Step::RemoveMark {
				from: *from.min(other_from),
				to: *to.max(other_to),
				mark: mark.clone(),
			}),
			_ => None,
		}
	}

	/// Serializes the step, tagged with `stepType`.
	pub fn to_json(&self) -> Value {
		let mut obj = Map::new();
		obj.insert("stepType".into(), Value::from(self.tag()));
		match self {
			Step::Replace {
				from,
				to,
				slice,
				structure,
			} => {
				obj.insert("from".into(), json!(from));
				obj.insert("to".into(), json!(to));
				if slice.size() > 0 {
					obj.insert("slice".into(), slice.to_json());
				}
				if *structure {
					obj.insert("structure".into(), Value::Bool(true));
				}
			}
			Step::ReplaceAround {
				from,
				to,
				gap_from,
				gap_to,
				slice,
				insert,
				structure,
			} => {
				obj.insert("from".into(), json!(from));
				obj.insert("to".into(), json!(to));
				obj.insert("gapFrom".into(), json!(gap_from));
				obj.insert("gapTo".into(), json!(gap_to));
				obj.insert("insert".into(), json!(insert));
				if slice.size() > 0 {
					obj.insert("slice".into(), slice.to_json());
				}
				if *structure {
					obj.insert("structure".into(), Value::Bool(true));
				}
			}
			Step::AddMark { from, to, mark } | Step::RemoveMark { from, to, mark } => {
				obj.insert("mark".into(), mark.to_json());
				obj.insert("from".into(), json!(from));
				obj.insert("to".into(), json!(to));
			}
			Step::AddNodeMark { pos, mark } | Step::RemoveNodeMark { pos, mark } => {
				obj.insert("pos".into(), json!(pos));
				obj.insert("mark".into(), mark.to_json());
			}
			Step::Attr { pos, attr, value } => {
				obj.insert("pos".into(), json!(pos));
				obj.insert("attr".into(), Value::from(attr.as_str()));
				obj.insert("value".into(), value.clone());
			}
			Step::DocAttr { attr, value } => {
				obj.insert("attr".into(), Value::from(attr.as_str()));
				obj.insert("value".into(), value.clone());
			}
		}
		Value::Object(obj)
	}
}
