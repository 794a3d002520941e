//! Structural queries and the transforms built on them: lifting, wrapping,
//! splitting, joining and retyping blocks.

use std::iter;

use quire_model::{Attrs, Fragment, Mark, ModelError, Node, NodeRange, NodeTemplate, NodeType, Slice};

use crate::error::{Result, TransformError};
use crate::map::{Bias, Mappable};
use crate::step::Step;
use crate::transform::Transform;


/// Search direction for [`join_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
	#[default]
	Backward,
	Forward,
}

fn can_cut(node: &Node, start: usize, end: usize) -> bool {
	(start == 0 || node.can_replace(start, node.child_count(), &Fragment::empty()))
		&& (end == node.child_count() || node.can_replace(0, end, &Fragment::empty()))
}

/// The depth the content of `range` can be lifted to, if any.
pub fn lift_target(range: &NodeRange) -> Option<usize> {
	let content = range.parent().content().cut_by_index(range.start_index(), range.end_index());
	let mut depth = range.depth();
	loop {
		let node = range.from().node(depth);
		let index = range.from().index(depth);
		let end_index = range.to().index_after(depth);
		if depth < range.depth() && node.can_replace(index, end_index, &content) {
			return Some(depth);
		}
		if depth == 0 || node.node_type().spec().isolating || !can_cut(node, index, end_index) {
			return None;
		}
		depth -= 1;
	}
}

/// The wrappers needed to wrap `range` in a node of `node_type`: the nodes
/// around it, the node itself and the nodes needed inside it. `inner_range`
/// defaults to `range` and decides which content the innermost wrapper must
/// accept.
pub fn find_wrapping(
	range: &NodeRange,
	node_type: &NodeType,
	attrs: Option<&Attrs>,
	inner_range: Option<&NodeRange>,
) -> Option<Vec<NodeTemplate>> {
	let around = find_wrapping_outside(range, node_type)?;
	let inner = find_wrapping_inside(inner_range.unwrap_or(range), node_type)?;
	let wrapper = NodeTemplate {
		node_type: node_type.clone(),
		attrs: attrs.cloned(),
	};
	Some(
		around
			.into_iter()
			.map(NodeTemplate::new)
			.chain(iter::once(wrapper))
			.chain(inner.into_iter().map(NodeTemplate::new))
			.collect(),
	)
}

fn find_wrapping_outside(range: &NodeRange, node_type: &NodeType) -> Option<Vec<NodeType>> {
	let (parent, start, end) = (range.parent(), range.start_index(), range.end_index());
	let around = parent.content_match_at(start).ok()?.find_wrapping(node_type)?;
	let outer = around.first().unwrap_or(node_type);
	parent.can_replace_with(start, end, outer, None).then_some(around)
}

fn find_wrapping_inside(range: &NodeRange, node_type: &NodeType) -> Option<Vec<NodeType>> {
	let (parent, start, end) = (range.parent(), range.start_index(), range.end_index());
	let inner = parent.maybe_child(start)?;
	let inside = node_type.content_match().find_wrapping(inner.node_type())?;
	let last = inside.last().unwrap_or(node_type);
	let mut matched = Some(last.content_match());
	for child in parent.content().iter().take(end).skip(start) {
		matched = matched.and_then(|m| m.match_type(child.node_type()));
	}
	matched.is_some_and(|m| m.valid_end()).then_some(inside)
}

/// Whether splitting at `pos` `depth` levels deep is allowed. `types_after`
/// optionally overrides the types of the nodes after the split, outermost
/// first.
pub fn can_split(doc: &Node, pos: usize, depth: usize, types_after: &[Option<NodeTemplate>]) -> bool {
	let Ok(rpos) = doc.resolve(pos) else {
		return false;
	};
	if depth == 0 {
		return false;
	}
	let Some(base) = rpos.depth().checked_sub(depth) else {
		return false;
	};
	let parent = rpos.parent();
	let index = rpos.index(rpos.depth());
	let inner_type = types_after
		.last()
		.and_then(Option::as_ref)
		.map_or(parent.node_type(), |t| &t.node_type);
	if parent.node_type().spec().isolating
		|| !parent.can_replace(index, parent.child_count(), &Fragment::empty())
		|| !inner_type.valid_content(&parent.content().cut_by_index(index, parent.child_count()))
	{
		return false;
	}
	for (k, d) in (base + 1..rpos.depth()).rev().enumerate() {
		let i = depth - 2 - k;
		let node = rpos.node(d);
		let index = rpos.index(d);
		if node.node_type().spec().isolating {
			return false;
		}
		let mut rest = node.content().cut_by_index(index, node.child_count());
		if let Some(Some(over)) = types_after.get(i + 1) {
			let Ok(replacement) = over.node_type.create(over.attrs.as_ref(), Fragment::empty(), &[]) else {
				return false;
			};
			if rest.child_count() == 0 {
				return false;
			}
			rest = rest.replace_child(0, replacement);
		}
		let after = types_after
			.get(i)
			.and_then(Option::as_ref)
			.map_or(node.node_type(), |t| &t.node_type);
		if !node.can_replace(index + 1, node.child_count(), &Fragment::empty()) || !after.valid_content(&rest) {
			return false;
		}
	}
	let index = rpos.index_after(base);
	let base_type = types_after
		.first()
		.and_then(Option::as_ref)
		.map_or(rpos.node(base + 1).node_type(), |t| &t.node_type);
	rpos.node(base).can_replace_with(index, index, base_type, None)
}

/// Whether the nodes before and after `pos` can be joined.
pub fn can_join(doc: &Node, pos: usize) -> bool {
	let Ok(rpos) = doc.resolve(pos) else {
		return false;
	};
	let index = rpos.index(rpos.depth());
	joinable(rpos.node_before().as_ref(), rpos.node_after().as_ref())
		&& rpos.parent().can_replace(index, index + 1, &Fragment::empty())
}

/// Whether `b`'s content can be appended to `a`.
pub fn joinable(a: Option<&Node>, b: Option<&Node>) -> bool {
	matches!((a, b), (Some(a), Some(b)) if !a.is_leaf() && a.can_append(b))
}

/// Finds a position at or around `pos` where adjacent blocks can be joined,
/// walking up the ancestors in `dir`.
pub fn join_point(doc: &Node, pos: usize, dir: Direction) -> Result<Option<usize>> {
	let rpos = doc.resolve(pos)?;
	let mut pos = pos;
	for d in (0..=rpos.depth()).rev() {
		let mut index = rpos.index(d);
		let (before, after) = if d == rpos.depth() {
			(rpos.node_before(), rpos.node_after())
		} else if dir == Direction::Forward {
			index += 1;
			(Some(rpos.node(d + 1).clone()), rpos.node(d).maybe_child(index).cloned())
		} else {
			let before = index.checked_sub(1).and_then(|i| rpos.node(d).maybe_child(i)).cloned();
			(before, Some(rpos.node(d + 1).clone()))
		};
		if before.as_ref().is_some_and(|b| !b.is_textblock())
			&& joinable(before.as_ref(), after.as_ref())
			&& rpos.node(d).can_replace(index, index + 1, &Fragment::empty())
		{
			return Ok(Some(pos));
		}
		if d == 0 {
			break;
		}
		pos = match dir {
			Direction::Backward => rpos.before(d)?,
			Direction::Forward => rpos.after(d)?,
		};
	}
	Ok(None)
}

/// A position at or next to `pos` where a node of `node_type` can be
/// inserted, when `pos` sits at the start or end of its parent.
pub fn insert_point(doc: &Node, pos: usize, node_type: &NodeType) -> Result<Option<usize>> {
	let rpos = doc.resolve(pos)?;
	let index = rpos.index(rpos.depth());
	if rpos.parent().can_replace_with(index, index, node_type, None) {
		return Ok(Some(pos));
	}
	if rpos.parent_offset() == 0 {
		for d in (0..rpos.depth()).rev() {
			let index = rpos.index(d);
			if rpos.node(d).can_replace_with(index, index, node_type, None) {
				return Ok(Some(rpos.before(d + 1)?));
			}
			if index > 0 {
				return Ok(None);
			}
		}
	}
	if rpos.parent_offset() == rpos.parent().content().size() {
		for d in (0..rpos.depth()).rev() {
			let index = rpos.index_after(d);
			if rpos.node(d).can_replace_with(index, index, node_type, None) {
				return Ok(Some(rpos.after(d + 1)?));
			}
			if index < rpos.node(d).child_count() {
				return Ok(None);
			}
		}
	}
	Ok(None)
}

/// A position near `pos` where `slice` can be dropped, trying direct fits
/// first and wrapped fits second.
pub fn drop_point(doc: &Node, pos: usize, slice: &Slice) -> Result<Option<usize>> {
	let rpos = doc.resolve(pos)?;
	if slice.content().size() == 0 {
		return Ok(Some(pos));
	}
	let mut content = slice.content().clone();
	for _ in 0..slice.open_start() {
		let Some(first) = content.first_child().cloned() else {
			break;
		};
		content = first.content().clone();
	}
	let passes = if slice.open_start() == 0 && slice.size() > 0 { 2 } else { 1 };
	for pass in 1..=passes {
		for d in (0..=rpos.depth()).rev() {
			let bias = if d == rpos.depth() {
				None
			} else if rpos.pos() * 2 <= rpos.start(d + 1) + rpos.end(d + 1) {
				Some(Bias::Left)
			} else {
				Some(Bias::Right)
			};
			let insert_pos = rpos.index(d) + usize::from(bias == Some(Bias::Right));
			let parent = rpos.node(d);
			let fits = if pass == 1 {
				parent.can_replace(insert_pos, insert_pos, &content)
			} else {
				parent
					.content_match_at(insert_pos)
					.ok()
					.and_then(|m| m.find_wrapping(content.first_child()?.node_type()))
					.and_then(|wrapping| wrapping.first().cloned())
					.is_some_and(|outer| parent.can_replace_with(insert_pos, insert_pos, &outer, None))
			};
			if fits {
				return Ok(Some(match bias {
					None => rpos.pos(),
					Some(Bias::Left) => rpos.before(d + 1)?,
					Some(Bias::Right) => rpos.after(d + 1)?,
				}));
			}
		}
	}
	Ok(None)
}

fn can_change_type(doc: &Node, pos: usize, node_type: &NodeType) -> Result<bool> {
	let rpos = doc.resolve(pos)?;
	let index = rpos.index(rpos.depth());
	Ok(rpos.parent().can_replace_with(index, index + 1, node_type, None))
}

impl Transform {
	/// Lifts the content of `range` out of its parents, down to depth
	/// `target`, splitting the parents where content remains around it.
	pub fn lift(&mut self, range: &NodeRange, target: usize) -> Result<&mut Self> {
		let (rfrom, rto, depth) = (range.from(), range.to(), range.depth());
		let gap_start = rfrom.before(depth + 1)?;
		let gap_end = rto.after(depth + 1)?;
		let (mut start, mut end) = (gap_start, gap_end);

		let mut before = Fragment::empty();
		let mut open_start = 0;
		let mut splitting = false;
		for d in (target + 1..=depth).rev() {
			if splitting || rfrom.index(d) > 0 {
				splitting = true;
				before = Fragment::from_node(rfrom.node(d).copy(before));
				open_start += 1;
			} else {
				start -= 1;
			}
		}

		let mut after = Fragment::empty();
		let mut open_end = 0;
		splitting = false;
		for d in (target + 1..=depth).rev() {
			if splitting || rto.after(d + 1)? < rto.end(d) {
				splitting = true;
				after = Fragment::from_node(rto.node(d).copy(after));
				open_end += 1;
			} else {
				end += 1;
			}
		}

		let insert = before.size() - open_start;
		self.step(Step::ReplaceAround {
			from: start,
			to: end,
			gap_from: gap_start,
			gap_to: gap_end,
			slice: Slice::new(before.append(&after), open_start, open_end),
			insert,
			structure: true,
		})
	}

	/// Wraps `range` in `wrappers`, outermost first, as produced by
	/// [`find_wrapping`].
	pub fn wrap(&mut self, range: &NodeRange, wrappers: &[NodeTemplate]) -> Result<&mut Self> {
		let mut content = Fragment::empty();
		for wrapper in wrappers.iter().rev() {
			if content.size() > 0
				&& !wrapper
					.node_type
					.content_match()
					.match_fragment(&content)
					.is_some_and(|m| m.valid_end())
			{
				return Err(TransformError::Structure(
					"Wrapper type given to wrap does not form valid content of its parent wrapper".into(),
				));
			}
			content = Fragment::from_node(wrapper.node_type.create(wrapper.attrs.as_ref(), content, &[])?);
		}
		let (start, end) = (range.start(), range.end());
		self.step(Step::ReplaceAround {
			from: start,
			to: end,
			gap_from: start,
			gap_to: end,
			slice: Slice::new(content, 0, 0),
			insert: wrappers.len(),
			structure: true,
		})
	}

	/// Changes every textblock in `from..to` that can take it to
	/// `node_type`, clearing content the new type does not allow.
	pub fn set_block_type(
		&mut self,
		from: usize,
		to: usize,
		node_type: &NodeType,
		attrs: Option<&Attrs>,
	) -> Result<&mut Self> {
		if !node_type.is_textblock() {
			return Err(TransformError::Structure(
				"Type given to set_block_type should be a textblock".into(),
			));
		}
		let map_from = self.steps().len();
		let mut targets = Vec::new();
		self.doc().nodes_between(from, to, |node, pos, _, _| {
			if node.is_textblock() && !node.has_markup(node_type, attrs, &[]) {
				targets.push((pos, node.node_size(), node.marks().to_vec()));
				return false;
			}
			true
		});
		for (pos, size, marks) in targets {
			let mapped = self.mapping().slice_from(map_from).map(pos, Bias::Right);
			if !can_change_type(self.doc(), mapped, node_type)? {
				continue;
			}
			self.clear_incompatible(mapped, node_type, None)?;
			let mapping = self.mapping().slice_from(map_from);
			let start = mapping.map(pos, Bias::Right);
			let end = mapping.map(pos + size, Bias::Right);
			let wrapper = node_type.create(attrs, Fragment::empty(), &marks)?;
			self.step(Step::ReplaceAround {
				from: start,
				to: end,
				gap_from: start + 1,
				gap_to: end - 1,
				slice: Slice::new(Fragment::from_node(wrapper), 0, 0),
				insert: 1,
				structure: true,
			})?;
		}
		Ok(self)
	}

	/// Changes the type, attributes and/or marks of the node at `pos`.
	pub fn set_node_markup(
		&mut self,
		pos: usize,
		node_type: Option<&NodeType>,
		attrs: Option<&Attrs>,
		marks: Option<&[Mark]>,
	) -> Result<&mut Self> {
		let node = self
			.doc()
			.node_at(pos)
			.cloned()
			.ok_or_else(|| ModelError::Range("No node at given position".into()))?;
		let ty = node_type.unwrap_or(node.node_type()).clone();
		let updated = ty.create(attrs, Fragment::empty(), marks.unwrap_or(node.marks()))?;
		if node.is_leaf() {
			return self.replace_with(pos, pos + node.node_size(), updated);
		}
		if !ty.valid_content(node.content()) {
			return Err(TransformError::Structure(format!("Invalid content for node type {}", ty.name())));
		}
		self.step(Step::ReplaceAround {
			from: pos,
			to: pos + node.node_size(),
			gap_from: pos + 1,
			gap_to: pos + node.node_size() - 1,
			slice: Slice::new(Fragment::from_node(updated), 0, 0),
			insert: 1,
			structure: true,
		})
	}

	/// Splits the node at `pos` and `depth - 1` of its ancestors.
	/// `types_after` optionally gives the types of the new nodes after the
	/// split, outermost first.
	pub fn split(&mut self, pos: usize, depth: usize, types_after: &[Option<NodeTemplate>]) -> Result<&mut Self> {
		let rpos = self.doc().resolve(pos)?;
		let base = rpos
			.depth()
			.checked_sub(depth)
			.ok_or_else(|| TransformError::Structure(format!("Cannot split {depth} levels deep at {pos}")))?;
		let mut before = Fragment::empty();
		let mut after = Fragment::empty();
		for (k, d) in (base + 1..=rpos.depth()).rev().enumerate() {
			before = Fragment::from_node(rpos.node(d).copy(before));
			let node = match types_after.get(depth - 1 - k).and_then(Option::as_ref) {
				Some(template) => template.node_type.create(template.attrs.as_ref(), after, &[])?,
				None => rpos.node(d).copy(after),
			};
			after = Fragment::from_node(node);
		}
		self.step(Step::Replace {
			from: pos,
			to: pos,
			slice: Slice::new(before.append(&after), depth, depth),
			structure: true,
		})
	}

	/// Joins the blocks around `pos`, `depth` levels deep.
	pub fn join(&mut self, pos: usize, depth: usize) -> Result<&mut Self> {
		let from = pos
			.checked_sub(depth)
			.ok_or(ModelError::PositionOutOfRange { pos })?;
		self.step(Step::Replace {
			from,
			to: pos + depth,
			slice: Slice::empty(),
			structure: true,
		})
	}
}
