//! List editing commands: wrapping blocks in a list, splitting list items
//! and moving items out of or deeper into their list.
//!
//! Each command takes the current state and returns the transaction that
//! performs it, or `None` when it does not apply at the selection.

use quire_model::{Attrs, Fragment, Node, NodeRange, NodeTemplate, NodeType, Slice};
use quire_transform::{Bias, Mappable, Step, can_join, can_split, find_wrapping, lift_target};
use tracing::trace;

use crate::error::Result;
use crate::selection::Selection;
use crate::state::EditorState;
use crate::transaction::Transaction;


fn is_list_item(item_type: &NodeType) -> impl Fn(&Node) -> bool + '_ {
	move |node: &Node| node.first_child().is_some_and(|child| child.node_type() == item_type)
}

/// Wraps the selected blocks in a list of `list_type`. Blocks at the start of
/// a list item that is not the first one are nested into the previous item.
pub fn wrap_in_list(state: &EditorState, list_type: &NodeType, attrs: Option<&Attrs>) -> Result<Option<Transaction>> {
	let selection = state.selection();
	let Some(range) = selection.resolved_from().block_range(Some(selection.resolved_to())) else {
		return Ok(None);
	};
	let mut tr = state.tr();
	if !wrap_range_in_list(&mut tr, range, list_type, attrs)? {
		return Ok(None);
	}
	tr.scroll_into_view();
	Ok(Some(tr))
}

fn wrap_range_in_list(tr: &mut Transaction, range: NodeRange, list_type: &NodeType, attrs: Option<&Attrs>) -> Result<bool> {
	let doc = range.from().doc().clone();
	let mut range = range;
	let mut outer = range.clone();
	let mut join_before = false;
	let depth = range.depth();
	if depth >= 2
		&& range.from().node(depth - 1).node_type().compatible_content(list_type)
		&& range.start_index() == 0
	{
		// Already the top of the list.
		if range.from().index(depth - 1) == 0 {
			return Ok(false);
		}
		let insert = doc.resolve(range.start() - 2)?;
		outer = NodeRange::new(insert.clone(), insert, depth);
		if range.end_index() < range.parent().child_count() {
			let to = doc.resolve(range.to().end(depth))?;
			range = NodeRange::new(range.from().clone(), to, depth);
		}
		join_before = true;
	}
	let Some(wrappers) = find_wrapping(&outer, list_type, attrs, Some(&range)) else {
		return Ok(false);
	};
	do_wrap_in_list(tr, &range, &wrappers, join_before, list_type)?;
	Ok(true)
}

fn do_wrap_in_list(
	tr: &mut Transaction,
	range: &NodeRange,
	wrappers: &[NodeTemplate],
	join_before: bool,
	list_type: &NodeType,
) -> Result<()> {
	let mut content = Fragment::empty();
	for wrapper in wrappers.iter().rev() {
		content = Fragment::from_node(wrapper.node_type.create(wrapper.attrs.as_ref(), content, &[])?);
	}
	let shift = if join_before { 2 } else { 0 };
	tr.step(Step::ReplaceAround {
		from: range.start() - shift,
		to: range.end(),
		gap_from: range.start(),
		gap_to: range.end(),
		slice: Slice::new(content, 0, 0),
		insert: wrappers.len(),
		structure: true,
	})?;

	let found = wrappers
		.iter()
		.rposition(|wrapper| wrapper.node_type == *list_type)
		.map_or(0, |i| i + 1);
	let split_depth = wrappers.len() - found;
	let mut split_pos = range.start() + wrappers.len() - shift;
	let parent = range.parent();
	for i in range.start_index()..range.end_index() {
		if i > range.start_index() && can_split(tr.doc(), split_pos, split_depth, &[]) {
			tr.split(split_pos, split_depth, &[])?;
			split_pos += 2 * split_depth;
		}
		split_pos += parent.child(i).node_size();
	}
	Ok(())
}

/// Splits the list item around the selection. In an empty last item of a
/// nested list, splits the enclosing item instead.
pub fn split_list_item(state: &EditorState, item_type: &NodeType, item_attrs: Option<&Attrs>) -> Result<Option<Transaction>> {
	let selection = state.selection();
	let (from, to) = (selection.resolved_from(), selection.resolved_to());
	let node_is_block = matches!(selection, Selection::Node(s) if s.node().is_block());
	if node_is_block || from.depth() < 2 || !from.same_parent(to) {
		return Ok(None);
	}
	let depth = from.depth();
	let grand_parent = from.node(depth - 1);
	if grand_parent.node_type() != item_type {
		return Ok(None);
	}

	if from.parent().content().size() == 0 && grand_parent.child_count() == from.index_after(depth - 1) {
		// An empty trailing block. Only a nested list splits the outer item;
		// otherwise lifting is left to other commands.
		if depth <= 3 || from.node(depth - 3).node_type() != item_type || from.index(depth - 2) != from.node(depth - 2).child_count() - 1 {
			return Ok(None);
		}
		let depth_before = if from.index(depth - 1) > 0 {
			1
		} else if from.index(depth - 2) > 0 {
			2
		} else {
			3
		};
		let mut wrap = Fragment::empty();
		for d in (depth - 3..=depth - depth_before).rev() {
			wrap = Fragment::from_node(from.node(d).copy(wrap));
		}
		let depth_after = if from.index_after(depth - 1) < from.node(depth - 2).child_count() {
			1
		} else if from.index_after(depth - 2) < from.node(depth - 3).child_count() {
			2
		} else {
			3
		};
		if let Some(item) = item_type.create_and_fill(None, Fragment::empty(), &[])? {
			wrap = wrap.append(&Fragment::from_node(item));
		}
		let start = from.before(depth - (depth_before - 1))?;
		let end = from.after(depth - depth_after)?;
		let mut tr = state.tr();
		tr.replace(start, end, Slice::new(wrap, 4 - depth_before, 0))?;

		let mut cursor = None;
		let size = tr.doc().content().size();
		tr.doc().nodes_between(start, size, |node, pos, _, _| {
			if cursor.is_some() {
				return false;
			}
			if node.is_textblock() && node.content().size() == 0 {
				cursor = Some(pos + 1);
			}
			true
		});
		if let Some(pos) = cursor {
			let near = Selection::near(&tr.doc().resolve(pos)?, Bias::Right)?;
			tr.set_selection(near)?;
		}
		tr.scroll_into_view();
		return Ok(Some(tr));
	}

	let next_type = if to.pos() == from.end(depth) {
		grand_parent.content_match_at(0)?.default_type()
	} else {
		None
	};
	let mut tr = state.tr();
	tr.delete(from.pos(), to.pos())?;
	let types: Vec<Option<NodeTemplate>> = match next_type {
		Some(next) => vec![
			item_attrs.map(|attrs| NodeTemplate::with_attrs(item_type.clone(), attrs.clone())),
			Some(NodeTemplate::new(next)),
		],
		None => Vec::new(),
	};
	if !can_split(tr.doc(), from.pos(), 2, &types) {
		return Ok(None);
	}
	tr.split(from.pos(), 2, &types)?;
	tr.scroll_into_view();
	Ok(Some(tr))
}

/// Moves the selected list items out of their list: into the enclosing list
/// when nested, out of lists entirely otherwise.
pub fn lift_list_item(state: &EditorState, item_type: &NodeType) -> Result<Option<Transaction>> {
	let selection = state.selection();
	let from = selection.resolved_from();
	let Some(range) = from.block_range_where(Some(selection.resolved_to()), is_list_item(item_type)) else {
		return Ok(None);
	};
	if range.depth() > 0 && from.node(range.depth() - 1).node_type() == item_type {
		lift_to_outer_list(state, item_type, range)
	} else {
		lift_out_of_list(state, range)
	}
}

fn lift_to_outer_list(state: &EditorState, item_type: &NodeType, range: NodeRange) -> Result<Option<Transaction>> {
	let mut tr = state.tr();
	let mut range = range;
	let end = range.end();
	let end_of_list = range.to().end(range.depth());
	if end < end_of_list {
		// Later siblings become children of the last lifted item.
		let item = item_type.create(None, Fragment::from_node(range.parent().copy(Fragment::empty())), &[])?;
		tr.step(Step::ReplaceAround {
			from: end - 1,
			to: end_of_list,
			gap_from: end,
			gap_to: end_of_list,
			slice: Slice::new(Fragment::from_node(item), 1, 0),
			insert: 1,
			structure: true,
		})?;
		range = NodeRange::new(
			tr.doc().resolve(range.from().pos())?,
			tr.doc().resolve(end_of_list)?,
			range.depth(),
		);
	}
	let Some(target) = lift_target(&range) else {
		return Ok(None);
	};
	tr.lift(&range, target)?;
	let after = tr.doc().resolve(tr.mapping().map(end, Bias::Left) - 1)?;
	let same_type = match (after.node_before(), after.node_after()) {
		(Some(before), Some(next)) => before.node_type() == next.node_type(),
		_ => false,
	};
	if can_join(tr.doc(), after.pos()) && same_type {
		tr.join(after.pos(), 1)?;
	}
	tr.scroll_into_view();
	Ok(Some(tr))
}

fn lift_out_of_list(state: &EditorState, range: NodeRange) -> Result<Option<Transaction>> {
	if range.depth() == 0 {
		return Ok(None);
	}
	let mut tr = state.tr();
	let list = range.parent().clone();
	// Merge the selected items into one.
	let mut pos = range.end();
	for i in (range.start_index() + 1..range.end_index()).rev() {
		pos -= list.child(i).node_size();
		tr.delete(pos - 1, pos + 1)?;
	}
	let start = tr.doc().resolve(range.start())?;
	let Some(item) = start.node_after() else {
		return Ok(None);
	};
	if tr.mapping().map(range.end(), Bias::Right) != range.start() + item.node_size() {
		return Ok(None);
	}
	let at_start = range.start_index() == 0;
	let at_end = range.end_index() == list.child_count();
	let parent = start.node(start.depth() - 1);
	let index_before = start.index(start.depth() - 1);
	let rest = if at_end {
		Fragment::empty()
	} else {
		Fragment::from_node(list.clone())
	};
	if !parent.can_replace(index_before + usize::from(!at_start), index_before + 1, &item.content().append(&rest)) {
		trace!(pos = start.pos(), "list item content cannot replace its list");
		return Ok(None);
	}
	let (from, to) = (start.pos(), start.pos() + item.node_size());
	let empty_list = || Fragment::from_node(list.copy(Fragment::empty()));
	let before = if at_start { Fragment::empty() } else { empty_list() };
	let after = if at_end { Fragment::empty() } else { empty_list() };
	// Open sides close the remaining list; ends of the list are overwritten.
	tr.step(Step::ReplaceAround {
		from: from - usize::from(at_start),
		to: to + usize::from(at_end),
		gap_from: from + 1,
		gap_to: to - 1,
		slice: Slice::new(before.append(&after), usize::from(!at_start), usize::from(!at_end)),
		insert: usize::from(!at_start),
		structure: false,
	})?;
	tr.scroll_into_view();
	Ok(Some(tr))
}

/// Nests the selected list items into the item before them.
pub fn sink_list_item(state: &EditorState, item_type: &NodeType) -> Result<Option<Transaction>> {
	let selection = state.selection();
	let Some(range) = selection
		.resolved_from()
		.block_range_where(Some(selection.resolved_to()), is_list_item(item_type))
	else {
		return Ok(None);
	};
	let start_index = range.start_index();
	if start_index == 0 {
		return Ok(None);
	}
	let parent = range.parent();
	let node_before = parent.child(start_index - 1);
	if node_before.node_type() != item_type {
		return Ok(None);
	}

	let nested_before = node_before
		.last_child()
		.is_some_and(|last| last.node_type() == parent.node_type());
	let inner = if nested_before {
		Fragment::from_node(item_type.create(None, Fragment::empty(), &[])?)
	} else {
		Fragment::empty()
	};
	let list = parent.node_type().create(None, inner, &[])?;
	let item = item_type.create(None, Fragment::from_node(list), &[])?;
	let open = if nested_before { 3 } else { 1 };
	let (before, after) = (range.start(), range.end());
	let mut tr = state.tr();
	tr.step(Step::ReplaceAround {
		from: before - open,
		to: after,
		gap_from: before,
		gap_to: after,
		slice: Slice::new(Fragment::from_node(item), open, 0),
		insert: 1,
		structure: true,
	})?;
	tr.scroll_into_view();
	Ok(Some(tr))
}
