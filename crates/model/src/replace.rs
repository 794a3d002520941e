//! The strict replace algorithm.
//!
//! Replacing `from..to` with a slice walks down while both positions share
//! an ancestor, then stitches together three pieces at each level below the
//! divergence point: the content left of `from`, the slice, and the content
//! right of `to`. Open nodes on either side of the slice are joined with
//! the matching ancestors of `from` and `to`. Every rebuilt parent is
//! checked against its content expression.
//!
//! ```text
//!   doc(p("ab|c"), p("d|ef"))  +  Slice(<p("X"), p("Y")>, 1, 1)
//!                  ──▶  doc(p("abX"), p("Yef"))
//! ```

use crate::error::{ModelError, Result};
use crate::fragment::Fragment;
use crate::node::Node;
use crate::resolve::ResolvedPos;
use crate::slice::Slice;

pub(crate) fn replace(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice) -> Result<Node> {
	if slice.open_start() > from.depth() {
		return Err(ModelError::replace("Inserted content deeper than insertion position"));
	}
	if from.depth() as isize - slice.open_start() as isize != to.depth() as isize - slice.open_end() as isize {
		return Err(ModelError::replace("Inconsistent open depths"));
	}
	replace_outer(from, to, slice, 0)
}

fn replace_outer(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice, depth: usize) -> Result<Node> {
	let index = from.index(depth);
	let node = from.node(depth);
	if index == to.index(depth) && depth < from.depth() - slice.open_start() {
		let inner = replace_outer(from, to, slice, depth + 1)?;
		return Ok(node.copy(node.content().replace_child(index, inner)));
	}
	if slice.content().size() == 0 {
		return close(node, replace_two_way(from, to, depth)?);
	}
	if slice.open_start() == 0 && slice.open_end() == 0 && from.depth() == depth && to.depth() == depth {
		let parent = from.parent();
		let content = parent.content();
		let joined = content
			.cut(0, from.parent_offset())
			.append(slice.content())
			.append(&content.cut_from(to.parent_offset()));
		return close(parent, joined);
	}
	let (start, end) = prepare_slice_for_replace(slice, from)?;
	close(node, replace_three_way(from, &start, &end, to, depth)?)
}

fn check_join(main: &Node, sub: &Node) -> Result<()> {
	if !sub.node_type().compatible_content(main.node_type()) {
		return Err(ModelError::replace(format!(
			"Cannot join {} onto {}",
			sub.node_type().name(),
			main.node_type().name()
		)));
	}
	Ok(())
}

fn joinable(before: &ResolvedPos, after: &ResolvedPos, depth: usize) -> Result<Node> {
	let node = before.node(depth);
	check_join(node, after.node(depth))?;
	Ok(node.clone())
}

fn add_node(child: Node, target: &mut Vec<Node>) {
	if let Some(last) = target.last_mut()
		&& child.is_text()
		&& child.same_markup(last)
	{
		let text = format!("{}{}", last.text().unwrap_or_default(), child.text().unwrap_or_default());
		*last = child.with_text(&text);
		return;
	}
	target.push(child);
}

fn add_range(start: Option<&ResolvedPos>, end: Option<&ResolvedPos>, depth: usize, target: &mut Vec<Node>) {
	let Some(anchor) = end.or(start) else {
		return;
	};
	let node = anchor.node(depth);
	let mut start_index = 0;
	let end_index = end.map_or(node.child_count(), |e| e.index(depth));
	if let Some(start) = start {
		start_index = start.index(depth);
		if start.depth() > depth {
			start_index += 1;
		} else if start.text_offset() > 0 {
			if let Some(after) = start.node_after() {
				add_node(after, target);
			}
			start_index += 1;
		}
	}
	for i in start_index..end_index {
		add_node(node.child(i).clone(), target);
	}
	if let Some(end) = end
		&& end.depth() == depth
		&& end.text_offset() > 0
		&& let Some(before) = end.node_before()
	{
		add_node(before, target);
	}
}

fn close(node: &Node, content: Fragment) -> Result<Node> {
	if !node.node_type().valid_content(&content) {
		let mut rendered = content.to_string();
		if rendered.chars().count() > 50 {
			rendered = rendered.chars().take(50).collect();
		}
		return Err(ModelError::replace(format!(
			"Invalid content for node {}: {rendered}",
			node.node_type().name()
		)));
	}
	Ok(node.copy(content))
}

fn replace_three_way(
	from: &ResolvedPos,
	start: &ResolvedPos,
	end: &ResolvedPos,
	to: &ResolvedPos,
	depth: usize,
) -> Result<Fragment> {
	let open_start = if from.depth() > depth {
		Some(joinable(from, start, depth + 1)?)
	} else {
		None
	};
	let open_end = if to.depth() > depth {
		Some(joinable(end, to, depth + 1)?)
	} else {
		None
	};

	let mut content = Vec::new();
	add_range(None, Some(from), depth, &mut content);
	match (&open_start, &open_end) {
		(Some(os), Some(oe)) if start.index(depth) == end.index(depth) => {
			check_join(os, oe)?;
			add_node(close(os, replace_three_way(from, start, end, to, depth + 1)?)?, &mut content);
		}
		_ => {
			if let Some(os) = &open_start {
				add_node(close(os, replace_two_way(from, start, depth + 1)?)?, &mut content);
			}
			add_range(Some(start), Some(end), depth, &mut content);
			if let Some(oe) = &open_end {
				add_node(close(oe, replace_two_way(end, to, depth + 1)?)?, &mut content);
			}
		}
	}
	add_range(Some(to), None, depth, &mut content);
	Ok(Fragment::from_nodes(content))
}

fn replace_two_way(from: &ResolvedPos, to: &ResolvedPos, depth: usize) -> Result<Fragment> {
	let mut content = Vec::new();
	add_range(None, Some(from), depth, &mut content);
	if from.depth() > depth {
		let ty = joinable(from, to, depth + 1)?;
		add_node(close(&ty, replace_two_way(from, to, depth + 1)?)?, &mut content);
	}
	add_range(Some(to), None, depth, &mut content);
	Ok(Fragment::from_nodes(content))
}

/// Places the slice's content inside copies of `along`'s ancestors so its
/// open edges can be resolved like document positions.
fn prepare_slice_for_replace(slice: &Slice, along: &ResolvedPos) -> Result<(ResolvedPos, ResolvedPos)> {
	let extra = along.depth() - slice.open_start();
	let parent = along.node(extra);
	let mut node = parent.copy(slice.content().clone());
	for i in (0..extra).rev() {
		node = along.node(i).copy(Fragment::from_node(node));
	}
	let start = node.resolve(slice.open_start() + extra)?;
	let end = node.resolve(node.content().size() - slice.open_end() - extra)?;
	Ok((start, end))
}
