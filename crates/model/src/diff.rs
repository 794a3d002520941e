//! Structural diffing of fragments.
//!
//! Both walks skip children that are the same allocation on either side,
//! so diffing two versions of a document only visits the edited paths.

use crate::fragment::Fragment;

pub(crate) fn find_diff_start(a: &Fragment, b: &Fragment, mut pos: usize) -> Option<usize> {
	for i in 0.. {
		if i == a.child_count() || i == b.child_count() {
			return (a.child_count() != b.child_count()).then_some(pos);
		}
		let (child_a, child_b) = (a.child(i), b.child(i));
		if child_a.ptr_eq(child_b) {
			pos += child_a.node_size();
			continue;
		}
		if !child_a.same_markup(child_b) {
			return Some(pos);
		}
		if let (Some(ta), Some(tb)) = (child_a.text(), child_b.text())
			&& ta != tb
		{
			let same = ta.chars().zip(tb.chars()).take_while(|(x, y)| x == y).count();
			return Some(pos + same);
		}
		if (child_a.content().size() > 0 || child_b.content().size() > 0)
			&& let Some(inner) = find_diff_start(child_a.content(), child_b.content(), pos + 1)
		{
			return Some(inner);
		}
		pos += child_a.node_size();
	}
	None
}

pub(crate) fn find_diff_end(a: &Fragment, b: &Fragment, mut pos_a: usize, mut pos_b: usize) -> Option<(usize, usize)> {
	let (mut i_a, mut i_b) = (a.child_count(), b.child_count());
	loop {
		if i_a == 0 || i_b == 0 {
			return (i_a != i_b).then_some((pos_a, pos_b));
		}
		i_a -= 1;
		i_b -= 1;
		let (child_a, child_b) = (a.child(i_a), b.child(i_b));
		let size = child_a.node_size();
		if child_a.ptr_eq(child_b) {
			pos_a -= size;
			pos_b -= size;
			continue;
		}
		if !child_a.same_markup(child_b) {
			return Some((pos_a, pos_b));
		}
		if let (Some(ta), Some(tb)) = (child_a.text(), child_b.text())
			&& ta != tb
		{
			let same = ta.chars().rev().zip(tb.chars().rev()).take_while(|(x, y)| x == y).count();
			return Some((pos_a - same, pos_b - same));
		}
		if (child_a.content().size() > 0 || child_b.content().size() > 0)
			&& let Some(inner) = find_diff_end(child_a.content(), child_b.content(), pos_a - 1, pos_b - 1)
		{
			return Some(inner);
		}
		pos_a -= size;
		pos_b -= size;
	}
}
