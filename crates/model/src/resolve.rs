//! Resolved positions and node ranges.
//!
//! A [`ResolvedPos`] expands a flat document position into the path of
//! ancestors that contain it:
//!
//! ```text
//!   doc( blockquote( paragraph("ab|c") ) )
//!   depth 0: doc         index 0  offset 0
//!   depth 1: blockquote  index 0  offset 1
//!   depth 2: paragraph   index 0  offset 2   (text offset 2)
//! ```

use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{ModelError, Result};
use crate::mark::{Mark, MarkSet};
use crate::node::Node;

#[cfg(test)]
mod tests;

#[derive(Clone)]
struct PathEntry {
	node: Node,
	index: usize,
	/// Absolute position of the start of the child at `index`.
	offset: usize,
}

/// A position resolved against a document.
#[derive(Clone)]
pub struct ResolvedPos {
	pos: usize,
	path: SmallVec<[PathEntry; 4]>,
	parent_offset: usize,
}

impl ResolvedPos {
	pub(crate) fn resolve(doc: &Node, pos: usize) -> Result<ResolvedPos> {
		if pos > doc.content().size() {
			return Err(ModelError::PositionOutOfRange { pos });
		}
		let mut path = SmallVec::new();
		let mut start = 0;
		let mut parent_offset = pos;
		let mut node = doc.clone();
		loop {
			let (index, offset) = node.content().find_index(parent_offset, false)?;
			let rem = parent_offset - offset;
			path.push(PathEntry {
				node: node.clone(),
				index,
				offset: start + offset,
			});
			if rem == 0 {
				break;
			}
			let child = node.child(index).clone();
			if child.is_text() {
				break;
			}
			parent_offset = rem - 1;
			start += offset + 1;
			node = child;
		}
		Ok(ResolvedPos {
			pos,
			path,
			parent_offset,
		})
	}

	/// The position.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Number of ancestors of the position, not counting the document.
	pub fn depth(&self) -> usize {
		self.path.len() - 1
	}

	/// Offset of the position in its parent node.
	pub fn parent_offset(&self) -> usize {
		self.parent_offset
	}

	/// The innermost ancestor.
	pub fn parent(&self) -> &Node {
		self.node(self.depth())
	}

	/// The root node.
	pub fn doc(&self) -> &Node {
		self.node(0)
	}

	/// The ancestor at `depth`.
	pub fn node(&self, depth: usize) -> &Node {
		&self.path[depth].node
	}

	/// The index into the ancestor at `depth`.
	pub fn index(&self, depth: usize) -> usize {
		self.path[depth].index
	}

	/// The index pointing after this position in the ancestor at `depth`.
	pub fn index_after(&self, depth: usize) -> usize {
		self.index(depth) + usize::from(!(depth == self.depth() && self.text_offset() == 0))
	}

	/// Start of the content of the ancestor at `depth`.
	pub fn start(&self, depth: usize) -> usize {
		if depth == 0 { 0 } else { self.path[depth - 1].offset + 1 }
	}

	/// End of the content of the ancestor at `depth`.
	pub fn end(&self, depth: usize) -> usize {
		self.start(depth) + self.node(depth).content().size()
	}

	/// Position before the ancestor at `depth`. `depth` may be one more than
	/// [`ResolvedPos::depth`], meaning the position itself.
	pub fn before(&self, depth: usize) -> Result<usize> {
		if depth == 0 {
			return Err(ModelError::Range("There is no position before the top-level node".into()));
		}
		Ok(self.pos_before(depth))
	}

	/// Position after the ancestor at `depth`.
	pub fn after(&self, depth: usize) -> Result<usize> {
		if depth == 0 {
			return Err(ModelError::Range("There is no position after the top-level node".into()));
		}
		Ok(self.pos_after(depth))
	}

	/// [`ResolvedPos::before`] for `depth >= 1`.
	pub(crate) fn pos_before(&self, depth: usize) -> usize {
		if depth == self.depth() + 1 {
			self.pos
		} else {
			self.path[depth - 1].offset
		}
	}

	/// [`ResolvedPos::after`] for `depth >= 1`.
	pub(crate) fn pos_after(&self, depth: usize) -> usize {
		if depth == self.depth() + 1 {
			self.pos
		} else {
			self.path[depth - 1].offset + self.path[depth].node.node_size()
		}
	}

	/// Offset into the text node the position points into, or zero.
	pub fn text_offset(&self) -> usize {
		self.pos - self.path[self.depth()].offset
	}

	/// The node directly after the position, cut when inside text.
	pub fn node_after(&self) -> Option<Node> {
		let parent = self.parent();
		let index = self.index(self.depth());
		let child = parent.maybe_child(index)?;
		let d_off = self.text_offset();
		if d_off > 0 {
			Some(child.cut(d_off, child.node_size()))
		} else {
			Some(child.clone())
		}
	}

	/// The node directly before the position, cut when inside text.
	pub fn node_before(&self) -> Option<Node> {
		let index = self.index(self.depth());
		let d_off = self.text_offset();
		if d_off > 0 {
			return Some(self.parent().child(index).cut(0, d_off));
		}
		if index == 0 {
			None
		} else {
			Some(self.parent().child(index - 1).clone())
		}
	}

	/// Position of child `index` in the ancestor at `depth`.
	pub fn pos_at_index(&self, index: usize, depth: usize) -> usize {
		let node = self.node(depth);
		let mut pos = self.start(depth);
		for i in 0..index {
			pos += node.child(i).node_size();
		}
		pos
	}

	/// Marks that text inserted at this position would get.
	///
	/// Inside text these are the text's marks. At a boundary, the marks of the
	/// node before (or after, at the start of the parent) are used, minus
	/// non-inclusive marks the other side doesn't share.
	pub fn marks(&self) -> MarkSet {
		let parent = self.parent();
		let index = self.index(self.depth());
		if parent.content().size() == 0 {
			return Mark::none();
		}
		if self.text_offset() > 0 {
			return parent.child(index).marks().iter().cloned().collect();
		}
		let mut main = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
		let mut other = parent.maybe_child(index);
		if main.is_none() {
			std::mem::swap(&mut main, &mut other);
		}
		let Some(main) = main else {
			return Mark::none();
		};
		strip_exclusive(main.marks(), other)
	}

	/// Marks to keep when deleting from here to `end`, or `None` when no
	/// inline node follows this position.
	pub fn marks_across(&self, end: &ResolvedPos) -> Option<MarkSet> {
		let after = self.parent().maybe_child(self.index(self.depth()))?;
		if !after.is_inline() {
			return None;
		}
		let next = end.parent().maybe_child(end.index(end.depth()));
		Some(strip_exclusive(after.marks(), next))
	}

	/// Depth of the deepest ancestor that contains both this position and
	/// `pos`.
	pub fn shared_depth(&self, pos: usize) -> usize {
		(1..=self.depth())
			.rev()
			.find(|&d| self.start(d) <= pos && self.end(d) >= pos)
			.unwrap_or(0)
	}

	/// The block range around this position and `other`.
	pub fn block_range(&self, other: Option<&ResolvedPos>) -> Option<NodeRange> {
		self.block_range_where(other, |_| true)
	}

	/// Like [`ResolvedPos::block_range`], only accepting parents for which
	/// `pred` holds.
	pub fn block_range_where(&self, other: Option<&ResolvedPos>, pred: impl Fn(&Node) -> bool) -> Option<NodeRange> {
		let other = other.unwrap_or(self);
		if other.pos < self.pos {
			return other.block_range_where(Some(self), pred);
		}
		let skip = usize::from(self.parent().inline_content() || self.pos == other.pos);
		let top = self.depth().checked_sub(skip)?;
		(0..=top)
			.rev()
			.find(|&d| other.pos <= self.end(d) && pred(self.node(d)))
			.map(|d| NodeRange::new(self.clone(), other.clone(), d))
	}

	/// Returns true if both positions share a parent node.
	pub fn same_parent(&self, other: &ResolvedPos) -> bool {
		self.pos - self.parent_offset == other.pos - other.parent_offset
	}

	/// The greater of two positions.
	pub fn max<'a>(&'a self, other: &'a ResolvedPos) -> &'a ResolvedPos {
		if other.pos > self.pos { other } else { self }
	}

	/// The smaller of two positions.
	pub fn min<'a>(&'a self, other: &'a ResolvedPos) -> &'a ResolvedPos {
		if other.pos < self.pos { other } else { self }
	}
}

fn strip_exclusive(marks: &[Mark], other: Option<&Node>) -> MarkSet {
	marks
		.iter()
		.filter(|m| m.mark_type().is_inclusive() || other.is_some_and(|o| m.is_in_set(o.marks())))
		.cloned()
		.collect()
}

impl fmt::Display for ResolvedPos {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for d in 1..=self.depth() {
			if d > 1 {
				f.write_str("/")?;
			}
			write!(f, "{}_{}", self.node(d).node_type().name(), self.index(d - 1))?;
		}
		write!(f, ":{}", self.parent_offset)
	}
}

impl fmt::Debug for ResolvedPos {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ResolvedPos({} {self})", self.pos)
	}
}

/// A flat range of sibling block content.
#[derive(Debug, Clone)]
pub struct NodeRange {
	from: ResolvedPos,
	to: ResolvedPos,
	depth: usize,
}

impl NodeRange {
	pub fn new(from: ResolvedPos, to: ResolvedPos, depth: usize) -> NodeRange {
		NodeRange { from, to, depth }
	}

	/// The position the range was created from.
	pub fn from(&self) -> &ResolvedPos {
		&self.from
	}

	/// The position the range was created to.
	pub fn to(&self) -> &ResolvedPos {
		&self.to
	}

	/// Depth of the node that the range points into.
	pub fn depth(&self) -> usize {
		self.depth
	}

	/// Position at the start of the range.
	pub fn start(&self) -> usize {
		self.from.pos_before(self.depth + 1)
	}

	/// Position at the end of the range.
	pub fn end(&self) -> usize {
		self.to.pos_after(self.depth + 1)
	}

	/// The parent node of the range.
	pub fn parent(&self) -> &Node {
		self.from.node(self.depth)
	}

	pub fn start_index(&self) -> usize {
		self.from.index(self.depth)
	}

	pub fn end_index(&self) -> usize {
		self.to.index_after(self.depth)
	}
}

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(12) {
	Some(n) => n,
	None => unreachable!(),
};

/// A bounded cache of resolved positions for one document.
///
/// Owned by whoever holds the document; drop it together with the document.
pub struct ResolveCache {
	doc: Node,
	entries: LruCache<usize, ResolvedPos>,
}

impl ResolveCache {
	pub fn new(doc: Node) -> ResolveCache {
		ResolveCache {
			doc,
			entries: LruCache::new(CACHE_CAPACITY),
		}
	}

	/// The document positions are resolved against.
	pub fn doc(&self) -> &Node {
		&self.doc
	}

	/// Resolves `pos`, reusing a cached result when available.
	pub fn resolve(&mut self, pos: usize) -> Result<ResolvedPos> {
		if let Some(hit) = self.entries.get(&pos) {
			trace!(pos, "resolve cache hit");
			return Ok(hit.clone());
		}
		let resolved = ResolvedPos::resolve(&self.doc, pos)?;
		self.entries.put(pos, resolved.clone());
		Ok(resolved)
	}

	/// Number of cached positions.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
