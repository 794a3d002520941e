use std::fmt;
use std::sync::{Arc, LazyLock};

use serde_json::Value;

use crate::diff;
use crate::error::{ModelError, Result};
use crate::node::{Node, slice_chars};
use crate::schema::Schema;


static EMPTY: LazyLock<Fragment> = LazyLock::new(|| Fragment {
	content: Arc::new(Vec::new()),
	size: 0,
});

/// An immutable sequence of sibling nodes with a cached total size.
#[derive(Clone)]
pub struct Fragment {
	content: Arc<Vec<Node>>,
	size: usize,
}

impl Fragment {
	/// The shared empty fragment.
	pub fn empty() -> Fragment {
		EMPTY.clone()
	}

	/// Builds a fragment without joining text nodes. Callers guarantee that
	/// adjacent text nodes already differ in markup.
	pub(crate) fn from_nodes(nodes: Vec<Node>) -> Fragment {
		if nodes.is_empty() {
			return Self::empty();
		}
		let size = nodes.iter().map(Node::node_size).sum();
		Fragment {
			content: Arc::new(nodes),
			size,
		}
	}

	/// Builds a fragment, joining adjacent text nodes with equal markup.
	pub fn from_array(nodes: Vec<Node>) -> Fragment {
		let mut joined: Vec<Node> = Vec::with_capacity(nodes.len());
		for node in nodes {
			if let Some(last) = joined.last_mut()
				&& node.is_text()
				&& last.same_markup(&node)
			{
				let text = format!("{}{}", last.text().unwrap_or_default(), node.text().unwrap_or_default());
				*last = last.with_text(&text);
				continue;
			}
			joined.push(node);
		}
		Self::from_nodes(joined)
	}

	/// A fragment holding one node.
	pub fn from_node(node: Node) -> Fragment {
		Self::from_nodes(vec![node])
	}

	/// Total size of the content.
	pub fn size(&self) -> usize {
		self.size
	}

	/// Number of children.
	pub fn child_count(&self) -> usize {
		self.content.len()
	}

	/// The children as a slice.
	pub fn children(&self) -> &[Node] {
		&self.content
	}

	/// Iterates over the children.
	pub fn iter(&self) -> std::slice::Iter<'_, Node> {
		self.content.iter()
	}

	/// The child at `index`.
	///
	/// # Panics
	///
	/// Panics if `index` is out of range; see [`Fragment::maybe_child`].
	pub fn child(&self, index: usize) -> &Node {
		&self.content[index]
	}

	/// The child at `index`, if any.
	pub fn maybe_child(&self, index: usize) -> Option<&Node> {
		self.content.get(index)
	}

	/// The child at `index`, or an index error.
	pub fn try_child(&self, index: usize) -> Result<&Node> {
		self.content.get(index).ok_or(ModelError::IndexOutOfRange {
			index,
			count: self.content.len(),
		})
	}

	pub fn first_child(&self) -> Option<&Node> {
		self.content.first()
	}

	pub fn last_child(&self) -> Option<&Node> {
		self.content.last()
	}

	/// Calls `f` with each child, its offset and its index.
	pub fn for_each(&self, mut f: impl FnMut(&Node, usize, usize)) {
		let mut pos = 0;
		for (i, child) in self.content.iter().enumerate() {
			f(child, pos, i);
			pos += child.node_size();
		}
	}

	/// Returns true if both fragments share storage.
	pub fn ptr_eq(&self, other: &Fragment) -> bool {
		Arc::ptr_eq(&self.content, &other.content)
	}

	/// Calls `f` for every node overlapping `from..to`, descending into a
	/// node's children unless `f` returns false. The callback receives the
	/// node, its absolute position, its parent and its index in the parent.
	pub fn nodes_between(&self, from: usize, to: usize, mut f: impl FnMut(&Node, usize, Option<&Node>, usize) -> bool) {
		self.nodes_between_inner(from, to, &mut f, 0, None);
	}

	pub(crate) fn nodes_between_inner(
		&self,
		from: usize,
		to: usize,
		f: &mut dyn FnMut(&Node, usize, Option<&Node>, usize) -> bool,
		node_start: usize,
		parent: Option<&Node>,
	) {
		let mut pos = 0;
		for (i, child) in self.content.iter().enumerate() {
			if pos >= to {
				break;
			}
			let end = pos + child.node_size();
			if end > from && f(child, node_start + pos, parent, i) && child.content().size() > 0 {
				let start = pos + 1;
				child.content().nodes_between_inner(
					from.saturating_sub(start),
					child.content().size().min(to.saturating_sub(start)),
					f,
					node_start + start,
					Some(child),
				);
			}
			pos = end;
		}
	}

	/// Calls `f` for every descendant node.
	pub fn descendants(&self, f: impl FnMut(&Node, usize, Option<&Node>, usize) -> bool) {
		self.nodes_between(0, self.size, f);
	}

	/// Extracts the text between two offsets. `block_separator` is inserted
	/// between block nodes; `leaf_text` overrides the text of leaf nodes.
	pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>, leaf_text: Option<&str>) -> String {
		let mut text = String::new();
		let mut first = true;
		self.nodes_between(from, to, |node, pos, _, _| {
			let node_text = if let Some(t) = node.text() {
				slice_chars(t, from.max(pos) - pos, to - pos).to_string()
			} else if !node.is_leaf() {
				String::new()
			} else if let Some(leaf) = leaf_text {
				leaf.to_string()
			} else {
				node.node_type().spec().leaf_text.clone().unwrap_or_default()
			};
			if ((node.is_block() && node.is_leaf() && !node_text.is_empty()) || node.is_textblock())
				&& let Some(sep) = block_separator
			{
				if first {
					first = false;
				} else {
					text.push_str(sep);
				}
			}
			text.push_str(&node_text);
			true
		});
		text
	}

	/// Concatenates two fragments, joining touching text nodes with equal
	/// markup.
	pub fn append(&self, other: &Fragment) -> Fragment {
		if other.size == 0 {
			return self.clone();
		}
		if self.size == 0 {
			return other.clone();
		}
		let mut content: Vec<Node> = self.content.to_vec();
		let mut rest = other.content.iter();
		if let (Some(last), Some(first)) = (content.last_mut(), other.first_child())
			&& last.is_text()
			&& last.same_markup(first)
		{
			let text = format!("{}{}", last.text().unwrap_or_default(), first.text().unwrap_or_default());
			*last = last.with_text(&text);
			rest.next();
		}
		content.extend(rest.cloned());
		Fragment {
			content: Arc::new(content),
			size: self.size + other.size,
		}
	}

	/// The content between `from` and `to`, cutting partially covered
	/// children. Returns `self` when the range spans the whole fragment.
	pub fn cut(&self, from: usize, to: usize) -> Fragment {
		if from == 0 && to == self.size {
			return self.clone();
		}
		let mut result = Vec::new();
		if to > from {
			let mut pos = 0;
			for child in self.content.iter() {
				if pos >= to {
					break;
				}
				let end = pos + child.node_size();
				if end > from {
					let child = if pos < from || end > to {
						if let Some(text) = child.text() {
							let len = text.chars().count();
							child.cut(from.saturating_sub(pos), len.min(to - pos))
						} else {
							child.cut(
								from.saturating_sub(pos + 1),
								child.content().size().min(to.saturating_sub(pos + 1)),
							)
						}
					} else {
						child.clone()
					};
					result.push(child);
				}
				pos = end;
			}
		}
		Self::from_nodes(result)
	}

	/// The content from `from` to the end.
	pub fn cut_from(&self, from: usize) -> Fragment {
		self.cut(from, self.size)
	}

	/// Children `from..to` as a new fragment.
	pub fn cut_by_index(&self, from: usize, to: usize) -> Fragment {
		if from == to {
			return Self::empty();
		}
		if from == 0 && to == self.content.len() {
			return self.clone();
		}
		Self::from_nodes(self.content[from..to].to_vec())
	}

	/// Replaces the child at `index`.
	pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
		let current = &self.content[index];
		if current.ptr_eq(&node) {
			return self.clone();
		}
		let size = self.size + node.node_size() - current.node_size();
		let mut copy = self.content.to_vec();
		copy[index] = node;
		Fragment {
			content: Arc::new(copy),
			size,
		}
	}

	/// Prepends a node.
	pub fn add_to_start(&self, node: Node) -> Fragment {
		let size = self.size + node.node_size();
		let mut content = Vec::with_capacity(self.content.len() + 1);
		content.push(node);
		content.extend(self.content.iter().cloned());
		Fragment {
			content: Arc::new(content),
			size,
		}
	}

	/// Appends a node.
	pub fn add_to_end(&self, node: Node) -> Fragment {
		let size = self.size + node.node_size();
		let mut content = self.content.to_vec();
		content.push(node);
		Fragment {
			content: Arc::new(content),
			size,
		}
	}

	/// Finds the child containing `pos`. Returns the child's index and its
	/// start offset. A position on a child boundary resolves to the child
	/// after it; with `round_up` a position inside a child resolves to the
	/// boundary after that child.
	pub fn find_index(&self, pos: usize, round_up: bool) -> Result<(usize, usize)> {
		if pos == 0 {
			return Ok((0, 0));
		}
		if pos == self.size {
			return Ok((self.content.len(), pos));
		}
		if pos > self.size {
			return Err(ModelError::OutsideFragment { pos, size: self.size });
		}
		let mut cur = 0;
		for (i, child) in self.content.iter().enumerate() {
			let end = cur + child.node_size();
			if end >= pos {
				if end == pos || round_up {
					return Ok((i + 1, end));
				}
				return Ok((i, cur));
			}
			cur = end;
		}
		Err(ModelError::OutsideFragment { pos, size: self.size })
	}

	/// The first position at which this fragment and `other` differ.
	pub fn find_diff_start(&self, other: &Fragment) -> Option<usize> {
		diff::find_diff_start(self, other, 0)
	}

	/// The last positions, in this fragment and in `other`, at which they
	/// differ.
	pub fn find_diff_end(&self, other: &Fragment) -> Option<(usize, usize)> {
		diff::find_diff_end(self, other, self.size, other.size)
	}

	/// Serializes as an array of nodes, or `null` when empty.
	pub fn to_json(&self) -> Value {
		if self.content.is_empty() {
			return Value::Null;
		}
		Value::Array(self.content.iter().map(Node::to_json).collect())
	}

	/// Deserializes a fragment. `null` yields the empty fragment.
	pub fn from_json(schema: &Schema, value: &Value) -> Result<Fragment> {
		match value {
			Value::Null => Ok(Self::empty()),
			Value::Array(items) => {
				let nodes = items.iter().map(|item| Node::from_json(schema, item)).collect::<Result<Vec<_>>>()?;
				Ok(Self::from_nodes(nodes))
			}
			_ => Err(ModelError::json("invalid input for Fragment::from_json")),
		}
	}

	pub(crate) fn fmt_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, child) in self.content.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			fmt::Display::fmt(child, f)?;
		}
		Ok(())
	}
}

impl Default for Fragment {
	fn default() -> Self {
		Self::empty()
	}
}

impl PartialEq for Fragment {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
			|| (self.content.len() == other.content.len() && self.content.iter().zip(other.content.iter()).all(|(a, b)| a == b))
	}
}

impl Eq for Fragment {}

impl From<Node> for Fragment {
	fn from(node: Node) -> Self {
		Self::from_node(node)
	}
}

impl From<Vec<Node>> for Fragment {
	fn from(nodes: Vec<Node>) -> Self {
		Self::from_array(nodes)
	}
}

impl<'a> IntoIterator for &'a Fragment {
	type Item = &'a Node;
	type IntoIter = std::slice::Iter<'a, Node>;

	fn into_iter(self) -> Self::IntoIter {
		self.content.iter()
	}
}

impl fmt::Display for Fragment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<")?;
		self.fmt_inner(f)?;
		f.write_str(">")
	}
}

impl fmt::Debug for Fragment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}
