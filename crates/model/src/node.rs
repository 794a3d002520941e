use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::attrs::Attrs;
use crate::content::ContentMatch;
use crate::error::{ModelError, Result};
use crate::fragment::Fragment;
use crate::mark::{Mark, MarkSet};
use crate::replace;
use crate::resolve::ResolvedPos;
use crate::schema::{MarkType, NodeType, Schema};
use crate::slice::Slice;

#[cfg(test)]
mod tests;

struct NodeInner {
	ty: NodeType,
	attrs: Attrs,
	content: Fragment,
	marks: MarkSet,
	text: Option<Box<str>>,
	/// Length of `text` in chars.
	text_len: usize,
}

/// A node in a document tree.
///
/// Nodes are persistent values: every modification returns a new node that
/// shares unchanged subtrees with the old one. Cloning is an `Arc` bump.
///
/// Positions inside a node count one unit per character of text, one unit for
/// each leaf node, and two units (opening and closing token) around the
/// content of every other node.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

/// Result of [`Node::child_after`] and [`Node::child_before`].
#[derive(Debug, Clone, Copy)]
pub struct ChildAt<'a> {
	/// The child, if there is one.
	pub node: Option<&'a Node>,
	/// Index of the child.
	pub index: usize,
	/// Offset of the child's start.
	pub offset: usize,
}

/// Returns the chars `from..to` of `text`.
pub(crate) fn slice_chars(text: &str, from: usize, to: usize) -> &str {
	let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
	let start = indices.nth(from).unwrap_or(text.len());
	let end = if to > from {
		indices.nth(to - from - 1).unwrap_or(text.len())
	} else {
		start
	};
	&text[start..end]
}

impl Node {
	pub(crate) fn new(ty: NodeType, attrs: Attrs, content: Fragment, marks: MarkSet) -> Node {
		Node(Arc::new(NodeInner {
			ty,
			attrs,
			content,
			marks,
			text: None,
			text_len: 0,
		}))
	}

	pub(crate) fn new_text(ty: NodeType, attrs: Attrs, text: Box<str>, marks: MarkSet) -> Node {
		let text_len = text.chars().count();
		Node(Arc::new(NodeInner {
			ty,
			attrs,
			content: Fragment::empty(),
			marks,
			text: Some(text),
			text_len,
		}))
	}

	/// Returns true if both values are the same allocation.
	pub fn ptr_eq(&self, other: &Node) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	pub fn node_type(&self) -> &NodeType {
		&self.0.ty
	}

	pub fn attrs(&self) -> &Attrs {
		&self.0.attrs
	}

	pub fn content(&self) -> &Fragment {
		&self.0.content
	}

	pub fn marks(&self) -> &[Mark] {
		&self.0.marks
	}

	/// Text of a text node.
	pub fn text(&self) -> Option<&str> {
		self.0.text.as_deref()
	}

	/// Size of the node in the position scheme.
	pub fn node_size(&self) -> usize {
		if self.0.text.is_some() {
			self.0.text_len
		} else if self.is_leaf() {
			1
		} else {
			2 + self.0.content.size()
		}
	}

	pub fn child_count(&self) -> usize {
		self.0.content.child_count()
	}

	/// The child at `index`.
	///
	/// # Panics
	///
	/// Panics if `index` is out of range.
	pub fn child(&self, index: usize) -> &Node {
		self.0.content.child(index)
	}

	pub fn maybe_child(&self, index: usize) -> Option<&Node> {
		self.0.content.maybe_child(index)
	}

	pub fn first_child(&self) -> Option<&Node> {
		self.0.content.first_child()
	}

	pub fn last_child(&self) -> Option<&Node> {
		self.0.content.last_child()
	}

	/// Calls `f` with each child, its offset and its index.
	pub fn for_each(&self, f: impl FnMut(&Node, usize, usize)) {
		self.0.content.for_each(f)
	}

	/// Calls `f` for every descendant overlapping `from..to` (relative to the
	/// start of this node's content). Return false to skip a node's children.
	pub fn nodes_between(&self, from: usize, to: usize, mut f: impl FnMut(&Node, usize, Option<&Node>, usize) -> bool) {
		self.0.content.nodes_between_inner(from, to, &mut f, 0, Some(self));
	}

	/// Calls `f` for every descendant.
	pub fn descendants(&self, f: impl FnMut(&Node, usize, Option<&Node>, usize) -> bool) {
		self.nodes_between(0, self.0.content.size(), f);
	}

	/// Concatenated text of the node and its descendants.
	pub fn text_content(&self) -> String {
		if let Some(text) = self.text() {
			return text.to_string();
		}
		if self.is_leaf()
			&& let Some(leaf) = &self.node_type().spec().leaf_text
		{
			return leaf.clone();
		}
		self.text_between(0, self.0.content.size(), Some(""), None)
	}

	/// Text between two content offsets; see [`Fragment::text_between`].
	pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>, leaf_text: Option<&str>) -> String {
		if let Some(text) = self.text() {
			return slice_chars(text, from, to).to_string();
		}
		self.0.content.text_between(from, to, block_separator, leaf_text)
	}

	/// Returns true if both nodes have the same type, attributes and marks.
	pub fn same_markup(&self, other: &Node) -> bool {
		self.has_markup(other.node_type(), Some(other.attrs()), other.marks())
	}

	/// Compares type, attributes and marks. Missing attrs mean the type's
	/// defaults.
	pub fn has_markup(&self, ty: &NodeType, attrs: Option<&Attrs>, marks: &[Mark]) -> bool {
		if self.node_type() != ty {
			return false;
		}
		let attrs_equal = match attrs.or(ty.default_attrs()) {
			Some(attrs) => self.attrs() == attrs,
			None => self.attrs().is_empty(),
		};
		attrs_equal && Mark::same_set(self.marks(), marks)
	}

	/// A node with the same markup and different content.
	pub fn copy(&self, content: Fragment) -> Node {
		if content.ptr_eq(self.content()) || self.is_text() {
			return self.clone();
		}
		Node::new(self.0.ty.clone(), self.0.attrs.clone(), content, self.0.marks.clone())
	}

	/// A node with the same content and different marks.
	pub fn mark(&self, marks: &[Mark]) -> Node {
		if Mark::same_set(marks, self.marks()) {
			return self.clone();
		}
		let marks: MarkSet = marks.iter().cloned().collect();
		match &self.0.text {
			Some(text) => Node::new_text(self.0.ty.clone(), self.0.attrs.clone(), text.clone(), marks),
			None => Node::new(self.0.ty.clone(), self.0.attrs.clone(), self.0.content.clone(), marks),
		}
	}

	/// A text node with the same markup and different text. Returns the node
	/// unchanged when it is not a text node.
	pub fn with_text(&self, text: &str) -> Node {
		match self.text() {
			Some(current) if current != text => {
				Node::new_text(self.0.ty.clone(), self.0.attrs.clone(), text.into(), self.0.marks.clone())
			}
			_ => self.clone(),
		}
	}

	/// The part of the node between two content offsets (chars for text).
	pub fn cut(&self, from: usize, to: usize) -> Node {
		if let Some(text) = self.text() {
			if from == 0 && to == self.0.text_len {
				return self.clone();
			}
			return self.with_text(slice_chars(text, from, to));
		}
		if from == 0 && to == self.0.content.size() {
			return self.clone();
		}
		self.copy(self.0.content.cut(from, to))
	}

	/// The slice between two positions. With `include_parents` the slice is
	/// opened all the way to the root.
	pub fn slice(&self, from: usize, to: usize, include_parents: bool) -> Result<Slice> {
		if from == to {
			return Ok(Slice::empty());
		}
		let rfrom = self.resolve(from)?;
		let rto = self.resolve(to)?;
		let depth = if include_parents { 0 } else { rfrom.shared_depth(to) };
		let start = rfrom.start(depth);
		let node = rfrom.node(depth);
		let content = node.content().cut(rfrom.pos() - start, rto.pos() - start);
		Ok(Slice::new(content, rfrom.depth() - depth, rto.depth() - depth))
	}

	/// Replaces `from..to` with `slice`, failing with a
	/// [`ModelError::Replace`] if the result would violate the schema.
	pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node> {
		replace::replace(&self.resolve(from)?, &self.resolve(to)?, slice)
	}

	/// The node directly after `pos`.
	pub fn node_at(&self, pos: usize) -> Option<&Node> {
		let mut node = self;
		let mut pos = pos;
		loop {
			let (index, offset) = node.content().find_index(pos, false).ok()?;
			let child = node.maybe_child(index)?;
			if offset == pos || child.is_text() {
				return Some(child);
			}
			pos -= offset + 1;
			node = child;
		}
	}

	/// The direct child starting at or containing `pos`.
	pub fn child_after(&self, pos: usize) -> Result<ChildAt<'_>> {
		let (index, offset) = self.content().find_index(pos, false)?;
		Ok(ChildAt {
			node: self.maybe_child(index),
			index,
			offset,
		})
	}

	/// The direct child ending at or containing `pos`.
	pub fn child_before(&self, pos: usize) -> Result<ChildAt<'_>> {
		if pos == 0 {
			return Ok(ChildAt {
				node: None,
				index: 0,
				offset: 0,
			});
		}
		let (index, offset) = self.content().find_index(pos, false)?;
		if offset < pos {
			return Ok(ChildAt {
				node: Some(self.child(index)),
				index,
				offset,
			});
		}
		let prev = index.checked_sub(1).ok_or(ModelError::PositionOutOfRange { pos })?;
		let node = self.content().try_child(prev)?;
		Ok(ChildAt {
			node: Some(node),
			index: prev,
			offset: offset - node.node_size(),
		})
	}

	/// Resolves a position in this node's content.
	pub fn resolve(&self, pos: usize) -> Result<ResolvedPos> {
		ResolvedPos::resolve(self, pos)
	}

	/// Returns true if any node in `from..to` carries a mark of `mark_type`.
	pub fn range_has_mark(&self, from: usize, to: usize, mark_type: &MarkType) -> bool {
		let mut found = false;
		if to > from {
			self.nodes_between(from, to, |node, _, _, _| {
				if mark_type.is_in_set(node.marks()).is_some() {
					found = true;
				}
				!found
			});
		}
		found
	}

	pub fn is_block(&self) -> bool {
		self.0.ty.is_block()
	}

	pub fn is_textblock(&self) -> bool {
		self.0.ty.is_textblock()
	}

	pub fn inline_content(&self) -> bool {
		self.0.ty.inline_content()
	}

	pub fn is_inline(&self) -> bool {
		self.0.ty.is_inline()
	}

	pub fn is_text(&self) -> bool {
		self.0.text.is_some()
	}

	pub fn is_leaf(&self) -> bool {
		self.0.ty.is_leaf()
	}

	pub fn is_atom(&self) -> bool {
		self.0.ty.is_atom()
	}

	/// The content match state after the first `index` children.
	pub fn content_match_at(&self, index: usize) -> Result<ContentMatch> {
		self.0
			.ty
			.content_match()
			.match_fragment_range(self.content(), 0, index)
			.ok_or(ModelError::InvalidContentMatch)
	}

	/// Whether replacing children `from..to` with `replacement` leaves valid
	/// content. Nodes whose existing content is already invalid allow nothing.
	pub fn can_replace(&self, from: usize, to: usize, replacement: &Fragment) -> bool {
		self.can_replace_range(from, to, replacement, 0, replacement.child_count())
	}

	/// Like [`Node::can_replace`], using only `replacement`'s children
	/// `start..end`.
	pub fn can_replace_range(&self, from: usize, to: usize, replacement: &Fragment, start: usize, end: usize) -> bool {
		let Ok(at) = self.content_match_at(from) else {
			return false;
		};
		let valid = at
			.match_fragment_range(replacement, start, end)
			.and_then(|one| one.match_fragment_range(self.content(), to, self.child_count()))
			.is_some_and(|two| two.valid_end());
		valid && (start..end).all(|i| self.0.ty.allows_marks(replacement.child(i).marks()))
	}

	/// Whether children `from..to` can be replaced by a node of type `ty`.
	pub fn can_replace_with(&self, from: usize, to: usize, ty: &NodeType, marks: Option<&[Mark]>) -> bool {
		if let Some(marks) = marks
			&& !self.0.ty.allows_marks(marks)
		{
			return false;
		}
		let Ok(at) = self.content_match_at(from) else {
			return false;
		};
		at.match_type(ty)
			.and_then(|start| start.match_fragment_range(self.content(), to, self.child_count()))
			.is_some_and(|end| end.valid_end())
	}

	/// Whether `other`'s content may be appended to this node.
	pub fn can_append(&self, other: &Node) -> bool {
		if other.content().size() > 0 {
			self.can_replace(self.child_count(), self.child_count(), other.content())
		} else {
			self.0.ty.compatible_content(other.node_type())
		}
	}

	/// Validates content, attributes and marks of this node and all of its
	/// descendants.
	pub fn check(&self) -> Result<()> {
		self.0.ty.check_content(self.content())?;
		self.0.ty.check_attrs(self.attrs())?;
		let mut copy = Mark::none();
		for mark in self.marks() {
			mark.mark_type().check_attrs(mark.attrs())?;
			copy = mark.add_to_set(&copy);
		}
		if !Mark::same_set(&copy, self.marks()) {
			return Err(ModelError::InvalidMarks {
				node_type: self.0.ty.name().to_string(),
				marks: self.marks().iter().map(|m| m.mark_type().name()).collect::<Vec<_>>().join(","),
			});
		}
		self.content().iter().try_for_each(Node::check)
	}

	/// Serializes the node.
	pub fn to_json(&self) -> Value {
		let mut obj = Map::new();
		obj.insert("type".into(), Value::String(self.0.ty.name().to_string()));
		if !self.0.attrs.is_empty() {
			obj.insert("attrs".into(), self.0.attrs.to_json());
		}
		if self.content().size() > 0 {
			obj.insert("content".into(), self.content().to_json());
		}
		if !self.0.marks.is_empty() {
			obj.insert("marks".into(), Value::Array(self.0.marks.iter().map(Mark::to_json).collect()));
		}
		if let Some(text) = self.text() {
			obj.insert("text".into(), Value::String(text.to_string()));
		}
		Value::Object(obj)
	}

	/// Deserializes a node, validating attributes.
	pub fn from_json(schema: &Schema, json: &Value) -> Result<Node> {
		let Some(obj) = json.as_object() else {
			return Err(ModelError::json("invalid input for Node::from_json"));
		};
		let marks = match obj.get("marks") {
			None | Some(Value::Null) => Vec::new(),
			Some(Value::Array(items)) => items.iter().map(|m| Mark::from_json(schema, m)).collect::<Result<_>>()?,
			Some(_) => return Err(ModelError::json("invalid mark data for Node::from_json")),
		};
		let Some(ty) = obj.get("type").and_then(Value::as_str) else {
			return Err(ModelError::json("node JSON is missing its type"));
		};
		if ty == "text" {
			let Some(text) = obj.get("text").and_then(Value::as_str) else {
				return Err(ModelError::json("invalid text node in JSON"));
			};
			return schema.text(text, &marks);
		}
		let content = Fragment::from_json(schema, obj.get("content").unwrap_or(&Value::Null))?;
		let attrs = match obj.get("attrs") {
			None => None,
			Some(value) => Some(Attrs::from_json(value).ok_or_else(|| ModelError::json("node attrs must be an object"))?),
		};
		let node = schema.node_type_checked(ty)?.create(attrs.as_ref(), content, &marks)?;
		node.node_type().check_attrs(node.attrs())?;
		Ok(node)
	}
}

impl PartialEq for Node {
	fn eq(&self, other: &Self) -> bool {
		if self.ptr_eq(other) {
			return true;
		}
		if !self.same_markup(other) {
			return false;
		}
		match (self.text(), other.text()) {
			(Some(a), Some(b)) => a == b,
			(None, None) => self.content() == other.content(),
			_ => false,
		}
	}
}

impl Eq for Node {}

fn wrap_marks(marks: &[Mark], body: String) -> String {
	marks.iter().rev().fold(body, |s, m| format!("{}({s})", m.mark_type().name()))
}

impl fmt::Display for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let body = match self.text() {
			Some(text) => Value::String(text.to_string()).to_string(),
			None if self.content().size() > 0 => {
				let mut inner = String::new();
				for (i, child) in self.content().iter().enumerate() {
					if i > 0 {
						inner.push_str(", ");
					}
					inner.push_str(&child.to_string());
				}
				format!("{}({inner})", self.node_type().name())
			}
			None => self.node_type().name().to_string(),
		};
		f.write_str(&wrap_marks(self.marks(), body))
	}
}

impl fmt::Debug for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}
