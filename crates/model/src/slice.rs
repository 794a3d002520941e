use std::fmt;

use serde_json::{Map, Value};

use crate::error::{ModelError, Result};
use crate::fragment::Fragment;
use crate::node::Node;
use crate::schema::Schema;

/// A piece cut out of a document.
///
/// `open_start` and `open_end` count how many levels of nodes are torn open
/// at either side. Slicing `2..6` out of
/// `doc(paragraph("ab"), paragraph("cd"))` gives
/// `<paragraph("b"), paragraph("c")>`, open one level on both sides.
#[derive(Clone, PartialEq, Eq)]
pub struct Slice {
	content: Fragment,
	open_start: usize,
	open_end: usize,
}

impl Slice {
	pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Slice {
		Slice {
			content,
			open_start,
			open_end,
		}
	}

	/// The empty slice.
	pub fn empty() -> Slice {
		Slice::new(Fragment::empty(), 0, 0)
	}

	pub fn content(&self) -> &Fragment {
		&self.content
	}

	pub fn open_start(&self) -> usize {
		self.open_start
	}

	pub fn open_end(&self) -> usize {
		self.open_end
	}

	/// The size the slice adds when inserted.
	pub fn size(&self) -> usize {
		self.content.size() - self.open_start - self.open_end
	}

	/// Inserts `fragment` at `pos` (relative to the slice's start). Returns
	/// `None` when the content would be invalid for the enclosing node.
	pub fn insert_at(&self, pos: usize, fragment: &Fragment) -> Result<Option<Slice>> {
		Ok(insert_into(&self.content, pos + self.open_start, fragment, None)?
			.map(|content| Slice::new(content, self.open_start, self.open_end)))
	}

	/// Removes `from..to`, which must be a flat range.
	pub fn remove_between(&self, from: usize, to: usize) -> Result<Slice> {
		Ok(Slice::new(
			remove_range(&self.content, from + self.open_start, to + self.open_start)?,
			self.open_start,
			self.open_end,
		))
	}

	/// A slice of `fragment` opened as deep as possible on both sides. With
	/// `open_isolating` false, opening stops at isolating nodes.
	pub fn max_open(fragment: Fragment, open_isolating: bool) -> Slice {
		let can_open = |n: &Node| !n.is_leaf() && (open_isolating || !n.node_type().spec().isolating);
		let mut open_start = 0;
		let mut n = fragment.first_child();
		while let Some(node) = n.filter(|n| can_open(n)) {
			open_start += 1;
			n = node.first_child();
		}
		let mut open_end = 0;
		let mut n = fragment.last_child();
		while let Some(node) = n.filter(|n| can_open(n)) {
			open_end += 1;
			n = node.last_child();
		}
		Slice::new(fragment, open_start, open_end)
	}

	/// Serializes the slice, or `null` when it is empty.
	pub fn to_json(&self) -> Value {
		if self.content.size() == 0 {
			return Value::Null;
		}
		let mut obj = Map::new();
		obj.insert("content".into(), self.content.to_json());
		if self.open_start > 0 {
			obj.insert("openStart".into(), self.open_start.into());
		}
		if self.open_end > 0 {
			obj.insert("openEnd".into(), self.open_end.into());
		}
		Value::Object(obj)
	}

	/// Deserializes a slice. `null` yields the empty slice.
	pub fn from_json(schema: &Schema, json: &Value) -> Result<Slice> {
		if json.is_null() {
			return Ok(Slice::empty());
		}
		let open = |key: &str| -> Result<usize> {
			match json.get(key) {
				None | Some(Value::Null) => Ok(0),
				Some(value) => value
					.as_u64()
					.map(|n| n as usize)
					.ok_or_else(|| ModelError::json("invalid input for Slice::from_json")),
			}
		};
		let content = Fragment::from_json(schema, json.get("content").unwrap_or(&Value::Null))?;
		Ok(Slice::new(content, open("openStart")?, open("openEnd")?))
	}
}

impl Default for Slice {
	fn default() -> Self {
		Self::empty()
	}
}

impl fmt::Display for Slice {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}({},{})", self.content, self.open_start, self.open_end)
	}
}

impl fmt::Debug for Slice {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

fn remove_range(content: &Fragment, from: usize, to: usize) -> Result<Fragment> {
	let (index, offset) = content.find_index(from, false)?;
	let (index_to, offset_to) = content.find_index(to, false)?;
	let child = content.maybe_child(index);
	if offset == from || child.is_some_and(Node::is_text) {
		if offset_to != to && !content.try_child(index_to)?.is_text() {
			return Err(ModelError::Range("Removing non-flat range".into()));
		}
		return Ok(content.cut(0, from).append(&content.cut_from(to)));
	}
	let child = content.try_child(index)?;
	if index != index_to {
		return Err(ModelError::Range("Removing non-flat range".into()));
	}
	let inner = remove_range(child.content(), from - offset - 1, to - offset - 1)?;
	Ok(content.replace_child(index, child.copy(inner)))
}

fn insert_into(content: &Fragment, dist: usize, insert: &Fragment, parent: Option<&Node>) -> Result<Option<Fragment>> {
	let (index, offset) = content.find_index(dist, false)?;
	let child = content.maybe_child(index);
	if offset == dist || child.is_some_and(Node::is_text) {
		if let Some(parent) = parent
			&& !parent.can_replace(index, index, insert)
		{
			return Ok(None);
		}
		return Ok(Some(content.cut(0, dist).append(insert).append(&content.cut_from(dist))));
	}
	let child = content.try_child(index)?;
	Ok(insert_into(child.content(), dist - offset - 1, insert, Some(child))?
		.map(|inner| content.replace_child(index, child.copy(inner))))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::test_builder::{blockquote, doc, hr, p, t};

	#[test]
	fn size_excludes_open_tokens() {
		let flat = doc(vec![p(vec![t("xaby")])]).slice(2, 4, false).unwrap();
		assert_eq!(flat.to_string(), r#"<"ab">(0,0)"#);
		assert_eq!(flat.size(), 2);

		let slice = doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]).slice(2, 6, false).unwrap();
		assert_eq!(slice.to_string(), r#"<paragraph("b"), paragraph("c")>(1,1)"#);
		assert_eq!(slice.size(), 2);
		assert_eq!(Slice::empty().size(), 0);
	}

	#[test]
	fn insert_at_checks_parent_content() {
		let slice = doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]).slice(2, 6, false).unwrap();
		let inserted = slice.insert_at(1, &Fragment::from_node(t("Q"))).unwrap().unwrap();
		assert_eq!(inserted.to_string(), r#"<paragraph("bQ"), paragraph("c")>(1,1)"#);
		assert!(slice.insert_at(1, &Fragment::from_node(hr())).unwrap().is_none());
	}

	#[test]
	fn remove_between_requires_flat_range() {
		let slice = doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]).slice(2, 7, false).unwrap();
		assert_eq!(slice.remove_between(0, 1).unwrap().to_string(), r#"<paragraph, paragraph("cd")>(1,1)"#);
		assert_eq!(
			slice.remove_between(0, 3).unwrap_err(),
			ModelError::Range("Removing non-flat range".into())
		);
	}

	#[test]
	fn max_open_descends_both_sides() {
		let slice = Slice::max_open(Fragment::from_node(blockquote(vec![p(vec![t("x")])])), false);
		assert_eq!((slice.open_start(), slice.open_end()), (2, 2));
		let flat = Slice::max_open(Fragment::from_node(hr()), false);
		assert_eq!((flat.open_start(), flat.open_end()), (0, 0));
	}
}
