use std::fmt;

use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::attrs::Attrs;
use crate::error::{ModelError, Result};
use crate::schema::{MarkType, Schema};

/// An ordered set of marks, sorted by mark type rank.
pub type MarkSet = SmallVec<[Mark; 2]>;

/// Inline decoration attached to a node, such as emphasis or a link.
#[derive(Clone)]
pub struct Mark {
	ty: MarkType,
	attrs: Attrs,
}

impl Mark {
	pub(crate) fn new(ty: MarkType, attrs: Attrs) -> Self {
		Self { ty, attrs }
	}

	/// The mark's type.
	pub fn mark_type(&self) -> &MarkType {
		&self.ty
	}

	/// The mark's attributes.
	pub fn attrs(&self) -> &Attrs {
		&self.attrs
	}

	/// Adds this mark to `set`, keeping rank order.
	///
	/// Returns `set` unchanged if the mark is already present or excluded by a
	/// mark in the set. Marks that this one excludes are dropped.
	pub fn add_to_set(&self, set: &[Mark]) -> MarkSet {
		let mut copy: Option<MarkSet> = None;
		let mut placed = false;
		for (i, other) in set.iter().enumerate() {
			if self == other {
				return set.iter().cloned().collect();
			}
			if self.ty.excludes(&other.ty) {
				copy.get_or_insert_with(|| set[..i].iter().cloned().collect());
			} else if other.ty.excludes(&self.ty) {
				return set.iter().cloned().collect();
			} else {
				if !placed && other.ty.rank() > self.ty.rank() {
					copy.get_or_insert_with(|| set[..i].iter().cloned().collect()).push(self.clone());
					placed = true;
				}
				if let Some(copy) = copy.as_mut() {
					copy.push(other.clone());
				}
			}
		}
		let mut copy = copy.unwrap_or_else(|| set.iter().cloned().collect());
		if !placed {
			copy.push(self.clone());
		}
		copy
	}

	/// Returns `set` without this mark.
	pub fn remove_from_set(&self, set: &[Mark]) -> MarkSet {
		set.iter().filter(|m| *m != self).cloned().collect()
	}

	/// Returns true if this mark is in `set`.
	pub fn is_in_set(&self, set: &[Mark]) -> bool {
		set.iter().any(|m| m == self)
	}

	/// Returns true if both sets hold equal marks in the same order.
	pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
		a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
	}

	/// Builds a properly sorted mark set.
	pub fn set_from(marks: &[Mark]) -> MarkSet {
		let mut set: MarkSet = marks.iter().cloned().collect();
		set.sort_by_key(|m| m.ty.rank());
		set
	}

	/// The empty mark set.
	pub fn none() -> MarkSet {
		MarkSet::new()
	}

	/// Serializes as `{"type": name, "attrs": {...}}`, omitting empty attrs.
	pub fn to_json(&self) -> Value {
		let mut obj = Map::new();
		obj.insert("type".into(), Value::String(self.ty.name().to_string()));
		if !self.attrs.is_empty() {
			obj.insert("attrs".into(), self.attrs.to_json());
		}
		Value::Object(obj)
	}

	/// Deserializes a mark, validating its attributes.
	pub fn from_json(schema: &Schema, json: &Value) -> Result<Mark> {
		let Some(name) = json.get("type").and_then(Value::as_str) else {
			return Err(ModelError::json("invalid input for Mark::from_json"));
		};
		let ty = schema.mark_type_checked(name)?;
		let attrs = match json.get("attrs") {
			None => None,
			Some(value) => Some(Attrs::from_json(value).ok_or_else(|| ModelError::json("mark attrs must be an object"))?),
		};
		let mark = ty.create(attrs.as_ref())?;
		ty.check_attrs(mark.attrs())?;
		Ok(mark)
	}
}

impl PartialEq for Mark {
	fn eq(&self, other: &Self) -> bool {
		self.ty == other.ty && self.attrs == other.attrs
	}
}

impl Eq for Mark {}

impl fmt::Debug for Mark {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.attrs.is_empty() {
			write!(f, "{}", self.ty.name())
		} else {
			write!(f, "{}{:?}", self.ty.name(), self.attrs)
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::test_builder::{mark, schema};

	fn link(href: &str) -> Mark {
		schema()
			.mark("link", Some(&Attrs::from_pairs([("href", json!(href))])))
			.unwrap()
	}

	#[test]
	fn add_keeps_rank_order() {
		let set = mark("strong").add_to_set(&[]);
		let set = mark("em").add_to_set(&set);
		let set = link("/a").add_to_set(&set);
		let names: Vec<_> = set.iter().map(|m| m.mark_type().name()).collect();
		assert_eq!(names, ["link", "em", "strong"]);
		assert_eq!(mark("em").add_to_set(&set).len(), 3);
	}

	#[test]
	fn same_type_replaces_previous_mark() {
		let set = link("/a").add_to_set(&[mark("em")]);
		let set = link("/b").add_to_set(&set);
		assert_eq!(set.len(), 2);
		assert_eq!(set[0].attrs().get("href"), Some(&json!("/b")));
	}

	#[test]
	fn remove_and_membership() {
		let set = Mark::set_from(&[mark("strong"), mark("em")]);
		assert!(mark("em").is_in_set(&set));
		let removed = mark("em").remove_from_set(&set);
		assert!(Mark::same_set(&removed, &[mark("strong")]));
		assert!(!Mark::same_set(&set, &removed));
		assert_eq!(mark("code").remove_from_set(&set).len(), 2);
	}

	#[test]
	fn json_round_trip() {
		let m = link("/docs");
		let json = m.to_json();
		assert_eq!(json, json!({"type": "link", "attrs": {"href": "/docs", "title": null}}));
		assert_eq!(Mark::from_json(&schema(), &json).unwrap(), m);
		assert_eq!(mark("em").to_json(), json!({"type": "em"}));
		assert!(Mark::from_json(&schema(), &json!({"type": "link"})).is_err());
		assert!(Mark::from_json(&schema(), &json!({"type": "blink"})).is_err());
	}
}
