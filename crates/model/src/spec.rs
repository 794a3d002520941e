//! Declarative schema descriptions.
//!
//! A [`SchemaSpec`] is plain configuration data. Hosts usually keep it in a
//! JSON or TOML file and hand it to [`Schema::new`](crate::Schema::new), which
//! compiles it into node types, mark types and content automata.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SchemaError;

/// A complete schema description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSpec {
	/// Node types in declaration order. Order matters: the first type of a
	/// group is the one used when content has to be generated.
	pub nodes: IndexMap<String, NodeSpec>,
	/// Mark types in declaration order. Order determines mark rank.
	pub marks: IndexMap<String, MarkSpec>,
	/// Name of the top-level node type. Defaults to `doc`.
	pub top_node: Option<String>,
}

/// Description of one node type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
	/// Content expression, e.g. `"paragraph block*"`. Absent means leaf.
	pub content: Option<String>,
	/// Allowed marks: `"_"` for all, `""` for none, or a space separated list
	/// of mark names and groups.
	pub marks: Option<String>,
	/// Space separated group names.
	pub group: Option<String>,
	/// Inline node (text and inline atoms).
	pub inline: bool,
	/// Treat a non-leaf node as a single unit.
	pub atom: bool,
	/// Attribute declarations.
	pub attrs: IndexMap<String, AttributeSpec>,
	/// Whether node selections may target this node. Defaults to true.
	pub selectable: Option<bool>,
	/// Whether the node may be dragged as a unit.
	pub draggable: bool,
	/// The node holds code.
	pub code: bool,
	/// Whitespace handling; derived from `code` when absent.
	pub whitespace: Option<Whitespace>,
	/// The node is preserved as context when its content is replaced.
	pub defining_as_context: bool,
	/// Pasted content keeps this node as a wrapper.
	pub defining_for_content: bool,
	/// Shorthand for both `defining_as_context` and `defining_for_content`.
	pub defining: bool,
	/// Edits never cross the boundary of this node.
	pub isolating: bool,
	/// Text used for this leaf by `text_content`/`text_between`.
	pub leaf_text: Option<String>,
}

impl NodeSpec {
	/// Whether the node is kept as context when its content is replaced.
	pub fn is_defining_as_context(&self) -> bool {
		self.defining || self.defining_as_context
	}

	/// Whether pasted content keeps this node as a wrapper.
	pub fn is_defining_for_content(&self) -> bool {
		self.defining || self.defining_for_content
	}
}

/// Whitespace handling of a node type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Whitespace {
	/// Whitespace may be collapsed.
	#[default]
	Normal,
	/// Whitespace is significant.
	Pre,
}

/// Description of one mark type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkSpec {
	/// Attribute declarations.
	pub attrs: IndexMap<String, AttributeSpec>,
	/// Whether the mark extends to text typed at its end. Defaults to true.
	pub inclusive: Option<bool>,
	/// Marks that can not coexist with this one: `"_"` for all, `""` for
	/// none. Defaults to the mark itself.
	pub excludes: Option<String>,
	/// Space separated group names.
	pub group: Option<String>,
	/// Whether the mark may span multiple adjacent nodes. Defaults to true.
	pub spanning: Option<bool>,
}

/// Declaration of one attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeSpec {
	/// Default value. An absent default makes the attribute required; an
	/// explicit `null` is a valid default.
	#[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
	pub default: Option<Value>,
	/// `|`-separated JSON type names the value must have (`string`,
	/// `number`, `boolean`, `null`, `object`, `array`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub validate: Option<String>,
}

impl AttributeSpec {
	/// An attribute with a default value.
	pub fn with_default(default: Value) -> Self {
		Self {
			default: Some(default),
			validate: None,
		}
	}

	/// A required attribute.
	pub fn required() -> Self {
		Self::default()
	}

	/// Returns the spec with a type validator.
	pub fn validated(mut self, types: &str) -> Self {
		self.validate = Some(types.to_string());
		self
	}
}

/// Distinguishes `"default": null` from a missing key.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
	Value::deserialize(deserializer).map(Some)
}

impl SchemaSpec {
	/// Parses a description from JSON.
	pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
		serde_json::from_str(source).map_err(|e| SchemaError::Parse(e.to_string()))
	}

	/// Parses a description from TOML.
	pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
		toml::from_str(source).map_err(|e| SchemaError::Parse(e.to_string()))
	}

	/// Name of the top node type.
	pub fn top_node_name(&self) -> &str {
		self.top_node.as_deref().unwrap_or("doc")
	}
}

/// Name of the JSON type of `value`, as used by attribute validators.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

/// Checks `value` against a validator string.
pub(crate) fn validate_type(types: &str, value: &Value) -> bool {
	let name = json_type_name(value);
	types.split('|').map(str::trim).any(|t| t == name || (t == "object" && name == "array"))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn null_default_is_not_required() {
		let spec = SchemaSpec::from_json_str(
			r#"{"nodes": {"doc": {"content": "text*"}, "text": {},
			    "img": {"attrs": {"alt": {"default": null}, "src": {}}}}}"#,
		)
		.unwrap();
		let attrs = &spec.nodes["img"].attrs;
		assert_eq!(attrs["alt"].default, Some(Value::Null));
		assert_eq!(attrs["src"].default, None);
	}

	#[test]
	fn toml_keeps_declaration_order() {
		let spec = SchemaSpec::from_toml_str(
			r#"
			top_node = "doc"
			[nodes.doc]
			content = "para+"
			[nodes.para]
			content = "text*"
			[nodes.text]
			[marks.em]
			[marks.strong]
			inclusive = false
			"#,
		)
		.unwrap();
		assert_eq!(spec.nodes.keys().collect::<Vec<_>>(), ["doc", "para", "text"]);
		assert_eq!(spec.marks.keys().collect::<Vec<_>>(), ["em", "strong"]);
		assert_eq!(spec.marks["strong"].inclusive, Some(false));
	}

	#[test]
	fn validators() {
		assert!(validate_type("string|null", &Value::Null));
		assert!(validate_type("number", &json!(3)));
		assert!(!validate_type("number", &json!("3")));
		assert!(validate_type("object", &json!([1])));
	}

	#[test]
	fn parse_errors_are_reported() {
		assert!(matches!(SchemaSpec::from_json_str("{"), Err(SchemaError::Parse(_))));
	}
}
