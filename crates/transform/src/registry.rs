//! Step deserialization keyed by the `stepType` tag.

use quire_model::{Mark, Schema, Slice};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{RegistryError, Result, TransformError};
use crate::step::Step;

/// Decodes the JSON form of one step kind.
pub type StepDecoder = fn(&Schema, &Value) -> Result<Step>;

const BUILTINS: [(&str, StepDecoder); 8] = [
	("replace", decode_replace),
	("replaceAround", decode_replace_around),
	("addMark", decode_add_mark),
	("removeMark", decode_remove_mark),
	("addNodeMark", decode_add_node_mark),
	("removeNodeMark", decode_remove_node_mark),
	("attr", decode_attr),
	("docAttr", decode_doc_attr),
];

/// Maps step tags to decoders.
///
/// Registries are explicit values rather than process-wide state; a tag can be
/// registered once per registry.
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
	decoders: FxHashMap<String, StepDecoder>,
}

impl StepRegistry {
	/// An empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry that knows every built-in step kind.
	pub fn with_builtins() -> Self {
		let decoders = BUILTINS.iter().map(|&(tag, decoder)| (tag.to_string(), decoder)).collect();
		Self { decoders }
	}

	/// Registers `decoder` under `tag`.
	pub fn register(&mut self, tag: impl Into<String>, decoder: StepDecoder) -> std::result::Result<(), RegistryError> {
		let tag = tag.into();
		if self.decoders.contains_key(&tag) {
			return Err(RegistryError::DuplicateStepType { tag });
		}
		debug!(%tag, "registered step type");
		self.decoders.insert(tag, decoder);
		Ok(())
	}

	pub fn contains(&self, tag: &str) -> bool {
		self.decoders.contains_key(tag)
	}

	/// Registered tags, in no particular order.
	pub fn tags(&self) -> impl Iterator<Item = &str> {
		self.decoders.keys().map(String::as_str)
	}

	/// Decodes a step from its JSON form.
	pub fn step_from_json(&self, schema: &Schema, json: &Value) -> Result<Step> {
		let Some(tag) = json.get("stepType").and_then(Value::as_str) else {
			return Err(TransformError::InvalidStep("missing stepType".into()));
		};
		let decoder = self
			.decoders
			.get(tag)
			.ok_or_else(|| RegistryError::UnknownStepType { tag: tag.to_string() })?;
		decoder(schema, json)
	}
}

fn invalid(kind: &str) -> TransformError {
	TransformError::InvalidStep(format!("invalid input for {kind}"))
}

fn pos(json: &Value, key: &str, kind: &str) -> Result<usize> {
	json.get(key)
		.and_then(Value::as_u64)
		.and_then(|n| usize::try_from(n).ok())
		.ok_or_else(|| invalid(kind))
}

fn flag(json: &Value, key: &str) -> bool {
	json.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn slice(schema: &Schema, json: &Value) -> Result<Slice> {
	Ok(Slice::from_json(schema, json.get("slice").unwrap_or(&Value::Null))?)
}

fn mark(schema: &Schema, json: &Value, kind: &str) -> Result<Mark> {
	let value = json.get("mark").ok_or_else(|| invalid(kind))?;
	Ok(Mark::from_json(schema, value)?)
}

fn attr_name(json: &Value, kind: &str) -> Result<String> {
	json.get("attr")
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| invalid(kind))
}

fn decode_replace(schema: &Schema, json: &Value) -> Result<Step> {
	const KIND: &str = "ReplaceStep";
	Ok(Step::Replace {
		from: pos(json, "from", KIND)?,
		to: pos(json, "to", KIND)?,
		slice: slice(schema, json)?,
		structure: flag(json, "structure"),
	})
}

fn decode_replace_around(schema: &Schema, json: &Value) -> Result<Step> {
	const KIND: &str = "ReplaceAroundStep";
	Ok(Step::ReplaceAround {
		from: pos(json, "from", KIND)?,
		to: pos(json, "to", KIND)?,
		gap_from: pos(json, "gapFrom", KIND)?,
		gap_to: pos(json, "gapTo", KIND)?,
		slice: slice(schema, json)?,
		insert: pos(json, "insert", KIND)?,
		structure: flag(json, "structure"),
	})
}

fn decode_add_mark(schema: &Schema, json: &Value) -> Result<Step> {
	const KIND: &str = "AddMarkStep";
	Ok(Step::AddMark {
		from: pos(json, "from", KIND)?,
		to: pos(json, "to", KIND)?,
		mark: mark(schema, json, KIND)?,
	})
}

fn decode_remove_mark(schema: &Schema, json: &Value) -> Result<Step> {
	const KIND: &str = "RemoveMarkStep";
	Ok(Step::RemoveMark {
		from: pos(json, "from", KIND)?,
		to: pos(json, "to", KIND)?,
		mark: mark(schema, json, KIND)?,
	})
}

fn decode_add_node_mark(schema: &Schema, json: &Value) -> Result<Step> {
	const KIND: &str = "AddNodeMarkStep";
	Ok(Step::AddNodeMark {
		pos: pos(json, "pos", KIND)?,
		mark: mark(schema, json, KIND)?,
	})
}

fn decode_remove_node_mark(schema: &Schema, json: &Value) -> Result<Step> {
	const KIND: &str = "RemoveNodeMarkStep";
	Ok(Step::RemoveNodeMark {
		pos: pos(json, "pos", KIND)?,
		mark: mark(schema, json, KIND)?,
	})
}

fn decode_attr(_: &Schema, json: &Value) -> Result<Step> {
	const KIND: &str = "AttrStep";
	Ok(Step::Attr {
		pos: pos(json, "pos", KIND)?,
		attr: attr_name(json, KIND)?,
		value: json.get("value").cloned().unwrap_or(Value::Null),
	})
}

fn decode_doc_attr(_: &Schema, json: &Value) -> Result<Step> {
	Ok(Step::DocAttr {
		attr: attr_name(json, "DocAttrStep")?,
		value: json.get("value").cloned().unwrap_or(Value::Null),
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use quire_model::test_builder::schema;
	use serde_json::json;

	use super::*;

	#[test]
	fn builtins_cover_every_step_kind() {
		let registry = StepRegistry::with_builtins();
		let mut tags: Vec<_> = registry.tags().collect();
		tags.sort_unstable();
		assert_eq!(tags, [
			"addMark",
			"addNodeMark",
			"attr",
			"docAttr",
			"removeMark",
			"removeNodeMark",
			"replace",
			"replaceAround"
		]);
	}

	#[test]
	fn duplicate_tags_are_rejected() {
		let mut registry = StepRegistry::with_builtins();
		let err = registry.register("replace", decode_replace).unwrap_err();
		assert_eq!(err, RegistryError::DuplicateStepType { tag: "replace".into() });
		assert_eq!(err.to_string(), "duplicate step type: replace");

		let mut empty = StepRegistry::new();
		empty.register("replace", decode_replace).unwrap();
		assert!(empty.contains("replace"));
		assert!(!empty.contains("attr"));
	}

	#[test]
	fn unknown_and_untagged_steps_fail() {
		let registry = StepRegistry::with_builtins();
		let err = registry.step_from_json(&schema(), &json!({"stepType": "teleport"})).unwrap_err();
		assert_eq!(err.to_string(), "no step type teleport defined");
		assert!(matches!(
			registry.step_from_json(&schema(), &json!({"from": 1})),
			Err(TransformError::InvalidStep(_))
		));
	}

	#[test]
	fn malformed_fields_fail() {
		let registry = StepRegistry::with_builtins();
		let schema = schema();
		let bad = [
			json!({"stepType": "replace", "from": "1", "to": 2}),
			json!({"stepType": "addMark", "from": 1, "to": 2}),
			json!({"stepType": "addMark", "from": 1, "to": 2, "mark": {"type": "sparkle"}}),
			json!({"stepType": "attr", "pos": 0}),
			json!({"stepType": "replaceAround", "from": 0, "to": 4, "gapFrom": 1, "gapTo": 3}),
		];
		for json in bad {
			assert!(registry.step_from_json(&schema, &json).is_err(), "{json}");
		}
	}

	#[test]
	fn decodes_minimal_replace() {
		let registry = StepRegistry::with_builtins();
		let step = registry
			.step_from_json(&schema(), &json!({"stepType": "replace", "from": 1, "to": 3}))
			.unwrap();
		assert_eq!(step, Step::replace(1, 3, Slice::empty()));
	}
}
