//! End-to-end behavior of documents built through the public API.

#![allow(unused_crate_dependencies)]

mod common;

use common::{blockquote, br, doc, h, hr, marked, p, schema, text};
use pretty_assertions::assert_eq;
use quire_model::{Fragment, ModelError, Node, Schema, SchemaSpec, Slice};
use serde_json::json;

#[test]
fn inserting_text_grows_the_paragraph() {
	let before = doc(vec![p(vec![text("hello")])]);
	let slice = Slice::new(Fragment::from_node(text("X")), 0, 0);
	let after = before.replace(3, 3, &slice).unwrap();
	assert_eq!(after.to_string(), r#"doc(paragraph("heXllo"))"#);
	assert_eq!(after.child(0).node_size(), 8);
	assert_eq!(before.to_string(), r#"doc(paragraph("hello"))"#);
}

#[test]
fn slice_deeper_than_position_is_rejected() {
	let before = doc(vec![p(vec![text("hello")])]);
	let quote = blockquote(vec![p(vec![text("q")])]);
	let err = before
		.replace(3, 3, &Slice::new(Fragment::from_node(quote), 2, 0))
		.unwrap_err();
	assert_eq!(err, ModelError::Replace("Inserted content deeper than insertion position".into()));
	assert_eq!(before, doc(vec![p(vec![text("hello")])]));
}

#[test]
fn replacing_a_range_with_its_own_slice_is_identity() {
	let d = doc(vec![
		h(1, vec![text("Title")]),
		blockquote(vec![p(vec![text("quoted"), br(), marked(text("bold"), "strong")])]),
		hr(),
		p(vec![text("tail")]),
	]);
	let size = d.content().size();
	for from in 0..=size {
		for to in from..=size {
			let slice = d.slice(from, to, false).unwrap();
			assert_eq!(d.replace(from, to, &slice).unwrap(), d, "{from}..{to}");
		}
	}
}

#[test]
fn json_fixture_parses_and_validates() {
	let json = json!({
		"type": "doc",
		"content": [
			{"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Notes"}]},
			{"type": "paragraph", "content": [
				{"type": "text", "text": "see "},
				{"type": "text", "text": "here", "marks": [{"type": "link", "attrs": {"href": "/x", "title": null}}]}
			]}
		]
	});
	let node = Node::from_json(&schema(), &json).unwrap();
	node.check().unwrap();
	assert_eq!(node.text_content(), "Notessee here");
	assert_eq!(node.to_json(), json);
}

#[test]
fn slices_survive_json() {
	let d = doc(vec![p(vec![text("one")]), p(vec![text("two")])]);
	let slice = d.slice(2, 8, false).unwrap();
	let json = slice.to_json();
	assert_eq!(json["openStart"], json!(1));
	assert_eq!(Slice::from_json(&schema(), &json).unwrap(), slice);
	assert_eq!(Slice::from_json(&schema(), &serde_json::Value::Null).unwrap(), Slice::empty());
}

#[test]
fn custom_schema_from_toml() {
	let spec = SchemaSpec::from_toml_str(
		r#"
		[nodes.doc]
		content = "title section+"
		[nodes.title]
		content = "text*"
		[nodes.section]
		content = "text*"
		group = "body"
		[nodes.text]
		[marks.highlight]
		"#,
	)
	.unwrap();
	let schema = Schema::new(spec).unwrap();
	let filled = schema.top_node_type().create_and_fill(None, Fragment::empty(), &[]).unwrap().unwrap();
	assert_eq!(filled.to_string(), "doc(title, section)");
	let highlight = schema.mark("highlight", None).unwrap();
	let word = schema.text("hi", &[highlight]).unwrap();
	assert_eq!(word.to_string(), r#"highlight("hi")"#);
}

#[test]
fn nodes_from_different_schemas_are_distinct() {
	let other = Schema::new(quire_model::basic::spec()).unwrap();
	assert_ne!(other.top_node_type(), schema().top_node_type());
	assert!(other.node_type("paragraph").is_some());
}
