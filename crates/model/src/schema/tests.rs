use rstest::rstest;
use serde_json::json;

use super::*;
use crate::basic;
use crate::test_builder::{doc, li, p, t};

fn compile(source: &str) -> std::result::Result<Schema, SchemaError> {
	Schema::new(SchemaSpec::from_json_str(source)?)
}

fn with_doc_content(content: &str) -> std::result::Result<Schema, SchemaError> {
	compile(&format!(
		r#"{{"nodes": {{
			"doc": {{"content": "{content}"}},
			"para": {{"content": "text*", "group": "block"}},
			"quote": {{"content": "block+", "group": "block"}},
			"pic": {{"inline": true, "attrs": {{"src": {{}}}}}},
			"text": {{}}
		}}}}"#
	))
}

#[test]
fn basic_schema_types() {
	let schema = basic::schema();
	let paragraph = schema.node_type("paragraph").unwrap();
	assert!(paragraph.is_block());
	assert!(paragraph.is_textblock());
	assert!(paragraph.inline_content());
	assert!(paragraph.is_in_group("block"));

	let image = schema.node_type("image").unwrap();
	assert!(image.is_inline());
	assert!(image.is_leaf());
	assert!(image.is_atom());
	assert!(image.has_required_attrs());

	assert_eq!(schema.top_node_type().name(), "doc");
	assert!(schema.text_type().is_text());
	assert_eq!(schema.node_type("code_block").unwrap().whitespace(), Whitespace::Pre);
	assert_eq!(paragraph.whitespace(), Whitespace::Normal);
}

#[test]
fn identical_expressions_share_an_automaton() {
	let schema = basic::schema();
	let paragraph = schema.node_type("paragraph").unwrap();
	let heading = schema.node_type("heading").unwrap();
	assert_eq!(paragraph.content_match(), heading.content_match());
	assert!(paragraph.compatible_content(&heading));
}

#[rstest]
#[case("para+")]
#[case("(para | quote)*")]
#[case("block{1,3}")]
#[case("para{2,}")]
#[case("para quote? block*")]
fn valid_expressions_compile(#[case] content: &str) {
	assert!(with_doc_content(content).is_ok(), "{content}");
}

#[rstest]
#[case("nope+", "no node type or group 'nope' found")]
#[case("para text", "mixing inline and block content")]
#[case("(para", "missing closing paren")]
#[case("para{x}", "expected number, got 'x'")]
#[case("para{1", "unclosed braced range")]
#[case("para )", "unexpected trailing text ')'")]
#[case("pic", "only non-generatable nodes (pic) in a required position")]
fn invalid_expressions_fail(#[case] content: &str, #[case] message: &str) {
	let Err(SchemaError::ContentExpression { message: got, .. }) = with_doc_content(content) else {
		panic!("expected a content expression error for {content}");
	};
	assert_eq!(got, message);
}

#[test]
fn required_non_generatable_position_is_a_dead_end() {
	let result = compile(
		r#"{"nodes": {
			"doc": {"content": "figure"},
			"figure": {"attrs": {"src": {}}},
			"text": {}
		}}"#,
	);
	let Err(SchemaError::ContentExpression { message, .. }) = result else {
		panic!("expected dead end error");
	};
	assert!(message.contains("non-generatable"), "{message}");
}

#[test]
fn structural_requirements() {
	assert_eq!(
		compile(r#"{"nodes": {"doc": {"content": "text*"}}}"#).unwrap_err(),
		SchemaError::MissingText
	);
	assert_eq!(
		compile(r#"{"nodes": {"root": {}, "text": {}}}"#).unwrap_err(),
		SchemaError::MissingTopNode("doc".into())
	);
	assert_eq!(
		compile(r#"{"nodes": {"doc": {}, "text": {}}, "marks": {"doc": {}}}"#).unwrap_err(),
		SchemaError::NameClash("doc".into())
	);
	assert_eq!(
		compile(r#"{"nodes": {"doc": {"content": "text*", "marks": "bold"}, "text": {}}}"#).unwrap_err(),
		SchemaError::UnknownMark("bold".into())
	);
}

#[test]
fn invalid_default_is_rejected() {
	let result = compile(
		r#"{"nodes": {"doc": {"attrs": {"n": {"default": "x", "validate": "number"}}}, "text": {}}}"#,
	);
	assert!(matches!(result, Err(SchemaError::InvalidDefault { .. })));
}

#[test]
fn mark_sets_follow_content() {
	let schema = basic::schema();
	let em = schema.mark_type("em").unwrap();
	assert!(schema.node_type("paragraph").unwrap().allows_mark_type(&em));
	assert!(!schema.node_type("code_block").unwrap().allows_mark_type(&em));
	assert!(!schema.node_type("doc").unwrap().allows_mark_type(&em));
}

#[test]
fn marks_exclude_themselves_by_default() {
	let schema = compile(
		r#"{"nodes": {"doc": {"content": "text*"}, "text": {}},
		    "marks": {"a": {}, "b": {"excludes": ""}, "c": {"excludes": "_"}}}"#,
	)
	.unwrap();
	let [a, b, c] = ["a", "b", "c"].map(|n| schema.mark_type(n).unwrap());
	assert!(a.excludes(&a));
	assert!(!a.excludes(&b));
	assert!(!b.excludes(&b));
	assert!(c.excludes(&a) && c.excludes(&c));
	assert_eq!((a.rank(), b.rank(), c.rank()), (0, 1, 2));
}

#[test]
fn attrs_use_defaults() {
	let schema = basic::schema();
	let heading = schema.node_type("heading").unwrap();
	let attrs = heading.compute_attrs(None).unwrap();
	assert_eq!(attrs.get("level"), Some(&json!(1)));

	let given = Attrs::from_pairs([("level", json!(3))]);
	assert_eq!(heading.compute_attrs(Some(&given)).unwrap().get("level"), Some(&json!(3)));
}

#[test]
fn required_attrs_must_be_given() {
	let image = basic::schema().node_type("image").unwrap();
	assert_eq!(
		image.compute_attrs(None).unwrap_err(),
		ModelError::MissingAttribute { attr: "src".into() }
	);
	let attrs = image
		.compute_attrs(Some(&Attrs::from_pairs([("src", json!("x.png"))])))
		.unwrap();
	assert_eq!(attrs.get("alt"), Some(&Value::Null));
}

#[test]
fn check_attrs_validates_types_and_names() {
	let heading = basic::schema().node_type("heading").unwrap();
	assert!(heading.check_attrs(&Attrs::from_pairs([("level", json!(2))])).is_ok());
	assert!(matches!(
		heading.check_attrs(&Attrs::from_pairs([("level", json!("2"))])),
		Err(ModelError::InvalidAttribute { .. })
	));
	assert!(matches!(
		heading.check_attrs(&Attrs::from_pairs([("color", json!("red"))])),
		Err(ModelError::UnsupportedAttribute { .. })
	));
}

#[test]
fn create_and_fill_generates_required_content() {
	let schema = basic::schema();
	let filled = schema.top_node_type().create_and_fill(None, Fragment::empty(), &[]).unwrap().unwrap();
	assert_eq!(filled, doc(vec![p(vec![])]));

	let item = schema.node_type("list_item").unwrap();
	let filled = item.create_and_fill(None, Fragment::empty(), &[]).unwrap().unwrap();
	assert_eq!(filled, li(vec![p(vec![])]));
}

#[test]
fn create_and_fill_gives_up_on_impossible_content() {
	let schema = basic::schema();
	let list = schema.node_type("bullet_list").unwrap();
	let content = Fragment::from_node(t("loose text"));
	assert_eq!(list.create_and_fill(None, content, &[]).unwrap(), None);
}

#[test]
fn create_checked_validates() {
	let schema = basic::schema();
	let doc_type = schema.top_node_type();
	assert!(matches!(
		doc_type.create_checked(None, Fragment::empty(), &[]),
		Err(ModelError::InvalidContent { .. })
	));
	assert!(doc_type.create_checked(None, Fragment::from_node(p(vec![])), &[]).is_ok());
	assert!(matches!(schema.text_type().create(None, Fragment::empty(), &[]), Err(ModelError::TextNodeCreate)));
}

#[test]
fn allowed_marks_filters() {
	let schema = basic::schema();
	let marks = [schema.mark("em", None).unwrap(), schema.mark("strong", None).unwrap()];
	let code_block = schema.node_type("code_block").unwrap();
	assert!(code_block.allowed_marks(&marks).is_empty());
	assert!(!code_block.allows_marks(&marks));
	assert_eq!(schema.node_type("paragraph").unwrap().allowed_marks(&marks).len(), 2);
}

#[test]
fn toml_description_compiles() {
	let spec = SchemaSpec::from_toml_str(
		r#"
		[nodes.doc]
		content = "line+"
		[nodes.line]
		content = "text*"
		[nodes.text]
		"#,
	)
	.unwrap();
	let schema = Schema::new(spec).unwrap();
	assert!(schema.node_type("line").unwrap().is_textblock());
}
