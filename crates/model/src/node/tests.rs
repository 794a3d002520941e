use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::test_builder::{a, blockquote, br, doc, em, h, hr, img, li, mark, p, pre, schema, strong, t, ul};

fn hello() -> Node {
	doc(vec![p(vec![t("hello")])])
}

#[test]
fn node_sizes() {
	assert_eq!(t("héllo").node_size(), 5);
	assert_eq!(hr().node_size(), 1);
	assert_eq!(p(vec![]).node_size(), 2);
	assert_eq!(hello().node_size(), 9);
	assert_eq!(hello().content().size(), 7);
}

#[test]
fn display_notation() {
	let d = doc(vec![p(vec![t("a "), em(strong(t("b")))]), hr()]);
	assert_eq!(d.to_string(), r#"doc(paragraph("a ", em(strong("b"))), horizontal_rule)"#);
}

#[test]
fn text_content_and_between() {
	let d = doc(vec![p(vec![t("one"), br(), t("two")]), blockquote(vec![p(vec![t("three")])])]);
	assert_eq!(d.text_content(), "one\ntwothree");
	assert_eq!(d.text_between(0, d.content().size(), Some(" "), None), "one\ntwo three");
	assert_eq!(t("hello").text_between(1, 3, None, None), "el");
}

#[test]
fn structural_equality_short_circuits() {
	let d = hello();
	assert_eq!(d, d.clone());
	assert_eq!(d, hello());
	assert_ne!(d, doc(vec![p(vec![t("hellO")])]));
	assert_ne!(p(vec![t("x")]), h(1, vec![t("x")]));
}

#[test]
fn markup_comparisons() {
	let heading = h(2, vec![t("x")]);
	assert!(heading.same_markup(&h(2, vec![])));
	assert!(!heading.same_markup(&h(3, vec![])));
	assert!(p(vec![]).has_markup(&schema().node_type("paragraph").unwrap(), None, &[]));
}

#[test]
fn scenario_insert_text_inside_word() {
	let d = hello();
	let slice = Slice::new(Fragment::from_node(t("X")), 0, 0);
	let result = d.replace(3, 3, &slice).unwrap();
	assert_eq!(result, doc(vec![p(vec![t("heXllo")])]));
	assert_eq!(result.child(0).node_size(), 8);
}

#[test]
fn scenario_too_deep_slice_fails_without_touching_doc() {
	let d = hello();
	let before = d.clone();
	let slice = Slice::new(Fragment::from_node(blockquote(vec![p(vec![t("q")])])), 3, 0);
	let err = d.replace(3, 3, &slice).unwrap_err();
	assert_eq!(err, ModelError::Replace("Inserted content deeper than insertion position".into()));
	assert!(err.is_replace_error());
	assert!(d.ptr_eq(&before));
}

#[test]
fn inconsistent_open_depths_fail() {
	let d = hello();
	let slice = Slice::new(Fragment::from_node(p(vec![t("q")])), 1, 0);
	let err = d.replace(3, 3, &slice).unwrap_err();
	assert_eq!(err, ModelError::Replace("Inconsistent open depths".into()));
}

#[test]
fn replace_joins_open_sides() {
	let d = doc(vec![p(vec![t("abc")]), p(vec![t("def")])]);
	let slice = Slice::new(Fragment::from_array(vec![p(vec![t("X")]), p(vec![t("Y")])]), 1, 1);
	let result = d.replace(3, 7, &slice).unwrap();
	assert_eq!(result, doc(vec![p(vec![t("abX")]), p(vec![t("Yef")])]));
}

#[test]
fn delete_across_paragraphs_joins_them() {
	let d = doc(vec![p(vec![t("abc")]), p(vec![t("def")])]);
	let result = d.replace(2, 7, &Slice::empty()).unwrap();
	assert_eq!(result, doc(vec![p(vec![t("aef")])]));
}

#[test]
fn replace_with_empty_slice_at_a_point_is_identity() {
	let d = doc(vec![p(vec![t("abc")]), blockquote(vec![p(vec![t("def")])])]);
	for pos in 0..=d.content().size() {
		assert_eq!(d.replace(pos, pos, &Slice::empty()).unwrap(), d, "pos {pos}");
	}
}

#[test]
fn replace_refuses_invalid_joins() {
	let d = doc(vec![p(vec![t("ab")]), pre("cd")]);
	let slice = Slice::new(Fragment::from_node(ul(vec![li(vec![p(vec![t("x")])])])), 0, 0);
	let err = d.replace(1, 1, &slice).unwrap_err();
	assert!(err.is_replace_error(), "{err}");
}

#[test]
fn replace_refuses_joining_incompatible_nodes() {
	let d = doc(vec![p(vec![t("ab")]), ul(vec![li(vec![p(vec![t("cd")])])])]);
	let err = d.replace(2, 5, &Slice::empty()).unwrap_err();
	assert_eq!(err, ModelError::Replace("Cannot join bullet_list onto paragraph".into()));
	let err = d.replace(2, 8, &Slice::empty()).unwrap_err();
	assert_eq!(err, ModelError::Replace("Inconsistent open depths".into()));
}

#[test]
fn slice_opens_to_shared_depth() {
	let d = doc(vec![p(vec![t("hello")]), p(vec![t("world")])]);
	let slice = d.slice(3, 10, false).unwrap();
	assert_eq!(slice.to_string(), r#"<paragraph("llo"), paragraph("wo")>(1,1)"#);
	let inner = d.slice(2, 4, false).unwrap();
	assert_eq!(inner.to_string(), r#"<"el">(0,0)"#);
	let with_parents = d.slice(2, 4, true).unwrap();
	assert_eq!((with_parents.open_start(), with_parents.open_end()), (1, 1));
}

#[test]
fn node_at_and_children() {
	let d = doc(vec![p(vec![t("ab"), img("x.png")]), hr()]);
	assert_eq!(d.node_at(0).unwrap().node_type().name(), "paragraph");
	assert_eq!(d.node_at(1).unwrap().text(), Some("ab"));
	assert_eq!(d.node_at(2).unwrap().text(), Some("ab"));
	assert_eq!(d.node_at(3).unwrap().node_type().name(), "image");
	assert_eq!(d.node_at(5).unwrap().node_type().name(), "horizontal_rule");
	assert!(d.node_at(6).is_none());

	let after = d.child_after(5).unwrap();
	assert_eq!((after.index, after.offset), (1, 5));
	let before = d.child_before(5).unwrap();
	assert_eq!((before.index, before.offset), (0, 0));
	assert!(d.child_before(0).unwrap().node.is_none());
}

#[test]
fn can_replace_checks_content_and_marks() {
	let d = doc(vec![p(vec![t("a")]), p(vec![t("b")])]);
	assert!(d.can_replace(0, 1, &Fragment::from_node(hr())));
	assert!(!d.can_replace(0, 2, &Fragment::empty()));
	assert!(!d.can_replace(0, 0, &Fragment::from_node(t("x"))));

	let code = pre("x");
	assert!(!code.can_replace(0, 1, &Fragment::from_node(em(t("y")))));
	assert!(code.can_replace(0, 1, &Fragment::from_node(t("y"))));

	let para = schema().node_type("paragraph").unwrap();
	assert!(d.can_replace_with(1, 1, &para, None));
	assert!(!d.can_replace_with(0, 2, &schema().text_type(), None));
	assert!(d.can_append(&doc(vec![p(vec![])])));
}

#[test]
fn content_match_at_reports_state() {
	let item = li(vec![p(vec![]), hr()]);
	assert!(item.content_match_at(2).unwrap().valid_end());
	assert!(!item.content_match_at(0).unwrap().valid_end());
}

#[test]
fn range_has_mark() {
	let d = doc(vec![p(vec![t("ab"), em(t("cd")), t("ef")])]);
	let em_type = schema().mark_type("em").unwrap();
	assert!(d.range_has_mark(1, 4, &em_type));
	assert!(!d.range_has_mark(1, 3, &em_type));
	assert!(!d.range_has_mark(5, 5, &em_type));
}

#[test]
fn check_finds_bad_marks() {
	assert!(doc(vec![p(vec![em(t("x"))])]).check().is_ok());
	let em_mark = mark("em");
	let doubled = t("x").mark(&[em_mark.clone(), em_mark]);
	let err = doc(vec![p(vec![doubled])]).check().unwrap_err();
	assert!(matches!(err, ModelError::InvalidMarks { .. }), "{err}");
}

#[test]
fn check_finds_bad_content() {
	let schema = schema();
	let invalid = schema
		.node("doc", None, Fragment::from_node(t("loose")), &[])
		.unwrap();
	assert!(matches!(invalid.check(), Err(ModelError::InvalidContent { .. })));
}

#[test]
fn json_round_trip() {
	let d = doc(vec![
		h(2, vec![t("Title")]),
		p(vec![t("plain "), a("https://example.com", em(t("link"))), br()]),
		pre("let x = 1;"),
	]);
	let json = d.to_json();
	assert_eq!(json["content"][0], json!({"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Title"}]}));
	assert_eq!(Node::from_json(&schema(), &json).unwrap(), d);
}

#[test]
fn json_rejects_garbage() {
	let schema = schema();
	assert!(Node::from_json(&schema, &json!(null)).is_err());
	assert!(Node::from_json(&schema, &json!({"type": "nope"})).is_err());
	assert!(Node::from_json(&schema, &json!({"type": "text"})).is_err());
	assert!(Node::from_json(&schema, &json!({"type": "heading", "attrs": {"level": "x"}})).is_err());
	assert!(Node::from_json(&schema, &json!({"type": "text", "text": ""})).is_err());
}
