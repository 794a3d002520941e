use pretty_assertions::assert_eq;
use quire_model::test_builder::{doc, em, hr, mark, p, strong, t};
use serde_json::json;

use super::*;
use crate::selection::{AllSelection, TextSelection};
use crate::state::{EditorState, StateConfig};

fn state(d: Node, anchor: usize, head: usize) -> EditorState {
	let selection = TextSelection::create(&d, anchor, head).unwrap().into();
	EditorState::create(StateConfig {
		doc: Some(d),
		selection: Some(selection),
		..StateConfig::default()
	})
	.unwrap()
}

fn cursor_at(tr: &Transaction) -> (usize, usize) {
	let selection = tr.selection().unwrap();
	(selection.anchor(), selection.head())
}

#[test]
fn typing_at_a_cursor() {
	let mut tr = state(doc(vec![p(vec![t("ab")])]), 2, 2).tr();
	tr.insert_text("X", None, None).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![t("aXb")])]));
	assert_eq!(cursor_at(&tr), (3, 3));
}

#[test]
fn typing_over_a_range() {
	let mut tr = state(doc(vec![p(vec![t("abc")])]), 1, 3).tr();
	tr.insert_text("X", None, None).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![t("Xc")])]));
	assert_eq!(cursor_at(&tr), (2, 2));
}

#[test]
fn typed_text_inherits_marks() {
	let mut tr = state(doc(vec![p(vec![em(t("ab"))])]), 2, 2).tr();
	tr.insert_text("X", None, None).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![em(t("aXb"))])]));
}

#[test]
fn explicit_ranges_take_marks_from_the_document() {
	let mut tr = state(doc(vec![p(vec![t("a"), strong(t("bc"))])]), 1, 1).tr();
	tr.insert_text("X", Some(3), Some(4)).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![t("a"), strong(t("bX"))])]));
	tr.insert_text("", Some(1), Some(2)).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![strong(t("bX"))])]));
}

#[test]
fn inserting_elsewhere_keeps_a_range_selection() {
	let mut tr = state(doc(vec![p(vec![t("abcdef")])]), 1, 3).tr();
	tr.insert_text("X", Some(5), Some(5)).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![t("abcdXef")])]));
	assert_eq!(cursor_at(&tr), (1, 3));
}

#[test]
fn stored_marks_apply_once() {
	let mut tr = state(doc(vec![p(vec![t("ab")])]), 2, 2).tr();
	tr.add_stored_mark(&mark("strong")).unwrap();
	assert_eq!(tr.stored_marks(), Some(&[mark("strong")][..]));
	assert!(tr.stored_marks_set());

	tr.insert_text("X", None, None).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![t("a"), strong(t("X")), t("b")])]));
	assert_eq!(tr.stored_marks(), None);
	assert!(!tr.stored_marks_set());
}

#[test]
fn removing_a_stored_mark() {
	let mut tr = state(doc(vec![p(vec![em(strong(t("ab")))])]), 2, 2).tr();
	tr.remove_stored_mark(mark("em")).unwrap();
	assert_eq!(tr.stored_marks(), Some(&[mark("strong")][..]));
	tr.remove_stored_mark(MarkMatch::Any).unwrap();
	assert_eq!(tr.stored_marks(), Some(&[][..]));
}

#[test]
fn ensure_marks_skips_marks_in_effect() {
	let mut tr = state(doc(vec![p(vec![em(t("ab"))])]), 2, 2).tr();
	tr.ensure_marks(&[mark("em")]).unwrap();
	assert!(!tr.stored_marks_set());
	tr.ensure_marks(&[]).unwrap();
	assert_eq!(tr.stored_marks(), Some(&[][..]));
}

#[test]
fn deleting_a_selection_across_blocks() {
	let mut tr = state(doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]), 2, 6).tr();
	tr.delete_selection().unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![t("ad")])]));
	assert_eq!(cursor_at(&tr), (2, 2));
}

#[test]
fn deleting_everything_leaves_an_empty_block() {
	let d = doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]);
	let all = AllSelection::new(&d).unwrap().into();
	let start = EditorState::create(StateConfig {
		doc: Some(d),
		selection: Some(all),
		..StateConfig::default()
	})
	.unwrap();
	let mut tr = start.tr();
	tr.delete_selection().unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![])]));
	assert_eq!(cursor_at(&tr), (1, 1));
}

#[test]
fn block_nodes_move_the_cursor_after_them() {
	let mut tr = state(doc(vec![p(vec![t("ab")])]), 2, 2).tr();
	tr.replace_selection_with(hr(), false).unwrap();
	assert_eq!(*tr.doc(), doc(vec![p(vec![t("a")]), hr(), p(vec![t("b")])]));
	assert_eq!(cursor_at(&tr), (5, 5));
}

#[test]
fn selections_follow_later_steps() {
	let mut tr = state(doc(vec![p(vec![t("ab")])]), 3, 3).tr();
	tr.insert(1, t("X")).unwrap();
	assert_eq!(cursor_at(&tr), (4, 4));
	assert!(!tr.selection_set());
}

#[test]
fn foreign_selections_are_rejected() {
	let mut tr = state(doc(vec![p(vec![t("ab")])]), 1, 1).tr();
	let other = doc(vec![p(vec![t("xyz")])]);
	let err = tr
		.set_selection(TextSelection::cursor(&other, 2).unwrap().into())
		.unwrap_err();
	assert_eq!(err, StateError::ForeignSelection);

	let own = TextSelection::cursor(tr.doc(), 2).unwrap().into();
	tr.set_selection(own).unwrap();
	assert!(tr.selection_set());
}

#[test]
fn metadata_and_flags() {
	let mut tr = state(doc(vec![p(vec![t("ab")])]), 1, 1).tr();
	assert!(tr.is_generic());
	tr.set_meta("addToHistory", json!(false)).set_time(42).scroll_into_view();
	assert_eq!(tr.get_meta("addToHistory"), Some(&json!(false)));
	assert_eq!(tr.get_meta("missing"), None);
	assert!(!tr.is_generic());
	assert_eq!(tr.time(), 42);
	assert!(tr.scrolled_into_view());
}
