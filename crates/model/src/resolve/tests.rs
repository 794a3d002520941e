use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::test_builder::{a, blockquote, doc, em, p, t};

// doc(blockquote(paragraph("abc")), paragraph(em("x"), link("yy"), "z"))
//     0 1 2  abc  5 6 7 8 x 9 yy 11 z 12 13
fn sample() -> Node {
	doc(vec![
		blockquote(vec![p(vec![t("abc")])]),
		p(vec![em(t("x")), a("https://example.com", t("yy")), t("z")]),
	])
}

fn names(marks: &[Mark]) -> Vec<&str> {
	marks.iter().map(|m| m.mark_type().name()).collect()
}

#[test]
fn resolves_ancestor_path() {
	let pos = sample().resolve(3).unwrap();
	assert_eq!(pos.depth(), 2);
	assert_eq!(pos.parent().node_type().name(), "paragraph");
	assert_eq!(pos.node(1).node_type().name(), "blockquote");
	assert_eq!(pos.parent_offset(), 1);
	assert_eq!(pos.text_offset(), 1);
	assert_eq!((pos.index(0), pos.index(1), pos.index(2)), (0, 0, 0));
	assert_eq!((pos.start(2), pos.end(2)), (2, 5));
	assert_eq!((pos.start(1), pos.end(1)), (1, 6));
	assert_eq!(pos.to_string(), "blockquote_0/paragraph_0:1");
}

#[rstest]
#[case(1, 0, 7)]
#[case(2, 1, 6)]
#[case(3, 3, 3)]
fn before_and_after(#[case] depth: usize, #[case] before: usize, #[case] after: usize) {
	let pos = sample().resolve(3).unwrap();
	assert_eq!(pos.before(depth).unwrap(), before);
	assert_eq!(pos.after(depth).unwrap(), after);
}

#[test]
fn no_position_around_the_root() {
	let pos = sample().resolve(7).unwrap();
	assert_eq!(pos.depth(), 0);
	assert!(matches!(pos.before(0), Err(ModelError::Range(_))));
	assert!(matches!(pos.after(0), Err(ModelError::Range(_))));
	assert_eq!(pos.to_string(), ":7");
}

#[test]
fn out_of_range_positions_fail() {
	let doc = sample();
	assert_eq!(doc.content().size(), 13);
	assert!(doc.resolve(13).is_ok());
	assert_eq!(doc.resolve(14).unwrap_err(), ModelError::PositionOutOfRange { pos: 14 });
}

#[test]
fn nodes_around_a_position() {
	let doc = sample();
	let inside = doc.resolve(3).unwrap();
	assert_eq!(inside.node_before().unwrap().text(), Some("a"));
	assert_eq!(inside.node_after().unwrap().text(), Some("bc"));

	let between = doc.resolve(7).unwrap();
	assert_eq!(between.node_before().unwrap().node_type().name(), "blockquote");
	assert_eq!(between.node_after().unwrap().node_type().name(), "paragraph");
	assert_eq!(between.index_after(0), 1);

	let start = doc.resolve(0).unwrap();
	assert!(start.node_before().is_none());
	let end = doc.resolve(13).unwrap();
	assert!(end.node_after().is_none());
}

#[test]
fn pos_at_index() {
	let doc = sample();
	assert_eq!(doc.resolve(10).unwrap().pos_at_index(1, 1), 9);
	assert_eq!(doc.resolve(3).unwrap().pos_at_index(1, 0), 7);
}

#[rstest]
#[case(8, &["em"])]
#[case(9, &["em"])]
#[case(10, &["link"])]
#[case(11, &[])]
#[case(12, &[])]
fn marks_at(#[case] pos: usize, #[case] expected: &[&str]) {
	let doc = sample();
	let marks = doc.resolve(pos).unwrap().marks();
	assert_eq!(names(&marks), expected);
}

#[test]
fn marks_in_empty_parent() {
	let doc = doc(vec![p(vec![])]);
	assert!(doc.resolve(1).unwrap().marks().is_empty());
}

#[test]
fn marks_across_a_deletion() {
	let doc = sample();
	let from = doc.resolve(8).unwrap();
	let to = doc.resolve(9).unwrap();
	assert_eq!(names(&from.marks_across(&to).unwrap()), ["em"]);
	let across_link = doc.resolve(9).unwrap().marks_across(&doc.resolve(11).unwrap()).unwrap();
	assert!(across_link.is_empty());
	assert!(doc.resolve(0).unwrap().marks_across(&doc.resolve(1).unwrap()).is_none());
}

#[rstest]
#[case(3, 5, 2)]
#[case(3, 6, 1)]
#[case(3, 10, 0)]
fn shared_depth(#[case] from: usize, #[case] to: usize, #[case] expected: usize) {
	assert_eq!(sample().resolve(from).unwrap().shared_depth(to), expected);
}

#[test]
fn block_range_inside_textblock() {
	let doc = sample();
	let from = doc.resolve(3).unwrap();
	let to = doc.resolve(4).unwrap();
	let range = from.block_range(Some(&to)).unwrap();
	assert_eq!(range.depth(), 1);
	assert_eq!(range.parent().node_type().name(), "blockquote");
	assert_eq!((range.start(), range.end()), (1, 6));
	assert_eq!((range.start_index(), range.end_index()), (0, 1));
}

#[test]
fn block_range_spanning_blocks() {
	let doc = sample();
	let from = doc.resolve(3).unwrap();
	let to = doc.resolve(10).unwrap();
	let range = to.block_range(Some(&from)).unwrap();
	assert_eq!(range.depth(), 0);
	assert_eq!((range.start(), range.end()), (0, 13));
	assert_eq!((range.start_index(), range.end_index()), (0, 2));
}

#[test]
fn block_range_with_predicate() {
	let doc = sample();
	let from = doc.resolve(3).unwrap();
	let to = doc.resolve(4).unwrap();
	let range = from
		.block_range_where(Some(&to), |node| node.node_type().name() != "blockquote")
		.unwrap();
	assert_eq!(range.depth(), 0);
	assert!(doc.resolve(7).unwrap().block_range(None).is_none());
}

#[test]
fn parent_comparison_and_ordering() {
	let doc = sample();
	let [a, b, c] = [2, 5, 9].map(|pos| doc.resolve(pos).unwrap());
	assert!(a.same_parent(&b));
	assert!(!a.same_parent(&c));
	assert_eq!(a.max(&c).pos(), 9);
	assert_eq!(c.min(&a).pos(), 2);
}

#[test]
fn cache_reuses_and_bounds_entries() {
	let mut cache = ResolveCache::new(sample());
	assert!(cache.is_empty());
	let first = cache.resolve(3).unwrap();
	let again = cache.resolve(3).unwrap();
	assert_eq!(first.pos(), again.pos());
	assert_eq!(cache.len(), 1);
	for pos in 0..=13 {
		cache.resolve(pos).unwrap();
	}
	assert_eq!(cache.len(), 12);
	assert!(cache.resolve(20).is_err());
	assert_eq!(cache.len(), 12);
	assert_eq!(cache.doc().content().size(), 13);
}
