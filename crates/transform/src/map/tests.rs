use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;

#[rstest]
#[case(0, Bias::Right, 0)]
#[case(1, Bias::Right, 1)]
#[case(2, Bias::Left, 2)]
#[case(2, Bias::Right, 6)]
#[case(5, Bias::Left, 9)]
fn insertion_moves_positions(#[case] pos: usize, #[case] bias: Bias, #[case] expected: usize) {
	let map = StepMap::new([(2, 0, 4)]);
	assert_eq!(map.map(pos, bias), expected);
}

#[test]
fn insertion_deletes_nothing() {
	let map = StepMap::new([(2, 0, 4)]);
	let result = map.map_result(2, Bias::Right);
	assert!(!result.deleted_across());
	assert!(!result.deleted_before());
}

#[test]
fn deletion_reports_sides() {
	let map = StepMap::new([(2, 4, 0)]);

	let inside = map.map_result(4, Bias::Right);
	assert_eq!(inside.pos, 2);
	assert!(inside.deleted());
	assert!(inside.deleted_across());
	assert!(inside.recover().is_some());

	let at_start = map.map_result(2, Bias::Right);
	assert_eq!(at_start.del_info(), DelInfo::AFTER | DelInfo::SIDE);
	assert!(at_start.deleted_after());
	assert!(!at_start.deleted_before());

	let at_start_left = map.map_result(2, Bias::Left);
	assert!(!at_start_left.deleted());

	let at_end = map.map_result(6, Bias::Left);
	assert_eq!(at_end.pos, 2);
	assert!(at_end.deleted_before());
	assert!(at_end.deleted());

	assert_eq!(map.map(8, Bias::Right), 4);
}

#[test]
fn replacement_sends_inner_positions_to_bias_side() {
	let map = StepMap::new([(2, 4, 4)]);
	assert_eq!(map.map(3, Bias::Left), 2);
	assert_eq!(map.map(3, Bias::Right), 6);
	assert_eq!(map.map(7, Bias::Right), 7);
}

#[test]
fn inverted_map_undoes_insertion() {
	let map = StepMap::new([(2, 0, 4)]);
	let inverse = map.invert();
	assert_eq!(inverse.map(4, Bias::Right), 2);
	assert!(inverse.map_result(4, Bias::Right).deleted_across());
	assert_eq!(inverse.map(9, Bias::Right), 5);
	assert_eq!(inverse.invert(), map);
}

#[rstest]
#[case(-2, 5, 3)]
#[case(3, 0, 3)]
#[case(0, 7, 7)]
fn offset_maps(#[case] n: isize, #[case] pos: usize, #[case] expected: usize) {
	assert_eq!(StepMap::offset(n).map(pos, Bias::Right), expected);
}

#[test]
fn for_each_reports_old_and_new_ranges() {
	let map = StepMap::new([(2, 1, 3), (6, 2, 0)]);
	let mut seen = Vec::new();
	map.for_each(|old_start, old_end, new_start, new_end| seen.push((old_start, old_end, new_start, new_end)));
	assert_eq!(seen, [(2, 3, 2, 5), (6, 8, 8, 8)]);

	let mut inverted = Vec::new();
	map.invert().for_each(|a, b, c, d| inverted.push((a, b, c, d)));
	assert_eq!(inverted, [(2, 5, 2, 3), (8, 8, 6, 8)]);
}

#[test]
fn touches_identifies_the_changed_range() {
	let map = StepMap::new([(2, 4, 0)]);
	let recover = map.map_result(4, Bias::Right).recover().unwrap();
	assert!(map.touches(4, recover));
	assert!(!map.touches(8, recover));
}

#[test]
fn mirrored_maps_recover_positions() {
	let deletion = StepMap::new([(2, 4, 0)]);
	let mut mapping = Mapping::new();
	mapping.append_map(deletion.clone(), None);
	mapping.append_map(deletion.invert(), Some(0));
	assert_eq!(mapping.map(4, Bias::Right), 4);
	assert_eq!(mapping.map(3, Bias::Left), 3);

	let unmirrored = Mapping::from_maps(vec![deletion.clone(), deletion.invert()]);
	assert_eq!(unmirrored.map(4, Bias::Right), 6);
	assert_eq!(unmirrored.map(4, Bias::Left), 2);
}

#[test]
fn mapping_accumulates_deletions() {
	let mapping = Mapping::from_maps(vec![StepMap::new([(2, 4, 0)]), StepMap::new([(0, 0, 1)])]);
	let result = mapping.map_result(3, Bias::Right);
	assert_eq!(result.pos, 3);
	assert!(result.deleted_across());
}

#[test]
fn slicing_reindexes_mirrors() {
	let mut mapping = Mapping::new();
	mapping.append_map(StepMap::new([(0, 0, 2)]), None);
	mapping.append_map(StepMap::new([(4, 2, 0)]), None);
	mapping.append_map(StepMap::new([(4, 0, 2)]), Some(1));

	let tail = mapping.slice_from(1);
	assert_eq!(tail.len(), 2);
	assert_eq!(tail.get_mirror(0), Some(1));
	assert_eq!(tail.map(5, Bias::Right), 5);

	let head = mapping.slice(0, 2);
	assert_eq!(head.get_mirror(1), None);
	assert_eq!(head.map(1, Bias::Right), 3);
}

#[test]
fn inverted_mapping_runs_backwards() {
	let mapping = Mapping::from_maps(vec![StepMap::new([(2, 0, 3)]), StepMap::new([(0, 0, 1)])]);
	let inverse = mapping.invert();
	assert_eq!(inverse.len(), 2);
	for pos in [0, 1, 2, 7, 9] {
		assert_eq!(inverse.map(mapping.map(pos, Bias::Right), Bias::Right), pos, "pos {pos}");
	}
}

#[test]
fn appending_mappings_keeps_mirrors() {
	let deletion = StepMap::new([(1, 2, 0)]);
	let mut inner = Mapping::new();
	inner.append_map(deletion.clone(), None);
	inner.append_map(deletion.invert(), Some(0));

	let mut outer = Mapping::from_maps(vec![StepMap::empty()]);
	outer.append_mapping(&inner);
	assert_eq!(outer.get_mirror(2), Some(1));
	assert_eq!(outer.map(2, Bias::Right), 2);
}
