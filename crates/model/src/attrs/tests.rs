use serde_json::json;

use super::*;

fn keys(map: &OrderedMap<i32>) -> Vec<&str> {
	map.keys().collect()
}

fn abc() -> OrderedMap<i32> {
	OrderedMap::from_pairs([("a", 1), ("b", 2), ("c", 3)])
}

#[test]
fn keeps_insertion_order() {
	assert_eq!(keys(&abc()), ["a", "b", "c"]);
}

#[test]
fn update_replaces_in_place() {
	let map = abc().update("b", 20, None);
	assert_eq!(keys(&map), ["a", "b", "c"]);
	assert_eq!(map.get("b"), Some(&20));
}

#[test]
fn update_renames() {
	let map = abc().update("b", 20, Some("x"));
	assert_eq!(keys(&map), ["a", "x", "c"]);
	assert_eq!(map.get("b"), None);
}

#[test]
fn update_appends_missing_key() {
	let map = abc().update("d", 4, None);
	assert_eq!(keys(&map), ["a", "b", "c", "d"]);
}

#[test]
fn operations_are_persistent() {
	let map = abc();
	let removed = map.remove("a");
	assert_eq!(keys(&map), ["a", "b", "c"]);
	assert_eq!(keys(&removed), ["b", "c"]);
}

#[test]
fn add_to_start_moves_existing() {
	let map = abc().add_to_start("c", 30);
	assert_eq!(keys(&map), ["c", "a", "b"]);
	assert_eq!(map.get("c"), Some(&30));
}

#[test]
fn add_before_places_key() {
	let map = abc().add_before("b", "z", 26);
	assert_eq!(keys(&map), ["a", "z", "b", "c"]);
	let missing = abc().add_before("nope", "z", 26);
	assert_eq!(keys(&missing), ["a", "b", "c", "z"]);
}

#[test]
fn prepend_and_append() {
	let other = OrderedMap::from_pairs([("c", 9), ("d", 4)]);
	assert_eq!(keys(&abc().prepend(&other)), ["c", "d", "a", "b"]);
	assert_eq!(keys(&abc().append(&other)), ["a", "b", "c", "d"]);
	assert_eq!(abc().append(&other).get("c"), Some(&9));
}

#[test]
fn subtract_removes_shared_keys() {
	let other = OrderedMap::from_pairs([("a", 0), ("q", 0)]);
	assert_eq!(keys(&abc().subtract(&other)), ["b", "c"]);
}

#[test]
fn equality_ignores_order() {
	let reordered = OrderedMap::from_pairs([("c", 3), ("a", 1), ("b", 2)]);
	assert_eq!(abc(), reordered);
	assert_ne!(abc(), abc().update("a", 5, None));
}

#[test]
fn json_attrs() {
	let attrs = Attrs::from_json(&json!({"level": 2, "id": null})).unwrap();
	assert_eq!(attrs.get("level"), Some(&json!(2)));
	assert_eq!(attrs.to_json(), json!({"level": 2, "id": null}));
	assert!(Attrs::from_json(&json!(3)).is_none());
}
