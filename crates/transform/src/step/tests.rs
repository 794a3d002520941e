use pretty_assertions::assert_eq;
use quire_model::test_builder::{a, blockquote, doc, em, h, img, mark, p, pre, schema, t};
use quire_model::{Attrs, Schema, SchemaSpec};
use serde_json::json;

use super::*;
use crate::map::{Mapping, StepMap};
use crate::registry::StepRegistry;

fn hello() -> Node {
	doc(vec![p(vec![t("hello")])])
}

fn quoted() -> Node {
	doc(vec![blockquote(vec![p(vec![t("a")])])])
}

fn lift() -> Step {
	Step::ReplaceAround {
		from: 0,
		to: 5,
		gap_from: 1,
		gap_to: 4,
		slice: Slice::empty(),
		insert: 0,
		structure: true,
	}
}

fn link(href: &str) -> Mark {
	schema()
		.mark("link", Some(&Attrs::from_pairs([("href", json!(href))])))
		.unwrap()
}

fn text_slice(text: &str) -> Slice {
	Slice::new(Fragment::from_node(t(text)), 0, 0)
}

fn assert_inverts(step: &Step, doc: &Node) {
	let applied = step.apply(doc).unwrap();
	let inverted = step.invert(doc).unwrap();
	assert_eq!(inverted.apply(&applied).unwrap(), *doc, "{step:?}");
}

#[test]
fn replace_applies_and_inverts() {
	let step = Step::replace(3, 3, text_slice("X"));
	assert_eq!(step.apply(&hello()).unwrap(), doc(vec![p(vec![t("heXllo")])]));
	assert_inverts(&step, &hello());
	assert_inverts(&Step::replace(2, 5, Slice::empty()), &hello());
}

#[test]
fn replace_failure_leaves_message() {
	let slice = Slice::new(Fragment::from_node(blockquote(vec![p(vec![t("q")])])), 3, 0);
	let failure = Step::replace(3, 3, slice).apply(&hello()).unwrap_err();
	assert_eq!(failure.message, "Inserted content deeper than insertion position");
}

#[test]
fn structure_replace_refuses_to_drop_content() {
	let d = doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]);
	let join = Step::Replace {
		from: 3,
		to: 5,
		slice: Slice::empty(),
		structure: true,
	};
	assert_eq!(join.apply(&d).unwrap(), doc(vec![p(vec![t("abcd")])]));

	let greedy = Step::Replace {
		from: 2,
		to: 5,
		slice: Slice::empty(),
		structure: true,
	};
	assert_eq!(greedy.apply(&d).unwrap_err().message, "Structure replace would overwrite content");
}

#[test]
fn replace_around_lifts_content() {
	let step = lift();
	assert_eq!(step.apply(&quoted()).unwrap(), doc(vec![p(vec![t("a")])]));
	assert_inverts(&step, &quoted());

	let map = step.get_map();
	let inside = map.map_result(2, Bias::Right);
	assert_eq!(inside.pos, 1);
	assert!(!inside.deleted_across());
}

#[test]
fn replace_around_requires_flat_gap() {
	let step = Step::ReplaceAround {
		from: 0,
		to: 5,
		gap_from: 2,
		gap_to: 4,
		slice: Slice::empty(),
		insert: 0,
		structure: false,
	};
	assert_eq!(step.apply(&quoted()).unwrap_err().message, "Gap is not a flat range");
}

#[test]
fn replace_around_requires_fitting_gap() {
	let step = Step::ReplaceAround {
		from: 0,
		to: 5,
		gap_from: 1,
		gap_to: 4,
		slice: Slice::new(Fragment::from_node(pre("")), 0, 0),
		insert: 1,
		structure: false,
	};
	assert_eq!(step.apply(&quoted()).unwrap_err().message, "Content does not fit in gap");
}

#[test]
fn mark_steps_apply_and_invert() {
	let add = Step::AddMark {
		from: 2,
		to: 4,
		mark: mark("em"),
	};
	assert_eq!(
		add.apply(&hello()).unwrap(),
		doc(vec![p(vec![t("h"), em(t("el")), t("lo")])])
	);
	assert_inverts(&add, &hello());

	let marked = doc(vec![p(vec![em(t("hello"))])]);
	let remove = Step::RemoveMark {
		from: 1,
		to: 6,
		mark: mark("em"),
	};
	assert_eq!(remove.apply(&marked).unwrap(), hello());
	assert_inverts(&remove, &marked);
}

#[test]
fn add_mark_skips_parents_that_disallow_it() {
	let code = doc(vec![pre("code")]);
	let add = Step::AddMark {
		from: 1,
		to: 3,
		mark: mark("em"),
	};
	assert_eq!(add.apply(&code).unwrap(), code);
}

#[test]
fn node_mark_steps() {
	let d = doc(vec![p(vec![img("i.png")])]);
	let add = Step::AddNodeMark { pos: 1, mark: mark("em") };
	let marked = add.apply(&d).unwrap();
	assert_eq!(marked.node_at(1).unwrap().marks(), [mark("em")]);
	assert_inverts(&add, &d);

	let remove = Step::RemoveNodeMark { pos: 1, mark: mark("em") };
	assert_eq!(remove.apply(&marked).unwrap(), d);
	assert_eq!(remove.invert(&d).unwrap(), remove);

	let missing = Step::AddNodeMark { pos: 9, mark: mark("em") };
	assert_eq!(missing.apply(&d).unwrap_err().message, "No node at mark step's position");
}

#[test]
fn replacing_an_exclusive_node_mark_inverts_to_the_old_mark() {
	let d = doc(vec![p(vec![a("old", img("i.png"))])]);
	let step = Step::AddNodeMark { pos: 1, mark: link("new") };
	assert_eq!(step.invert(&d).unwrap(), Step::AddNodeMark { pos: 1, mark: link("old") });
	assert_inverts(&step, &d);
}

#[test]
fn attr_step_sets_one_attribute() {
	let d = doc(vec![h(1, vec![t("x")])]);
	let step = Step::Attr {
		pos: 0,
		attr: "level".into(),
		value: json!(3),
	};
	assert_eq!(step.apply(&d).unwrap(), doc(vec![h(3, vec![t("x")])]));
	assert_eq!(
		step.invert(&d).unwrap(),
		Step::Attr {
			pos: 0,
			attr: "level".into(),
			value: json!(1)
		}
	);
	assert_inverts(&step, &d);

	let missing = Step::Attr {
		pos: 7,
		attr: "level".into(),
		value: json!(2),
	};
	assert_eq!(missing.apply(&d).unwrap_err().message, "No node at attribute step's position");
}

#[test]
fn doc_attr_step_sets_document_attributes() {
	let spec = SchemaSpec::from_json_str(
		r#"{"nodes": {
			"doc": {"content": "paragraph+", "attrs": {"lang": {"default": "en"}}},
			"paragraph": {"content": "text*"},
			"text": {}
		}}"#,
	)
	.unwrap();
	let schema = Schema::new(spec).unwrap();
	let para = schema.node("paragraph", None, Fragment::empty(), &[]).unwrap();
	let d = schema.node("doc", None, Fragment::from_node(para), &[]).unwrap();

	let step = Step::DocAttr {
		attr: "lang".into(),
		value: json!("de"),
	};
	let changed = step.apply(&d).unwrap();
	assert_eq!(changed.attrs().get("lang"), Some(&json!("de")));
	assert_eq!(step.invert(&d).unwrap(), Step::DocAttr {
		attr: "lang".into(),
		value: json!("en")
	});
	assert_eq!(step.map(&StepMap::offset(4)), Some(step.clone()));
}

#[test]
fn replace_maps_through_changes() {
	let step = Step::replace(2, 4, Slice::empty());
	assert_eq!(step.map(&StepMap::new([(0, 0, 3)])), Some(Step::replace(5, 7, Slice::empty())));

	let inner = Step::replace(3, 4, Slice::empty());
	assert_eq!(inner.map(&StepMap::new([(2, 4, 0)])), None);
}

#[test]
fn replace_around_is_dropped_when_gap_escapes() {
	let shifted = lift().map(&Mapping::from_maps(vec![StepMap::new([(0, 0, 2)])]));
	assert_eq!(
		shifted,
		Some(Step::ReplaceAround {
			from: 2,
			to: 7,
			gap_from: 3,
			gap_to: 6,
			slice: Slice::empty(),
			insert: 0,
			structure: true,
		})
	);

	let step = Step::ReplaceAround {
		from: 2,
		to: 8,
		gap_from: 3,
		gap_to: 7,
		slice: Slice::empty(),
		insert: 0,
		structure: false,
	};
	assert_eq!(step.map(&StepMap::new([(1, 3, 3)])), None);
}

#[test]
fn mark_steps_drop_when_collapsed() {
	let add = Step::AddMark {
		from: 2,
		to: 4,
		mark: mark("em"),
	};
	assert_eq!(add.map(&StepMap::new([(1, 4, 0)])), None);
	assert_eq!(
		add.map(&StepMap::new([(0, 0, 1)])),
		Some(Step::AddMark {
			from: 3,
			to: 5,
			mark: mark("em")
		})
	);
}

#[test]
fn node_steps_drop_when_node_deleted() {
	let step = Step::Attr {
		pos: 2,
		attr: "level".into(),
		value: json!(2),
	};
	assert_eq!(step.map(&StepMap::new([(1, 3, 0)])), None);
	assert_eq!(
		step.map(&StepMap::new([(0, 0, 2)])),
		Some(Step::Attr {
			pos: 4,
			attr: "level".into(),
			value: json!(2)
		})
	);
}

#[test]
fn adjacent_replaces_merge() {
	let first = Step::replace(2, 2, text_slice("a"));
	let second = Step::replace(3, 3, text_slice("b"));
	assert_eq!(first.merge(&second), Some(Step::replace(2, 2, text_slice("ab"))));

	let backspace = Step::replace(4, 5, Slice::empty());
	let again = Step::replace(3, 4, Slice::empty());
	assert_eq!(backspace.merge(&again), Some(Step::replace(3, 5, Slice::empty())));

	assert_eq!(first.merge(&Step::replace(7, 7, text_slice("c"))), None);
}

#[test]
fn overlapping_mark_steps_merge() {
	let a = Step::AddMark {
		from: 1,
		to: 3,
		mark: mark("em"),
	};
	let b = Step::AddMark {
		from: 2,
		to: 5,
		mark: mark("em"),
	};
	assert_eq!(
		a.merge(&b),
		Some(Step::AddMark {
			from: 1,
			to: 5,
			mark: mark("em")
		})
	);
	let other = Step::AddMark {
		from: 2,
		to: 5,
		mark: mark("strong"),
	};
	assert_eq!(a.merge(&other), None);
}

#[test]
fn json_uses_step_tags() {
	let add = Step::AddMark {
		from: 2,
		to: 4,
		mark: mark("em"),
	};
	assert_eq!(add.to_json(), json!({"stepType": "addMark", "mark": {"type": "em"}, "from": 2, "to": 4}));
	assert_eq!(
		Step::replace(1, 3, Slice::empty()).to_json(),
		json!({"stepType": "replace", "from": 1, "to": 3})
	);
	assert_eq!(lift().to_json()["structure"], json!(true));
}

#[test]
fn json_round_trips_through_registry() {
	let registry = StepRegistry::with_builtins();
	let steps = [
		Step::replace(3, 3, text_slice("X")),
		lift(),
		Step::RemoveMark {
			from: 1,
			to: 2,
			mark: link("x"),
		},
		Step::AddNodeMark { pos: 1, mark: mark("em") },
		Step::RemoveNodeMark { pos: 1, mark: mark("em") },
		Step::Attr {
			pos: 0,
			attr: "level".into(),
			value: json!(2),
		},
		Step::DocAttr {
			attr: "lang".into(),
			value: json!(null),
		},
	];
	for step in steps {
		let decoded = registry.step_from_json(&schema(), &step.to_json()).unwrap();
		assert_eq!(decoded, step);
	}
}
