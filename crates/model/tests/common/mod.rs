//! Node builders over the public API, shared by the integration tests.

#![allow(dead_code)]

use quire_model::{Attrs, Fragment, Node, Schema, basic};
use serde_json::json;

pub fn schema() -> Schema {
	basic::schema()
}

pub fn node(name: &str, attrs: Option<Attrs>, children: Vec<Node>) -> Node {
	schema()
		.node(name, attrs.as_ref(), Fragment::from_array(children), &[])
		.unwrap_or_else(|e| panic!("building {name}: {e}"))
}

pub fn doc(children: Vec<Node>) -> Node {
	node("doc", None, children)
}

pub fn p(children: Vec<Node>) -> Node {
	node("paragraph", None, children)
}

pub fn blockquote(children: Vec<Node>) -> Node {
	node("blockquote", None, children)
}

pub fn h(level: u8, children: Vec<Node>) -> Node {
	node("heading", Some(Attrs::from_pairs([("level", json!(level))])), children)
}

pub fn hr() -> Node {
	node("horizontal_rule", None, vec![])
}

pub fn br() -> Node {
	node("hard_break", None, vec![])
}

pub fn text(value: &str) -> Node {
	schema().text(value, &[]).unwrap_or_else(|e| panic!("building text: {e}"))
}

/// `node` with the named mark added.
pub fn marked(node: Node, mark: &str) -> Node {
	let mark = schema().mark(mark, None).unwrap_or_else(|e| panic!("building mark: {e}"));
	node.mark(&mark.add_to_set(node.marks()))
}
