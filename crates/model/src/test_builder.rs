//! Terse node builders over the [basic](crate::basic) schema.
//!
//! ```ignore
//! let d = doc(vec![p(vec![t("he"), em(t("llo"))])]);
//! assert_eq!(d.to_string(), r#"doc(paragraph("he", em("llo")))"#);
//! ```
//!
//! Builders panic on invalid input.

use serde_json::json;

use crate::attrs::Attrs;
use crate::basic;
use crate::fragment::Fragment;
use crate::mark::Mark;
use crate::node::Node;
use crate::schema::Schema;

/// The basic schema.
pub fn schema() -> Schema {
	basic::schema()
}

fn node(name: &str, attrs: Option<Attrs>, children: Vec<Node>) -> Node {
	schema()
		.node(name, attrs.as_ref(), Fragment::from_array(children), &[])
		.unwrap_or_else(|e| panic!("building {name}: {e}"))
}

fn marked(node: Node, name: &str, attrs: Option<Attrs>) -> Node {
	let mark = schema()
		.mark(name, attrs.as_ref())
		.unwrap_or_else(|e| panic!("building mark {name}: {e}"));
	let marks = mark.add_to_set(node.marks());
	node.mark(&marks)
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

/// A code block holding `text`.
pub fn pre(text: &str) -> Node {
	let children = if text.is_empty() { vec![] } else { vec![t(text)] };
	node("code_block", None, children)
}

pub fn ul(children: Vec<Node>) -> Node {
	node("bullet_list", None, children)
}

pub fn ol(children: Vec<Node>) -> Node {
	node("ordered_list", None, children)
}

pub fn li(children: Vec<Node>) -> Node {
	node("list_item", None, children)
}

pub fn hr() -> Node {
	node("horizontal_rule", None, vec![])
}

pub fn br() -> Node {
	node("hard_break", None, vec![])
}

pub fn img(src: &str) -> Node {
	node("image", Some(Attrs::from_pairs([("src", json!(src))])), vec![])
}

/// A plain text node.
pub fn t(text: &str) -> Node {
	schema().text(text, &[]).unwrap_or_else(|e| panic!("building text: {e}"))
}

pub fn em(node: Node) -> Node {
	marked(node, "em", None)
}

pub fn strong(node: Node) -> Node {
	marked(node, "strong", None)
}

pub fn code(node: Node) -> Node {
	marked(node, "code", None)
}

pub fn a(href: &str, node: Node) -> Node {
	marked(node, "link", Some(Attrs::from_pairs([("href", json!(href))])))
}

/// A mark of the basic schema with default attributes.
pub fn mark(name: &str) -> Mark {
	schema().mark(name, None).unwrap_or_else(|e| panic!("building mark {name}: {e}"))
}
