//! The built-in `basic` schema: paragraphs, headings, quotes, code blocks,
//! lists, images and line breaks, with link, em, strong and code marks.

use std::sync::LazyLock;

use crate::schema::Schema;
use crate::spec::SchemaSpec;

const BASIC_JSON: &str = include_str!("basic.json");

static BASIC: LazyLock<Schema> = LazyLock::new(|| {
	let spec = SchemaSpec::from_json_str(BASIC_JSON).expect("basic.json: parse failed");
	Schema::new(spec).expect("basic.json: schema compilation failed")
});

/// The shared basic schema.
pub fn schema() -> Schema {
	BASIC.clone()
}

/// The description the basic schema is compiled from, for hosts that want to
/// extend it.
pub fn spec() -> SchemaSpec {
	BASIC.spec().clone()
}
