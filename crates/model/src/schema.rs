//! Compiled schemas: node types, mark types and their attribute rules.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::attrs::Attrs;
use crate::content::{self, ContentMatch, EMPTY_MATCH, MatchState, TypeInfo};
use crate::error::{ModelError, Result, SchemaError};
use crate::fragment::Fragment;
use crate::mark::{Mark, MarkSet};
use crate::node::Node;
use crate::spec::{AttributeSpec, MarkSpec, NodeSpec, SchemaSpec, Whitespace, json_type_name, validate_type};

#[cfg(test)]
mod tests;

pub(crate) struct NodeTypeData {
	pub(crate) name: String,
	pub(crate) spec: NodeSpec,
	pub(crate) groups: Vec<String>,
	pub(crate) default_attrs: Option<Attrs>,
	pub(crate) is_block: bool,
	pub(crate) is_text: bool,
	pub(crate) inline_content: bool,
	pub(crate) content_match: usize,
	/// `None` allows every mark.
	pub(crate) mark_set: Option<Vec<usize>>,
}

impl NodeTypeData {
	pub(crate) fn is_leaf(&self) -> bool {
		self.content_match == EMPTY_MATCH
	}

	pub(crate) fn has_required_attrs(&self) -> bool {
		self.default_attrs.is_none()
	}

	/// Types that content generation may instantiate on its own.
	pub(crate) fn is_generatable(&self) -> bool {
		!(self.is_text || self.has_required_attrs())
	}
}

pub(crate) struct MarkTypeData {
	pub(crate) name: String,
	pub(crate) spec: MarkSpec,
	pub(crate) default_attrs: Option<Attrs>,
	pub(crate) excluded: Vec<usize>,
}

pub(crate) struct SchemaInner {
	pub(crate) spec: SchemaSpec,
	pub(crate) nodes: Vec<NodeTypeData>,
	pub(crate) marks: Vec<MarkTypeData>,
	node_names: FxHashMap<String, usize>,
	mark_names: FxHashMap<String, usize>,
	pub(crate) matches: Vec<MatchState>,
	top: usize,
	text: usize,
	/// Memoized `find_wrapping` results keyed by (match state, target type).
	pub(crate) wrappings: Mutex<FxHashMap<(usize, usize), Option<Vec<usize>>>>,
}

/// A compiled document schema.
///
/// Cheap to clone. Node types, mark types and content matches hold a handle
/// to the schema they belong to; values from different schemas never compare
/// equal.
#[derive(Clone)]
pub struct Schema {
	inner: Arc<SchemaInner>,
}

impl Schema {
	/// Compiles a schema description.
	///
	/// Fails fast on authoring mistakes: unknown names in content expressions,
	/// automata with required positions that only non-generatable types can
	/// fill, unknown marks, and attribute defaults that fail their validator.
	pub fn new(spec: SchemaSpec) -> std::result::Result<Self, SchemaError> {
		for name in spec.nodes.keys() {
			if spec.marks.contains_key(name) {
				return Err(SchemaError::NameClash(name.clone()));
			}
		}
		let top_name = spec.top_node_name().to_string();
		let top = spec
			.nodes
			.get_index_of(&top_name)
			.ok_or_else(|| SchemaError::MissingTopNode(top_name.clone()))?;
		let text = spec.nodes.get_index_of("text").ok_or(SchemaError::MissingText)?;
		if !spec.nodes[text].attrs.is_empty() {
			return Err(SchemaError::TextWithAttributes);
		}

		let mut nodes = Vec::with_capacity(spec.nodes.len());
		for (name, node_spec) in &spec.nodes {
			let is_text = name == "text";
			nodes.push(NodeTypeData {
				name: name.clone(),
				spec: node_spec.clone(),
				groups: split_names(node_spec.group.as_deref()),
				default_attrs: default_attrs(name, &node_spec.attrs)?,
				is_block: !(node_spec.inline || is_text),
				is_text,
				inline_content: false,
				content_match: EMPTY_MATCH,
				mark_set: None,
			});
		}

		let mut matches = vec![MatchState::empty()];
		{
			let infos: Vec<TypeInfo<'_>> = nodes
				.iter()
				.map(|n| TypeInfo {
					name: &n.name,
					groups: &n.groups,
					inline: !n.is_block,
					generatable: n.is_generatable(),
				})
				.collect();
			let mut compiled: FxHashMap<String, usize> = FxHashMap::default();
			let mut assigned = Vec::with_capacity(nodes.len());
			for node in &nodes {
				let expr = node.spec.content.clone().unwrap_or_default();
				let id = match compiled.get(&expr) {
					Some(&id) => id,
					None => {
						let id = content::compile(&expr, &infos, &mut matches)?;
						compiled.insert(expr, id);
						id
					}
				};
				assigned.push(id);
			}
			for (node, id) in nodes.iter_mut().zip(assigned) {
				node.content_match = id;
			}
		}
		let inline_flags: Vec<bool> = nodes
			.iter()
			.map(|n| {
				matches[n.content_match]
					.next
					.first()
					.is_some_and(|&(ty, _)| !nodes[ty].is_block)
			})
			.collect();
		for (node, inline) in nodes.iter_mut().zip(inline_flags) {
			node.inline_content = inline;
		}

		let mut marks = Vec::with_capacity(spec.marks.len());
		for (name, mark_spec) in &spec.marks {
			marks.push(MarkTypeData {
				name: name.clone(),
				spec: mark_spec.clone(),
				default_attrs: default_attrs(name, &mark_spec.attrs)?,
				excluded: Vec::new(),
			});
		}
		let mark_names: FxHashMap<String, usize> =
			marks.iter().enumerate().map(|(i, m)| (m.name.clone(), i)).collect();
		for i in 0..marks.len() {
			let excluded = match marks[i].spec.excludes.as_deref() {
				None => vec![i],
				Some("") => Vec::new(),
				Some(names) => gather_marks(&marks, &mark_names, names)?,
			};
			marks[i].excluded = excluded;
		}
		for node in &mut nodes {
			node.mark_set = match node.spec.marks.as_deref() {
				Some("_") => None,
				Some("") => Some(Vec::new()),
				Some(names) => Some(gather_marks(&marks, &mark_names, names)?),
				None if node.inline_content => None,
				None => Some(Vec::new()),
			};
		}

		let node_names = nodes.iter().enumerate().map(|(i, n)| (n.name.clone(), i)).collect();
		debug!(
			nodes = nodes.len(),
			marks = marks.len(),
			states = matches.len(),
			top = %top_name,
			"compiled schema"
		);
		Ok(Self {
			inner: Arc::new(SchemaInner {
				spec,
				nodes,
				marks,
				node_names,
				mark_names,
				matches,
				top,
				text,
				wrappings: Mutex::new(FxHashMap::default()),
			}),
		})
	}

	pub(crate) fn inner(&self) -> &SchemaInner {
		&self.inner
	}

	/// Returns true if both handles refer to the same compiled schema.
	pub fn ptr_eq(&self, other: &Schema) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// The description this schema was compiled from.
	pub fn spec(&self) -> &SchemaSpec {
		&self.inner.spec
	}

	pub(crate) fn node_type_at(&self, id: usize) -> NodeType {
		NodeType {
			schema: self.clone(),
			id,
		}
	}

	pub(crate) fn mark_type_at(&self, id: usize) -> MarkType {
		MarkType {
			schema: self.clone(),
			id,
		}
	}

	/// Looks up a node type by name.
	pub fn node_type(&self, name: &str) -> Option<NodeType> {
		self.inner.node_names.get(name).map(|&id| self.node_type_at(id))
	}

	/// Looks up a node type by name, failing for unknown names.
	pub fn node_type_checked(&self, name: &str) -> Result<NodeType> {
		self.node_type(name).ok_or_else(|| ModelError::UnknownNodeType(name.to_string()))
	}

	/// Looks up a mark type by name.
	pub fn mark_type(&self, name: &str) -> Option<MarkType> {
		self.inner.mark_names.get(name).map(|&id| self.mark_type_at(id))
	}

	/// Looks up a mark type by name, failing for unknown names.
	pub fn mark_type_checked(&self, name: &str) -> Result<MarkType> {
		self.mark_type(name).ok_or_else(|| ModelError::UnknownMarkType(name.to_string()))
	}

	/// All node types in declaration order.
	pub fn node_types(&self) -> impl Iterator<Item = NodeType> + '_ {
		(0..self.inner.nodes.len()).map(|id| self.node_type_at(id))
	}

	/// All mark types in rank order.
	pub fn mark_types(&self) -> impl Iterator<Item = MarkType> + '_ {
		(0..self.inner.marks.len()).map(|id| self.mark_type_at(id))
	}

	/// The type of the document's root node.
	pub fn top_node_type(&self) -> NodeType {
		self.node_type_at(self.inner.top)
	}

	/// The text node type.
	pub fn text_type(&self) -> NodeType {
		self.node_type_at(self.inner.text)
	}

	/// Creates a text node. Empty text is rejected.
	pub fn text(&self, text: &str, marks: &[Mark]) -> Result<Node> {
		if text.is_empty() {
			return Err(ModelError::EmptyText);
		}
		let ty = self.text_type();
		Ok(Node::new_text(ty, Attrs::new(), text.into(), Mark::set_from(marks)))
	}

	/// Creates a node of the named type.
	pub fn node(&self, name: &str, attrs: Option<&Attrs>, content: Fragment, marks: &[Mark]) -> Result<Node> {
		self.node_type_checked(name)?.create(attrs, content, marks)
	}

	/// Creates a mark of the named type.
	pub fn mark(&self, name: &str, attrs: Option<&Attrs>) -> Result<Mark> {
		self.mark_type_checked(name)?.create(attrs)
	}

	/// Deserializes a node from its JSON form.
	pub fn node_from_json(&self, json: &Value) -> Result<Node> {
		Node::from_json(self, json)
	}

	/// Deserializes a mark from its JSON form.
	pub fn mark_from_json(&self, json: &Value) -> Result<Mark> {
		Mark::from_json(self, json)
	}
}

impl fmt::Debug for Schema {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Schema")
			.field("nodes", &self.inner.nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>())
			.field("marks", &self.inner.marks.iter().map(|m| m.name.as_str()).collect::<Vec<_>>())
			.finish()
	}
}

fn split_names(names: Option<&str>) -> Vec<String> {
	names.map(|g| g.split_whitespace().map(str::to_string).collect()).unwrap_or_default()
}

fn gather_marks(
	marks: &[MarkTypeData],
	names: &FxHashMap<String, usize>,
	list: &str,
) -> std::result::Result<Vec<usize>, SchemaError> {
	let mut found = Vec::new();
	for name in list.split_whitespace() {
		if let Some(&id) = names.get(name) {
			found.push(id);
			continue;
		}
		let mut ok = false;
		for (id, mark) in marks.iter().enumerate() {
			if name == "_" || split_names(mark.spec.group.as_deref()).iter().any(|g| g == name) {
				found.push(id);
				ok = true;
			}
		}
		if !ok {
			return Err(SchemaError::UnknownMark(name.to_string()));
		}
	}
	Ok(found)
}

fn default_attrs(
	owner: &str,
	specs: &IndexMap<String, AttributeSpec>,
) -> std::result::Result<Option<Attrs>, SchemaError> {
	let mut defaults = Vec::with_capacity(specs.len());
	for (name, spec) in specs {
		let Some(default) = &spec.default else {
			return Ok(None);
		};
		if let Some(types) = &spec.validate
			&& !validate_type(types, default)
		{
			return Err(SchemaError::InvalidDefault {
				attr: name.clone(),
				owner: owner.to_string(),
				message: format!("expected {types}, got {}", json_type_name(default)),
			});
		}
		defaults.push((name.clone(), default.clone()));
	}
	Ok(Some(Attrs::from_pairs(defaults)))
}

/// Fills in defaults for missing attributes and drops undeclared ones.
fn compute_attrs(
	specs: &IndexMap<String, AttributeSpec>,
	defaults: Option<&Attrs>,
	given: Option<&Attrs>,
) -> Result<Attrs> {
	let Some(given) = given else {
		if let Some(defaults) = defaults {
			return Ok(defaults.clone());
		}
		return compute_attrs(specs, None, Some(&Attrs::new()));
	};
	let mut built = Vec::with_capacity(specs.len());
	for (name, spec) in specs {
		let value = match (given.get(name), &spec.default) {
			(Some(value), _) => value.clone(),
			(None, Some(default)) => default.clone(),
			(None, None) => return Err(ModelError::MissingAttribute { attr: name.clone() }),
		};
		built.push((name.clone(), value));
	}
	Ok(Attrs::from_pairs(built))
}

fn check_attrs(specs: &IndexMap<String, AttributeSpec>, values: &Attrs, kind: &str, owner: &str) -> Result<()> {
	for name in values.keys() {
		if !specs.contains_key(name) {
			return Err(ModelError::UnsupportedAttribute {
				attr: name.to_string(),
				owner: format!("{kind} of type {owner}"),
			});
		}
	}
	for (name, spec) in specs {
		let (Some(types), Some(value)) = (&spec.validate, values.get(name)) else {
			continue;
		};
		if !validate_type(types, value) {
			return Err(ModelError::InvalidAttribute {
				attr: name.clone(),
				owner: owner.to_string(),
				expected: types.clone(),
				found: json_type_name(value).to_string(),
			});
		}
	}
	Ok(())
}

/// A node type of a compiled schema.
#[derive(Clone)]
pub struct NodeType {
	schema: Schema,
	id: usize,
}

impl NodeType {
	fn data(&self) -> &NodeTypeData {
		&self.schema.inner.nodes[self.id]
	}

	pub(crate) fn id(&self) -> usize {
		self.id
	}

	/// The schema this type belongs to.
	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// The type's name.
	pub fn name(&self) -> &str {
		&self.data().name
	}

	/// The spec the type was compiled from.
	pub fn spec(&self) -> &NodeSpec {
		&self.data().spec
	}

	/// Groups this type belongs to.
	pub fn groups(&self) -> &[String] {
		&self.data().groups
	}

	/// Returns true if the type is a member of `group`.
	pub fn is_in_group(&self, group: &str) -> bool {
		self.data().groups.iter().any(|g| g == group)
	}

	/// Block-level type (not inline, not text).
	pub fn is_block(&self) -> bool {
		self.data().is_block
	}

	/// Inline type.
	pub fn is_inline(&self) -> bool {
		!self.data().is_block
	}

	/// The text type.
	pub fn is_text(&self) -> bool {
		self.data().is_text
	}

	/// Whether the content expression starts with inline content.
	pub fn inline_content(&self) -> bool {
		self.data().inline_content
	}

	/// Block type with inline content.
	pub fn is_textblock(&self) -> bool {
		self.data().is_block && self.data().inline_content
	}

	/// Type that can not have content.
	pub fn is_leaf(&self) -> bool {
		self.data().is_leaf()
	}

	/// Leaf, or a node flagged as an atom.
	pub fn is_atom(&self) -> bool {
		self.is_leaf() || self.data().spec.atom
	}

	/// Whitespace handling of this type's content.
	pub fn whitespace(&self) -> Whitespace {
		self.data().spec.whitespace.unwrap_or(if self.data().spec.code {
			Whitespace::Pre
		} else {
			Whitespace::Normal
		})
	}

	/// Returns true if some attribute has no default.
	pub fn has_required_attrs(&self) -> bool {
		self.data().has_required_attrs()
	}

	/// Attribute values used when none are given, if every attribute has a
	/// default.
	pub fn default_attrs(&self) -> Option<&Attrs> {
		self.data().default_attrs.as_ref()
	}

	/// Returns true if content valid for `other` may also fit this type.
	pub fn compatible_content(&self, other: &NodeType) -> bool {
		self == other || self.content_match().compatible(&other.content_match())
	}

	/// The start state of this type's content automaton.
	pub fn content_match(&self) -> ContentMatch {
		ContentMatch::new(self.schema.clone(), self.data().content_match)
	}

	/// Computes the full attribute set for a node of this type.
	pub fn compute_attrs(&self, attrs: Option<&Attrs>) -> Result<Attrs> {
		let data = self.data();
		compute_attrs(&data.spec.attrs, data.default_attrs.as_ref(), attrs)
	}

	/// Validates attribute names and types.
	pub fn check_attrs(&self, attrs: &Attrs) -> Result<()> {
		check_attrs(&self.data().spec.attrs, attrs, "node", self.name())
	}

	/// Creates a node of this type without checking its content.
	pub fn create(&self, attrs: Option<&Attrs>, content: Fragment, marks: &[Mark]) -> Result<Node> {
		if self.is_text() {
			return Err(ModelError::TextNodeCreate);
		}
		Ok(Node::new(self.clone(), self.compute_attrs(attrs)?, content, Mark::set_from(marks)))
	}

	/// Creates a node, failing if `content` does not match the type's content
	/// expression.
	pub fn create_checked(&self, attrs: Option<&Attrs>, content: Fragment, marks: &[Mark]) -> Result<Node> {
		self.check_content(&content)?;
		self.create(attrs, content, marks)
	}

	/// Creates a node, completing `content` with the minimal fill needed to
	/// make it valid. Returns `Ok(None)` when no valid fill exists.
	pub fn create_and_fill(&self, attrs: Option<&Attrs>, content: Fragment, marks: &[Mark]) -> Result<Option<Node>> {
		let attrs = self.compute_attrs(attrs)?;
		let mut content = content;
		if content.size() > 0 {
			let Some(before) = self.content_match().fill_before(&content, false, 0) else {
				return Ok(None);
			};
			content = before.append(&content);
		}
		let Some(matched) = self.content_match().match_fragment(&content) else {
			return Ok(None);
		};
		let Some(after) = matched.fill_before(&Fragment::empty(), true, 0) else {
			return Ok(None);
		};
		if self.is_text() {
			return Err(ModelError::TextNodeCreate);
		}
		Ok(Some(Node::new(
			self.clone(),
			attrs,
			content.append(&after),
			Mark::set_from(marks),
		)))
	}

	/// Returns true if `content` is valid content for this type.
	pub fn valid_content(&self, content: &Fragment) -> bool {
		let Some(result) = self.content_match().match_fragment(content) else {
			return false;
		};
		result.valid_end() && content.iter().all(|child| self.allows_marks(child.marks()))
	}

	/// Fails with [`ModelError::InvalidContent`] unless `content` is valid.
	pub fn check_content(&self, content: &Fragment) -> Result<()> {
		if self.valid_content(content) {
			return Ok(());
		}
		let mut rendered = content.to_string();
		if rendered.chars().count() > 50 {
			rendered = rendered.chars().take(49).collect::<String>() + "…";
		}
		Err(ModelError::InvalidContent {
			node_type: self.name().to_string(),
			content: rendered,
		})
	}

	/// Returns true if marks of `mark_type` may appear in this type's content.
	pub fn allows_mark_type(&self, mark_type: &MarkType) -> bool {
		match &self.data().mark_set {
			None => true,
			Some(set) => self.schema.ptr_eq(&mark_type.schema) && set.contains(&mark_type.id),
		}
	}

	/// Returns true if every mark is allowed.
	pub fn allows_marks(&self, marks: &[Mark]) -> bool {
		self.data().mark_set.is_none() || marks.iter().all(|m| self.allows_mark_type(m.mark_type()))
	}

	/// Filters `marks` down to those allowed in this type.
	pub fn allowed_marks(&self, marks: &[Mark]) -> MarkSet {
		if self.data().mark_set.is_none() {
			return marks.iter().cloned().collect();
		}
		marks.iter().filter(|m| self.allows_mark_type(m.mark_type())).cloned().collect()
	}
}

impl PartialEq for NodeType {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.schema.ptr_eq(&other.schema)
	}
}

impl Eq for NodeType {}

impl Hash for NodeType {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for NodeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "NodeType({})", self.name())
	}
}

impl fmt::Display for NodeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A mark type of a compiled schema.
#[derive(Clone)]
pub struct MarkType {
	schema: Schema,
	id: usize,
}

impl MarkType {
	fn data(&self) -> &MarkTypeData {
		&self.schema.inner.marks[self.id]
	}

	/// The schema this type belongs to.
	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// The type's name.
	pub fn name(&self) -> &str {
		&self.data().name
	}

	/// The spec the type was compiled from.
	pub fn spec(&self) -> &MarkSpec {
		&self.data().spec
	}

	/// Sort position of marks of this type within a mark set.
	pub fn rank(&self) -> usize {
		self.id
	}

	/// Whether the mark extends to content inserted at its end.
	pub fn is_inclusive(&self) -> bool {
		self.data().spec.inclusive != Some(false)
	}

	/// Whether the mark may span several adjacent nodes.
	pub fn spanning(&self) -> bool {
		self.data().spec.spanning != Some(false)
	}

	/// Creates a mark of this type.
	pub fn create(&self, attrs: Option<&Attrs>) -> Result<Mark> {
		let data = self.data();
		let attrs = compute_attrs(&data.spec.attrs, data.default_attrs.as_ref(), attrs)?;
		Ok(Mark::new(self.clone(), attrs))
	}

	/// Validates attribute names and types.
	pub fn check_attrs(&self, attrs: &Attrs) -> Result<()> {
		check_attrs(&self.data().spec.attrs, attrs, "mark", self.name())
	}

	/// Removes all marks of this type from `set`.
	pub fn remove_from_set(&self, set: &[Mark]) -> MarkSet {
		set.iter().filter(|m| m.mark_type() != self).cloned().collect()
	}

	/// Finds the mark of this type in `set`.
	pub fn is_in_set<'a>(&self, set: &'a [Mark]) -> Option<&'a Mark> {
		set.iter().find(|m| m.mark_type() == self)
	}

	/// Returns true if marks of this type exclude marks of `other`.
	pub fn excludes(&self, other: &MarkType) -> bool {
		self.schema.ptr_eq(&other.schema) && self.data().excluded.contains(&other.id)
	}
}

impl PartialEq for MarkType {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.schema.ptr_eq(&other.schema)
	}
}

impl Eq for MarkType {}

impl Hash for MarkType {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for MarkType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "MarkType({})", self.name())
	}
}

impl fmt::Display for MarkType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A node type paired with the attributes to create it with.
///
/// Used by wrapping and splitting helpers to describe nodes that do not
/// exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
	/// The type to create.
	pub node_type: NodeType,
	/// Attributes, or `None` for the type's defaults.
	pub attrs: Option<Attrs>,
}

impl NodeTemplate {
	/// A template using the type's default attributes.
	pub fn new(node_type: NodeType) -> Self {
		Self { node_type, attrs: None }
	}

	/// A template with explicit attributes.
	pub fn with_attrs(node_type: NodeType, attrs: Attrs) -> Self {
		Self {
			node_type,
			attrs: Some(attrs),
		}
	}
}
