//! Selections: text ranges, selected nodes and the whole document.
//!
//! Every selection variant exposes resolved anchor/head/from/to positions,
//! maps through position changes and knows how to replace its content in a
//! [`Transaction`]. After a replace, the selection is moved to the end of the
//! inserted content.

use quire_model::{Fragment, Node, ResolvedPos, Slice};
use quire_transform::{Bias, Mappable, Step};
use serde_json::{Value, json};
use tracing::warn;

use crate::error::{Result, StateError};
use crate::transaction::Transaction;


fn flip(bias: Bias) -> Bias {
	match bias {
		Bias::Left => Bias::Right,
		Bias::Right => Bias::Left,
	}
}

/// One contiguous selected range.
#[derive(Debug, Clone)]
pub struct SelectionRange {
	from: ResolvedPos,
	to: ResolvedPos,
}

impl SelectionRange {
	pub fn new(from: ResolvedPos, to: ResolvedPos) -> Self {
		Self { from, to }
	}

	pub fn from(&self) -> &ResolvedPos {
		&self.from
	}

	pub fn to(&self) -> &ResolvedPos {
		&self.to
	}
}

/// A cursor or range of inline content. The anchor stays put while the
/// head moves; either may come first.
#[derive(Debug, Clone)]
pub struct TextSelection {
	anchor: ResolvedPos,
	head: ResolvedPos,
}

impl TextSelection {
	pub fn new(anchor: ResolvedPos, head: ResolvedPos) -> Self {
		for end in [&anchor, &head] {
			if !end.parent().inline_content() {
				warn!(pos = end.pos(), "text selection endpoint not in inline content");
			}
		}
		Self { anchor, head }
	}

	/// Resolves `anchor` and `head` in `doc`.
	pub fn create(doc: &Node, anchor: usize, head: usize) -> Result<Self> {
		Ok(Self::new(doc.resolve(anchor)?, doc.resolve(head)?))
	}

	/// A collapsed selection at `pos`.
	pub fn cursor(doc: &Node, pos: usize) -> Result<Self> {
		Self::create(doc, pos, pos)
	}

	/// A text selection between the given positions, moving endpoints that
	/// do not point into inline content to the nearest valid spot.
	/// `bias` picks the search direction for a collapsed selection.
	pub fn between(anchor: &ResolvedPos, head: &ResolvedPos, bias: Option<Bias>) -> Result<Selection> {
		let forward = anchor.pos() >= head.pos();
		let collapsed = anchor.pos() == head.pos();
		let bias = match bias {
			Some(bias) if collapsed => bias,
			_ if forward => Bias::Right,
			_ => Bias::Left,
		};
		let mut head = head.clone();
		if !head.parent().inline_content() {
			let found = match Selection::find_from(&head, bias, true)? {
				Some(found) => Some(found),
				None => Selection::find_from(&head, flip(bias), true)?,
			};
			match found {
				Some(found) => head = found.resolved_head().clone(),
				None => return Selection::near(&head, bias),
			}
		}
		let mut anchor = anchor.clone();
		if !anchor.parent().inline_content() {
			if collapsed {
				anchor = head.clone();
			} else {
				let found = match Selection::find_from(&anchor, flip(bias), true)? {
					Some(found) => Some(found),
					None => Selection::find_from(&anchor, bias, true)?,
				};
				anchor = found.map_or_else(|| head.clone(), |s| s.resolved_anchor().clone());
				if (anchor.pos() < head.pos()) == forward {
					anchor = head.clone();
				}
			}
		}
		Ok(TextSelection::new(anchor, head).into())
	}

	pub fn anchor(&self) -> &ResolvedPos {
		&self.anchor
	}

	pub fn head(&self) -> &ResolvedPos {
		&self.head
	}

	/// The head, when the selection is collapsed.
	pub fn cursor_pos(&self) -> Option<&ResolvedPos> {
		(self.anchor.pos() == self.head.pos()).then_some(&self.head)
	}
}

/// A single selected node.
#[derive(Debug, Clone)]
pub struct NodeSelection {
	from: ResolvedPos,
	to: ResolvedPos,
	node: Node,
}

impl NodeSelection {
	/// Selects the node after `pos`.
	pub fn new(pos: ResolvedPos) -> Result<Self> {
		let node = pos.node_after().ok_or(StateError::NoNodeToSelect { pos: pos.pos() })?;
		let to = pos.doc().resolve(pos.pos() + node.node_size())?;
		Ok(Self { from: pos, to, node })
	}

	pub fn create(doc: &Node, from: usize) -> Result<Self> {
		Self::new(doc.resolve(from)?)
	}

	/// Whether `node` can be the target of a node selection.
	pub fn is_selectable(node: &Node) -> bool {
		!node.is_text() && node.node_type().spec().selectable != Some(false)
	}

	pub fn node(&self) -> &Node {
		&self.node
	}
}

/// The whole document.
#[derive(Debug, Clone)]
pub struct AllSelection {
	from: ResolvedPos,
	to: ResolvedPos,
}

impl AllSelection {
	pub fn new(doc: &Node) -> Result<Self> {
		Ok(Self {
			from: doc.resolve(0)?,
			to: doc.resolve(doc.content().size())?,
		})
	}
}

#[derive(Debug, Clone)]
pub enum Selection {
	Text(TextSelection),
	Node(NodeSelection),
	All(AllSelection),
}

impl From<TextSelection> for Selection {
	fn from(selection: TextSelection) -> Self {
		Selection::Text(selection)
	}
}

impl From<NodeSelection> for Selection {
	fn from(selection: NodeSelection) -> Self {
		Selection::Node(selection)
	}
}

impl From<AllSelection> for Selection {
	fn from(selection: AllSelection) -> Self {
		Selection::All(selection)
	}
}

impl PartialEq for Selection {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Selection::Text(a), Selection::Text(b)) => {
				a.anchor.pos() == b.anchor.pos() && a.head.pos() == b.head.pos()
			}
			(Selection::Node(a), Selection::Node(b)) => a.from.pos() == b.from.pos(),
			(Selection::All(_), Selection::All(_)) => true,
			_ => false,
		}
	}
}

impl Selection {
	pub fn resolved_anchor(&self) -> &ResolvedPos {
		match self {
			Selection::Text(s) => &s.anchor,
			Selection::Node(s) => &s.from,
			Selection::All(s) => &s.from,
		}
	}

	pub fn resolved_head(&self) -> &ResolvedPos {
		match self {
			Selection::Text(s) => &s.head,
			Selection::Node(s) => &s.to,
			Selection::All(s) => &s.to,
		}
	}

	/// The lower bound of the selection.
	pub fn resolved_from(&self) -> &ResolvedPos {
		match self {
			Selection::Text(s) if s.head.pos() < s.anchor.pos() => &s.head,
			Selection::Text(s) => &s.anchor,
			Selection::Node(s) => &s.from,
			Selection::All(s) => &s.from,
		}
	}

	/// The upper bound of the selection.
	pub fn resolved_to(&self) -> &ResolvedPos {
		match self {
			Selection::Text(s) if s.head.pos() < s.anchor.pos() => &s.anchor,
			Selection::Text(s) => &s.head,
			Selection::Node(s) => &s.to,
			Selection::All(s) => &s.to,
		}
	}

	pub fn anchor(&self) -> usize {
		self.resolved_anchor().pos()
	}

	pub fn head(&self) -> usize {
		self.resolved_head().pos()
	}

	pub fn from(&self) -> usize {
		self.resolved_from().pos()
	}

	pub fn to(&self) -> usize {
		self.resolved_to().pos()
	}

	pub fn empty(&self) -> bool {
		self.from() == self.to()
	}

	/// The selected ranges. Built-in selections have exactly one.
	pub fn ranges(&self) -> Vec<SelectionRange> {
		vec![SelectionRange::new(self.resolved_from().clone(), self.resolved_to().clone())]
	}

	/// The selected content, open as far as its endpoints are.
	pub fn content(&self) -> Result<Slice> {
		match self {
			Selection::Node(s) => Ok(Slice::new(Fragment::from_node(s.node.clone()), 0, 0)),
			_ => Ok(self.resolved_from().doc().slice(self.from(), self.to(), true)?),
		}
	}

	/// Replaces the selection with `content` and moves the transaction's
	/// selection to the end of the inserted content.
	pub fn replace(&self, tr: &mut Transaction, content: Slice) -> Result<()> {
		let deleting = content == Slice::empty();
		if let Selection::All(_) = self
			&& deleting
		{
			let size = tr.doc().content().size();
			tr.delete(0, size)?;
			let start = Selection::at_start(tr.doc())?;
			if start != tr.selection()? {
				tr.set_selection(start)?;
			}
			return Ok(());
		}

		let mut last_node = content.content().last_child().cloned();
		let mut last_parent = None;
		for _ in 0..content.open_end() {
			last_parent = last_node.clone();
			last_node = last_node.and_then(|n| n.last_child().cloned());
		}
		let inline_end = match &last_node {
			Some(node) => node.is_inline(),
			None => last_parent.as_ref().is_some_and(Node::is_textblock),
		};

		let map_from = tr.steps().len();
		tr.replace_range(self.from(), self.to(), content)?;
		selection_to_insertion_end(tr, map_from, if inline_end { Bias::Left } else { Bias::Right })?;

		if let Selection::Text(_) = self
			&& deleting
			&& let Some(marks) = self.resolved_from().marks_across(self.resolved_to())
		{
			tr.ensure_marks(&marks)?;
		}
		Ok(())
	}

	/// Replaces the selection with `node` and moves the transaction's
	/// selection after it.
	pub fn replace_with(&self, tr: &mut Transaction, node: Node) -> Result<()> {
		let map_from = tr.steps().len();
		let bias = if node.is_inline() { Bias::Left } else { Bias::Right };
		tr.replace_range_with(self.from(), self.to(), node)?;
		selection_to_insertion_end(tr, map_from, bias)
	}

	/// Maps the selection into `doc`, the document produced by the changes
	/// `mapping` describes.
	pub fn map<M: Mappable + ?Sized>(&self, doc: &Node, mapping: &M) -> Result<Selection> {
		match self {
			Selection::Text(s) => {
				let head = doc.resolve(mapping.map(s.head.pos(), Bias::Right))?;
				if !head.parent().inline_content() {
					return Selection::near(&head, Bias::Right);
				}
				let anchor = doc.resolve(mapping.map(s.anchor.pos(), Bias::Right))?;
				let anchor = if anchor.parent().inline_content() { anchor } else { head.clone() };
				Ok(TextSelection::new(anchor, head).into())
			}
			Selection::Node(s) => {
				let result = mapping.map_result(s.from.pos(), Bias::Right);
				let pos = doc.resolve(result.pos)?;
				if result.deleted() {
					return Selection::near(&pos, Bias::Right);
				}
				match NodeSelection::new(pos.clone()) {
					Ok(selection) => Ok(selection.into()),
					Err(_) => Selection::near(&pos, Bias::Right),
				}
			}
			Selection::All(_) => Ok(AllSelection::new(doc)?.into()),
		}
	}

	pub fn to_json(&self) -> Value {
		match self {
			Selection::Text(s) => json!({"type": "text", "anchor": s.anchor.pos(), "head": s.head.pos()}),
			Selection::Node(s) => json!({"type": "node", "anchor": s.from.pos()}),
			Selection::All(_) => json!({"type": "all"}),
		}
	}

	pub fn from_json(doc: &Node, json: &Value) -> Result<Selection> {
		let kind = json
			.get("type")
			.and_then(Value::as_str)
			.ok_or(StateError::InvalidJson("Selection"))?;
		let pos = |key: &str, owner: &'static str| {
			json.get(key)
				.and_then(Value::as_u64)
				.and_then(|n| usize::try_from(n).ok())
				.ok_or(StateError::InvalidJson(owner))
		};
		match kind {
			"text" => Ok(TextSelection::create(doc, pos("anchor", "TextSelection")?, pos("head", "TextSelection")?)?.into()),
			"node" => Ok(NodeSelection::create(doc, pos("anchor", "NodeSelection")?)?.into()),
			"all" => Ok(AllSelection::new(doc)?.into()),
			other => Err(StateError::UnknownSelectionType(other.to_string())),
		}
	}

	/// The first valid selection starting at `pos` and moving in `dir`,
	/// looking at text positions only when `text_only` is set.
	pub fn find_from(pos: &ResolvedPos, dir: Bias, text_only: bool) -> Result<Option<Selection>> {
		if pos.parent().inline_content() {
			return Ok(Some(TextSelection::new(pos.clone(), pos.clone()).into()));
		}
		let doc = pos.doc();
		if let Some(found) = find_selection_in(doc, pos.parent(), pos.pos(), pos.index(pos.depth()), dir, text_only)? {
			return Ok(Some(found));
		}
		for depth in (0..pos.depth()).rev() {
			let found = match dir {
				Bias::Left => find_selection_in(doc, pos.node(depth), pos.before(depth + 1)?, pos.index(depth), dir, text_only)?,
				Bias::Right => find_selection_in(
					doc,
					pos.node(depth),
					pos.after(depth + 1)?,
					pos.index(depth) + 1,
					dir,
					text_only,
				)?,
			};
			if found.is_some() {
				return Ok(found);
			}
		}
		Ok(None)
	}

	/// A valid selection near `pos`, searching in `bias` direction first and
	/// falling back to selecting everything.
	pub fn near(pos: &ResolvedPos, bias: Bias) -> Result<Selection> {
		if let Some(found) = Selection::find_from(pos, bias, false)? {
			return Ok(found);
		}
		if let Some(found) = Selection::find_from(pos, flip(bias), false)? {
			return Ok(found);
		}
		Ok(AllSelection::new(pos.doc())?.into())
	}

	/// The first valid selection in `doc`.
	pub fn at_start(doc: &Node) -> Result<Selection> {
		match find_selection_in(doc, doc, 0, 0, Bias::Right, false)? {
			Some(found) => Ok(found),
			None => Ok(AllSelection::new(doc)?.into()),
		}
	}

	/// The last valid selection in `doc`.
	pub fn at_end(doc: &Node) -> Result<Selection> {
		match find_selection_in(doc, doc, doc.content().size(), doc.child_count(), Bias::Left, false)? {
			Some(found) => Ok(found),
			None => Ok(AllSelection::new(doc)?.into()),
		}
	}
}

fn find_selection_in(
	doc: &Node,
	node: &Node,
	pos: usize,
	index: usize,
	dir: Bias,
	text_only: bool,
) -> Result<Option<Selection>> {
	if node.inline_content() {
		return Ok(Some(TextSelection::cursor(doc, pos)?.into()));
	}
	let mut pos = pos;
	match dir {
		Bias::Right => {
			for child in node.content().iter().skip(index) {
				if !child.is_atom() {
					if let Some(inner) = find_selection_in(doc, child, pos + 1, 0, dir, text_only)? {
						return Ok(Some(inner));
					}
				} else if !text_only && NodeSelection::is_selectable(child) {
					return Ok(Some(NodeSelection::create(doc, pos)?.into()));
				}
				pos += child.node_size();
			}
		}
		Bias::Left => {
			for child in node.content().iter().take(index).rev() {
				if !child.is_atom() {
					if let Some(inner) = find_selection_in(doc, child, pos - 1, child.child_count(), dir, text_only)? {
						return Ok(Some(inner));
					}
				} else if !text_only && NodeSelection::is_selectable(child) {
					return Ok(Some(NodeSelection::create(doc, pos - child.node_size())?.into()));
				}
				pos -= child.node_size();
			}
		}
	}
	Ok(None)
}

/// Moves the selection to the end of the content inserted by the last step,
/// when that step is a replace added after `start_len`.
fn selection_to_insertion_end(tr: &mut Transaction, start_len: usize, bias: Bias) -> Result<()> {
	let Some(last) = tr.steps().len().checked_sub(1) else {
		return Ok(());
	};
	if last < start_len || !matches!(tr.steps()[last], Step::Replace { .. } | Step::ReplaceAround { .. }) {
		return Ok(());
	}
	let mut end = None;
	tr.mapping().maps()[last].for_each(|_, _, _, new_end| {
		end.get_or_insert(new_end);
	});
	let Some(end) = end else {
		return Ok(());
	};
	let selection = Selection::near(&tr.doc().resolve(end)?, bias)?;
	tr.set_selection(selection)?;
	Ok(())
}
