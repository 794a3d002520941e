//! Content expressions and the automata compiled from them.
//!
//! An expression such as `"heading paragraph+ (image | blockquote)*"` is
//! parsed into an [`Expr`] tree, compiled into a nondeterministic automaton,
//! and then determinized. All deterministic states of a schema live in one
//! arena inside the schema; a [`ContentMatch`] is a handle into that arena.
//!
//! ```text
//!   "para+"  ──parse──▶  Plus(Name(para))
//!            ──nfa────▶  0 ─para─▶ 1 ─ε─▶ 0
//!                                   └─ε─▶ accept
//!            ──dfa────▶  S0 ─para─▶ S1*  (S1 ─para─▶ S1)
//! ```
//!
//! State 0 of every arena is the empty match: it accepts immediately and has
//! no transitions. Leaf types point at it.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::error::SchemaError;
use crate::fragment::Fragment;
use crate::schema::{NodeType, Schema};


/// Arena index of the empty match.
pub(crate) const EMPTY_MATCH: usize = 0;

/// One deterministic state.
#[derive(Debug, Clone)]
pub(crate) struct MatchState {
	pub(crate) valid_end: bool,
	/// Outgoing transitions as (node type id, state id), in expression order.
	pub(crate) next: Vec<(usize, usize)>,
}

impl MatchState {
	pub(crate) fn empty() -> Self {
		Self {
			valid_end: true,
			next: Vec::new(),
		}
	}
}

/// What the compiler needs to know about a node type.
pub(crate) struct TypeInfo<'a> {
	pub(crate) name: &'a str,
	pub(crate) groups: &'a [String],
	pub(crate) inline: bool,
	pub(crate) generatable: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
	Choice(Vec<Expr>),
	Seq(Vec<Expr>),
	Plus(Box<Expr>),
	Star(Box<Expr>),
	Opt(Box<Expr>),
	Range { min: usize, max: Option<usize>, expr: Box<Expr> },
	Name(usize),
}

/// Compiles `expr` into `arena` and returns its start state.
pub(crate) fn compile(expr: &str, types: &[TypeInfo<'_>], arena: &mut Vec<MatchState>) -> Result<usize, SchemaError> {
	let mut stream = TokenStream::new(expr, types);
	if stream.next().is_none() {
		return Ok(EMPTY_MATCH);
	}
	let parsed = parse_expr(&mut stream)?;
	if let Some(tok) = stream.next() {
		return Err(stream.err(format!("unexpected trailing text '{tok}'")));
	}

	let mut nfa = Nfa::default();
	let start = nfa.node();
	let dangling = nfa.compile(&parsed, start);
	let accept = nfa.node();
	nfa.connect(&dangling, accept);

	let first = arena.len();
	let mut builder = DfaBuilder {
		nfa: &nfa,
		accept,
		labeled: FxHashMap::default(),
		arena: &mut *arena,
	};
	let id = builder.explore(null_from(&nfa, start));
	check_for_dead_ends(expr, id, first, types, arena)?;
	trace!(expr, states = arena.len() - first, "compiled content expression");
	Ok(id)
}

fn is_word(c: char) -> bool {
	c.is_alphanumeric() || c == '_'
}

fn tokenize(expr: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut chars = expr.char_indices().peekable();
	while let Some((start, c)) = chars.next() {
		if c.is_whitespace() {
			continue;
		}
		if !is_word(c) {
			tokens.push(c.to_string());
			continue;
		}
		let mut end = start + c.len_utf8();
		while let Some(&(i, n)) = chars.peek() {
			if !is_word(n) {
				break;
			}
			end = i + n.len_utf8();
			chars.next();
		}
		tokens.push(expr[start..end].to_string());
	}
	tokens
}

struct TokenStream<'a> {
	expr: &'a str,
	types: &'a [TypeInfo<'a>],
	tokens: Vec<String>,
	pos: usize,
	/// Inline-ness of the first resolved type; mixing is rejected.
	inline: Option<bool>,
}

impl<'a> TokenStream<'a> {
	fn new(expr: &'a str, types: &'a [TypeInfo<'a>]) -> Self {
		Self {
			expr,
			types,
			tokens: tokenize(expr),
			pos: 0,
			inline: None,
		}
	}

	fn next(&self) -> Option<&str> {
		self.tokens.get(self.pos).map(String::as_str)
	}

	fn eat(&mut self, tok: &str) -> bool {
		if self.next() == Some(tok) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn err(&self, message: impl Into<String>) -> SchemaError {
		SchemaError::ContentExpression {
			expr: self.expr.to_string(),
			message: message.into(),
		}
	}
}

fn parse_expr(stream: &mut TokenStream<'_>) -> Result<Expr, SchemaError> {
	let mut exprs = Vec::new();
	loop {
		exprs.push(parse_seq(stream)?);
		if !stream.eat("|") {
			break;
		}
	}
	Ok(if exprs.len() == 1 {
		exprs.remove(0)
	} else {
		Expr::Choice(exprs)
	})
}

fn parse_seq(stream: &mut TokenStream<'_>) -> Result<Expr, SchemaError> {
	let mut exprs = Vec::new();
	loop {
		exprs.push(parse_subscript(stream)?);
		match stream.next() {
			Some(tok) if tok != ")" && tok != "|" => {}
			_ => break,
		}
	}
	Ok(if exprs.len() == 1 {
		exprs.remove(0)
	} else {
		Expr::Seq(exprs)
	})
}

fn parse_subscript(stream: &mut TokenStream<'_>) -> Result<Expr, SchemaError> {
	let mut expr = parse_atom(stream)?;
	loop {
		if stream.eat("+") {
			expr = Expr::Plus(Box::new(expr));
		} else if stream.eat("*") {
			expr = Expr::Star(Box::new(expr));
		} else if stream.eat("?") {
			expr = Expr::Opt(Box::new(expr));
		} else if stream.eat("{") {
			expr = parse_range(stream, expr)?;
		} else {
			break;
		}
	}
	Ok(expr)
}

fn parse_num(stream: &mut TokenStream<'_>) -> Result<usize, SchemaError> {
	let tok = stream.next().unwrap_or_default();
	let num = tok
		.parse::<usize>()
		.ok()
		.filter(|_| tok.bytes().all(|b| b.is_ascii_digit()))
		.ok_or_else(|| stream.err(format!("expected number, got '{tok}'")))?;
	stream.pos += 1;
	Ok(num)
}

fn parse_range(stream: &mut TokenStream<'_>, expr: Expr) -> Result<Expr, SchemaError> {
	let min = parse_num(stream)?;
	let mut max = Some(min);
	if stream.eat(",") {
		max = if stream.next() != Some("}") {
			Some(parse_num(stream)?)
		} else {
			None
		};
	}
	if !stream.eat("}") {
		return Err(stream.err("unclosed braced range"));
	}
	Ok(Expr::Range {
		min,
		max,
		expr: Box::new(expr),
	})
}

fn resolve_name(stream: &mut TokenStream<'_>, name: &str) -> Result<Vec<usize>, SchemaError> {
	if let Some(id) = stream.types.iter().position(|t| t.name == name) {
		return Ok(vec![id]);
	}
	let found: Vec<usize> = stream
		.types
		.iter()
		.enumerate()
		.filter(|(_, t)| t.groups.iter().any(|g| g == name))
		.map(|(id, _)| id)
		.collect();
	if found.is_empty() {
		return Err(stream.err(format!("no node type or group '{name}' found")));
	}
	Ok(found)
}

fn parse_atom(stream: &mut TokenStream<'_>) -> Result<Expr, SchemaError> {
	if stream.eat("(") {
		let expr = parse_expr(stream)?;
		if !stream.eat(")") {
			return Err(stream.err("missing closing paren"));
		}
		return Ok(expr);
	}
	let Some(tok) = stream.next().map(str::to_string) else {
		return Err(stream.err("unexpected end of expression"));
	};
	if !tok.chars().all(is_word) {
		return Err(stream.err(format!("unexpected token '{tok}'")));
	}
	let ids = resolve_name(stream, &tok)?;
	let mut exprs = Vec::with_capacity(ids.len());
	for id in ids {
		let inline = stream.types[id].inline;
		match stream.inline {
			None => stream.inline = Some(inline),
			Some(seen) if seen != inline => {
				return Err(stream.err("mixing inline and block content"));
			}
			Some(_) => {}
		}
		exprs.push(Expr::Name(id));
	}
	stream.pos += 1;
	Ok(if exprs.len() == 1 {
		exprs.remove(0)
	} else {
		Expr::Choice(exprs)
	})
}

struct NfaEdge {
	term: Option<usize>,
	to: Option<usize>,
}

/// (state, edge index) pairs of edges whose target is not yet known.
type Dangling = Vec<(usize, usize)>;

#[derive(Default)]
struct Nfa {
	states: Vec<Vec<NfaEdge>>,
}

impl Nfa {
	fn node(&mut self) -> usize {
		self.states.push(Vec::new());
		self.states.len() - 1
	}

	fn edge(&mut self, from: usize, to: Option<usize>, term: Option<usize>) -> (usize, usize) {
		self.states[from].push(NfaEdge { term, to });
		(from, self.states[from].len() - 1)
	}

	fn connect(&mut self, edges: &[(usize, usize)], to: usize) {
		for &(state, edge) in edges {
			self.states[state][edge].to = Some(to);
		}
	}

	fn compile(&mut self, expr: &Expr, from: usize) -> Dangling {
		match expr {
			Expr::Choice(exprs) => exprs.iter().flat_map(|e| self.compile(e, from)).collect(),
			Expr::Seq(exprs) => {
				let mut from = from;
				for (i, e) in exprs.iter().enumerate() {
					let next = self.compile(e, from);
					if i == exprs.len() - 1 {
						return next;
					}
					from = self.node();
					self.connect(&next, from);
				}
				Vec::new()
			}
			Expr::Star(inner) => {
				let lp = self.node();
				self.edge(from, Some(lp), None);
				let body = self.compile(inner, lp);
				self.connect(&body, lp);
				vec![self.edge(lp, None, None)]
			}
			Expr::Plus(inner) => {
				let lp = self.node();
				let first = self.compile(inner, from);
				self.connect(&first, lp);
				let body = self.compile(inner, lp);
				self.connect(&body, lp);
				vec![self.edge(lp, None, None)]
			}
			Expr::Opt(inner) => {
				let mut out = vec![self.edge(from, None, None)];
				out.extend(self.compile(inner, from));
				out
			}
			Expr::Range { min, max, expr } => {
				let mut cur = from;
				for _ in 0..*min {
					let next = self.node();
					let out = self.compile(expr, cur);
					self.connect(&out, next);
					cur = next;
				}
				match max {
					None => {
						let out = self.compile(expr, cur);
						self.connect(&out, cur);
					}
					Some(max) => {
						for _ in *min..*max {
							let next = self.node();
							self.edge(cur, Some(next), None);
							let out = self.compile(expr, cur);
							self.connect(&out, next);
							cur = next;
						}
					}
				}
				vec![self.edge(cur, None, None)]
			}
			Expr::Name(id) => vec![self.edge(from, None, Some(*id))],
		}
	}
}

/// Epsilon closure of `node`, sorted descending so it can key a state map.
fn null_from(nfa: &Nfa, node: usize) -> Vec<usize> {
	fn scan(nfa: &Nfa, node: usize, result: &mut Vec<usize>, passed: &mut Vec<usize>) {
		let edges = &nfa.states[node];
		if let [NfaEdge { term: None, to: Some(to) }] = edges.as_slice()
			&& !passed.contains(&node)
		{
			passed.push(node);
			return scan(nfa, *to, result, passed);
		}
		result.push(node);
		for edge in edges {
			if let NfaEdge { term: None, to: Some(to) } = edge
				&& !result.contains(to)
			{
				scan(nfa, *to, result, passed);
			}
		}
	}
	let mut result = Vec::new();
	scan(nfa, node, &mut result, &mut Vec::new());
	result.sort_unstable_by(|a, b| b.cmp(a));
	result
}

struct DfaBuilder<'a> {
	nfa: &'a Nfa,
	accept: usize,
	labeled: FxHashMap<Vec<usize>, usize>,
	arena: &'a mut Vec<MatchState>,
}

impl DfaBuilder<'_> {
	fn explore(&mut self, states: Vec<usize>) -> usize {
		let mut out: Vec<(usize, Vec<usize>)> = Vec::new();
		for &node in &states {
			for edge in &self.nfa.states[node] {
				let (Some(term), Some(to)) = (edge.term, edge.to) else {
					continue;
				};
				let index = match out.iter().position(|(t, _)| *t == term) {
					Some(index) => index,
					None => {
						out.push((term, Vec::new()));
						out.len() - 1
					}
				};
				for n in null_from(self.nfa, to) {
					if !out[index].1.contains(&n) {
						out[index].1.push(n);
					}
				}
			}
		}
		let id = self.arena.len();
		self.arena.push(MatchState {
			valid_end: states.contains(&self.accept),
			next: Vec::new(),
		});
		self.labeled.insert(states, id);
		for (term, mut set) in out {
			set.sort_unstable_by(|a, b| b.cmp(a));
			let target = match self.labeled.get(&set) {
				Some(&target) => target,
				None => self.explore(set),
			};
			self.arena[id].next.push((term, target));
		}
		id
	}
}

/// Rejects automata where some reachable state can neither end nor advance
/// through a type that content generation could create.
fn check_for_dead_ends(
	expr: &str,
	start: usize,
	first: usize,
	types: &[TypeInfo<'_>],
	arena: &[MatchState],
) -> Result<(), SchemaError> {
	let mut work = vec![start];
	let mut seen = FxHashSet::default();
	seen.insert(start);
	while let Some(id) = work.pop() {
		debug_assert!(id >= first);
		let state = &arena[id];
		let mut dead = !state.valid_end;
		let mut nodes = Vec::new();
		for &(ty, next) in &state.next {
			nodes.push(types[ty].name);
			if dead && types[ty].generatable {
				dead = false;
			}
			if seen.insert(next) {
				work.push(next);
			}
		}
		if dead {
			return Err(SchemaError::ContentExpression {
				expr: expr.to_string(),
				message: format!(
					"only non-generatable nodes ({}) in a required position",
					nodes.join(", ")
				),
			});
		}
	}
	Ok(())
}

/// A state in a node type's content automaton.
///
/// Obtained from [`NodeType::content_match`] and advanced one child type at a
/// time. Cheap to clone.
#[derive(Clone)]
pub struct ContentMatch {
	schema: Schema,
	id: usize,
}

impl ContentMatch {
	pub(crate) fn new(schema: Schema, id: usize) -> Self {
		Self { schema, id }
	}

	fn state(&self) -> &MatchState {
		&self.schema.inner().matches[self.id]
	}

	fn at(&self, id: usize) -> ContentMatch {
		ContentMatch::new(self.schema.clone(), id)
	}

	/// Whether the content matched so far may end here.
	pub fn valid_end(&self) -> bool {
		self.state().valid_end
	}

	/// Advances over a node of type `ty`.
	pub fn match_type(&self, ty: &NodeType) -> Option<ContentMatch> {
		if !self.schema.ptr_eq(ty.schema()) {
			return None;
		}
		self.state()
			.next
			.iter()
			.find(|&&(t, _)| t == ty.id())
			.map(|&(_, next)| self.at(next))
	}

	/// Advances over every child of `fragment`.
	pub fn match_fragment(&self, fragment: &Fragment) -> Option<ContentMatch> {
		self.match_fragment_range(fragment, 0, fragment.child_count())
	}

	/// Advances over the children of `fragment` in `start..end`.
	pub fn match_fragment_range(&self, fragment: &Fragment, start: usize, end: usize) -> Option<ContentMatch> {
		let mut cur = self.clone();
		for i in start..end {
			cur = cur.match_type(fragment.child(i).node_type())?;
		}
		Some(cur)
	}

	/// Whether the next expected content is inline.
	pub fn inline_content(&self) -> bool {
		let inner = self.schema.inner();
		self.state()
			.next
			.first()
			.is_some_and(|&(ty, _)| !inner.nodes[ty].is_block)
	}

	/// The first generatable type that may appear here.
	pub fn default_type(&self) -> Option<NodeType> {
		let inner = self.schema.inner();
		self.state()
			.next
			.iter()
			.find(|&&(ty, _)| inner.nodes[ty].is_generatable())
			.map(|&(ty, _)| self.schema.node_type_at(ty))
	}

	/// Returns true if both states accept some common next type.
	pub fn compatible(&self, other: &ContentMatch) -> bool {
		if !self.schema.ptr_eq(&other.schema) {
			return false;
		}
		let theirs = &other.state().next;
		self.state()
			.next
			.iter()
			.any(|&(ty, _)| theirs.iter().any(|&(t, _)| t == ty))
	}

	/// Finds the smallest sequence of generated nodes that, inserted before
	/// `after[start_index..]`, lets the content match. With `to_end` the
	/// result must also reach a valid end.
	pub fn fill_before(&self, after: &Fragment, to_end: bool, start_index: usize) -> Option<Fragment> {
		let mut seen = vec![self.id];
		let mut types = Vec::new();
		self.search_fill(after, to_end, start_index, &mut seen, &mut types)
	}

	fn search_fill(
		&self,
		after: &Fragment,
		to_end: bool,
		start_index: usize,
		seen: &mut Vec<usize>,
		types: &mut Vec<usize>,
	) -> Option<Fragment> {
		if let Some(finished) = self.match_fragment_range(after, start_index, after.child_count())
			&& (!to_end || finished.valid_end())
			&& let Some(filled) = self.instantiate(types)
		{
			return Some(filled);
		}
		let inner = self.schema.inner();
		for &(ty, next) in &self.state().next {
			if !inner.nodes[ty].is_generatable() || seen.contains(&next) {
				continue;
			}
			seen.push(next);
			types.push(ty);
			let found = self.at(next).search_fill(after, to_end, start_index, seen, types);
			types.pop();
			if found.is_some() {
				return found;
			}
		}
		None
	}

	fn instantiate(&self, types: &[usize]) -> Option<Fragment> {
		let mut nodes = Vec::with_capacity(types.len());
		for &ty in types {
			nodes.push(
				self.schema
					.node_type_at(ty)
					.create_and_fill(None, Fragment::empty(), &[])
					.ok()
					.flatten()?,
			);
		}
		Some(Fragment::from_array(nodes))
	}

	/// Finds the shortest chain of wrapper types that lets a node of
	/// `target` be placed here. An empty vector means no wrapping is needed.
	pub fn find_wrapping(&self, target: &NodeType) -> Option<Vec<NodeType>> {
		if !self.schema.ptr_eq(target.schema()) {
			return None;
		}
		let key = (self.id, target.id());
		let inner = self.schema.inner();
		let cached = inner.wrappings.lock().get(&key).cloned();
		let ids = match cached {
			Some(ids) => ids,
			None => {
				let computed = self.compute_wrapping(target.id());
				trace!(state = self.id, target = %target, found = computed.is_some(), "computed wrapping");
				inner.wrappings.lock().insert(key, computed.clone());
				computed
			}
		};
		ids.map(|ids| ids.into_iter().map(|id| self.schema.node_type_at(id)).collect())
	}

	fn compute_wrapping(&self, target: usize) -> Option<Vec<usize>> {
		struct Active {
			state: usize,
			ty: Option<usize>,
			via: Option<usize>,
		}
		let inner = self.schema.inner();
		let mut seen = vec![false; inner.nodes.len()];
		let mut active = vec![Active {
			state: self.id,
			ty: None,
			via: None,
		}];
		let mut head = 0;
		while head < active.len() {
			let current = head;
			head += 1;
			let state = &inner.matches[active[current].state];
			if state.next.iter().any(|&(ty, _)| ty == target) {
				let mut result = Vec::new();
				let mut obj = Some(current);
				while let Some(i) = obj {
					let Some(ty) = active[i].ty else { break };
					result.push(ty);
					obj = active[i].via;
				}
				result.reverse();
				return Some(result);
			}
			for &(ty, next) in &state.next {
				let data = &inner.nodes[ty];
				if !data.is_leaf()
					&& !data.has_required_attrs()
					&& !seen[ty] && (active[current].ty.is_none() || inner.matches[next].valid_end)
				{
					active.push(Active {
						state: data.content_match,
						ty: Some(ty),
						via: Some(current),
					});
					seen[ty] = true;
				}
			}
		}
		None
	}

	/// Number of outgoing transitions.
	pub fn edge_count(&self) -> usize {
		self.state().next.len()
	}

	/// The `n`th outgoing transition.
	pub fn edge(&self, n: usize) -> Option<(NodeType, ContentMatch)> {
		self.state()
			.next
			.get(n)
			.map(|&(ty, next)| (self.schema.node_type_at(ty), self.at(next)))
	}
}

impl PartialEq for ContentMatch {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.schema.ptr_eq(&other.schema)
	}
}

impl Eq for ContentMatch {}

impl fmt::Debug for ContentMatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let inner = self.schema.inner();
		let mut seen = vec![self.id];
		let mut i = 0;
		while i < seen.len() {
			for &(_, next) in &inner.matches[seen[i]].next {
				if !seen.contains(&next) {
					seen.push(next);
				}
			}
			i += 1;
		}
		for (n, &id) in seen.iter().enumerate() {
			let state = &inner.matches[id];
			if n > 0 {
				f.write_str("\n")?;
			}
			write!(f, "{n}{} ", if state.valid_end { "*" } else { " " })?;
			for (k, &(ty, next)) in state.next.iter().enumerate() {
				let target = seen.iter().position(|&s| s == next).unwrap_or(0);
				if k > 0 {
					f.write_str(", ")?;
				}
				write!(f, "{}->{target}", inner.nodes[ty].name)?;
			}
		}
		Ok(())
	}
}
