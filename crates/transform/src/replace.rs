//! Fitting arbitrary slices into documents.
//!
//! [`replace_step`] turns a possibly ill-fitting replace into a valid step:
//! the [`Fitter`] places the slice's content node by node against a frontier
//! of open nodes at the start of the range, opening, wrapping or dropping
//! slice nodes as needed, and finally closes the frontier against the
//! content after the range. The `replace_range*` and `delete_range`
//! transform methods pick the depths to replace at before deferring to it.

use quire_model::{Attrs, ContentMatch, Fragment, Node, NodeType, ResolvedPos, Slice};
use tracing::trace;

use crate::error::{Result, TransformError};
use crate::step::Step;
use crate::structure::insert_point;
use crate::transform::Transform;


/// Builds a step that replaces `from..to` with `slice`, adjusting the slice
/// so the result is valid. Returns `None` when nothing needs to change or no
/// valid fit exists.
pub fn replace_step(doc: &Node, from: usize, to: usize, slice: Slice) -> Result<Option<Step>> {
	if from == to && slice.size() == 0 {
		return Ok(None);
	}
	let rfrom = doc.resolve(from)?;
	let rto = doc.resolve(to)?;
	if fits_trivially(&rfrom, &rto, &slice) {
		return Ok(Some(Step::replace(from, to, slice)));
	}
	let step = Fitter::new(rfrom, rto, slice)?.fit();
	if step.is_none() {
		trace!(from, to, "no fit for replace");
	}
	Ok(step)
}

fn fits_trivially(rfrom: &ResolvedPos, rto: &ResolvedPos, slice: &Slice) -> bool {
	slice.open_start() == 0
		&& slice.open_end() == 0
		&& rfrom.start(rfrom.depth()) == rto.start(rto.depth())
		&& rfrom
			.parent()
			.can_replace(rfrom.index(rfrom.depth()), rto.index(rto.depth()), slice.content())
}

#[derive(Clone)]
struct FrontierEntry {
	node_type: NodeType,
	content_match: ContentMatch,
}

/// A place where part of the unplaced slice fits.
struct Fittable {
	slice_depth: usize,
	frontier_depth: usize,
	parent: Option<Node>,
	inject: Option<Fragment>,
	wrap: Option<Vec<NodeType>>,
}

struct CloseLevel {
	depth: usize,
	fit: Fragment,
	target: ResolvedPos,
}

/// Incrementally places a slice's content at the start of a replaced range.
///
/// `frontier` holds the open nodes (type plus content match) that content is
/// placed into, outermost first. `placed` mirrors the frontier as a fragment
/// of open nodes and `unplaced` is what remains of the slice.
struct Fitter {
	from: ResolvedPos,
	to: ResolvedPos,
	unplaced: Slice,
	frontier: Vec<FrontierEntry>,
	placed: Fragment,
}

impl Fitter {
	fn new(from: ResolvedPos, to: ResolvedPos, unplaced: Slice) -> Result<Self> {
		let mut frontier = Vec::with_capacity(from.depth() + 1);
		for depth in 0..=from.depth() {
			let node = from.node(depth);
			frontier.push(FrontierEntry {
				node_type: node.node_type().clone(),
				content_match: node.content_match_at(from.index_after(depth))?,
			});
		}
		let mut placed = Fragment::empty();
		for depth in (1..=from.depth()).rev() {
			placed = Fragment::from_node(from.node(depth).copy(placed));
		}
		Ok(Self {
			from,
			to,
			unplaced,
			frontier,
			placed,
		})
	}

	fn depth(&self) -> usize {
		self.frontier.len() - 1
	}

	fn fit(mut self) -> Option<Step> {
		while self.unplaced.size() > 0 {
			if let Some(fit) = self.find_fittable() {
				self.place_nodes(fit)?;
			} else if !self.open_more() {
				self.drop_node()?;
			}
		}

		let move_inline = self.must_move_inline();
		let placed_size = self.placed.size().checked_sub(self.depth() + self.from.depth())?;
		let from = self.from.clone();
		let target = match move_inline {
			Some(pos) => from.doc().resolve(pos).ok()?,
			None => self.to.clone(),
		};
		let to = self.close(target)?;

		let mut content = self.placed.clone();
		let (mut open_start, mut open_end) = (from.depth(), to.depth());
		while open_start > 0 && open_end > 0 && content.child_count() == 1 {
			content = content.first_child()?.content().clone();
			open_start -= 1;
			open_end -= 1;
		}
		let slice = Slice::new(content, open_start, open_end);
		if let Some(move_inline) = move_inline {
			return Some(Step::ReplaceAround {
				from: from.pos(),
				to: move_inline,
				gap_from: self.to.pos(),
				gap_to: self.to.end(self.to.depth()),
				slice,
				insert: placed_size,
				structure: false,
			});
		}
		if slice.size() > 0 || from.pos() != self.to.pos() {
			return Some(Step::replace(from.pos(), to.pos(), slice));
		}
		None
	}

	/// Finds a slice depth and frontier depth where the next unplaced content
	/// can go. The first pass only accepts direct fits (possibly after
	/// injecting filler nodes); the second also accepts wrapping.
	fn find_fittable(&self) -> Option<Fittable> {
		let mut start_depth = self.unplaced.open_start();
		let mut cur = self.unplaced.content().clone();
		let mut open_end = self.unplaced.open_end();
		for d in 0..start_depth {
			let node = cur.first_child()?.clone();
			if cur.child_count() > 1 {
				open_end = 0;
			}
			if node.node_type().spec().isolating && open_end <= d {
				start_depth = d;
				break;
			}
			cur = node.content().clone();
		}

		for pass in 1..=2 {
			let top = if pass == 1 { start_depth } else { self.unplaced.open_start() };
			for slice_depth in (0..=top).rev() {
				let (fragment, parent) = if slice_depth > 0 {
					let parent = content_at(self.unplaced.content(), slice_depth - 1)?
						.first_child()?
						.clone();
					(parent.content().clone(), Some(parent))
				} else {
					(self.unplaced.content().clone(), None)
				};
				let first = fragment.first_child();
				for frontier_depth in (0..=self.depth()).rev() {
					let FrontierEntry {
						node_type,
						content_match,
					} = &self.frontier[frontier_depth];
					if pass == 1 {
						let mut inject = None;
						let fits = match first {
							Some(first) => {
								content_match.match_type(first.node_type()).is_some() || {
									inject = content_match.fill_before(&Fragment::from_node(first.clone()), false, 0);
									inject.is_some()
								}
							}
							None => parent
								.as_ref()
								.is_some_and(|parent| node_type.compatible_content(parent.node_type())),
						};
						if fits {
							return Some(Fittable {
								slice_depth,
								frontier_depth,
								parent,
								inject,
								wrap: None,
							});
						}
					} else if let Some(first) = first
						&& let Some(wrap) = content_match.find_wrapping(first.node_type())
					{
						return Some(Fittable {
							slice_depth,
							frontier_depth,
							parent,
							inject: None,
							wrap: Some(wrap),
						});
					}
					if let Some(parent) = &parent
						&& content_match.match_type(parent.node_type()).is_some()
					{
						break;
					}
				}
			}
		}
		None
	}

	/// Opens the first node of the unplaced slice one level deeper.
	fn open_more(&mut self) -> bool {
		let content = self.unplaced.content().clone();
		let (open_start, open_end) = (self.unplaced.open_start(), self.unplaced.open_end());
		let Some(inner) = content_at(&content, open_start) else {
			return false;
		};
		match inner.first_child() {
			Some(first) if !first.is_leaf() => {}
			_ => return false,
		}
		let reaches_end = inner.size() + open_start >= content.size().saturating_sub(open_end);
		let open_end = open_end.max(if reaches_end { open_start + 1 } else { 0 });
		self.unplaced = Slice::new(content, open_start + 1, open_end);
		true
	}

	/// Discards the first unplaced node.
	fn drop_node(&mut self) -> Option<()> {
		let content = self.unplaced.content().clone();
		let (open_start, open_end) = (self.unplaced.open_start(), self.unplaced.open_end());
		let inner = content_at(&content, open_start)?;
		self.unplaced = if inner.child_count() <= 1 && open_start > 0 {
			let open_at_end = content.size().saturating_sub(open_start) <= open_start + inner.size();
			Slice::new(
				drop_from_fragment(&content, open_start - 1, 1)?,
				open_start - 1,
				if open_at_end { open_start - 1 } else { open_end },
			)
		} else {
			Slice::new(drop_from_fragment(&content, open_start, 1)?, open_start, open_end)
		};
		Some(())
	}

	/// Moves content from the unplaced slice at the fit's slice depth into the
	/// frontier node at its frontier depth.
	fn place_nodes(&mut self, fit: Fittable) -> Option<()> {
		let Fittable {
			slice_depth,
			frontier_depth,
			parent,
			inject,
			wrap,
		} = fit;
		while self.depth() > frontier_depth {
			self.close_frontier_node()?;
		}
		for ty in wrap.iter().flatten() {
			self.open_frontier_node(ty, None, Fragment::empty())?;
		}
		let depth = self.depth();

		let slice = self.unplaced.clone();
		let fragment = parent.as_ref().map_or(slice.content(), Node::content).clone();
		let open_start = slice.open_start() - slice_depth;
		let FrontierEntry {
			node_type,
			content_match,
		} = self.frontier[depth].clone();
		let mut matched = content_match;
		let mut add = Vec::new();
		if let Some(inject) = &inject {
			add.extend(inject.iter().cloned());
			matched = matched.match_fragment(inject)?;
		}
		// Open nodes at the end of the fragment: zero means only the parent is
		// open, negative means nothing is.
		let mut open_end_count =
			(fragment.size() + slice_depth) as isize - (slice.content().size() - slice.open_end()) as isize;
		let mut taken = 0;
		while taken < fragment.child_count() {
			let next = fragment.child(taken);
			let Some(matches) = matched.match_type(next.node_type()) else {
				break;
			};
			taken += 1;
			// Empty open nodes are dropped.
			if taken > 1 || open_start == 0 || next.content().size() > 0 {
				matched = matches;
				let node = next.mark(&node_type.allowed_marks(next.marks()));
				let node_open_start = if taken == 1 { open_start as isize } else { 0 };
				let node_open_end = if taken == fragment.child_count() { open_end_count } else { -1 };
				add.push(close_node_start(node, node_open_start, node_open_end)?);
			}
		}
		let to_end = taken == fragment.child_count();
		if !to_end {
			open_end_count = -1;
		}

		self.placed = add_to_fragment(&self.placed, depth, &Fragment::from_array(add))?;
		self.frontier[depth].content_match = matched;

		if to_end
			&& open_end_count < 0
			&& parent
				.as_ref()
				.is_some_and(|parent| *parent.node_type() == self.frontier[self.depth()].node_type)
			&& self.frontier.len() > 1
		{
			self.close_frontier_node()?;
		}

		let mut cur = fragment;
		for _ in 0..open_end_count.max(0) {
			let node = cur.last_child()?.clone();
			self.frontier.push(FrontierEntry {
				node_type: node.node_type().clone(),
				content_match: node.content_match_at(node.child_count()).ok()?,
			});
			cur = node.content().clone();
		}

		self.unplaced = if !to_end {
			Slice::new(
				drop_from_fragment(slice.content(), slice_depth, taken)?,
				slice.open_start(),
				slice.open_end(),
			)
		} else if slice_depth == 0 {
			Slice::empty()
		} else {
			let open_end = if open_end_count < 0 { slice.open_end() } else { slice_depth - 1 };
			Slice::new(
				drop_from_fragment(slice.content(), slice_depth - 1, 1)?,
				slice_depth - 1,
				open_end,
			)
		};
		Some(())
	}

	/// When the range ends inside a textblock whose content cannot be joined
	/// normally, the position after which that content should be moved.
	fn must_move_inline(&self) -> Option<usize> {
		if !self.to.parent().is_textblock() {
			return None;
		}
		let top = &self.frontier[self.depth()];
		if !top.node_type.is_textblock()
			|| content_after_fits(&self.to, self.to.depth(), &top.node_type, &top.content_match, false).is_none()
		{
			return None;
		}
		if self.to.depth() == self.depth()
			&& let Some(level) = self.find_close_level(&self.to)
			&& level.depth == self.depth()
		{
			return None;
		}
		let mut depth = self.to.depth();
		let mut after = self.to.after(depth).ok()?;
		while depth > 1 {
			depth -= 1;
			if after != self.to.end(depth) {
				break;
			}
			after += 1;
		}
		Some(after)
	}

	fn find_close_level(&self, to: &ResolvedPos) -> Option<CloseLevel> {
		'scan: for i in (0..=self.depth().min(to.depth())).rev() {
			let FrontierEntry {
				node_type,
				content_match,
			} = &self.frontier[i];
			let drop_inner = i < to.depth() && to.end(i + 1) == to.pos() + (to.depth() - (i + 1));
			let Some(fit) = content_after_fits(to, i, node_type, content_match, drop_inner) else {
				continue;
			};
			for d in (0..i).rev() {
				let entry = &self.frontier[d];
				match content_after_fits(to, d, &entry.node_type, &entry.content_match, true) {
					Some(rest) if rest.child_count() == 0 => {}
					_ => continue 'scan,
				}
			}
			let target = if drop_inner {
				to.doc().resolve(to.after(i + 1).ok()?).ok()?
			} else {
				to.clone()
			};
			return Some(CloseLevel { depth: i, fit, target });
		}
		None
	}

	/// Closes the frontier so that it connects to the content after `to`.
	fn close(&mut self, to: ResolvedPos) -> Option<ResolvedPos> {
		let close = self.find_close_level(&to)?;
		while self.depth() > close.depth {
			self.close_frontier_node()?;
		}
		if close.fit.child_count() > 0 {
			self.placed = add_to_fragment(&self.placed, close.depth, &close.fit)?;
		}
		let to = close.target;
		for d in close.depth + 1..=to.depth() {
			let node = to.node(d);
			let ty = node.node_type().clone();
			let add = ty.content_match().fill_before(node.content(), true, to.index(d))?;
			let attrs = node.attrs().clone();
			self.open_frontier_node(&ty, Some(&attrs), add)?;
		}
		Some(to)
	}

	fn open_frontier_node(&mut self, ty: &NodeType, attrs: Option<&Attrs>, content: Fragment) -> Option<()> {
		let depth = self.depth();
		let top = &mut self.frontier[depth];
		top.content_match = top.content_match.match_type(ty)?;
		let node = ty.create(attrs, content, &[]).ok()?;
		self.placed = add_to_fragment(&self.placed, depth, &Fragment::from_node(node))?;
		self.frontier.push(FrontierEntry {
			node_type: ty.clone(),
			content_match: ty.content_match(),
		});
		Some(())
	}

	fn close_frontier_node(&mut self) -> Option<()> {
		let open = self.frontier.pop()?;
		let add = open.content_match.fill_before(&Fragment::empty(), true, 0)?;
		if add.child_count() > 0 {
			self.placed = add_to_fragment(&self.placed, self.frontier.len(), &add)?;
		}
		Some(())
	}
}

fn drop_from_fragment(fragment: &Fragment, depth: usize, count: usize) -> Option<Fragment> {
	if depth == 0 {
		return Some(fragment.cut_by_index(count, fragment.child_count()));
	}
	let first = fragment.first_child()?;
	let inner = drop_from_fragment(first.content(), depth - 1, count)?;
	Some(fragment.replace_child(0, first.copy(inner)))
}

fn add_to_fragment(fragment: &Fragment, depth: usize, content: &Fragment) -> Option<Fragment> {
	if depth == 0 {
		return Some(fragment.append(content));
	}
	let last = fragment.last_child()?;
	let inner = add_to_fragment(last.content(), depth - 1, content)?;
	Some(fragment.replace_child(fragment.child_count() - 1, last.copy(inner)))
}

fn content_at(fragment: &Fragment, depth: usize) -> Option<Fragment> {
	let mut fragment = fragment.clone();
	for _ in 0..depth {
		let inner = fragment.first_child()?.content().clone();
		fragment = inner;
	}
	Some(fragment)
}

/// Fills in the start (and, when not open at the end, the end) of a node
/// whose opening was cut off.
fn close_node_start(node: Node, open_start: isize, open_end: isize) -> Option<Node> {
	if open_start <= 0 {
		return Some(node);
	}
	let mut frag = node.content().clone();
	if open_start > 1 {
		let first = frag.first_child()?.clone();
		let inner_end = if frag.child_count() == 1 { open_end - 1 } else { 0 };
		frag = frag.replace_child(0, close_node_start(first, open_start - 1, inner_end)?);
	}
	let start_match = node.node_type().content_match();
	frag = start_match.fill_before(&frag, false, 0)?.append(&frag);
	if open_end <= 0 {
		let end = start_match
			.match_fragment(&frag)?
			.fill_before(&Fragment::empty(), true, 0)?;
		frag = frag.append(&end);
	}
	Some(node.copy(frag))
}

/// The filler that lets the content of `to`'s ancestor at `depth` (after the
/// position) follow `content_match`, if any.
fn content_after_fits(
	to: &ResolvedPos,
	depth: usize,
	ty: &NodeType,
	content_match: &ContentMatch,
	open: bool,
) -> Option<Fragment> {
	let node = to.node(depth);
	let index = if open { to.index_after(depth) } else { to.index(depth) };
	if index == node.child_count() && !ty.compatible_content(node.node_type()) {
		return None;
	}
	let fit = content_match.fill_before(node.content(), true, index)?;
	(!invalid_marks(ty, node.content(), index)).then_some(fit)
}

fn invalid_marks(ty: &NodeType, fragment: &Fragment, start: usize) -> bool {
	fragment.iter().skip(start).any(|child| !ty.allows_marks(child.marks()))
}

/// Depths at which `rfrom..rto` covers the whole content of a node.
fn covered_depths(rfrom: &ResolvedPos, rto: &ResolvedPos) -> Vec<usize> {
	let mut result = Vec::new();
	for d in (0..=rfrom.depth().min(rto.depth())).rev() {
		let start = rfrom.start(d);
		if start + (rfrom.depth() - d) < rfrom.pos()
			|| rto.end(d) > rto.pos() + (rto.depth() - d)
			|| rfrom.node(d).node_type().spec().isolating
			|| rto.node(d).node_type().spec().isolating
		{
			break;
		}
		if start == rto.start(d)
			|| (d == rfrom.depth()
				&& d == rto.depth()
				&& rfrom.parent().inline_content()
				&& rto.parent().inline_content()
				&& d > 0
				&& rto.start(d - 1) + 1 == start)
		{
			result.push(d);
		}
	}
	result
}

/// Closes the open nodes of `fragment` from depth `new_open` down to
/// `old_open`, filling in their required content.
fn close_fragment(
	fragment: &Fragment,
	depth: usize,
	old_open: usize,
	new_open: usize,
	parent: Option<&Node>,
) -> Option<Fragment> {
	let mut fragment = fragment.clone();
	if depth < old_open {
		let first = fragment.first_child()?.clone();
		let inner = close_fragment(first.content(), depth + 1, old_open, new_open, Some(&first))?;
		fragment = fragment.replace_child(0, first.copy(inner));
	}
	if depth > new_open {
		let start_match = parent?.content_match_at(0).ok()?;
		let start = start_match.fill_before(&fragment, false, 0)?.append(&fragment);
		let end = start_match
			.match_fragment(&start)?
			.fill_before(&Fragment::empty(), true, 0)?;
		fragment = start.append(&end);
	}
	Some(fragment)
}

impl Transform {
	/// Replaces `from..to` with `slice`, expanding the range over whole
	/// parent nodes when that lets the slice's open start fit more naturally.
	/// Defining nodes on either side are preserved.
	pub fn replace_range(&mut self, from: usize, to: usize, slice: Slice) -> Result<&mut Self> {
		if slice.size() == 0 {
			return self.delete_range(from, to);
		}
		let rfrom = self.doc().resolve(from)?;
		let rto = self.doc().resolve(to)?;
		if fits_trivially(&rfrom, &rto, &slice) {
			return self.step(Step::replace(from, to, slice));
		}

		let mut target_depths: Vec<isize> = covered_depths(&rfrom, &rto).into_iter().map(|d| d as isize).collect();
		// The document itself can't be replaced.
		if target_depths.last() == Some(&0) {
			target_depths.pop();
		}
		// Negative depths replace from before the node at that depth up to
		// `to`, instead of covering the whole node.
		let mut preferred_target = -(rfrom.depth() as isize + 1);
		target_depths.insert(0, preferred_target);
		let mut pos = rfrom.pos() as isize - 1;
		for d in (1..=rfrom.depth()).rev() {
			let spec = rfrom.node(d).node_type().spec();
			if spec.is_defining_as_context() || spec.isolating {
				break;
			}
			if target_depths.contains(&(d as isize)) {
				preferred_target = d as isize;
			} else if rfrom.before(d)? as isize == pos {
				target_depths.insert(1, -(d as isize));
			}
			pos -= 1;
		}
		let preferred_target_index = target_depths
			.iter()
			.position(|&d| d == preferred_target)
			.unwrap_or(0);

		let mut left_nodes = Vec::with_capacity(slice.open_start() + 1);
		let mut content = slice.content().clone();
		for i in 0.. {
			let Some(node) = content.first_child().cloned() else {
				break;
			};
			left_nodes.push(node.clone());
			if i == slice.open_start() {
				break;
			}
			content = node.content().clone();
		}

		// Back up over defining textblocks directly above the preferred depth,
		// possibly skipping one non-defining textblock.
		let mut preferred_depth = slice.open_start();
		let context = rfrom.node(preferred_target.unsigned_abs() - 1);
		for d in (0..preferred_depth).rev() {
			let Some(left) = left_nodes.get(d) else {
				continue;
			};
			let defines = left.node_type().spec().is_defining_for_content();
			if defines && !left.same_markup(context) {
				preferred_depth = d;
			} else if defines || !left.node_type().is_textblock() {
				break;
			}
		}

		let open_start = slice.open_start();
		for j in (0..=open_start).rev() {
			let open_depth = (j + preferred_depth + 1) % (open_start + 1);
			let Some(insert) = left_nodes.get(open_depth) else {
				continue;
			};
			for i in 0..target_depths.len() {
				let target = target_depths[(i + preferred_target_index) % target_depths.len()];
				let (target_depth, expand) = (target.unsigned_abs(), target > 0);
				let parent = rfrom.node(target_depth - 1);
				let index = rfrom.index(target_depth - 1);
				if parent.can_replace_with(index, index, insert.node_type(), Some(insert.marks())) {
					let start = rfrom.before(target_depth)?;
					let end = if expand { rto.after(target_depth)? } else { to };
					let closed = close_fragment(slice.content(), 0, open_start, open_depth, None)
						.ok_or_else(|| TransformError::Structure("Could not close the replaced content".into()))?;
					return self.replace(start, end, Slice::new(closed, open_depth, slice.open_end()));
				}
			}
		}

		let start_steps = self.steps().len();
		let (mut from, mut to) = (from, to);
		for &depth in target_depths.iter().rev() {
			self.replace(from, to, slice.clone())?;
			if self.steps().len() > start_steps {
				break;
			}
			if depth < 0 {
				continue;
			}
			from = rfrom.before(depth as usize)?;
			to = rto.after(depth as usize)?;
		}
		Ok(self)
	}

	/// Replaces `from..to` with `node`. An empty range in a non-empty block,
	/// given a block node, moves to a nearby valid insertion point first.
	pub fn replace_range_with(&mut self, from: usize, to: usize, node: Node) -> Result<&mut Self> {
		let (mut from, mut to) = (from, to);
		if !node.is_inline() && from == to && self.doc().resolve(from)?.parent().content().size() > 0 {
			if let Some(point) = insert_point(self.doc(), from, node.node_type())? {
				from = point;
				to = point;
			}
		}
		self.replace_range(from, to, Slice::new(Fragment::from_node(node), 0, 0))
	}

	/// Deletes `from..to`, widening the range to cover whole nodes when it
	/// spans their entire content.
	pub fn delete_range(&mut self, from: usize, to: usize) -> Result<&mut Self> {
		let rfrom = self.doc().resolve(from)?;
		let rto = self.doc().resolve(to)?;
		let covered = covered_depths(&rfrom, &rto);
		for (i, &depth) in covered.iter().enumerate() {
			let last = i + 1 == covered.len();
			if (last && depth == 0) || rfrom.node(depth).node_type().content_match().valid_end() {
				return self.delete(rfrom.start(depth), rto.end(depth));
			}
			if depth > 0
				&& (last
					|| rfrom.node(depth - 1).can_replace(
						rfrom.index(depth - 1),
						rto.index_after(depth - 1),
						&Fragment::empty(),
					)) {
				return self.delete(rfrom.before(depth)?, rto.after(depth)?);
			}
		}
		for d in 1..=rfrom.depth().min(rto.depth()) {
			if from - rfrom.start(d) == rfrom.depth() - d
				&& to > rfrom.end(d)
				&& rto.end(d) - to != rto.depth() - d
				&& rfrom.start(d - 1) == rto.start(d - 1)
				&& rfrom
					.node(d - 1)
					.can_replace(rfrom.index(d - 1), rto.index(d - 1), &Fragment::empty())
			{
				return self.delete(rfrom.before(d)?, to);
			}
		}
		self.delete(from, to)
	}
}
