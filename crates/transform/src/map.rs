//! Position mapping through document changes.
//!
//! A [`StepMap`] describes the regions one step replaced as
//! `(start, old_size, new_size)` triples in ascending order. A [`Mapping`]
//! chains step maps and can recover positions through mirrored pairs (a step
//! followed later by its inverse), which keeps positions stable across undo.

use bitflags::bitflags;
use smallvec::SmallVec;

#[cfg(test)]
mod tests;

/// Which side a position sticks to when content is inserted or replaced at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
	/// Stay before content inserted at the position.
	Left,
	/// Move after content inserted at the position.
	#[default]
	Right,
}

bitflags! {
	/// Deletion information carried by a [`MapResult`].
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct DelInfo: u8 {
		/// The token before the position was deleted.
		const BEFORE = 1 << 0;
		/// The token after the position was deleted.
		const AFTER = 1 << 1;
		/// A range around the position was deleted.
		const ACROSS = 1 << 2;
		/// The content on the bias side of the position was deleted.
		const SIDE = 1 << 3;
	}
}

const LOWER16: usize = 0xffff;
const FACTOR16: usize = 1 << 16;

fn make_recover(index: usize, offset: usize) -> usize {
	index + offset * FACTOR16
}

fn recover_index(value: usize) -> usize {
	value & LOWER16
}

fn recover_offset(value: usize) -> usize {
	value / FACTOR16
}

/// A mapped position with information about deletions around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
	/// The mapped position.
	pub pos: usize,
	del_info: DelInfo,
	recover: Option<usize>,
}

impl MapResult {
	fn new(pos: usize, del_info: DelInfo, recover: Option<usize>) -> Self {
		Self { pos, del_info, recover }
	}

	pub fn del_info(&self) -> DelInfo {
		self.del_info
	}

	/// The content on the side given by the mapping bias was deleted.
	pub fn deleted(&self) -> bool {
		self.del_info.contains(DelInfo::SIDE)
	}

	/// The token before the position was deleted.
	pub fn deleted_before(&self) -> bool {
		self.del_info.intersects(DelInfo::BEFORE | DelInfo::ACROSS)
	}

	/// The token after the position was deleted.
	pub fn deleted_after(&self) -> bool {
		self.del_info.intersects(DelInfo::AFTER | DelInfo::ACROSS)
	}

	/// The position was inside a deleted range.
	pub fn deleted_across(&self) -> bool {
		self.del_info.contains(DelInfo::ACROSS)
	}

	/// Token for recovering the position through a mirrored map.
	pub fn recover(&self) -> Option<usize> {
		self.recover
	}
}

/// Something positions can be mapped through.
pub trait Mappable {
	/// Maps a position.
	fn map(&self, pos: usize, bias: Bias) -> usize;

	/// Maps a position, reporting deletions around it.
	fn map_result(&self, pos: usize, bias: Bias) -> MapResult;
}

/// The position changes made by a single step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepMap {
	ranges: SmallVec<[usize; 6]>,
	inverted: bool,
}

impl StepMap {
	/// Creates a map from `(start, old_size, new_size)` triples, ordered by
	/// start.
	pub fn new(ranges: impl IntoIterator<Item = (usize, usize, usize)>) -> Self {
		let ranges = ranges.into_iter().flat_map(|(start, old, new)| [start, old, new]).collect();
		Self { ranges, inverted: false }
	}

	/// A map that changes nothing.
	pub fn empty() -> Self {
		Self::default()
	}

	/// A map that shifts every position by `n`, by deleting or inserting at
	/// the start of the document.
	pub fn offset(n: isize) -> Self {
		match n {
			0 => Self::empty(),
			n if n < 0 => Self::new([(0, n.unsigned_abs(), 0)]),
			n => Self::new([(0, 0, n.unsigned_abs())]),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty()
	}

	fn indices(&self) -> (usize, usize) {
		if self.inverted { (2, 1) } else { (1, 2) }
	}

	/// Resolves a recover token produced by the mirror of this map.
	pub fn recover(&self, value: usize) -> usize {
		let index = recover_index(value);
		let mut diff = 0isize;
		if !self.inverted {
			for chunk in self.ranges.chunks_exact(3).take(index) {
				diff += chunk[2] as isize - chunk[1] as isize;
			}
		}
		let start = self.ranges.get(index * 3).copied().unwrap_or(0);
		start.saturating_add_signed(diff) + recover_offset(value)
	}

	/// Returns true if the range identified by `recover` touches `pos`.
	pub fn touches(&self, pos: usize, recover: usize) -> bool {
		let index = recover_index(recover);
		let (old_index, new_index) = self.indices();
		let mut diff = 0isize;
		for (i, chunk) in self.ranges.chunks_exact(3).enumerate() {
			let start = if self.inverted { chunk[0].saturating_add_signed(-diff) } else { chunk[0] };
			if start > pos {
				break;
			}
			let old_size = chunk[old_index];
			if pos <= start + old_size && i == index {
				return true;
			}
			diff += chunk[new_index] as isize - old_size as isize;
		}
		false
	}

	/// Calls `f(old_start, old_end, new_start, new_end)` for each changed
	/// range.
	pub fn for_each(&self, mut f: impl FnMut(usize, usize, usize, usize)) {
		let (old_index, new_index) = self.indices();
		let mut diff = 0isize;
		for chunk in self.ranges.chunks_exact(3) {
			let start = chunk[0];
			let old_start = if self.inverted { start.saturating_add_signed(-diff) } else { start };
			let new_start = if self.inverted { start } else { start.saturating_add_signed(diff) };
			let (old_size, new_size) = (chunk[old_index], chunk[new_index]);
			f(old_start, old_start + old_size, new_start, new_start + new_size);
			diff += new_size as isize - old_size as isize;
		}
	}

	/// The map that undoes this one.
	pub fn invert(&self) -> StepMap {
		StepMap {
			ranges: self.ranges.clone(),
			inverted: !self.inverted,
		}
	}
}

impl Mappable for StepMap {
	fn map(&self, pos: usize, bias: Bias) -> usize {
		self.map_result(pos, bias).pos
	}

	fn map_result(&self, pos: usize, bias: Bias) -> MapResult {
		let left = bias == Bias::Left;
		let (old_index, new_index) = self.indices();
		let mut diff = 0isize;
		for (i, chunk) in self.ranges.chunks_exact(3).enumerate() {
			let start = if self.inverted { chunk[0].saturating_add_signed(-diff) } else { chunk[0] };
			if start > pos {
				break;
			}
			let (old_size, new_size) = (chunk[old_index], chunk[new_index]);
			let end = start + old_size;
			if pos <= end {
				let side_left = if old_size == 0 {
					left
				} else if pos == start {
					true
				} else if pos == end {
					false
				} else {
					left
				};
				let result = start.saturating_add_signed(diff) + if side_left { 0 } else { new_size };
				let recover = if pos == (if left { start } else { end }) {
					None
				} else {
					Some(make_recover(i, pos - start))
				};
				let mut del = if pos == start {
					DelInfo::AFTER
				} else if pos == end {
					DelInfo::BEFORE
				} else {
					DelInfo::ACROSS
				};
				let moved_off = if left { pos != start } else { pos != end };
				if moved_off {
					del |= DelInfo::SIDE;
				}
				return MapResult::new(result, del, recover);
			}
			diff += new_size as isize - old_size as isize;
		}
		MapResult::new(pos.saturating_add_signed(diff), DelInfo::empty(), None)
	}
}

/// A pipeline of step maps.
///
/// Mirror pairs record that one map is the inverse of another; mapping through
/// such a pair recovers the original position instead of collapsing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
	maps: Vec<StepMap>,
	mirror: Vec<(usize, usize)>,
}

impl Mapping {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_maps(maps: Vec<StepMap>) -> Self {
		Self { maps, mirror: Vec::new() }
	}

	/// The step maps in this mapping.
	pub fn maps(&self) -> &[StepMap] {
		&self.maps
	}

	pub fn len(&self) -> usize {
		self.maps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.maps.is_empty()
	}

	/// A mapping holding only maps `from..to`, keeping mirror pairs that fall
	/// inside the range.
	pub fn slice(&self, from: usize, to: usize) -> Mapping {
		let to = to.min(self.maps.len());
		let from = from.min(to);
		let mirror = self
			.mirror
			.iter()
			.filter(|&&(a, b)| (from..to).contains(&a) && (from..to).contains(&b))
			.map(|&(a, b)| (a - from, b - from))
			.collect();
		Mapping {
			maps: self.maps[from..to].to_vec(),
			mirror,
		}
	}

	/// The mapping from map `from` to the end.
	pub fn slice_from(&self, from: usize) -> Mapping {
		self.slice(from, self.maps.len())
	}

	/// Adds a map, optionally recording it as the mirror of map `mirrors`.
	pub fn append_map(&mut self, map: StepMap, mirrors: Option<usize>) {
		self.maps.push(map);
		if let Some(mirrors) = mirrors {
			self.set_mirror(self.maps.len() - 1, mirrors);
		}
	}

	/// Adds all maps of `other`, keeping its mirror pairs.
	pub fn append_mapping(&mut self, other: &Mapping) {
		let start_size = self.maps.len();
		for (i, map) in other.maps.iter().enumerate() {
			let mirror = other.get_mirror(i).filter(|&m| m < i).map(|m| start_size + m);
			self.append_map(map.clone(), mirror);
		}
	}

	/// Adds the inverse of every map of `other`, in reverse order.
	pub fn append_mapping_inverted(&mut self, other: &Mapping) {
		let total = self.maps.len() + other.maps.len();
		for (i, map) in other.maps.iter().enumerate().rev() {
			let mirror = other.get_mirror(i).filter(|&m| m > i).map(|m| total - m - 1);
			self.append_map(map.invert(), mirror);
		}
	}

	/// The mirror partner of map `n`.
	pub fn get_mirror(&self, n: usize) -> Option<usize> {
		self.mirror.iter().find_map(|&(a, b)| {
			if a == n {
				Some(b)
			} else if b == n {
				Some(a)
			} else {
				None
			}
		})
	}

	/// Records maps `n` and `m` as mirrors of each other.
	pub fn set_mirror(&mut self, n: usize, m: usize) {
		self.mirror.push((n, m));
	}

	/// The inverse of this mapping.
	pub fn invert(&self) -> Mapping {
		let mut inverse = Mapping::new();
		inverse.append_mapping_inverted(self);
		inverse
	}
}

impl Mappable for Mapping {
	fn map(&self, pos: usize, bias: Bias) -> usize {
		self.map_result(pos, bias).pos
	}

	fn map_result(&self, pos: usize, bias: Bias) -> MapResult {
		let mut pos = pos;
		let mut del = DelInfo::empty();
		let mut i = 0;
		while i < self.maps.len() {
			let result = self.maps[i].map_result(pos, bias);
			if let Some(recover) = result.recover
				&& let Some(corr) = self.get_mirror(i)
				&& corr > i
				&& corr < self.maps.len()
			{
				pos = self.maps[corr].recover(recover);
				i = corr + 1;
				continue;
			}
			del |= result.del_info;
			pos = result.pos;
			i += 1;
		}
		MapResult::new(pos, del, None)
	}
}
