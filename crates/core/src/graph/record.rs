//! The adjacency record codec.
//!
//! One record packs a vertex's whole neighborhood:
//!
//! ```text
//! [ deg_out: u32 | deg_in: u32 | out[0..deg_out] | in[0..deg_in] ]
//! ```
//!
//! Each half holds `(neighbor_id, edge_id)` pairs in strictly ascending
//! order, so membership checks are binary searches and parallel edges to
//! one neighbor form a contiguous equal-range. All integers little-endian.
//! A record shorter than the header is an existing vertex with no edges.

use super::Neighborship;
use super::Role;
use std::cmp::Ordering;
use std::ops::Range;

/// The width of the two-degree header.
pub(crate) const HEADER_SIZE: usize = 8;

/// The width of one packed neighborship.
pub(crate) const SHIP_SIZE: usize = 16;

/// A borrowed, parsed view over one adjacency record.
#[derive(Clone, Copy)]
pub struct RecordRef<'a> {
	deg_out: u32,
	deg_in: u32,
	ships: &'a [u8],
}

impl<'a> RecordRef<'a> {
	/// Parse a record. Anything shorter than the header is an empty record.
	pub fn parse(bytes: &'a [u8]) -> RecordRef<'a> {
		if bytes.len() < HEADER_SIZE {
			return RecordRef {
				deg_out: 0,
				deg_in: 0,
				ships: &[],
			};
		}
		let deg_out = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
		let deg_in = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
		RecordRef {
			deg_out,
			deg_in,
			ships: &bytes[HEADER_SIZE..],
		}
	}

	pub fn deg_out(&self) -> u32 {
		self.deg_out
	}

	pub fn deg_in(&self) -> u32 {
		self.deg_in
	}

	/// The stored degree for a role; `ANY` sums both halves.
	pub fn degree(&self, role: Role) -> u32 {
		match role {
			Role::Source => self.deg_out,
			Role::Target => self.deg_in,
			Role::Any => self.deg_out + self.deg_in,
		}
	}

	/// The neighborship at a global slot index.
	pub(crate) fn ship(&self, index: usize) -> Neighborship {
		let at = index * SHIP_SIZE;
		let mut neighbor = [0u8; 8];
		neighbor.copy_from_slice(&self.ships[at..at + 8]);
		let mut edge = [0u8; 8];
		edge.copy_from_slice(&self.ships[at + 8..at + 16]);
		Neighborship {
			neighbor: i64::from_le_bytes(neighbor),
			edge: i64::from_le_bytes(edge),
		}
	}

	/// The global slot range of one half; `ANY` spans both.
	pub(crate) fn half(&self, role: Role) -> Range<usize> {
		let out = self.deg_out as usize;
		let all = out + self.deg_in as usize;
		match role {
			Role::Source => 0..out,
			Role::Target => out..all,
			Role::Any => 0..all,
		}
	}

	/// Iterate the neighborships of a role; `ANY` yields out then in.
	pub fn neighbors(&self, role: Role) -> impl Iterator<Item = Neighborship> + 'a {
		let copy = *self;
		copy.half(role).map(move |i| copy.ship(i))
	}

	/// The equal-range of slots matching a neighbor within one half.
	///
	/// With an edge id the range holds at most one slot; without one it
	/// spans every parallel edge to that neighbor.
	pub(crate) fn equal_range(
		&self,
		role: Role,
		neighbor: i64,
		edge: Option<i64>,
	) -> Range<usize> {
		let half = self.half(role);
		let cmp = |slot: usize| -> Ordering {
			let ship = self.ship(slot);
			match edge {
				Some(edge) => (ship.neighbor, ship.edge).cmp(&(neighbor, edge)),
				None => ship.neighbor.cmp(&neighbor),
			}
		};
		let start = partition(half.clone(), |i| cmp(i) == Ordering::Less);
		let end = partition(start..half.end, |i| cmp(i) != Ordering::Greater);
		start..end
	}

	/// Whether one exact neighborship is present in a half.
	pub(crate) fn contains(&self, role: Role, ship: Neighborship) -> bool {
		!self.equal_range(role, ship.neighbor, Some(ship.edge)).is_empty()
	}

	/// Look up a neighbor in the half(s) selected by a role.
	///
	/// Without an edge id this yields the equal-range of parallel edges;
	/// with one it yields at most a single match per half. `ANY` consults
	/// the outgoing half first, then the incoming half.
	pub fn find(
		&self,
		role: Role,
		neighbor: i64,
		edge: Option<i64>,
	) -> impl Iterator<Item = Neighborship> + 'a {
		let copy = *self;
		let out = match role {
			Role::Source | Role::Any => copy.equal_range(Role::Source, neighbor, edge),
			Role::Target => 0..0,
		};
		let inc = match role {
			Role::Target | Role::Any => copy.equal_range(Role::Target, neighbor, edge),
			Role::Source => 0..0,
		};
		out.chain(inc).map(move |i| copy.ship(i))
	}
}

/// The first slot in `range` for which `pred` is false.
fn partition(range: Range<usize>, pred: impl Fn(usize) -> bool) -> usize {
	let mut lo = range.start;
	let mut hi = range.end;
	while lo < hi {
		let mid = lo + (hi - lo) / 2;
		if pred(mid) {
			lo = mid + 1;
		} else {
			hi = mid;
		}
	}
	lo
}

/// The byte size of a record after a number of insertions.
pub(crate) fn size_after(current: Option<usize>, inserts: u32) -> usize {
	let present = current.unwrap_or(0);
	let header = if present >= HEADER_SIZE {
		0
	} else {
		HEADER_SIZE - present
	};
	present + header + inserts as usize * SHIP_SIZE
}

/// Build a record from two sorted halves.
pub(crate) fn build(outgoing: &[Neighborship], incoming: &[Neighborship]) -> Vec<u8> {
	let mut out = Vec::with_capacity(HEADER_SIZE + (outgoing.len() + incoming.len()) * SHIP_SIZE);
	out.extend_from_slice(&(outgoing.len() as u32).to_le_bytes());
	out.extend_from_slice(&(incoming.len() as u32).to_le_bytes());
	for ship in outgoing.iter().chain(incoming) {
		out.extend_from_slice(&ship.neighbor.to_le_bytes());
		out.extend_from_slice(&ship.edge.to_le_bytes());
	}
	out
}

/// A mutable record being rewritten in place.
///
/// The buffer must be large enough for every splice the call will make;
/// `len` tracks the number of valid bytes and only grows or shrinks by
/// whole neighborships.
pub(crate) struct RecordMut<'a> {
	buf: &'a mut [u8],
	len: usize,
}

impl<'a> RecordMut<'a> {
	/// Wrap a buffer holding `len` valid bytes.
	///
	/// A record shorter than the header is normalised to a zeroed header
	/// first, so splices always see well-formed degrees.
	pub(crate) fn new(buf: &'a mut [u8], len: usize) -> RecordMut<'a> {
		let mut record = RecordMut {
			buf,
			len,
		};
		if record.len < HEADER_SIZE {
			record.buf[..HEADER_SIZE].fill(0);
			record.len = HEADER_SIZE;
		}
		record
	}

	/// The valid bytes of the record.
	pub(crate) fn bytes(&self) -> &[u8] {
		&self.buf[..self.len]
	}

	pub(crate) fn len(&self) -> usize {
		self.len
	}

	fn view(&self) -> RecordRef<'_> {
		RecordRef::parse(self.bytes())
	}

	fn degree_at(&self, role: Role) -> u32 {
		let at = match role {
			Role::Target => 4,
			_ => 0,
		};
		u32::from_le_bytes([self.buf[at], self.buf[at + 1], self.buf[at + 2], self.buf[at + 3]])
	}

	fn set_degree(&mut self, role: Role, degree: u32) {
		let at = match role {
			Role::Target => 4,
			_ => 0,
		};
		self.buf[at..at + 4].copy_from_slice(&degree.to_le_bytes());
	}

	/// Splice one neighborship into the ordered position of a half.
	///
	/// Inserting an already-present pair is a no-op, so replaying the same
	/// upsert leaves the record untouched.
	pub(crate) fn insert(&mut self, role: Role, ship: Neighborship) -> bool {
		debug_assert!(!matches!(role, Role::Any));
		let view = self.view();
		let range = view.equal_range(role, ship.neighbor, Some(ship.edge));
		if !range.is_empty() {
			return false;
		}
		let at = HEADER_SIZE + range.start * SHIP_SIZE;
		// Shift the tail right and write the new pair into the gap
		self.buf.copy_within(at..self.len, at + SHIP_SIZE);
		self.buf[at..at + 8].copy_from_slice(&ship.neighbor.to_le_bytes());
		self.buf[at + 8..at + 16].copy_from_slice(&ship.edge.to_le_bytes());
		self.len += SHIP_SIZE;
		let degree = self.degree_at(role) + 1;
		self.set_degree(role, degree);
		true
	}

	/// Splice matching neighborships out of a half.
	///
	/// Without an edge id the whole equal-range of parallel edges to the
	/// neighbor is removed. Returns the number of removed pairs.
	pub(crate) fn erase(&mut self, role: Role, neighbor: i64, edge: Option<i64>) -> u32 {
		debug_assert!(!matches!(role, Role::Any));
		if self.len < HEADER_SIZE {
			return 0;
		}
		let view = self.view();
		let range = view.equal_range(role, neighbor, edge);
		if range.is_empty() {
			return 0;
		}
		let removed = range.len() as u32;
		let from = HEADER_SIZE + range.end * SHIP_SIZE;
		let to = HEADER_SIZE + range.start * SHIP_SIZE;
		self.buf.copy_within(from..self.len, to);
		self.len -= removed as usize * SHIP_SIZE;
		let degree = self.degree_at(role) - removed;
		self.set_degree(role, degree);
		removed
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	fn ship(neighbor: i64, edge: i64) -> Neighborship {
		Neighborship::new(neighbor, edge)
	}

	#[test]
	fn parse_empty() {
		let view = RecordRef::parse(b"");
		assert_eq!(view.degree(Role::Any), 0);
		assert_eq!(view.neighbors(Role::Any).count(), 0);
	}

	#[test]
	fn build_and_parse() {
		let bytes = build(&[ship(2, 9), ship(3, 1)], &[ship(7, 4)]);
		let view = RecordRef::parse(&bytes);
		assert_eq!(view.deg_out(), 2);
		assert_eq!(view.deg_in(), 1);
		assert_eq!(view.neighbors(Role::Source).collect::<Vec<_>>(), vec![ship(2, 9), ship(3, 1)]);
		assert_eq!(view.neighbors(Role::Target).collect::<Vec<_>>(), vec![ship(7, 4)]);
		// ANY yields outgoing entries before incoming ones
		assert_eq!(view.neighbors(Role::Any).count(), 3);
		assert_eq!(view.neighbors(Role::Any).next(), Some(ship(2, 9)));
	}

	#[test]
	fn insert_keeps_order_and_degrees() {
		let mut buf = vec![0u8; HEADER_SIZE + 4 * SHIP_SIZE];
		let mut record = RecordMut::new(&mut buf, 0);
		assert!(record.insert(Role::Source, ship(5, 1)));
		assert!(record.insert(Role::Source, ship(2, 3)));
		assert!(record.insert(Role::Target, ship(9, 9)));
		assert!(record.insert(Role::Source, ship(2, 1)));
		let view = RecordRef::parse(record.bytes());
		assert_eq!(view.deg_out(), 3);
		assert_eq!(view.deg_in(), 1);
		assert_eq!(
			view.neighbors(Role::Source).collect::<Vec<_>>(),
			vec![ship(2, 1), ship(2, 3), ship(5, 1)]
		);
	}

	#[test]
	fn insert_is_idempotent() {
		let mut buf = vec![0u8; HEADER_SIZE + 2 * SHIP_SIZE];
		let mut record = RecordMut::new(&mut buf, 0);
		assert!(record.insert(Role::Source, ship(2, 9)));
		let len = record.len();
		assert!(!record.insert(Role::Source, ship(2, 9)));
		assert_eq!(record.len(), len);
		assert_eq!(RecordRef::parse(record.bytes()).deg_out(), 1);
	}

	#[test]
	fn erase_exact_and_equal_range() {
		let bytes = build(&[ship(2, 1), ship(2, 3), ship(2, 7), ship(5, 1)], &[]);
		// Exact erase removes one pair
		let mut buf = bytes.clone();
		let len = buf.len();
		let mut record = RecordMut::new(&mut buf, len);
		assert_eq!(record.erase(Role::Source, 2, Some(3)), 1);
		let view = RecordRef::parse(record.bytes());
		assert_eq!(view.neighbors(Role::Source).collect::<Vec<_>>(), vec![
			ship(2, 1),
			ship(2, 7),
			ship(5, 1)
		]);
		// Unspecified edge id erases the whole equal-range
		let mut buf = bytes.clone();
		let len = buf.len();
		let mut record = RecordMut::new(&mut buf, len);
		assert_eq!(record.erase(Role::Source, 2, None), 3);
		let view = RecordRef::parse(record.bytes());
		assert_eq!(view.deg_out(), 1);
		assert_eq!(view.neighbors(Role::Source).collect::<Vec<_>>(), vec![ship(5, 1)]);
	}

	#[test]
	fn erase_missing_is_noop() {
		let bytes = build(&[ship(2, 1)], &[]);
		let mut buf = bytes.clone();
		let len = buf.len();
		let mut record = RecordMut::new(&mut buf, len);
		assert_eq!(record.erase(Role::Source, 4, None), 0);
		assert_eq!(record.erase(Role::Target, 2, Some(1)), 0);
		assert_eq!(record.bytes(), &bytes[..]);
	}

	#[test]
	fn size_after_accounts_for_the_header() {
		assert_eq!(size_after(None, 1), HEADER_SIZE + SHIP_SIZE);
		assert_eq!(size_after(Some(0), 2), HEADER_SIZE + 2 * SHIP_SIZE);
		assert_eq!(size_after(Some(HEADER_SIZE), 1), HEADER_SIZE + SHIP_SIZE);
		assert_eq!(
			size_after(Some(HEADER_SIZE + SHIP_SIZE), 1),
			HEADER_SIZE + 2 * SHIP_SIZE
		);
	}

	#[test]
	fn find_consults_the_selected_halves() {
		let bytes = build(&[ship(2, 1), ship(2, 3)], &[ship(2, 5), ship(6, 0)]);
		let view = RecordRef::parse(&bytes);
		assert_eq!(view.find(Role::Source, 2, None).count(), 2);
		assert_eq!(view.find(Role::Target, 2, None).collect::<Vec<_>>(), vec![ship(2, 5)]);
		// ANY yields outgoing matches before incoming ones
		assert_eq!(view.find(Role::Any, 2, None).collect::<Vec<_>>(), vec![
			ship(2, 1),
			ship(2, 3),
			ship(2, 5)
		]);
		assert_eq!(view.find(Role::Any, 2, Some(3)).count(), 1);
		assert_eq!(view.find(Role::Any, 9, None).count(), 0);
	}

	#[test]
	fn equal_range_spans_parallel_edges() {
		let bytes = build(&[ship(2, 1), ship(2, 3), ship(4, 0)], &[ship(2, 5)]);
		let view = RecordRef::parse(&bytes);
		assert_eq!(view.equal_range(Role::Source, 2, None), 0..2);
		assert_eq!(view.equal_range(Role::Source, 2, Some(3)), 1..2);
		assert_eq!(view.equal_range(Role::Source, 3, None).len(), 0);
		// The incoming half is indexed after the outgoing one
		assert_eq!(view.equal_range(Role::Target, 2, None), 3..4);
	}
}
