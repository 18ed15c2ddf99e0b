//! The maintenance protocol over working sets of adjacency records.
//!
//! Every mutation stages the same way: collect the touched vertices, sort
//! and deduplicate them into a working set, fetch their records with one
//! batched read, rewrite them, drop the no-op entries and commit the
//! survivors with one batched write. Insertions rewrite in three passes
//! (estimate, reallocate, splice) because a growing record needs a bigger
//! buffer; removals reuse the fetched bytes and work in a single pass.

use super::record::{self, RecordMut, RecordRef, HEADER_SIZE};
use super::{Neighborship, Role};
use crate::ctx::Param;
use crate::err::Error;
use crate::key;
use crate::kvs::{CollectionId, Transactor, Val};
use bumpalo::Bump;

const TARGET: &str = "polystore::core::graph::update";

/// One touched vertex in a maintenance call.
struct Working<'b> {
	key: i64,
	/// The fetched record, if the vertex exists
	current: Option<Val>,
	/// The reallocated buffer when the record grows
	rebuilt: Option<&'b mut [u8]>,
	/// Valid bytes in the active buffer
	len: usize,
	/// Pairs inserted or removed so far
	delta: u32,
	/// The vertex itself is being deleted
	doomed: bool,
}

impl Working<'_> {
	fn new(key: i64) -> Self {
		Working {
			key,
			current: None,
			rebuilt: None,
			len: 0,
			delta: 0,
			doomed: false,
		}
	}

	/// A parsed view over the fetched record.
	fn view(&self) -> RecordRef<'_> {
		RecordRef::parse(self.current.as_deref().unwrap_or(&[]))
	}

	/// Splice a pair into the reallocated buffer.
	fn insert(&mut self, role: Role, ship: Neighborship) {
		if let Some(buf) = self.rebuilt.as_deref_mut() {
			let mut record = RecordMut::new(buf, self.len);
			record.insert(role, ship);
			self.len = record.len();
		}
	}

	/// Splice matching pairs out of the fetched record.
	fn erase(&mut self, role: Role, neighbor: i64, edge: Option<i64>) {
		let Some(current) = self.current.as_deref_mut() else {
			return;
		};
		if self.len < HEADER_SIZE {
			return;
		}
		let mut record = RecordMut::new(current, self.len);
		let removed = record.erase(role, neighbor, edge);
		self.len = record.len();
		self.delta += removed;
	}
}

/// The deduplicated set of `(collection, key)` pairs touched by one call.
struct WorkingSet<'b> {
	collection: CollectionId,
	entries: Vec<Working<'b>>,
}

impl<'b> WorkingSet<'b> {
	/// Collect, sort and deduplicate the touched vertex keys.
	fn collect(collection: CollectionId, keys: impl Iterator<Item = i64>) -> Self {
		let mut keys: Vec<i64> = keys.collect();
		keys.sort_unstable();
		keys.dedup();
		WorkingSet {
			collection,
			entries: keys.into_iter().map(Working::new).collect(),
		}
	}

	/// Fetch every working record with a single batched read.
	///
	/// Maintenance reads are always watched, so two transactions touching
	/// the same record conflict at commit.
	async fn fetch(&mut self, tx: &mut Transactor) -> Result<(), Error> {
		let keys = self
			.entries
			.iter()
			.map(|e| key::Record::new(self.collection, e.key).encode())
			.collect();
		let values = tx.getm(keys, true).await?;
		for (entry, value) in self.entries.iter_mut().zip(values) {
			entry.len = value.as_ref().map_or(0, Vec::len);
			entry.current = value;
		}
		Ok(())
	}

	/// Locate a key in the sorted working set.
	fn position(&self, key: i64) -> usize {
		self.entries
			.binary_search_by_key(&key, |e| e.key)
			.expect("working set contains every touched vertex")
	}

	/// Commit the surviving entries with a single batched write.
	///
	/// Entries whose rewrite turned out to be a no-op are pruned, so
	/// upserting an existing relation or removing a missing one writes
	/// nothing at all.
	async fn commit(self, tx: &mut Transactor) -> Result<(), Error> {
		let mut staged = Vec::new();
		for entry in &self.entries {
			if entry.doomed {
				staged.push((key::Record::new(self.collection, entry.key).encode(), None));
			} else if entry.delta > 0 {
				let bytes = match entry.rebuilt.as_deref() {
					Some(buf) => &buf[..entry.len],
					None => &entry.current.as_deref().unwrap_or(&[])[..entry.len],
				};
				staged.push((
					key::Record::new(self.collection, entry.key).encode(),
					Some(bytes.to_vec()),
				));
			}
		}
		trace!(target: TARGET, "committing {} of {} working entries", staged.len(), self.entries.len());
		if !staged.is_empty() {
			tx.setm(staged).await?;
		}
		Ok(())
	}
}

/// Create empty records for missing vertices.
pub(super) async fn upsert_vertices(
	tx: &mut Transactor,
	collection: CollectionId,
	vertices: &[i64],
) -> Result<(), Error> {
	let mut set = WorkingSet::collect(collection, vertices.iter().copied());
	set.fetch(tx).await?;
	// Only the missing vertices receive an empty record
	let staged: Vec<_> = set
		.entries
		.iter()
		.filter(|e| e.current.is_none())
		.map(|e| (key::Record::new(collection, e.key).encode(), Some(Vec::new())))
		.collect();
	if !staged.is_empty() {
		tx.setm(staged).await?;
	}
	Ok(())
}

/// Insert a batch of edges via the three-pass rewrite.
pub(super) async fn upsert_edges(
	tx: &mut Transactor,
	bump: &Bump,
	collection: CollectionId,
	sources: &[i64],
	targets: &[i64],
	edges: Param<'_, i64>,
) -> Result<(), Error> {
	// Collect the touched vertices and fetch their records
	let mut set =
		WorkingSet::collect(collection, sources.iter().chain(targets.iter()).copied());
	set.fetch(tx).await?;
	// First pass: estimate each endpoint's growth. A pair already present
	// contributes nothing; duplicates within the batch may overestimate,
	// which only overallocates the buffer.
	for i in 0..sources.len() {
		let edge = edges.get(i);
		let at = set.position(sources[i]);
		if !set.entries[at].view().contains(Role::Source, Neighborship::new(targets[i], edge)) {
			set.entries[at].delta += 1;
		}
		let at = set.position(targets[i]);
		if !set.entries[at].view().contains(Role::Target, Neighborship::new(sources[i], edge)) {
			set.entries[at].delta += 1;
		}
	}
	// Second pass: reallocate every growing record into a bigger buffer.
	// The valid length stays at the old byte count and grows as pairs are
	// spliced in.
	for entry in set.entries.iter_mut().filter(|e| e.delta > 0) {
		let size = record::size_after(entry.current.as_ref().map(Vec::len), entry.delta);
		let buf = bump.alloc_slice_fill_copy(size, 0u8);
		if let Some(current) = entry.current.as_deref() {
			buf[..current.len()].copy_from_slice(current);
		}
		entry.rebuilt = Some(buf);
	}
	// Third pass: splice each pair into the ordered position of both
	// endpoint records. Already-present pairs are no-ops.
	for i in 0..sources.len() {
		let edge = edges.get(i);
		let at = set.position(sources[i]);
		set.entries[at].insert(Role::Source, Neighborship::new(targets[i], edge));
		let at = set.position(targets[i]);
		set.entries[at].insert(Role::Target, Neighborship::new(sources[i], edge));
	}
	// Prune the no-op entries and commit the survivors
	set.commit(tx).await
}

/// Remove a batch of edges in a single rewrite pass.
pub(super) async fn remove_edges(
	tx: &mut Transactor,
	collection: CollectionId,
	sources: &[i64],
	targets: &[i64],
	edges: Option<Param<'_, i64>>,
) -> Result<(), Error> {
	let mut set =
		WorkingSet::collect(collection, sources.iter().chain(targets.iter()).copied());
	set.fetch(tx).await?;
	// Removal reuses the fetched bytes: splice out, shrink, decrement
	for i in 0..sources.len() {
		let edge = edges.as_ref().map(|e| e.get(i));
		let at = set.position(sources[i]);
		set.entries[at].erase(Role::Source, targets[i], edge);
		let at = set.position(targets[i]);
		set.entries[at].erase(Role::Target, sources[i], edge);
	}
	set.commit(tx).await
}

/// Remove vertices, erasing them from their neighbors' records first.
pub(super) async fn remove_vertices(
	tx: &mut Transactor,
	collection: CollectionId,
	vertices: &[i64],
	roles: Param<'_, Role>,
) -> Result<(), Error> {
	// First phase: read the doomed vertices to discover their neighbors
	let keys = vertices
		.iter()
		.map(|v| key::Record::new(collection, *v).encode())
		.collect();
	let values = tx.getm(keys, true).await?;
	let mut touched: Vec<i64> = vertices.to_vec();
	for (i, value) in values.iter().enumerate() {
		if let Some(bytes) = value {
			let view = RecordRef::parse(bytes);
			touched.extend(view.neighbors(roles.get(i)).map(|n| n.neighbor));
		}
	}
	// Second phase: fetch the combined working set and erase every
	// reference to a doomed vertex from the opposite direction
	let mut set = WorkingSet::collect(collection, touched.into_iter());
	set.fetch(tx).await?;
	for (i, vertex) in vertices.iter().enumerate() {
		let role = roles.get(i);
		let neighbors: Vec<Neighborship> =
			set.entries[set.position(*vertex)].view().neighbors(role).collect();
		for n in neighbors {
			let at = set.position(n.neighbor);
			match role {
				Role::Any => {
					set.entries[at].erase(Role::Source, *vertex, None);
					set.entries[at].erase(Role::Target, *vertex, None);
				}
				role => {
					set.entries[at].erase(role.invert(), *vertex, None);
				}
			}
		}
	}
	// Finally mark the doomed vertices themselves for deletion
	for vertex in vertices {
		let at = set.position(*vertex);
		set.entries[at].doomed = true;
	}
	set.commit(tx).await
}
