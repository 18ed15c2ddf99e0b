//! The property graph modality.
//!
//! Graphs are attributed multi-digraphs stored one adjacency record per
//! vertex. Edge and vertex maintenance is batched: every public operation
//! collects the touched vertices into a deduplicated working set, fetches
//! their records with one substrate read, rewrites them in arena memory and
//! commits the survivors with one substrate write, all inside a single
//! transaction-or-autocommit scope.

pub(crate) mod record;

mod export;
mod update;

use crate::ctx::{Context, Param, Scope};
use crate::err::Error;
use crate::key;
use crate::kvs::{CollectionId, Datastore, TransactionType};
use crate::mem::Arena;

pub use record::RecordRef;

/// The implicit id for edges created without one.
pub const EDGE_ID_DEFAULT: i64 = i64::MAX;

/// The reserved key value that never addresses an entry.
pub const KEY_UNKNOWN: i64 = i64::MIN;

/// The degree reported for a vertex that is not in the graph.
pub const DEGREE_MISSING: u32 = u32::MAX;

/// Selects which half(s) of an adjacency record an operation consults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
	/// The vertex acts as an edge source: the outgoing half.
	Source,
	/// The vertex acts as an edge target: the incoming half.
	Target,
	/// Both halves.
	Any,
}

impl Role {
	pub(crate) fn invert(self) -> Role {
		match self {
			Role::Source => Role::Target,
			Role::Target => Role::Source,
			Role::Any => Role::Any,
		}
	}
}

/// One `(neighbor, edge)` entry inside an adjacency record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Neighborship {
	pub neighbor: i64,
	pub edge: i64,
}

impl Neighborship {
	pub fn new(neighbor: i64, edge: i64) -> Self {
		Neighborship {
			neighbor,
			edge,
		}
	}
}

/// One directed edge observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
	pub source: i64,
	pub target: i64,
	pub id: i64,
}

/// A vertex's parsed neighborhood, split into its two halves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Neighborhood {
	pub outgoing: Vec<Neighborship>,
	pub incoming: Vec<Neighborship>,
}

/// The result of a `find_edges` call.
///
/// `degrees` always holds one entry per requested vertex, with
/// [`DEGREE_MISSING`] marking vertices absent from the graph. `edges` is the
/// flat list of matching edge observations; for `ANY` roles a vertex's
/// outgoing observations precede its incoming ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Neighborhoods {
	pub degrees: Vec<u32>,
	pub edges: Vec<Edge>,
}

/// The graph modality over one collection.
pub struct Graph<'a> {
	ds: &'a Datastore,
	collection: CollectionId,
}

impl<'a> Graph<'a> {
	pub(crate) fn new(ds: &'a Datastore, collection: CollectionId) -> Self {
		Graph {
			ds,
			collection,
		}
	}

	/// Create empty records for any of the given vertices that are missing.
	/// Vertices already present are left untouched.
	pub async fn upsert_vertices(&self, ctx: Context<'_>, vertices: &[i64]) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		if vertices.is_empty() {
			return Ok(());
		}
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let res = update::upsert_vertices(scope.tx(), self.collection, vertices).await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Remove vertices from the graph.
	///
	/// Each vertex is erased from every neighbor's record in the
	/// direction(s) implied by its role, then its own record is deleted.
	pub async fn remove_vertices(
		&self,
		ctx: Context<'_>,
		vertices: &[i64],
		roles: Param<'_, Role>,
	) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		roles.check_len(vertices.len(), "roles")?;
		if vertices.is_empty() {
			return Ok(());
		}
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let res = update::remove_vertices(scope.tx(), self.collection, vertices, roles).await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Insert a batch of edges, re-establishing the record invariants.
	///
	/// `edges` carries the edge ids; pass `None` to create every edge with
	/// [`EDGE_ID_DEFAULT`]. Upserting an already-present edge is a no-op.
	pub async fn upsert_edges(
		&self,
		ctx: Context<'_>,
		sources: &[i64],
		targets: &[i64],
		edges: Option<Param<'_, i64>>,
	) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		if sources.len() != targets.len() {
			return Err(Error::InvalidArgument(format!(
				"expected {} targets, found {}",
				sources.len(),
				targets.len()
			)));
		}
		let edges = edges.unwrap_or(Param::One(EDGE_ID_DEFAULT));
		edges.check_len(sources.len(), "edge ids")?;
		if sources.is_empty() {
			return Ok(());
		}
		let local = Arena::new();
		let bump = match arena {
			Some(a) => a.acquire(options.contains(crate::options::Options::DONT_DISCARD_MEMORY)),
			None => local.bump(),
		};
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let res =
			update::upsert_edges(scope.tx(), bump, self.collection, sources, targets, edges).await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Remove a batch of edges from both endpoint records.
	///
	/// `edges` selects exact edge ids; pass `None` to remove every parallel
	/// edge between each source and target pair.
	pub async fn remove_edges(
		&self,
		ctx: Context<'_>,
		sources: &[i64],
		targets: &[i64],
		edges: Option<Param<'_, i64>>,
	) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		if sources.len() != targets.len() {
			return Err(Error::InvalidArgument(format!(
				"expected {} targets, found {}",
				sources.len(),
				targets.len()
			)));
		}
		if let Some(edges) = &edges {
			edges.check_len(sources.len(), "edge ids")?;
		}
		if sources.is_empty() {
			return Ok(());
		}
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let res =
			update::remove_edges(scope.tx(), self.collection, sources, targets, edges).await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Report per-vertex degrees and the matching edge observations.
	pub async fn find_edges(
		&self,
		ctx: Context<'_>,
		vertices: &[i64],
		roles: Param<'_, Role>,
	) -> Result<Neighborhoods, Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_read()?;
		options.check_watch(transaction.is_some())?;
		roles.check_len(vertices.len(), "roles")?;
		let watch = options.watch() && transaction.is_some();
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Read).await?;
		let res =
			export::find_edges(scope.tx(), self.collection, vertices, roles, watch, true).await;
		match res {
			Ok(v) => {
				scope.finish().await?;
				Ok(v)
			}
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Report per-vertex degrees only.
	pub async fn degrees(
		&self,
		ctx: Context<'_>,
		vertices: &[i64],
		roles: Param<'_, Role>,
	) -> Result<Vec<u32>, Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_read()?;
		options.check_watch(transaction.is_some())?;
		roles.check_len(vertices.len(), "roles")?;
		let watch = options.watch() && transaction.is_some();
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Read).await?;
		let res =
			export::find_edges(scope.tx(), self.collection, vertices, roles, watch, false).await;
		match res {
			Ok(v) => {
				scope.finish().await?;
				Ok(v.degrees)
			}
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Check which of the given vertices exist in the graph.
	pub async fn contains(&self, ctx: Context<'_>, vertices: &[i64]) -> Result<Vec<bool>, Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_read()?;
		options.check_watch(transaction.is_some())?;
		let watch = options.watch() && transaction.is_some();
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Read).await?;
		let keys = vertices
			.iter()
			.map(|v| key::Record::new(self.collection, *v).encode())
			.collect();
		let res = scope.tx().getm(keys, watch).await;
		match res {
			Ok(values) => {
				scope.finish().await?;
				Ok(values.into_iter().map(|v| v.is_some()).collect())
			}
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Scan vertex keys in ascending order, starting at a key.
	pub async fn vertices(
		&self,
		ctx: Context<'_>,
		start: i64,
		limit: u32,
	) -> Result<Vec<i64>, Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_read()?;
		options.check_watch(transaction.is_some())?;
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Read).await?;
		let range = key::collection_range_from(self.collection, start);
		let res = scope.tx().keys(range, limit).await;
		match res {
			Ok(keys) => {
				scope.finish().await?;
				let mut out = Vec::with_capacity(keys.len());
				for bytes in keys {
					out.push(key::Record::decode(&bytes)?.key);
				}
				Ok(out)
			}
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}
}
