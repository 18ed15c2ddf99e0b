use super::tr::{Inner as TrInner, TransactionType, Transactor};
use super::CollectionId;
use crate::blob::Blobs;
use crate::doc::Docs;
use crate::err::Error;
use crate::graph::Graph;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

const TARGET: &str = "polystore::core::kvs::ds";

/// The whole database instance.
///
/// A datastore owns the substrate engine, the collection registry and the
/// named snapshots. It is cheap to share behind an [`std::sync::Arc`];
/// modality handles borrow it for the duration of their calls.
#[non_exhaustive]
pub struct Datastore {
	/// The unique id of this datastore instance
	id: Uuid,
	/// The inner datastore engine
	inner: Inner,
	/// The registry of named collections
	collections: RwLock<HashMap<String, CollectionId>>,
	/// The next collection id to hand out
	sequence: AtomicU32,
}

pub(super) enum Inner {
	#[cfg(feature = "kv-mem")]
	Mem(super::mem::Datastore),
}

impl Datastore {
	/// Create a new datastore from a connection path.
	///
	/// ```rust,no_run
	/// # use polystore_core::kvs::Datastore;
	/// # use polystore_core::err::Error;
	/// # #[tokio::main]
	/// # async fn main() -> Result<(), Error> {
	/// let ds = Datastore::new("memory").await?;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn new(path: &str) -> Result<Datastore, Error> {
		let inner = match path {
			#[cfg(feature = "kv-mem")]
			"memory" => {
				info!(target: TARGET, "Starting kvs store in {}", path);
				Inner::Mem(super::mem::Datastore::new())
			}
			_ => {
				return Err(Error::Ds(format!("Unable to load the datastore at `{path}`")));
			}
		};
		Ok(Datastore {
			id: Uuid::new_v4(),
			inner,
			collections: RwLock::new(HashMap::new()),
			sequence: AtomicU32::new(1),
		})
	}

	/// The unique id of this datastore instance.
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Start a new transaction.
	pub async fn transaction(&self, write: TransactionType) -> Result<Transactor, Error> {
		let write = matches!(write, TransactionType::Write);
		let inner = match &self.inner {
			#[cfg(feature = "kv-mem")]
			Inner::Mem(ds) => TrInner::Mem(ds.transaction(write).await?),
		};
		Ok(Transactor {
			inner,
		})
	}

	/// Start a read-only transaction pinned to a named snapshot.
	pub async fn transaction_at(&self, snapshot: &str) -> Result<Transactor, Error> {
		let inner = match &self.inner {
			#[cfg(feature = "kv-mem")]
			Inner::Mem(ds) => TrInner::Mem(ds.transaction_at(snapshot).await?),
		};
		Ok(Transactor {
			inner,
		})
	}

	/// Create a named collection, or fetch its id if it already exists.
	pub async fn collection_create(&self, name: &str) -> Result<CollectionId, Error> {
		if name.is_empty() {
			return Err(Error::InvalidArgument("collection names must not be empty".to_string()));
		}
		let mut collections = self.collections.write().unwrap();
		if let Some(id) = collections.get(name) {
			return Ok(*id);
		}
		let id = CollectionId(self.sequence.fetch_add(1, Ordering::Relaxed));
		collections.insert(name.to_string(), id);
		debug!(target: TARGET, "Created collection {} as {:?}", name, id);
		Ok(id)
	}

	/// Look up a named collection.
	pub async fn collection(&self, name: &str) -> Result<CollectionId, Error> {
		match self.collections.read().unwrap().get(name) {
			Some(id) => Ok(*id),
			None => Err(Error::CollectionNotFound(name.to_string())),
		}
	}

	/// Check whether a named collection exists.
	pub async fn collection_contains(&self, name: &str) -> bool {
		self.collections.read().unwrap().contains_key(name)
	}

	/// List the named collections and their ids.
	pub async fn collection_list(&self) -> Result<Vec<(String, CollectionId)>, Error> {
		let mut list: Vec<(String, CollectionId)> =
			self.collections.read().unwrap().iter().map(|(k, v)| (k.clone(), *v)).collect();
		list.sort();
		Ok(list)
	}

	/// Drop a named collection as a unit, deleting all of its entries.
	pub async fn collection_drop(&self, name: &str) -> Result<(), Error> {
		// Resolve and unregister the collection first
		let id = {
			let mut collections = self.collections.write().unwrap();
			match collections.remove(name) {
				Some(id) => id,
				None => return Err(Error::CollectionNotFound(name.to_string())),
			}
		};
		// Then delete the whole key range it occupied
		let mut tx = self.transaction(TransactionType::Write).await?;
		let range = crate::key::collection_range(id);
		let res = async {
			loop {
				let batch = tx.keys(range.clone(), *crate::cnf::SCAN_BATCH_SIZE).await?;
				if batch.is_empty() {
					break;
				}
				let staged = batch.len();
				tx.setm(batch.into_iter().map(|key| (key, None)).collect()).await?;
				if staged < *crate::cnf::SCAN_BATCH_SIZE as usize {
					break;
				}
			}
			Ok(())
		}
		.await;
		match res {
			Ok(()) => tx.commit().await,
			Err(e) => {
				tx.cancel().await.ok();
				Err(e)
			}
		}
	}

	/// Freeze the current state of the substrate under a name.
	pub async fn snapshot_create(&self, name: &str) -> Result<(), Error> {
		match &self.inner {
			#[cfg(feature = "kv-mem")]
			Inner::Mem(ds) => ds.snapshot_create(name).await,
		}
	}

	/// Drop a named snapshot.
	pub async fn snapshot_drop(&self, name: &str) -> Result<(), Error> {
		match &self.inner {
			#[cfg(feature = "kv-mem")]
			Inner::Mem(ds) => ds.snapshot_drop(name).await,
		}
	}

	/// List the named snapshots.
	pub async fn snapshot_list(&self) -> Result<Vec<String>, Error> {
		match &self.inner {
			#[cfg(feature = "kv-mem")]
			Inner::Mem(ds) => ds.snapshot_list().await,
		}
	}

	/// Export a named snapshot to an external target.
	pub async fn snapshot_export(&self, name: &str) -> Result<(), Error> {
		match &self.inner {
			#[cfg(feature = "kv-mem")]
			Inner::Mem(_) => Err(Error::NotSupported(format!(
				"the memory engine cannot export snapshot `{name}`"
			))),
		}
	}

	/// The graph modality over a collection.
	pub fn graph(&self, collection: CollectionId) -> Graph<'_> {
		Graph::new(self, collection)
	}

	/// The document modality over a collection.
	pub fn docs(&self, collection: CollectionId) -> Docs<'_> {
		Docs::new(self, collection)
	}

	/// The binary blob modality over a collection.
	pub fn blobs(&self, collection: CollectionId) -> Blobs<'_> {
		Blobs::new(self, collection)
	}
}
