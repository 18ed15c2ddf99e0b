#![cfg(feature = "kv-mem")]

//! The in-memory reference engine.
//!
//! An ordered map guarded by a mutex, with optimistic transactions: every
//! transaction pins the map version it started from, watched reads and all
//! writes are validated against that version at commit, and the loser of a
//! conflict gets a retriable error. Named snapshots clone the shared map
//! handle, so creating one is cheap and the frozen view lives until dropped.

use super::api::Transaction as Api;
use super::Check;
use super::Key;
use super::Val;
use crate::err::Error;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use std::sync::Mutex;

pub(crate) struct Datastore {
	inner: Arc<Inner>,
}

struct Inner {
	/// The live map and its modification bookkeeping
	state: Mutex<State>,
	/// Named frozen views of the map
	snapshots: Mutex<HashMap<String, Arc<BTreeMap<Key, Val>>>>,
}

struct State {
	/// Bumped once per committed transaction
	version: u64,
	/// The live entries; copy-on-write when snapshots hold references
	entries: Arc<BTreeMap<Key, Val>>,
	/// The version at which each key was last modified
	stamps: HashMap<Key, u64>,
}

pub struct Transaction {
	/// Is the transaction complete?
	done: bool,
	/// Is the transaction writeable?
	write: bool,
	/// Should we check unhandled transactions?
	check: Check,
	/// The engine this transaction belongs to
	inner: Arc<Inner>,
	/// The map version this transaction started from
	base: u64,
	/// The consistent view this transaction reads from
	view: Arc<BTreeMap<Key, Val>>,
	/// Keys read with the watch flag set
	watched: HashSet<Key>,
	/// Pending writes; `None` marks a deletion
	staged: BTreeMap<Key, Option<Val>>,
}

impl Drop for Transaction {
	fn drop(&mut self) {
		if !self.done && self.write {
			// Check if already panicking
			if std::thread::panicking() {
				return;
			}
			// Handle the behaviour
			match self.check {
				Check::None => {
					trace!("A transaction was dropped without being committed or cancelled");
				}
				Check::Warn => {
					warn!("A transaction was dropped without being committed or cancelled");
				}
				Check::Panic => {
					panic!("A transaction was dropped without being committed or cancelled");
				}
			}
		}
	}
}

impl Datastore {
	/// Open a new database
	pub(crate) fn new() -> Datastore {
		Datastore {
			inner: Arc::new(Inner {
				state: Mutex::new(State {
					version: 0,
					entries: Arc::new(BTreeMap::new()),
					stamps: HashMap::new(),
				}),
				snapshots: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// Start a new transaction against the live map
	pub(crate) async fn transaction(&self, write: bool) -> Result<Transaction, Error> {
		// Specify the check level
		#[cfg(not(debug_assertions))]
		let check = Check::Warn;
		#[cfg(debug_assertions)]
		let check = Check::Panic;
		// Pin the current version and view
		let state = self.inner.state.lock().unwrap();
		let base = state.version;
		let view = state.entries.clone();
		drop(state);
		// Create a new transaction
		Ok(Transaction {
			done: false,
			write,
			check,
			inner: self.inner.clone(),
			base,
			view,
			watched: HashSet::new(),
			staged: BTreeMap::new(),
		})
	}

	/// Start a read-only transaction pinned to a named snapshot
	pub(crate) async fn transaction_at(&self, snapshot: &str) -> Result<Transaction, Error> {
		let snapshots = self.inner.snapshots.lock().unwrap();
		let view = match snapshots.get(snapshot) {
			Some(view) => view.clone(),
			None => return Err(Error::SnapshotNotFound(snapshot.to_string())),
		};
		drop(snapshots);
		Ok(Transaction {
			done: false,
			write: false,
			check: Check::None,
			inner: self.inner.clone(),
			base: 0,
			view,
			watched: HashSet::new(),
			staged: BTreeMap::new(),
		})
	}

	/// Freeze the current map under a name
	pub(crate) async fn snapshot_create(&self, name: &str) -> Result<(), Error> {
		let view = self.inner.state.lock().unwrap().entries.clone();
		self.inner.snapshots.lock().unwrap().insert(name.to_string(), view);
		Ok(())
	}

	/// Drop a named snapshot
	pub(crate) async fn snapshot_drop(&self, name: &str) -> Result<(), Error> {
		match self.inner.snapshots.lock().unwrap().remove(name) {
			Some(_) => Ok(()),
			None => Err(Error::SnapshotNotFound(name.to_string())),
		}
	}

	/// List the named snapshots
	pub(crate) async fn snapshot_list(&self) -> Result<Vec<String>, Error> {
		let mut names: Vec<String> =
			self.inner.snapshots.lock().unwrap().keys().cloned().collect();
		names.sort();
		Ok(names)
	}
}

impl Transaction {
	/// Read one key through the staged writes into the pinned view
	fn lookup(&self, key: &[u8]) -> Option<Val> {
		match self.staged.get(key) {
			Some(staged) => staged.clone(),
			None => self.view.get(key).cloned(),
		}
	}
}

impl Api for Transaction {
	/// Behaviour if unclosed
	fn check_level(&mut self, check: Check) {
		self.check = check;
	}

	/// Check if closed
	fn closed(&self) -> bool {
		self.done
	}

	/// Check if writeable
	fn writeable(&self) -> bool {
		self.write
	}

	/// Cancel a transaction
	async fn cancel(&mut self) -> Result<(), Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Mark this transaction as done
		self.done = true;
		// Forget any staged changes
		self.staged.clear();
		self.watched.clear();
		// Continue
		Ok(())
	}

	/// Commit a transaction
	async fn commit(&mut self) -> Result<(), Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Check to see if transaction is writable
		if !self.write {
			return Err(Error::TxReadonly);
		}
		// Mark this transaction as done
		self.done = true;
		// Validate and apply the staged changes
		let mut state = self.inner.state.lock().unwrap();
		for key in self.watched.iter().chain(self.staged.keys()) {
			if state.stamps.get(key).is_some_and(|stamp| *stamp > self.base) {
				return Err(Error::TxRetryable);
			}
		}
		let State {
			version,
			entries,
			stamps,
		} = &mut *state;
		*version += 1;
		let entries = Arc::make_mut(entries);
		for (key, val) in std::mem::take(&mut self.staged) {
			match val {
				Some(val) => {
					entries.insert(key.clone(), val);
				}
				None => {
					entries.remove(&key);
				}
			}
			stamps.insert(key, *version);
		}
		// Continue
		Ok(())
	}

	/// Check if a key exists
	async fn exists(&mut self, key: Key, watch: bool) -> Result<bool, Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Track the key if requested
		if watch {
			self.watched.insert(key.clone());
		}
		// Check the key
		Ok(self.lookup(&key).is_some())
	}

	/// Fetch a key from the database
	async fn get(&mut self, key: Key, watch: bool) -> Result<Option<Val>, Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Track the key if requested
		if watch {
			self.watched.insert(key.clone());
		}
		// Get the key
		Ok(self.lookup(&key))
	}

	/// Fetch many keys from the database in one batched request
	async fn getm(&mut self, keys: Vec<Key>, watch: bool) -> Result<Vec<Option<Val>>, Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Get the keys
		let mut out = Vec::with_capacity(keys.len());
		for key in keys {
			if watch {
				self.watched.insert(key.clone());
			}
			out.push(self.lookup(&key));
		}
		Ok(out)
	}

	/// Insert or update a key in the database
	async fn set(&mut self, key: Key, val: Val) -> Result<(), Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Check to see if transaction is writable
		if !self.write {
			return Err(Error::TxReadonly);
		}
		// Stage the write
		self.staged.insert(key, Some(val));
		// Return result
		Ok(())
	}

	/// Delete a key from the database
	async fn del(&mut self, key: Key) -> Result<(), Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Check to see if transaction is writable
		if !self.write {
			return Err(Error::TxReadonly);
		}
		// Stage the deletion
		self.staged.insert(key, None);
		// Return result
		Ok(())
	}

	/// Apply many inserts and deletes in one batched request
	async fn setm(&mut self, entries: Vec<(Key, Option<Val>)>) -> Result<(), Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Check to see if transaction is writable
		if !self.write {
			return Err(Error::TxReadonly);
		}
		// Stage the writes
		for (key, val) in entries {
			self.staged.insert(key, val);
		}
		// Return result
		Ok(())
	}

	/// Retrieve a range of keys from the database
	async fn keys(&mut self, rng: Range<Key>, limit: u32) -> Result<Vec<Key>, Error> {
		let res = self.scan(rng, limit).await?;
		Ok(res.into_iter().map(|(key, _)| key).collect())
	}

	/// Retrieve a range of key-value pairs from the database
	async fn scan(&mut self, rng: Range<Key>, limit: u32) -> Result<Vec<(Key, Val)>, Error> {
		// Check to see if transaction is closed
		if self.done {
			return Err(Error::TxFinished);
		}
		// Overlay the staged writes onto the pinned view
		let mut merged: BTreeMap<&Key, Option<&Val>> = self
			.view
			.range(rng.clone())
			.map(|(key, val)| (key, Some(val)))
			.collect();
		for (key, val) in self.staged.range(rng) {
			merged.insert(key, val.as_ref());
		}
		// Return the surviving entries up to the limit
		Ok(merged
			.into_iter()
			.filter_map(|(key, val)| val.map(|val| (key.clone(), val.clone())))
			.take(limit as usize)
			.collect())
	}
}
