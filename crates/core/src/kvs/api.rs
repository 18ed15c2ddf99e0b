use std::future::Future;
use std::ops::Range;

use super::tr::Check;
use super::Key;
use super::Val;
use crate::err::Error;

/// The contract every substrate engine fulfils.
///
/// A transaction accumulates reads and writes and applies the writes
/// atomically at commit against a consistent snapshot. The `watch` flag on
/// each read controls whether the key joins the conflict-detection read set.
pub trait Transaction {
	/// Behaviour if unclosed
	fn check_level(&mut self, check: Check);
	/// Check if closed
	fn closed(&self) -> bool;
	/// Check if writeable
	fn writeable(&self) -> bool;
	/// Cancel a transaction
	fn cancel(&mut self) -> impl Future<Output = Result<(), Error>>;
	/// Commit a transaction
	fn commit(&mut self) -> impl Future<Output = Result<(), Error>>;
	/// Check if a key exists
	fn exists(&mut self, key: Key, watch: bool) -> impl Future<Output = Result<bool, Error>>;
	/// Fetch a key from the database
	fn get(&mut self, key: Key, watch: bool) -> impl Future<Output = Result<Option<Val>, Error>>;
	/// Fetch many keys from the database in one batched request
	fn getm(
		&mut self,
		keys: Vec<Key>,
		watch: bool,
	) -> impl Future<Output = Result<Vec<Option<Val>>, Error>>;
	/// Insert or update a key in the database
	fn set(&mut self, key: Key, val: Val) -> impl Future<Output = Result<(), Error>>;
	/// Delete a key from the database
	fn del(&mut self, key: Key) -> impl Future<Output = Result<(), Error>>;
	/// Apply many inserts and deletes in one batched request.
	/// An entry with a `None` value deletes the key.
	fn setm(
		&mut self,
		entries: Vec<(Key, Option<Val>)>,
	) -> impl Future<Output = Result<(), Error>>;
	/// Retrieve a range of keys from the database
	fn keys(
		&mut self,
		rng: Range<Key>,
		limit: u32,
	) -> impl Future<Output = Result<Vec<Key>, Error>>;
	/// Retrieve a range of key-value pairs from the database
	fn scan(
		&mut self,
		rng: Range<Key>,
		limit: u32,
	) -> impl Future<Output = Result<Vec<(Key, Val)>, Error>>;
}
