use super::api::Transaction;
use super::Key;
use super::Val;
use crate::err::Error;
use std::fmt;
use std::ops::Range;

const TARGET: &str = "polystore::core::kvs::tr";

/// Used to determine the behaviour when a transaction is not closed correctly
#[derive(Default)]
pub enum Check {
	#[default]
	None,
	Warn,
	Panic,
}

/// Specifies whether the transaction is read-only or writeable.
#[derive(Copy, Clone)]
pub enum TransactionType {
	Read,
	Write,
}

impl From<bool> for TransactionType {
	fn from(value: bool) -> Self {
		match value {
			true => TransactionType::Write,
			false => TransactionType::Read,
		}
	}
}

/// A set of batched updates and reads against the substrate.
///
/// All writes staged on a transactor become visible atomically at commit,
/// or not at all. A transactor is single-owner: it is driven through an
/// exclusive reference and must not be shared between threads mid-flight.
#[non_exhaustive]
pub struct Transactor {
	pub(super) inner: Inner,
}

pub(super) enum Inner {
	#[cfg(feature = "kv-mem")]
	Mem(super::mem::Transaction),
}

impl fmt::Display for Transactor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		#![allow(unused_variables)]
		match &self.inner {
			#[cfg(feature = "kv-mem")]
			Inner::Mem(_) => write!(f, "memory"),
			#[allow(unreachable_patterns)]
			_ => unreachable!(),
		}
	}
}

macro_rules! expand_inner {
	( $v:expr, $arm:pat_param => $b:block ) => {
		match $v {
			#[cfg(feature = "kv-mem")]
			Inner::Mem($arm) => $b,
			#[allow(unreachable_patterns)]
			_ => unreachable!(),
		}
	};
}

impl Transactor {
	/// Check if the transaction is finished.
	///
	/// If the transaction has been cancelled or committed, then this
	/// function will return [`true`], and any further calls to functions
	/// on this transaction will result in a [`Error::TxFinished`] error.
	pub fn closed(&self) -> bool {
		expand_inner!(&self.inner, v => { v.closed() })
	}

	/// Check if the transaction is writeable.
	pub fn writeable(&self) -> bool {
		expand_inner!(&self.inner, v => { v.writeable() })
	}

	/// Cancel the transaction.
	///
	/// This reverses all changes made within the transaction.
	pub async fn cancel(&mut self) -> Result<(), Error> {
		trace!(target: TARGET, "cancel");
		expand_inner!(&mut self.inner, v => { v.cancel().await })
	}

	/// Commit the transaction.
	///
	/// This attempts to atomically apply all changes made within the
	/// transaction. A conflict with a concurrently committed transaction
	/// surfaces as [`Error::TxRetryable`].
	pub async fn commit(&mut self) -> Result<(), Error> {
		trace!(target: TARGET, "commit");
		expand_inner!(&mut self.inner, v => { v.commit().await })
	}

	/// Check if a key exists in the substrate.
	pub async fn exists(&mut self, key: Key, watch: bool) -> Result<bool, Error> {
		expand_inner!(&mut self.inner, v => { v.exists(key, watch).await })
	}

	/// Fetch a key from the substrate.
	pub async fn get(&mut self, key: Key, watch: bool) -> Result<Option<Val>, Error> {
		expand_inner!(&mut self.inner, v => { v.get(key, watch).await })
	}

	/// Fetch many keys from the substrate in one batched request.
	pub async fn getm(&mut self, keys: Vec<Key>, watch: bool) -> Result<Vec<Option<Val>>, Error> {
		trace!(target: TARGET, "getm {} keys", keys.len());
		expand_inner!(&mut self.inner, v => { v.getm(keys, watch).await })
	}

	/// Insert or update a key in the substrate.
	pub async fn set(&mut self, key: Key, val: Val) -> Result<(), Error> {
		expand_inner!(&mut self.inner, v => { v.set(key, val).await })
	}

	/// Delete a key from the substrate.
	pub async fn del(&mut self, key: Key) -> Result<(), Error> {
		expand_inner!(&mut self.inner, v => { v.del(key).await })
	}

	/// Apply many inserts and deletes in one batched request.
	/// An entry with a `None` value deletes the key.
	pub async fn setm(&mut self, entries: Vec<(Key, Option<Val>)>) -> Result<(), Error> {
		trace!(target: TARGET, "setm {} entries", entries.len());
		expand_inner!(&mut self.inner, v => { v.setm(entries).await })
	}

	/// Retrieve a range of keys from the substrate.
	pub async fn keys(&mut self, rng: Range<Key>, limit: u32) -> Result<Vec<Key>, Error> {
		expand_inner!(&mut self.inner, v => { v.keys(rng, limit).await })
	}

	/// Retrieve a range of key-value pairs from the substrate.
	pub async fn scan(&mut self, rng: Range<Key>, limit: u32) -> Result<Vec<(Key, Val)>, Error> {
		expand_inner!(&mut self.inner, v => { v.scan(rng, limit).await })
	}
}
