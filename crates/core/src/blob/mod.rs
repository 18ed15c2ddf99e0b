//! The binary blob modality.
//!
//! Blobs carry no interpretation: values go in and come out as raw byte
//! strings. A missing value is distinguished from an empty one.

use crate::ctx::{Context, Scope};
use crate::err::Error;
use crate::key;
use crate::kvs::{CollectionId, Datastore, TransactionType, Val};

/// The blob modality over one collection.
pub struct Blobs<'a> {
	ds: &'a Datastore,
	collection: CollectionId,
}

impl<'a> Blobs<'a> {
	pub(crate) fn new(ds: &'a Datastore, collection: CollectionId) -> Self {
		Blobs {
			ds,
			collection,
		}
	}

	/// Write a batch of values. A single value is broadcast to every key.
	pub async fn set(&self, ctx: Context<'_>, keys: &[i64], values: &[Val]) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		if values.len() != keys.len() && values.len() != 1 {
			return Err(Error::InvalidArgument(format!(
				"expected {} values, found {}",
				keys.len(),
				values.len()
			)));
		}
		if keys.is_empty() {
			return Ok(());
		}
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let staged = keys
			.iter()
			.enumerate()
			.map(|(i, k)| {
				let value = &values[if values.len() == 1 { 0 } else { i }];
				(key::Record::new(self.collection, *k).encode(), Some(value.clone()))
			})
			.collect();
		let res = scope.tx().setm(staged).await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Read a batch of values; a missing key yields `None`.
	pub async fn get(&self, ctx: Context<'_>, keys: &[i64]) -> Result<Vec<Option<Val>>, Error> {
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
		let keys = keys.iter().map(|k| key::Record::new(self.collection, *k).encode()).collect();
		let res = scope.tx().getm(keys, watch).await;
		match res {
			Ok(values) => {
				scope.finish().await?;
				Ok(values)
			}
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Check which of the given keys hold a value.
	pub async fn contains(&self, ctx: Context<'_>, keys: &[i64]) -> Result<Vec<bool>, Error> {
		Ok(self.get(ctx, keys).await?.into_iter().map(|v| v.is_some()).collect())
	}

	/// Delete a batch of keys.
	pub async fn remove(&self, ctx: Context<'_>, keys: &[i64]) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		if keys.is_empty() {
			return Ok(());
		}
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let staged =
			keys.iter().map(|k| (key::Record::new(self.collection, *k).encode(), None)).collect();
		let res = scope.tx().setm(staged).await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Scan keys and values in ascending key order, starting at a key.
	pub async fn scan(
		&self,
		ctx: Context<'_>,
		start: i64,
		limit: u32,
	) -> Result<Vec<(i64, Val)>, Error> {
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
		let res = scope.tx().scan(range, limit).await;
		match res {
			Ok(entries) => {
				scope.finish().await?;
				let mut out = Vec::with_capacity(entries.len());
				for (bytes, value) in entries {
					out.push((key::Record::decode(&bytes)?.key, value));
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
