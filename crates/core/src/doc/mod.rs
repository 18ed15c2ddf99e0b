//! The document modality.
//!
//! Every document is one top-level JSON object stored as a JSON tape.
//! Field-level operations address subtrees with JSON Pointers or bare
//! top-level names; whole-batch reads feed the gist and gather engines in
//! the `tbl` module.

mod merge;
mod operation;
mod patch;

pub(crate) mod pointer;

pub use operation::Operation;

use crate::codec::{Codec, JsonCodec};
use crate::ctx::{Context, Scope};
use crate::err::Error;
use crate::key;
use crate::kvs::{CollectionId, Datastore, TransactionType, Transactor};
use crate::mem::Arena;
use crate::tbl::{self, Cell, Table, TableHeader, TypeTag};
use serde_json::Value;

/// The document modality over one collection.
pub struct Docs<'a> {
	ds: &'a Datastore,
	collection: CollectionId,
}

impl<'a> Docs<'a> {
	pub(crate) fn new(ds: &'a Datastore, collection: CollectionId) -> Self {
		Docs {
			ds,
			collection,
		}
	}

	/// Replace whole documents. A single document is broadcast to every key.
	pub async fn assign(&self, ctx: Context<'_>, keys: &[i64], docs: &[Value]) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		check_broadcast(keys.len(), docs.len(), "documents")?;
		for doc in docs {
			if !doc.is_object() {
				return Err(Error::InvalidArgument(
					"a document must be a top-level JSON object".to_string(),
				));
			}
		}
		if keys.is_empty() {
			return Ok(());
		}
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let res = async {
			let mut staged = Vec::with_capacity(keys.len());
			for (i, k) in keys.iter().enumerate() {
				let doc = &docs[if docs.len() == 1 { 0 } else { i }];
				staged.push((
					key::Record::new(self.collection, *k).encode(),
					Some(JsonCodec.encode(doc)?),
				));
			}
			scope.tx().setm(staged).await
		}
		.await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Replace the subtree at a path in each document.
	///
	/// Missing documents start from an empty object and missing parents are
	/// materialised as objects along the way.
	pub async fn assign_at(
		&self,
		ctx: Context<'_>,
		path: &str,
		keys: &[i64],
		fragments: &[Value],
	) -> Result<(), Error> {
		let segments = pointer::segments(path);
		if segments.is_empty() {
			return self.assign(ctx, keys, fragments).await;
		}
		self.rewrite(ctx, keys, fragments, move |doc, fragment| {
			pointer::put(doc, &segments, fragment.clone());
			Ok(())
		})
		.await
	}

	/// Apply an RFC 7396 JSON Merge Patch to each document.
	pub async fn merge(&self, ctx: Context<'_>, keys: &[i64], patches: &[Value]) -> Result<(), Error> {
		for patch in patches {
			if !patch.is_object() {
				return Err(Error::InvalidMerge(patch.to_string()));
			}
		}
		self.rewrite(ctx, keys, patches, |doc, patch| {
			merge::merge(doc, patch);
			Ok(())
		})
		.await
	}

	/// Apply an RFC 6902 JSON Patch to each document.
	///
	/// Each patch is the JSON array of operations. A failing `test`,
	/// `move` or `copy` fails the whole call and writes nothing.
	pub async fn patch(&self, ctx: Context<'_>, keys: &[i64], patches: &[Value]) -> Result<(), Error> {
		let mut parsed = Vec::with_capacity(patches.len());
		for ops in patches {
			let ops: Vec<Operation> = serde_json::from_value(ops.clone())
				.map_err(|e| Error::InvalidPatch(e.to_string()))?;
			parsed.push(ops);
		}
		self.rewrite(ctx, keys, &parsed, |doc, ops| patch::patch(doc, ops)).await
	}

	/// Read whole documents; a missing key yields `None`.
	pub async fn read(&self, ctx: Context<'_>, keys: &[i64]) -> Result<Vec<Option<Value>>, Error> {
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
		let res = self.load(scope.tx(), keys, watch).await;
		match res {
			Ok(docs) => {
				scope.finish().await?;
				Ok(docs)
			}
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Read the subtree at a path; a missing key or path yields `None`.
	pub async fn read_at(
		&self,
		ctx: Context<'_>,
		path: &str,
		keys: &[i64],
	) -> Result<Vec<Option<Value>>, Error> {
		let segments = pointer::segments(path);
		let docs = self.read(ctx, keys).await?;
		Ok(docs
			.into_iter()
			.map(|doc| doc.and_then(|doc| pointer::pick(&doc, &segments).cloned()))
			.collect())
	}

	/// Read the scalar at a path, coerced to the requested type.
	///
	/// A missing key or path, a `null` source or a failed coercion yields
	/// `None`; a lossy or cross-type coercion sets the `converted` flag.
	pub async fn read_scalar(
		&self,
		ctx: Context<'_>,
		path: &str,
		tag: TypeTag,
		keys: &[i64],
	) -> Result<Vec<Option<Cell>>, Error> {
		let segments = pointer::segments(path);
		let docs = self.read(ctx, keys).await?;
		Ok(docs
			.into_iter()
			.map(|doc| {
				doc.and_then(|doc| {
					pointer::pick(&doc, &segments).and_then(|value| tbl::coerce(value, tag))
				})
			})
			.collect())
	}

	/// The union of pointer paths to leaf values across a batch.
	pub async fn gist(&self, ctx: Context<'_>, keys: &[i64]) -> Result<Vec<String>, Error> {
		let docs = self.read(ctx, keys).await?;
		Ok(tbl::gist(&docs))
	}

	/// Materialise a typed columnar table from a batch of documents.
	pub async fn gather(
		&self,
		ctx: Context<'_>,
		keys: &[i64],
		header: &TableHeader,
	) -> Result<Table, Error> {
		let Context {
			transaction,
			snapshot,
			arena,
			options,
		} = ctx;
		options.check_read()?;
		options.check_watch(transaction.is_some())?;
		let watch = options.watch() && transaction.is_some();
		let local = Arena::new();
		let bump = match arena {
			Some(a) => a.acquire(options.contains(crate::options::Options::DONT_DISCARD_MEMORY)),
			None => local.bump(),
		};
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Read).await?;
		let res = self.load(scope.tx(), keys, watch).await;
		match res {
			Ok(docs) => {
				scope.finish().await?;
				tbl::gather(bump, &docs, header)
			}
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}

	/// Fetch and parse a batch of documents with one substrate read.
	async fn load(
		&self,
		tx: &mut Transactor,
		keys: &[i64],
		watch: bool,
	) -> Result<Vec<Option<Value>>, Error> {
		let keys = keys.iter().map(|k| key::Record::new(self.collection, *k).encode()).collect();
		let values = tx.getm(keys, watch).await?;
		let mut docs = Vec::with_capacity(values.len());
		for value in values {
			docs.push(match value {
				Some(bytes) => Some(JsonCodec.decode(&bytes)?),
				None => None,
			});
		}
		Ok(docs)
	}

	/// The shared read-modify-write loop behind the field-level writes.
	///
	/// Missing documents start from an empty object, every rewritten
	/// document is validated to still be a top-level object, and the whole
	/// batch commits as one substrate write.
	async fn rewrite<P>(
		&self,
		ctx: Context<'_>,
		keys: &[i64],
		patches: &[P],
		apply: impl Fn(&mut Value, &P) -> Result<(), Error>,
	) -> Result<(), Error> {
		let Context {
			transaction,
			snapshot,
			arena: _,
			options,
		} = ctx;
		options.check_watch(transaction.is_some())?;
		check_broadcast(keys.len(), patches.len(), "patches")?;
		if keys.is_empty() {
			return Ok(());
		}
		let mut scope =
			Scope::acquire(self.ds, transaction, snapshot, TransactionType::Write).await?;
		let res = async {
			let docs = self.load(scope.tx(), keys, true).await?;
			let mut staged = Vec::with_capacity(keys.len());
			for (i, (k, doc)) in keys.iter().zip(docs).enumerate() {
				let mut doc = doc.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
				let patch = &patches[if patches.len() == 1 { 0 } else { i }];
				apply(&mut doc, patch)?;
				if !doc.is_object() {
					return Err(Error::InvalidArgument(
						"a document must remain a top-level JSON object".to_string(),
					));
				}
				staged.push((
					key::Record::new(self.collection, *k).encode(),
					Some(JsonCodec.encode(&doc)?),
				));
			}
			scope.tx().setm(staged).await
		}
		.await;
		match res {
			Ok(()) => scope.finish().await,
			Err(e) => {
				scope.abort().await;
				Err(e)
			}
		}
	}
}

/// Validate a per-task input that may be broadcast from a single element.
fn check_broadcast(tasks: usize, found: usize, what: &str) -> Result<(), Error> {
	if found != tasks && found != 1 {
		return Err(Error::InvalidArgument(format!("expected {tasks} {what}, found {found}")));
	}
	Ok(())
}
