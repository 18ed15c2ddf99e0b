//! The per-call execution context.
//!
//! Every public operation takes one [`Context`] carrying the cross-cutting
//! pieces of the call: an optional caller transaction, an optional named
//! snapshot for reads, an optional reusable arena, and the options bitset.
//! Inputs that may be broadcast across a batch are passed as [`Param`].

use crate::err::Error;
use crate::kvs::{Datastore, TransactionType, Transactor};
use crate::mem::Arena;
use crate::options::Options;

/// The cross-cutting arguments of one public call.
#[derive(Default)]
pub struct Context<'a> {
	/// Accumulate this call into a caller-owned transaction
	pub transaction: Option<&'a mut Transactor>,
	/// Pin reads to a named snapshot
	pub snapshot: Option<&'a str>,
	/// Reuse a caller-owned arena for this call's scratch space
	pub arena: Option<&'a mut Arena>,
	/// Behaviour flags for this call
	pub options: Options,
}

impl<'a> Context<'a> {
	pub fn new() -> Self {
		Context::default()
	}

	/// Accumulate this call into a caller-owned transaction.
	pub fn with_transaction(mut self, tx: &'a mut Transactor) -> Self {
		self.transaction = Some(tx);
		self
	}

	/// Pin this call's reads to a named snapshot.
	pub fn with_snapshot(mut self, snapshot: &'a str) -> Self {
		self.snapshot = Some(snapshot);
		self
	}

	/// Reuse a caller-owned arena for this call's scratch space.
	pub fn with_arena(mut self, arena: &'a mut Arena) -> Self {
		self.arena = Some(arena);
		self
	}

	/// Set the behaviour flags for this call.
	pub fn with_options(mut self, options: Options) -> Self {
		self.options = options;
		self
	}
}

/// A batch input that is either broadcast from one value or given per task.
///
/// This mirrors a strided argument with a stride of zero: a single value is
/// reused for every task in the batch.
#[derive(Clone, Copy)]
pub enum Param<'a, T> {
	One(T),
	Many(&'a [T]),
}

impl<T: Copy> Param<'_, T> {
	/// The value for one task of the batch.
	pub fn get(&self, index: usize) -> T {
		match self {
			Param::One(value) => *value,
			Param::Many(values) => values[index],
		}
	}

	/// Ensure the parameter can serve a batch of the given length.
	pub fn check_len(&self, tasks: usize, what: &str) -> Result<(), Error> {
		match self {
			Param::One(_) => Ok(()),
			Param::Many(values) if values.len() == tasks => Ok(()),
			Param::Many(values) => Err(Error::InvalidArgument(format!(
				"expected {tasks} {what}, found {}",
				values.len()
			))),
		}
	}
}

impl<T: Copy> From<T> for Param<'_, T> {
	fn from(value: T) -> Self {
		Param::One(value)
	}
}

impl<'a, T: Copy> From<&'a [T]> for Param<'a, T> {
	fn from(values: &'a [T]) -> Self {
		Param::Many(values)
	}
}

/// The transaction scope of one call: either the caller's transaction is
/// borrowed, or a fresh autocommit transaction is owned by the call.
pub(crate) enum Scope<'a> {
	Borrowed(&'a mut Transactor),
	Owned(Transactor),
}

impl<'a> Scope<'a> {
	/// Resolve the transaction for a call.
	pub(crate) async fn acquire(
		ds: &Datastore,
		caller: Option<&'a mut Transactor>,
		snapshot: Option<&str>,
		write: TransactionType,
	) -> Result<Scope<'a>, Error> {
		match caller {
			Some(tx) => {
				if tx.closed() {
					return Err(Error::TxFinished);
				}
				if matches!(write, TransactionType::Write) && !tx.writeable() {
					return Err(Error::TxReadonly);
				}
				if snapshot.is_some() {
					return Err(Error::InvalidArgument(
						"a snapshot cannot be combined with a transaction".to_string(),
					));
				}
				Ok(Scope::Borrowed(tx))
			}
			None => match snapshot {
				Some(name) => {
					if matches!(write, TransactionType::Write) {
						return Err(Error::InvalidArgument(
							"a snapshot cannot serve a write".to_string(),
						));
					}
					Ok(Scope::Owned(ds.transaction_at(name).await?))
				}
				None => Ok(Scope::Owned(ds.transaction(write).await?)),
			},
		}
	}

	/// The transaction to run this call against.
	pub(crate) fn tx(&mut self) -> &mut Transactor {
		match self {
			Scope::Borrowed(tx) => tx,
			Scope::Owned(tx) => tx,
		}
	}

	/// Complete the call, committing an owned autocommit transaction.
	pub(crate) async fn finish(self) -> Result<(), Error> {
		match self {
			Scope::Borrowed(_) => Ok(()),
			Scope::Owned(mut tx) => match tx.writeable() {
				true => tx.commit().await,
				false => tx.cancel().await,
			},
		}
	}

	/// Abandon the call, cancelling an owned autocommit transaction.
	pub(crate) async fn abort(self) {
		if let Scope::Owned(mut tx) = self {
			tx.cancel().await.ok();
		}
	}
}
