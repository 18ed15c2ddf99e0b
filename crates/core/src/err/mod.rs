use thiserror::Error;

/// The error type for all public operations in this crate.
///
/// Per-item soft failures never surface here: a missing vertex in a degree
/// query, a missing key in a read, or a failed scalar coercion in a gather
/// are all reported in the result payload instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// There was a problem with the underlying datastore path
	#[error("There was a problem with the underlying datastore: {0}")]
	Ds(String),

	/// There was a problem with a datastore transaction
	#[error("There was a problem with a datastore transaction: {0}")]
	Tx(String),

	/// The transaction was already cancelled or committed
	#[error("Couldn't update a finished transaction")]
	TxFinished,

	/// The current transaction was created as read-only
	#[error("Couldn't write to a read only transaction")]
	TxReadonly,

	/// The transaction lost a conflict check to a concurrent writer.
	/// The operation can be retried on a fresh transaction.
	#[error("Failed to commit transaction due to a read or write conflict. This transaction can be retried")]
	TxRetryable,

	/// A required argument was missing or malformed
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// A required handle was not provided where one is mandatory
	#[error("The {0} is not initialised")]
	Uninitialized(&'static str),

	/// The operation is not supported by the configured engine
	#[error("Operation not supported: {0}")]
	NotSupported(String),

	/// The named snapshot does not exist
	#[error("The snapshot '{0}' does not exist")]
	SnapshotNotFound(String),

	/// The named collection does not exist
	#[error("The collection '{0}' does not exist")]
	CollectionNotFound(String),

	/// An arena allocation could not be satisfied
	#[error("The arena could not allocate {0} bytes")]
	OutOfMemory(usize),

	/// A JSON merge patch was not a JSON object
	#[error("Found '{0}' but a merge patch must be a JSON object")]
	InvalidMerge(String),

	/// A JSON patch operation list could not be applied
	#[error("Invalid patch: {0}")]
	InvalidPatch(String),

	/// A JSON patch `test` operation did not match
	#[error("Patch test operation failed: expected `{expected}`, but found `{got}`")]
	PatchTest {
		expected: String,
		got: String,
	},

	/// A filesystem operation failed
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// A JSON value could not be parsed or serialised
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// The Arrow layer reported an error
	#[error("Arrow error: {0}")]
	Arrow(#[from] arrow::error::ArrowError),

	/// The Parquet reader or writer reported an error
	#[error("Parquet error: {0}")]
	Parquet(#[from] parquet::errors::ParquetError),

	/// The CSV reader reported an error
	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),

	/// An internal invariant was violated
	#[error("Internal error: {0}")]
	Internal(String),
}
