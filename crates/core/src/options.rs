use crate::err::Error;
use bitflags::bitflags;

bitflags! {
	/// Per-call behaviour flags shared by every public operation.
	///
	/// Invalid combinations are rejected before any substrate call is made.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
	pub struct Options: u32 {
		/// Forward the write to durable storage before returning.
		const WRITE_FLUSH = 0b0001;
		/// Don't track the keys read by this call for conflict detection.
		const TRANSACTION_DONT_WATCH = 0b0010;
		/// Keep the arena's chunks allocated for reuse by the next call.
		const DONT_DISCARD_MEMORY = 0b0100;
	}
}

impl Options {
	/// Validate the flags for a read-only operation.
	pub(crate) fn check_read(&self) -> Result<(), Error> {
		if self.contains(Options::WRITE_FLUSH) {
			return Err(Error::InvalidArgument(
				"WRITE_FLUSH is not applicable to a read".to_string(),
			));
		}
		Ok(())
	}

	/// Validate the watch flag against the presence of a transaction.
	pub(crate) fn check_watch(&self, has_transaction: bool) -> Result<(), Error> {
		if self.contains(Options::TRANSACTION_DONT_WATCH) && !has_transaction {
			return Err(Error::InvalidArgument(
				"TRANSACTION_DONT_WATCH requires a transaction".to_string(),
			));
		}
		Ok(())
	}

	/// Whether reads made under this call should be watched for conflicts.
	pub(crate) fn watch(&self) -> bool {
		!self.contains(Options::TRANSACTION_DONT_WATCH)
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn read_rejects_flush() {
		assert!(Options::WRITE_FLUSH.check_read().is_err());
		assert!(Options::default().check_read().is_ok());
	}

	#[test]
	fn watch_needs_transaction() {
		assert!(Options::TRANSACTION_DONT_WATCH.check_watch(false).is_err());
		assert!(Options::TRANSACTION_DONT_WATCH.check_watch(true).is_ok());
		assert!(Options::default().check_watch(false).is_ok());
	}
}
