//! The per-call scratch arena.
//!
//! Every public operation acquires one bump arena for the duration of the
//! call: working sets, rebuilt adjacency records and gather scratch all live
//! in it and are released together when the call returns. A caller may pass
//! its own [`Arena`] through the call context to reuse the chunks across
//! calls instead of growing a fresh one every time.

use bumpalo::Bump;

/// A linked bump arena scoped to one public call at a time.
pub struct Arena {
	bump: Bump,
}

impl Default for Arena {
	fn default() -> Self {
		Self::new()
	}
}

impl Arena {
	/// Create an empty arena. No memory is reserved until first use.
	pub fn new() -> Self {
		Arena {
			bump: Bump::new(),
		}
	}

	/// Create an arena with an initial chunk of the given size.
	pub fn with_capacity(bytes: usize) -> Self {
		Arena {
			bump: Bump::with_capacity(bytes),
		}
	}

	/// Claim the arena for a new call.
	///
	/// Resets the allocation cursor so previous scratch is reclaimed, unless
	/// `keep` is set, in which case earlier allocations stay untouched and
	/// the new call allocates on top of them.
	pub(crate) fn acquire(&mut self, keep: bool) -> &Bump {
		if !keep {
			self.bump.reset();
		}
		&self.bump
	}

	/// Direct access for a call that owns this arena.
	pub(crate) fn bump(&self) -> &Bump {
		&self.bump
	}

	/// The number of bytes currently reserved by the arena's chunks.
	pub fn allocated_bytes(&self) -> usize {
		self.bump.allocated_bytes()
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn reuse_after_acquire() {
		let mut arena = Arena::new();
		{
			let bump = arena.acquire(false);
			let slice = bump.alloc_slice_fill_copy(1024, 7u8);
			assert_eq!(slice[1023], 7);
		}
		let reserved = arena.allocated_bytes();
		assert!(reserved >= 1024);
		// A fresh acquisition reuses the same chunks
		{
			let bump = arena.acquire(false);
			bump.alloc_slice_fill_copy(512, 0u8);
		}
		assert_eq!(arena.allocated_bytes(), reserved);
	}

	#[test]
	fn keep_retains_previous_allocations() {
		let mut arena = Arena::new();
		arena.acquire(false).alloc_slice_fill_copy(64, 1u8);
		let before = arena.allocated_bytes();
		arena.acquire(true).alloc_slice_fill_copy(64, 2u8);
		assert!(arena.allocated_bytes() >= before);
	}
}
