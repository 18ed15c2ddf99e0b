use super::Key;
use super::Transactor;
use super::Val;
use crate::err::Error;
use std::collections::VecDeque;
use std::ops::Range;

/// A pull iterator over a key range.
///
/// The scanner keeps an internal buffer which [`Scanner::seek_to_next_batch`]
/// refills with one substrate call at a time, so a full-range walk never
/// holds more than one batch in memory.
pub struct Scanner {
	/// The number of keys to fetch at once
	batch: u32,
	/// The remaining key range for this scan
	range: Range<Key>,
	/// The results from the last range scan
	results: VecDeque<(Key, Val)>,
	/// Whether this scanner should try to fetch more
	exhausted: bool,
}

impl Scanner {
	pub fn new(range: Range<Key>, batch: u32) -> Self {
		Scanner {
			batch: batch.max(1),
			range,
			results: VecDeque::new(),
			exhausted: false,
		}
	}

	/// Refill the internal buffer with the next batch of entries.
	///
	/// Returns `false` once the range is exhausted and nothing was fetched.
	pub async fn seek_to_next_batch(&mut self, tx: &mut Transactor) -> Result<bool, Error> {
		// If we still have buffered results there is nothing to do
		if !self.results.is_empty() {
			return Ok(true);
		}
		// If we won't fetch more results then exit
		if self.exhausted {
			return Ok(false);
		}
		// Fetch the next batch from the substrate
		let res = tx.scan(self.range.clone(), self.batch).await?;
		// There are no more results to fetch
		if res.is_empty() {
			self.exhausted = true;
			return Ok(false);
		}
		// We fetched the last entries in the range
		if res.len() < self.batch as usize {
			self.exhausted = true;
		}
		// Start the next scan right after the last result
		if let Some((last, _)) = res.last() {
			self.range.start.clone_from(last);
			self.range.start.push(0x00);
		}
		// Buffer the fetched entries
		self.results.extend(res);
		Ok(true)
	}

	/// Take the next buffered entry, if any.
	pub fn next_entry(&mut self) -> Option<(Key, Val)> {
		self.results.pop_front()
	}

	/// Fetch the next entry, refilling the buffer when it runs dry.
	pub async fn next(&mut self, tx: &mut Transactor) -> Result<Option<(Key, Val)>, Error> {
		if self.results.is_empty() && !self.seek_to_next_batch(tx).await? {
			return Ok(None);
		}
		Ok(self.next_entry())
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use crate::kvs::{Datastore, TransactionType};

	#[tokio::test]
	async fn scans_in_batches() {
		let ds = Datastore::new("memory").await.unwrap();
		let mut tx = ds.transaction(TransactionType::Write).await.unwrap();
		for i in 0u8..25 {
			tx.set(vec![i], vec![i]).await.unwrap();
		}
		tx.commit().await.unwrap();
		// Walk the full range with a tiny batch size
		let mut tx = ds.transaction(TransactionType::Read).await.unwrap();
		let mut scanner = Scanner::new(vec![0u8]..vec![0xff], 4);
		let mut seen = Vec::new();
		while let Some((key, _)) = scanner.next(&mut tx).await.unwrap() {
			seen.push(key[0]);
		}
		tx.cancel().await.unwrap();
		assert_eq!(seen, (0u8..25).collect::<Vec<u8>>());
	}
}
