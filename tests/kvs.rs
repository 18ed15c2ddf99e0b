use polystore::ctx::Context;
use polystore::kvs::{CollectionId, Datastore, TransactionType};
use polystore::options::Options;
use polystore::Error;

#[tokio::test]
async fn unknown_datastore_paths_are_rejected() {
	assert!(matches!(Datastore::new("file:///tmp/nope").await, Err(Error::Ds(_))));
}

#[tokio::test]
async fn blobs_distinguish_missing_from_empty() {
	let ds = Datastore::new("memory").await.unwrap();
	let blobs = ds.blobs(CollectionId::MAIN);
	blobs.set(Context::new(), &[1, 2], &[b"value".to_vec(), Vec::new()]).await.unwrap();
	let found = blobs.get(Context::new(), &[1, 2, 3]).await.unwrap();
	assert_eq!(found[0].as_deref(), Some(&b"value"[..]));
	assert_eq!(found[1].as_deref(), Some(&[][..]));
	assert_eq!(found[2], None);
	assert_eq!(blobs.contains(Context::new(), &[2, 3]).await.unwrap(), vec![true, false]);
	blobs.remove(Context::new(), &[1]).await.unwrap();
	assert_eq!(blobs.contains(Context::new(), &[1]).await.unwrap(), vec![false]);
}

#[tokio::test]
async fn scan_returns_exactly_the_stored_keys() {
	let ds = Datastore::new("memory").await.unwrap();
	let blobs = ds.blobs(CollectionId::MAIN);
	let keys: Vec<i64> = vec![-5, -1, 0, 3, 900];
	blobs.set(Context::new(), &keys, &[b"x".to_vec()]).await.unwrap();
	let scanned = blobs.scan(Context::new(), i64::MIN, 100).await.unwrap();
	let scanned_keys: Vec<i64> = scanned.iter().map(|(k, _)| *k).collect();
	assert_eq!(scanned_keys, keys);
	// A later start key narrows the scan
	let scanned = blobs.scan(Context::new(), 0, 100).await.unwrap();
	assert_eq!(scanned.len(), 3);
}

#[tokio::test]
async fn named_collections_are_isolated_units() {
	let ds = Datastore::new("memory").await.unwrap();
	let people = ds.collection_create("people").await.unwrap();
	let places = ds.collection_create("places").await.unwrap();
	assert_ne!(people, places);
	// Creating again returns the same handle
	assert_eq!(ds.collection_create("people").await.unwrap(), people);
	assert!(ds.collection_contains("people").await);
	assert!(!ds.collection_contains("nowhere").await);
	let names: Vec<String> =
		ds.collection_list().await.unwrap().into_iter().map(|(n, _)| n).collect();
	assert_eq!(names, vec!["people", "places"]);
	// The same key addresses independent entries per collection
	ds.blobs(people).set(Context::new(), &[1], &[b"alice".to_vec()]).await.unwrap();
	ds.blobs(places).set(Context::new(), &[1], &[b"yerevan".to_vec()]).await.unwrap();
	let found = ds.blobs(people).get(Context::new(), &[1]).await.unwrap();
	assert_eq!(found[0].as_deref(), Some(&b"alice"[..]));
	// Dropping a collection removes its entries as a unit
	ds.collection_drop("people").await.unwrap();
	assert!(!ds.collection_contains("people").await);
	let found = ds.blobs(places).get(Context::new(), &[1]).await.unwrap();
	assert_eq!(found[0].as_deref(), Some(&b"yerevan"[..]));
	assert!(matches!(ds.collection_drop("people").await, Err(Error::CollectionNotFound(_))));
}

#[tokio::test]
async fn snapshots_freeze_a_version() {
	let ds = Datastore::new("memory").await.unwrap();
	let blobs = ds.blobs(CollectionId::MAIN);
	blobs.set(Context::new(), &[1], &[b"one".to_vec()]).await.unwrap();
	ds.snapshot_create("before").await.unwrap();
	blobs.set(Context::new(), &[1], &[b"two".to_vec()]).await.unwrap();
	// Reads pinned to the snapshot see the frozen value
	let found = blobs.get(Context::new().with_snapshot("before"), &[1]).await.unwrap();
	assert_eq!(found[0].as_deref(), Some(&b"one"[..]));
	let found = blobs.get(Context::new(), &[1]).await.unwrap();
	assert_eq!(found[0].as_deref(), Some(&b"two"[..]));
	// Snapshots are referable and droppable
	assert_eq!(ds.snapshot_list().await.unwrap(), vec!["before"]);
	ds.snapshot_drop("before").await.unwrap();
	let result = blobs.get(Context::new().with_snapshot("before"), &[1]).await;
	assert!(matches!(result, Err(Error::SnapshotNotFound(_))));
}

#[tokio::test]
async fn invalid_option_combinations_are_rejected_before_any_work() {
	let ds = Datastore::new("memory").await.unwrap();
	let blobs = ds.blobs(CollectionId::MAIN);
	// WRITE_FLUSH makes no sense on a read
	let result = blobs.get(Context::new().with_options(Options::WRITE_FLUSH), &[1]).await;
	assert!(matches!(result, Err(Error::InvalidArgument(_))));
	// TRANSACTION_DONT_WATCH requires a transaction
	let result = blobs
		.get(Context::new().with_options(Options::TRANSACTION_DONT_WATCH), &[1])
		.await;
	assert!(matches!(result, Err(Error::InvalidArgument(_))));
	// Inside a transaction the flag is legal
	let mut tx = ds.transaction(TransactionType::Write).await.unwrap();
	let ctx = Context::new()
		.with_transaction(&mut tx)
		.with_options(Options::TRANSACTION_DONT_WATCH);
	assert!(blobs.get(ctx, &[1]).await.is_ok());
	tx.cancel().await.unwrap();
}

#[tokio::test]
async fn unwatched_reads_do_not_conflict() {
	let ds = Datastore::new("memory").await.unwrap();
	let blobs = ds.blobs(CollectionId::MAIN);
	blobs.set(Context::new(), &[1], &[b"base".to_vec()]).await.unwrap();
	// A transaction reads the key without watching it
	let mut tx = ds.transaction(TransactionType::Write).await.unwrap();
	let ctx = Context::new()
		.with_transaction(&mut tx)
		.with_options(Options::TRANSACTION_DONT_WATCH);
	blobs.get(ctx, &[1]).await.unwrap();
	blobs.set(Context::new().with_transaction(&mut tx), &[2], &[b"mine".to_vec()]).await.unwrap();
	// A concurrent writer updates the read key in the meantime
	blobs.set(Context::new(), &[1], &[b"theirs".to_vec()]).await.unwrap();
	// The unwatching transaction still commits
	tx.commit().await.unwrap();
	let found = blobs.get(Context::new(), &[1, 2]).await.unwrap();
	assert_eq!(found[0].as_deref(), Some(&b"theirs"[..]));
	assert_eq!(found[1].as_deref(), Some(&b"mine"[..]));
}

#[tokio::test]
async fn watched_reads_conflict_on_commit() {
	let ds = Datastore::new("memory").await.unwrap();
	let blobs = ds.blobs(CollectionId::MAIN);
	blobs.set(Context::new(), &[1], &[b"base".to_vec()]).await.unwrap();
	let mut tx = ds.transaction(TransactionType::Write).await.unwrap();
	blobs.get(Context::new().with_transaction(&mut tx), &[1]).await.unwrap();
	blobs.set(Context::new().with_transaction(&mut tx), &[2], &[b"mine".to_vec()]).await.unwrap();
	blobs.set(Context::new(), &[1], &[b"theirs".to_vec()]).await.unwrap();
	assert!(matches!(tx.commit().await, Err(Error::TxRetryable)));
}
