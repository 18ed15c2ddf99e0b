use once_cell::sync::Lazy;

/// How many keys a single substrate scan request fetches at once.
pub static SCAN_BATCH_SIZE: Lazy<u32> = lazy_env_parse!("POLYSTORE_SCAN_BATCH_SIZE", u32, 1_000);

/// The byte budget for one dataset ingest or export batch.
pub static DATASET_BATCH_BYTES: Lazy<usize> =
	lazy_env_parse!("POLYSTORE_DATASET_BATCH_BYTES", usize, 1024 * 1024 * 1024);

/// How many rows an Arrow record batch holds when streaming datasets.
pub static DATASET_ROWS_PER_BATCH: Lazy<usize> =
	lazy_env_parse!("POLYSTORE_DATASET_ROWS_PER_BATCH", usize, 8 * 1024);
