//! # Polystore
//!
//! A multi-modal storage engine. One transactional key-value substrate
//! carries three data models side by side: binary blobs, JSON documents
//! with field-level addressing, and property graphs packed into per-vertex
//! adjacency records. Document collections project into typed columnar
//! tables for zero-copy exchange with Arrow-speaking runtimes.
//!
//! ```rust,no_run
//! use polystore::ctx::Context;
//! use polystore::kvs::{CollectionId, Datastore};
//! use polystore::Error;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//! 	let ds = Datastore::new("memory").await?;
//! 	let graph = ds.graph(CollectionId::MAIN);
//! 	graph.upsert_edges(Context::new(), &[1, 2, 3], &[2, 3, 1], None).await?;
//! 	Ok(())
//! }
//! ```

pub use polystore_core::blob;
pub use polystore_core::cnf;
pub use polystore_core::codec;
pub use polystore_core::ctx;
pub use polystore_core::dataset;
pub use polystore_core::doc;
pub use polystore_core::err;
pub use polystore_core::graph;
pub use polystore_core::key;
pub use polystore_core::kvs;
pub use polystore_core::mem;
pub use polystore_core::options;
pub use polystore_core::tbl;

pub use polystore_core::err::Error;
