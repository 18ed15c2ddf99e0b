//! Dataset ingress and egress.
//!
//! Streams Parquet, CSV or NDJSON files into graph or document
//! collections in byte-budgeted batches, and writes collections back out.
//! The format is chosen by file extension; graph files carry three integer
//! fields, document files carry arbitrary objects keyed by an id field.

mod docs;
mod graph;

use crate::cnf;
use crate::err::Error;
use crate::kvs::{CollectionId, Datastore};
use crate::tbl::TableHeader;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A dataset file format, detected from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
	Parquet,
	Csv,
	Ndjson,
}

impl Format {
	/// Detect the format of a path from its extension.
	pub fn detect(path: &Path) -> Result<Format, Error> {
		match path.extension().and_then(|e| e.to_str()) {
			Some("parquet") => Ok(Format::Parquet),
			Some("csv") => Ok(Format::Csv),
			Some("ndjson") => Ok(Format::Ndjson),
			_ => Err(Error::InvalidArgument(format!(
				"unsupported dataset extension in `{}`",
				path.display()
			))),
		}
	}

	/// The extension this format writes.
	pub fn extension(&self) -> &'static str {
		match self {
			Format::Parquet => ".parquet",
			Format::Csv => ".csv",
			Format::Ndjson => ".ndjson",
		}
	}
}

/// Validate a caller-supplied field name.
pub(crate) fn validate_field(name: &str) -> Result<(), Error> {
	let mut chars = name.chars();
	let legal = match chars.next() {
		Some(first) => {
			(first.is_ascii_alphabetic() || first == '_')
				&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
		}
		None => false,
	};
	match legal {
		true => Ok(()),
		false => Err(Error::InvalidArgument(format!("illegal field name `{name}`"))),
	}
}

/// The timestamp counter behind generated output file names.
static FILE_STAMP: Lazy<Mutex<u64>> = Lazy::new(|| Mutex::new(0));

/// Choose a fresh output path inside a directory.
pub(crate) fn next_output_path(directory: &Path, format: Format) -> PathBuf {
	let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
	let mut last = FILE_STAMP.lock().unwrap();
	*last = now.max(*last + 1);
	directory.join(format!("{}{}", *last, format.extension()))
}

/// The configuration of one graph import.
#[derive(Clone, Debug)]
pub struct GraphImport {
	pub(crate) path: PathBuf,
	pub(crate) collection: CollectionId,
	pub(crate) source_field: String,
	pub(crate) target_field: String,
	pub(crate) edge_field: Option<String>,
	pub(crate) max_batch_size: usize,
}

impl GraphImport {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		GraphImport {
			path: path.into(),
			collection: CollectionId::MAIN,
			source_field: "source".to_string(),
			target_field: "target".to_string(),
			edge_field: Some("edge".to_string()),
			max_batch_size: *cnf::DATASET_BATCH_BYTES,
		}
	}

	pub fn collection(mut self, collection: CollectionId) -> Self {
		self.collection = collection;
		self
	}

	/// The three field names carrying the edge triple. Pass `None` for the
	/// edge field to create every edge with the default id.
	pub fn fields(
		mut self,
		source: impl Into<String>,
		target: impl Into<String>,
		edge: Option<String>,
	) -> Self {
		self.source_field = source.into();
		self.target_field = target.into();
		self.edge_field = edge;
		self
	}

	/// The byte budget of one upsert batch.
	pub fn max_batch_size(mut self, bytes: usize) -> Self {
		self.max_batch_size = bytes.max(1);
		self
	}
}

/// The configuration of one graph export.
#[derive(Clone, Debug)]
pub struct GraphExport {
	pub(crate) directory: PathBuf,
	pub(crate) format: Format,
	pub(crate) collection: CollectionId,
	pub(crate) source_field: String,
	pub(crate) target_field: String,
	pub(crate) edge_field: Option<String>,
	pub(crate) max_batch_size: usize,
}

impl GraphExport {
	pub fn new(directory: impl Into<PathBuf>, format: Format) -> Self {
		GraphExport {
			directory: directory.into(),
			format,
			collection: CollectionId::MAIN,
			source_field: "source".to_string(),
			target_field: "target".to_string(),
			edge_field: Some("edge".to_string()),
			max_batch_size: *cnf::DATASET_BATCH_BYTES,
		}
	}

	pub fn collection(mut self, collection: CollectionId) -> Self {
		self.collection = collection;
		self
	}

	pub fn fields(
		mut self,
		source: impl Into<String>,
		target: impl Into<String>,
		edge: Option<String>,
	) -> Self {
		self.source_field = source.into();
		self.target_field = target.into();
		self.edge_field = edge;
		self
	}

	pub fn max_batch_size(mut self, bytes: usize) -> Self {
		self.max_batch_size = bytes.max(1);
		self
	}
}

/// The configuration of one document import.
#[derive(Clone, Debug)]
pub struct DocsImport {
	pub(crate) path: PathBuf,
	pub(crate) collection: CollectionId,
	pub(crate) id_field: String,
	pub(crate) fields: Option<Vec<String>>,
	pub(crate) max_batch_size: usize,
}

impl DocsImport {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		DocsImport {
			path: path.into(),
			collection: CollectionId::MAIN,
			id_field: "_id".to_string(),
			fields: None,
			max_batch_size: *cnf::DATASET_BATCH_BYTES,
		}
	}

	pub fn collection(mut self, collection: CollectionId) -> Self {
		self.collection = collection;
		self
	}

	/// The field holding each document's integer key.
	pub fn id_field(mut self, name: impl Into<String>) -> Self {
		self.id_field = name.into();
		self
	}

	/// Keep only the named top-level fields of each document.
	pub fn fields(mut self, fields: impl IntoIterator<Item = String>) -> Self {
		self.fields = Some(fields.into_iter().collect());
		self
	}

	pub fn max_batch_size(mut self, bytes: usize) -> Self {
		self.max_batch_size = bytes.max(1);
		self
	}
}

/// The configuration of one document export.
#[derive(Clone, Debug)]
pub struct DocsExport {
	pub(crate) directory: PathBuf,
	pub(crate) format: Format,
	pub(crate) collection: CollectionId,
	pub(crate) fields: Option<TableHeader>,
	pub(crate) max_batch_size: usize,
}

impl DocsExport {
	pub fn new(directory: impl Into<PathBuf>, format: Format) -> Self {
		DocsExport {
			directory: directory.into(),
			format,
			collection: CollectionId::MAIN,
			fields: None,
			max_batch_size: *cnf::DATASET_BATCH_BYTES,
		}
	}

	pub fn collection(mut self, collection: CollectionId) -> Self {
		self.collection = collection;
		self
	}

	/// Project the documents through a typed header instead of writing
	/// them verbatim. Required for the rectangular formats.
	pub fn fields(mut self, header: TableHeader) -> Self {
		self.fields = Some(header);
		self
	}

	pub fn max_batch_size(mut self, bytes: usize) -> Self {
		self.max_batch_size = bytes.max(1);
		self
	}
}

/// Stream a dataset file into a graph collection.
/// Returns the number of ingested edges.
pub async fn import_graph(ds: &Datastore, config: GraphImport) -> Result<usize, Error> {
	graph::import(ds, &config).await
}

/// Export a graph collection into a fresh file inside a directory.
/// Returns the chosen output path.
pub async fn export_graph(ds: &Datastore, config: GraphExport) -> Result<PathBuf, Error> {
	graph::export(ds, &config).await
}

/// Stream a dataset file into a document collection.
/// Returns the number of ingested documents.
pub async fn import_docs(ds: &Datastore, config: DocsImport) -> Result<usize, Error> {
	docs::import(ds, &config).await
}

/// Export a document collection into a fresh file inside a directory.
/// Returns the chosen output path.
pub async fn export_docs(ds: &Datastore, config: DocsExport) -> Result<PathBuf, Error> {
	docs::export(ds, &config).await
}
