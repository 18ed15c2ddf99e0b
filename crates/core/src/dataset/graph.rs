//! Graph dataset streaming.

use super::{next_output_path, validate_field, Format, GraphExport, GraphImport};
use crate::cnf;
use crate::codec::{AdjacencyCodec, Codec};
use crate::ctx::Context;
use crate::err::Error;
use crate::key;
use crate::kvs::{Datastore, Scanner, TransactionType};
use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

const TARGET: &str = "polystore::core::dataset::graph";

/// The packed width of one edge triple, used for the byte budget.
const EDGE_BYTES: usize = 24;

/// One accumulating batch of edge triples.
struct Batch {
	sources: Vec<i64>,
	targets: Vec<i64>,
	edges: Option<Vec<i64>>,
	budget: usize,
	total: usize,
}

impl Batch {
	fn new(with_edges: bool, budget: usize) -> Self {
		Batch {
			sources: Vec::new(),
			targets: Vec::new(),
			edges: with_edges.then(Vec::new),
			budget,
			total: 0,
		}
	}

	fn push(&mut self, source: i64, target: i64, edge: Option<i64>) {
		self.sources.push(source);
		self.targets.push(target);
		if let (Some(edges), Some(edge)) = (self.edges.as_mut(), edge) {
			edges.push(edge);
		}
	}

	fn over_budget(&self) -> bool {
		self.sources.len() * EDGE_BYTES >= self.budget
	}

	/// Upsert the buffered edges and clear the buffers.
	async fn flush(&mut self, ds: &Datastore, config: &GraphImport) -> Result<(), Error> {
		if self.sources.is_empty() {
			return Ok(());
		}
		let graph = ds.graph(config.collection);
		let edges = self.edges.as_deref().map(Into::into);
		graph.upsert_edges(Context::new(), &self.sources, &self.targets, edges).await?;
		self.total += self.sources.len();
		trace!(target: TARGET, "flushed {} edges", self.sources.len());
		self.sources.clear();
		self.targets.clear();
		if let Some(edges) = self.edges.as_mut() {
			edges.clear();
		}
		Ok(())
	}
}

/// Read an integer key out of a parsed row.
fn field_as_key(row: &Value, field: &str) -> Result<i64, Error> {
	let value = row
		.get(field)
		.ok_or_else(|| Error::InvalidArgument(format!("the field `{field}` does not exist")))?;
	match value.as_i64() {
		Some(key) => Ok(key),
		None => value
			.as_str()
			.and_then(|s| s.parse().ok())
			.ok_or_else(|| Error::InvalidArgument(format!("the field `{field}` is not an integer"))),
	}
}

pub(super) async fn import(ds: &Datastore, config: &GraphImport) -> Result<usize, Error> {
	validate_field(&config.source_field)?;
	validate_field(&config.target_field)?;
	if let Some(edge) = &config.edge_field {
		validate_field(edge)?;
	}
	let format = Format::detect(&config.path)?;
	let mut batch = Batch::new(config.edge_field.is_some(), config.max_batch_size);
	match format {
		Format::Ndjson => {
			let file = BufReader::new(File::open(&config.path)?);
			for line in file.lines() {
				let line = line?;
				if line.trim().is_empty() {
					continue;
				}
				let row: Value = serde_json::from_str(&line)?;
				let source = field_as_key(&row, &config.source_field)?;
				let target = field_as_key(&row, &config.target_field)?;
				let edge = match &config.edge_field {
					Some(field) => Some(field_as_key(&row, field)?),
					None => None,
				};
				batch.push(source, target, edge);
				if batch.over_budget() {
					batch.flush(ds, config).await?;
				}
			}
		}
		Format::Csv => {
			let mut reader = csv::Reader::from_path(&config.path)?;
			let headers = reader.headers()?.clone();
			let position = |field: &str| {
				headers.iter().position(|h| h == field).ok_or_else(|| {
					Error::InvalidArgument(format!("the field `{field}` does not exist"))
				})
			};
			let source_at = position(&config.source_field)?;
			let target_at = position(&config.target_field)?;
			let edge_at = match &config.edge_field {
				Some(field) => Some(position(field)?),
				None => None,
			};
			let parse = |cell: &str, field: &str| {
				cell.parse::<i64>().map_err(|_| {
					Error::InvalidArgument(format!("the field `{field}` is not an integer"))
				})
			};
			for record in reader.records() {
				let record = record?;
				let source = parse(&record[source_at], &config.source_field)?;
				let target = parse(&record[target_at], &config.target_field)?;
				let edge = match edge_at {
					Some(at) => Some(parse(&record[at], config.edge_field.as_deref().unwrap_or(""))?),
					None => None,
				};
				batch.push(source, target, edge);
				if batch.over_budget() {
					batch.flush(ds, config).await?;
				}
			}
		}
		Format::Parquet => {
			let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&config.path)?)?
				.with_batch_size(*cnf::DATASET_ROWS_PER_BATCH)
				.build()?;
			for rows in reader {
				let rows = rows?;
				let column = |field: &str| -> Result<&Int64Array, Error> {
					rows.column_by_name(field)
						.ok_or_else(|| {
							Error::InvalidArgument(format!("the field `{field}` does not exist"))
						})?
						.as_any()
						.downcast_ref::<Int64Array>()
						.ok_or_else(|| {
							Error::InvalidArgument(format!("the field `{field}` is not an integer"))
						})
				};
				let sources = column(&config.source_field)?;
				let targets = column(&config.target_field)?;
				let edges = match &config.edge_field {
					Some(field) => Some(column(field)?),
					None => None,
				};
				for row in 0..rows.num_rows() {
					batch.push(sources.value(row), targets.value(row), edges.map(|e| e.value(row)));
					if batch.over_budget() {
						batch.flush(ds, config).await?;
					}
				}
			}
		}
	}
	batch.flush(ds, config).await?;
	info!(target: TARGET, "imported {} edges from {}", batch.total, config.path.display());
	Ok(batch.total)
}

/// One open output file accepting record batches.
pub(super) enum Writer {
	Parquet(ArrowWriter<File>),
	Csv(arrow::csv::Writer<File>),
	Ndjson(arrow::json::LineDelimitedWriter<File>),
}

impl Writer {
	pub(super) fn open(path: &PathBuf, format: Format, schema: Arc<Schema>) -> Result<Writer, Error> {
		let file = File::create(path)?;
		Ok(match format {
			Format::Parquet => Writer::Parquet(ArrowWriter::try_new(file, schema, None)?),
			Format::Csv => Writer::Csv(arrow::csv::WriterBuilder::new().with_header(true).build(file)),
			Format::Ndjson => Writer::Ndjson(arrow::json::LineDelimitedWriter::new(file)),
		})
	}

	pub(super) fn write(&mut self, batch: &RecordBatch) -> Result<(), Error> {
		match self {
			Writer::Parquet(w) => w.write(batch)?,
			Writer::Csv(w) => w.write(batch)?,
			Writer::Ndjson(w) => w.write(batch)?,
		}
		Ok(())
	}

	pub(super) fn finish(self) -> Result<(), Error> {
		match self {
			Writer::Parquet(w) => {
				w.close()?;
			}
			Writer::Csv(_) => (),
			Writer::Ndjson(mut w) => w.finish()?,
		}
		Ok(())
	}
}

pub(super) async fn export(ds: &Datastore, config: &GraphExport) -> Result<PathBuf, Error> {
	validate_field(&config.source_field)?;
	validate_field(&config.target_field)?;
	if let Some(edge) = &config.edge_field {
		validate_field(edge)?;
	}
	// Describe the rectangular edge list
	let mut fields = vec![
		Field::new(&config.source_field, DataType::Int64, false),
		Field::new(&config.target_field, DataType::Int64, false),
	];
	if let Some(edge) = &config.edge_field {
		fields.push(Field::new(edge, DataType::Int64, false));
	}
	let schema = Arc::new(Schema::new(fields));
	let path = next_output_path(&config.directory, config.format);
	let mut writer = Writer::open(&path, config.format, schema.clone())?;
	// Stream the adjacency records and emit each vertex's outgoing half,
	// so every edge is written exactly once
	let mut tx = ds.transaction(TransactionType::Read).await?;
	let mut scanner =
		Scanner::new(key::collection_range(config.collection), *cnf::SCAN_BATCH_SIZE);
	let mut sources = Vec::new();
	let mut targets = Vec::new();
	let mut edges = Vec::new();
	let mut total = 0usize;
	loop {
		let entry = match scanner.next(&mut tx).await {
			Ok(entry) => entry,
			Err(e) => {
				tx.cancel().await.ok();
				return Err(e);
			}
		};
		let Some((bytes, value)) = entry else {
			break;
		};
		let center = key::Record::decode(&bytes)?.key;
		let hood = AdjacencyCodec.decode(&value)?;
		for ship in hood.outgoing {
			sources.push(center);
			targets.push(ship.neighbor);
			edges.push(ship.edge);
		}
		if sources.len() * EDGE_BYTES >= config.max_batch_size {
			total += sources.len();
			write_edges(&mut writer, &schema, &mut sources, &mut targets, &mut edges, config)?;
		}
	}
	tx.cancel().await.ok();
	total += sources.len();
	write_edges(&mut writer, &schema, &mut sources, &mut targets, &mut edges, config)?;
	writer.finish()?;
	info!(target: TARGET, "exported {} edges to {}", total, path.display());
	Ok(path)
}

fn write_edges(
	writer: &mut Writer,
	schema: &Arc<Schema>,
	sources: &mut Vec<i64>,
	targets: &mut Vec<i64>,
	edges: &mut Vec<i64>,
	config: &GraphExport,
) -> Result<(), Error> {
	if sources.is_empty() {
		return Ok(());
	}
	let mut columns: Vec<ArrayRef> = vec![
		Arc::new(Int64Array::from(std::mem::take(sources))),
		Arc::new(Int64Array::from(std::mem::take(targets))),
	];
	if config.edge_field.is_some() {
		columns.push(Arc::new(Int64Array::from(std::mem::take(edges))));
	} else {
		edges.clear();
	}
	let batch = RecordBatch::try_new(schema.clone(), columns)?;
	writer.write(&batch)
}
