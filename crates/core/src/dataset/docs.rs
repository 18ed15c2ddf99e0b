//! Document dataset streaming.

use super::{next_output_path, validate_field, DocsExport, DocsImport, Format};
use crate::cnf;
use crate::codec::{Codec, JsonCodec};
use crate::ctx::Context;
use crate::err::Error;
use crate::key;
use crate::kvs::{Datastore, Scanner, TransactionType};
use crate::tbl;
use arrow::datatypes::{Field, Schema};
use bumpalo::Bump;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

const TARGET: &str = "polystore::core::dataset::docs";

/// One accumulating batch of parsed documents.
struct Batch {
	keys: Vec<i64>,
	docs: Vec<Value>,
	bytes: usize,
	budget: usize,
	total: usize,
}

impl Batch {
	fn new(budget: usize) -> Self {
		Batch {
			keys: Vec::new(),
			docs: Vec::new(),
			bytes: 0,
			budget,
			total: 0,
		}
	}

	/// Project, key and buffer one parsed row.
	fn push(&mut self, mut row: Value, config: &DocsImport) -> Result<(), Error> {
		if !row.is_object() {
			return Err(Error::InvalidArgument(
				"a document row must be a JSON object".to_string(),
			));
		}
		let key = match row.get(&config.id_field).and_then(Value::as_i64) {
			Some(key) => key,
			None => {
				return Err(Error::InvalidArgument(format!(
					"the id field `{}` must resolve to an integer",
					config.id_field
				)));
			}
		};
		if let (Some(fields), Some(map)) = (&config.fields, row.as_object_mut()) {
			map.retain(|field, _| field == &config.id_field || fields.contains(field));
		}
		self.bytes += row.to_string().len();
		self.keys.push(key);
		self.docs.push(row);
		Ok(())
	}

	fn over_budget(&self) -> bool {
		self.bytes >= self.budget
	}

	/// Assign the buffered documents and clear the buffers.
	async fn flush(&mut self, ds: &Datastore, config: &DocsImport) -> Result<(), Error> {
		if self.keys.is_empty() {
			return Ok(());
		}
		let docs = ds.docs(config.collection);
		docs.assign(Context::new(), &self.keys, &self.docs).await?;
		self.total += self.keys.len();
		trace!(target: TARGET, "flushed {} documents", self.keys.len());
		self.keys.clear();
		self.docs.clear();
		self.bytes = 0;
		Ok(())
	}
}

/// Infer a JSON value from one CSV cell.
fn infer_cell(cell: &str) -> Option<Value> {
	if cell.is_empty() {
		return None;
	}
	if let Ok(i) = cell.parse::<i64>() {
		return Some(Value::from(i));
	}
	if let Ok(f) = cell.parse::<f64>() {
		return Some(Value::from(f));
	}
	match cell {
		"true" => Some(Value::Bool(true)),
		"false" => Some(Value::Bool(false)),
		_ => Some(Value::String(cell.to_string())),
	}
}

pub(super) async fn import(ds: &Datastore, config: &DocsImport) -> Result<usize, Error> {
	validate_field(&config.id_field)?;
	let format = Format::detect(&config.path)?;
	let mut batch = Batch::new(config.max_batch_size);
	match format {
		Format::Ndjson => {
			let file = BufReader::new(File::open(&config.path)?);
			for line in file.lines() {
				let line = line?;
				if line.trim().is_empty() {
					continue;
				}
				batch.push(serde_json::from_str(&line)?, config)?;
				if batch.over_budget() {
					batch.flush(ds, config).await?;
				}
			}
		}
		Format::Csv => {
			let mut reader = csv::Reader::from_path(&config.path)?;
			let headers = reader.headers()?.clone();
			for record in reader.records() {
				let record = record?;
				let mut row = Map::new();
				for (field, cell) in headers.iter().zip(record.iter()) {
					if let Some(value) = infer_cell(cell) {
						row.insert(field.to_string(), value);
					}
				}
				batch.push(Value::Object(row), config)?;
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
				// Render the batch as JSON lines and parse the rows back,
				// so every Arrow type maps the way the JSON writer defines
				let mut writer = arrow::json::LineDelimitedWriter::new(Vec::new());
				writer.write(&rows)?;
				writer.finish()?;
				for line in writer.into_inner().split(|b| *b == b'\n') {
					if line.is_empty() {
						continue;
					}
					batch.push(serde_json::from_slice(line)?, config)?;
					if batch.over_budget() {
						batch.flush(ds, config).await?;
					}
				}
			}
		}
	}
	batch.flush(ds, config).await?;
	info!(target: TARGET, "imported {} documents from {}", batch.total, config.path.display());
	Ok(batch.total)
}

pub(super) async fn export(ds: &Datastore, config: &DocsExport) -> Result<PathBuf, Error> {
	// The rectangular formats need a typed projection to write rows
	if config.fields.is_none() && config.format != Format::Ndjson {
		return Err(Error::InvalidArgument(
			"exporting to a rectangular format requires a field projection".to_string(),
		));
	}
	let path = next_output_path(&config.directory, config.format);
	let mut tx = ds.transaction(TransactionType::Read).await?;
	let mut scanner =
		Scanner::new(key::collection_range(config.collection), *cnf::SCAN_BATCH_SIZE);
	let res = export_entries(&mut tx, &mut scanner, &path, config).await;
	tx.cancel().await.ok();
	let total = res?;
	info!(target: TARGET, "exported {} documents to {}", total, path.display());
	Ok(path)
}

async fn export_entries(
	tx: &mut crate::kvs::Transactor,
	scanner: &mut Scanner,
	path: &PathBuf,
	config: &DocsExport,
) -> Result<usize, Error> {
	let mut total = 0usize;
	match &config.fields {
		// Verbatim documents go straight out as JSON lines
		None => {
			let mut file = File::create(path)?;
			while let Some((_, value)) = scanner.next(tx).await? {
				file.write_all(&value)?;
				file.write_all(b"\n")?;
				total += 1;
			}
			file.flush()?;
		}
		// Projected documents buffer up into gathered record batches
		Some(header) => {
			let fields: Vec<Field> = header
				.iter()
				.map(|(name, tag)| Field::new(name, tag.data_type(), true))
				.collect();
			let mut writer =
				super::graph::Writer::open(path, config.format, Arc::new(Schema::new(fields)))?;
			let mut buffered: Vec<Option<Value>> = Vec::new();
			let mut bytes = 0usize;
			while let Some((_, value)) = scanner.next(tx).await? {
				bytes += value.len();
				buffered.push(Some(JsonCodec.decode(&value)?));
				if bytes >= config.max_batch_size {
					total += write_gathered(&mut writer, &mut buffered, header)?;
					bytes = 0;
				}
			}
			total += write_gathered(&mut writer, &mut buffered, header)?;
			writer.finish()?;
		}
	}
	Ok(total)
}

/// Gather one buffered batch through the projection and write it out.
fn write_gathered(
	writer: &mut super::graph::Writer,
	buffered: &mut Vec<Option<Value>>,
	header: &crate::tbl::TableHeader,
) -> Result<usize, Error> {
	if buffered.is_empty() {
		return Ok(0);
	}
	let rows = buffered.len();
	let bump = Bump::new();
	let table = tbl::gather(&bump, buffered, header)?;
	writer.write(&tbl::exchange::to_record_batch(table)?)?;
	buffered.clear();
	Ok(rows)
}
