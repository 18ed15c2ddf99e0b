//! The columnar exchange bridge.
//!
//! A gathered [`Table`] becomes an Arrow schema/array pair without copying
//! the contents tape: the tape is wrapped in one shared buffer and every
//! variable-length column references its own slice of it through absolute
//! offsets. The C Data Interface export hands both structures to foreign
//! consumers with the standard release-callback ownership rules.

use super::{bit_set, bitmap_len, Column, Table, TypeTag};
use crate::err::Error;
use arrow::array::{make_array, Array, ArrayData, ArrayRef, StructArray};
use arrow::buffer::Buffer;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ffi::{from_ffi, to_ffi, FFI_ArrowArray, FFI_ArrowSchema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;

impl TypeTag {
	/// The Arrow type this tag maps onto.
	pub fn data_type(&self) -> DataType {
		match self {
			TypeTag::Null => DataType::Null,
			TypeTag::Bool => DataType::Boolean,
			TypeTag::I8 => DataType::Int8,
			TypeTag::I16 => DataType::Int16,
			TypeTag::I32 => DataType::Int32,
			TypeTag::I64 => DataType::Int64,
			TypeTag::U8 => DataType::UInt8,
			TypeTag::U16 => DataType::UInt16,
			TypeTag::U32 => DataType::UInt32,
			TypeTag::U64 => DataType::UInt64,
			TypeTag::F16 => DataType::Float16,
			TypeTag::F32 => DataType::Float32,
			TypeTag::F64 => DataType::Float64,
			TypeTag::Bin => DataType::Binary,
			TypeTag::Str => DataType::Utf8,
			TypeTag::Uuid => DataType::FixedSizeBinary(16),
		}
	}
}

/// The Arrow schema describing a gathered table. Every field is nullable.
pub fn schema(table: &Table) -> Schema {
	let fields: Vec<Field> = table
		.columns()
		.iter()
		.map(|col| Field::new(col.name(), col.tag().data_type(), true))
		.collect();
	Schema::new(fields)
}

/// Render a gathered table as one Arrow record batch.
///
/// The contents tape is wrapped once and shared by every variable-length
/// column; fixed-width cells are copied into fresh aligned buffers.
pub fn to_record_batch(table: Table) -> Result<RecordBatch, Error> {
	let schema = Arc::new(schema(&table));
	let (rows, tape, columns) = table.into_parts();
	let tape = Buffer::from_vec(tape);
	let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
	for column in columns {
		arrays.push(to_array(rows, &tape, column)?);
	}
	let options = RecordBatchOptions::new().with_row_count(Some(rows));
	Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

/// Build one Arrow array over a column's buffers.
///
/// Scalar layouts carry a validity bitmap and one data buffer; variable
/// layouts add the offsets buffer in between; `null` carries nothing.
fn to_array(rows: usize, tape: &Buffer, column: Column) -> Result<ArrayRef, Error> {
	let data_type = column.tag.data_type();
	if matches!(column.tag, TypeTag::Null) {
		return Ok(make_array(ArrayData::new_null(&data_type, rows)));
	}
	let validity = Buffer::from_vec(column.validity);
	let buffers = match column.tag {
		TypeTag::Bin | TypeTag::Str => {
			let offsets = column.offsets.unwrap_or_else(|| vec![0; rows + 1]);
			vec![Buffer::from_vec(offsets), tape.clone()]
		}
		TypeTag::Bool => {
			// The table stores one byte per row; Arrow wants packed bits
			let mut bits = vec![0u8; bitmap_len(rows)];
			for (row, cell) in column.fixed.iter().enumerate() {
				if *cell != 0 {
					bit_set(&mut bits, row);
				}
			}
			vec![Buffer::from_vec(bits)]
		}
		_ => vec![Buffer::from_slice_ref(&column.fixed)],
	};
	let data = ArrayData::try_new(data_type, rows, Some(validity), 0, buffers, vec![])?;
	Ok(make_array(data))
}

/// Export a gathered table through the Arrow C Data Interface.
///
/// The batch is wrapped in one struct array whose children are the table's
/// columns. Releasing the returned structures frees the child arrays and
/// the buffer-pointer arrays; the shared buffers themselves live until the
/// last reference drops.
pub fn export(table: Table) -> Result<(FFI_ArrowArray, FFI_ArrowSchema), Error> {
	let batch = to_record_batch(table)?;
	let data = StructArray::from(batch).into_data();
	Ok(to_ffi(&data)?)
}

/// Import a record batch through the Arrow C Data Interface.
pub fn import(array: FFI_ArrowArray, schema: &FFI_ArrowSchema) -> Result<RecordBatch, Error> {
	let data = unsafe { from_ffi(array, schema)? };
	Ok(RecordBatch::from(StructArray::from(data)))
}

#[cfg(test)]
mod tests {

	use super::*;
	use crate::tbl::{gather, Scalar, TableHeader};
	use arrow::array::{Array, Int32Array, StringArray};
	use bumpalo::Bump;
	use serde_json::json;

	fn sample() -> Table {
		let bump = Bump::new();
		let docs = vec![
			Some(json!({ "person": "Alice", "age": 27 })),
			Some(json!({ "person": "Bob", "age": "27" })),
			Some(json!({ "age": 24 })),
		];
		let header = TableHeader::new()
			.columns([("person", TypeTag::Str), ("age", TypeTag::I32)]);
		gather(&bump, &docs, &header).unwrap()
	}

	#[test]
	fn schema_maps_every_tag() {
		let table = sample();
		let schema = schema(&table);
		assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
		assert_eq!(schema.field(1).data_type(), &DataType::Int32);
		assert!(schema.field(0).is_nullable());
	}

	#[test]
	fn record_batch_preserves_cells_and_validity() {
		let batch = to_record_batch(sample()).unwrap();
		assert_eq!(batch.num_rows(), 3);
		let people = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
		assert_eq!(people.value(0), "Alice");
		assert_eq!(people.value(1), "Bob");
		assert!(people.is_null(2));
		let ages = batch.column(1).as_any().downcast_ref::<Int32Array>().unwrap();
		assert_eq!(ages.value(0), 27);
		assert_eq!(ages.value(1), 27);
		assert_eq!(ages.value(2), 24);
	}

	#[test]
	fn ffi_roundtrip() {
		let (array, schema) = export(sample()).unwrap();
		let batch = import(array, &schema).unwrap();
		assert_eq!(batch.num_rows(), 3);
		let people = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
		assert_eq!(people.value(1), "Bob");
		assert!(people.is_null(2));
	}

	#[test]
	fn every_scalar_width_exports() {
		let bump = Bump::new();
		let docs = vec![Some(json!({
			"b": true, "i": -5, "u": 5, "f": 1.5,
			"s": "text", "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
		}))];
		let header = TableHeader::new().columns([
			("b", TypeTag::Bool),
			("i", TypeTag::I8),
			("i", TypeTag::I16),
			("i", TypeTag::I64),
			("u", TypeTag::U8),
			("u", TypeTag::U16),
			("u", TypeTag::U32),
			("u", TypeTag::U64),
			("f", TypeTag::F16),
			("f", TypeTag::F32),
			("f", TypeTag::F64),
			("s", TypeTag::Bin),
			("id", TypeTag::Uuid),
			("missing", TypeTag::Null),
		]);
		let table = gather(&bump, &docs, &header).unwrap();
		assert_eq!(table.value(2, 0), Some(Scalar::I16(-5)));
		let batch = to_record_batch(table).unwrap();
		assert_eq!(batch.num_columns(), 14);
		assert_eq!(batch.column(13).data_type(), &DataType::Null);
	}
}
