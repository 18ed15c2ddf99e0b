//! Table materialisation from a batch of documents.

use super::{bit_set, bitmap_len, Column, Scalar, Table, TableHeader};
use crate::doc::pointer;
use crate::err::Error;
use bumpalo::Bump;
use serde_json::Value;

/// One extracted cell awaiting layout.
enum Slot<'b> {
	/// Missing document, missing path, null source or failed coercion
	Missing,
	/// A fixed-width scalar and its converted flag
	Fixed(Scalar, bool),
	/// Variable-length bytes in arena scratch and their converted flag
	Var(&'b [u8], bool),
}

/// Materialise a typed table in one pass over the documents per column.
///
/// Cells are extracted and coerced into arena scratch first, then each
/// column is laid out: fixed-width cells at `row * size`, variable-length
/// cells appended to the one contents tape shared by the whole call, with
/// each column's slice contiguous and its offsets absolute into the tape.
pub(crate) fn gather(
	bump: &Bump,
	docs: &[Option<Value>],
	header: &TableHeader,
) -> Result<Table, Error> {
	let rows = docs.len();
	// Extract and coerce every cell, measuring the tape as we go
	let mut slots: Vec<Slot> = Vec::with_capacity(rows * header.len());
	let mut tape_bytes = 0usize;
	for (path, tag) in header.iter() {
		let segments = pointer::segments(path);
		for doc in docs {
			let cell = doc
				.as_ref()
				.and_then(|doc| pointer::pick(doc, &segments))
				.and_then(|value| super::coerce(value, *tag));
			slots.push(match cell {
				None => Slot::Missing,
				Some(cell) => match cell.scalar {
					Scalar::Str(s) => {
						let bytes = bump.alloc_slice_copy(s.as_bytes());
						tape_bytes += bytes.len();
						Slot::Var(bytes, cell.converted)
					}
					Scalar::Bin(b) => {
						let bytes = bump.alloc_slice_copy(&b);
						tape_bytes += bytes.len();
						Slot::Var(bytes, cell.converted)
					}
					scalar => Slot::Fixed(scalar, cell.converted),
				},
			});
		}
	}
	if tape_bytes > i32::MAX as usize {
		return Err(Error::InvalidArgument(
			"the gathered contents tape exceeds the 32-bit offset range".to_string(),
		));
	}
	// Lay out each column over the shared tape
	let mut tape = Vec::with_capacity(tape_bytes);
	let mut columns = Vec::with_capacity(header.len());
	for (index, (name, tag)) in header.iter().enumerate() {
		let base = index * rows;
		let mut validity = vec![0u8; bitmap_len(rows)];
		let mut converted = vec![0u8; bitmap_len(rows)];
		if tag.is_variable() {
			let mut offsets = Vec::with_capacity(rows + 1);
			offsets.push(tape.len() as i32);
			for row in 0..rows {
				if let Slot::Var(bytes, was_converted) = &slots[base + row] {
					tape.extend_from_slice(bytes);
					bit_set(&mut validity, row);
					if *was_converted {
						bit_set(&mut converted, row);
					}
				}
				offsets.push(tape.len() as i32);
			}
			columns.push(Column {
				name: name.clone(),
				tag: *tag,
				rows,
				validity,
				converted,
				offsets: Some(offsets),
				fixed: Vec::new(),
			});
		} else {
			let size = tag.fixed_size().unwrap_or(0);
			let mut fixed = vec![0u8; rows * size];
			for row in 0..rows {
				if let Slot::Fixed(scalar, was_converted) = &slots[base + row] {
					write_fixed(scalar, &mut fixed[row * size..(row + 1) * size]);
					bit_set(&mut validity, row);
					if *was_converted {
						bit_set(&mut converted, row);
					}
				}
			}
			columns.push(Column {
				name: name.clone(),
				tag: *tag,
				rows,
				validity,
				converted,
				offsets: None,
				fixed,
			});
		}
	}
	Ok(Table::new(rows, tape, columns))
}

fn write_fixed(scalar: &Scalar, out: &mut [u8]) {
	match scalar {
		Scalar::Bool(v) => out[0] = *v as u8,
		Scalar::I8(v) => out[0] = *v as u8,
		Scalar::U8(v) => out[0] = *v,
		Scalar::I16(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::U16(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::F16(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::I32(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::U32(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::F32(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::I64(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::U64(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::F64(v) => out.copy_from_slice(&v.to_le_bytes()),
		Scalar::Uuid(v) => out.copy_from_slice(v.as_bytes()),
		Scalar::Null | Scalar::Bin(_) | Scalar::Str(_) => (),
	}
}
