//! Scalar extraction and type coercion at the columnar boundary.
//!
//! A cell declares its target type through the table header; the source
//! JSON value is coerced when the types disagree. A lossy or cross-type
//! coercion sets the `converted` flag; an impossible one yields no cell at
//! all, which the caller records as a cleared validity bit. Coercion
//! failures are soft: they are never an error.

use super::{Scalar, TypeTag};
use serde_json::Value;

/// One extracted cell and whether it was coerced to reach its type.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
	pub scalar: Scalar,
	pub converted: bool,
}

impl Cell {
	fn exact(scalar: Scalar) -> Option<Cell> {
		Some(Cell {
			scalar,
			converted: false,
		})
	}

	fn converted(scalar: Scalar) -> Option<Cell> {
		Some(Cell {
			scalar,
			converted: true,
		})
	}
}

/// Coerce a JSON value into a typed scalar cell.
pub(crate) fn coerce(value: &Value, tag: TypeTag) -> Option<Cell> {
	// A null source is an invalid cell, never an error
	if value.is_null() {
		return None;
	}
	match tag {
		TypeTag::Null => None,
		TypeTag::Bool => coerce_bool(value),
		TypeTag::I8 => coerce_int(value, i8::MIN as i128, i8::MAX as i128, |v| {
			Scalar::I8(v as i8)
		}),
		TypeTag::I16 => coerce_int(value, i16::MIN as i128, i16::MAX as i128, |v| {
			Scalar::I16(v as i16)
		}),
		TypeTag::I32 => coerce_int(value, i32::MIN as i128, i32::MAX as i128, |v| {
			Scalar::I32(v as i32)
		}),
		TypeTag::I64 => coerce_int(value, i64::MIN as i128, i64::MAX as i128, |v| {
			Scalar::I64(v as i64)
		}),
		TypeTag::U8 => coerce_int(value, 0, u8::MAX as i128, |v| Scalar::U8(v as u8)),
		TypeTag::U16 => coerce_int(value, 0, u16::MAX as i128, |v| Scalar::U16(v as u16)),
		TypeTag::U32 => coerce_int(value, 0, u32::MAX as i128, |v| Scalar::U32(v as u32)),
		TypeTag::U64 => coerce_int(value, 0, u64::MAX as i128, |v| Scalar::U64(v as u64)),
		TypeTag::F16 => coerce_float(value, |v, lossy| {
			let out = half::f16::from_f64(v);
			(Scalar::F16(out), lossy || out.to_f64() != v)
		}),
		TypeTag::F32 => coerce_float(value, |v, lossy| {
			let out = v as f32;
			(Scalar::F32(out), lossy || out as f64 != v)
		}),
		TypeTag::F64 => coerce_float(value, |v, lossy| (Scalar::F64(v), lossy)),
		TypeTag::Str => coerce_str(value),
		TypeTag::Bin => match value.as_str() {
			Some(s) => Cell::exact(Scalar::Bin(s.as_bytes().to_vec())),
			None => None,
		},
		TypeTag::Uuid => match value.as_str() {
			Some(s) => uuid::Uuid::parse_str(s).ok().and_then(|u| Cell::exact(Scalar::Uuid(u))),
			None => None,
		},
	}
}

fn coerce_bool(value: &Value) -> Option<Cell> {
	if let Some(b) = value.as_bool() {
		return Cell::exact(Scalar::Bool(b));
	}
	if let Some(i) = value.as_i64() {
		return Cell::converted(Scalar::Bool(i != 0));
	}
	if let Some(u) = value.as_u64() {
		return Cell::converted(Scalar::Bool(u != 0));
	}
	if let Some(f) = value.as_f64() {
		return Cell::converted(Scalar::Bool(f != 0.0));
	}
	match value.as_str() {
		Some("true") => Cell::converted(Scalar::Bool(true)),
		Some("false") => Cell::converted(Scalar::Bool(false)),
		_ => None,
	}
}

/// Pull an integer out of a JSON value.
///
/// Integer sources are exact when in range; floats truncate; strings parse
/// as integers or, failing that, as truncating floats; booleans become
/// zero and one. Out-of-range magnitudes are invalid, not clamped.
fn coerce_int(
	value: &Value,
	min: i128,
	max: i128,
	wrap: impl Fn(i128) -> Scalar,
) -> Option<Cell> {
	let (wide, converted) = extract_int(value)?;
	if wide < min || wide > max {
		return None;
	}
	match converted {
		false => Cell::exact(wrap(wide)),
		true => Cell::converted(wrap(wide)),
	}
}

fn extract_int(value: &Value) -> Option<(i128, bool)> {
	if let Some(i) = value.as_i64() {
		return Some((i as i128, false));
	}
	if let Some(u) = value.as_u64() {
		return Some((u as i128, false));
	}
	if let Some(f) = value.as_f64() {
		if !f.is_finite() {
			return None;
		}
		return Some((f.trunc() as i128, true));
	}
	if let Some(s) = value.as_str() {
		if let Ok(i) = s.parse::<i128>() {
			return Some((i, true));
		}
		if let Ok(f) = s.parse::<f64>() {
			if f.is_finite() {
				return Some((f.trunc() as i128, true));
			}
		}
		return None;
	}
	if let Some(b) = value.as_bool() {
		return Some((b as i128, true));
	}
	None
}

/// Pull a float out of a JSON value. The closure narrows to the target
/// width and reports whether the narrowing lost exactness.
fn coerce_float(value: &Value, narrow: impl Fn(f64, bool) -> (Scalar, bool)) -> Option<Cell> {
	// Float sources are native; everything else is a conversion
	let (wide, lossy) = if let Some(f) = value.as_f64() {
		(f, !value.is_f64() && f as i64 as f64 != f)
	} else if let Some(s) = value.as_str() {
		(s.parse::<f64>().ok()?, true)
	} else if let Some(b) = value.as_bool() {
		(b as u8 as f64, true)
	} else {
		return None;
	};
	let (scalar, converted) = narrow(wide, lossy);
	Some(Cell {
		scalar,
		converted,
	})
}

fn coerce_str(value: &Value) -> Option<Cell> {
	match value {
		Value::String(s) => Cell::exact(Scalar::Str(s.clone())),
		Value::Number(n) => Cell::converted(Scalar::Str(n.to_string())),
		Value::Bool(b) => Cell::converted(Scalar::Str(b.to_string())),
		_ => None,
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use serde_json::json;

	#[test]
	fn integers_stay_exact_in_range() {
		let cell = coerce(&json!(27), TypeTag::I32).unwrap();
		assert_eq!(cell.scalar, Scalar::I32(27));
		assert!(!cell.converted);
		// Out of range is invalid, not clamped
		assert!(coerce(&json!(300), TypeTag::I8).is_none());
		assert!(coerce(&json!(-1), TypeTag::U64).is_none());
	}

	#[test]
	fn strings_parse_into_integers() {
		let cell = coerce(&json!("27"), TypeTag::I32).unwrap();
		assert_eq!(cell.scalar, Scalar::I32(27));
		assert!(cell.converted);
		assert!(coerce(&json!("Alice"), TypeTag::I32).is_none());
	}

	#[test]
	fn floats_truncate_into_integers() {
		let cell = coerce(&json!(27.9), TypeTag::I64).unwrap();
		assert_eq!(cell.scalar, Scalar::I64(27));
		assert!(cell.converted);
	}

	#[test]
	fn numbers_render_as_strings() {
		let cell = coerce(&json!(27), TypeTag::Str).unwrap();
		assert_eq!(cell.scalar, Scalar::Str("27".to_string()));
		assert!(cell.converted);
		let cell = coerce(&json!("x"), TypeTag::Str).unwrap();
		assert!(!cell.converted);
	}

	#[test]
	fn non_numeric_strings_never_reach_floats() {
		assert!(coerce(&json!("Alice"), TypeTag::F32).is_none());
		let cell = coerce(&json!("1.5"), TypeTag::F32).unwrap();
		assert_eq!(cell.scalar, Scalar::F32(1.5));
		assert!(cell.converted);
	}

	#[test]
	fn floats_keep_their_width() {
		let cell = coerce(&json!(1.5), TypeTag::F64).unwrap();
		assert_eq!(cell.scalar, Scalar::F64(1.5));
		assert!(!cell.converted);
		// Exactly representable narrowing stays unconverted
		let cell = coerce(&json!(1.5), TypeTag::F32).unwrap();
		assert!(!cell.converted);
	}

	#[test]
	fn null_and_containers_are_invalid() {
		assert!(coerce(&json!(null), TypeTag::I32).is_none());
		assert!(coerce(&json!({ "a": 1 }), TypeTag::Str).is_none());
		assert!(coerce(&json!([1]), TypeTag::I64).is_none());
	}

	#[test]
	fn uuid_parses_from_text() {
		let cell =
			coerce(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8"), TypeTag::Uuid).unwrap();
		assert!(matches!(cell.scalar, Scalar::Uuid(_)));
		assert!(!cell.converted);
		assert!(coerce(&json!("not-a-uuid"), TypeTag::Uuid).is_none());
	}
}
