//! RFC 6902 JSON Patch.

use super::operation::Operation;
use super::pointer;
use crate::err::Error;
use serde_json::Value;

/// Apply a list of patch operations to a document.
///
/// The operations run against a scratch copy, so a failing operation
/// (a `test` mismatch, a `move`/`copy` with a missing source) leaves the
/// document untouched.
pub(crate) fn patch(doc: &mut Value, ops: &[Operation]) -> Result<(), Error> {
	// Work on a copy so a failed operation changes nothing
	let mut new = doc.clone();
	// Loop over the patch operations and apply them
	for operation in ops {
		match operation {
			// Add a value, inserting into arrays
			Operation::Add {
				path,
				value,
			} => {
				add(&mut new, &pointer::segments(path), value.clone());
			}
			// Remove the value at the path
			Operation::Remove {
				path,
			} => pointer::cut(&mut new, &pointer::segments(path)),
			// Replace the value at the path
			Operation::Replace {
				path,
				value,
			} => pointer::put(&mut new, &pointer::segments(path), value.clone()),
			// Copy a value from one path to another
			Operation::Copy {
				path,
				from,
			} => {
				let value = match pointer::pick(&new, &pointer::segments(from)) {
					Some(value) => value.clone(),
					None => {
						return Err(Error::InvalidPatch(format!(
							"the `copy` source `{from}` does not exist"
						)));
					}
				};
				add(&mut new, &pointer::segments(path), value);
			}
			// Move a value from one path to another
			Operation::Move {
				path,
				from,
			} => {
				let from = pointer::segments(from);
				let value = match pointer::pick(&new, &from) {
					Some(value) => value.clone(),
					None => {
						return Err(Error::InvalidPatch(
							"the `move` source does not exist".to_string(),
						));
					}
				};
				pointer::cut(&mut new, &from);
				add(&mut new, &pointer::segments(path), value);
			}
			// Test whether a value matches
			Operation::Test {
				path,
				value,
			} => {
				let found = pointer::pick(&new, &pointer::segments(path));
				if found != Some(value) {
					return Err(Error::PatchTest {
						expected: value.to_string(),
						got: found.map_or("<missing>".to_string(), Value::to_string),
					});
				}
			}
		}
	}
	// Set the document to the updated document
	*doc = new;
	// Everything ok
	Ok(())
}

/// The `add` semantics: array paths insert, everything else upserts.
fn add(doc: &mut Value, segments: &[String], value: Value) {
	let Some((last, parents)) = segments.split_last() else {
		*doc = value;
		return;
	};
	if let Some(Value::Array(items)) = pointer::pick_mut(doc, parents) {
		if last == "-" {
			items.push(value);
		} else if let Ok(index) = last.parse::<usize>() {
			match index < items.len() {
				true => items.insert(index, value),
				false => items.push(value),
			}
		}
		return;
	}
	pointer::put(doc, segments, value);
}
