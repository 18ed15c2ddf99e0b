//! RFC 7396 JSON Merge Patch.

use serde_json::Map;
use serde_json::Value;

/// Merge a patch into a target value.
///
/// Object patches merge member-wise, with `null` members removing the
/// target field. Any other patch replaces the target outright.
pub(crate) fn merge(target: &mut Value, patch: &Value) {
	match patch {
		Value::Object(changes) => {
			if !target.is_object() {
				*target = Value::Object(Map::new());
			}
			if let Value::Object(map) = target {
				for (field, change) in changes {
					match change {
						Value::Null => {
							map.remove(field);
						}
						change => {
							merge(map.entry(field.clone()).or_insert(Value::Null), change)
						}
					}
				}
			}
		}
		patch => *target = patch.clone(),
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use serde_json::json;

	#[test]
	fn merge_empty() {
		let mut doc = json!({ "person": "Carl", "age": 24 });
		merge(&mut doc, &json!({}));
		assert_eq!(doc, json!({ "person": "Carl", "age": 24 }));
	}

	#[test]
	fn merge_basic() {
		let mut doc = json!({ "person": "Carl", "age": 24 });
		merge(&mut doc, &json!({ "person": "Bob", "age": 28 }));
		assert_eq!(doc, json!({ "person": "Bob", "age": 28 }));
	}

	#[test]
	fn merge_null_removes() {
		let mut doc = json!({ "person": "Carl", "age": 24 });
		merge(&mut doc, &json!({ "age": null, "city": "Yerevan" }));
		assert_eq!(doc, json!({ "person": "Carl", "city": "Yerevan" }));
	}

	#[test]
	fn merge_recurses_into_objects() {
		let mut doc = json!({ "name": { "first": "Ada", "last": "Lovelace" } });
		merge(&mut doc, &json!({ "name": { "last": null, "title": "Countess" } }));
		assert_eq!(doc, json!({ "name": { "first": "Ada", "title": "Countess" } }));
	}

	#[test]
	fn merge_replaces_arrays_and_scalars() {
		let mut doc = json!({ "tags": ["a", "b"], "age": 24 });
		merge(&mut doc, &json!({ "tags": ["c"], "age": { "years": 24 } }));
		assert_eq!(doc, json!({ "tags": ["c"], "age": { "years": 24 } }));
	}
}
