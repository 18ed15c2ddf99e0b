//! Field discovery across a document batch.

use crate::doc::pointer;
use serde_json::Value;
use std::collections::BTreeSet;

/// The union of pointer paths to leaf values across a batch of documents.
///
/// The walk is depth-first; array elements are addressed by index and
/// empty containers count as leaves. The result is sorted and deduplicated.
pub(crate) fn gist(docs: &[Option<Value>]) -> Vec<String> {
	let mut paths = BTreeSet::new();
	for doc in docs.iter().flatten() {
		walk(doc, String::new(), &mut paths);
	}
	paths.into_iter().collect()
}

fn walk(value: &Value, prefix: String, paths: &mut BTreeSet<String>) {
	match value {
		Value::Object(map) if !map.is_empty() => {
			for (field, inner) in map {
				walk(inner, format!("{prefix}/{}", pointer::escape(field)), paths);
			}
		}
		Value::Array(items) if !items.is_empty() => {
			for (index, inner) in items.iter().enumerate() {
				walk(inner, format!("{prefix}/{index}"), paths);
			}
		}
		_ if prefix.is_empty() => (),
		_ => {
			paths.insert(prefix);
		}
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use serde_json::json;

	#[test]
	fn union_is_sorted_and_deduplicated() {
		let docs = vec![
			Some(json!({ "person": "Alice", "age": 27, "height": 1 })),
			Some(json!({ "person": "Bob", "age": "27", "weight": 2 })),
			None,
			Some(json!({ "person": "Carl", "age": 24 })),
		];
		let paths = gist(&docs);
		assert_eq!(paths, vec!["/age", "/height", "/person", "/weight"]);
	}

	#[test]
	fn nested_values_and_arrays() {
		let docs = vec![Some(json!({
			"user": { "id": 7, "tags": ["a", "b"], "meta": {} },
		}))];
		let paths = gist(&docs);
		assert_eq!(paths, vec!["/user/id", "/user/meta", "/user/tags/0", "/user/tags/1"]);
	}

	#[test]
	fn escaped_field_names() {
		let docs = vec![Some(json!({ "a/b": 1, "c~d": 2 }))];
		assert_eq!(gist(&docs), vec!["/a~1b", "/c~0d"]);
	}
}
