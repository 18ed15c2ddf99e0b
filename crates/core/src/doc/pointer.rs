//! Field addressing inside a document.
//!
//! A path starting with `/` is an RFC 6901 JSON Pointer with `~0`/`~1`
//! escapes; any other non-empty string is the literal name of a top-level
//! field. The empty path addresses the whole document.

use serde_json::Value;

/// Split a path into its unescaped segments.
pub(crate) fn segments(path: &str) -> Vec<String> {
	if path.is_empty() {
		return Vec::new();
	}
	match path.strip_prefix('/') {
		Some(rest) => rest.split('/').map(unescape).collect(),
		None => vec![path.to_string()],
	}
}

/// Render one segment for use inside a pointer path.
pub(crate) fn escape(segment: &str) -> String {
	segment.replace('~', "~0").replace('/', "~1")
}

fn unescape(segment: &str) -> String {
	segment.replace("~1", "/").replace("~0", "~")
}

/// Resolve a path to a subtree, if present.
pub(crate) fn pick<'v>(value: &'v Value, segments: &[String]) -> Option<&'v Value> {
	let Some((segment, rest)) = segments.split_first() else {
		return Some(value);
	};
	match value {
		Value::Object(map) => pick(map.get(segment)?, rest),
		Value::Array(items) => {
			let index: usize = segment.parse().ok()?;
			pick(items.get(index)?, rest)
		}
		_ => None,
	}
}

/// Resolve a path to a mutable subtree, if present.
pub(crate) fn pick_mut<'v>(value: &'v mut Value, segments: &[String]) -> Option<&'v mut Value> {
	let Some((segment, rest)) = segments.split_first() else {
		return Some(value);
	};
	match value {
		Value::Object(map) => pick_mut(map.get_mut(segment)?, rest),
		Value::Array(items) => {
			let index: usize = segment.parse().ok()?;
			pick_mut(items.get_mut(index)?, rest)
		}
		_ => None,
	}
}

/// Replace the subtree at a path, materialising missing parents as objects.
///
/// Indexing into an array replaces the cell in place, with `-` or the
/// one-past-the-end index appending. A non-container found mid-path is
/// replaced by a fresh object so the remaining segments can be created.
pub(crate) fn put(value: &mut Value, segments: &[String], fragment: Value) {
	let Some((segment, rest)) = segments.split_first() else {
		*value = fragment;
		return;
	};
	match value {
		Value::Object(map) => {
			put(map.entry(segment.clone()).or_insert(Value::Null), rest, fragment)
		}
		Value::Array(items) => {
			if segment == "-" || segment.parse() == Ok(items.len()) {
				items.push(Value::Null);
				let last = items.len() - 1;
				put(&mut items[last], rest, fragment);
			} else if let Ok(index) = segment.parse::<usize>() {
				if let Some(item) = items.get_mut(index) {
					put(item, rest, fragment);
				}
			}
		}
		_ => {
			*value = Value::Object(serde_json::Map::new());
			put(value, segments, fragment);
		}
	}
}

/// Delete the subtree at a path. Missing paths are left untouched.
pub(crate) fn cut(value: &mut Value, segments: &[String]) {
	let Some((segment, rest)) = segments.split_first() else {
		return;
	};
	match value {
		Value::Object(map) => match rest.is_empty() {
			true => {
				map.remove(segment);
			}
			false => {
				if let Some(inner) = map.get_mut(segment) {
					cut(inner, rest);
				}
			}
		},
		Value::Array(items) => {
			let Ok(index) = segment.parse::<usize>() else {
				return;
			};
			match rest.is_empty() {
				true => {
					if index < items.len() {
						items.remove(index);
					}
				}
				false => {
					if let Some(item) = items.get_mut(index) {
						cut(item, rest);
					}
				}
			}
		}
		_ => (),
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use serde_json::json;

	#[test]
	fn segments_distinguish_pointers_from_names() {
		assert!(segments("").is_empty());
		assert_eq!(segments("age"), vec!["age"]);
		assert_eq!(segments("/user/id"), vec!["user", "id"]);
		assert_eq!(segments("/a~1b/c~0d"), vec!["a/b", "c~d"]);
		// A bare name containing no leading slash stays one segment
		assert_eq!(segments("user/id").len(), 1);
	}

	#[test]
	fn pick_walks_objects_and_arrays() {
		let doc = json!({ "user": { "id": 7, "tags": ["a", "b"] } });
		assert_eq!(pick(&doc, &segments("/user/id")), Some(&json!(7)));
		assert_eq!(pick(&doc, &segments("/user/tags/1")), Some(&json!("b")));
		assert_eq!(pick(&doc, &segments("/user/missing")), None);
		assert_eq!(pick(&doc, &segments("/user/tags/9")), None);
		assert_eq!(pick(&doc, &segments("")), Some(&doc));
	}

	#[test]
	fn put_materialises_missing_parents() {
		let mut doc = json!({});
		put(&mut doc, &segments("/a/b/c"), json!(1));
		assert_eq!(doc, json!({ "a": { "b": { "c": 1 } } }));
		// Replacing a scalar mid-path makes room for the subtree
		put(&mut doc, &segments("/a/b/c/d"), json!(2));
		assert_eq!(doc, json!({ "a": { "b": { "c": { "d": 2 } } } }));
	}

	#[test]
	fn put_into_arrays() {
		let mut doc = json!({ "tags": ["a", "b"] });
		put(&mut doc, &segments("/tags/0"), json!("x"));
		assert_eq!(doc, json!({ "tags": ["x", "b"] }));
		put(&mut doc, &segments("/tags/-"), json!("y"));
		assert_eq!(doc, json!({ "tags": ["x", "b", "y"] }));
		put(&mut doc, &segments("/tags/3"), json!("z"));
		assert_eq!(doc, json!({ "tags": ["x", "b", "y", "z"] }));
	}

	#[test]
	fn cut_removes_fields_and_items() {
		let mut doc = json!({ "a": { "b": 1, "c": 2 }, "tags": ["x", "y"] });
		cut(&mut doc, &segments("/a/b"));
		assert_eq!(doc, json!({ "a": { "c": 2 }, "tags": ["x", "y"] }));
		cut(&mut doc, &segments("/tags/0"));
		assert_eq!(doc, json!({ "a": { "c": 2 }, "tags": ["y"] }));
		// Missing paths are a no-op
		cut(&mut doc, &segments("/missing/deep"));
		assert_eq!(doc, json!({ "a": { "c": 2 }, "tags": ["y"] }));
	}
}
