use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One RFC 6902 JSON Patch operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Operation {
	Add {
		path: String,
		value: Value,
	},
	Remove {
		path: String,
	},
	Replace {
		path: String,
		value: Value,
	},
	Copy {
		path: String,
		from: String,
	},
	Move {
		path: String,
		from: String,
	},
	Test {
		path: String,
		value: Value,
	},
}
