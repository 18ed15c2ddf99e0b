//! The seam between the data models and the substrate.
//!
//! Each modality translates its payloads to and from raw substrate values
//! through one [`Codec`] implementation, so the maintenance code never
//! depends on a concrete wire format.

use crate::err::Error;
use crate::graph::record;
use crate::graph::Neighborhood;
use crate::kvs::Val;
use serde_json::Value;

/// Translates one modality payload to and from substrate bytes.
pub trait Codec {
	type Unit;
	/// Serialise a payload into a substrate value.
	fn encode(&self, unit: &Self::Unit) -> Result<Val, Error>;
	/// Parse a substrate value back into a payload.
	fn decode(&self, bytes: &[u8]) -> Result<Self::Unit, Error>;
}

/// The document codec: values are JSON tapes.
pub struct JsonCodec;

impl Codec for JsonCodec {
	type Unit = Value;

	fn encode(&self, unit: &Value) -> Result<Val, Error> {
		Ok(serde_json::to_vec(unit)?)
	}

	fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
		Ok(serde_json::from_slice(bytes)?)
	}
}

/// The graph codec: values are packed adjacency records.
pub struct AdjacencyCodec;

impl Codec for AdjacencyCodec {
	type Unit = Neighborhood;

	fn encode(&self, unit: &Neighborhood) -> Result<Val, Error> {
		Ok(record::build(&unit.outgoing, &unit.incoming))
	}

	fn decode(&self, bytes: &[u8]) -> Result<Neighborhood, Error> {
		let view = record::RecordRef::parse(bytes);
		Ok(Neighborhood {
			outgoing: view.neighbors(crate::graph::Role::Source).collect(),
			incoming: view.neighbors(crate::graph::Role::Target).collect(),
		})
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use crate::graph::Neighborship;
	use serde_json::json;

	#[test]
	fn json_roundtrip() {
		let doc = json!({ "person": "Alice", "age": 27 });
		let bytes = JsonCodec.encode(&doc).unwrap();
		assert_eq!(JsonCodec.decode(&bytes).unwrap(), doc);
	}

	#[test]
	fn adjacency_roundtrip() {
		let hood = Neighborhood {
			outgoing: vec![Neighborship::new(2, 9), Neighborship::new(3, 1)],
			incoming: vec![Neighborship::new(7, 4)],
		};
		let bytes = AdjacencyCodec.encode(&hood).unwrap();
		assert_eq!(bytes.len(), 8 + 3 * 16);
		let back = AdjacencyCodec.decode(&bytes).unwrap();
		assert_eq!(back.outgoing, hood.outgoing);
		assert_eq!(back.incoming, hood.incoming);
	}
}
