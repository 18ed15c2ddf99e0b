//! Exporting edge tuples out of fetched adjacency records.

use super::record::RecordRef;
use super::{Edge, Neighborhoods, Role, DEGREE_MISSING};
use crate::ctx::Param;
use crate::err::Error;
use crate::key;
use crate::kvs::{CollectionId, Transactor};

/// Walk each requested vertex's record and emit degrees and edge tuples.
///
/// Missing vertices report [`DEGREE_MISSING`] and contribute no tuples.
/// With `tuples` unset only the degrees are computed, which still requires
/// reading the records: entry lengths alone cannot distinguish the halves.
pub(super) async fn find_edges(
	tx: &mut Transactor,
	collection: CollectionId,
	vertices: &[i64],
	roles: Param<'_, Role>,
	watch: bool,
	tuples: bool,
) -> Result<Neighborhoods, Error> {
	// Fetch every requested record with a single batched read
	let keys = vertices
		.iter()
		.map(|v| key::Record::new(collection, *v).encode())
		.collect();
	let values = tx.getm(keys, watch).await?;
	// Walk the records and export the requested arrays
	let mut out = Neighborhoods {
		degrees: Vec::with_capacity(vertices.len()),
		edges: Vec::new(),
	};
	for (i, value) in values.iter().enumerate() {
		// Some vertices may be missing
		let Some(bytes) = value else {
			out.degrees.push(DEGREE_MISSING);
			continue;
		};
		let center = vertices[i];
		let role = roles.get(i);
		let view = RecordRef::parse(bytes);
		let mut degree = 0u32;
		if matches!(role, Role::Source | Role::Any) {
			if tuples {
				out.edges.extend(view.neighbors(Role::Source).map(|n| Edge {
					source: center,
					target: n.neighbor,
					id: n.edge,
				}));
			}
			degree += view.deg_out();
		}
		if matches!(role, Role::Target | Role::Any) {
			if tuples {
				out.edges.extend(view.neighbors(Role::Target).map(|n| Edge {
					source: n.neighbor,
					target: center,
					id: n.edge,
				}));
			}
			degree += view.deg_in();
		}
		out.degrees.push(degree);
	}
	Ok(out)
}
