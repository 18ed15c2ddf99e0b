use polystore::ctx::{Context, Param};
use polystore::dataset::{self, DocsExport, DocsImport, Format, GraphExport, GraphImport};
use polystore::graph::Role;
use polystore::kvs::{CollectionId, Datastore};
use polystore::tbl::{TableHeader, TypeTag};
use std::fs;
use std::io::Write;

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
	let path = dir.path().join(name);
	let mut file = fs::File::create(&path).unwrap();
	file.write_all(content.as_bytes()).unwrap();
	path
}

#[tokio::test]
async fn ndjson_graph_import() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_file(
		&dir,
		"edges.ndjson",
		concat!(
			"{\"source\": 1, \"target\": 2, \"edge\": 9}\n",
			"{\"source\": 2, \"target\": 3, \"edge\": 10}\n",
			"{\"source\": 3, \"target\": 1, \"edge\": 11}\n",
		),
	);
	let ds = Datastore::new("memory").await.unwrap();
	let count = dataset::import_graph(&ds, GraphImport::new(path)).await.unwrap();
	assert_eq!(count, 3);
	let graph = ds.graph(CollectionId::MAIN);
	let degrees =
		graph.degrees(Context::new(), &[1, 2, 3], Param::One(Role::Any)).await.unwrap();
	assert_eq!(degrees, vec![2, 2, 2]);
}

#[tokio::test]
async fn csv_graph_import_without_edge_ids() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_file(&dir, "edges.csv", "from,to\n1,2\n2,3\n");
	let ds = Datastore::new("memory").await.unwrap();
	let config = GraphImport::new(path).fields("from", "to", None);
	assert_eq!(dataset::import_graph(&ds, config).await.unwrap(), 2);
	let graph = ds.graph(CollectionId::MAIN);
	let degrees = graph.degrees(Context::new(), &[2], Param::One(Role::Any)).await.unwrap();
	assert_eq!(degrees, vec![2]);
}

#[tokio::test]
async fn unsupported_extensions_are_rejected() {
	let ds = Datastore::new("memory").await.unwrap();
	let result = dataset::import_graph(&ds, GraphImport::new("edges.xlsx")).await;
	assert!(result.is_err());
	let result =
		dataset::import_graph(&ds, GraphImport::new("e.ndjson").fields("bad name", "to", None))
			.await;
	assert!(result.is_err());
}

#[tokio::test]
async fn graph_roundtrip_through_parquet() {
	let ds = Datastore::new("memory").await.unwrap();
	let graph = ds.graph(CollectionId::MAIN);
	graph
		.upsert_edges(Context::new(), &[1, 2, 3], &[2, 3, 1], Some((&[9i64, 10, 11][..]).into()))
		.await
		.unwrap();
	// Export the whole collection, then import it into a fresh store
	let dir = tempfile::tempdir().unwrap();
	let path = dataset::export_graph(&ds, GraphExport::new(dir.path(), Format::Parquet))
		.await
		.unwrap();
	let other = Datastore::new("memory").await.unwrap();
	assert_eq!(dataset::import_graph(&other, GraphImport::new(path)).await.unwrap(), 3);
	let before = ds
		.graph(CollectionId::MAIN)
		.find_edges(Context::new(), &[1, 2, 3], Param::One(Role::Any))
		.await
		.unwrap();
	let after = other
		.graph(CollectionId::MAIN)
		.find_edges(Context::new(), &[1, 2, 3], Param::One(Role::Any))
		.await
		.unwrap();
	assert_eq!(before, after);
}

#[tokio::test]
async fn graph_roundtrip_through_csv() {
	let ds = Datastore::new("memory").await.unwrap();
	let graph = ds.graph(CollectionId::MAIN);
	graph.upsert_edges(Context::new(), &[5, 6], &[6, 7], None).await.unwrap();
	let dir = tempfile::tempdir().unwrap();
	let path =
		dataset::export_graph(&ds, GraphExport::new(dir.path(), Format::Csv)).await.unwrap();
	let other = Datastore::new("memory").await.unwrap();
	assert_eq!(dataset::import_graph(&other, GraphImport::new(path)).await.unwrap(), 2);
	let degrees = other
		.graph(CollectionId::MAIN)
		.degrees(Context::new(), &[6], Param::One(Role::Any))
		.await
		.unwrap();
	assert_eq!(degrees, vec![2]);
}

#[tokio::test]
async fn ndjson_docs_import_with_projection() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_file(
		&dir,
		"people.ndjson",
		concat!(
			"{\"_id\": 1, \"person\": \"Alice\", \"age\": 27, \"noise\": true}\n",
			"{\"_id\": 2, \"person\": \"Bob\", \"age\": 28}\n",
		),
	);
	let ds = Datastore::new("memory").await.unwrap();
	let config =
		DocsImport::new(path).fields(["person".to_string(), "age".to_string()]);
	assert_eq!(dataset::import_docs(&ds, config).await.unwrap(), 2);
	let docs = ds.docs(CollectionId::MAIN);
	let found = docs.read(Context::new(), &[1]).await.unwrap();
	assert_eq!(
		found[0],
		Some(serde_json::json!({ "_id": 1, "person": "Alice", "age": 27 }))
	);
}

#[tokio::test]
async fn docs_import_requires_an_integer_id() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_file(&dir, "people.ndjson", "{\"person\": \"Alice\"}\n");
	let ds = Datastore::new("memory").await.unwrap();
	let result = dataset::import_docs(&ds, DocsImport::new(path)).await;
	assert!(result.is_err());
}

#[tokio::test]
async fn csv_docs_import_infers_cell_types() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_file(&dir, "people.csv", "_id,person,age,tall\n1,Alice,27,true\n");
	let ds = Datastore::new("memory").await.unwrap();
	assert_eq!(dataset::import_docs(&ds, DocsImport::new(path)).await.unwrap(), 1);
	let found = ds.docs(CollectionId::MAIN).read(Context::new(), &[1]).await.unwrap();
	assert_eq!(
		found[0],
		Some(serde_json::json!({ "_id": 1, "person": "Alice", "age": 27, "tall": true }))
	);
}

#[tokio::test]
async fn docs_roundtrip_through_ndjson() {
	let ds = Datastore::new("memory").await.unwrap();
	let docs = ds.docs(CollectionId::MAIN);
	docs.assign(
		Context::new(),
		&[1, 2],
		&[
			serde_json::json!({ "_id": 1, "person": "Alice" }),
			serde_json::json!({ "_id": 2, "person": "Bob" }),
		],
	)
	.await
	.unwrap();
	let dir = tempfile::tempdir().unwrap();
	let path =
		dataset::export_docs(&ds, DocsExport::new(dir.path(), Format::Ndjson)).await.unwrap();
	let other = Datastore::new("memory").await.unwrap();
	assert_eq!(dataset::import_docs(&other, DocsImport::new(path)).await.unwrap(), 2);
	let found = other.docs(CollectionId::MAIN).read(Context::new(), &[1, 2]).await.unwrap();
	assert_eq!(found[0], Some(serde_json::json!({ "_id": 1, "person": "Alice" })));
	assert_eq!(found[1], Some(serde_json::json!({ "_id": 2, "person": "Bob" })));
}

#[tokio::test]
async fn projected_docs_export_to_parquet() {
	let ds = Datastore::new("memory").await.unwrap();
	let docs = ds.docs(CollectionId::MAIN);
	docs.assign(
		Context::new(),
		&[1, 2],
		&[
			serde_json::json!({ "_id": 1, "person": "Alice", "age": 27 }),
			serde_json::json!({ "_id": 2, "person": "Bob", "age": "28" }),
		],
	)
	.await
	.unwrap();
	let dir = tempfile::tempdir().unwrap();
	let header = TableHeader::new().columns([
		("_id", TypeTag::I64),
		("person", TypeTag::Str),
		("age", TypeTag::I32),
	]);
	let config = DocsExport::new(dir.path(), Format::Parquet).fields(header);
	let path = dataset::export_docs(&ds, config).await.unwrap();
	assert!(path.extension().is_some_and(|e| e == "parquet"));
	assert!(fs::metadata(&path).unwrap().len() > 0);
	// The rectangular formats refuse to run without a projection
	let result = dataset::export_docs(&ds, DocsExport::new(dir.path(), Format::Csv)).await;
	assert!(result.is_err());
}
