use crate::{
	errors::LogfileError,
	logfile::types::{PartitionKey, Row, TableDefinition},
};
use async_trait::async_trait;
use dashmap::DashMap;

/// Resolves which partitions of a table actually exist, independent of
/// whether this node holds them locally.
#[async_trait]
pub trait PartitionMap: Send + Sync {
	async fn exists(&self, table: &str, partition: &PartitionKey) -> bool;
}

/// The columnar store itself: row insertion and projected, ordered scan
/// over a single partition. `scan_partition` returns rows in the order
/// they were inserted; the caller is responsible for capacity/projection.
#[async_trait]
pub trait TsdbStorage: Send + Sync {
	async fn create_table(
		&self,
		def: TableDefinition,
	) -> Result<(), LogfileError>;

	async fn insert_rows(
		&self,
		table: &str,
		partition: &PartitionKey,
		rows: Vec<Row>,
	) -> Result<(), LogfileError>;

	async fn scan_partition(
		&self,
		table: &str,
		partition: &PartitionKey,
	) -> Result<Vec<Row>, LogfileError>;
}

/// In-memory reference store: one `Vec<Row>` per `(table, partition)`,
/// guarded by `DashMap`'s internal sharding the way the teacher's own
/// caches rely on `dashmap` for concurrent access without an explicit lock.
#[derive(Default)]
pub struct InMemoryTsdb {
	tables: DashMap<String, TableDefinition>,
	partitions: DashMap<(String, String), Vec<Row>>,
}

impl InMemoryTsdb {
	pub fn new() -> Self {
		Self::default()
	}

	fn key(table: &str, partition: &PartitionKey) -> (String, String) {
		(table.to_string(), partition.as_str().to_string())
	}
}

#[async_trait]
impl PartitionMap for InMemoryTsdb {
	async fn exists(&self, table: &str, partition: &PartitionKey) -> bool {
		self.partitions.contains_key(&Self::key(table, partition))
	}
}

#[async_trait]
impl TsdbStorage for InMemoryTsdb {
	async fn create_table(
		&self,
		def: TableDefinition,
	) -> Result<(), LogfileError> {
		self.tables.insert(def.table_name.clone(), def);
		Ok(())
	}

	async fn insert_rows(
		&self,
		table: &str,
		partition: &PartitionKey,
		rows: Vec<Row>,
	) -> Result<(), LogfileError> {
		self.partitions
			.entry(Self::key(table, partition))
			.or_default()
			.extend(rows);
		Ok(())
	}

	async fn scan_partition(
		&self,
		table: &str,
		partition: &PartitionKey,
	) -> Result<Vec<Row>, LogfileError> {
		Ok(self
			.partitions
			.get(&Self::key(table, partition))
			.map(|rows| rows.clone())
			.unwrap_or_default())
	}
}
