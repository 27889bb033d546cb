use crate::{
	collab::{
		auth::{Auth, HmacAuth},
		config_dir::{ConfigDirectory, FileConfigDirectory},
		replication::{ReplicationMap, StaticReplicationMap},
		storage::{InMemoryTsdb, PartitionMap, TsdbStorage},
	},
	config::AppConfig,
	logfile::{
		coordinator::ScanCoordinator,
		ingest::{IngestionPipeline, RandomRecordIdGenerator, RecordIdGenerator},
		local_scan::LocalScanAdapter,
		registry::LogfileRegistry,
		remote_scan::RemoteScanAdapter,
	},
	metrics,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
	pub config: Arc<AppConfig>,
	pub config_dir: Arc<dyn ConfigDirectory>,
	pub registry: Arc<LogfileRegistry>,
	pub coordinator: Arc<ScanCoordinator>,
	/// Shared with the coordinator's own local adapter; also used directly
	/// by the `/scan_partition` RPC handler peers call into.
	pub local_scan: Arc<LocalScanAdapter>,
	pub ingestion: Arc<IngestionPipeline>,
	pub auth: Arc<dyn Auth>,
	pub metrics: Arc<metrics::Instrumentations>,
}

/// Wires up the in-memory reference implementations of every external
/// collaborator and the components that sit on top of them. A real
/// deployment would swap `FileConfigDirectory`/`InMemoryTsdb` for actual
/// network clients without changing anything above this function.
pub fn build_state(
	config: Arc<AppConfig>,
	metrics: Arc<metrics::Instrumentations>,
) -> AppState {
	let config_dir: Arc<dyn ConfigDirectory> =
		Arc::new(FileConfigDirectory::new(config.config_dir.path.clone()));
	let registry = Arc::new(LogfileRegistry::new(config_dir.clone()));

	let tsdb = Arc::new(InMemoryTsdb::new());
	let partition_map: Arc<dyn PartitionMap> = tsdb.clone();
	let storage: Arc<dyn TsdbStorage> = tsdb;

	let replication: Arc<dyn ReplicationMap> = Arc::new(StaticReplicationMap::new(
		config.cluster.self_addr.clone(),
		config.cluster.peers.clone(),
	));

	let auth: Arc<dyn Auth> =
		Arc::new(HmacAuth::new(config.auth.shared_secret.clone().into_bytes()));

	let local_scan = Arc::new(LocalScanAdapter::new(partition_map, storage.clone()));
	let coordinator = Arc::new(ScanCoordinator::new(
		replication,
		local_scan.clone(),
		RemoteScanAdapter::new(reqwest::Client::new(), auth.clone()),
	));

	let id_gen: Arc<dyn RecordIdGenerator> = Arc::new(RandomRecordIdGenerator);
	let ingestion = Arc::new(IngestionPipeline::new(
		storage,
		id_gen,
		config.ingest.partition_size,
		config.ingest.batch_size,
	));

	AppState {
		config,
		config_dir,
		registry,
		coordinator,
		local_scan,
		ingestion,
		auth,
		metrics,
	}
}
