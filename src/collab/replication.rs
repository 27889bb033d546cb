use crate::logfile::types::PartitionKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaHost {
	pub addr: String,
	pub is_local: bool,
}

/// Orders the replicas that hold a given partition, local replica first
/// when this node is one of them. The scan coordinator walks this list
/// in order and fails over on non-200/404 responses.
#[async_trait]
pub trait ReplicationMap: Send + Sync {
	async fn replicas_for(
		&self,
		table: &str,
		partition: &PartitionKey,
	) -> Vec<ReplicaHost>;
}

/// Fixed topology: this node plus a static peer list, every partition
/// replicated to all of them. A real deployment would consult a
/// placement service instead; SPEC_FULL.md scopes that out.
pub struct StaticReplicationMap {
	self_addr: String,
	peers: Vec<String>,
}

impl StaticReplicationMap {
	pub fn new(self_addr: String, peers: Vec<String>) -> Self {
		Self { self_addr, peers }
	}
}

#[async_trait]
impl ReplicationMap for StaticReplicationMap {
	async fn replicas_for(
		&self,
		_table: &str,
		_partition: &PartitionKey,
	) -> Vec<ReplicaHost> {
		let mut hosts = vec![ReplicaHost {
			addr: self.self_addr.clone(),
			is_local: true,
		}];
		hosts.extend(self.peers.iter().map(|addr| ReplicaHost {
			addr: addr.clone(),
			is_local: false,
		}));
		hosts
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::UNIX_EPOCH;

	#[tokio::test]
	async fn local_replica_is_listed_first() {
		let map = StaticReplicationMap::new(
			"10.0.0.1:7000".to_string(),
			vec!["10.0.0.2:7000".to_string(), "10.0.0.3:7000".to_string()],
		);
		let key = PartitionKey::derive(
			"logs.access",
			UNIX_EPOCH + std::time::Duration::from_secs(0),
		);
		let replicas = map.replicas_for("logs.access", &key).await;
		assert!(replicas[0].is_local);
		assert_eq!(replicas.len(), 3);
	}
}
