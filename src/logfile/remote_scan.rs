use crate::{
	collab::{auth::Auth, replication::ReplicaHost},
	errors::LogfileError,
	logfile::types::{
		LogfileScanParams, LogfileScanResult, PartitionKey, ScanType,
	},
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body posted to a peer's `/api/v1/logfiles/scan_partition`: the full
/// scan contract narrowed to one partition, so the remote node applies
/// the same projection/filter/limit its own local adapter would.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanPartitionRequest {
	pub table: String,
	pub partition: String,
	#[serde(default)]
	pub start_time: i64,
	pub end_time: i64,
	#[serde(default)]
	pub columns: Vec<String>,
	#[serde(default)]
	pub condition: Option<String>,
	#[serde(default)]
	pub return_raw: bool,
	#[serde(default)]
	pub scan_type: ScanType,
	pub limit: usize,
}

/// Wire shape of a remote partition scan response. `#[serde(default)]` on
/// every field gives forward/backward compatibility between peer
/// versions without pinning a protobuf field-tag scheme.
#[derive(Debug, Default, Deserialize)]
struct ScanPartitionResponse {
	#[serde(default)]
	result: LogfileScanResult,
}

/// Walks a partition's replica hosts in order, merging the first
/// successful response into the shared result. A `404` means the
/// partition genuinely doesn't exist anywhere and short-circuits the
/// walk without trying further hosts; any other non-200 is recorded and
/// the next host is tried; if every host fails, the accumulated causes
/// are surfaced as a single aggregate `Runtime` error.
pub struct RemoteScanAdapter {
	client: Client,
	auth: Arc<dyn Auth>,
}

impl RemoteScanAdapter {
	pub fn new(client: Client, auth: Arc<dyn Auth>) -> Self {
		Self { client, auth }
	}

	pub async fn scan(
		&self,
		customer: &str,
		hosts: &[ReplicaHost],
		partition: &PartitionKey,
		params: &LogfileScanParams,
		result: &mut LogfileScanResult,
	) -> Result<(), LogfileError> {
		let mut causes = Vec::new();
		let body = ScanPartitionRequest {
			table: params.table.clone(),
			partition: partition.as_str().to_string(),
			start_time: params.start_time.timestamp(),
			end_time: params.end_time.timestamp(),
			columns: params.columns.clone(),
			condition: params.condition.clone(),
			return_raw: params.return_raw,
			scan_type: params.scan_type,
			limit: params.limit,
		};
		let token = self.auth.sign(customer);

		for host in hosts {
			let url = format!(
				"http://{}/api/v1/logfiles/scan_partition",
				host.addr
			);
			let resp = self
				.client
				.post(&url)
				.header("Authorization", format!("Token {token}"))
				.json(&body)
				.send()
				.await;

			let resp = match resp {
				Ok(r) => r,
				Err(e) => {
					causes.push(format!("{}: {e}", host.addr));
					continue;
				}
			};

			match resp.status() {
				StatusCode::OK => {
					let body: ScanPartitionResponse =
						resp.json().await.map_err(|e| {
							LogfileError::parse_error(format!(
								"decoding response from {}: {e}",
								host.addr
							))
						})?;
					result.merge(body.result);
					return Ok(());
				}
				StatusCode::NOT_FOUND => return Ok(()),
				other => {
					causes.push(format!("{}: status {other}", host.addr));
				}
			}
		}

		Err(LogfileError::AllReplicasFailed {
			partition: partition.as_str().to_string(),
			causes,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logfile::types::Row;
	use chrono::TimeZone;
	use std::time::UNIX_EPOCH;
	use wiremock::{
		matchers::{header_exists, method, path},
		Mock, MockServer, ResponseTemplate,
	};

	fn key() -> PartitionKey {
		PartitionKey::derive("logs.access", UNIX_EPOCH)
	}

	fn params() -> LogfileScanParams {
		LogfileScanParams {
			table: "logs.access".to_string(),
			start_time: chrono::Utc.timestamp_opt(0, 0).unwrap(),
			end_time: chrono::Utc::now(),
			columns: vec![],
			condition: None,
			return_raw: false,
			scan_type: Default::default(),
			limit: 10,
		}
	}

	fn adapter(client: Client) -> RemoteScanAdapter {
		RemoteScanAdapter::new(
			client,
			Arc::new(crate::collab::auth::HmacAuth::new(
				b"0123456789abcdef".to_vec(),
			)),
		)
	}

	#[tokio::test]
	async fn ok_response_merges_rows_and_stops() {
		let server = MockServer::start().await;
		let mut rows = Row::default();
		rows.columns.insert(
			"raw".to_string(),
			crate::logfile::types::ColumnValue::String("hi".into()),
		);
		let body = ScanPartitionResponseFixture {
			result: LogfileScanResult {
				columns: vec![],
				rows: vec![rows],
				rows_scanned: 1,
				scanned_until: None,
				limit: 10,
			},
		};
		Mock::given(method("POST"))
			.and(path("/api/v1/logfiles/scan_partition"))
			.respond_with(ResponseTemplate::new(200).set_body_json(&body))
			.mount(&server)
			.await;

		let adapter = adapter(Client::new());
		let hosts = vec![ReplicaHost {
			addr: server.address().to_string(),
			is_local: false,
		}];
		let mut result = LogfileScanResult::new(10);
		adapter
			.scan("acme", &hosts, &key(), &params(), &mut result)
			.await
			.unwrap();
		assert_eq!(result.rows.len(), 1);
	}

	#[tokio::test]
	async fn outbound_request_carries_a_signed_authorization_header() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/logfiles/scan_partition"))
			.and(header_exists("Authorization"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let adapter = adapter(Client::new());
		let hosts = vec![ReplicaHost {
			addr: server.address().to_string(),
			is_local: false,
		}];
		let mut result = LogfileScanResult::new(10);
		adapter
			.scan("acme", &hosts, &key(), &params(), &mut result)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn not_found_short_circuits_without_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/logfiles/scan_partition"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let adapter = adapter(Client::new());
		let hosts = vec![ReplicaHost {
			addr: server.address().to_string(),
			is_local: false,
		}];
		let mut result = LogfileScanResult::new(10);
		adapter
			.scan("acme", &hosts, &key(), &params(), &mut result)
			.await
			.unwrap();
		assert!(result.rows.is_empty());
	}

	#[tokio::test]
	async fn failover_to_next_host_on_non_404_error() {
		let failing = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/logfiles/scan_partition"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&failing)
			.await;

		let healthy = MockServer::start().await;
		let mut rows = Row::default();
		rows.columns.insert(
			"raw".to_string(),
			crate::logfile::types::ColumnValue::String("hi".into()),
		);
		let body = ScanPartitionResponseFixture {
			result: LogfileScanResult {
				columns: vec![],
				rows: vec![rows],
				rows_scanned: 1,
				scanned_until: None,
				limit: 10,
			},
		};
		Mock::given(method("POST"))
			.and(path("/api/v1/logfiles/scan_partition"))
			.respond_with(ResponseTemplate::new(200).set_body_json(&body))
			.mount(&healthy)
			.await;

		let adapter = adapter(Client::new());
		let hosts = vec![
			ReplicaHost {
				addr: failing.address().to_string(),
				is_local: false,
			},
			ReplicaHost {
				addr: healthy.address().to_string(),
				is_local: false,
			},
		];
		let mut result = LogfileScanResult::new(10);
		adapter
			.scan("acme", &hosts, &key(), &params(), &mut result)
			.await
			.unwrap();
		assert_eq!(result.rows.len(), 1);
	}

	#[tokio::test]
	async fn all_hosts_failing_yields_aggregate_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/logfiles/scan_partition"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let adapter = adapter(Client::new());
		let hosts = vec![ReplicaHost {
			addr: server.address().to_string(),
			is_local: false,
		}];
		let mut result = LogfileScanResult::new(10);
		let err = adapter
			.scan("acme", &hosts, &key(), &params(), &mut result)
			.await
			.unwrap_err();
		assert!(matches!(err, LogfileError::AllReplicasFailed { .. }));
	}

	#[derive(Serialize)]
	struct ScanPartitionResponseFixture {
		result: LogfileScanResult,
	}
}
