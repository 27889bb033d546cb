use crate::{
	collab::storage::{PartitionMap, TsdbStorage},
	errors::LogfileError,
	logfile::{
		sql,
		types::{ColumnValue, LogfileScanParams, LogfileScanResult, PartitionKey},
	},
};
use std::sync::Arc;

/// Scans a single partition this node holds locally: resolves the
/// partition, compiles the filter condition, reads rows from the columnar
/// store, and appends projected, matching rows to the shared result until
/// either the partition is exhausted or the result reaches capacity.
pub struct LocalScanAdapter {
	partitions: Arc<dyn PartitionMap>,
	storage: Arc<dyn TsdbStorage>,
}

impl LocalScanAdapter {
	pub fn new(
		partitions: Arc<dyn PartitionMap>,
		storage: Arc<dyn TsdbStorage>,
	) -> Self {
		Self {
			partitions,
			storage,
		}
	}

	/// Returns `true` if the caller should keep walking older partitions,
	/// `false` once the result has reached capacity.
	pub async fn scan(
		&self,
		partition: &PartitionKey,
		params: &LogfileScanParams,
		result: &mut LogfileScanResult,
	) -> Result<bool, LogfileError> {
		if result.columns.is_empty() {
			result.columns = params.projection_order();
		}

		if !self.partitions.exists(&params.table, partition).await {
			return Ok(true);
		}

		let predicate = match &params.condition {
			Some(cond) => Some(sql::compile(cond)?),
			None => None,
		};

		let rows = self.storage.scan_partition(&params.table, partition).await?;
		let end_secs = params.end_time.timestamp();

		for row in rows {
			result.rows_scanned += 1;

			if let Some(ColumnValue::Timestamp(ts)) = row.get("time") {
				if *ts >= end_secs {
					continue;
				}
			}

			if let Some(pred) = &predicate {
				if !pred.eval(&row) {
					continue;
				}
			}

			let projected = row.project(&result.columns);

			if result.add_row(projected).is_none() {
				return Ok(false);
			}
		}

		Ok(!result.is_full())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		collab::storage::InMemoryTsdb,
		logfile::types::Row,
	};
	use chrono::{TimeZone, Utc};
	use std::time::UNIX_EPOCH;

	fn row(status: &str) -> Row {
		let mut r = Row::default();
		r.columns
			.insert("status".to_string(), ColumnValue::String(status.into()));
		r
	}

	fn params(condition: Option<&str>) -> LogfileScanParams {
		LogfileScanParams {
			table: "logs.access".to_string(),
			start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
			end_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
			columns: vec![],
			condition: condition.map(str::to_string),
			return_raw: false,
			scan_type: Default::default(),
			limit: 10,
		}
	}

	#[tokio::test]
	async fn missing_partition_is_a_no_op() {
		let storage = Arc::new(InMemoryTsdb::new());
		let adapter = LocalScanAdapter::new(storage.clone(), storage);
		let key = PartitionKey::derive("logs.access", UNIX_EPOCH);
		let mut result = LogfileScanResult::new(10);
		let keep_going = adapter
			.scan(&key, &params(None), &mut result)
			.await
			.unwrap();
		assert!(keep_going);
		assert!(result.rows.is_empty());
	}

	#[tokio::test]
	async fn condition_filters_rows() {
		let storage = Arc::new(InMemoryTsdb::new());
		let key = PartitionKey::derive("logs.access", UNIX_EPOCH);
		storage
			.insert_rows(
				"logs.access",
				&key,
				vec![row("200"), row("500")],
			)
			.await
			.unwrap();
		let adapter = LocalScanAdapter::new(storage.clone(), storage);
		let mut result = LogfileScanResult::new(10);
		adapter
			.scan(&key, &params(Some("status = '200'")), &mut result)
			.await
			.unwrap();
		assert_eq!(result.rows.len(), 1);
	}

	#[tokio::test]
	async fn end_time_boundary_is_exclusive() {
		let storage = Arc::new(InMemoryTsdb::new());
		let key = PartitionKey::derive("logs.access", UNIX_EPOCH);
		let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
		let mut at_boundary = Row::default();
		at_boundary.columns.insert(
			"time".to_string(),
			ColumnValue::Timestamp(end.timestamp()),
		);
		let mut before_boundary = Row::default();
		before_boundary.columns.insert(
			"time".to_string(),
			ColumnValue::Timestamp(end.timestamp() - 1),
		);
		storage
			.insert_rows(
				"logs.access",
				&key,
				vec![at_boundary, before_boundary],
			)
			.await
			.unwrap();
		let adapter = LocalScanAdapter::new(storage.clone(), storage);
		let mut result = LogfileScanResult::new(10);
		adapter
			.scan(&key, &params(None), &mut result)
			.await
			.unwrap();
		assert_eq!(result.rows.len(), 1);
		assert_eq!(
			result.rows[0].get("time"),
			Some(&ColumnValue::Timestamp(end.timestamp() - 1))
		);
	}

	#[tokio::test]
	async fn stops_once_capacity_reached() {
		let storage = Arc::new(InMemoryTsdb::new());
		let key = PartitionKey::derive("logs.access", UNIX_EPOCH);
		storage
			.insert_rows(
				"logs.access",
				&key,
				vec![row("200"), row("201"), row("202")],
			)
			.await
			.unwrap();
		let adapter = LocalScanAdapter::new(storage.clone(), storage);
		let mut result = LogfileScanResult::new(2);
		let keep_going = adapter
			.scan(&key, &params(None), &mut result)
			.await
			.unwrap();
		assert!(!keep_going);
		assert_eq!(result.rows.len(), 2);
	}

	#[tokio::test]
	async fn projection_puts_time_first_then_raw_then_requested_columns() {
		let storage = Arc::new(InMemoryTsdb::new());
		let key = PartitionKey::derive("logs.access", UNIX_EPOCH);
		let mut r = row("200");
		r.columns
			.insert("time".to_string(), ColumnValue::Timestamp(0));
		r.columns
			.insert("raw".to_string(), ColumnValue::String("raw line".into()));
		storage
			.insert_rows("logs.access", &key, vec![r])
			.await
			.unwrap();
		let adapter = LocalScanAdapter::new(storage.clone(), storage);
		let mut result = LogfileScanResult::new(10);
		let mut p = params(None);
		p.columns = vec!["status".to_string()];
		p.return_raw = true;
		adapter.scan(&key, &p, &mut result).await.unwrap();
		assert_eq!(result.columns, vec!["time", "raw", "status"]);
		let row = &result.rows[0];
		assert!(row.get("time").is_some());
		assert!(row.get("raw").is_some());
		assert!(row.get("status").is_some());
	}

	#[tokio::test]
	async fn projection_omits_raw_when_return_raw_is_false() {
		let storage = Arc::new(InMemoryTsdb::new());
		let key = PartitionKey::derive("logs.access", UNIX_EPOCH);
		let mut r = row("200");
		r.columns
			.insert("time".to_string(), ColumnValue::Timestamp(0));
		r.columns
			.insert("raw".to_string(), ColumnValue::String("raw line".into()));
		storage
			.insert_rows("logs.access", &key, vec![r])
			.await
			.unwrap();
		let adapter = LocalScanAdapter::new(storage.clone(), storage);
		let mut result = LogfileScanResult::new(10);
		let p = params(None);
		adapter.scan(&key, &p, &mut result).await.unwrap();
		assert!(result.rows[0].get("raw").is_none());
		assert!(result.rows[0].get("time").is_some());
	}
}
