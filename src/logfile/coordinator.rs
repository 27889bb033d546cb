use crate::{
	collab::replication::ReplicationMap,
	errors::LogfileError,
	logfile::{
		local_scan::LocalScanAdapter,
		remote_scan::RemoteScanAdapter,
		types::LogfileScanParams,
		walker::PartitionWalker,
	},
};
use crate::logfile::types::LogfileScanResult;
use std::sync::Arc;

/// Drives a scan across a table's time range: the walker produces
/// partition keys newest-first, and for each one the coordinator routes
/// to the local adapter when this node holds a replica, or to the remote
/// adapter otherwise. Walking stops as soon as the result reaches
/// capacity — termination is driven solely by `is_full()`, never by
/// partition count.
pub struct ScanCoordinator {
	replication: Arc<dyn ReplicationMap>,
	local: Arc<LocalScanAdapter>,
	remote: RemoteScanAdapter,
}

/// Callback invoked after each partition is scanned, reporting whether the
/// result has reached capacity. Advisory only — it cannot halt the scan.
pub type ProgressCallback<'a> = dyn FnMut(bool) + Send + 'a;

impl ScanCoordinator {
	pub fn new(
		replication: Arc<dyn ReplicationMap>,
		local: Arc<LocalScanAdapter>,
		remote: RemoteScanAdapter,
	) -> Self {
		Self {
			replication,
			local,
			remote,
		}
	}

	pub async fn scan(
		&self,
		customer: &str,
		params: &LogfileScanParams,
		partition_size: std::time::Duration,
		lookback: std::time::Duration,
		mut progress: Option<&mut ProgressCallback<'_>>,
	) -> Result<LogfileScanResult, LogfileError> {
		let walker =
			PartitionWalker::new(params.table.clone(), partition_size, lookback);
		let windows = walker.walk(params.start_time, params.end_time);

		let mut result = LogfileScanResult::new(params.limit);
		result.columns = params.projection_order();

		for (partition, window_start) in windows.iter() {
			let hosts =
				self.replication.replicas_for(&params.table, partition).await;
			let has_local = hosts.iter().any(|h| h.is_local);

			if has_local {
				let keep_going = self
					.local
					.scan(partition, params, &mut result)
					.await?;
				result.scanned_until = Some(window_start.timestamp());
				let done = result.is_full();
				if let Some(cb) = progress.as_deref_mut() {
					cb(done);
				}
				if !keep_going {
					break;
				}
			} else {
				self.remote
					.scan(customer, &hosts, partition, params, &mut result)
					.await?;
				result.scanned_until = Some(window_start.timestamp());
				let done = result.is_full();
				if let Some(cb) = progress.as_deref_mut() {
					cb(done);
				}
				if done {
					break;
				}
			}
		}

		Ok(result)
	}
}
