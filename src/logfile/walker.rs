use crate::logfile::types::PartitionKey;
use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime};

/// Enumerates the time-window partition keys covering `[start, end]` for a
/// table, newest first, stepping backward by `partition_size`. The walk is
/// additionally clamped to `end - lookback`, so a scan never reaches
/// further back than the configured retention horizon even if the caller
/// asked for an older `start_time`.
pub struct PartitionWalker {
	table: String,
	partition_size: Duration,
	lookback: Duration,
}

impl PartitionWalker {
	pub fn new(
		table: impl Into<String>,
		partition_size: Duration,
		lookback: Duration,
	) -> Self {
		Self {
			table: table.into(),
			partition_size,
			lookback,
		}
	}

	/// Returns each partition key paired with its window's start time, so
	/// callers can report `scanned_until` as they consume the walk.
	pub fn walk(
		&self,
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	) -> Vec<(PartitionKey, DateTime<Utc>)> {
		if end <= start {
			return Vec::new();
		}
		let lookback = chrono::Duration::from_std(self.lookback)
			.unwrap_or(chrono::Duration::zero());
		let floor = (end - lookback).max(start);
		let step = chrono::Duration::from_std(self.partition_size)
			.unwrap_or(chrono::Duration::seconds(600));

		let mut window_start = window_floor(end, self.partition_size);
		let mut windows = Vec::new();
		while window_start >= floor {
			let system_time: SystemTime = window_start.into();
			windows.push((
				PartitionKey::derive(&self.table, system_time),
				window_start,
			));
			window_start -= step;
		}
		windows
	}
}

fn window_floor(t: DateTime<Utc>, size: Duration) -> DateTime<Utc> {
	let size_secs = size.as_secs().max(1) as i64;
	let epoch_secs = t.timestamp();
	let floored = epoch_secs - epoch_secs.rem_euclid(size_secs);
	DateTime::from_timestamp(floored, 0).unwrap_or(t)
}
