use crate::{
	collab::{config_dir::LogfileDefinition, storage::TsdbStorage},
	errors::LogfileError,
	logfile::{
		parser::LineParser,
		schema,
		types::{ColumnValue, PartitionKey, Row},
	},
};
use chrono::Utc;
use rand::RngCore;
use std::{
	collections::HashMap, sync::Arc, time::Duration, time::SystemTime,
};
use tokio::io::{AsyncBufReadExt, AsyncRead};

/// Generates the 160-bit record ids assigned to ingested rows. Injected
/// so ingestion tests can be deterministic instead of depending on an
/// actual source of randomness.
pub trait RecordIdGenerator: Send + Sync {
	fn next_id(&self) -> [u8; 20];
}

pub struct RandomRecordIdGenerator;

impl RecordIdGenerator for RandomRecordIdGenerator {
	fn next_id(&self) -> [u8; 20] {
		let mut bytes = [0u8; 20];
		rand::thread_rng().fill_bytes(&mut bytes);
		bytes
	}
}

/// Drives raw lines through the line parser, batches resulting rows, and
/// flushes each batch (and any remainder at EOF) to storage. Ingestion is
/// at-least-once: a flush failure partway through a stream is propagated
/// to the caller, who may retry the remaining lines, but rows already
/// committed are not rolled back.
pub struct IngestionPipeline {
	storage: Arc<dyn TsdbStorage>,
	id_gen: Arc<dyn RecordIdGenerator>,
	partition_size: Duration,
	batch_size: usize,
}

#[derive(Debug, Default)]
pub struct IngestReport {
	pub rows_inserted: u64,
	pub lines_dropped: u64,
}

impl IngestionPipeline {
	pub fn new(
		storage: Arc<dyn TsdbStorage>,
		id_gen: Arc<dyn RecordIdGenerator>,
		partition_size: Duration,
		batch_size: usize,
	) -> Self {
		Self {
			storage,
			id_gen,
			partition_size,
			batch_size: batch_size.max(1),
		}
	}

	/// Drives `lines` through the parser, seeding `source_fields` as
	/// constants onto every row, and flushes to storage in batches of
	/// `batch_size` (plus any remainder at EOF).
	pub async fn ingest<R: AsyncRead + Unpin>(
		&self,
		def: &LogfileDefinition,
		source_fields: &HashMap<String, String>,
		lines: R,
	) -> Result<IngestReport, LogfileError> {
		let table = schema::table_name(def);
		let parser = LineParser::new(def)?;

		let mut report = IngestReport::default();
		let mut batch: Vec<(PartitionKey, Row)> =
			Vec::with_capacity(self.batch_size);
		let mut reader = tokio::io::BufReader::new(lines).lines();

		while let Some(line) = reader.next_line().await? {
			let Some(mut row) = parser.parse(&line, source_fields)? else {
				report.lines_dropped += 1;
				continue;
			};

			row.columns.insert(
				"_id".to_string(),
				ColumnValue::String(hex::encode(self.id_gen.next_id())),
			);

			let window = partition_window(&row, self.partition_size);
			let partition = PartitionKey::derive(&table, window);
			batch.push((partition, row));

			if batch.len() >= self.batch_size {
				let flushed = batch.len() as u64;
				self.flush(&table, std::mem::take(&mut batch)).await?;
				report.rows_inserted += flushed;
			}
		}

		let remainder = batch.len() as u64;
		if remainder > 0 {
			self.flush(&table, batch).await?;
			report.rows_inserted += remainder;
		}

		Ok(report)
	}

	async fn flush(
		&self,
		table: &str,
		batch: Vec<(PartitionKey, Row)>,
	) -> Result<(), LogfileError> {
		let mut by_partition: std::collections::HashMap<PartitionKey, Vec<Row>> =
			std::collections::HashMap::new();
		for (partition, row) in batch {
			by_partition.entry(partition).or_default().push(row);
		}
		for (partition, rows) in by_partition {
			self.storage.insert_rows(table, &partition, rows).await?;
		}
		Ok(())
	}
}

fn partition_window(row: &Row, partition_size: Duration) -> SystemTime {
	let ts = row
		.get("time")
		.and_then(|v| match v {
			ColumnValue::Timestamp(t) => Some(*t),
			_ => None,
		})
		.unwrap_or_else(|| Utc::now().timestamp());
	let size_secs = partition_size.as_secs().max(1) as i64;
	let floored = ts - ts.rem_euclid(size_secs);
	SystemTime::UNIX_EPOCH + Duration::from_secs(floored.max(0) as u64)
}
