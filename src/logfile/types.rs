use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Content-addressed identifier for a single time-window partition of a
/// table: sha1 of `"<table>:<window_start_unix_secs>"`, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey(pub String);

impl PartitionKey {
	pub fn derive(table: &str, window_start: SystemTime) -> Self {
		let secs = window_start
			.duration_since(UNIX_EPOCH)
			.unwrap_or_default()
			.as_secs();
		let mut hasher = Sha1::new();
		hasher.update(table.as_bytes());
		hasher.update(b":");
		hasher.update(secs.to_string().as_bytes());
		Self(hex::encode(hasher.finalize()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// A typed column value produced by the line parser or stored by the TSDB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ColumnValue {
	String(String),
	Int(i64),
	Float(f64),
	Bool(bool),
	Timestamp(i64),
	Null,
}

impl ColumnValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			ColumnValue::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			ColumnValue::Int(i) => Some(*i as f64),
			ColumnValue::Float(f) => Some(*f),
			ColumnValue::Timestamp(t) => Some(*t as f64),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
	pub id: u32,
	pub name: String,
	pub kind: ColumnKind,
}

/// A declared source or row field on a `LogfileDefinition`: the id is
/// persisted as part of the definition itself, so editing the regex's named
/// captures (`set_regex`) can never reassign an existing field's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
	pub id: u32,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: ColumnKind,
	#[serde(default)]
	pub format: Option<String>,
}

impl From<&FieldDef> for ColumnSchema {
	fn from(f: &FieldDef) -> Self {
		ColumnSchema {
			id: f.id,
			name: f.name.clone(),
			kind: f.kind,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
	String,
	Int,
	Float,
	Bool,
	Timestamp,
}

/// Derived from a `LogfileDefinition`. Field `1` is always `raw:string`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSchema {
	pub columns: Vec<ColumnSchema>,
}

impl RowSchema {
	pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
		self.columns.iter().find(|c| c.name == name)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
	pub table_name: String,
	pub schema: RowSchema,
	pub partition_size: Duration,
}

/// A single typed row, keyed by column name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row {
	pub columns: std::collections::BTreeMap<String, ColumnValue>,
}

impl Row {
	pub fn get(&self, name: &str) -> Option<&ColumnValue> {
		self.columns.get(name)
	}

	pub fn project(&self, names: &[String]) -> Row {
		Row {
			columns: names
				.iter()
				.filter_map(|n| {
					self.columns.get(n).map(|v| (n.clone(), v.clone()))
				})
				.collect(),
		}
	}
}

/// The only filter capability this engine supports: a single value
/// expression, compiled with `sqlparser`. Kept as a tagged enum (rather than
/// a bare string) so a future second dialect doesn't become a breaking wire
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
	Sql,
}

impl Default for ScanType {
	fn default() -> Self {
		ScanType::Sql
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogfileScanParams {
	pub table: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub start_time: chrono::DateTime<chrono::Utc>,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub end_time: chrono::DateTime<chrono::Utc>,
	pub columns: Vec<String>,
	#[serde(default)]
	pub condition: Option<String>,
	#[serde(default)]
	pub return_raw: bool,
	#[serde(default)]
	pub scan_type: ScanType,
	pub limit: usize,
}

impl LogfileScanParams {
	/// The column order a scan's result is projected onto: `time` always
	/// first, then `raw` iff `return_raw`, then the requested columns in
	/// the order the caller listed them.
	pub fn projection_order(&self) -> Vec<String> {
		let mut order = vec!["time".to_string()];
		if self.return_raw {
			order.push("raw".to_string());
		}
		for c in &self.columns {
			if c != "time" && c != "raw" {
				order.push(c.clone());
			}
		}
		order
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogfileScanResult {
	#[serde(default)]
	pub columns: Vec<String>,
	#[serde(default)]
	pub rows: Vec<Row>,
	#[serde(default)]
	pub rows_scanned: u64,
	#[serde(default)]
	pub scanned_until: Option<i64>,
	#[serde(default)]
	pub limit: usize,
}

impl LogfileScanResult {
	pub fn new(limit: usize) -> Self {
		Self {
			columns: Vec::new(),
			rows: Vec::new(),
			rows_scanned: 0,
			scanned_until: None,
			limit,
		}
	}

	pub fn is_full(&self) -> bool {
		self.rows.len() >= self.limit
	}

	/// Appends a row unless capacity has already been reached. Returns
	/// `None` once the result is full, signalling the scan loop to stop.
	pub fn add_row(&mut self, row: Row) -> Option<()> {
		if self.is_full() {
			return None;
		}
		self.rows.push(row);
		Some(())
	}

	pub fn merge(&mut self, other: LogfileScanResult) {
		if self.columns.is_empty() {
			self.columns = other.columns;
		}
		self.rows_scanned += other.rows_scanned;
		for row in other.rows {
			if self.add_row(row).is_none() {
				break;
			}
		}
	}
}
