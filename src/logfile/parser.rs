use crate::{
	collab::config_dir::LogfileDefinition,
	errors::LogfileError,
	logfile::types::{ColumnKind, ColumnValue, Row},
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::collections::HashMap;

/// A row field whose name matched a named capture in the logfile's regex,
/// resolved once at construction time.
struct MatchedField {
	name: String,
	kind: ColumnKind,
	format: Option<String>,
}

/// Applies a logfile's regex to one raw line and builds a typed row. Lines
/// that don't match the regex, or whose `time` capture can't be parsed, are
/// dropped, not an error — mirrors the original service's "skip
/// unparseable lines" ingestion semantics.
pub struct LineParser {
	regex: Regex,
	matched_fields: Vec<MatchedField>,
	time_format: Option<String>,
}

impl LineParser {
	pub fn new(def: &LogfileDefinition) -> Result<Self, LogfileError> {
		let regex = Regex::new(&def.regex)
			.map_err(|e| LogfileError::parse_error(e.to_string()))?;

		let capture_names: Vec<&str> =
			regex.capture_names().flatten().collect();

		let mut matched_fields = Vec::new();
		let mut time_format = None;
		let mut has_time = false;
		for field in &def.row_fields {
			if !capture_names.contains(&field.name.as_str()) {
				continue;
			}
			if field.name == "time" {
				has_time = true;
				time_format = field.format.clone();
			}
			matched_fields.push(MatchedField {
				name: field.name.clone(),
				kind: field.kind,
				format: field.format.clone(),
			});
		}

		if !has_time {
			return Err(LogfileError::illegal_state(format!(
				"logfile '{}' can't import rows without a 'time' column",
				def.name
			)));
		}

		Ok(Self {
			regex,
			matched_fields,
			time_format,
		})
	}

	/// Returns `Ok(None)` when the line doesn't match, or its `time` capture
	/// can't be parsed — a silent drop, not a parse error, per the ingestion
	/// error taxonomy. `source_fields` are caller-supplied constant values
	/// seeded into every row produced from this call.
	pub fn parse(
		&self,
		line: &str,
		source_fields: &HashMap<String, String>,
	) -> Result<Option<Row>, LogfileError> {
		let Some(caps) = self.regex.captures(line) else {
			return Ok(None);
		};

		let mut row = Row::default();
		row.columns
			.insert("raw".to_string(), ColumnValue::String(line.to_string()));

		for (name, value) in source_fields {
			row.columns
				.insert(name.clone(), ColumnValue::String(value.clone()));
		}

		for field in &self.matched_fields {
			let Some(m) = caps.name(&field.name) else {
				continue;
			};
			let raw = m.as_str();

			let value = if field.name == "time" {
				match self.parse_time(raw)? {
					Some(ts) => ColumnValue::Timestamp(ts),
					None => return Ok(None),
				}
			} else {
				self.convert(field.kind, field.format.as_deref(), raw)?
			};
			row.columns.insert(field.name.clone(), value);
		}

		Ok(Some(row))
	}

	fn convert(
		&self,
		kind: ColumnKind,
		format: Option<&str>,
		raw: &str,
	) -> Result<ColumnValue, LogfileError> {
		Ok(match kind {
			ColumnKind::String => ColumnValue::String(raw.to_string()),
			ColumnKind::Int => raw
				.parse::<i64>()
				.map(ColumnValue::Int)
				.unwrap_or(ColumnValue::Null),
			ColumnKind::Float => raw
				.parse::<f64>()
				.map(ColumnValue::Float)
				.unwrap_or(ColumnValue::Null),
			ColumnKind::Bool => raw
				.parse::<bool>()
				.map(ColumnValue::Bool)
				.unwrap_or(ColumnValue::Null),
			ColumnKind::Timestamp => match self.parse_with(format, raw)? {
				Some(ts) => ColumnValue::Timestamp(ts),
				None => ColumnValue::Null,
			},
		})
	}

	/// Parses the time capture according to an explicit `time_format` if the
	/// definition's `time` row field declares one; otherwise tries RFC
	/// 3339/2822 and a short list of common absolute layouts (Apache/nginx
	/// combined log, syslog), the way a hand-rolled "human time" heuristic
	/// would. Returns `None` if nothing matches, causing the line to be
	/// dropped.
	fn parse_time(&self, raw: &str) -> Result<Option<i64>, LogfileError> {
		self.parse_with(self.time_format.as_deref(), raw)
	}

	fn parse_with(
		&self,
		format: Option<&str>,
		raw: &str,
	) -> Result<Option<i64>, LogfileError> {
		if let Some(fmt) = format {
			return Ok(NaiveDateTime::parse_from_str(raw, fmt)
				.ok()
				.map(|ndt| Utc.from_utc_datetime(&ndt).timestamp()));
		}

		if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
			return Ok(Some(dt.with_timezone(&Utc).timestamp()));
		}
		if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
			return Ok(Some(dt.with_timezone(&Utc).timestamp()));
		}
		for fmt in [
			"%Y-%m-%d %H:%M:%S%.f",
			"%Y-%m-%dT%H:%M:%S%.f",
			"%d/%b/%Y:%H:%M:%S %z",
		] {
			if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
				return Ok(Some(dt.with_timezone(&Utc).timestamp()));
			}
			if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
				return Ok(Some(Utc.from_utc_datetime(&ndt).timestamp()));
			}
		}
		// syslog layout has no year; assume the current one.
		let this_year = Utc::now().format("%Y").to_string();
		if let Ok(ndt) = NaiveDateTime::parse_from_str(
			&format!("{this_year} {raw}"),
			"%Y %b %d %H:%M:%S",
		) {
			return Ok(Some(Utc.from_utc_datetime(&ndt).timestamp()));
		}
		Ok(None)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logfile::types::FieldDef;

	fn no_source_fields() -> HashMap<String, String> {
		HashMap::new()
	}

	fn def(regex: &str, row_fields: Vec<FieldDef>) -> LogfileDefinition {
		LogfileDefinition {
			customer: "acme".to_string(),
			name: "access".to_string(),
			regex: regex.to_string(),
			source_fields: vec![],
			row_fields,
		}
	}

	fn time_field() -> FieldDef {
		FieldDef {
			id: 2,
			name: "time".to_string(),
			kind: ColumnKind::Timestamp,
			format: None,
		}
	}

	#[test]
	fn matching_line_produces_row_with_raw_and_captures() {
		let def = def(
			r"(?P<time>\S+) (?P<status>\d+) (?P<path>\S+)",
			vec![
				time_field(),
				FieldDef {
					id: 3,
					name: "status".to_string(),
					kind: ColumnKind::String,
					format: None,
				},
			],
		);
		let parser = LineParser::new(&def).unwrap();
		let row = parser
			.parse(
				"2024-01-01T00:00:00Z 200 /index.html",
				&no_source_fields(),
			)
			.unwrap()
			.unwrap();
		assert_eq!(
			row.get("raw"),
			Some(&ColumnValue::String(
				"2024-01-01T00:00:00Z 200 /index.html".to_string()
			))
		);
		assert_eq!(
			row.get("status"),
			Some(&ColumnValue::String("200".to_string()))
		);
	}

	#[test]
	fn source_fields_are_seeded_as_constants_on_every_row() {
		let def = def(r"(?P<time>\S+) (?P<msg>.*)", vec![time_field()]);
		let parser = LineParser::new(&def).unwrap();
		let mut source_fields = HashMap::new();
		source_fields.insert("host".to_string(), "web-1".to_string());
		let row = parser
			.parse("2024-01-01T00:00:00Z hello", &source_fields)
			.unwrap()
			.unwrap();
		assert_eq!(
			row.get("host"),
			Some(&ColumnValue::String("web-1".to_string()))
		);
	}

	#[test]
	fn non_matching_line_is_silently_dropped() {
		let def = def(
			r"(?P<time>\S+) (?P<status>\d+) (?P<path>\S+)",
			vec![time_field()],
		);
		let parser = LineParser::new(&def).unwrap();
		assert!(parser
			.parse("not a log line", &no_source_fields())
			.unwrap()
			.is_none());
	}

	#[test]
	fn missing_time_row_field_is_rejected_at_construction() {
		let def = def(
			r"(?P<status>\d+) (?P<path>\S+)",
			vec![FieldDef {
				id: 2,
				name: "status".to_string(),
				kind: ColumnKind::String,
				format: None,
			}],
		);
		let err = LineParser::new(&def).unwrap_err();
		assert!(matches!(err, LogfileError::IllegalState(_)));
	}

	#[test]
	fn time_row_field_not_present_in_regex_is_rejected() {
		let def = def(r"(?P<status>\d+) (?P<path>\S+)", vec![time_field()]);
		let err = LineParser::new(&def).unwrap_err();
		assert!(matches!(err, LogfileError::IllegalState(_)));
	}

	#[test]
	fn rfc3339_time_field_parses_to_timestamp() {
		let def = def(r"(?P<time>\S+) (?P<msg>.*)", vec![time_field()]);
		let parser = LineParser::new(&def).unwrap();
		let row = parser
			.parse("2024-01-01T00:00:00Z hello", &no_source_fields())
			.unwrap()
			.unwrap();
		assert_eq!(row.get("time"), Some(&ColumnValue::Timestamp(1704067200)));
	}

	#[test]
	fn unparseable_time_field_drops_the_line() {
		let def = def(r"(?P<time>\S+) (?P<msg>.*)", vec![time_field()]);
		let parser = LineParser::new(&def).unwrap();
		assert!(parser
			.parse("not-a-timestamp hello", &no_source_fields())
			.unwrap()
			.is_none());
	}

	#[test]
	fn declared_int_field_is_typed_on_extraction() {
		let def = def(
			r"(?P<time>\S+) (?P<status>\d+)",
			vec![
				time_field(),
				FieldDef {
					id: 3,
					name: "status".to_string(),
					kind: ColumnKind::Int,
					format: None,
				},
			],
		);
		let parser = LineParser::new(&def).unwrap();
		let row = parser
			.parse("2024-01-01T00:00:00Z 200", &no_source_fields())
			.unwrap()
			.unwrap();
		assert_eq!(row.get("status"), Some(&ColumnValue::Int(200)));
	}
}
