use crate::{
	collab::config_dir::LogfileDefinition,
	logfile::types::{ColumnKind, ColumnSchema, RowSchema, TableDefinition},
};
use std::time::Duration;

const DEFAULT_PARTITION_SIZE: Duration = Duration::from_secs(10 * 60);

/// Derives a row schema from a logfile definition: field `1` is always
/// `raw:string`, followed by the declared `source_fields` and then the
/// declared `row_fields`, each keeping the id persisted on the definition.
/// Unlike deriving ids from regex capture order, editing the regex with
/// `set_regex` can never reassign an existing field's id this way.
pub fn schema_for(def: &LogfileDefinition) -> RowSchema {
	let mut columns = vec![ColumnSchema {
		id: 1,
		name: "raw".to_string(),
		kind: ColumnKind::String,
	}];
	columns.extend(def.source_fields.iter().map(ColumnSchema::from));
	columns.extend(def.row_fields.iter().map(ColumnSchema::from));
	RowSchema { columns }
}

/// Table name convention: `logs.<logfile_name>`.
pub fn table_name(def: &LogfileDefinition) -> String {
	format!("logs.{}", def.name)
}

pub fn table_definition_for(def: &LogfileDefinition) -> TableDefinition {
	TableDefinition {
		table_name: table_name(def),
		schema: schema_for(def),
		partition_size: DEFAULT_PARTITION_SIZE,
	}
}

/// The authoritative logfile-name-to-backing-table mapping for a whole
/// customer: one `TableDefinition` per logfile, in definition order.
pub fn table_definitions_for(defs: &[LogfileDefinition]) -> Vec<TableDefinition> {
	defs.iter().map(table_definition_for).collect()
}
