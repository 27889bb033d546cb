use crate::{errors::LogfileError, logfile::types::FieldDef};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

/// A customer-declared logfile: a name, a schema-producing regex, a list of
/// caller-supplied constant fields (`source_fields`) and a list of fields
/// extracted from the regex's named captures (`row_fields`), one of which
/// must be named `time`. Every field carries an id that is persisted here,
/// not derived from capture order, so `set_regex` can never reassign one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogfileDefinition {
	pub customer: String,
	pub name: String,
	pub regex: String,
	#[serde(default)]
	pub source_fields: Vec<FieldDef>,
	#[serde(default)]
	pub row_fields: Vec<FieldDef>,
}

/// Resolves `(customer, logfile) -> LogfileDefinition` and lets the regex be
/// rewritten in place. One JSON document per customer on disk in the
/// reference implementation, matching `config::AppConfig`'s own
/// file-backed loading.
#[async_trait]
pub trait ConfigDirectory: Send + Sync {
	async fn find(
		&self,
		customer: &str,
		name: &str,
	) -> Result<Option<LogfileDefinition>, LogfileError>;

	async fn list(
		&self,
		customer: &str,
	) -> Result<Vec<LogfileDefinition>, LogfileError>;

	async fn set_regex(
		&self,
		customer: &str,
		name: &str,
		regex: String,
	) -> Result<(), LogfileError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CustomerDocument {
	logfiles: Vec<LogfileDefinition>,
}

/// Read-through-and-cache directory backed by `<dir>/<customer>.json`.
pub struct FileConfigDirectory {
	dir: PathBuf,
	cache: Arc<DashMap<String, CustomerDocument>>,
}

impl FileConfigDirectory {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			cache: Arc::new(DashMap::new()),
		}
	}

	async fn load(
		&self,
		customer: &str,
	) -> Result<CustomerDocument, LogfileError> {
		if let Some(doc) = self.cache.get(customer) {
			return Ok(doc.clone());
		}
		let path = self.dir.join(format!("{customer}.json"));
		let doc = match tokio::fs::read(&path).await {
			Ok(bytes) => serde_json::from_slice(&bytes)?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				CustomerDocument::default()
			}
			Err(e) => return Err(e.into()),
		};
		self.cache.insert(customer.to_string(), doc.clone());
		Ok(doc)
	}

	async fn store(
		&self,
		customer: &str,
		doc: CustomerDocument,
	) -> Result<(), LogfileError> {
		tokio::fs::create_dir_all(&self.dir).await?;
		let path = self.dir.join(format!("{customer}.json"));
		let bytes = serde_json::to_vec_pretty(&doc)?;
		tokio::fs::write(path, bytes).await?;
		self.cache.insert(customer.to_string(), doc);
		Ok(())
	}
}

#[async_trait]
impl ConfigDirectory for FileConfigDirectory {
	async fn find(
		&self,
		customer: &str,
		name: &str,
	) -> Result<Option<LogfileDefinition>, LogfileError> {
		let doc = self.load(customer).await?;
		Ok(doc.logfiles.into_iter().find(|d| d.name == name))
	}

	async fn list(
		&self,
		customer: &str,
	) -> Result<Vec<LogfileDefinition>, LogfileError> {
		Ok(self.load(customer).await?.logfiles)
	}

	async fn set_regex(
		&self,
		customer: &str,
		name: &str,
		regex: String,
	) -> Result<(), LogfileError> {
		let mut doc = self.load(customer).await?;
		let def = doc
			.logfiles
			.iter_mut()
			.find(|d| d.name == name)
			.ok_or_else(|| {
				LogfileError::not_found(format!(
					"logfile {customer}/{name}"
				))
			})?;
		def.regex = regex;
		self.store(customer, doc).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logfile::types::ColumnKind;

	fn def(customer: &str, name: &str) -> LogfileDefinition {
		LogfileDefinition {
			customer: customer.to_string(),
			name: name.to_string(),
			regex: r"(?P<time>\S+) (?P<msg>.*)".to_string(),
			source_fields: vec![],
			row_fields: vec![
				FieldDef {
					id: 2,
					name: "time".to_string(),
					kind: ColumnKind::Timestamp,
					format: None,
				},
				FieldDef {
					id: 3,
					name: "msg".to_string(),
					kind: ColumnKind::String,
					format: None,
				},
			],
		}
	}

	#[tokio::test]
	async fn find_missing_customer_returns_none() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = FileConfigDirectory::new(tmp.path());
		assert!(dir.find("acme", "access").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn set_regex_round_trips() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = FileConfigDirectory::new(tmp.path());
		dir.store(
			"acme",
			CustomerDocument {
				logfiles: vec![def("acme", "access")],
			},
		)
		.await
		.unwrap();
		dir.set_regex("acme", "access", "(?P<new>.*)".to_string())
			.await
			.unwrap();
		let got = dir.find("acme", "access").await.unwrap().unwrap();
		assert_eq!(got.regex, "(?P<new>.*)");
		assert_eq!(got.customer, "acme");
		assert_eq!(got.name, "access");
	}

	#[tokio::test]
	async fn set_regex_on_missing_logfile_is_not_found() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = FileConfigDirectory::new(tmp.path());
		let err = dir
			.set_regex("acme", "nope", "x".to_string())
			.await
			.unwrap_err();
		assert!(matches!(err, LogfileError::NotFound(_)));
	}
}
