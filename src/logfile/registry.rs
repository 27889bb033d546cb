use crate::{
	collab::config_dir::{ConfigDirectory, LogfileDefinition},
	errors::LogfileError,
};
use std::sync::Arc;

/// Resolves `(customer, logfile) -> LogfileDefinition` and mutates the
/// regex in place. A thin façade over the config directory collaborator;
/// kept as its own component since callers (ingest, scan, admin routes)
/// only ever need this narrow surface, not the full directory contract.
pub struct LogfileRegistry {
	dir: Arc<dyn ConfigDirectory>,
}

impl LogfileRegistry {
	pub fn new(dir: Arc<dyn ConfigDirectory>) -> Self {
		Self { dir }
	}

	pub async fn find(
		&self,
		customer: &str,
		name: &str,
	) -> Result<LogfileDefinition, LogfileError> {
		self.dir.find(customer, name).await?.ok_or_else(|| {
			LogfileError::not_found(format!("logfile {customer}/{name}"))
		})
	}

	pub async fn list(
		&self,
		customer: &str,
	) -> Result<Vec<LogfileDefinition>, LogfileError> {
		self.dir.list(customer).await
	}

	pub async fn set_regex(
		&self,
		customer: &str,
		name: &str,
		regex: String,
	) -> Result<(), LogfileError> {
		// No regex-syntax validation here: an invalid pattern only
		// surfaces as a parse failure the next time a line is ingested.
		self.dir.set_regex(customer, name, regex).await
	}
}
