use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::{env, net::SocketAddr, str::FromStr, time::Duration};
use tracing_subscriber::filter::Builder;
use validator::{Validate, ValidationError};

#[derive(Clone, Deserialize, Validate)]
pub struct AppConfig {
	#[validate(nested)]
	pub server: Server,
	#[validate(nested)]
	pub cluster: Cluster,
	#[serde(default = "default_ingest")]
	#[validate(nested)]
	pub ingest: Ingest,
	#[validate(nested)]
	pub auth: Auth,
	pub config_dir: ConfigDir,
}

#[derive(Clone, Deserialize, Validate)]
pub struct Server {
	#[validate(custom(function = "validate_ip_addr"))]
	pub listen_addr: String,
	#[serde(with = "humantime_serde")]
	pub timeout: Duration,
	#[validate(nested)]
	pub log: Log,
}

fn validate_ip_addr(addr: &str) -> Result<(), ValidationError> {
	SocketAddr::from_str(addr)
		.map_err(|_| ValidationError::new("invalid bind address"))
		.map(|_| ())
}

#[derive(Clone, Deserialize, Validate)]
pub struct Log {
	pub file: String,
	// see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives
	#[validate(custom(function = "validate_log_filter_directives"))]
	pub filter_directives: String,
}

impl Default for Log {
	fn default() -> Self {
		Self {
			file: "stdout".to_string(),
			filter_directives: "info".to_string(),
		}
	}
}

fn validate_log_filter_directives(dirs: &str) -> Result<(), ValidationError> {
	Builder::default()
		.parse(dirs)
		.map_err(|_| ValidationError::new("invalid log filter directives"))
		.map(|_| ())
}

/// This node's place in the replica topology. Every node serves both
/// local partitions and forwards to `peers` for partitions it doesn't hold.
#[derive(Clone, Deserialize, Validate)]
pub struct Cluster {
	/// Address peers use to reach this node, e.g. "10.0.0.4:7000".
	pub self_addr: String,
	#[serde(default)]
	pub peers: Vec<String>,
}

#[derive(Clone, Deserialize, Validate)]
pub struct Ingest {
	#[serde(default = "default_batch_size")]
	pub batch_size: usize,
	#[serde(with = "humantime_serde", default = "default_lookback")]
	pub lookback: Duration,
	#[serde(with = "humantime_serde", default = "default_partition_size")]
	pub partition_size: Duration,
}

fn default_ingest() -> Ingest {
	Ingest {
		batch_size: default_batch_size(),
		lookback: default_lookback(),
		partition_size: default_partition_size(),
	}
}

const fn default_batch_size() -> usize {
	1024
}

const fn default_lookback() -> Duration {
	Duration::from_secs(90 * 24 * 60 * 60)
}

const fn default_partition_size() -> Duration {
	Duration::from_secs(10 * 60)
}

#[derive(Clone, Deserialize, Validate)]
pub struct Auth {
	/// Shared secret used to sign/verify inter-node session tokens.
	#[validate(length(min = 16))]
	pub shared_secret: String,
}

#[derive(Clone, Deserialize, Validate)]
pub struct ConfigDir {
	/// Directory holding one `<customer>.json` document per customer.
	pub path: String,
}

impl AppConfig {
	pub fn new() -> Result<Self, ConfigError> {
		let default_config =
			env::var("LOGSCAN_CONFIG").unwrap_or("config.yaml".to_string());
		Config::builder()
			.add_source(File::with_name(&default_config))
			.build()?
			.try_deserialize()
	}
}
