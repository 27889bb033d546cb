use crate::{
	collab::config_dir::LogfileDefinition,
	errors::LogfileError,
	logfile::{
		remote_scan::ScanPartitionRequest,
		types::{FieldDef, LogfileScanParams, LogfileScanResult, PartitionKey},
	},
	metrics, state,
};
use axum::{
	body::Body,
	extract::{Json, Query, Request, State},
	http::{HeaderMap, StatusCode},
	middleware::from_fn_with_state,
	routing::{any, get, post},
	Router,
};
use futures_util::TryStreamExt;
use http::Request as HttpRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	decompression::RequestDecompressionLayer,
	timeout::TimeoutLayer,
	trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{info, Span};

static SKIP_LOGGING_PATHS: [&str; 3] = ["/ready", "/metrics", "/api/echo"];

pub fn new_router(state: state::AppState) -> Router {
	let cfg = state.config.clone();
	let app = Router::new()
		.route("/ready", any(ok))
		.route("/metrics", get(metrics::export_metrics))
		.route("/api/v1/logfiles", get(list_logfiles))
		.route(
			"/api/v1/logfiles/get_definition",
			get(get_definition),
		)
		.route("/api/v1/logfiles/set_regex", post(set_regex))
		.route("/api/v1/logfiles/upload", post(upload))
		.route(
			"/api/v1/logfiles/scan_partition",
			post(scan_partition),
		)
		.route("/api/v1/logfiles/scan", get(scan))
		.fallback(handler_404)
		.with_state(state.clone())
		.layer(
			ServiceBuilder::new()
				.layer(
					TraceLayer::new_for_http()
						.on_request(
							|req: &HttpRequest<_>, _: &Span| {
								let p = req.uri().path();
								if SKIP_LOGGING_PATHS.contains(&p) {
									return;
								}
								info!(method = ?req.method(), path = p, query = req.uri().query(), "request received");
							}
						)
						.on_response(
							DefaultOnResponse::new()
								.level(tracing::Level::INFO),
						),
				)
				.layer(from_fn_with_state(state, metrics::record_middleware))
				.layer(TimeoutLayer::new(cfg.server.timeout))
				.layer(CompressionLayer::new())
				.layer(RequestDecompressionLayer::new()),
		);
	app
}

async fn ok() -> StatusCode {
	StatusCode::OK
}

async fn handler_404(req: Request) -> StatusCode {
	dbg!(req.uri());
	StatusCode::NOT_FOUND
}

#[derive(Debug, Deserialize)]
struct CustomerQuery {
	customer: String,
}

#[derive(Debug, Deserialize)]
struct LogfileQuery {
	customer: String,
	logfile: String,
}

/// The wire shape for a logfile definition: no `customer`, since the
/// customer is always the query's own scope, not part of the definition.
#[derive(Debug, Serialize)]
struct LogfileDefinitionView {
	name: String,
	regex: String,
	source_fields: Vec<FieldDef>,
	row_fields: Vec<FieldDef>,
}

impl From<LogfileDefinition> for LogfileDefinitionView {
	fn from(def: LogfileDefinition) -> Self {
		Self {
			name: def.name,
			regex: def.regex,
			source_fields: def.source_fields,
			row_fields: def.row_fields,
		}
	}
}

#[derive(Debug, Serialize)]
struct ListLogfilesResponse {
	logfile_definitions: Vec<LogfileDefinitionView>,
}

async fn list_logfiles(
	State(state): State<state::AppState>,
	Query(q): Query<CustomerQuery>,
) -> Result<Json<ListLogfilesResponse>, LogfileError> {
	let defs = state.registry.list(&q.customer).await?;
	Ok(Json(ListLogfilesResponse {
		logfile_definitions: defs.into_iter().map(Into::into).collect(),
	}))
}

async fn get_definition(
	State(state): State<state::AppState>,
	Query(q): Query<LogfileQuery>,
) -> Result<Json<LogfileDefinitionView>, LogfileError> {
	let def = state.registry.find(&q.customer, &q.logfile).await?;
	Ok(Json(def.into()))
}

#[derive(Debug, Deserialize)]
struct SetRegexQuery {
	customer: String,
	logfile: String,
	regex: String,
}

async fn set_regex(
	State(state): State<state::AppState>,
	Query(q): Query<SetRegexQuery>,
) -> Result<(StatusCode, &'static str), LogfileError> {
	state
		.registry
		.set_regex(&q.customer, &q.logfile, q.regex)
		.await?;
	Ok((StatusCode::CREATED, "ok"))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
	rows_inserted: u64,
	lines_dropped: u64,
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
	customer: String,
	logfile: String,
	/// Comma-separated `key:value` pairs seeded as constant columns onto
	/// every row ingested from this call, e.g. `host:web-1,env:prod`.
	#[serde(default)]
	source_fields: Option<String>,
}

fn parse_source_fields(raw: Option<&str>) -> HashMap<String, String> {
	raw.map(|s| {
		s.split(',')
			.filter_map(|pair| pair.split_once(':'))
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	})
	.unwrap_or_default()
}

async fn upload(
	State(state): State<state::AppState>,
	Query(q): Query<UploadQuery>,
	body: Body,
) -> Result<Json<UploadResponse>, LogfileError> {
	let def = state.registry.find(&q.customer, &q.logfile).await?;
	let source_fields = parse_source_fields(q.source_fields.as_deref());
	let stream = body
		.into_data_stream()
		.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
	let reader = tokio_util::io::StreamReader::new(stream);
	let report = state
		.ingestion
		.ingest(&def, &source_fields, reader)
		.await?;
	Ok(Json(UploadResponse {
		rows_inserted: report.rows_inserted,
		lines_dropped: report.lines_dropped,
	}))
}

#[derive(Debug, Deserialize)]
struct ScanQuery {
	customer: String,
	logfile: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	start_time: chrono::DateTime<chrono::Utc>,
	#[serde(with = "chrono::serde::ts_seconds")]
	end_time: chrono::DateTime<chrono::Utc>,
	#[serde(default)]
	columns: Option<String>,
	#[serde(default)]
	condition: Option<String>,
	#[serde(default)]
	return_raw: bool,
	#[serde(default = "default_limit")]
	limit: usize,
}

fn default_limit() -> usize {
	1000
}

async fn scan(
	State(state): State<state::AppState>,
	Query(q): Query<ScanQuery>,
) -> Result<Json<LogfileScanResult>, LogfileError> {
	let def = state.registry.find(&q.customer, &q.logfile).await?;
	let table = crate::logfile::schema::table_name(&def);
	let params = LogfileScanParams {
		table,
		start_time: q.start_time,
		end_time: q.end_time,
		columns: q
			.columns
			.map(|c| c.split(',').map(str::to_string).collect())
			.unwrap_or_default(),
		condition: q.condition,
		return_raw: q.return_raw,
		scan_type: Default::default(),
		limit: q.limit,
	};
	let result = state
		.coordinator
		.scan(
			&q.customer,
			&params,
			state.config.ingest.partition_size,
			state.config.ingest.lookback,
			None,
		)
		.await?;
	Ok(Json(result))
}

/// RPC entry point peers call into for `LocalScanAdapter::scan` against a
/// single partition this node holds — the counterpart of
/// `RemoteScanAdapter::scan`'s outbound request.
async fn scan_partition(
	State(state): State<state::AppState>,
	headers: HeaderMap,
	Json(req): Json<ScanPartitionRequest>,
) -> Result<Json<LogfileScanResult>, LogfileError> {
	let token = headers
		.get(http::header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Token "))
		.ok_or_else(|| {
			LogfileError::Unauthorized("missing Authorization header".into())
		})?;
	state.auth.verify(token)?;

	let params = LogfileScanParams {
		table: req.table.clone(),
		start_time: chrono::DateTime::from_timestamp(req.start_time, 0)
			.unwrap_or_default(),
		end_time: chrono::DateTime::from_timestamp(req.end_time, 0)
			.unwrap_or_default(),
		columns: req.columns,
		condition: req.condition,
		return_raw: req.return_raw,
		scan_type: req.scan_type,
		limit: req.limit,
	};
	let partition = PartitionKey(req.partition);
	let mut result = LogfileScanResult::new(req.limit);
	state
		.local_scan
		.scan(&partition, &params, &mut result)
		.await?;
	Ok(Json(result))
}
