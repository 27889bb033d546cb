use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
};
use thiserror::Error;

/// Maps onto the original service's exception classes: kNotFoundError,
/// kParseError, kIllegalStateError, kRuntimeError.
#[derive(Debug, Error)]
pub enum LogfileError {
	#[error("logfile not found: {0}")]
	NotFound(String),
	#[error("parse error: {0}")]
	ParseError(String),
	#[error("illegal state: {0}")]
	IllegalState(String),
	#[error("runtime error: {0}")]
	Runtime(String),
	#[error("unauthorized: {0}")]
	Unauthorized(String),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("upstream request error: {0}")]
	Upstream(#[from] reqwest::Error),
	#[error("all replicas failed for partition {partition}: {causes:?}")]
	AllReplicasFailed {
		partition: String,
		causes: Vec<String>,
	},
}

impl LogfileError {
	pub fn not_found(msg: impl Into<String>) -> Self {
		Self::NotFound(msg.into())
	}

	pub fn parse_error(msg: impl Into<String>) -> Self {
		Self::ParseError(msg.into())
	}

	pub fn illegal_state(msg: impl Into<String>) -> Self {
		Self::IllegalState(msg.into())
	}
}

impl IntoResponse for LogfileError {
	fn into_response(self) -> Response {
		let status = match &self {
			LogfileError::NotFound(_) => StatusCode::NOT_FOUND,
			LogfileError::ParseError(_) => StatusCode::BAD_REQUEST,
			LogfileError::IllegalState(_) => StatusCode::BAD_REQUEST,
			LogfileError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			LogfileError::Runtime(_)
			| LogfileError::Io(_)
			| LogfileError::Json(_)
			| LogfileError::Upstream(_)
			| LogfileError::AllReplicasFailed { .. } => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		};
		(status, self.to_string()).into_response()
	}
}
