use http::StatusCode;
use http_body_util::combinators::BoxBody;
use hyper::Response;
use hyper::body::Bytes;
use serde_json::{Value, json};
use shared::http::json_response;
use thiserror::Error;

/// Failure of a single upstream call.
///
/// These never cross the aggregation boundary as errors: the executor records
/// them per resource and only the affected fields are dropped.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream responded with status {status}")]
    Status { status: StatusCode, body: Value },

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("upstream task failed: {0}")]
    TaskFailed(String),
}

impl UpstreamError {
    /// Short tag used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Status { .. } => "status",
            UpstreamError::Timeout => "timeout",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::InvalidUrl(_) => "invalid_url",
            UpstreamError::TaskFailed(_) => "task_failed",
        }
    }

    /// The upstream HTTP status, when the upstream answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The upstream body when there is one, otherwise the error message.
    pub fn details(&self) -> Value {
        match self {
            UpstreamError::Status { body, .. } => body.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

/// Errors produced by the aggregation engine itself.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Invalid or missing id parameter")]
    InvalidSubject,

    #[error("Server configuration error: missing session credential")]
    MissingCredentials,

    #[error("No valid or available fields requested")]
    NoValidFields,

    /// Every planned resource failed.
    #[error("Failed to fetch player data")]
    TotalFailure {
        upstream_status: Option<StatusCode>,
        details: Value,
    },
}

impl AggregateError {
    pub fn status(&self) -> StatusCode {
        match self {
            AggregateError::InvalidSubject | AggregateError::NoValidFields => {
                StatusCode::BAD_REQUEST
            }
            AggregateError::MissingCredentials | AggregateError::TotalFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AggregateError::InvalidSubject | AggregateError::NoValidFields => {
                json!({ "error": self.to_string() })
            }
            AggregateError::MissingCredentials => json!({
                "error": self.to_string(),
                "details": "No session credential was configured for the upstream",
            }),
            AggregateError::TotalFailure {
                upstream_status,
                details,
            } => {
                let mut body = json!({ "error": self.to_string(), "details": details });
                if let Some(status) = upstream_status {
                    body["upstreamStatus"] = json!(status.as_u16());
                }
                body
            }
        }
    }
}

/// Errors that can occur while serving a request
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Server configuration error: missing session credential")]
    MissingCredentials,

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// A single-upstream call failed; `context` names what was being fetched.
    #[error("{context}")]
    Upstream {
        context: String,
        #[source]
        source: UpstreamError,
    },

    #[error("No route matched for request")]
    NoRouteMatched,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn upstream(context: impl Into<String>, source: UpstreamError) -> Self {
        GatewayError::Upstream {
            context: context.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) | GatewayError::RequestBodyError(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Aggregate(e) => e.status(),
            GatewayError::Upstream { source, .. } => match source {
                UpstreamError::Status { status, .. } => *status,
                UpstreamError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::NoRouteMatched => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::MissingCredentials
            | GatewayError::HttpClientError(_)
            | GatewayError::InternalError(_)
            | GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            GatewayError::Aggregate(e) => e.to_json(),
            GatewayError::Upstream { context, source } => json!({
                "error": context,
                "details": source.details(),
            }),
            other => json!({ "error": other.to_string() }),
        }
    }

    pub fn into_response<E>(self) -> Response<BoxBody<Bytes, E>> {
        json_response(self.status(), &self.to_json())
    }
}
