//! Error types.
//!
//! Upstream failures are wrapped in a [`ToolError`] envelope that names the
//! tool, the (redacted) arguments and the project they were issued against,
//! so a failure can be diagnosed from the message alone. Truncation and
//! auto-limiting are never errors; they travel as warnings.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::budget::FormatTier;

/// Placeholder written over sensitive argument values.
pub const REDACTED: &str = "[redacted]";

/// Argument keys whose values never appear in error messages or logs.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "api_key",
    "apikey",
    "authorization",
    "service_role_key",
];

/// Failure reported by the management API collaborator.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// The request could not be addressed, e.g. a malformed project id.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl UpstreamError {
    /// Whether retrying the same read could succeed (rate limits, 5xx,
    /// connection trouble). Client errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Transport(_) => true,
            Self::Decode(_) | Self::InvalidRequest(_) => false,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// What went wrong inside a tool call.
#[derive(Debug, Error)]
pub enum ErrorCause {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("unknown tool")]
    UnknownTool,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Uniform error envelope for a failed tool call.
#[derive(Debug, Error)]
#[error("tool '{tool}' failed{}: {cause}", context_suffix(.project_id))]
pub struct ToolError {
    /// Tool that failed.
    pub tool: String,
    /// Arguments as received, with sensitive values redacted.
    pub params: Value,
    /// Project the call was issued against, when known.
    pub project_id: Option<String>,
    #[source]
    pub cause: ErrorCause,
}

impl ToolError {
    /// Wrap `cause`, redacting `params` and lifting `project_id` out of them.
    pub fn new(tool: impl Into<String>, params: &Value, cause: impl Into<ErrorCause>) -> Self {
        let project_id = params
            .get("project_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            tool: tool.into(),
            params: redact(params),
            project_id,
            cause: cause.into(),
        }
    }

    /// Whether the underlying failure was a transient upstream error.
    pub fn is_transient(&self) -> bool {
        matches!(&self.cause, ErrorCause::Upstream(e) if e.is_transient())
    }
}

fn context_suffix(project_id: &Option<String>) -> String {
    project_id
        .as_deref()
        .map(|id| format!(" (project {id})"))
        .unwrap_or_default()
}

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower == "token" || lower.ends_with("_token") || SENSITIVE_KEYS.iter().any(|s| lower.contains(s))
}

/// Copy of `params` with sensitive values replaced by [`REDACTED`].
pub fn redact(params: &Value) -> Value {
    match params {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_sensitive(k) {
                        (k.clone(), Value::String(REDACTED.into()))
                    } else {
                        (k.clone(), redact(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Invalid gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "tier budgets must not shrink: {coarse} has {coarse_tokens} tokens but {fine} has {fine_tokens}"
    )]
    NonMonotonicTiers {
        coarse: FormatTier,
        coarse_tokens: usize,
        fine: FormatTier,
        fine_tokens: usize,
    },
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}
