//! The management API as seen by the tools: one narrow call interface.
//!
//! Tools describe what they want as an [`Operation`]; an [`Upstream`]
//! implementation turns it into a request and hands back the raw JSON. The
//! projection pipeline treats that JSON as opaque.

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::UpstreamError;

/// Log source for `get_logs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum LogService {
    Api,
    Postgres,
    Auth,
    Storage,
    Realtime,
    EdgeFunction,
}

impl LogService {
    /// Analytics table holding this service's records.
    pub fn table(self) -> &'static str {
        match self {
            Self::Api => "edge_logs",
            Self::Postgres => "postgres_logs",
            Self::Auth => "auth_logs",
            Self::Storage => "storage_logs",
            Self::Realtime => "realtime_logs",
            Self::EdgeFunction => "function_edge_logs",
        }
    }
}

/// Advisor family for `get_advisors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorKind {
    Security,
    Performance,
}

impl AdvisorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Performance => "performance",
        }
    }
}

/// One management API operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ListTables { schemas: Vec<String> },
    ListExtensions,
    ListMigrations,
    ApplyMigration { name: String, query: String },
    ExecuteSql { query: String },
    GetLogs { service: LogService },
    GetAdvisors { kind: AdvisorKind },
    GenerateTypes { schemas: Vec<String> },
}

impl Operation {
    /// Whether the operation leaves the project unchanged, and so may be
    /// retried and cached.
    ///
    /// `ExecuteSql` counts as mutating even for a `SELECT`: the statement is
    /// caller-supplied and may call volatile functions.
    pub fn is_read_only(&self) -> bool {
        !matches!(self, Self::ApplyMigration { .. } | Self::ExecuteSql { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListTables { .. } => "list_tables",
            Self::ListExtensions => "list_extensions",
            Self::ListMigrations => "list_migrations",
            Self::ApplyMigration { .. } => "apply_migration",
            Self::ExecuteSql { .. } => "execute_sql",
            Self::GetLogs { .. } => "get_logs",
            Self::GetAdvisors { .. } => "get_advisors",
            Self::GenerateTypes { .. } => "generate_typescript_types",
        }
    }
}

/// An operation against one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub project_id: String,
    pub operation: Operation,
}

impl UpstreamRequest {
    pub fn new(project_id: impl Into<String>, operation: Operation) -> Self {
        Self {
            project_id: project_id.into(),
            operation,
        }
    }
}

impl fmt::Display for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.operation.name(), self.project_id)
    }
}

/// The remote management API.
///
/// Dropping the returned future abandons the call; implementations should
/// make that abort any in-flight request.
pub trait Upstream: Send + Sync {
    fn call<'a>(&'a self, request: &'a UpstreamRequest) -> BoxFuture<'a, Result<Value, UpstreamError>>;
}
