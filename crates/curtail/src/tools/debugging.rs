//! Debugging tools: service logs and advisor lints.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::context::ToolContext;
use super::core::{CacheClass, Tool, ToolFuture, parse_args};
use super::names;
use crate::api::{AdvisorKind, LogService, Operation, UpstreamRequest};
use crate::budget::{FormatTier, ResponseSize};
use crate::projection::{EntityKind, FilterSpec};
use crate::{ToolDef, json_schema_for};

/// Pull the `field` array out of an upstream envelope like
/// `{"result": [...], "error": null}`. Anything else passes through.
fn unwrap_envelope(raw: Value, field: &str) -> (Value, Option<Value>) {
    match raw {
        Value::Object(mut map) if map.contains_key(field) => {
            let inner = map.remove(field).unwrap_or(Value::Null);
            let error = map.remove("error").filter(|e| !e.is_null());
            (inner, error)
        }
        other => (other, None),
    }
}

fn error_note(error: &Value) -> String {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    format!("Log query reported an error: {message}")
}

// ── get_logs ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetLogsArgs {
    pub project_id: String,
    /// Service whose logs to fetch.
    pub service: LogService,
    /// `small` returns timestamps and short messages only.
    #[serde(default)]
    pub max_response_size: ResponseSize,
    #[serde(default)]
    pub max_items: Option<usize>,
}

pub struct GetLogs {
    ctx: Arc<ToolContext>,
}

impl GetLogs {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for GetLogs {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::GET_LOGS,
            "Fetch the last 24 hours of logs for one service, newest first. \
             Use max_response_size 'small' to skim before asking for 'large'.",
            json_schema_for::<GetLogsArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: GetLogsArgs = parse_args(names::GET_LOGS, &args)?;
            let tier = FormatTier::from(parsed.max_response_size);
            let request = UpstreamRequest::new(
                &parsed.project_id,
                Operation::GetLogs {
                    service: parsed.service,
                },
            );
            let raw = self.ctx.call(names::GET_LOGS, &args, request).await?;
            let (records, error) = unwrap_envelope(raw, "result");

            let render = self
                .ctx
                .render_request(
                    format!("{} logs for {} [{tier}]", parsed.service.table(), parsed.project_id),
                    tier,
                )
                .with_kind(EntityKind::LogRecord)
                .with_filter(FilterSpec::new("event_message").with_max_items(parsed.max_items))
                .with_notes(error.iter().map(error_note).collect());
            self.ctx.render(names::GET_LOGS, &args, records, render)
        })
    }
}

// ── get_advisors ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetAdvisorsArgs {
    pub project_id: String,
    /// Which advisor to run.
    #[serde(rename = "type")]
    pub kind: AdvisorKind,
    #[serde(default)]
    pub response_format: FormatTier,
    /// Glob over lint names.
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

pub struct GetAdvisors {
    ctx: Arc<ToolContext>,
}

impl GetAdvisors {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for GetAdvisors {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::GET_ADVISORS,
            "List security or performance advisories for a project, such as \
             missing RLS policies or unindexed foreign keys.",
            json_schema_for::<GetAdvisorsArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: GetAdvisorsArgs = parse_args(names::GET_ADVISORS, &args)?;
            let tier = parsed.response_format;
            let request = UpstreamRequest::new(
                &parsed.project_id,
                Operation::GetAdvisors { kind: parsed.kind },
            );
            let raw = self.ctx.call(names::GET_ADVISORS, &args, request).await?;
            let (lints, _) = unwrap_envelope(raw, "lints");

            let filter = FilterSpec::new("name")
                .with_pattern(parsed.name_pattern)
                .with_max_items(parsed.max_items);
            let render = self
                .ctx
                .render_request(
                    format!(
                        "{} advisories for {} [{tier}]",
                        parsed.kind.as_str(),
                        parsed.project_id
                    ),
                    tier,
                )
                .with_kind(EntityKind::Advisory)
                .with_filter(filter);
            self.ctx.render(names::GET_ADVISORS, &args, lints, render)
        })
    }

    fn cache_class(&self) -> Option<CacheClass> {
        Some(CacheClass::Volatile)
    }
}
