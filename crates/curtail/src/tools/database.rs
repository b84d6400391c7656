//! Database tools: catalog listings, migrations and free-form SQL.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::context::ToolContext;
use super::core::{CacheClass, Tool, ToolFuture, parse_args};
use super::names;
use crate::api::{Operation, UpstreamRequest};
use crate::budget::FormatTier;
use crate::projection::{EntityKind, FilterSpec};
use crate::sql::{govern, is_read_query};
use crate::{ToolDef, json_schema_for};

fn schema_read_patterns() -> Vec<String> {
    names::SCHEMA_READS
        .iter()
        .map(|tool| format!("{tool}:*"))
        .collect()
}

// ── list_tables ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTablesArgs {
    /// Project to inspect.
    pub project_id: String,
    /// Schemas to include. Defaults to `public`.
    #[serde(default)]
    pub schemas: Vec<String>,
    /// Level of detail: `names_only`, `summary` or `detailed`.
    #[serde(default)]
    pub response_format: FormatTier,
    /// Glob over table names, e.g. `user*`. Case-insensitive.
    #[serde(default)]
    pub name_pattern: Option<String>,
    /// Only tables with at least this many (estimated) rows.
    #[serde(default)]
    pub min_rows: Option<u64>,
    /// Only tables with at most this many (estimated) rows.
    #[serde(default)]
    pub max_rows: Option<u64>,
    /// Return at most this many tables.
    #[serde(default)]
    pub max_items: Option<usize>,
}

pub struct ListTables {
    ctx: Arc<ToolContext>,
}

impl ListTables {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for ListTables {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::LIST_TABLES,
            "List tables in one or more schemas. Start with response_format \
             'names_only' and narrow with name_pattern or row bounds before \
             asking for 'detailed'.",
            json_schema_for::<ListTablesArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: ListTablesArgs = parse_args(names::LIST_TABLES, &args)?;
            let tier = parsed.response_format;
            let request = UpstreamRequest::new(
                &parsed.project_id,
                Operation::ListTables {
                    schemas: parsed.schemas,
                },
            );
            let raw = self.ctx.call(names::LIST_TABLES, &args, request).await?;

            let filter = FilterSpec::new("name")
                .with_pattern(parsed.name_pattern)
                .with_range(
                    "rows",
                    parsed.min_rows.map(|n| n as f64),
                    parsed.max_rows.map(|n| n as f64),
                )
                .with_max_items(parsed.max_items);
            let render = self
                .ctx
                .render_request(format!("Tables in {} [{tier}]", parsed.project_id), tier)
                .with_kind(EntityKind::Table)
                .with_filter(filter);
            self.ctx.render(names::LIST_TABLES, &args, raw, render)
        })
    }

    fn cache_class(&self) -> Option<CacheClass> {
        Some(CacheClass::Volatile)
    }
}

// ── list_extensions ────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListExtensionsArgs {
    pub project_id: String,
    #[serde(default)]
    pub response_format: FormatTier,
    /// Glob over extension names.
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

pub struct ListExtensions {
    ctx: Arc<ToolContext>,
}

impl ListExtensions {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for ListExtensions {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::LIST_EXTENSIONS,
            "List available and installed Postgres extensions.",
            json_schema_for::<ListExtensionsArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: ListExtensionsArgs = parse_args(names::LIST_EXTENSIONS, &args)?;
            let tier = parsed.response_format;
            let request = UpstreamRequest::new(&parsed.project_id, Operation::ListExtensions);
            let raw = self.ctx.call(names::LIST_EXTENSIONS, &args, request).await?;

            let filter = FilterSpec::new("name")
                .with_pattern(parsed.name_pattern)
                .with_max_items(parsed.max_items);
            let render = self
                .ctx
                .render_request(format!("Extensions in {} [{tier}]", parsed.project_id), tier)
                .with_kind(EntityKind::Extension)
                .with_filter(filter);
            self.ctx.render(names::LIST_EXTENSIONS, &args, raw, render)
        })
    }

    fn cache_class(&self) -> Option<CacheClass> {
        Some(CacheClass::Stable)
    }
}

// ── list_migrations ────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListMigrationsArgs {
    pub project_id: String,
    #[serde(default)]
    pub response_format: FormatTier,
    /// Glob over migration names.
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

pub struct ListMigrations {
    ctx: Arc<ToolContext>,
}

impl ListMigrations {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for ListMigrations {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::LIST_MIGRATIONS,
            "List applied database migrations, oldest first.",
            json_schema_for::<ListMigrationsArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: ListMigrationsArgs = parse_args(names::LIST_MIGRATIONS, &args)?;
            let tier = parsed.response_format;
            let request = UpstreamRequest::new(&parsed.project_id, Operation::ListMigrations);
            let raw = self.ctx.call(names::LIST_MIGRATIONS, &args, request).await?;

            let filter = FilterSpec::new("name")
                .with_pattern(parsed.name_pattern)
                .with_max_items(parsed.max_items);
            let render = self
                .ctx
                .render_request(format!("Migrations in {} [{tier}]", parsed.project_id), tier)
                .with_kind(EntityKind::Migration)
                .with_filter(filter);
            self.ctx.render(names::LIST_MIGRATIONS, &args, raw, render)
        })
    }

    fn cache_class(&self) -> Option<CacheClass> {
        Some(CacheClass::Volatile)
    }
}

// ── apply_migration ────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApplyMigrationArgs {
    pub project_id: String,
    /// Migration name in snake_case.
    pub name: String,
    /// DDL to apply.
    pub query: String,
}

pub struct ApplyMigration {
    ctx: Arc<ToolContext>,
}

impl ApplyMigration {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for ApplyMigration {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::APPLY_MIGRATION,
            "Apply a DDL migration and record it in the migration history. \
             Use execute_sql for data changes.",
            json_schema_for::<ApplyMigrationArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: ApplyMigrationArgs = parse_args(names::APPLY_MIGRATION, &args)?;
            let label = format!("Applied migration {} to {}", parsed.name, parsed.project_id);
            let request = UpstreamRequest::new(
                &parsed.project_id,
                Operation::ApplyMigration {
                    name: parsed.name,
                    query: parsed.query,
                },
            );
            let raw = self.ctx.call(names::APPLY_MIGRATION, &args, request).await?;
            let render = self.ctx.render_request(label, FormatTier::Summary);
            self.ctx.render(names::APPLY_MIGRATION, &args, raw, render)
        })
    }

    fn invalidation_patterns(&self, _args: &Value) -> Vec<String> {
        schema_read_patterns()
    }
}

// ── execute_sql ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteSqlArgs {
    pub project_id: String,
    /// SQL to run.
    pub query: String,
    /// Row cap added to an unbounded SELECT. Defaults to the gateway setting.
    #[serde(default)]
    #[schemars(range(min = 1))]
    pub auto_limit: Option<usize>,
    /// Run the statement exactly as written.
    #[serde(default)]
    pub disable_auto_limit: bool,
    /// Budget tier for the result set.
    #[serde(default)]
    pub response_format: FormatTier,
}

pub struct ExecuteSql {
    ctx: Arc<ToolContext>,
}

impl ExecuteSql {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for ExecuteSql {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::EXECUTE_SQL,
            "Run raw SQL. Unbounded SELECT statements get a LIMIT added unless \
             disable_auto_limit is true; the result says when that happened.",
            json_schema_for::<ExecuteSqlArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: ExecuteSqlArgs = parse_args(names::EXECUTE_SQL, &args)?;
            let tier = parsed.response_format;
            let governed = govern(
                &parsed.query,
                parsed.auto_limit.unwrap_or(self.ctx.auto_limit).max(1),
                parsed.disable_auto_limit,
            );
            let request = UpstreamRequest::new(
                &parsed.project_id,
                Operation::ExecuteSql {
                    query: governed.sql,
                },
            );
            let raw = self.ctx.call(names::EXECUTE_SQL, &args, request).await?;
            let render = self
                .ctx
                .render_request(format!("Query result from {} [{tier}]", parsed.project_id), tier)
                .with_notes(governed.warnings);
            self.ctx.render(names::EXECUTE_SQL, &args, raw, render)
        })
    }

    fn invalidation_patterns(&self, args: &Value) -> Vec<String> {
        match args.get("query").and_then(Value::as_str) {
            Some(query) if is_read_query(query) => Vec::new(),
            _ => schema_read_patterns(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutput;
    use crate::tools::testing::FakeUpstream;
    use serde_json::json;

    fn ctx(fake: &Arc<FakeUpstream>) -> Arc<ToolContext> {
        Arc::new(ToolContext::new(fake.clone()))
    }

    #[tokio::test]
    async fn list_tables_filters_then_projects() {
        let fake = Arc::new(FakeUpstream::new(json!([
            {"id": 1, "schema": "public", "name": "users", "rows": 10, "bytes": 1},
            {"id": 2, "schema": "public", "name": "user_logs", "rows": 900, "bytes": 1},
            {"id": 3, "schema": "public", "name": "auth_users", "rows": 5, "bytes": 1}
        ])));
        let tool = ListTables::new(ctx(&fake));
        let out = tool
            .execute(json!({
                "project_id": "p1",
                "response_format": "names_only",
                "name_pattern": "user*"
            }))
            .await
            .unwrap();
        let ToolOutput::Text { text, warnings } = out else {
            panic!("filtering must be reported");
        };
        assert_eq!(warnings.len(), 1);
        assert!(text.contains(r#""name":"users""#));
        assert!(text.contains(r#""name":"user_logs""#));
        assert!(!text.contains("auth_users"));
        assert!(!text.contains("bytes"));
        assert_eq!(
            fake.requests()[0].operation,
            Operation::ListTables { schemas: vec![] }
        );
    }

    #[tokio::test]
    async fn list_tables_row_bounds() {
        let fake = Arc::new(FakeUpstream::new(json!([
            {"schema": "public", "name": "a", "rows": 10},
            {"schema": "public", "name": "b", "rows": 900}
        ])));
        let out = ListTables::new(ctx(&fake))
            .execute(json!({"project_id": "p1", "min_rows": 100}))
            .await
            .unwrap();
        let text = out.into_text();
        assert!(text.contains(r#""name":"b""#));
        assert!(!text.contains(r#""name":"a""#));
    }

    #[tokio::test]
    async fn execute_sql_is_governed() {
        let fake = Arc::new(FakeUpstream::new(json!([{"id": 1}])));
        let out = ExecuteSql::new(ctx(&fake))
            .execute(json!({"project_id": "p1", "query": "SELECT * FROM users"}))
            .await
            .unwrap();
        assert_eq!(
            fake.requests()[0].operation,
            Operation::ExecuteSql {
                query: "SELECT * FROM users LIMIT 25;".into()
            }
        );
        assert_eq!(out.warnings().len(), 2);
        assert!(out.into_text().contains("disable_auto_limit"));
    }

    #[tokio::test]
    async fn zero_auto_limit_still_caps() {
        let fake = Arc::new(FakeUpstream::new(json!([])));
        ExecuteSql::new(ctx(&fake))
            .execute(json!({"project_id": "p1", "query": "SELECT id FROM t", "auto_limit": 0}))
            .await
            .unwrap();
        assert_eq!(
            fake.requests()[0].operation,
            Operation::ExecuteSql {
                query: "SELECT id FROM t LIMIT 1;".into()
            }
        );
        let schema = json_schema_for::<ExecuteSqlArgs>();
        assert!(
            schema["properties"]["auto_limit"]
                .to_string()
                .contains(r#""minimum":1"#)
        );
    }

    #[tokio::test]
    async fn execute_sql_honours_opt_out() {
        let fake = Arc::new(FakeUpstream::new(json!([])));
        let out = ExecuteSql::new(ctx(&fake))
            .execute(json!({
                "project_id": "p1",
                "query": "SELECT * FROM users",
                "disable_auto_limit": true
            }))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::Structured(json!([])));
        assert_eq!(
            fake.requests()[0].operation,
            Operation::ExecuteSql {
                query: "SELECT * FROM users".into()
            }
        );
    }

    #[test]
    fn only_writes_invalidate() {
        let fake = Arc::new(FakeUpstream::new(Value::Null));
        let tool = ExecuteSql::new(ctx(&fake));
        assert!(tool.invalidation_patterns(&json!({"query": "select 1"})).is_empty());
        assert_eq!(
            tool.invalidation_patterns(&json!({"query": "drop table t"})),
            ["list_migrations:*", "list_tables:*", "generate_typescript_types:*"]
        );
        assert_eq!(
            ApplyMigration::new(ctx(&fake)).invalidation_patterns(&json!({})).len(),
            3
        );
    }

    #[tokio::test]
    async fn bad_arguments_are_enveloped() {
        let fake = Arc::new(FakeUpstream::new(Value::Null));
        let err = ApplyMigration::new(ctx(&fake))
            .execute(json!({"project_id": "p1", "name": "init"}))
            .await
            .unwrap_err();
        assert_eq!(err.tool, "apply_migration");
        assert_eq!(err.project_id.as_deref(), Some("p1"));
        assert!(fake.requests().is_empty());
    }
}
