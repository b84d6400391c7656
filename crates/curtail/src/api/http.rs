//! [`Upstream`] over the hosted management REST API.

use chrono::{TimeDelta, Utc};
use futures::future::BoxFuture;
use reqwest::{Method, Url};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::upstream::{Operation, Upstream, UpstreamRequest};
use crate::error::UpstreamError;

/// Default management API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.supabase.com";

/// How far back `get_logs` looks.
const LOG_WINDOW_HOURS: i64 = 24;

const LOG_LIMIT: usize = 100;

/// HTTP client for the management API, authenticated with a bearer token.
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl std::fmt::Debug for HttpUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUpstream")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpUpstream {
    pub fn new(base_url: &str, access_token: impl Into<String>) -> Result<Self, UpstreamError> {
        let base_url =
            Url::parse(base_url).map_err(|e| UpstreamError::Transport(format!("bad API URL: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("curtail/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url,
            access_token: access_token.into(),
        })
    }

    /// `{base}/v1/projects/{project_id}/{path}`. The project id is one
    /// escaped segment and may not be a dot segment.
    fn url(&self, project_id: &str, path: &str) -> Result<Url, UpstreamError> {
        if project_id.is_empty() || project_id == "." || project_id == ".." {
            return Err(UpstreamError::InvalidRequest(format!(
                "bad project id: {project_id:?}"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| UpstreamError::InvalidRequest("API URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v1", "projects", project_id])
            .extend(path.split('/'));
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, UpstreamError> {
        let start = Instant::now();
        let path = url.path().to_string();
        let mut req = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.access_token);
        if let Some(body) = &body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            "{method} {path}: HTTP {status} in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            text.len()
        );

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        trace!("{path} response: {}", text.chars().take(300).collect::<String>());
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn query(&self, project_id: &str, sql: String) -> Result<Value, UpstreamError> {
        let url = self.url(project_id, "database/query")?;
        self.send(Method::POST, url, Some(json!({ "query": sql }))).await
    }

    async fn dispatch(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        let project = request.project_id.as_str();
        match &request.operation {
            Operation::ListTables { schemas } => self.query(project, list_tables_sql(schemas)).await,
            Operation::ListExtensions => self.query(project, LIST_EXTENSIONS_SQL.to_string()).await,
            Operation::ExecuteSql { query } => self.query(project, query.clone()).await,
            Operation::ListMigrations => {
                let url = self.url(project, "database/migrations")?;
                self.send(Method::GET, url, None).await
            }
            Operation::ApplyMigration { name, query } => {
                let url = self.url(project, "database/migrations")?;
                self.send(Method::POST, url, Some(json!({ "name": name, "query": query })))
                    .await
            }
            Operation::GetLogs { service } => {
                let end = Utc::now();
                let start = end - TimeDelta::hours(LOG_WINDOW_HOURS);
                let sql = format!(
                    "select id, timestamp, event_message, metadata from {} order by timestamp desc limit {LOG_LIMIT}",
                    service.table()
                );
                let mut url = self.url(project, "analytics/endpoints/logs.all")?;
                url.query_pairs_mut()
                    .append_pair("sql", &sql)
                    .append_pair("iso_timestamp_start", &start.to_rfc3339())
                    .append_pair("iso_timestamp_end", &end.to_rfc3339());
                self.send(Method::GET, url, None).await
            }
            Operation::GetAdvisors { kind } => {
                let url = self.url(project, &format!("advisors/{}", kind.as_str()))?;
                self.send(Method::GET, url, None).await
            }
            Operation::GenerateTypes { schemas } => {
                let mut url = self.url(project, "types/typescript")?;
                if !schemas.is_empty() {
                    url.query_pairs_mut()
                        .append_pair("included_schemas", &schemas.join(","));
                }
                self.send(Method::GET, url, None).await
            }
        }
    }
}

impl Upstream for HttpUpstream {
    fn call<'a>(&'a self, request: &'a UpstreamRequest) -> BoxFuture<'a, Result<Value, UpstreamError>> {
        Box::pin(self.dispatch(request))
    }
}

// ── Catalog queries ────────────────────────────────────────────────

const LIST_EXTENSIONS_SQL: &str = "\
select a.name, n.nspname as schema, a.default_version, a.installed_version, a.comment
from pg_available_extensions a
left join pg_extension e on e.extname = a.name
left join pg_namespace n on n.oid = e.extnamespace
order by a.name";

/// Quote `s` as a SQL string literal.
fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn list_tables_sql(schemas: &[String]) -> String {
    let schemas = if schemas.is_empty() {
        "'public'".to_string()
    } else {
        schemas
            .iter()
            .map(|s| quote_literal(s))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "\
select
  c.oid::int8 as id,
  n.nspname as schema,
  c.relname as name,
  c.relrowsecurity as rls_enabled,
  c.relreplident::text as replica_identity,
  pg_total_relation_size(c.oid) as bytes,
  greatest(c.reltuples, 0)::int8 as rows,
  obj_description(c.oid, 'pg_class') as comment,
  coalesce((
    select json_agg(a.attname order by a.attnum)
    from pg_index i
    join pg_attribute a on a.attrelid = i.indrelid and a.attnum = any(i.indkey)
    where i.indrelid = c.oid and i.indisprimary
  ), '[]') as primary_keys,
  coalesce((
    select json_agg(json_build_object(
      'name', col.column_name,
      'data_type', col.data_type,
      'format', col.udt_name,
      'default_value', col.column_default,
      'is_identity', col.is_identity = 'YES',
      'is_generated', col.is_generated <> 'NEVER',
      'is_nullable', col.is_nullable = 'YES',
      'is_updatable', col.is_updatable = 'YES',
      'is_unique', exists (
        select 1 from pg_index ui
        join pg_attribute ua on ua.attrelid = ui.indrelid and ua.attnum = ui.indkey[0]
        where ui.indrelid = c.oid and ui.indisunique and ui.indnatts = 1
          and ua.attname = col.column_name
      ),
      'comment', col_description(c.oid, col.ordinal_position::int)
    ) order by col.ordinal_position)
    from information_schema.columns col
    where col.table_schema = n.nspname and col.table_name = c.relname
  ), '[]') as columns,
  coalesce((
    select json_agg(json_build_object(
      'constraint_name', con.conname,
      'source_table_name', con.conrelid::regclass::text,
      'target_table_name', con.confrelid::regclass::text,
      'definition', pg_get_constraintdef(con.oid)
    ))
    from pg_constraint con
    where con.contype = 'f' and (con.conrelid = c.oid or con.confrelid = c.oid)
  ), '[]') as relationships
from pg_class c
join pg_namespace n on n.oid = c.relnamespace
where c.relkind in ('r', 'p') and n.nspname in ({schemas})
order by n.nspname, c.relname"
    )
}
