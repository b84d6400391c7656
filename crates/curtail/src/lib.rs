//! Bounded response projection for an LLM database-management tool gateway.
//!
//! `curtail` sits between an agent and a database management API. Every tool
//! result passes through the same pipeline before the agent sees it:
//!
//! 1. an optional **array capper** filters sequences by glob and numeric
//!    range, then caps the count,
//! 2. the **field projector** reshapes each entity to the requested
//!    [`FormatTier`](budget::FormatTier),
//! 3. the **budget enforcer** guarantees the serialized result fits the
//!    tier's token budget, trimming items and finally cutting bytes, and
//!    says so in a warning.
//!
//! Raw SQL goes through the **query governor** first, which adds a `LIMIT`
//! to unbounded `SELECT` statements. Read results are kept in a
//! [`ResponseCache`](tools::ResponseCache) that mutating tools invalidate.
//!
//! # Getting started
//!
//! ```ignore
//! use curtail::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::default();
//!     let token = std::env::var("CURTAIL_ACCESS_TOKEN")?;
//!     let upstream = Arc::new(HttpUpstream::new(&config.api_url, token)?);
//!     let tools = config.build_toolset(upstream);
//!
//!     let out = tools
//!         .execute(
//!             "list_tables",
//!             serde_json::json!({"project_id": "abc", "response_format": "names_only"}),
//!         )
//!         .await?;
//!     println!("{}", out.into_text());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`budget`] | Token estimator, format tiers, budget enforcer |
//! | [`projection`] | Field policies, projector, array capper, render pipeline |
//! | [`sql`] | Query governor |
//! | [`tools`] | [`Tool`](tools::Tool) trait, [`ToolSet`](tools::ToolSet), response cache, gateway tools |
//! | [`api`] | [`Upstream`](api::Upstream) trait, HTTP implementation, retry |
//! | [`config`] | [`GatewayConfig`](config::GatewayConfig) |
//! | [`error`] | Error types and parameter redaction |

pub mod api;
pub mod budget;
pub mod config;
pub mod error;
pub mod prelude;
pub mod projection;
pub mod sql;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Tool argument structs use this for their
/// definitions, and [`ToolSet`](tools::ToolSet) validates against it.
///
/// # Example
///
/// ```
/// use curtail::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct ListArgs {
///     project_id: String,
///     #[serde(default)]
///     name_pattern: Option<String>,
/// }
///
/// let schema = json_schema_for::<ListArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"project_id".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition in the function-calling format agents consume.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_def_serializes_in_function_format() {
        let def = ToolDef::new("list_tables", "List tables.", serde_json::json!({"type": "object"}));
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "list_tables");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }
}
