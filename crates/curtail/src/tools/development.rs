//! Development tools.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::context::ToolContext;
use super::core::{CacheClass, Tool, ToolFuture, parse_args};
use super::names;
use crate::api::{Operation, UpstreamRequest};
use crate::budget::FormatTier;
use crate::projection::EntityKind;
use crate::{ToolDef, json_schema_for};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateTypesArgs {
    pub project_id: String,
    /// Schemas to generate types for. Defaults to `public`.
    #[serde(default)]
    pub schemas: Vec<String>,
    /// `names_only` reports just the size of the bundle.
    #[serde(default)]
    pub response_format: FormatTier,
}

pub struct GenerateTypescriptTypes {
    ctx: Arc<ToolContext>,
}

impl GenerateTypescriptTypes {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for GenerateTypescriptTypes {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::GENERATE_TYPESCRIPT_TYPES,
            "Generate TypeScript types for the project's database schema.",
            json_schema_for::<GenerateTypesArgs>(),
        )
    }

    fn execute(&self, args: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let parsed: GenerateTypesArgs = parse_args(names::GENERATE_TYPESCRIPT_TYPES, &args)?;
            let tier = parsed.response_format;
            let request = UpstreamRequest::new(
                &parsed.project_id,
                Operation::GenerateTypes {
                    schemas: parsed.schemas,
                },
            );
            let raw = self
                .ctx
                .call(names::GENERATE_TYPESCRIPT_TYPES, &args, request)
                .await?;
            let render = self
                .ctx
                .render_request(format!("TypeScript types for {} [{tier}]", parsed.project_id), tier)
                .with_kind(EntityKind::TypesBundle);
            self.ctx
                .render(names::GENERATE_TYPESCRIPT_TYPES, &args, raw, render)
        })
    }

    fn cache_class(&self) -> Option<CacheClass> {
        Some(CacheClass::Volatile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{ELLIPSIS_MARKER, TierBudgets, estimate_text};
    use crate::tools::ToolOutput;
    use crate::tools::testing::FakeUpstream;
    use serde_json::json;

    #[tokio::test]
    async fn names_only_reports_line_count() {
        let fake = Arc::new(FakeUpstream::new(json!({"types": "type A = 1\ntype B = 2"})));
        let out = GenerateTypescriptTypes::new(Arc::new(ToolContext::new(fake)))
            .execute(json!({"project_id": "p1", "response_format": "names_only"}))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::Structured(json!({"line_count": 2})));
    }

    #[tokio::test]
    async fn detailed_bundle_is_truncated_to_budget() {
        let types = "export type Row = { id: number };\n".repeat(2_000);
        let fake = Arc::new(FakeUpstream::new(json!({ "types": types })));
        let tiers = TierBudgets {
            names_only: 50,
            summary: 100,
            detailed: 500,
        };
        let ctx = ToolContext::new(fake).with_tiers(tiers);
        let out = GenerateTypescriptTypes::new(Arc::new(ctx))
            .execute(json!({"project_id": "p1", "response_format": "detailed"}))
            .await
            .unwrap();
        assert_eq!(out.warnings().len(), 1);
        let text = out.into_text();
        assert!(text.contains(ELLIPSIS_MARKER));
        assert!(estimate_text(&text) <= 500);
    }
}
