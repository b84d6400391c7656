//! State shared by every gateway tool.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::core::ToolOutput;
use crate::api::{RetryPolicy, Upstream, UpstreamRequest, retry_read};
use crate::budget::{Budget, FormatTier, TierBudgets};
use crate::error::{ToolError, UpstreamError};
use crate::projection::{RenderRequest, render};

/// The upstream plus the sizing policy tools render with.
pub struct ToolContext {
    upstream: Arc<dyn Upstream>,
    pub tiers: TierBudgets,
    /// Item cap handed to the budget enforcer.
    pub max_array_items: Option<usize>,
    /// Whether warnings are written into returned text.
    pub include_warning: bool,
    /// Row cap injected into unbounded `SELECT`s.
    pub auto_limit: usize,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("tiers", &self.tiers)
            .field("auto_limit", &self.auto_limit)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Default row cap for `execute_sql`.
pub const DEFAULT_AUTO_LIMIT: usize = 25;

impl ToolContext {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            upstream,
            tiers: TierBudgets::default(),
            max_array_items: None,
            include_warning: true,
            auto_limit: DEFAULT_AUTO_LIMIT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_tiers(mut self, tiers: TierBudgets) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_max_array_items(mut self, max: Option<usize>) -> Self {
        self.max_array_items = max;
        self
    }

    pub fn with_include_warning(mut self, include: bool) -> Self {
        self.include_warning = include;
        self
    }

    pub fn with_auto_limit(mut self, limit: usize) -> Self {
        self.auto_limit = limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The per-call budget for `tier`.
    pub fn budget(&self, tier: FormatTier) -> Budget {
        Budget::new(self.tiers.max_tokens(tier))
            .with_max_array_items(self.max_array_items)
            .with_include_warning(self.include_warning)
    }

    /// A render request for `tier` with this context's budget.
    pub fn render_request(&self, label: impl Into<String>, tier: FormatTier) -> RenderRequest {
        RenderRequest::new(label, tier, self.budget(tier))
    }

    /// Send `request` upstream. Read-only operations are retried on
    /// transient failure; mutations get exactly one attempt.
    pub async fn call(
        &self,
        tool: &str,
        args: &Value,
        request: UpstreamRequest,
    ) -> Result<Value, ToolError> {
        debug!("upstream: {request}");
        let result = if request.operation.is_read_only() {
            retry_read(&self.retry, tool, || self.upstream.call(&request)).await
        } else {
            self.upstream.call(&request).await
        };
        result.map_err(|e: UpstreamError| ToolError::new(tool, args, e))
    }

    /// Run the render pipeline, wrapping a bad name pattern in the tool's
    /// error envelope.
    pub fn render(
        &self,
        tool: &str,
        args: &Value,
        value: Value,
        request: RenderRequest,
    ) -> Result<ToolOutput, ToolError> {
        render(value, request).map_err(|e| ToolError::new(tool, args, e))
    }
}
