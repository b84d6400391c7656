//! Convenience re-exports for common `curtail` types.
//!
//! ```ignore
//! use curtail::prelude::*;
//! ```
//!
//! Covers configuration, the tool set, the upstream, and the pure pipeline
//! stages. Field policy tables and cache internals are left out; import
//! those from their modules directly.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::config::GatewayConfig;
pub use crate::error::{ConfigError, ErrorCause, ToolError, UpstreamError};
pub use crate::{ToolDef, json_schema_for};

// ── Pipeline ────────────────────────────────────────────────────────
pub use crate::budget::{Budget, FormatTier, ResponseSize, TierBudgets, enforce, estimate_text};
pub use crate::projection::{EntityKind, FilterSpec, RenderRequest, render};
pub use crate::sql::govern;

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{ResponseCache, Tool, ToolContext, ToolOutput, ToolSet};

// ── Upstream ────────────────────────────────────────────────────────
pub use crate::api::{HttpUpstream, Operation, RetryPolicy, Upstream, UpstreamRequest};
