//! The gateway's tool surface.
//!
//! Each management capability is a [`Tool`] implementor. Tools are collected
//! into a [`ToolSet`], which parses and validates arguments, consults the
//! [`ResponseCache`], enforces a timeout and invalidates cached reads after a
//! mutation. Every tool sends its upstream result through the render
//! pipeline, so nothing leaves a tool unbounded.
//!
//! # Submodules
//!
//! - [`core`] — [`Tool`] trait, [`ToolOutput`], [`ToolSet`] dispatch.
//! - [`cache`] — [`ResponseCache`] with per-entry TTLs and glob invalidation.
//! - [`context`] — [`ToolContext`], the upstream plus sizing policy shared
//!   by all gateway tools.
//! - [`database`] — `list_tables`, `list_extensions`, `list_migrations`,
//!   `apply_migration`, `execute_sql`.
//! - [`debugging`] — `get_logs`, `get_advisors`.
//! - [`development`] — `generate_typescript_types`.
//! - [`names`] — tool name constants.

pub mod cache;
pub mod context;
pub mod core;
pub mod database;
pub mod debugging;
pub mod development;
pub mod names;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{ResponseCache, fingerprint};
pub use context::{DEFAULT_AUTO_LIMIT, ToolContext};
pub use core::{
    CacheClass, CacheTtls, DEFAULT_TOOL_TIMEOUT, Tool, ToolFuture, ToolOutput, ToolSet, parse_args,
    validate_tool_arguments,
};
