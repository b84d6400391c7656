//! Everything between the tools and the management API.
//!
//! - [`upstream`] — the [`Upstream`] trait and the [`Operation`] vocabulary
//!   tools speak.
//! - [`http`] — [`HttpUpstream`], the reqwest-backed implementation.
//! - [`retry`] — [`RetryPolicy`] and [`retry_read`] for transient failures
//!   of read-only operations. Mutations are never retried.

pub mod http;
pub mod retry;
pub mod upstream;

pub use http::{DEFAULT_API_URL, HttpUpstream};
pub use retry::{RetryPolicy, retry_read};
pub use upstream::{AdvisorKind, LogService, Operation, Upstream, UpstreamRequest};
