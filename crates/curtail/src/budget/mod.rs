//! Size accounting: token estimation, format tiers and budget enforcement.
//!
//! - [`estimator`] — the single char-count token estimator every size
//!   decision goes through.
//! - [`tier`] — [`FormatTier`], [`TierBudgets`] and the per-call [`Budget`].
//! - [`enforcer`] — [`enforce`] and its degradation ladder.

pub mod enforcer;
pub mod estimator;
pub mod tier;

pub use enforcer::{ELLIPSIS_MARKER, Enforced, enforce, enforce_with_notes};
pub use estimator::{CHARS_PER_TOKEN, estimate_text, estimate_value};
pub use tier::{Budget, FormatTier, ResponseSize, TierBudgets};
