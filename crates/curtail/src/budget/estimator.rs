//! Character-count token estimation.
//!
//! Every size decision in the crate goes through this one estimator so that
//! the capper, projector and enforcer agree on what "too big" means. It is a
//! deliberate approximation: the count is proportional to the byte length of
//! the canonical (compact JSON) serialization, not to any real tokenizer.

use serde_json::Value;

/// Bytes per estimated token. Most tokenizers average 3-4 chars per token on
/// JSON; 4 keeps the inverse ([`max_bytes_for`]) exact in integer math.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a piece of text.
pub fn estimate_text(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate the token count of a JSON value from its compact serialization.
pub fn estimate_value(value: &Value) -> usize {
    estimate_text(&serialize(value))
}

/// Largest byte length whose estimate stays within `tokens`.
pub fn max_bytes_for(tokens: usize) -> usize {
    tokens.saturating_mul(CHARS_PER_TOKEN)
}

/// Canonical serialization used for measurement and output.
///
/// `Value`'s `Display` impl writes compact JSON and cannot fail.
pub fn serialize(value: &Value) -> String {
    value.to_string()
}
