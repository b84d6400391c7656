//! Budget enforcement for projected tool responses.
//!
//! [`enforce`] serializes a value, measures it with the shared estimator and,
//! only when it is over budget, walks a degradation ladder until it fits:
//!
//! 1. drop trailing items of the value's main sequence (down to
//!    `max_array_items`, then to the largest prefix that fits),
//! 2. hard-truncate the serialized text on a UTF-8 boundary and append
//!    [`ELLIPSIS_MARKER`].
//!
//! Whenever anything was cut a warning states the original and reduced size.
//! Enforcement is total: it never panics and the returned text never exceeds
//! `budget.max_tokens` by the estimator, even for a zero budget.

use serde_json::Value;
use tracing::{debug, info};

use super::estimator::{estimate_text, max_bytes_for, serialize};
use super::tier::Budget;

/// Appended to text that was cut mid-value.
pub const ELLIPSIS_MARKER: &str = "...[truncated]";

/// Prefix of each warning line written into the returned text.
pub const WARNING_PREFIX: &str = "[warning] ";

/// Result of [`enforce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforced {
    /// Context label, payload and (when requested) warning lines.
    pub text: String,
    /// Everything that was altered, in the order it happened. Empty when the
    /// value was returned untouched.
    pub warnings: Vec<String>,
    /// Estimated size of the untouched payload.
    pub original_tokens: usize,
    /// Items kept from the value's main sequence, if it has one.
    pub retained_items: Option<usize>,
    /// Whether the ladder had to cut anything.
    pub truncated: bool,
}

impl Enforced {
    /// Estimated size of the returned text.
    pub fn tokens(&self) -> usize {
        estimate_text(&self.text)
    }
}

/// Enforce `budget` on `value`, prefixing the output with `label`.
pub fn enforce(value: &Value, label: &str, budget: &Budget) -> Enforced {
    enforce_with_notes(value, label, budget, Vec::new())
}

/// Like [`enforce`], but threads earlier alterations (filtering,
/// auto-limiting) into the same ordered warning list.
pub fn enforce_with_notes(
    value: &Value,
    label: &str,
    budget: &Budget,
    notes: Vec<String>,
) -> Enforced {
    let allowed = max_bytes_for(budget.max_tokens);
    let payload = serialize(value);
    let original_tokens = estimate_text(&payload);
    let sequence = Sequence::locate(value);
    let total_items = sequence.as_ref().map(|s| s.items.len());

    let inline: &[String] = if budget.include_warning { &notes } else { &[] };
    let unlabeled = render("", &payload, inline);
    if unlabeled.len() <= allowed {
        // The label is context, not data: keep it only while it fits.
        let labeled = render(label, &payload, inline);
        let text = if labeled.len() <= allowed { labeled } else { unlabeled };
        return Enforced {
            text,
            warnings: notes,
            original_tokens,
            retained_items: total_items,
            truncated: false,
        };
    }

    info!(
        "{} over budget: ~{original_tokens} tokens > {}",
        if label.is_empty() { "response" } else { label },
        budget.max_tokens
    );

    // Reserve room for label, notes and the worst-case truncation warning.
    let worst_warning = truncation_warning(
        original_tokens,
        original_tokens,
        budget.max_tokens,
        total_items.map(|n| (n, n)),
        true,
    );
    let mut reserved_lines = notes.clone();
    reserved_lines.push(worst_warning);
    let reserved_inline: &[String] = if budget.include_warning {
        &reserved_lines
    } else {
        &[]
    };
    let mut label = label;
    let mut overhead = render(label, "", reserved_inline).len();
    if overhead > allowed {
        label = "";
        overhead = render(label, "", reserved_inline).len();
    }
    let payload_room = allowed.saturating_sub(overhead);

    let mut kept = None;
    let mut payload = payload;
    if let Some(seq) = &sequence {
        let keep = seq.largest_fitting_prefix(payload_room, budget.max_array_items);
        if keep < seq.items.len() {
            debug!("keeping {keep} of {} items", seq.items.len());
            payload = serialize(&seq.with_prefix(value, keep));
        }
        kept = Some(keep);
    }

    let cut = payload.len() > payload_room;
    if cut {
        payload = hard_truncate(payload, payload_room);
    }

    let items = match (kept, total_items) {
        (Some(k), Some(n)) if k < n => Some((k, n)),
        _ => None,
    };
    let warning = truncation_warning(
        original_tokens,
        estimate_text(&payload),
        budget.max_tokens,
        items,
        cut,
    );
    let mut warnings = notes;
    warnings.push(warning);

    let inline: &[String] = if budget.include_warning { &warnings } else { &[] };
    let mut text = render(label, &payload, inline);
    if text.len() > allowed {
        // Notes alone outgrew the budget; slicing the whole text is the
        // unconditional last resort.
        text = hard_truncate(text, allowed);
    }

    Enforced {
        text,
        warnings,
        original_tokens,
        retained_items: kept,
        truncated: true,
    }
}

/// Cut `text` to at most `max_bytes`, ending with [`ELLIPSIS_MARKER`] when
/// there is room for it.
pub fn hard_truncate(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    if max_bytes < ELLIPSIS_MARKER.len() {
        text.truncate(text.floor_char_boundary(max_bytes));
        return text;
    }
    let content = max_bytes - ELLIPSIS_MARKER.len();
    text.truncate(text.floor_char_boundary(content));
    text.push_str(ELLIPSIS_MARKER);
    text
}

fn render(label: &str, payload: &str, warnings: &[String]) -> String {
    let mut out = String::with_capacity(label.len() + payload.len() + 1);
    if !label.is_empty() {
        out.push_str(label);
        out.push('\n');
    }
    out.push_str(payload);
    for warning in warnings {
        out.push('\n');
        out.push_str(WARNING_PREFIX);
        out.push_str(warning);
    }
    out
}

fn truncation_warning(
    original: usize,
    reduced: usize,
    max_tokens: usize,
    items: Option<(usize, usize)>,
    cut: bool,
) -> String {
    let mut msg =
        format!("Response truncated from ~{original} to ~{reduced} tokens (budget {max_tokens})");
    if let Some((kept, total)) = items {
        msg.push_str(&format!("; kept the first {kept} of {total} items"));
    }
    if cut {
        msg.push_str("; output was cut mid-value");
    }
    msg.push_str(". Narrow the request with filters or a smaller response format to see the rest.");
    msg
}

/// The sequence the ladder trims: the value itself, or the largest
/// array-valued field of an object (e.g. `{"result": [...]}`).
struct Sequence<'a> {
    field: Option<&'a str>,
    items: &'a [Value],
    /// Serialized length of the value with the sequence emptied.
    base_len: usize,
    item_lens: Vec<usize>,
}

impl<'a> Sequence<'a> {
    fn locate(value: &'a Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self::new(None, items, 2)),
            Value::Object(map) => {
                let (key, items) = map
                    .iter()
                    .filter_map(|(k, v)| v.as_array().map(|a| (k.as_str(), a)))
                    .filter(|(_, a)| !a.is_empty())
                    .max_by_key(|(_, a)| a.iter().map(|v| serialize(v).len()).sum::<usize>())?;
                let mut emptied = map.clone();
                emptied.insert(key.to_string(), Value::Array(Vec::new()));
                let base_len = serialize(&Value::Object(emptied)).len();
                Some(Self::new(Some(key), items, base_len))
            }
            _ => None,
        }
    }

    fn new(field: Option<&'a str>, items: &'a [Value], base_len: usize) -> Self {
        let item_lens = items.iter().map(|v| serialize(v).len()).collect();
        Self {
            field,
            items,
            base_len,
            item_lens,
        }
    }

    /// Exact serialized length of the value keeping the first `k` items.
    fn prefix_len(&self, k: usize) -> usize {
        let items: usize = self.item_lens[..k].iter().sum();
        self.base_len + items + k.saturating_sub(1)
    }

    /// Largest `k` (at least one item) whose prefix fits `room`, after
    /// applying the hard item cap.
    fn largest_fitting_prefix(&self, room: usize, max_items: Option<usize>) -> usize {
        let cap = max_items.map_or(self.items.len(), |m| m.min(self.items.len()));
        if cap == 0 || self.prefix_len(cap) <= room {
            return cap;
        }
        // prefix_len is monotonic in k, so the fitting prefixes are 1..=lo.
        let (mut lo, mut hi) = (1, cap);
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            if self.prefix_len(mid) <= room {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    fn with_prefix(&self, original: &Value, k: usize) -> Value {
        let kept = Value::Array(self.items[..k].to_vec());
        match (self.field, original) {
            (Some(field), Value::Object(map)) => {
                let mut map = map.clone();
                map.insert(field.to_string(), kept);
                Value::Object(map)
            }
            _ => kept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::estimator::estimate_value;
    use serde_json::json;

    fn rows(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| json!({"id": i, "name": format!("table_{i}"), "comment": "x".repeat(40)}))
                .collect(),
        )
    }

    #[test]
    fn small_value_is_untouched() {
        let value = json!([{"schema": "public", "name": "users"}]);
        let result = enforce(&value, "Tables:", &Budget::new(1_000));
        assert!(result.warnings.is_empty());
        assert!(!result.truncated);
        assert_eq!(result.text, format!("Tables:\n{value}"));
    }

    #[test]
    fn label_dropped_before_data_when_tight() {
        let value = json!({"name": "abcdefgh"});
        let payload = value.to_string();
        let budget = Budget::new(estimate_text(&payload));
        let result = enforce(&value, "A very long context label that does not fit", &budget);
        assert!(result.warnings.is_empty());
        assert_eq!(result.text, payload);
    }

    #[test]
    fn trims_trailing_items_and_warns() {
        let value = rows(200);
        let budget = Budget::new(500);
        let result = enforce(&value, "Rows:", &budget);

        assert!(result.truncated);
        assert!(result.tokens() <= 500);
        let kept = result.retained_items.unwrap();
        assert!(kept > 0 && kept < 200);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains(&format!("kept the first {kept} of 200 items")));
        assert!(result.text.contains(WARNING_PREFIX));
        // Order is preserved: the first row survives.
        assert!(result.text.contains("table_0"));
    }

    #[test]
    fn max_array_items_applies_first() {
        let value = rows(50);
        let budget = Budget::new(estimate_value(&value) - 1).with_max_array_items(Some(3));
        let result = enforce(&value, "", &budget);
        assert_eq!(result.retained_items, Some(3));
        assert!(result.text.contains("table_2"));
        assert!(!result.text.contains("table_3"));
    }

    #[test]
    fn single_long_string_is_hard_truncated() {
        let value = json!({"types": "export type Json = string;\n".repeat(2_000)});
        let budget = Budget::new(300);
        let result = enforce(&value, "Types:", &budget);
        assert!(result.truncated);
        assert!(result.tokens() <= 300);
        assert!(result.text.contains(ELLIPSIS_MARKER));
        assert!(result.warnings[0].contains("cut mid-value"));
    }

    #[test]
    fn warnings_out_of_band_when_not_included() {
        let value = rows(100);
        let budget = Budget::new(200).with_include_warning(false);
        let result = enforce(&value, "Rows:", &budget);
        assert_eq!(result.warnings.len(), 1);
        assert!(!result.text.contains(WARNING_PREFIX));
        assert!(result.tokens() <= 200);
    }

    #[test]
    fn notes_come_before_truncation_warning() {
        let value = rows(100);
        let notes = vec!["Filtered 40 of 140 items".to_string()];
        let result = enforce_with_notes(&value, "Rows:", &Budget::new(300), notes);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].starts_with("Filtered"));
        assert!(result.warnings[1].starts_with("Response truncated"));
    }

    #[test]
    fn notes_kept_when_small() {
        let value = json!([1, 2, 3]);
        let notes = vec!["Added LIMIT 25".to_string()];
        let result = enforce_with_notes(&value, "", &Budget::new(1_000), notes);
        assert!(!result.truncated);
        assert_eq!(result.warnings, vec!["Added LIMIT 25".to_string()]);
        assert!(result.text.ends_with("[warning] Added LIMIT 25"));
    }

    #[test]
    fn wrapped_sequence_is_trimmed() {
        let value = json!({"result": rows(300), "error": null});
        let result = enforce(&value, "Logs:", &Budget::new(600));
        assert!(result.tokens() <= 600);
        let kept = result.retained_items.unwrap();
        assert!(kept < 300);
        assert!(result.text.contains("\"result\":["));
    }

    #[test]
    fn budget_invariant_holds_for_pathological_inputs() {
        let inputs = vec![
            json!(null),
            json!("é".repeat(5_000)),
            json!([ "x".repeat(10_000) ]),
            json!({"a": {"b": {"c": "🦀".repeat(3_000)}}}),
            rows(1_000),
            json!({"items": rows(50), "blob": "z".repeat(20_000)}),
        ];
        let notes = vec!["n".repeat(120)];
        for value in &inputs {
            for max_tokens in [0, 1, 3, 10, 50, 400, 2_500] {
                for include in [true, false] {
                    let budget = Budget::new(max_tokens).with_include_warning(include);
                    let plain = enforce(value, "Label:", &budget);
                    assert!(
                        plain.tokens() <= max_tokens,
                        "{} > {max_tokens}",
                        plain.tokens()
                    );
                    let noted = enforce_with_notes(value, "Label:", &budget, notes.clone());
                    assert!(noted.tokens() <= max_tokens);
                }
            }
        }
    }

    #[test]
    fn tighter_budget_never_keeps_more_items() {
        let value = rows(400);
        let mut last = 0;
        for max_tokens in [50, 100, 250, 500, 1_000, 2_500, 6_000, 15_000] {
            let kept = enforce(&value, "Rows:", &Budget::new(max_tokens))
                .retained_items
                .unwrap();
            assert!(kept >= last, "{max_tokens}: kept {kept} < {last}");
            last = kept;
        }
    }

    #[test]
    fn hard_truncate_respects_char_boundaries() {
        let text = "ü".repeat(100);
        let cut = hard_truncate(text, 31);
        assert!(cut.len() <= 31);
        assert!(cut.ends_with(ELLIPSIS_MARKER));
        assert_eq!(hard_truncate("abc".into(), 2), "ab");
        assert_eq!(hard_truncate("abc".into(), 10), "abc");
    }
}
