//! The full pipeline: cap, project, enforce.

use serde_json::Value;
use tracing::debug;

use super::capper::{FilterSpec, cap};
use super::policy::EntityKind;
use super::projector::{project, project_all};
use crate::budget::{Budget, FormatTier, enforce_with_notes};
use crate::tools::ToolOutput;

/// Everything [`render`] needs besides the value itself.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Entity kind of the value (or of each element). `None` keeps fields
    /// as they are, e.g. for raw SQL rows.
    pub kind: Option<EntityKind>,
    pub tier: FormatTier,
    /// Applied to sequences only.
    pub filter: Option<FilterSpec>,
    /// Context header written above the payload.
    pub label: String,
    pub budget: Budget,
    /// Earlier alterations, e.g. from the query governor.
    pub notes: Vec<String>,
}

impl RenderRequest {
    pub fn new(label: impl Into<String>, tier: FormatTier, budget: Budget) -> Self {
        Self {
            kind: None,
            tier,
            filter: None,
            label: label.into(),
            budget,
            notes: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// Bound `value` for return to the caller.
///
/// Small, unaltered results come back as [`ToolOutput::Structured`];
/// anything filtered, limited or truncated comes back as text carrying its
/// warnings. Fails only on an invalid name pattern.
pub fn render(value: Value, request: RenderRequest) -> Result<ToolOutput, regex::Error> {
    let RenderRequest {
        kind,
        tier,
        filter,
        label,
        budget,
        mut notes,
    } = request;

    let projected = match value {
        Value::Array(items) => {
            let items = match filter.filter(|f| !f.is_noop()) {
                Some(spec) => {
                    let capped = cap(items, &spec)?;
                    notes.extend(capped.notes());
                    capped.items
                }
                None => items,
            };
            match kind {
                Some(kind) => Value::Array(project_all(&items, kind, tier)),
                None => Value::Array(items),
            }
        }
        other => match kind {
            Some(kind) => project(&other, kind, tier),
            None => other,
        },
    };

    let enforced = enforce_with_notes(&projected, &label, &budget, notes);
    debug!(
        "rendered {label:?} at {tier}: ~{} of {} tokens, {} warnings",
        enforced.tokens(),
        budget.max_tokens,
        enforced.warnings.len()
    );

    if enforced.warnings.is_empty() {
        Ok(ToolOutput::Structured(projected))
    } else {
        Ok(ToolOutput::Text {
            text: enforced.text,
            warnings: enforced.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::estimate_text;
    use serde_json::json;

    fn tables(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| {
                    json!({
                        "id": i,
                        "schema": "public",
                        "name": format!("t{i}"),
                        "rows": i,
                        "bytes": 8_192,
                        "columns": [{"name": "id", "data_type": "bigint"}]
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn small_result_stays_structured() {
        let req = RenderRequest::new("Tables:", FormatTier::NamesOnly, Budget::new(2_500))
            .with_kind(EntityKind::Table);
        let out = render(tables(2), req).unwrap();
        assert_eq!(
            out,
            ToolOutput::Structured(json!([
                {"schema": "public", "name": "t0", "rows": 0},
                {"schema": "public", "name": "t1", "rows": 1}
            ]))
        );
    }

    #[test]
    fn filter_notes_force_text() {
        let filter = FilterSpec::new("name").with_pattern(Some("t1*".into()));
        let req = RenderRequest::new("Tables:", FormatTier::NamesOnly, Budget::new(2_500))
            .with_kind(EntityKind::Table)
            .with_filter(filter);
        let ToolOutput::Text { text, warnings } = render(tables(12), req).unwrap() else {
            panic!("expected text output");
        };
        // t1, t10, t11
        assert_eq!(warnings, vec!["Filtered to 3 of 12 items (name matches 't1*')".to_string()]);
        assert!(text.starts_with("Tables:\n"));
        assert!(text.contains("\"t11\""));
        assert!(!text.contains("\"t2\""));
    }

    #[test]
    fn governor_notes_precede_truncation() {
        let rows = Value::Array((0..500).map(|i| json!({"id": i, "email": "a@b.c"})).collect());
        let req = RenderRequest::new("Query result:", FormatTier::Summary, Budget::new(200))
            .with_notes(vec!["Added LIMIT 25".into()]);
        let out = render(rows, req).unwrap();
        let warnings = out.warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0], "Added LIMIT 25");
        assert!(warnings[1].starts_with("Response truncated"));
        assert!(estimate_text(&out.into_text()) <= 200);
    }

    #[test]
    fn single_entity_is_projected() {
        let bundle = json!({"types": "a\nb\nc"});
        let req = RenderRequest::new("Types:", FormatTier::NamesOnly, Budget::new(100))
            .with_kind(EntityKind::TypesBundle);
        assert_eq!(
            render(bundle, req).unwrap(),
            ToolOutput::Structured(json!({"line_count": 3}))
        );
    }
}
