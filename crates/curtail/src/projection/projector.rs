//! Reshape entities according to their [`FieldPolicy`].

use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};

use super::policy::{Derive, EntityKind, FieldPolicy, FlagRule, policy};
use crate::budget::FormatTier;

/// Suffix of a cut excerpt.
pub const EXCERPT_SUFFIX: &str = "...";

/// Project a single entity. Non-objects pass through unchanged.
pub fn project(entity: &Value, kind: EntityKind, tier: FormatTier) -> Value {
    let Value::Object(source) = entity else {
        return entity.clone();
    };
    let policy = policy(kind, tier);

    let mut out: Map<String, Value> = source
        .iter()
        .filter(|(k, _)| policy.keeps(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for rule in policy.derive {
        apply_derive(rule, source, &mut out);
    }
    if let Some(flags) = &policy.flags {
        collapse_flags(flags, source, &mut out, policy);
    }
    for (field, nested_kind) in policy.nested {
        if let Some(Value::Array(items)) = out.get_mut(*field) {
            *items = project_all(items, *nested_kind, tier);
        }
    }

    out.retain(|_, v| !is_empty(v));
    Value::Object(out)
}

/// Project every element of a sequence.
pub fn project_all(items: &[Value], kind: EntityKind, tier: FormatTier) -> Vec<Value> {
    items.iter().map(|item| project(item, kind, tier)).collect()
}

fn apply_derive(rule: &Derive, source: &Map<String, Value>, out: &mut Map<String, Value>) {
    match *rule {
        Derive::Count { field, into } => {
            let count = match source.get(field) {
                Some(Value::Array(a)) => a.len(),
                Some(Value::Object(o)) => o.len(),
                Some(Value::String(s)) => s.lines().count(),
                _ => return,
            };
            out.insert(into.to_string(), Value::from(count));
        }
        Derive::Excerpt { field, max_chars } => {
            if let Some(Value::String(text)) = out.get_mut(field)
                && let Some(cut) = excerpt(text, max_chars)
            {
                *text = cut;
            }
        }
        Derive::Micros { field } => {
            let rendered = out
                .get(field)
                .and_then(Value::as_i64)
                .and_then(DateTime::from_timestamp_micros)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true));
            if let Some(rendered) = rendered {
                out.insert(field.to_string(), Value::String(rendered));
            }
        }
    }
}

fn collapse_flags(
    rule: &FlagRule,
    source: &Map<String, Value>,
    out: &mut Map<String, Value>,
    policy: &FieldPolicy,
) {
    let options: Vec<Value> = rule
        .fields
        .iter()
        .filter(|(field, _)| source.get(*field) == Some(&Value::Bool(true)))
        .map(|(_, label)| Value::from(*label))
        .collect();
    for (field, _) in rule.fields {
        out.remove(*field);
    }
    if policy.keeps(rule.into) {
        out.insert(rule.into.to_string(), Value::Array(options));
    }
}

/// `Some(cut)` when `text` is longer than `max_chars` characters.
pub fn excerpt(text: &str, max_chars: usize) -> Option<String> {
    text.chars().nth(max_chars)?;
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(EXCERPT_SUFFIX);
    Some(cut)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Value {
        json!({
            "id": 16_385,
            "schema": "public",
            "name": "users",
            "rows": 1_204,
            "bytes": 98_304,
            "replica_identity": "DEFAULT",
            "rls_enabled": true,
            "primary_keys": ["id"],
            "comment": "c".repeat(400),
            "columns": [
                {
                    "name": "id",
                    "data_type": "bigint",
                    "format": "int8",
                    "is_identity": true,
                    "is_generated": false,
                    "is_nullable": false,
                    "is_updatable": true,
                    "is_unique": true,
                    "default_value": null,
                    "comment": ""
                },
                {
                    "name": "email",
                    "data_type": "text",
                    "format": "text",
                    "is_identity": false,
                    "is_generated": false,
                    "is_nullable": true,
                    "is_updatable": true,
                    "is_unique": false,
                    "default_value": null
                }
            ],
            "relationships": []
        })
    }

    #[test]
    fn names_only_keeps_identity_and_cardinality() {
        let out = project(&table(), EntityKind::Table, FormatTier::NamesOnly);
        assert_eq!(out, json!({"schema": "public", "name": "users", "rows": 1_204}));
    }

    #[test]
    fn summary_replaces_collections_with_counts() {
        let out = project(&table(), EntityKind::Table, FormatTier::Summary);
        assert_eq!(out["column_count"], 2);
        assert_eq!(out["relationship_count"], 0);
        assert!(out.get("columns").is_none());
        assert!(out.get("bytes").is_none());
        assert!(out.get("id").is_none());
        let comment = out["comment"].as_str().unwrap();
        assert_eq!(comment.chars().count(), 150 + EXCERPT_SUFFIX.len());
        assert!(comment.ends_with(EXCERPT_SUFFIX));
    }

    #[test]
    fn detailed_projects_nested_columns() {
        let out = project(&table(), EntityKind::Table, FormatTier::Detailed);
        assert_eq!(out["bytes"], 98_304);
        // Empty relationships are omitted, not emitted as [].
        assert!(out.get("relationships").is_none());
        let id = &out["columns"][0];
        assert_eq!(id["options"], json!(["identity", "updatable", "unique"]));
        assert!(id.get("is_identity").is_none());
        assert!(id.get("default_value").is_none());
        assert!(id.get("comment").is_none());
        assert_eq!(out["columns"][1]["options"], json!(["nullable", "updatable"]));
    }

    #[test]
    fn options_omitted_when_no_flag_is_set() {
        let column = json!({"name": "x", "data_type": "text", "is_nullable": false});
        let out = project(&column, EntityKind::Column, FormatTier::Summary);
        assert_eq!(out, json!({"name": "x", "data_type": "text"}));
    }

    #[test]
    fn log_timestamps_render_as_rfc3339() {
        let record = json!({
            "id": "a1",
            "timestamp": 1_700_000_000_123_456_i64,
            "event_message": "GET /rest/v1/users 200",
            "metadata": [{"request": {}}]
        });
        let out = project(&record, EntityKind::LogRecord, FormatTier::Summary);
        assert_eq!(out["timestamp"], "2023-11-14T22:13:20.123456Z");
        assert!(out.get("metadata").is_none());
        assert!(out.get("id").is_none());
    }

    #[test]
    fn string_timestamps_are_left_alone() {
        let record = json!({"timestamp": "yesterday", "event_message": "x"});
        let out = project(&record, EntityKind::LogRecord, FormatTier::Detailed);
        assert_eq!(out["timestamp"], "yesterday");
    }

    #[test]
    fn types_bundle_line_count() {
        let bundle = json!({"types": "export type A = 1;\nexport type B = 2;\n"});
        let out = project(&bundle, EntityKind::TypesBundle, FormatTier::NamesOnly);
        assert_eq!(out, json!({"line_count": 2}));
        let full = project(&bundle, EntityKind::TypesBundle, FormatTier::Detailed);
        assert_eq!(full, bundle);
    }

    #[test]
    fn non_objects_pass_through() {
        let v = json!(["a", 1, null]);
        assert_eq!(project(&v, EntityKind::Table, FormatTier::Summary), v);
        assert_eq!(
            project_all(&[json!(3)], EntityKind::Migration, FormatTier::NamesOnly),
            vec![json!(3)]
        );
    }

    #[test]
    fn excerpt_counts_characters() {
        assert_eq!(excerpt("héllo", 10), None);
        assert_eq!(excerpt("héllo", 2).as_deref(), Some("hé..."));
    }
}
