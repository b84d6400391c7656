//! Pre-projection filtering of result sequences.
//!
//! The capper shrinks the working set before any reshaping runs, so field
//! projection never touches elements that are about to be discarded. Filters
//! apply in a fixed order: name glob, numeric range, then the hard item cap.

use regex::{Regex, RegexBuilder};
use serde_json::Value;

/// Translate a shell-style glob into an anchored, case-insensitive regex.
///
/// `*` matches any run of characters and `?` exactly one. Every other
/// character is matched literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    RegexBuilder::new(&format!("^{escaped}$"))
        .case_insensitive(true)
        .build()
}

/// Inclusive bounds over a numeric field. A missing bound is open.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    pub field: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeFilter {
    fn admits(&self, item: &Value) -> bool {
        let Some(n) = item.get(&self.field).and_then(Value::as_f64) else {
            return false;
        };
        self.min.is_none_or(|min| n >= min) && self.max.is_none_or(|max| n <= max)
    }

    fn describe(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{} between {min} and {max}", self.field),
            (Some(min), None) => format!("{} >= {min}", self.field),
            (None, Some(max)) => format!("{} <= {max}", self.field),
            (None, None) => format!("{} present", self.field),
        }
    }
}

/// Which elements of a sequence survive into projection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    /// Glob over `name_field`.
    pub pattern: Option<String>,
    /// Field the glob is matched against.
    pub name_field: String,
    pub range: Option<RangeFilter>,
    /// Applied last, keeping the first N in original order.
    pub max_items: Option<usize>,
}

impl FilterSpec {
    pub fn new(name_field: impl Into<String>) -> Self {
        Self {
            name_field: name_field.into(),
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern.filter(|p| !p.is_empty());
        self
    }

    pub fn with_range(mut self, field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        self.range = (min.is_some() || max.is_some()).then(|| RangeFilter {
            field: field.into(),
            min,
            max,
        });
        self
    }

    pub fn with_max_items(mut self, max: Option<usize>) -> Self {
        self.max_items = max;
        self
    }

    /// Whether this spec can remove anything at all.
    pub fn is_noop(&self) -> bool {
        self.pattern.is_none() && self.range.is_none() && self.max_items.is_none()
    }
}

/// Output of [`cap`].
#[derive(Debug, Clone, PartialEq)]
pub struct Capped {
    pub items: Vec<Value>,
    /// Length of the input sequence.
    pub total: usize,
    /// Elements that passed the pattern and range filters, before the cap.
    pub matched: usize,
    filters: Vec<String>,
}

impl Capped {
    /// Warning lines describing what was removed. Empty when nothing was.
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.matched < self.total {
            notes.push(format!(
                "Filtered to {} of {} items ({})",
                self.matched,
                self.total,
                self.filters.join(", ")
            ));
        }
        if self.items.len() < self.matched {
            notes.push(format!(
                "Showing the first {} of {} matching items; raise max_items or narrow the filter to see more",
                self.items.len(),
                self.matched
            ));
        }
        notes
    }
}

/// Apply `spec` to `items`. Fails only when the name pattern does not compile.
pub fn cap(items: Vec<Value>, spec: &FilterSpec) -> Result<Capped, regex::Error> {
    let total = items.len();
    let mut filters = Vec::new();
    let name_re = match &spec.pattern {
        Some(pattern) => {
            filters.push(format!("{} matches '{pattern}'", spec.name_field));
            Some(glob_to_regex(pattern)?)
        }
        None => None,
    };
    if let Some(range) = &spec.range {
        filters.push(range.describe());
    }

    let mut kept: Vec<Value> = items
        .into_iter()
        .filter(|item| {
            name_re.as_ref().is_none_or(|re| {
                item.get(&spec.name_field)
                    .and_then(Value::as_str)
                    .is_some_and(|name| re.is_match(name))
            })
        })
        .filter(|item| spec.range.as_ref().is_none_or(|r| r.admits(item)))
        .collect();

    let matched = kept.len();
    if let Some(max) = spec.max_items {
        kept.truncate(max);
    }
    Ok(Capped {
        items: kept,
        total,
        matched,
        filters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tables(names: &[&str]) -> Vec<Value> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| json!({"name": n, "rows": i * 100}))
            .collect()
    }

    fn names(capped: &Capped) -> Vec<&str> {
        capped
            .items
            .iter()
            .map(|v| v["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn prefix_glob() {
        let spec = FilterSpec::new("name").with_pattern(Some("user*".into()));
        let capped = cap(tables(&["users", "user_logs", "auth_users"]), &spec).unwrap();
        assert_eq!(names(&capped), ["users", "user_logs"]);
        assert_eq!(capped.total, 3);
        assert_eq!(capped.matched, 2);
    }

    #[test]
    fn glob_is_case_insensitive_and_literal() {
        let re = glob_to_regex("Auth.?sers").unwrap();
        assert!(re.is_match("auth.users"));
        assert!(!re.is_match("authxusers"));
        assert!(glob_to_regex("a+b(c)").unwrap().is_match("A+B(C)"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let re = glob_to_regex("log_?").unwrap();
        assert!(re.is_match("log_1"));
        assert!(!re.is_match("log_12"));
    }

    #[test]
    fn range_is_inclusive() {
        let spec = FilterSpec::new("name").with_range("rows", Some(100.0), Some(200.0));
        let capped = cap(tables(&["a", "b", "c", "d"]), &spec).unwrap();
        assert_eq!(names(&capped), ["b", "c"]);
    }

    #[test]
    fn range_excludes_items_without_field() {
        let items = vec![json!({"name": "a"}), json!({"name": "b", "rows": 5})];
        let spec = FilterSpec::new("name").with_range("rows", None, Some(10.0));
        assert_eq!(names(&cap(items, &spec).unwrap()), ["b"]);
    }

    #[test]
    fn max_items_applied_after_filters() {
        let spec = FilterSpec::new("name")
            .with_pattern(Some("t*".into()))
            .with_max_items(Some(2));
        let capped = cap(tables(&["x", "t1", "t2", "t3"]), &spec).unwrap();
        assert_eq!(names(&capped), ["t1", "t2"]);
        assert_eq!(capped.matched, 3);
        let notes = capped.notes();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("3 of 4"));
        assert!(notes[1].contains("first 2 of 3"));
    }

    #[test]
    fn no_filters_no_notes() {
        let spec = FilterSpec::new("name");
        assert!(spec.is_noop());
        let capped = cap(tables(&["a", "b"]), &spec).unwrap();
        assert_eq!(capped.items.len(), 2);
        assert!(capped.notes().is_empty());
    }

    #[test]
    fn empty_pattern_is_ignored() {
        let spec = FilterSpec::new("name").with_pattern(Some(String::new()));
        assert!(spec.pattern.is_none());
    }
}
