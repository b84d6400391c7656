//! Lexical auto-limiting of unbounded `SELECT` statements.
//!
//! The governor is a heuristic safety net, not a parser. It classifies a
//! statement by its leading keyword and looks for a `LIMIT` keyword anywhere
//! in the text, so common-table expressions (`WITH ... SELECT`), set
//! operations and a `LIMIT` inside a subquery can all fool it. Statements it
//! does not recognise are passed through byte-for-byte.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static LEADING_SELECT: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^\s*SELECT\b"));
static LIMIT: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bLIMIT\b"));
static SELECT_STAR: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bSELECT\s+\*"));
static JOIN: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bJOIN\b"));
static WHERE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bWHERE\b"));
static ORDER_BY: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bORDER\s+BY\b"));
/// Clauses that must follow `LIMIT`, so the `ORDER BY` clause ends before them.
static AFTER_ORDER_BY: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\s+(OFFSET\b|FOR\s+(UPDATE|SHARE)\b)|\s*;"));

fn re(pattern: &str) -> Regex {
    // Patterns are fixed literals covered by the tests below.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid governor pattern {pattern}: {e}"))
}

/// Result of [`govern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Governed {
    pub sql: String,
    pub warnings: Vec<String>,
    pub modified: bool,
}

impl Governed {
    fn unchanged(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            warnings: Vec::new(),
            modified: false,
        }
    }
}

/// Whether `sql` lexically begins with `SELECT`.
pub fn is_read_query(sql: &str) -> bool {
    LEADING_SELECT.is_match(sql)
}

/// Inject `LIMIT auto_limit` into an unbounded `SELECT`.
///
/// Disabled, non-`SELECT` and already-limited statements come back
/// unchanged with no warnings.
pub fn govern(sql: &str, auto_limit: usize, disabled: bool) -> Governed {
    if disabled || !is_read_query(sql) || LIMIT.is_match(sql) {
        return Governed::unchanged(sql);
    }

    let mut warnings = Vec::new();
    let risks = risk_flags(sql);
    if !risks.is_empty() {
        warnings.push(format!(
            "Query may return a large result ({}); capped at {auto_limit} rows",
            risks.join(", ")
        ));
    }

    let rewritten = insert_limit(sql, auto_limit);
    debug!("auto-limited query: {rewritten}");
    warnings.push(format!(
        "Query was modified: added LIMIT {auto_limit}. Pass disable_auto_limit: true to run it as written"
    ));

    Governed {
        sql: rewritten,
        warnings,
        modified: true,
    }
}

fn risk_flags(sql: &str) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if SELECT_STAR.is_match(sql) {
        flags.push("SELECT *");
    }
    if JOIN.is_match(sql) {
        flags.push("JOIN");
    }
    if !WHERE.is_match(sql) {
        flags.push("no WHERE clause");
    }
    flags
}

fn insert_limit(sql: &str, auto_limit: usize) -> String {
    let (code, comment) = split_trailing_comment(sql);
    let comment = comment.trim_end();
    if let Some(order_by) = ORDER_BY.find_iter(code).last() {
        let rest = code.get(order_by.end()..).unwrap_or_default();
        let clause_end = AFTER_ORDER_BY
            .find(rest)
            .map_or(rest.trim_end().len(), |m| m.start());
        let at = order_by.end() + clause_end;
        let (head, tail) = code.split_at(at);
        return format!("{head} LIMIT {auto_limit}{tail}{comment}");
    }
    let body = code.trim_end().trim_end_matches(';').trim_end();
    if comment.is_empty() {
        format!("{body} LIMIT {auto_limit};")
    } else {
        format!("{body} LIMIT {auto_limit}; {comment}")
    }
}

/// Split off a `--` comment on the last line, so the limit lands in code.
/// A `--` inside a quoted literal does not count.
fn split_trailing_comment(sql: &str) -> (&str, &str) {
    let line_start = sql.trim_end().rfind('\n').map_or(0, |i| i + 1);
    let line = sql.get(line_start..).unwrap_or_default();
    let comment = line.match_indices("--").map(|(i, _)| i).find(|&i| {
        line.get(..i)
            .is_some_and(|before| before.matches('\'').count() % 2 == 0)
    });
    match comment {
        Some(i) => sql.split_at(line_start + i),
        None => (sql, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_select_gets_limit() {
        let out = govern("SELECT * FROM users", 25, false);
        assert_eq!(out.sql, "SELECT * FROM users LIMIT 25;");
        assert!(out.modified);
        assert_eq!(out.warnings.len(), 2);
        assert!(out.warnings[0].contains("SELECT *"));
        assert!(out.warnings[0].contains("no WHERE clause"));
        assert!(out.warnings[1].contains("disable_auto_limit: true"));
    }

    #[test]
    fn already_bounded_is_untouched() {
        let sql = "SELECT * FROM users LIMIT 100";
        let out = govern(sql, 25, false);
        assert_eq!(out, Governed::unchanged(sql));
    }

    #[test]
    fn non_select_is_byte_for_byte() {
        let sql = "UPDATE users SET name = 'x'";
        let out = govern(sql, 25, false);
        assert_eq!(out.sql, sql);
        assert!(out.warnings.is_empty());
        assert!(!out.modified);
    }

    #[test]
    fn order_by_insertion() {
        let out = govern("SELECT * FROM users ORDER BY created_at DESC", 10, false);
        assert_eq!(out.sql, "SELECT * FROM users ORDER BY created_at DESC LIMIT 10");
    }

    #[test]
    fn order_by_before_offset_and_terminator() {
        let out = govern("select id from t where x = 1 order by id offset 5;", 10, false);
        assert_eq!(out.sql, "select id from t where x = 1 order by id LIMIT 10 offset 5;");
        let out = govern("SELECT id FROM t WHERE a ORDER BY id;  ", 3, false);
        assert_eq!(out.sql, "SELECT id FROM t WHERE a ORDER BY id LIMIT 3;  ");
        let out = govern("SELECT id FROM t WHERE a ORDER BY id FOR UPDATE", 3, false);
        assert_eq!(out.sql, "SELECT id FROM t WHERE a ORDER BY id LIMIT 3 FOR UPDATE");
    }

    #[test]
    fn trailing_terminator_is_normalised() {
        let out = govern("  SELECT id FROM t WHERE a = 1 ;\n", 5, false);
        assert_eq!(out.sql, "  SELECT id FROM t WHERE a = 1 LIMIT 5;");
        // Narrow, filtered selects carry no size-risk warning.
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn trailing_line_comment_stays_a_comment() {
        let out = govern("SELECT * FROM users -- all of them", 25, false);
        assert_eq!(out.sql, "SELECT * FROM users LIMIT 25; -- all of them");
        assert!(out.modified);

        let out = govern("SELECT * FROM t ORDER BY id -- newest; first\n", 5, false);
        assert_eq!(out.sql, "SELECT * FROM t ORDER BY id LIMIT 5 -- newest; first");

        let out = govern("SELECT id FROM t\n-- note\nWHERE a = 1;", 5, false);
        assert_eq!(out.sql, "SELECT id FROM t\n-- note\nWHERE a = 1 LIMIT 5;");

        let out = govern("SELECT * FROM t WHERE s = 'a--b'", 5, false);
        assert_eq!(out.sql, "SELECT * FROM t WHERE s = 'a--b' LIMIT 5;");
    }

    #[test]
    fn join_is_flagged() {
        let out = govern("SELECT a.id FROM a JOIN b ON a.id = b.id WHERE b.x", 5, false);
        assert!(out.warnings[0].contains("JOIN"));
        assert!(!out.warnings[0].contains("WHERE"));
    }

    #[test]
    fn disabled_is_untouched() {
        let sql = "SELECT * FROM users";
        assert_eq!(govern(sql, 25, true), Governed::unchanged(sql));
    }

    #[test]
    fn limit_keyword_is_case_insensitive() {
        assert!(!govern("select * from t limit 1", 25, false).modified);
        // `unlimited` is not the LIMIT keyword.
        assert!(govern("select unlimited from t", 25, false).modified);
    }

    #[test]
    fn read_query_classification() {
        assert!(is_read_query("  select 1"));
        assert!(is_read_query("SELECT\n1"));
        assert!(!is_read_query("selected"));
        assert!(!is_read_query("INSERT INTO t SELECT 1"));
        assert!(!is_read_query("WITH x AS (SELECT 1) SELECT * FROM x"));
    }

    #[test]
    fn never_panics_on_odd_input() {
        for sql in ["", ";", "SELECT", "select ORDER BY", "SELECT é ORDER BY ü;", "ORDER BY"] {
            let _ = govern(sql, 0, false);
        }
    }
}
