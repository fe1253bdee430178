//! Structural rewrites that bound how many rows a generated query can return.

use std::sync::OnceLock;

use regex::Regex;

use crate::db::close_line_comment;

/// Row bound applied by both guard shapes.
pub const GUARD_ROW_LIMIT: usize = 50;

/// Leading keywords that change data, schema or session state.
const MUTATING_VERBS: &[&str] = &[
    "insert", "update", "delete", "merge", "drop", "create", "alter", "truncate", "grant",
    "revoke", "copy", "call", "do", "vacuum", "reindex", "comment", "lock", "set", "reset",
];

static AGGREGATE_PATTERN: OnceLock<Regex> = OnceLock::new();
static LIMIT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn aggregate_pattern() -> &'static Regex {
    AGGREGATE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(count|sum|avg|min|max)\s*\(|group\s+by").expect("valid regex")
    })
}

fn limit_pattern() -> &'static Regex {
    LIMIT_PATTERN.get_or_init(|| Regex::new(r"(?i)\blimit\b").expect("valid regex"))
}

pub fn is_aggregate(sql: &str) -> bool {
    aggregate_pattern().is_match(sql)
}

pub fn has_limit(sql: &str) -> bool {
    limit_pattern().is_match(sql)
}

/// `select * from (<sql>) as q limit 50`
pub fn wrap_subquery(sql: &str) -> String {
    format!(
        "select * from ({}) as q limit {}",
        close_line_comment(sql),
        GUARD_ROW_LIMIT
    )
}

/// Retrieval-mode guard: appends a limit unless the statement is an
/// aggregate or already limited.
pub fn guard_retrieval(sql: &str) -> String {
    if is_aggregate(sql) || has_limit(sql) {
        sql.to_string()
    } else {
        format!("{} limit {}", close_line_comment(sql), GUARD_ROW_LIMIT)
    }
}

/// Direct-mode guard: always wraps.
pub fn guard_direct(sql: &str) -> String {
    wrap_subquery(sql)
}

/// Returns the leading keyword when it is a mutating verb.
///
/// Leading whitespace, `--` line comments, `/* */` block comments and
/// opening parentheses are skipped. Text that does not start with a
/// keyword returns `None` and is left for the database to reject.
pub fn mutating_verb(sql: &str) -> Option<&'static str> {
    let first = first_keyword(sql)?.to_ascii_lowercase();
    MUTATING_VERBS.iter().copied().find(|verb| *verb == first)
}

fn first_keyword(sql: &str) -> Option<&str> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let word = &rest[..end];
    (!word.is_empty()).then_some(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_without_limit_is_unchanged() {
        assert_eq!(guard_retrieval("select count(*) from t"), "select count(*) from t");
        assert_eq!(
            guard_retrieval("select tipo, sum (valor) from t group by tipo"),
            "select tipo, sum (valor) from t group by tipo"
        );
    }

    #[test]
    fn plain_select_gets_limit_appended() {
        assert_eq!(guard_retrieval("select * from t"), "select * from t limit 50");
    }

    #[test]
    fn explicit_limit_is_unchanged() {
        assert_eq!(guard_retrieval("select * from t limit 10"), "select * from t limit 10");
        assert_eq!(guard_retrieval("SELECT * FROM t LIMIT 5"), "SELECT * FROM t LIMIT 5");
    }

    #[test]
    fn limit_must_be_a_whole_word() {
        assert!(!has_limit("select limited_flag from t"));
        assert_eq!(
            guard_retrieval("select limited_flag from t"),
            "select limited_flag from t limit 50"
        );
    }

    #[test]
    fn aggregate_detection_is_case_insensitive() {
        assert!(is_aggregate("SELECT COUNT(*) FROM pessoas"));
        assert!(is_aggregate("select max (valor) from parcelas"));
        assert!(is_aggregate("select tipo from t GROUP   BY tipo"));
        assert!(!is_aggregate("select counter from t"));
    }

    #[test]
    fn direct_guard_always_wraps() {
        assert_eq!(
            guard_direct("SELECT count(*) AS total FROM Pessoas"),
            "select * from (SELECT count(*) AS total FROM Pessoas) as q limit 50"
        );
        assert_eq!(
            guard_direct("select * from t limit 10"),
            "select * from (select * from t limit 10) as q limit 50"
        );
    }

    #[test]
    fn trailing_line_comment_does_not_swallow_the_guard() {
        assert_eq!(
            guard_retrieval("SELECT razaosocial FROM pessoas -- todos os registros"),
            "SELECT razaosocial FROM pessoas -- todos os registros\n limit 50"
        );
        assert_eq!(
            guard_direct("SELECT razaosocial FROM pessoas -- todos os registros"),
            "select * from (SELECT razaosocial FROM pessoas -- todos os registros\n) as q limit 50"
        );
    }

    #[test]
    fn detects_mutating_verbs() {
        assert_eq!(mutating_verb("DELETE FROM pessoas"), Some("delete"));
        assert_eq!(mutating_verb("  drop table pessoas"), Some("drop"));
        assert_eq!(mutating_verb("-- limpa\nupdate t set x = 1"), Some("update"));
        assert_eq!(mutating_verb("/* x */ (insert into t values (1))"), Some("insert"));
        assert_eq!(mutating_verb("SET search_path = x"), Some("set"));
    }

    #[test]
    fn read_statements_and_free_text_pass() {
        assert_eq!(mutating_verb("select * from pessoas"), None);
        assert_eq!(mutating_verb("WITH x AS (select 1) select * from x"), None);
        assert_eq!(mutating_verb("(select 1)"), None);
        assert_eq!(mutating_verb("selecione os fornecedores"), None);
        assert_eq!(mutating_verb("donut"), None);
        assert_eq!(mutating_verb(""), None);
        assert_eq!(mutating_verb("-- only a comment"), None);
    }
}
