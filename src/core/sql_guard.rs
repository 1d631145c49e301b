//! Read-only checks for generated SQL.
//!
//! The language model is asked for a single `SELECT`, but its output is
//! untrusted. Before anything reaches the database the statement is scanned
//! with string literals, quoted identifiers and comments masked out, and
//! rejected unless it is one read-only query.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("no SQL statement was produced")]
    Empty,

    #[error("only a single statement is allowed")]
    MultipleStatements,

    #[error("statement must start with SELECT or WITH, found {0}")]
    NotASelect(String),

    #[error("statement contains forbidden keyword {0}")]
    ForbiddenKeyword(String),

    #[error("statement calls forbidden function {0}")]
    ForbiddenFunction(String),

    #[error("statement uses parameter placeholder {0}, but no parameters are bound")]
    Placeholder(String),

    #[error("unterminated {0}")]
    Unterminated(&'static str),
}

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "DROP", "ALTER", "CREATE", "TRUNCATE",
    "GRANT", "REVOKE", "COPY", "VACUUM", "CALL", "DO", "EXECUTE", "LOCK", "REINDEX", "CLUSTER",
    "SET", "RESET", "LISTEN", "NOTIFY", "PREPARE", "DEALLOCATE", "DISCARD", "REFRESH", "INTO",
];

const FORBIDDEN_FUNCTIONS: &[&str] = &[
    "PG_SLEEP", "PG_SLEEP_FOR", "PG_SLEEP_UNTIL", "PG_READ_FILE", "PG_READ_BINARY_FILE",
    "PG_LS_DIR", "PG_STAT_FILE", "LO_IMPORT", "LO_EXPORT", "DBLINK", "DBLINK_EXEC",
    "PG_TERMINATE_BACKEND", "PG_CANCEL_BACKEND", "PG_RELOAD_CONF", "SET_CONFIG",
];

/// Check that `sql` is a single read-only statement.
///
/// Returns the statement trimmed, with comments blanked out and without its
/// trailing semicolon.
pub fn sanitize_sql(sql: &str) -> Result<String, GuardError> {
    let chars: Vec<char> = sql.chars().collect();
    let scan = scan(&chars)?;
    let masked = &scan.masked;

    // Cut at the first statement terminator; only whitespace may follow it.
    let end = match masked.iter().position(|&c| c == ';') {
        Some(pos) => {
            if masked[pos + 1..].iter().any(|c| !c.is_whitespace() && *c != ';') {
                return Err(GuardError::MultipleStatements);
            }
            pos
        }
        None => masked.len(),
    };

    if let Some(placeholder) = find_placeholder(&masked[..end]) {
        return Err(GuardError::Placeholder(placeholder));
    }

    let code: String = masked[..end].iter().collect();
    let mut words = code
        .split(|c: char| !is_ident_char(c))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_uppercase())
        .peekable();

    match words.peek() {
        None => return Err(GuardError::Empty),
        Some(first) if first != "SELECT" && first != "WITH" => {
            return Err(GuardError::NotASelect(first.clone()));
        }
        Some(_) => {}
    }

    for word in words {
        if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
            return Err(GuardError::ForbiddenKeyword(word));
        }
        if FORBIDDEN_FUNCTIONS.contains(&word.as_str()) {
            return Err(GuardError::ForbiddenFunction(word.to_lowercase()));
        }
    }

    // "pg_sleep"(1) still resolves to pg_sleep; quoted names are case-sensitive
    for ident in &scan.quoted_identifiers {
        let upper = ident.to_uppercase();
        if *ident == ident.to_lowercase() && FORBIDDEN_FUNCTIONS.contains(&upper.as_str()) {
            return Err(GuardError::ForbiddenFunction(ident.clone()));
        }
    }

    // Comments are blanked so the statement can be embedded in a larger query
    let statement: String = chars[..end]
        .iter()
        .zip(&scan.comment)
        .map(|(&c, &in_comment)| if in_comment { ' ' } else { c })
        .collect();
    Ok(statement.trim().to_string())
}

/// Result of scanning a statement for literals, identifiers and comments.
struct Scan {
    /// Input with literals, quoted identifiers and comments replaced by
    /// spaces, character positions aligned with the input
    masked: Vec<char>,
    /// Positions covered by a comment
    comment: Vec<bool>,
    /// Contents of every double-quoted identifier, unescaped
    quoted_identifiers: Vec<String>,
}

fn scan(chars: &[char]) -> Result<Scan, GuardError> {
    let mut masked = chars.to_vec();
    let mut comment = vec![false; chars.len()];
    let mut quoted_identifiers = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        match chars[i] {
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                comment[start..i].iter_mut().for_each(|c| *c = true);
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let mut depth = 0usize;
                loop {
                    if i >= chars.len() {
                        return Err(GuardError::Unterminated("comment"));
                    }
                    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                        depth += 1;
                        i += 2;
                    } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        depth -= 1;
                        i += 2;
                        if depth == 0 {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
                comment[start..i].iter_mut().for_each(|c| *c = true);
            }
            '\'' => {
                // E'...' strings honour backslash escapes
                let escapes = i > 0
                    && matches!(chars[i - 1], 'E' | 'e')
                    && (i < 2 || !is_ident_char(chars[i - 2]));
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(GuardError::Unterminated("string literal")),
                        Some('\\') if escapes => i += 2,
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => i += 2,
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '"' => {
                let mut ident = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(GuardError::Unterminated("quoted identifier")),
                        Some('"') if chars.get(i + 1) == Some(&'"') => {
                            ident.push('"');
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(&c) => {
                            ident.push(c);
                            i += 1;
                        }
                    }
                }
                quoted_identifiers.push(ident);
            }
            '$' => match dollar_tag_len(chars, i) {
                Some(len) => {
                    let tag = &chars[i..i + len];
                    i += len;
                    loop {
                        if i >= chars.len() {
                            return Err(GuardError::Unterminated("dollar-quoted string"));
                        }
                        if chars[i..].starts_with(tag) {
                            i += len;
                            break;
                        }
                        i += 1;
                    }
                }
                None => {
                    i += 1;
                    continue;
                }
            },
            _ => {
                i += 1;
                continue;
            }
        }

        let end = i.min(chars.len());
        masked[start..end].iter_mut().for_each(|c| *c = ' ');
    }

    Ok(Scan {
        masked,
        comment,
        quoted_identifiers,
    })
}

/// First `$n` parameter marker in masked code, if any.
fn find_placeholder(masked: &[char]) -> Option<String> {
    masked.iter().enumerate().find_map(|(i, &c)| {
        let starts_marker = c == '$'
            && (i == 0 || !is_ident_char(masked[i - 1]))
            && masked.get(i + 1).map_or(false, |d| d.is_ascii_digit());
        starts_marker.then(|| {
            let digits: String = masked[i + 1..].iter().take_while(|d| d.is_ascii_digit()).collect();
            format!("${}", digits)
        })
    })
}

/// Length of a `$tag$` opener at `i`, if there is one.
fn dollar_tag_len(chars: &[char], i: usize) -> Option<usize> {
    if i > 0 && is_ident_char(chars[i - 1]) {
        return None;
    }
    let mut j = i + 1;
    match chars.get(j) {
        Some('$') => return Some(2),
        Some(c) if c.is_alphabetic() || *c == '_' => {}
        _ => return None,
    }
    while j < chars.len() && is_ident_char(chars[j]) {
        j += 1;
    }
    (chars.get(j) == Some(&'$')).then(|| j - i + 1)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_select() {
        let sql = sanitize_sql("SELECT name, price FROM products ORDER BY price DESC LIMIT 5;").unwrap();
        assert_eq!(sql, "SELECT name, price FROM products ORDER BY price DESC LIMIT 5");
    }

    #[test]
    fn test_accepts_cte() {
        let sql = "WITH totals AS (SELECT customer_id, SUM(total) AS spent FROM orders GROUP BY 1)\n\
                   SELECT * FROM totals WHERE spent > 100";
        assert!(sanitize_sql(sql).is_ok());
    }

    #[test]
    fn test_keywords_inside_literals_are_ignored() {
        let sql = "SELECT * FROM reviews WHERE body ILIKE '%delete my account; drop%'";
        assert!(sanitize_sql(sql).is_ok());

        let sql = r#"SELECT "update" FROM audit_log"#;
        assert!(sanitize_sql(sql).is_ok());

        let sql = "SELECT $$ DROP TABLE x; $$ AS text";
        assert!(sanitize_sql(sql).is_ok());
    }

    #[test]
    fn test_trailing_comment_after_semicolon() {
        let sql = sanitize_sql("SELECT 1; -- done").unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn test_rejects_multiple_statements() {
        assert_eq!(
            sanitize_sql("SELECT 1; DELETE FROM orders"),
            Err(GuardError::MultipleStatements)
        );
    }

    #[test]
    fn test_rejects_writes() {
        assert_eq!(
            sanitize_sql("UPDATE products SET price = 0"),
            Err(GuardError::NotASelect("UPDATE".to_string()))
        );
        assert_eq!(
            sanitize_sql("WITH gone AS (DELETE FROM orders RETURNING *) SELECT * FROM gone"),
            Err(GuardError::ForbiddenKeyword("DELETE".to_string()))
        );
        assert_eq!(
            sanitize_sql("SELECT * INTO backup FROM orders"),
            Err(GuardError::ForbiddenKeyword("INTO".to_string()))
        );
    }

    #[test]
    fn test_rejects_forbidden_functions() {
        assert_eq!(
            sanitize_sql("SELECT pg_sleep(100)"),
            Err(GuardError::ForbiddenFunction("pg_sleep".to_string()))
        );
    }

    #[test]
    fn test_comment_cannot_hide_terminator() {
        // the semicolon inside the comment is masked; the real one is not
        assert_eq!(
            sanitize_sql("SELECT 1 /* ; */ ; DROP TABLE users"),
            Err(GuardError::MultipleStatements)
        );
    }

    #[test]
    fn test_rejects_empty_and_unterminated() {
        assert_eq!(sanitize_sql("   "), Err(GuardError::Empty));
        assert_eq!(sanitize_sql("-- nothing here"), Err(GuardError::Empty));
        assert_eq!(
            sanitize_sql("SELECT 'oops"),
            Err(GuardError::Unterminated("string literal"))
        );
    }

    #[test]
    fn test_escape_strings() {
        assert!(sanitize_sql(r"SELECT * FROM products WHERE name = E'it\'s; fine'").is_ok());
    }

    #[test]
    fn test_rejects_parameter_placeholders() {
        assert_eq!(
            sanitize_sql("SELECT * FROM orders WHERE id = $1"),
            Err(GuardError::Placeholder("$1".to_string()))
        );
        assert_eq!(
            sanitize_sql("SELECT $12::int"),
            Err(GuardError::Placeholder("$12".to_string()))
        );
        // inside a literal or dollar quote it is just text
        assert!(sanitize_sql("SELECT '$1' AS price_label").is_ok());
        assert!(sanitize_sql("SELECT $$cost $1$$ AS note").is_ok());
    }

    #[test]
    fn test_trailing_comments_are_removed() {
        assert_eq!(sanitize_sql("SELECT 1 AS one -- the answer").unwrap(), "SELECT 1 AS one");
        assert_eq!(sanitize_sql("SELECT 1 AS one /* the answer */").unwrap(), "SELECT 1 AS one");

        let sql = sanitize_sql("SELECT id -- order id\nFROM orders").unwrap();
        assert!(sql.starts_with("SELECT id "));
        assert!(sql.ends_with("\nFROM orders"));
        assert!(!sql.contains("order id"));
    }

    #[test]
    fn test_comment_markers_inside_literals_are_kept() {
        let sql = "SELECT * FROM products WHERE sku = 'AB--12'";
        assert_eq!(sanitize_sql(sql).unwrap(), sql);
    }

    #[test]
    fn test_quoted_function_names_are_checked() {
        assert_eq!(
            sanitize_sql(r#"SELECT "pg_sleep"(0.1) AS s"#),
            Err(GuardError::ForbiddenFunction("pg_sleep".to_string()))
        );
        assert_eq!(
            sanitize_sql(r#"SELECT "pg_read_file"('postmaster.pid') AS f"#),
            Err(GuardError::ForbiddenFunction("pg_read_file".to_string()))
        );
        assert_eq!(
            sanitize_sql(r#"SELECT pg_catalog."dblink_exec"('host=x', 'DROP TABLE t')"#),
            Err(GuardError::ForbiddenFunction("dblink_exec".to_string()))
        );
        // a different, case-sensitive name
        assert!(sanitize_sql(r#"SELECT "PG_SLEEP" FROM metrics"#).is_ok());
    }
}
