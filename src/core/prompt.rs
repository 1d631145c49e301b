use crate::models::{QueryRows, SchemaInfo, SqlTranslation};
use std::fmt::Write;

/// Rows shown to the model when it summarizes a result
const SUMMARY_SAMPLE_ROWS: usize = 20;

/// Render the schema as a compact table listing for the model
pub fn describe_schema(schema: &SchemaInfo) -> String {
    let mut out = String::new();

    for table in &schema.tables {
        let _ = writeln!(out, "Table {}:", table.name);
        for column in &table.columns {
            let _ = write!(out, "  - {} {}", column.name, column.data_type);
            if column.primary_key {
                out.push_str(" PRIMARY KEY");
            } else if !column.nullable {
                out.push_str(" NOT NULL");
            }
            out.push('\n');
        }
        for fk in &table.foreign_keys {
            let _ = writeln!(
                out,
                "  * {} references {}.{}",
                fk.column, fk.references_table, fk.references_column
            );
        }
    }

    out
}

/// System prompt for translating a question into PostgreSQL
pub fn translation_prompt(schema: &SchemaInfo, max_rows: usize) -> String {
    format!(
        "You translate questions about an e-commerce store into PostgreSQL queries.\n\
         \n\
         Database schema ({schema_name}):\n\
         {tables}\n\
         Rules:\n\
         - Write exactly one read-only SELECT statement (CTEs allowed).\n\
         - Only use the tables and columns listed above.\n\
         - Give every output column a unique, readable alias.\n\
         - Never return more than {max_rows} rows; add a LIMIT when the question asks for a top-N.\n\
         \n\
         Reply with a JSON object and nothing else:\n\
         {{\"sql\": \"<the query>\", \"explanation\": \"<one sentence on what it returns>\"}}",
        schema_name = schema.schema,
        tables = describe_schema(schema),
        max_rows = max_rows,
    )
}

/// System prompt for summarizing query rows in plain language
pub fn summary_prompt() -> &'static str {
    "You answer questions about an e-commerce store using query results. \
     Reply with one short paragraph in plain language. \
     Do not mention SQL, tables or columns."
}

/// User message carrying the question and a sample of the result rows
pub fn summary_message(question: &str, rows: &QueryRows) -> String {
    let sample: Vec<&serde_json::Value> = rows.rows.iter().take(SUMMARY_SAMPLE_ROWS).collect();
    let sample_json = serde_json::to_string(&sample).unwrap_or_else(|_| "[]".to_string());

    let mut message = format!(
        "Question: {}\nColumns: {}\nRows ({} total{}): {}",
        question,
        rows.columns.join(", "),
        rows.rows.len(),
        if rows.truncated { ", truncated" } else { "" },
        sample_json,
    );
    if rows.rows.is_empty() {
        message.push_str("\nThe query returned no rows.");
    }
    message
}

/// Lower-cased, whitespace-collapsed form of a question, used as cache key
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the SQL translation from a model reply.
///
/// Accepts the requested JSON object (optionally fenced or surrounded by
/// prose), a fenced ```sql block, or a bare statement.
pub fn parse_translation(reply: &str) -> Result<SqlTranslation, String> {
    let reply = reply.trim();

    if let (Some(open), Some(close)) = (reply.find('{'), reply.rfind('}')) {
        if open < close {
            if let Ok(translation) = serde_json::from_str::<SqlTranslation>(&reply[open..=close]) {
                if translation.sql.trim().is_empty() {
                    return Err("model returned an empty SQL statement".to_string());
                }
                return Ok(SqlTranslation {
                    sql: translation.sql.trim().to_string(),
                    explanation: translation.explanation.filter(|e| !e.trim().is_empty()),
                });
            }
        }
    }

    if let Some(sql) = fenced_block(reply) {
        return Ok(SqlTranslation { sql, explanation: None });
    }

    let lowered = reply.to_lowercase();
    if lowered.starts_with("select") || lowered.starts_with("with") {
        return Ok(SqlTranslation {
            sql: reply.to_string(),
            explanation: None,
        });
    }

    Err(format!(
        "model reply did not contain SQL: {}",
        reply.chars().take(120).collect::<String>()
    ))
}

fn fenced_block(reply: &str) -> Option<String> {
    let start = reply.find("```")?;
    let after = &reply[start + 3..];
    let inner = &after[..after.find("```")?];

    // ```sql may be followed by a newline or by the statement itself
    let body = match inner.split_once(char::is_whitespace) {
        Some((tag, rest)) if is_language_tag(tag) => rest,
        _ => inner,
    };

    let sql = body.trim();
    (!sql.is_empty()).then(|| sql.to_string())
}

fn is_language_tag(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_alphanumeric())
        && !word.eq_ignore_ascii_case("select")
        && !word.eq_ignore_ascii_case("with")
}
