use crate::core::sql_guard::GuardError;
use crate::models::{QueryResult, SchemaInfo};
use crate::services::{LlmError, PostgresError};
use async_trait::async_trait;
use thiserror::Error;

/// Failure kinds a query processor can report
///
/// Each kind maps to its own HTTP status at the boundary; the display text
/// becomes the response `detail`.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Generated SQL was rejected: {0}")]
    UnsafeSql(String),

    #[error("Failed to translate query: {0}")]
    Translation(String),

    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::EmptyQuery => "empty_query",
            QueryError::UnsafeSql(_) => "unsafe_sql",
            QueryError::Translation(_) => "translation_failed",
            QueryError::Timeout(_) => "timeout",
            QueryError::Database(_) => "database_error",
            QueryError::Internal(_) => "internal_error",
        }
    }
}

impl From<GuardError> for QueryError {
    fn from(err: GuardError) -> Self {
        QueryError::UnsafeSql(err.to_string())
    }
}

impl From<LlmError> for QueryError {
    fn from(err: LlmError) -> Self {
        if err.is_timeout() {
            QueryError::Timeout(format!("language model did not respond: {}", err))
        } else {
            QueryError::Translation(err.to_string())
        }
    }
}

impl From<PostgresError> for QueryError {
    fn from(err: PostgresError) -> Self {
        let inner = match &err {
            PostgresError::SqlxError(inner) => inner,
            PostgresError::DuplicateColumn(_) => return QueryError::Translation(err.to_string()),
        };
        match inner {
            sqlx::Error::PoolTimedOut => QueryError::Timeout("no database connection available".to_string()),
            // 57014: query_canceled, raised when statement_timeout fires
            sqlx::Error::Database(db) if db.code().as_deref() == Some("57014") => {
                QueryError::Timeout(db.message().to_string())
            }
            sqlx::Error::Database(db) => QueryError::Database(db.message().to_string()),
            _ => QueryError::Database(err.to_string()),
        }
    }
}

/// Interprets natural-language questions against the store database
///
/// One instance is built at startup and shared by every request, so
/// implementations must be `Send + Sync`.
#[async_trait]
pub trait QueryProcessor: Send + Sync {
    /// Answer a natural-language question
    async fn process_query(&self, query: &str) -> Result<QueryResult, QueryError>;

    /// Describe the tables the processor can query
    async fn schema_info(&self) -> Result<SchemaInfo, QueryError>;

    /// Example questions for the chat page
    async fn sample_queries(&self) -> Result<Vec<String>, QueryError>;

    /// Whether the processor's backing services are reachable
    async fn health_check(&self) -> bool {
        true
    }
}
