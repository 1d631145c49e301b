use crate::models::{ColumnInfo, ForeignKey, QueryRows, SchemaInfo, TableInfo};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column, Executor, PgPool, Row, Statement};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("result has more than one column named {0}")]
    DuplicateColumn(String),
}

/// Read access to the store database
#[async_trait]
pub trait Database: Send + Sync {
    /// Introspect tables, columns and keys of a schema
    async fn load_schema(&self, schema: &str) -> Result<SchemaInfo, PostgresError>;

    /// Run a vetted statement read-only, returning at most `max_rows` rows
    async fn run_read_only(&self, sql: &str, max_rows: usize) -> Result<QueryRows, PostgresError>;

    async fn health_check(&self) -> Result<bool, PostgresError>;
}

/// PostgreSQL client for the store database
///
/// Statements run inside a read-only transaction with a per-statement
/// timeout.
pub struct PostgresClient {
    pool: PgPool,
    statement_timeout_ms: u64,
}

impl PostgresClient {
    /// Create a client; connections are opened on first use
    pub fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
        statement_timeout_ms: u64,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect_lazy(database_url)?;

        Ok(Self {
            pool,
            statement_timeout_ms,
        })
    }

    /// Create a new PostgreSQL client from settings
    pub fn from_settings(settings: &crate::config::DatabaseSettings) -> Result<Self, PostgresError> {
        tracing::info!(
            "Configuring PostgreSQL pool (schema: {}, statement timeout: {}ms)",
            settings.schema,
            settings.statement_timeout_ms
        );

        Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(0),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
            settings.statement_timeout_ms,
        )
    }
}

#[async_trait]
impl Database for PostgresClient {
    async fn load_schema(&self, schema: &str) -> Result<SchemaInfo, PostgresError> {
        let columns_query = r#"
            SELECT c.table_name::text, c.column_name::text, c.data_type::text, c.is_nullable::text
            FROM information_schema.columns c
            JOIN information_schema.tables t
              ON t.table_schema = c.table_schema AND t.table_name = c.table_name
            WHERE c.table_schema = $1
              AND t.table_type IN ('BASE TABLE', 'VIEW')
            ORDER BY c.table_name, c.ordinal_position
        "#;

        let primary_keys_query = r#"
            SELECT kcu.table_name::text, kcu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1
        "#;

        let foreign_keys_query = r#"
            SELECT kcu.table_name::text, kcu.column_name::text,
                   ccu.table_name::text, ccu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.constraint_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1
            ORDER BY 1, 2
        "#;

        let columns: Vec<(String, String, String, String)> = sqlx::query_as(columns_query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;
        let primary_keys: Vec<(String, String)> = sqlx::query_as(primary_keys_query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;
        let foreign_keys: Vec<(String, String, String, String)> = sqlx::query_as(foreign_keys_query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        let info = assemble_schema(schema, columns, &primary_keys, foreign_keys);

        tracing::debug!("Loaded schema {} with {} tables", schema, info.tables.len());

        Ok(info)
    }

    async fn run_read_only(&self, sql: &str, max_rows: usize) -> Result<QueryRows, PostgresError> {
        let mut tx = self.pool.begin().await?;

        (&mut *tx).execute("SET TRANSACTION READ ONLY").await?;
        (&mut *tx)
            .execute(format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms).as_str())
            .await?;

        // Column order comes from the prepared statement; JSON objects don't keep it.
        let prepared = (&mut *tx).prepare(sql).await?;
        let columns: Vec<String> = prepared
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        // Rows are JSON objects keyed by column name, so names must be unique
        if let Some(name) = first_duplicate(&columns) {
            tx.rollback().await?;
            return Err(PostgresError::DuplicateColumn(name.to_string()));
        }

        // One extra row tells us whether the result was cut off
        let wrapped = format!(
            "SELECT row_to_json(q) AS row FROM (SELECT * FROM (\n{}\n) AS sub LIMIT {}) AS q",
            sql,
            max_rows + 1
        );
        let fetched = sqlx::query(&wrapped).fetch_all(&mut *tx).await?;

        tx.rollback().await?;

        let mut rows = fetched
            .iter()
            .map(|row| row.try_get::<serde_json::Value, _>("row"))
            .collect::<Result<Vec<_>, _>>()?;

        let truncated = rows.len() > max_rows;
        rows.truncate(max_rows);

        tracing::debug!(
            "Read-only statement returned {} rows{}",
            rows.len(),
            if truncated { " (truncated)" } else { "" }
        );

        Ok(QueryRows {
            columns,
            rows,
            truncated,
        })
    }

    async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn first_duplicate(columns: &[String]) -> Option<&str> {
    columns
        .iter()
        .enumerate()
        .find(|(i, name)| columns[..*i].contains(*name))
        .map(|(_, name)| name.as_str())
}

/// Group introspection rows into tables, keeping the query's ordering
pub fn assemble_schema(
    schema: &str,
    columns: Vec<(String, String, String, String)>,
    primary_keys: &[(String, String)],
    foreign_keys: Vec<(String, String, String, String)>,
) -> SchemaInfo {
    let mut tables: Vec<TableInfo> = Vec::new();

    for (table, column, data_type, is_nullable) in columns {
        let primary_key = primary_keys
            .iter()
            .any(|(t, c)| *t == table && *c == column);

        let info = ColumnInfo {
            name: column,
            data_type,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            primary_key,
        };

        match tables.last_mut() {
            Some(last) if last.name == table => last.columns.push(info),
            _ => tables.push(TableInfo {
                name: table,
                columns: vec![info],
                foreign_keys: vec![],
            }),
        }
    }

    for (table, column, references_table, references_column) in foreign_keys {
        if let Some(t) = tables.iter_mut().find(|t| t.name == table) {
            t.foreign_keys.push(ForeignKey {
                column,
                references_table,
                references_column,
            });
        }
    }

    SchemaInfo {
        schema: schema.to_string(),
        tables,
    }
}
