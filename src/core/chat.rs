use crate::config::Settings;
use crate::core::processor::{QueryError, QueryProcessor};
use crate::core::prompt::{normalize_query, parse_translation, summary_message, summary_prompt, translation_prompt};
use crate::core::sql_guard::sanitize_sql;
use crate::models::{QueryResult, QueryRows, SchemaInfo, SqlTranslation};
use crate::services::{CacheManager, Database, LanguageModel};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for [`EcommerceChat`]
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub schema: String,
    pub max_rows: usize,
    pub query_timeout: Duration,
    pub summarize: bool,
    pub sample_queries: Vec<String>,
}

impl ChatOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            schema: settings.database.schema.clone(),
            max_rows: settings.chat.max_rows,
            query_timeout: Duration::from_secs(settings.chat.query_timeout_secs),
            summarize: settings.llm.summarize,
            sample_queries: settings.chat.sample_queries.clone(),
        }
    }
}

/// Natural-language query processor for the store database
///
/// # Pipeline
/// 1. Schema introspection (cached)
/// 2. Question to SQL translation by the language model (cached)
/// 3. Read-only guard on the generated statement
/// 4. Execution in a read-only transaction
/// 5. Optional plain-language summary of the rows
pub struct EcommerceChat {
    database: Arc<dyn Database>,
    model: Arc<dyn LanguageModel>,
    cache: CacheManager,
    options: ChatOptions,
}

impl EcommerceChat {
    pub fn new(
        database: Arc<dyn Database>,
        model: Arc<dyn LanguageModel>,
        cache: CacheManager,
        options: ChatOptions,
    ) -> Self {
        Self {
            database,
            model,
            cache,
            options,
        }
    }

    async fn load_schema(&self) -> Result<SchemaInfo, QueryError> {
        if let Some(schema) = self.cache.schema(&self.options.schema).await {
            return Ok(schema);
        }

        let schema = self.database.load_schema(&self.options.schema).await?;
        self.cache.set_schema(&self.options.schema, schema.clone()).await;

        Ok(schema)
    }

    /// Translate a question to vetted SQL, consulting the cache first
    async fn translate(&self, query: &str, schema: &SchemaInfo) -> Result<SqlTranslation, QueryError> {
        let key = normalize_query(query);
        if let Some(cached) = self.cache.translation(&key).await {
            tracing::debug!("Reusing cached translation for: {}", key);
            return Ok(cached);
        }

        let system = translation_prompt(schema, self.options.max_rows);
        let reply = self.model.complete(&system, query).await?;
        let parsed = parse_translation(&reply).map_err(QueryError::Translation)?;

        let translation = SqlTranslation {
            sql: sanitize_sql(&parsed.sql)?,
            explanation: parsed.explanation,
        };

        self.cache.set_translation(&key, translation.clone()).await;

        Ok(translation)
    }

    async fn summarize(&self, query: &str, rows: &QueryRows) -> Option<String> {
        match self.model.complete(summary_prompt(), &summary_message(query, rows)).await {
            Ok(answer) => Some(answer.trim().to_string()),
            Err(e) => {
                tracing::warn!("Failed to summarize result, returning rows only: {}", e);
                None
            }
        }
    }

    async fn answer(&self, query: &str) -> Result<QueryResult, QueryError> {
        let started = Instant::now();

        let schema = self.load_schema().await?;
        let translation = self.translate(query, &schema).await?;

        tracing::debug!("Executing SQL: {}", translation.sql);

        let rows = self
            .database
            .run_read_only(&translation.sql, self.options.max_rows)
            .await?;

        let answer = if self.options.summarize {
            self.summarize(query, &rows).await
        } else {
            None
        };

        Ok(QueryResult {
            query_id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            sql: translation.sql,
            explanation: translation.explanation,
            row_count: rows.rows.len(),
            columns: rows.columns,
            rows: rows.rows,
            truncated: rows.truncated,
            answer,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl QueryProcessor for EcommerceChat {
    async fn process_query(&self, query: &str) -> Result<QueryResult, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let limit = self.options.query_timeout;
        match tokio::time::timeout(limit, self.answer(query)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(format!(
                "no answer within {}s",
                limit.as_secs()
            ))),
        }
    }

    async fn schema_info(&self) -> Result<SchemaInfo, QueryError> {
        self.load_schema().await
    }

    async fn sample_queries(&self) -> Result<Vec<String>, QueryError> {
        Ok(self.options.sample_queries.clone())
    }

    async fn health_check(&self) -> bool {
        self.database.health_check().await.unwrap_or(false)
    }
}
