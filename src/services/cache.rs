use crate::models::{SchemaInfo, SqlTranslation};
use std::time::Duration;

/// In-process caches for the chat pipeline
///
/// Holds introspected schemas and question translations, each with a TTL.
/// Translations are dropped when a reloaded schema differs from the last one.
pub struct CacheManager {
    schema: moka::future::Cache<String, SchemaInfo>,
    last_seen: moka::future::Cache<String, SchemaInfo>,
    translations: moka::future::Cache<String, SqlTranslation>,
}

impl CacheManager {
    /// Create a new cache manager
    pub fn new(translation_capacity: u64, translation_ttl_secs: u64, schema_ttl_secs: u64) -> Self {
        let schema = moka::future::CacheBuilder::new(16)
            .time_to_live(Duration::from_secs(schema_ttl_secs))
            .build();

        let last_seen = moka::future::CacheBuilder::new(16).build();

        let translations = moka::future::CacheBuilder::new(translation_capacity)
            .time_to_live(Duration::from_secs(translation_ttl_secs))
            .build();

        Self {
            schema,
            last_seen,
            translations,
        }
    }

    pub async fn schema(&self, name: &str) -> Option<SchemaInfo> {
        let key = CacheKey::schema(name);
        let hit = self.schema.get(&key).await;
        tracing::trace!("Schema cache {}: {}", if hit.is_some() { "hit" } else { "miss" }, key);
        hit
    }

    pub async fn set_schema(&self, name: &str, info: SchemaInfo) {
        let key = CacheKey::schema(name);

        if let Some(previous) = self.last_seen.get(&key).await {
            if previous != info {
                tracing::info!("Schema {} changed, dropping cached translations", name);
                self.clear_translations();
            }
        }

        self.last_seen.insert(key.clone(), info.clone()).await;
        self.schema.insert(key, info).await;
    }

    pub async fn translation(&self, normalized_query: &str) -> Option<SqlTranslation> {
        let key = CacheKey::translation(normalized_query);
        let hit = self.translations.get(&key).await;
        tracing::trace!("Translation cache {}: {}", if hit.is_some() { "hit" } else { "miss" }, key);
        hit
    }

    pub async fn set_translation(&self, normalized_query: &str, translation: SqlTranslation) {
        self.translations
            .insert(CacheKey::translation(normalized_query), translation)
            .await;
    }

    pub fn clear_translations(&self) {
        self.translations.invalidate_all();
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for an introspected schema
    pub fn schema(name: &str) -> String {
        format!("schema:{}", name)
    }

    /// Build a cache key for a normalized question
    pub fn translation(normalized_query: &str) -> String {
        format!("sql:{}", normalized_query)
    }
}
