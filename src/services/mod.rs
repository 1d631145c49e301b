// Service exports
pub mod cache;
pub mod llm;
pub mod postgres;

pub use cache::{CacheManager, CacheKey};
pub use llm::{LlmClient, LlmError, LanguageModel};
pub use postgres::{PostgresClient, PostgresError, Database};
