// Query processing exports
pub mod chat;
pub mod processor;
pub mod prompt;
pub mod sql_guard;

pub use chat::{EcommerceChat, ChatOptions};
pub use processor::{QueryProcessor, QueryError};
pub use prompt::{describe_schema, normalize_query, parse_translation, translation_prompt};
pub use sql_guard::{sanitize_sql, GuardError};
