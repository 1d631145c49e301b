//! Ecommerce Chat - natural-language queries over an e-commerce database
//!
//! A thin HTTP layer routes chat requests to a [`QueryProcessor`], which
//! translates questions to read-only SQL, runs them and returns the rows.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{EcommerceChat, ChatOptions, QueryProcessor, QueryError, sanitize_sql};
pub use models::{QueryRequest, QueryResult, SchemaInfo};
pub use routes::AppState;
