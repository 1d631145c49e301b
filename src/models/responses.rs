use serde::{Deserialize, Serialize};
use crate::models::domain::SchemaInfo;

/// Response for the schema endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaResponse {
    pub schema: SchemaInfo,
}

/// Response for the sample queries endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleQueriesResponse {
    pub queries: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub error: String,
}
