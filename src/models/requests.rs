use serde::{Deserialize, Serialize};

/// Natural-language query submitted by the chat client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}
