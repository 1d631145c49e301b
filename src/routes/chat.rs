use actix_web::{http::header::ContentType, web, HttpResponse, Responder};
use crate::core::{QueryError, QueryProcessor};
use crate::models::{HealthResponse, QueryRequest, SampleQueriesResponse, SchemaResponse};
use std::sync::Arc;

/// Chat page served at `/`
const CHAT_PAGE: &str = include_str!("../../templates/chat.html");

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<dyn QueryProcessor>,
}

impl AppState {
    pub fn new(processor: Arc<dyn QueryProcessor>) -> Self {
        Self { processor }
    }
}

/// Configure all chat routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/", web::get().to(index))
        .route("/schema", web::get().to(get_schema))
        .route("/sample-queries", web::get().to(get_sample_queries))
        .route("/query", web::post().to(process_query))
        .route("/health", web::get().to(health_check));
}

/// Serve the chat interface
async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(CHAT_PAGE)
}

/// Get database schema information
///
/// GET /schema
async fn get_schema(state: web::Data<AppState>) -> Result<HttpResponse, QueryError> {
    let schema = state.processor.schema_info().await.map_err(|e| {
        tracing::error!("Failed to load schema: {}", e);
        e
    })?;

    Ok(HttpResponse::Ok().json(SchemaResponse { schema }))
}

/// Get sample queries
///
/// GET /sample-queries
async fn get_sample_queries(state: web::Data<AppState>) -> Result<HttpResponse, QueryError> {
    let queries = state.processor.sample_queries().await?;

    Ok(HttpResponse::Ok().json(SampleQueriesResponse { queries }))
}

/// Process a chat query
///
/// POST /query
///
/// Request body:
/// ```json
/// { "query": "show me top 5 products" }
/// ```
///
/// The processor's result is returned as-is.
async fn process_query(
    state: web::Data<AppState>,
    req: web::Json<QueryRequest>,
) -> Result<HttpResponse, QueryError> {
    tracing::info!("Processing query: {}", req.query);

    match state.processor.process_query(&req.query).await {
        Ok(result) => {
            tracing::info!(
                "Answered query {} with {} rows in {}ms",
                result.query_id,
                result.row_count,
                result.elapsed_ms
            );
            Ok(HttpResponse::Ok().json(result))
        }
        Err(e) => {
            match &e {
                QueryError::Database(_) | QueryError::Internal(_) => {
                    tracing::error!("Query failed ({}): {}", e.code(), e)
                }
                _ => tracing::warn!("Query failed ({}): {}", e.code(), e),
            }
            Err(e)
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.processor.health_check().await;

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}
