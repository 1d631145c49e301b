use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use ecommerce_chat::config::Settings;
use ecommerce_chat::core::{ChatOptions, EcommerceChat, QueryProcessor};
use ecommerce_chat::routes::{self, AppState};
use ecommerce_chat::services::{CacheManager, LlmClient, PostgresClient};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    info!("Starting Ecommerce Chat service...");

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded successfully");

    if settings.llm.api_key.is_empty() {
        warn!("No language model API key configured; set OPENAI_API_KEY or CHAT__LLM__API_KEY");
    }

    let postgres = PostgresClient::from_settings(&settings.database).map_err(|e| {
        error!("Invalid PostgreSQL configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let llm = LlmClient::new(&settings.llm).map_err(|e| {
        error!("Failed to create language model client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    info!("Language model client initialized (model: {})", settings.llm.model);

    let cache = CacheManager::new(
        settings.chat.translation_cache_size,
        settings.chat.translation_cache_ttl_secs,
        settings.chat.schema_cache_ttl_secs,
    );

    let processor: Arc<dyn QueryProcessor> = Arc::new(EcommerceChat::new(
        Arc::new(postgres),
        Arc::new(llm),
        cache,
        ChatOptions::from_settings(&settings),
    ));

    if !processor.health_check().await {
        warn!("Database is not reachable yet; queries will fail until it is");
    }

    let app_state = AppState::new(processor);

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(routes::json_config())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
