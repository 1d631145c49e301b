// Integration tests for the HTTP boundary of Ecommerce Chat

use actix_web::{http::header, http::StatusCode, test, web, App};
use async_trait::async_trait;
use ecommerce_chat::core::{QueryError, QueryProcessor};
use ecommerce_chat::models::{ColumnInfo, QueryResult, SchemaInfo, TableInfo};
use ecommerce_chat::routes::{self, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Outcome = Box<dyn Fn(&str) -> Result<QueryResult, QueryError> + Send + Sync>;

struct StubProcessor {
    outcome: Outcome,
    healthy: bool,
    calls: AtomicUsize,
}

impl StubProcessor {
    fn answering() -> Self {
        Self::with(Box::new(|q: &str| Ok(sample_result(q))))
    }

    fn failing(make: fn() -> QueryError) -> Self {
        Self::with(Box::new(move |_: &str| Err(make())))
    }

    fn with(outcome: Outcome) -> Self {
        Self {
            outcome,
            healthy: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueryProcessor for StubProcessor {
    async fn process_query(&self, query: &str) -> Result<QueryResult, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)(query)
    }

    async fn schema_info(&self) -> Result<SchemaInfo, QueryError> {
        Ok(SchemaInfo {
            schema: "public".to_string(),
            tables: vec![TableInfo {
                name: "products".to_string(),
                columns: vec![ColumnInfo {
                    name: "id".to_string(),
                    data_type: "integer".to_string(),
                    nullable: false,
                    primary_key: true,
                }],
                foreign_keys: vec![],
            }],
        })
    }

    async fn sample_queries(&self) -> Result<Vec<String>, QueryError> {
        Ok(vec![
            "Show me the top 5 best-selling products".to_string(),
            "How many orders are still pending shipment?".to_string(),
        ])
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}

fn sample_result(query: &str) -> QueryResult {
    QueryResult {
        query_id: "3f0c9a52-6f0e-4d4e-9a53-2a7c1d0b9e11".to_string(),
        query: query.to_string(),
        sql: "SELECT name, units_sold FROM products ORDER BY units_sold DESC LIMIT 5".to_string(),
        explanation: Some("Top five products by units sold.".to_string()),
        columns: vec!["name".to_string(), "units_sold".to_string()],
        rows: vec![
            json!({"name": "Espresso Machine", "units_sold": 412}),
            json!({"name": "Milk Frother", "units_sold": 377}),
        ],
        row_count: 2,
        truncated: false,
        answer: None,
        elapsed_ms: 12,
    }
}

macro_rules! app_with {
    ($processor:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new($processor)))
                .app_data(routes::json_config())
                .configure(routes::configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_query_returns_processor_result_verbatim() {
    let processor = Arc::new(StubProcessor::answering());
    let app = app_with!(processor.clone());

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"query": "show me top 5 products"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let expected = serde_json::to_value(sample_result("show me top 5 products")).unwrap();
    assert_eq!(body, expected);
    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_query_failure_maps_to_500_with_detail() {
    let make = || QueryError::Database("relation \"orderz\" does not exist".to_string());
    let app = app_with!(Arc::new(StubProcessor::failing(make)));

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"query": "list orderz"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], make().to_string());
    assert_eq!(body["error"], "database_error");
}

#[actix_web::test]
async fn test_query_failure_kinds_have_distinct_statuses() {
    let cases: [(fn() -> QueryError, StatusCode); 4] = [
        (|| QueryError::EmptyQuery, StatusCode::BAD_REQUEST),
        (|| QueryError::UnsafeSql("DROP".into()), StatusCode::UNPROCESSABLE_ENTITY),
        (|| QueryError::Translation("model unavailable".into()), StatusCode::BAD_GATEWAY),
        (|| QueryError::Timeout("no answer within 60s".into()), StatusCode::GATEWAY_TIMEOUT),
    ];

    for (make, status) in cases {
        let app = app_with!(Arc::new(StubProcessor::failing(make)));
        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(json!({"query": "anything"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), status);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], make().to_string());
    }
}

#[actix_web::test]
async fn test_non_string_query_is_rejected_before_processing() {
    let processor = Arc::new(StubProcessor::answering());
    let app = app_with!(processor.clone());

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"query": 42}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_missing_query_field_is_rejected() {
    let processor = Arc::new(StubProcessor::answering());
    let app = app_with!(processor.clone());

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"question": "top products"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let processor = Arc::new(StubProcessor::answering());
    let app = app_with!(processor.clone());

    let req = test::TestRequest::post()
        .uri("/query")
        .insert_header(header::ContentType::json())
        .set_payload("{\"query\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_json");
    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_schema_is_wrapped() {
    let app = app_with!(Arc::new(StubProcessor::answering()));

    let req = test::TestRequest::get().uri("/schema").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["schema"]["schema"], "public");
    assert_eq!(body["schema"]["tables"][0]["name"], "products");
    assert_eq!(body["schema"]["tables"][0]["columns"][0]["primary_key"], true);
}

#[actix_web::test]
async fn test_sample_queries_are_wrapped() {
    let app = app_with!(Arc::new(StubProcessor::answering()));

    let req = test::TestRequest::get().uri("/sample-queries").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"queries": [
            "Show me the top 5 best-selling products",
            "How many orders are still pending shipment?"
        ]})
    );
}

#[actix_web::test]
async fn test_index_serves_html_regardless_of_processor() {
    let mut processor = StubProcessor::failing(|| QueryError::Internal("down".into()));
    processor.healthy = false;
    let app = app_with!(Arc::new(processor));

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"), "got {}", content_type);

    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("<form id=\"ask\">"));
}

#[actix_web::test]
async fn test_health_reports_degraded() {
    let mut processor = StubProcessor::answering();
    processor.healthy = false;
    let app = app_with!(Arc::new(processor));

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
