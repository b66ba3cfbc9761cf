//! The operational HTTP surface: health probe and stats snapshot. Not the out-of-scope
//! CRUD/REST surface — just liveness and a read-only pool/delivery-log snapshot.

mod common;

use axum_test::TestServer;
use serial_test::serial;

use birthday_engine::app::engine::StrategyRegistry;
use birthday_engine::app::events::EventBus;
use birthday_engine::config::Config;
use birthday_engine::state::AppState;

fn test_state() -> AppState {
    let config = Config::load().expect("failed to load config from environment");
    let pool = birthday_engine::database::create_pool(&config).expect("failed to create db pool");
    AppState {
        config,
        pool,
        registry: std::sync::Arc::new(StrategyRegistry::default()),
        events: EventBus::new(),
    }
}

#[tokio::test]
#[serial]
async fn health_endpoint_reports_ok() {
    let state = test_state();
    let server = TestServer::new(birthday_engine::create_app(state)).unwrap();

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
#[serial]
async fn stats_endpoint_reports_app_and_pool_state() {
    let state = test_state();
    let server = TestServer::new(birthday_engine::create_app(state)).unwrap();

    let response = server.get("/stats").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["app"], serde_json::json!("birthday-engine"));
    assert!(body["db_pool"]["connections"].is_number());
    assert!(body["delivery_logs_by_status"].is_object());
}
