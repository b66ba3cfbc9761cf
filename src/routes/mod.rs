use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use serde_json::json;
use tracing::error;

use crate::schema::delivery_logs::dsl as dl;
use crate::state::AppState;

/// Thin operational HTTP surface: health probe and a stats snapshot for whatever external
/// dashboard/alerting pipeline is polling this process. No business CRUD lives here.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn stats(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    let pool_state = state.pool.state();
    let by_status = delivery_log_counts_by_status(&state.pool).await;

    Json(json!({
        "app": state.config.app.name,
        "env": state.config.app.env,
        "db_pool": {
            "connections": pool_state.connections,
            "idle_connections": pool_state.idle_connections,
        },
        "delivery_logs_by_status": by_status,
    }))
}

async fn delivery_log_counts_by_status(pool: &crate::database::DbPool) -> serde_json::Value {
    let pool = pool.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        dl::delivery_logs
            .group_by(dl::status)
            .select((dl::status, diesel::dsl::count_star()))
            .load::<(String, i64)>(&mut conn)
    })
    .await;

    match rows {
        Ok(Ok(rows)) => json!(rows.into_iter().collect::<std::collections::BTreeMap<String, i64>>()),
        Ok(Err(err)) => {
            error!(error = %err, "failed to query delivery log counts for /stats");
            json!({})
        }
        Err(err) => {
            error!(error = %err, "delivery log count query task panicked");
            json!({})
        }
    }
}
