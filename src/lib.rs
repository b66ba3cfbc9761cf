pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod routes;
pub mod runtime;
pub mod schema;
pub mod state;

pub use runtime::run_service;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

pub fn create_app(state: AppState) -> Router {
    routes::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}
