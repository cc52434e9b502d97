pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod hub;
pub mod session;
pub mod state;
pub mod storage;
pub mod ws;

pub use state::AppState;

use axum::routing::get;
use axum::Router;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}
