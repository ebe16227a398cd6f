use super::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    database_connected: bool,
    pool_size: usize,
    available_connections: usize,
    uptime_seconds: u64,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "F1 DATA API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "ping": "pong" }))
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Test SQLite connection
    let database_connected = state.store.ping().await.is_ok();
    let status = state.store.pool().status();

    Json(HealthResponse {
        status: if database_connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        database_connected,
        pool_size: status.size,
        available_connections: status.available,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
