/// Health endpoint
use crate::context::AppContext;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/health", get(health_check))
}

/// Liveness probe: checks database connectivity
async fn health_check(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let database = match crate::db::test_connection(&ctx.db).await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!("health check database probe failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": if database == "ok" { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
