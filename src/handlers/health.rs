use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "healthjournal-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();
    let ai_configured = state.config.gemini_api_key.is_some();

    let checks = json!({
        "database": if db_ok { "ok" } else { "failed" },
        "ai": if ai_configured { "configured" } else { "missing_key" },
    });

    if db_ok {
        (StatusCode::OK, Json(json!({ "status": "ready", "checks": checks })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": checks })),
        )
    }
}
