use axum::{extract::State, Extension, Json};

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::handlers::health_logs::fetch_recent;
use crate::models::analysis::{HealthAnalysis, ANALYSIS_WINDOW};
use crate::services::analysis::analyze_week;
use crate::AppState;

pub async fn weekly_analysis(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<HealthAnalysis>> {
    let recent = fetch_recent(&state.db, auth_user.id, ANALYSIS_WINDOW as i64).await?;
    let analysis = analyze_week(&state.gemini, recent).await?;

    tracing::info!(
        user_id = %auth_user.id,
        health_score = analysis.health_score,
        "Weekly analysis generated"
    );
    Ok(Json(analysis))
}
