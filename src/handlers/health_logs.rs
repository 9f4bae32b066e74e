use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::health_log::{
    normalize_tags, CreateHealthLogRequest, HealthLog, HealthLogQuery, UpdateHealthLogRequest,
};
use crate::AppState;

pub async fn list_health_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<HealthLogQuery>,
) -> AppResult<Json<Vec<HealthLog>>> {
    let logs = fetch_recent(&state.db, auth_user.id, query.effective_limit()).await?;
    Ok(Json(logs))
}

pub async fn create_health_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateHealthLogRequest>,
) -> AppResult<Json<HealthLog>> {
    body.validate()?;

    let log_date = body.log_date.unwrap_or_else(|| Utc::now().date_naive());

    let log = sqlx::query_as::<_, HealthLog>(
        r#"
        INSERT INTO health_logs (id, user_id, entry_text, mood_rating, sleep_rating, symptoms, tags, log_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.entry_text.trim())
    .bind(body.mood_rating)
    .bind(body.sleep_rating)
    .bind(&body.symptoms)
    .bind(normalize_tags(body.tags))
    .bind(log_date)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = %auth_user.id, log_id = %log.id, log_date = %log.log_date, "Health log created");
    Ok(Json(log))
}

pub async fn update_health_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(log_id): Path<Uuid>,
    Json(body): Json<UpdateHealthLogRequest>,
) -> AppResult<Json<HealthLog>> {
    body.validate()?;
    let (tags, clear_tags) = body.tags_update();

    let log = sqlx::query_as::<_, HealthLog>(
        r#"
        UPDATE health_logs SET
            entry_text = COALESCE($3, entry_text),
            mood_rating = COALESCE($4, mood_rating),
            sleep_rating = COALESCE($5, sleep_rating),
            symptoms = COALESCE($6, symptoms),
            tags = CASE WHEN $9 THEN NULL ELSE COALESCE($7, tags) END,
            log_date = COALESCE($8, log_date)
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(log_id)
    .bind(auth_user.id)
    .bind(body.entry_text.as_deref().map(str::trim))
    .bind(body.mood_rating)
    .bind(body.sleep_rating)
    .bind(&body.symptoms)
    .bind(tags)
    .bind(body.log_date)
    .bind(clear_tags)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Health log not found".into()))?;

    Ok(Json(log))
}

pub async fn delete_health_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(log_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM health_logs WHERE id = $1 AND user_id = $2")
        .bind(log_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Health log not found".into()));
    }

    Ok(Json(json!({ "deleted": true, "id": log_id })))
}

/// Most recent entries first.
pub async fn fetch_recent(db: &sqlx::PgPool, user_id: Uuid, limit: i64) -> Result<Vec<HealthLog>, sqlx::Error> {
    sqlx::query_as::<_, HealthLog>(
        r#"
        SELECT * FROM health_logs
        WHERE user_id = $1
        ORDER BY log_date DESC, created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Entries on or after `since`, oldest first.
pub async fn fetch_since(
    db: &sqlx::PgPool,
    user_id: Uuid,
    since: chrono::NaiveDate,
) -> Result<Vec<HealthLog>, sqlx::Error> {
    sqlx::query_as::<_, HealthLog>(
        r#"
        SELECT * FROM health_logs
        WHERE user_id = $1 AND log_date >= $2
        ORDER BY log_date ASC, created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(db)
    .await
}
