use axum::{extract::State, Extension, Json};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    jwt::{create_access_token, AccessToken},
    middleware::AuthUser,
    password::{hash_password, verify_password},
};
use crate::error::{AppError, AppResult};
use crate::models::user::{LoginRequest, RegisterRequest, UpdateProfileRequest, User, UserProfile};
use crate::AppState;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<AccessToken>> {
    body.validate()?;
    let email = normalize_email(&body.email);

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;

    if existing > 0 {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let pwd_hash = hash_password(&body.password)?;
    let display_name = body
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, display_name)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&pwd_hash)
    .bind(display_name)
    .execute(&state.db)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, "Email already registered"))?;

    tracing::info!(user_id = %user_id, "User registered");
    let token = create_access_token(user_id, &email, &state.config)?;
    Ok(Json(token))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AccessToken>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(normalize_email(&body.email))
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = create_access_token(user.id, &user.email, &state.config)?;
    Ok(Json(token))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UserProfile>> {
    let user = load_user(&state.db, auth_user.id).await?;
    Ok(Json(user.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserProfile>> {
    body.validate()?;
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::Validation("Display name must not be blank".into()));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET display_name = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(display_name)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("User not found".into()))?;

    Ok(Json(user.into()))
}

pub async fn load_user(db: &sqlx::PgPool, user_id: Uuid) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("User not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }
}
