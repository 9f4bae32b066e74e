use axum::{extract::State, Extension, Json};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::handlers::health_logs::fetch_recent;
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::services::{chat, prompts::CHAT_CONTEXT_ENTRIES};
use crate::AppState;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    body.validate()?;

    let recent = fetch_recent(&state.db, auth_user.id, CHAT_CONTEXT_ENTRIES).await?;
    let response = chat::reply(
        &state.gemini,
        &body.message,
        &recent,
        &body.conversation_history,
    )
    .await?;

    tracing::debug!(user_id = %auth_user.id, context_entries = recent.len(), "Chat reply sent");
    Ok(Json(ChatResponse { response }))
}
