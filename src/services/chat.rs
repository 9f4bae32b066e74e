use crate::error::{AppError, AppResult};
use crate::models::chat::ChatTurn;
use crate::models::health_log::HealthLog;
use crate::services::gemini::{GeminiClient, GenerationConfig};
use crate::services::prompts;

pub const EMPTY_CHAT_REPLY: &str =
    "I'm here to listen and support you. Can you tell me more about how you're feeling today?";

/// One assistant turn. `recent` is the user's latest entries, newest first;
/// `history` is the conversation so far as held by the client.
pub async fn reply(
    client: &GeminiClient,
    message: &str,
    recent: &[HealthLog],
    history: &[ChatTurn],
) -> AppResult<String> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("Message must not be blank".into()));
    }

    let system = prompts::chat_system_prompt(recent, history);
    let user = prompts::chat_user_part(message);

    let text = client
        .generate(&[system.as_str(), user.as_str()], &GenerationConfig::chat())
        .await?
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| EMPTY_CHAT_REPLY.to_string());

    Ok(text)
}
