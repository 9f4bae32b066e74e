use crate::error::{AppError, AppResult};
use crate::models::analysis::{HealthAnalysis, ANALYSIS_WINDOW};
use crate::models::health_log::HealthLog;
use crate::services::gemini::{GeminiClient, GenerationConfig};
use crate::services::{parser, prompts};

/// Weekly pattern analysis over the most recent entries.
///
/// `recent` is newest first, as the journal store returns it. Fewer than
/// seven entries is refused before the generative endpoint is contacted.
pub async fn analyze_week(client: &GeminiClient, mut recent: Vec<HealthLog>) -> AppResult<HealthAnalysis> {
    if recent.len() < ANALYSIS_WINDOW {
        return Err(AppError::InsufficientData(format!(
            "Not enough entries for analysis: {} of {} required",
            recent.len(),
            ANALYSIS_WINDOW
        )));
    }

    recent.truncate(ANALYSIS_WINDOW);
    recent.reverse();
    let chronological = recent;

    let prompt = prompts::analysis_prompt(&chronological);
    let raw = client
        .generate(&[prompt.as_str()], &GenerationConfig::analysis())
        .await?
        .ok_or_else(|| AppError::Unparseable("Generative endpoint returned no text".into()))?;

    let dates: Vec<_> = chronological.iter().map(|log| log.log_date).collect();
    parser::parse_analysis(&raw, &dates)
}
