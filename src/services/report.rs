use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::health_log::HealthLog;
use crate::models::report::{DateRange, HealthReport};
use crate::services::gemini::{GeminiClient, GenerationConfig};
use crate::services::prompts;

pub const EMPTY_REPORT_BODY: &str = "Unable to generate report at this time.";

pub const MEDICAL_DISCLAIMER: &str = "This report is generated from self-reported health journal entries and is not a medical diagnosis. It is intended to facilitate discussion with healthcare providers. Please consult with qualified medical professionals for any health concerns or before making changes to treatment plans.";

/// Wraps the model's body with the title, disclaimer and generation time.
/// Applied regardless of what the model returned.
pub fn assemble_report(patient_name: &str, body: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        "# Health Report for {name}\n\n{body}\n\n---\n\n**MEDICAL DISCLAIMER:**\n{disclaimer}\n\n*Report generated by Health Journal on {at}*",
        name = patient_name,
        body = body.trim(),
        disclaimer = MEDICAL_DISCLAIMER,
        at = generated_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

/// Builds the provider-facing report from `entries` (ascending by date).
pub async fn generate_report(
    client: &GeminiClient,
    patient_name: &str,
    window_days: i64,
    entries: &[HealthLog],
    generated_at: DateTime<Utc>,
) -> AppResult<HealthReport> {
    let (first, last) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(AppError::InsufficientData(format!(
                "No health logs found for the last {} days",
                window_days
            )))
        }
    };

    let prompt = prompts::report_prompt(patient_name, window_days, entries)?;
    let body = client
        .generate(&[prompt.as_str()], &GenerationConfig::report())
        .await?
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| {
            tracing::warn!("Report generation returned no text, using placeholder body");
            EMPTY_REPORT_BODY.to_string()
        });

    Ok(HealthReport {
        report: assemble_report(patient_name, &body, generated_at),
        data_points: entries.len(),
        date_range: DateRange {
            start: first.log_date,
            end: last.log_date,
        },
    })
}
