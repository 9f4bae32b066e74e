use chrono::NaiveDate;

use crate::error::{AppError, AppResult};
use crate::models::analysis::HealthAnalysis;

/// Removes Markdown code fences (```` ```json ```` / ```` ``` ````) wrapped
/// around model output. Applying it to already-bare text is a no-op.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (e.g. `json`) on the opening fence line.
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Decodes the weekly analysis and checks it against the dates of the
/// entries it was built from.
pub fn parse_analysis(raw: &str, expected_dates: &[NaiveDate]) -> AppResult<HealthAnalysis> {
    let cleaned = strip_code_fences(raw);
    let analysis: HealthAnalysis = serde_json::from_str(cleaned).map_err(|e| {
        tracing::error!(error = %e, raw = %raw, "Failed to parse AI analysis");
        AppError::Unparseable(format!("Failed to parse AI analysis: {}", e))
    })?;

    analysis
        .check_contract(expected_dates)
        .map_err(AppError::Unparseable)?;

    Ok(analysis)
}
