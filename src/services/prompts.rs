//! Prompt text for the three generative calls: weekly analysis, 30-day
//! report and assistant chat.

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::analysis::Mood;
use crate::models::chat::ChatTurn;
use crate::models::health_log::HealthLog;

/// Journal entries included in the assistant's context.
pub const CHAT_CONTEXT_ENTRIES: i64 = 10;
/// Conversation turns included in the assistant's context.
pub const CHAT_HISTORY_TURNS: usize = 5;

/// `7/10`, or `n/a` when the entry has no rating.
fn rating(value: Option<i32>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{}/10", v))
}

/// One `Day N (...)` line per entry. `entries` must already be in
/// chronological order.
pub fn analysis_day_lines(entries: &[HealthLog]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(i, log)| {
            format!(
                "Day {} ({}): \"{}\" (Mood: {}, Sleep: {}, Tags: {})",
                i + 1,
                log.log_date,
                log.entry_text,
                rating(log.mood_rating),
                rating(log.sleep_rating),
                log.joined_tags().unwrap_or_else(|| "none".into()),
            )
        })
        .collect()
}

pub fn analysis_prompt(entries: &[HealthLog]) -> String {
    let labels = Mood::ALL
        .iter()
        .map(|m| m.label())
        .collect::<Vec<_>>()
        .join(", ");
    let emoji_map = Mood::ALL
        .iter()
        .map(|m| format!("{}: {}", m.label(), m.emoji()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Analyze these {count} daily health journal entries and provide:

1. MOOD_TIMELINE: For each day, identify the dominant mood expressed. Use exactly one of these labels: {labels}

2. HEALTH_SCORE: Based on the overall tone, symptoms, sleep quality, and wellbeing indicators, rate the person's overall health from 0-100

3. SUMMARY: A brief, encouraging 1-sentence summary of their week

Journal entries:
{days}

Respond ONLY with valid JSON in this exact format:
{{
  "mood_timeline": [
    {{"date": "2024-01-01", "mood": "Calm", "mood_emoji": "😌"}},
    {{"date": "2024-01-02", "mood": "Happy", "mood_emoji": "😊"}},
    ...continue for all {count} days, using each entry's date in order
  ],
  "health_score": 75,
  "summary": "You've been managing stress well and maintaining good sleep habits this week!"
}}

Use these exact mood-to-emoji mappings:
{emoji_map}
"#,
        count = entries.len(),
        labels = labels,
        days = analysis_day_lines(entries).join("\n"),
        emoji_map = emoji_map,
    )
}

#[derive(Debug, Serialize)]
struct ReportDataPoint<'a> {
    date: chrono::NaiveDate,
    entry: &'a str,
    mood: Option<i32>,
    sleep: Option<i32>,
    symptoms: Option<&'a serde_json::Value>,
    tags: &'a [String],
}

pub fn report_prompt(patient_name: &str, window_days: i64, entries: &[HealthLog]) -> AppResult<String> {
    let data: Vec<ReportDataPoint<'_>> = entries
        .iter()
        .map(|log| ReportDataPoint {
            date: log.log_date,
            entry: &log.entry_text,
            mood: log.mood_rating,
            sleep: log.sleep_rating,
            symptoms: log.symptoms.as_ref(),
            tags: log.tags.as_deref().unwrap_or_default(),
        })
        .collect();
    let data_json = serde_json::to_string_pretty(&data)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode report data: {}", e)))?;

    Ok(format!(
        r#"You are a health data analyst creating a medical-style summary report for a patient to share with their doctor. Analyze the provided health journal entries and create a comprehensive, professional report.

PATIENT: {name}
REPORTING PERIOD: Last {days} Days

REPORT STRUCTURE:
1. **Executive Summary** - Brief overview of the reporting period and key findings
2. **Symptom Analysis** - Most frequent symptoms, patterns, and timing
3. **Lifestyle Factors** - Sleep patterns, mood trends, diet observations
4. **Potential Correlations** - Any patterns between lifestyle factors and symptoms
5. **Recommendations for Healthcare Provider** - Key discussion points for medical consultation

GUIDELINES:
- Address the report for "{name}"
- Use professional, medical-style language
- Focus on objective observations, not diagnoses
- Highlight patterns and frequencies
- Note any concerning trends
- Include specific dates and data points
- Format for easy physician review
- Keep medical disclaimer

Health Journal Data for {name} (Last {days} Days):
{data}

Generate a comprehensive health report that {name} can confidently share with their healthcare provider."#,
        name = patient_name,
        days = window_days,
        data = data_json,
    ))
}

/// Context line for the assistant. `entries` are newest first.
fn chat_context(entries: &[HealthLog]) -> String {
    if entries.is_empty() {
        return "No health logs available yet.".to_string();
    }
    entries
        .iter()
        .map(|log| {
            format!(
                "{}: {} (Mood: {}, Sleep: {}, Tags: {})",
                log.log_date,
                log.entry_text,
                rating(log.mood_rating),
                rating(log.sleep_rating),
                log.joined_tags().unwrap_or_else(|| "None".into()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn conversation_context(history: &[ChatTurn]) -> String {
    let start = history.len().saturating_sub(CHAT_HISTORY_TURNS);
    history[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chat_system_prompt(entries: &[HealthLog], history: &[ChatTurn]) -> String {
    format!(
        r#"You are a warm, empathetic AI health journal companion named "Health Assistant". Your role is to:

1. Help users reflect on their daily health experiences
2. Ask thoughtful follow-up questions about their wellbeing
3. Identify potential patterns between symptoms, food, sleep, and mood
4. Provide gentle guidance (NOT medical advice)
5. Encourage consistent journaling habits

IMPORTANT GUIDELINES:
- Always be warm, supportive, and non-judgmental
- Never provide medical advice or diagnose conditions
- Encourage users to consult healthcare professionals for medical concerns
- Focus on patterns and correlations, not causation
- Ask open-ended questions to encourage reflection
- Keep responses conversational and under 150 words

User's Recent Health Context:
{health}

Recent Conversation:
{conversation}

Remember: You're a journaling companion, not a doctor. Focus on emotional support and pattern recognition."#,
        health = chat_context(entries),
        conversation = conversation_context(history),
    )
}

pub fn chat_user_part(message: &str) -> String {
    format!("User message: {}", message.trim())
}
