use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_text: String,
    pub mood_rating: Option<i32>,
    pub sleep_rating: Option<i32>,
    pub symptoms: Option<serde_json::Value>,
    pub tags: Option<Vec<String>>,
    pub log_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl HealthLog {
    /// Tags joined with ", ", or `None` when the entry has no tags.
    pub fn joined_tags(&self) -> Option<String> {
        match self.tags.as_deref() {
            Some(tags) if !tags.is_empty() => Some(tags.join(", ")),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHealthLogRequest {
    #[validate(custom = "validate_entry_text")]
    pub entry_text: String,
    #[validate(range(min = 1, max = 10, message = "Mood must be between 1 and 10"))]
    pub mood_rating: Option<i32>,
    #[validate(range(min = 1, max = 10, message = "Sleep must be between 1 and 10"))]
    pub sleep_rating: Option<i32>,
    pub symptoms: Option<serde_json::Value>,
    #[validate(custom = "validate_tags")]
    pub tags: Option<Vec<String>>,
    pub log_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateHealthLogRequest {
    #[validate(custom = "validate_entry_text")]
    pub entry_text: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Mood must be between 1 and 10"))]
    pub mood_rating: Option<i32>,
    #[validate(range(min = 1, max = 10, message = "Sleep must be between 1 and 10"))]
    pub sleep_rating: Option<i32>,
    pub symptoms: Option<serde_json::Value>,
    #[validate(custom = "validate_tags")]
    pub tags: Option<Vec<String>>,
    pub log_date: Option<NaiveDate>,
}

impl UpdateHealthLogRequest {
    /// Tags to write plus whether the stored tags should be cleared.
    /// An absent field leaves tags untouched; an explicit list that
    /// normalizes to nothing clears them.
    pub fn tags_update(&self) -> (Option<Vec<String>>, bool) {
        match normalize_tags(self.tags.clone()) {
            Some(tags) => (Some(tags), false),
            None => (None, self.tags.is_some()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HealthLogQuery {
    pub limit: Option<i64>,
}

impl HealthLogQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 365)
    }
}

fn validate_entry_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Please write something about your day".into());
        return Err(err);
    }
    if text.chars().count() > 10_000 {
        let mut err = ValidationError::new("length");
        err.message = Some("Entry must be at most 10000 characters".into());
        return Err(err);
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        let mut err = ValidationError::new("too_many_tags");
        err.message = Some(format!("At most {} tags are allowed", MAX_TAGS).into());
        return Err(err);
    }
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_TAG_LEN {
            let mut err = ValidationError::new("tag");
            err.message = Some(format!("Tags must be 1-{} characters", MAX_TAG_LEN).into());
            return Err(err);
        }
    }
    Ok(())
}

/// Trims tags and drops duplicates, keeping the first occurrence.
/// An empty result is stored as NULL.
pub fn normalize_tags(tags: Option<Vec<String>>) -> Option<Vec<String>> {
    let tags = tags?;
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(text: &str, mood: Option<i32>) -> CreateHealthLogRequest {
        CreateHealthLogRequest {
            entry_text: text.into(),
            mood_rating: mood,
            sleep_rating: Some(7),
            symptoms: None,
            tags: Some(vec!["headache".into()]),
            log_date: None,
        }
    }

    #[test]
    fn test_valid_entry_passes() {
        assert!(create_request("Slept well, light headache", Some(6)).validate().is_ok());
    }

    #[test]
    fn test_blank_entry_rejected() {
        assert!(create_request("   ", Some(6)).validate().is_err());
    }

    #[test]
    fn test_mood_out_of_range_rejected() {
        assert!(create_request("ok day", Some(11)).validate().is_err());
        assert!(create_request("ok day", Some(0)).validate().is_err());
    }

    #[test]
    fn test_absent_ratings_are_allowed() {
        let mut req = create_request("ok day", None);
        req.sleep_rating = None;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_too_many_tags_rejected() {
        let mut req = create_request("ok day", Some(5));
        req.tags = Some((0..=MAX_TAGS).map(|i| format!("tag{i}")).collect());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_with_no_fields_is_valid() {
        let req = UpdateHealthLogRequest {
            entry_text: None,
            mood_rating: None,
            sleep_rating: None,
            symptoms: None,
            tags: None,
            log_date: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_tags_absent_leaves_stored_tags() {
        let req: UpdateHealthLogRequest = serde_json::from_str(r#"{"mood_rating": 4}"#).unwrap();
        assert_eq!(req.tags_update(), (None, false));
    }

    #[test]
    fn test_update_with_empty_tags_clears_them() {
        let req: UpdateHealthLogRequest = serde_json::from_str(r#"{"tags": []}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.tags_update(), (None, true));
    }

    #[test]
    fn test_update_with_tags_replaces_them() {
        let req: UpdateHealthLogRequest =
            serde_json::from_str(r#"{"tags": [" sleep ", "sleep", "stress"]}"#).unwrap();
        assert_eq!(
            req.tags_update(),
            (Some(vec!["sleep".to_string(), "stress".to_string()]), false)
        );
    }

    #[test]
    fn test_normalize_tags_dedupes_and_trims() {
        let tags = normalize_tags(Some(vec![
            " sleep ".into(),
            "stress".into(),
            "sleep".into(),
        ]));
        assert_eq!(tags, Some(vec!["sleep".to_string(), "stress".to_string()]));
    }

    #[test]
    fn test_normalize_empty_tags_is_none() {
        assert_eq!(normalize_tags(Some(vec![])), None);
        assert_eq!(normalize_tags(None), None);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(HealthLogQuery { limit: None }.effective_limit(), 100);
        assert_eq!(HealthLogQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(HealthLogQuery { limit: Some(10_000) }.effective_limit(), 365);
    }
}
