use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of consecutive entries a weekly analysis covers.
pub const ANALYSIS_WINDOW: usize = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mood {
    Happy,
    Calm,
    Neutral,
    Anxious,
    Angry,
    Low,
    Sick,
    Excited,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Mood::Happy,
        Mood::Calm,
        Mood::Neutral,
        Mood::Anxious,
        Mood::Angry,
        Mood::Low,
        Mood::Sick,
        Mood::Excited,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Calm => "Calm",
            Mood::Neutral => "Neutral",
            Mood::Anxious => "Anxious",
            Mood::Angry => "Angry",
            Mood::Low => "Low",
            Mood::Sick => "Sick",
            Mood::Excited => "Excited",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Mood::Happy => "😊",
            Mood::Calm => "😌",
            Mood::Neutral => "😐",
            Mood::Anxious => "😰",
            Mood::Angry => "😡",
            Mood::Low => "😔",
            Mood::Sick => "🤒",
            Mood::Excited => "🤩",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodDayPoint {
    pub date: NaiveDate,
    pub mood: Mood,
    pub mood_emoji: String,
}

/// Weekly analysis result returned to the caller as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthAnalysis {
    pub mood_timeline: Vec<MoodDayPoint>,
    pub health_score: i64,
    pub summary: String,
}

impl HealthAnalysis {
    /// Checks the decoded result against the dates it was built from.
    /// Returns a description of the first violation found.
    pub fn check_contract(&self, expected_dates: &[NaiveDate]) -> Result<(), String> {
        if self.mood_timeline.len() != expected_dates.len() {
            return Err(format!(
                "mood_timeline has {} points, expected {}",
                self.mood_timeline.len(),
                expected_dates.len()
            ));
        }
        for (i, (point, expected)) in self.mood_timeline.iter().zip(expected_dates).enumerate() {
            if point.date != *expected {
                return Err(format!(
                    "mood_timeline[{}] is dated {}, expected {}",
                    i, point.date, expected
                ));
            }
        }
        if !(0..=100).contains(&self.health_score) {
            return Err(format!("health_score {} is outside 0-100", self.health_score));
        }
        Ok(())
    }
}
