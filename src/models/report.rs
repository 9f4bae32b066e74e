use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Pdf,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReportRequest {
    #[serde(default)]
    pub format: ReportFormat,
    #[validate(length(max = 100, message = "Patient name must be at most 100 characters"))]
    pub patient_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// JSON-mode report body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub report: String,
    pub data_points: usize,
    pub date_range: DateRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_defaults_to_text() {
        let req: ReportRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.format, ReportFormat::Text);
        assert!(req.patient_name.is_none());
    }

    #[test]
    fn test_pdf_format_parses() {
        let req: ReportRequest =
            serde_json::from_str(r#"{"format":"pdf","patient_name":"Ana"}"#).unwrap();
        assert_eq!(req.format, ReportFormat::Pdf);
    }

    #[test]
    fn test_report_serializes_camel_case_contract() {
        let report = HealthReport {
            report: "# Health Report".into(),
            data_points: 3,
            date_range: DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dataPoints"], 3);
        assert_eq!(json["dateRange"]["start"], "2024-01-01");
        assert_eq!(json["dateRange"]["end"], "2024-01-03");
    }
}
