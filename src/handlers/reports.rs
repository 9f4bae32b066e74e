use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration, NaiveDate, Utc};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::handlers::{auth::load_user, health_logs::fetch_since};
use crate::models::report::{ReportFormat, ReportRequest};
use crate::services::report::generate_report;
use crate::AppState;

pub async fn create_report(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ReportRequest>,
) -> AppResult<Response> {
    body.validate()?;

    let patient_name = match body
        .patient_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        Some(name) => name.to_string(),
        None => load_user(&state.db, auth_user.id).await?.preferred_name(),
    };

    let now = Utc::now();
    let window_days = state.config.report_window_days;
    let since = now.date_naive() - Duration::days(window_days);
    let entries = fetch_since(&state.db, auth_user.id, since).await?;

    let report = generate_report(&state.gemini, &patient_name, window_days, &entries, now).await?;

    tracing::info!(
        user_id = %auth_user.id,
        data_points = report.data_points,
        format = ?body.format,
        "Report generated"
    );

    match body.format {
        ReportFormat::Text => Ok(Json(report).into_response()),
        ReportFormat::Pdf => {
            let bytes = state.pdf.render(&report.report).await;
            Ok(pdf_response(bytes, now.date_naive()))
        }
    }
}

fn pdf_response(bytes: Vec<u8>, generated_on: NaiveDate) -> Response {
    let disposition = format!(
        "attachment; filename=\"health-report-{}.pdf\"",
        generated_on.format("%Y-%m-%d")
    );

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
