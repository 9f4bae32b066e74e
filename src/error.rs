use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    /// Precondition not met (too few journal entries, empty report window).
    #[error("{0}")]
    InsufficientData(String),

    /// A required setting (e.g. the Gemini API key) is absent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generative endpoint error{}: {message}", fmt_status(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Model output that does not satisfy the analysis contract.
    #[error("Analysis unparseable: {0}")]
    Unparseable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" {s}")).unwrap_or_default()
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl AppError {
    /// Maps a unique-constraint violation to `Conflict`; any other
    /// database error stays a `Database` error.
    pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict(message.to_string());
            }
        }
        AppError::Database(err)
    }

    fn status_and_category(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid request"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
            AppError::InsufficientData(_) => (StatusCode::BAD_REQUEST, "Not enough data"),
            AppError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Service not configured")
            }
            AppError::Upstream { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AI service unavailable")
            }
            AppError::Unparseable(_) => (StatusCode::BAD_GATEWAY, "AI response unparseable"),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, category) = self.status_and_category();

        let message = match &self {
            AppError::NotFound(msg) | AppError::Validation(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::InsufficientData(msg) => {
                tracing::info!(reason = %msg, "Precondition not met");
                msg.clone()
            }
            AppError::Configuration(msg) => {
                tracing::error!(error = %msg, "Missing configuration");
                self.to_string()
            }
            AppError::Upstream { .. } | AppError::Unparseable(_) => {
                tracing::error!(error = %self, "Generative endpoint failure");
                self.to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal server error".into()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                "Internal server error".into()
            }
            _ => self.to_string(),
        };

        let body = json!({
            "error": message,
            "message": category,
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
