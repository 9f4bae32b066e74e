use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub jwt_secret: String,
    pub jwt_access_ttl_secs: i64,

    // Gemini generative endpoint
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub ai_timeout_secs: u64,
    pub ai_max_retries: u32,
    pub ai_retry_backoff_ms: u64,
    pub ai_rate_limit_per_hour: u32,

    // External HTML-to-PDF service (optional)
    pub pdf_service_url: Option<String>,
    pub pdf_service_user_id: String,
    pub pdf_service_api_key: String,

    pub report_window_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_access_ttl_secs: env::var("JWT_ACCESS_TTL_SECS")
                .unwrap_or_else(|_| "86400".into())
                .parse()
                .expect("JWT_ACCESS_TTL_SECS must be a number"),

            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".into()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            ai_timeout_secs: env::var("AI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),
            ai_max_retries: env::var("AI_MAX_RETRIES")
                .unwrap_or_else(|_| "1".into())
                .parse()
                .unwrap_or(1),
            ai_retry_backoff_ms: env::var("AI_RETRY_BACKOFF_MS")
                .unwrap_or_else(|_| "500".into())
                .parse()
                .unwrap_or(500),
            ai_rate_limit_per_hour: env::var("AI_RATE_LIMIT_PER_HOUR")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),

            pdf_service_url: env::var("PDF_SERVICE_URL").ok().filter(|s| !s.is_empty()),
            pdf_service_user_id: env::var("PDF_SERVICE_USER_ID").unwrap_or_default(),
            pdf_service_api_key: env::var("PDF_SERVICE_API_KEY").unwrap_or_default(),

            report_window_days: env::var("REPORT_WINDOW_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn ai_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.ai_retry_backoff_ms)
    }
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for unit tests; never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/healthjournal_test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:3000".into(),
            jwt_secret: "test-secret-do-not-use".into(),
            jwt_access_ttl_secs: 900,
            gemini_api_key: Some("test-key".into()),
            gemini_model: "gemini-1.5-flash".into(),
            gemini_base_url: "http://127.0.0.1:9".into(),
            ai_timeout_secs: 5,
            ai_max_retries: 1,
            ai_retry_backoff_ms: 1,
            ai_rate_limit_per_hour: 30,
            pdf_service_url: None,
            pdf_service_user_id: String::new(),
            pdf_service_api_key: String::new(),
            report_window_days: 30,
        }
    }
}
