use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::AppState;

/// Auth endpoints: requests per IP and path per window.
const AUTH_MAX_REQUESTS: u32 = 5;
const AUTH_WINDOW_SECS: u64 = 60;
/// AI endpoints are limited per user per hour.
const AI_WINDOW_SECS: u64 = 3600;

/// In-memory fixed-window limiter (single-instance deployments).
#[derive(Clone, Default)]
pub struct RateLimitState {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the remaining allowance, or how long until the window resets.
    pub async fn check(&self, key: &str, max_requests: u32, window_secs: u64) -> Result<u32, Duration> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
            window,
        });

        if now.duration_since(entry.window_start) > entry.window {
            entry.count = 0;
            entry.window_start = now;
            entry.window = window;
        }

        if entry.count >= max_requests {
            let retry_after = entry.window.saturating_sub(now.duration_since(entry.window_start));
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(max_requests - entry.count)
    }

    /// Gives back one request to `key` in its current window.
    pub async fn refund(&self, key: &str) {
        if let Some(entry) = self.entries.lock().await.get_mut(key) {
            entry.count = entry.count.saturating_sub(1);
        }
    }

    /// Drops entries whose window has long expired.
    pub async fn cleanup(&self) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < entry.window * 2);
    }

    /// Spawns a task that purges expired entries every five minutes.
    pub fn spawn_cleanup_worker(&self) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                tracing::debug!("Rate limiter entries purged");
            }
        });
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Per-IP limiting for register/login.
pub async fn rate_limit_auth(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = addr.ip().to_string();
    let path = req.uri().path().to_string();
    let key = format!("{}:{}", ip, path);

    match state
        .rate_limiter
        .check(&key, AUTH_MAX_REQUESTS, AUTH_WINDOW_SECS)
        .await
    {
        Ok(remaining) => {
            tracing::debug!(ip = %ip, path = %path, remaining = remaining, "Rate limit check passed");
            Ok(next.run(req).await)
        }
        Err(retry_after) => {
            tracing::warn!(
                ip = %ip,
                path = %path,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            Err(AppError::RateLimited)
        }
    }
}

/// Per-user limiting for the generative endpoints. Runs inside
/// `require_auth`, which provides the `AuthUser`. Requests turned away
/// before the model is called (too little data, invalid body) are not
/// counted.
pub async fn rate_limit_ai(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("ai:{}", auth_user.id);

    match state
        .rate_limiter
        .check(&key, state.config.ai_rate_limit_per_hour, AI_WINDOW_SECS)
        .await
    {
        Ok(remaining) => {
            tracing::debug!(user_id = %auth_user.id, remaining = remaining, "AI rate limit check passed");
            let response = next.run(req).await;
            if refused_before_generation(response.status()) {
                state.rate_limiter.refund(&key).await;
            }
            Ok(response)
        }
        Err(retry_after) => {
            tracing::warn!(
                user_id = %auth_user.id,
                retry_after_secs = retry_after.as_secs(),
                "AI rate limit exceeded"
            );
            Err(AppError::RateLimited)
        }
    }
}

fn refused_before_generation(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
    )
}
