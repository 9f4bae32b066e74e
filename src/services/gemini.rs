//! Client for the Gemini `generateContent` endpoint.
//!
//! Every call carries an explicit timeout. Timeouts, connection failures and
//! 5xx responses are retried with exponential backoff; 4xx responses are not.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Sampling parameters plus whether content-safety thresholds are sent.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    #[serde(skip)]
    pub safety: bool,
}

impl GenerationConfig {
    /// Near-deterministic sampling for the weekly JSON analysis.
    pub fn analysis() -> Self {
        Self {
            temperature: 0.3,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 1000,
            safety: false,
        }
    }

    pub fn report() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
            safety: true,
        }
    }

    pub fn chat() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 300,
            safety: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Outcome of a single attempt, before retry policy is applied.
enum Attempt {
    Done(Option<String>),
    Retry(AppError),
    Fail(AppError),
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GeminiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.ai_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
            max_retries: config.ai_max_retries,
            retry_backoff: config.ai_retry_backoff(),
        })
    }

    /// Sends the prompt parts as one user turn and returns the first
    /// candidate's text, or `None` when the response carries no text
    /// (e.g. the candidate was blocked by a safety filter).
    pub async fn generate(
        &self,
        parts: &[&str],
        config: &GenerationConfig,
    ) -> AppResult<Option<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Gemini API key not configured".into()))?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: parts.iter().map(|text| Part { text: *text }).collect(),
            }],
            generation_config: config,
            safety_settings: if config.safety {
                SAFETY_CATEGORIES
                    .into_iter()
                    .map(|category| SafetySetting {
                        category,
                        threshold: "BLOCK_MEDIUM_AND_ABOVE",
                    })
                    .collect()
            } else {
                Vec::new()
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let mut attempt: u32 = 0;
        loop {
            match self.attempt(&url, api_key, &request).await {
                Attempt::Done(text) => return Ok(text),
                Attempt::Fail(err) => return Err(err),
                Attempt::Retry(err) if attempt >= self.max_retries => return Err(err),
                Attempt::Retry(err) => {
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        error = %err,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient generative endpoint failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, url: &str, api_key: &str, request: &GenerateRequest<'_>) -> Attempt {
        let response = match self
            .http
            .post(url)
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Attempt::Retry(AppError::Upstream {
                    status: None,
                    message: format!("request failed: {}", e.without_url()),
                })
            }
            Err(e) => {
                return Attempt::Fail(AppError::Upstream {
                    status: None,
                    message: format!("request failed: {}", e.without_url()),
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AppError::Upstream {
                status: Some(status.as_u16()),
                message: upstream_message(&body),
            };
            return if status.is_server_error() {
                Attempt::Retry(err)
            } else {
                Attempt::Fail(err)
            };
        }

        match response.json::<GenerateResponse>().await {
            Ok(parsed) => {
                tracing::debug!(model = %self.model, "Generative endpoint responded");
                Attempt::Done(parsed.first_text())
            }
            Err(e) => Attempt::Fail(AppError::Unparseable(format!(
                "generateContent response was not valid JSON: {}",
                e.without_url()
            ))),
        }
    }
}

/// Extracts `error.message` from a Gemini error body, falling back to the
/// raw body.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server_url: &str, api_key: Option<&str>) -> GeminiClient {
        let mut config = Config::for_tests();
        config.gemini_base_url = server_url.to_string();
        config.gemini_api_key = api_key.map(Into::into);
        GeminiClient::new(&config).unwrap()
    }

    fn candidate_body(text: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    #[test]
    fn test_generation_config_wire_names() {
        let json = serde_json::to_value(GenerationConfig::analysis()).unwrap();
        assert_eq!(json["topK"], 1);
        assert_eq!(json["maxOutputTokens"], 1000);
        assert!(json.get("safety").is_none());
    }

    #[test]
    fn test_upstream_message_prefers_error_field() {
        let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert_eq!(upstream_message(body), "API key not valid");
        assert_eq!(upstream_message(""), "Unknown error");
        assert_eq!(upstream_message("gateway down"), "gateway down");
    }

    #[tokio::test]
    async fn test_generate_returns_first_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "generationConfig": { "topK": 1, "maxOutputTokens": 1000 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(candidate_body("hello"))
            .create_async()
            .await;

        let client = client_for(&server.url(), Some("test-key"));
        let text = client
            .generate(&["prompt"], &GenerationConfig::analysis())
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("hello"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_safety_settings_sent_for_report_profile() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "safetySettings": [
                    { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                    { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                    { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                    { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" }
                ]
            })))
            .with_status(200)
            .with_body(candidate_body("report"))
            .create_async()
            .await;

        let client = client_for(&server.url(), Some("test-key"));
        let text = client
            .generate(&["prompt"], &GenerationConfig::report())
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("report"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_candidates_yields_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let client = client_for(&server.url(), Some("test-key"));
        let text = client
            .generate(&["prompt"], &GenerationConfig::chat())
            .await
            .unwrap();
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server.url(), None);
        let err = client
            .generate(&["prompt"], &GenerationConfig::analysis())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Configuration(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .with_status(503)
            .with_body(r#"{"error":{"message":"The model is overloaded"}}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server.url(), Some("test-key"));
        let err = client
            .generate(&["prompt"], &GenerationConfig::analysis())
            .await
            .unwrap_err();

        match err {
            AppError::Upstream { status, message } => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "The model is overloaded");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"API key not valid"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server.url(), Some("test-key"));
        let err = client
            .generate(&["prompt"], &GenerationConfig::analysis())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Upstream { status: Some(400), .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_error() {
        // Port 9 (discard) on loopback refuses connections.
        let client = client_for("http://127.0.0.1:9", Some("test-key"));
        let err = client
            .generate(&["prompt"], &GenerationConfig::analysis())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: None, .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_retried_once_then_surfaced() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let mut config = Config::for_tests();
        config.gemini_base_url = format!("http://{}", addr);
        config.ai_timeout_secs = 1;
        config.ai_max_retries = 1;
        let client = GeminiClient::new(&config).unwrap();

        let err = client
            .generate(&["prompt"], &GenerationConfig::analysis())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Upstream { status: None, .. }));
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }
}
