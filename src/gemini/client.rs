use super::wire::{GenerateContentRequest, GenerateContentResponse};
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Error substrings the endpoints emit when a credential is rejected.
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "API_KEY_INVALID",
    "API key not valid",
    "PERMISSION_DENIED",
    "UNAUTHENTICATED",
];

/// Total send attempts for a retriable `generateContent` call.
const MAX_SEND_ATTEMPTS: u32 = 3;

// ── Error Types ────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum GenAiError {
    Transport(String),
    Api { status: u16, body: String },
    Parse(String),
}

impl fmt::Display for GenAiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenAiError::Transport(msg) => write!(f, "transport error: {}", msg),
            GenAiError::Api { status, body } => write!(f, "API error (HTTP {}): {}", status, body),
            GenAiError::Parse(msg) => write!(f, "unparseable response: {}", msg),
        }
    }
}

impl std::error::Error for GenAiError {}

impl GenAiError {
    /// Whether this error means the credential itself was rejected.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            GenAiError::Api { status, body } => {
                *status == 401 || AUTH_FAILURE_MARKERS.iter().any(|m| body.contains(m))
            }
            _ => false,
        }
    }
}

// ── Client ─────────────────────────────────────────────

/// One HTTP client for every `generateContent` call the pipeline makes.
/// The base URL is overridable so tests can point it at a local fake.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        // System proxies intercept loopback mock servers; bypass them there.
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(180));
        if base_url.contains("127.0.0.1") || base_url.contains("localhost") {
            builder = builder.no_proxy();
        }

        Self {
            client: builder.build().unwrap_or_else(|_| reqwest::Client::new()),
            base_url,
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    /// One `generateContent` round trip. Network errors, 429 and 5xx are
    /// retried with doubling backoff; a rate-limit `Retry-After` header
    /// overrides the backoff.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        let url = self.endpoint(model);
        let body = serde_json::to_value(request)
            .map_err(|e| GenAiError::Parse(format!("failed to serialize request: {}", e)))?;

        let mut backoff = Duration::from_millis(500);
        let mut attempt = 1;
        let response = loop {
            let result = self.post(&url).json(&body).send().await;

            let retriable = match &result {
                Ok(response) => {
                    let status = response.status();
                    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
                }
                Err(_) => true,
            };
            if !retriable || attempt >= MAX_SEND_ATTEMPTS {
                break result.map_err(|e| {
                    GenAiError::Transport(format!("{} (after {} attempts)", e, attempt))
                })?;
            }

            match &result {
                Ok(response) => {
                    let wait = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or(backoff);
                    warn!(
                        "model {} returned {}, retrying in {:?} (attempt {}/{})",
                        model,
                        response.status(),
                        wait,
                        attempt,
                        MAX_SEND_ATTEMPTS
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    warn!(
                        "request to model {} failed ({}), retrying in {:?} (attempt {}/{})",
                        model, e, backoff, attempt, MAX_SEND_ATTEMPTS
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
            backoff *= 2;
            attempt += 1;
        };

        Self::read_response(response).await
    }

    /// One `generateContent` round trip with no retry of any kind, for the
    /// prompt engineering call.
    pub async fn generate_content_once(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        let response = self
            .post(&self.endpoint(model))
            .json(request)
            .send()
            .await
            .map_err(|e| GenAiError::Transport(e.to_string()))?;

        Self::read_response(response).await
    }

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<GenerateContentResponse, GenAiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenAiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GenAiError::Parse(e.to_string()))
    }
}
