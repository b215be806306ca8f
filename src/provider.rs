//! OpenAI-compatible provider client
//!
//! One HTTP client handle is constructed from [`ProviderConfig`] and shared
//! across the pipeline (no ambient/global state). Two endpoints are used:
//! structured JSON chat completions for batch/category generation and the
//! image generation endpoint for artifacts. Each call is a single attempt;
//! retry policy lives with the caller.

use crate::config::ProviderConfig;
use crate::error::{ArtifactError, Error, ProviderError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Longest response-body prefix kept in error messages
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP client for the structured-generation provider
#[derive(Clone, Debug)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: String,
    n: u32,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl ProviderClient {
    /// Build a client from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Request a structured JSON completion and parse it into `T`.
    ///
    /// The model is instructed (via `response_format`) to emit a single JSON
    /// object; the first choice's message content is parsed as `T`.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Api`] on non-success status,
    /// [`ProviderError::MalformedResponse`] when the envelope or the
    /// embedded JSON cannot be parsed, [`Error::Network`] on transport
    /// failures.
    pub async fn complete_json<T: DeserializeOwned>(&self, system: &str, user: &str) -> Result<T> {
        let request = ChatRequest {
            model: &self.config.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.config.endpoint);
        tracing::debug!(model = %self.config.text_model, "requesting structured completion");
        let response = self
            .http
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let body = Self::check_status(response).await?;
        let envelope: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::MalformedResponse(format!("invalid completion envelope: {e}"))
        })?;
        let content = envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("response had no choices".into()))?;

        serde_json::from_str(&content).map_err(|e| {
            Error::Provider(ProviderError::MalformedResponse(format!(
                "completion content is not the expected JSON shape: {e}"
            )))
        })
    }

    /// Generate one image and return the raw PNG bytes.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::InvalidRequest`] when the provider rejects the
    /// request itself (4xx other than rate limiting),
    /// [`ProviderError::Api`] for rate-limit/server statuses,
    /// [`ArtifactError::MissingData`]/[`ArtifactError::Decode`] for
    /// unusable payloads, [`Error::Network`] on transport failures.
    pub async fn generate_image(&self, prompt: &str, size: u32) -> Result<Vec<u8>> {
        let request = ImageRequest {
            model: self.config.image_model(),
            prompt,
            size: format!("{size}x{size}"),
            n: 1,
            response_format: "b64_json",
        };

        let url = format!("{}/images/generations", self.config.endpoint);
        let response = self
            .http
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() && status.as_u16() != 408 && status.as_u16() != 429 {
            let message = Self::truncated_body(response).await;
            return Err(ArtifactError::InvalidRequest(message).into());
        }
        let body = Self::check_status(response).await?;

        let envelope: ImageResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid image envelope: {e}")))?;
        let b64 = envelope
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or(ArtifactError::MissingData)?;

        BASE64
            .decode(b64.as_bytes())
            .map_err(|e| ArtifactError::Decode(e.to_string()).into())
    }

    /// Map non-success statuses to [`ProviderError::Api`], otherwise return
    /// the body text.
    async fn check_status(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }
        let message = Self::truncated_body(response).await;
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        }
        .into())
    }

    async fn truncated_body(response: reqwest::Response) -> String {
        let body = response.text().await.unwrap_or_default();
        if body.chars().count() > ERROR_BODY_LIMIT {
            body.chars().take(ERROR_BODY_LIMIT).collect()
        } else {
            body
        }
    }
}
