//! Google Gemini `generateContent` client (single-shot, no streaming)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::{usage_field, ProviderError, ProviderGateway, ProviderResult, RawResponse};
use crate::records::TokenUsage;

/// Gemini API client
pub struct GeminiProvider {
    name: String,
    api_key: String,
    base_url: String,
    http_client: Client,
    default_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiProvider {
    pub fn new(name: impl Into<String>, api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key,
            base_url: base_url.into(),
            http_client: Client::new(),
            default_model: String::new(),
            temperature: 0.1,
            max_tokens: 8192,
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl ProviderGateway for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn supports_usage(&self) -> bool {
        true
    }

    async fn issue(
        &self,
        prompt: &str,
        model: &str,
        streaming: bool,
    ) -> ProviderResult<RawResponse> {
        if streaming {
            tracing::debug!("{} does not stream; issuing a single-shot request", self.name);
        }

        let model = if model.is_empty() {
            self.default_model.as_str()
        } else {
            model
        };

        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_ms: 60_000,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiError>(&body) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(RawResponse::Single(response.json().await?))
    }

    fn extract_text(&self, raw: &RawResponse) -> Option<String> {
        let RawResponse::Single(body) = raw else {
            return None;
        };

        let parts = body.pointer("/candidates/0/content/parts")?.as_array()?;
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    fn extract_usage(&self, raw: &RawResponse) -> TokenUsage {
        let RawResponse::Single(body) = raw else {
            return TokenUsage::UNKNOWN;
        };
        let Some(meta) = body.get("usageMetadata") else {
            return TokenUsage::UNKNOWN;
        };

        match (
            usage_field(meta, "promptTokenCount"),
            usage_field(meta, "candidatesTokenCount"),
            usage_field(meta, "totalTokenCount"),
        ) {
            (Some(prompt), Some(completion), Some(total)) => {
                TokenUsage::new(prompt, completion, total)
            }
            _ => TokenUsage::UNKNOWN,
        }
    }
}
