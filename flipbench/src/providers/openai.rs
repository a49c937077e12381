//! OpenAI-compatible chat completions client (OpenAI, Together, NVIDIA NIM)

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::{usage_field, ProviderError, ProviderGateway, ProviderResult, RawResponse};
use crate::records::TokenUsage;

const STREAM_DONE: &str = "[DONE]";

/// Chat-completions client for any OpenAI-compatible endpoint
pub struct OpenAiChatProvider {
    name: String,
    api_key: String,
    base_url: String,
    http_client: Client,
    default_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatProvider {
    /// Create a new client
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

    /// Use a preconfigured HTTP client (timeouts etc.)
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Set default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set completion token limit
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn read_stream(response: reqwest::Response) -> ProviderResult<Vec<Value>> {
        let mut chunks = Vec::new();
        let mut buffer: Vec<u8> = Vec::new();
        let mut body = response.bytes_stream();

        while let Some(bytes) = body.next().await {
            buffer.extend_from_slice(&bytes?);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(chunk) = parse_sse_line(&String::from_utf8_lossy(&line))? {
                    chunks.push(chunk);
                }
            }
        }

        // Trailing line without a newline terminator
        if let Some(chunk) = parse_sse_line(&String::from_utf8_lossy(&buffer))? {
            chunks.push(chunk);
        }

        Ok(chunks)
    }
}

/// Decode one server-sent-event line into a JSON chunk.
///
/// Comments, non-data fields and the `[DONE]` terminator yield `None`.
fn parse_sse_line(line: &str) -> ProviderResult<Option<Value>> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();
    if data.is_empty() || data == STREAM_DONE {
        return Ok(None);
    }

    serde_json::from_str(data)
        .map(Some)
        .map_err(|e| ProviderError::Parse(format!("Invalid stream chunk: {}", e)))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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
impl ProviderGateway for OpenAiChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supports_streaming(&self) -> bool {
        true
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
        let model = if model.is_empty() {
            self.default_model.as_str()
        } else {
            model
        };

        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: streaming,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60)
                * 1000;
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
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

        if streaming {
            Ok(RawResponse::Stream(Self::read_stream(response).await?))
        } else {
            Ok(RawResponse::Single(response.json().await?))
        }
    }

    fn extract_text(&self, raw: &RawResponse) -> Option<String> {
        match raw {
            RawResponse::Single(body) => body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .map(str::to_string),
            RawResponse::Stream(chunks) => {
                if chunks.is_empty() {
                    return None;
                }
                let text: String = chunks
                    .iter()
                    .filter_map(|c| c.pointer("/choices/0/delta/content").and_then(Value::as_str))
                    .collect();
                Some(text)
            }
        }
    }

    fn extract_usage(&self, raw: &RawResponse) -> TokenUsage {
        let usage = match raw {
            RawResponse::Single(body) => body.get("usage"),
            // Usage, when sent at all, rides on one of the final chunks
            RawResponse::Stream(chunks) => chunks
                .iter()
                .rev()
                .find_map(|c| c.get("usage").filter(|u| u.is_object())),
        };

        let Some(usage) = usage else {
            return TokenUsage::UNKNOWN;
        };

        match (
            usage_field(usage, "prompt_tokens"),
            usage_field(usage, "completion_tokens"),
            usage_field(usage, "total_tokens"),
        ) {
            (Some(prompt), Some(completion), Some(total)) => {
                TokenUsage::new(prompt, completion, total)
            }
            _ => TokenUsage::UNKNOWN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiChatProvider {
        OpenAiChatProvider::new("together", "test-key".to_string(), server.uri())
            .with_model("test-model")
    }

    #[test]
    fn test_parse_sse_line() {
        assert!(parse_sse_line(": keep-alive\n").unwrap().is_none());
        assert!(parse_sse_line("data: [DONE]\n").unwrap().is_none());
        assert!(parse_sse_line("event: message\n").unwrap().is_none());
        let chunk = parse_sse_line("data: {\"a\": 1}\r\n").unwrap().unwrap();
        assert_eq!(chunk["a"], 1);
        assert!(parse_sse_line("data: {broken").is_err());
    }

    #[test]
    fn test_extract_from_single_body() {
        let p = OpenAiChatProvider::new("openai", String::new(), "http://unused");
        let raw = RawResponse::Single(json!({
            "choices": [{"message": {"role": "assistant", "content": "The answer is (b) Paris."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        }));

        assert_eq!(p.extract_text(&raw).as_deref(), Some("The answer is (b) Paris."));
        assert_eq!(p.extract_usage(&raw), TokenUsage::new(12, 7, 19));
    }

    #[test]
    fn test_missing_content_and_usage() {
        let p = OpenAiChatProvider::new("openai", String::new(), "http://unused");
        let raw = RawResponse::Single(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }));

        assert_eq!(p.extract_text(&raw), None);
        assert_eq!(p.extract_usage(&raw), TokenUsage::UNKNOWN);
    }

    #[test]
    fn test_extract_from_stream_chunks() {
        let p = OpenAiChatProvider::new("together", String::new(), "http://unused");
        let raw = RawResponse::Stream(vec![
            json!({"choices": [{"delta": {"role": "assistant"}}]}),
            json!({"choices": [{"delta": {"content": "The answer "}}]}),
            json!({"choices": [{"delta": {"content": "is (c)"}}], "usage": null}),
        ]);

        assert_eq!(p.extract_text(&raw).as_deref(), Some("The answer is (c)"));
        assert_eq!(p.extract_usage(&raw), TokenUsage::UNKNOWN);
        assert_eq!(p.extract_text(&RawResponse::Stream(vec![])), None);
    }

    #[tokio::test]
    async fn test_issue_single() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "test-model", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "The answer is (a) 4"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let raw = p.issue("2+2?", "", false).await.unwrap();
        assert_eq!(p.extract_text(&raw).as_deref(), Some("The answer is (a) 4"));
        assert_eq!(p.extract_usage(&raw).total, 8);
    }

    #[tokio::test]
    async fn test_issue_streaming() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"<think>ok</think>\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" The answer is (d)\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let p = provider(&server);
        let raw = p.issue("q", "test-model", true).await.unwrap();
        assert_eq!(
            p.extract_text(&raw).as_deref(),
            Some("<think>ok</think> The answer is (d)")
        );
        assert_eq!(p.extract_usage(&raw), TokenUsage::UNKNOWN);
    }

    #[tokio::test]
    async fn test_api_error_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"message": "upstream overloaded"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server).issue("q", "", false).await.unwrap_err();
        match err {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let err = provider(&server).issue("q", "", false).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_ms: 2000 }));
    }
}
