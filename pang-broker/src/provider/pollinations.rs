//! Pollinations text backend (OpenAI-compatible chat completions).

use super::{ChatRequest, ChatResponse, Provider, ProviderError};
use async_trait::async_trait;
use pang_common::BackendConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Pollinations API provider.
pub struct PollinationsProvider {
    client: reqwest::Client,
    api_url: String,
}

impl PollinationsProvider {
    /// Create a provider for `api_url`, authenticating when a key is given.
    pub fn new(api_url: impl Into<String>, api_key: Option<&str>, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            match HeaderValue::from_str(&format!("Bearer {}", key)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("API key is not a valid header value, sending without it"),
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_url: api_url.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            config.api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Provider for PollinationsProvider {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError {
                provider: self.name().into(),
                model: request.model.clone(),
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status().as_u16();

        // A body that cannot be read or parsed counts as `{}`.
        let raw = match response.bytes().await {
            Ok(bytes) => serde_json::from_slice::<Value>(&bytes)
                .unwrap_or_else(|_| Value::Object(Default::default())),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read backend response body");
                Value::Object(Default::default())
            }
        };

        let response = ChatResponse::from_raw(status, raw);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Backend call completed"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FALLBACK_REPLY;
    use crate::session::Message;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "qwq-32b".into(),
            messages: vec![Message::system("be brief"), Message::user("hi")],
        }
    }

    #[tokio::test]
    async fn test_sends_model_and_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(json!({
                "model": "qwq-32b",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = PollinationsProvider::new(
            format!("{}/openai", server.uri()),
            Some("test-key"),
            Duration::from_secs(5),
        );
        let response = provider.chat(request()).await.unwrap();

        assert_eq!(response.reply, "hello");
        assert_eq!(response.status, 200);
        assert_eq!(response.raw["choices"][0]["message"]["content"], "hello");
    }

    #[tokio::test]
    async fn test_error_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "overloaded"})))
            .mount(&server)
            .await;

        let provider = PollinationsProvider::new(server.uri(), None, Duration::from_secs(5));
        let response = provider.chat(request()).await.unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.reply, FALLBACK_REPLY);
        assert_eq!(response.raw, json!({"error": "overloaded"}));
    }

    #[tokio::test]
    async fn test_non_json_body_becomes_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let provider = PollinationsProvider::new(server.uri(), None, Duration::from_secs(5));
        let response = provider.chat(request()).await.unwrap();

        assert_eq!(response.raw, json!({}));
        assert_eq!(response.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_no_auth_header_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let provider = PollinationsProvider::new(server.uri(), Some(""), Duration::from_secs(5));
        provider.chat(request()).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let provider =
            PollinationsProvider::new("http://127.0.0.1:1/openai", None, Duration::from_secs(2));
        let err = provider.chat(request()).await.unwrap_err();

        assert_eq!(err.provider, "pollinations");
        assert_eq!(err.model, "qwq-32b");
        assert!(err.message.starts_with("Request failed"));
    }
}
