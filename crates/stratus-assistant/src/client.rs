use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use stratus_types::api::TokenUsage;
use thiserror::Error;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat provider unreachable: {0}")]
    Network(String),
    #[error("chat provider rate limited")]
    RateLimited,
    #[error("chat provider error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("completion missing message content")]
    BadCompletion,
}

/// One turn of an OpenAI-style conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant", content: content.into() }
    }
}

/// Per-request knobs. The defaults match the conversational path; the
/// structured services (tips, alerts) override them call by call.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub max_tokens: u32,
    pub temperature: f64,
    pub json_mode: bool,
    pub timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            json_mode: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Client for an OpenAI-compatible chat completions endpoint. `base_url`
/// is the API root (e.g. `https://api.groq.com/openai/v1`); the
/// `/chat/completions` path is appended here.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// True when a provider key was configured. Without one every call
    /// would 401, so callers skip straight to their fallbacks.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Completion, ChatError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });
        if options.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(ChatError::RateLimited);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api { status: status.as_u16(), body });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ChatError::BadCompletion)?
            .trim()
            .to_string();

        let model = payload["model"]
            .as_str()
            .unwrap_or(&self.model)
            .to_string();

        let usage = payload.get("usage").map(|u| TokenUsage {
            input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
        });

        debug!(model, "chat completion received");
        Ok(Completion { content, model, usage })
    }
}

/// Models keep wrapping JSON answers in markdown fences no matter what the
/// prompt says. Take the text between a ```` ```json ```` (or bare
/// ```` ``` ````) pair when present, the trimmed input otherwise.
pub fn strip_code_fences(raw: &str) -> &str {
    let inner = match raw.split_once("```json") {
        Some((_, rest)) => rest,
        None => match raw.split_once("```") {
            Some((_, rest)) => rest,
            None => return raw.trim(),
        },
    };
    match inner.split_once("```") {
        Some((body, _)) => body.trim(),
        None => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "llama-3.3-70b-versatile",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": content}}
            ],
            "usage": {"prompt_tokens": 42, "completion_tokens": 18}
        })
    }

    #[tokio::test]
    async fn complete_sends_bearer_auth_and_reads_the_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "llama-3.3-70b-versatile",
                "temperature": 0.7,
                "max_tokens": 500,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  Hi there!  ")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new("sk-test", &server.uri(), "llama-3.3-70b-versatile");
        let completion = client
            .complete(&[ChatMessage::user("hello")], &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "Hi there!");
        assert_eq!(completion.model, "llama-3.3-70b-versatile");
        let usage = completion.usage.unwrap();
        assert_eq!(usage.input_tokens, 42);
        assert_eq!(usage.output_tokens, 18);
    }

    #[tokio::test]
    async fn json_mode_requests_a_json_object_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new("sk-test", &server.uri(), "llama-3.3-70b-versatile");
        let options = ChatOptions { json_mode: true, ..ChatOptions::default() };
        client
            .complete(&[ChatMessage::user("tips")], &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rate_limit_and_server_errors_map_to_their_variants() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = ChatClient::new("sk-test", &server.uri(), "m");
        let err = client
            .complete(&[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::RateLimited));

        let err = client
            .complete(&[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap_err();
        match err {
            ChatError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_message_content_is_a_bad_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = ChatClient::new("sk-test", &server.uri(), "m");
        let err = client
            .complete(&[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::BadCompletion));
    }

    #[test]
    fn fence_stripping_handles_the_usual_wrappers() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(
            strip_code_fences("Here you go:\n```json\n{\"a\":1}\n``` hope that helps"),
            "{\"a\":1}"
        );
        assert_eq!(strip_code_fences("  plain text  "), "plain text");
    }
}
