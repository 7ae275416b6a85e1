//! Google Gemini provider implementation
//!
//! Talks to the `generateContent` endpoint of the Generative Language API.

use super::error::parse_retry_after;
use super::types::{ProviderReply, ProviderRequest, Role, TokenUsage};
use super::{ChatProvider, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Result<Self, TransportError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL, timeout)
    }

    /// Point the provider at a non-default host (tests, proxies)
    pub fn with_base_url(
        api_key: String,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let endpoint = format!(
            "{}/{model}:generateContent",
            base_url.trim_end_matches('/')
        );

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    fn translate_request(request: &ProviderRequest) -> GeminiRequest {
        let system_instruction = request.system.as_ref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: text.clone() }],
        });

        // The contents array must open with a user turn; the transcript
        // opens with the widget's assistant greeting, so leading assistant
        // turns are not sent.
        let contents = request
            .history
            .iter()
            .filter(|turn| !turn.text.is_empty())
            .skip_while(|turn| turn.role != Role::User)
            .map(|turn| GeminiContent {
                role: Some(
                    match turn.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: request.max_tokens.map(|t| GeminiGenerationConfig {
                max_output_tokens: Some(i64::from(t)),
            }),
        }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<ProviderReply, TransportError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::unknown("No candidates in response"))?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = resp
            .usage_metadata
            .map(|m| TokenUsage {
                input_tokens: m.prompt_token_count,
                output_tokens: m.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(ProviderReply { text, usage })
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, TransportError> {
        let gemini_request = Self::translate_request(request);
        let url = format!("{}?key={}", self.endpoint, self.api_key);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    TransportError::network(format!("Connection failed: {e}"))
                } else {
                    TransportError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(error_resp) => error_resp.error.message,
                Err(_) => body,
            };
            return Err(
                TransportError::from_status(status.as_u16(), format!("HTTP {status}: {message}"))
                    .with_retry_after(retry_after),
            );
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            TransportError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(gemini_response)
    }

    fn id(&self) -> &str {
        "gemini"
    }
}

// Gemini API wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    #[allow(dead_code)]
    code: Option<i32>,
    #[allow(dead_code)]
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HistoryTurn;

    #[test]
    fn assistant_turns_map_to_model_role() {
        let request = ProviderRequest {
            system: Some("be helpful".to_string()),
            history: vec![
                HistoryTurn::user("hi"),
                HistoryTurn::new(Role::Assistant, "hello"),
                HistoryTurn::user("how are you"),
            ],
            max_tokens: Some(100),
        };

        let wire = GeminiProvider::translate_request(&request);
        assert_eq!(wire.contents.len(), 3);
        assert_eq!(wire.contents[0].role.as_deref(), Some("user"));
        assert_eq!(wire.contents[1].role.as_deref(), Some("model"));
        assert_eq!(wire.contents[2].role.as_deref(), Some("user"));
        assert!(wire.system_instruction.is_some());
        assert_eq!(
            wire.generation_config.unwrap().max_output_tokens,
            Some(100)
        );
    }

    #[test]
    fn contents_always_open_with_a_user_turn() {
        let request = ProviderRequest {
            system: None,
            history: vec![
                HistoryTurn::new(Role::Assistant, "Hello! How can I help?"),
                HistoryTurn::user("I have a headache"),
                HistoryTurn::new(Role::Assistant, "How severe?"),
            ],
            max_tokens: None,
        };

        let wire = GeminiProvider::translate_request(&request);
        assert_eq!(wire.contents.len(), 2);
        assert_eq!(wire.contents[0].role.as_deref(), Some("user"));
        assert_eq!(wire.contents[0].parts[0].text, "I have a headache");
    }

    #[test]
    fn empty_turns_are_dropped() {
        let request = ProviderRequest {
            system: None,
            history: vec![HistoryTurn::user(""), HistoryTurn::user("real")],
            max_tokens: None,
        };

        let wire = GeminiProvider::translate_request(&request);
        assert_eq!(wire.contents.len(), 1);
        assert_eq!(wire.contents[0].parts[0].text, "real");
    }

    #[test]
    fn response_text_is_concatenated() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "a"}, {"text": "b"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2}
        }"#;
        let resp: GeminiResponse = serde_json::from_str(body).unwrap();
        let reply = GeminiProvider::normalize_response(resp).unwrap();
        assert_eq!(reply.text, "ab");
        assert_eq!(reply.usage.input_tokens, 7);
        assert_eq!(reply.usage.output_tokens, 2);
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let resp: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(GeminiProvider::normalize_response(resp).is_err());
    }

    #[tokio::test]
    async fn rate_limited_response_carries_retry_after() {
        use crate::llm::TransportErrorKind;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let body = r#"{"error": {"message": "quota exhausted"}}"#;
            let response = format!(
                "HTTP/1.1 429 Too Many Requests\r\n\
                 Content-Type: application/json\r\n\
                 Retry-After: 2\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });

        let provider = GeminiProvider::with_base_url(
            "test-key".to_string(),
            "gemini-pro",
            &format!("http://{addr}"),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = provider
            .complete(&ProviderRequest::single_prompt("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::RateLimit);
        assert_eq!(err.retry_after, Some(Duration::from_secs(2)));
        assert!(err.message.contains("quota exhausted"));
    }
}
