use crate::config::Config;
use crate::events::Turn;
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Shown when the API answers without any usable text
pub const EMPTY_REPLY: &str = "No response from bot.";

static BOLD_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold markup pattern is valid"));

/// Why a request produced no reply.
///
/// The variant is decided where the failure happens; the `Display` text is
/// what ends up in the reply bubble.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The user stopped the response
    #[error("Response generation stopped")]
    Cancelled,
    /// Connection, DNS or timeout failure
    #[error("Network error. Please try again.")]
    Network(String),
    /// Non-2xx answer, carrying the API's own message
    #[error("{message}")]
    Api { status: u16, message: String },
    /// 2xx answer whose body was not JSON
    #[error("{0}")]
    InvalidResponse(String),
    #[error("No API key configured. Set GEMINI_API_KEY or add api_key to the config file.")]
    MissingApiKey,
}

impl ChatError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }
}

/// Anything that can turn a conversation into the next reply text
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    async fn generate(&self, contents: Vec<Turn>) -> Result<String, ChatError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Turn],
}

/// Client for the `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key: config.get_api_key(),
        })
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn generate(&self, contents: Vec<Turn>) -> Result<String, ChatError> {
        let api_key = self.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;

        debug!(
            endpoint = %self.endpoint,
            turns = contents.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(&GenerateRequest {
                contents: &contents,
            })
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport_error)?;

        debug!(status, bytes = body.len(), "Received generateContent response");
        parse_reply(status, &body)
    }
}

fn classify_transport_error(err: reqwest::Error) -> ChatError {
    warn!(error = %err, "Request to generative API failed");
    if err.is_decode() {
        ChatError::InvalidResponse(err.to_string())
    } else {
        ChatError::Network(err.to_string())
    }
}

/// Turn a raw HTTP status and body into reply text or a tagged error
pub fn parse_reply(status: u16, body: &str) -> Result<String, ChatError> {
    let success = (200..300).contains(&status);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if !success => {
            return Err(ChatError::Api {
                status,
                message: format!("API request failed with status {status}"),
            })
        }
        Err(err) => {
            return Err(ChatError::InvalidResponse(format!(
                "Invalid response from API: {err}"
            )))
        }
    };

    if !success {
        let message = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("API request failed with status {status}"));
        return Err(ChatError::Api { status, message });
    }

    Ok(extract_reply_text(&value))
}

/// Reads `candidates[0].content.parts[0].text`, strips `**bold**` markers
/// and falls back to [`EMPTY_REPLY`]
pub fn extract_reply_text(value: &Value) -> String {
    let raw = value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let cleaned = BOLD_MARKUP.replace_all(raw, "$1");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Local server that answers a single request and hands back what it received
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8(request).unwrap()
        });

        (base_url, handle)
    }

    fn client_for(base_url: String) -> GeminiClient {
        let config = Config {
            api_key: Some("K".to_string()),
            base_url,
            ..Config::default()
        };
        GeminiClient::new(&config).unwrap()
    }

    #[test]
    fn test_bold_markers_are_stripped() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"**Hi there**"}]}}]}"#;
        assert_eq!(parse_reply(200, body).unwrap(), "Hi there");
    }

    #[test]
    fn test_inline_bold_keeps_surrounding_text() {
        let text = "  Use **cargo** and **rustc**.\n";
        let value = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        });
        assert_eq!(extract_reply_text(&value), "Use cargo and rustc.");
    }

    #[test]
    fn test_missing_path_falls_back() {
        assert_eq!(parse_reply(200, r#"{"candidates":[]}"#).unwrap(), EMPTY_REPLY);
        assert_eq!(parse_reply(200, "{}").unwrap(), EMPTY_REPLY);
    }

    #[test]
    fn test_api_error_message_is_verbatim() {
        let body = serde_json::json!({
            "error": { "code": 400, "message": "API key not valid. Please pass a valid API key." }
        });
        let err = parse_reply(400, &body.to_string()).unwrap_err();
        assert_eq!(
            err,
            ChatError::Api {
                status: 400,
                message: "API key not valid. Please pass a valid API key.".to_string(),
            }
        );
        assert_eq!(err.to_string(), "API key not valid. Please pass a valid API key.");
    }

    #[test]
    fn test_api_error_without_json_body() {
        let err = parse_reply(503, "<html>unavailable</html>").unwrap_err();
        assert_eq!(err.to_string(), "API request failed with status 503");
    }

    #[test]
    fn test_success_with_garbage_body() {
        let err = parse_reply(200, "not json").unwrap_err();
        assert!(matches!(err, ChatError::InvalidResponse(_)));
    }

    #[test]
    fn test_error_messages_are_distinct() {
        assert_eq!(ChatError::Cancelled.to_string(), "Response generation stopped");
        assert_eq!(
            ChatError::Network("connection refused".into()).to_string(),
            "Network error. Please try again."
        );
        assert!(ChatError::Cancelled.is_cancelled());
        assert!(!ChatError::MissingApiKey.is_cancelled());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_sending() {
        let config = Config {
            api_key: None,
            ..Config::default()
        };
        let client = GeminiClient {
            api_key: None,
            ..GeminiClient::new(&config).unwrap()
        };
        let err = client.generate(vec![Turn::user("Hello", None)]).await.unwrap_err();
        assert_eq!(err, ChatError::MissingApiKey);
    }

    #[tokio::test]
    async fn test_request_line_headers_and_body() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"**Hi there**"}]}}]}"#;
        let (base_url, server) = serve_once("200 OK", body).await;

        let reply = client_for(base_url)
            .generate(vec![Turn::user("Hello", None)])
            .await
            .unwrap();
        assert_eq!(reply, "Hi there");

        let request = server.await.unwrap();
        let (head, sent_body) = request.split_once("\r\n\r\n").unwrap();
        let mut lines = head.lines();
        assert_eq!(
            lines.next(),
            Some("POST /v1beta/models/gemini-2.0-flash:generateContent?key=K HTTP/1.1")
        );
        assert!(lines.any(|line| line.eq_ignore_ascii_case("content-type: application/json")));

        let sent: Value = serde_json::from_str(sent_body).unwrap();
        assert_eq!(
            sent,
            serde_json::json!({ "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }] })
        );
    }

    #[tokio::test]
    async fn test_error_status_carries_api_message() {
        let body = r#"{"error":{"code":400,"message":"bad key"}}"#;
        let (base_url, server) = serve_once("400 Bad Request", body).await;

        let err = client_for(base_url)
            .generate(vec![Turn::user("Hello", None)])
            .await
            .unwrap_err();
        server.await.unwrap();

        assert_eq!(
            err,
            ChatError::Api {
                status: 400,
                message: "bad key".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());
        drop(listener);

        let err = client_for(base_url)
            .generate(vec![Turn::user("Hello", None)])
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Network(_)));
        assert_eq!(err.to_string(), "Network error. Please try again.");
    }
}
