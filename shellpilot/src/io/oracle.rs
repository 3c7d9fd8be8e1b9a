//! Text-generation oracle used for planning, code generation, and repair.
//!
//! The [`Oracle`] trait hides the remote service; orchestration only sees
//! prompt in, text out. [`OpenAiOracle`] talks to any OpenAI-compatible
//! chat-completions endpoint with a blocking HTTP client.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::io::config::OracleConfig;

/// Which of the three prompt shapes a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OraclePurpose {
    Plan,
    Generate,
    Repair,
}

impl fmt::Display for OraclePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OraclePurpose::Plan => "plan",
            OraclePurpose::Generate => "generate",
            OraclePurpose::Repair => "repair",
        })
    }
}

/// One completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub purpose: OraclePurpose,
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("missing API credential: environment variable {var} is not set")]
    MissingCredential { var: String },
    #[error("oracle request failed: {0}")]
    Request(String),
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle returned no text")]
    Empty,
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
}

/// Abstraction over text-generation backends.
pub trait Oracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Call the oracle and reject blank answers.
pub fn complete_text<O: Oracle + ?Sized>(
    oracle: &O,
    request: &OracleRequest,
) -> Result<String, OracleError> {
    let text = oracle.complete(request)?;
    if text.trim().is_empty() {
        warn!(purpose = %request.purpose, "oracle returned empty text");
        return Err(OracleError::Empty);
    }
    Ok(text)
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl OpenAiOracle {
    /// Build from config, reading the credential from `config.api_key_env`.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| OracleError::MissingCredential {
                var: config.api_key_env.clone(),
            })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &OracleConfig, api_key: String) -> Result<Self, OracleError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut builder = reqwest::blocking::Client::builder().timeout(timeout);
        // Local model servers are reached directly even when a proxy is configured.
        if is_loopback(&config.base_url) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|err| OracleError::Request(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
        })
    }
}

fn is_loopback(base_url: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(base_url) else {
        return false;
    };
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl Oracle for OpenAiOracle {
    #[instrument(skip_all, fields(purpose = %request.purpose, model = %self.model))]
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": &request.system},
                {"role": "user", "content": &request.prompt}
            ],
            "temperature": self.temperature
        });

        debug!(prompt_bytes = request.prompt.len(), "sending completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "oracle returned error status");
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().map_err(|err| self.transport_error(err))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!(response_bytes = text.len(), "completion received");
        Ok(text)
    }
}

impl OpenAiOracle {
    fn transport_error(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            warn!(timeout_secs = self.timeout.as_secs(), "oracle call timed out");
            OracleError::Timeout(self.timeout)
        } else {
            OracleError::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one HTTP response and hand back the raw request text.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).expect("read");
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}/v1"), handle)
    }

    fn config(base_url: String) -> OracleConfig {
        OracleConfig {
            base_url,
            model: "test-model".to_string(),
            timeout_secs: 10,
            ..OracleConfig::default()
        }
    }

    fn request() -> OracleRequest {
        OracleRequest {
            purpose: OraclePurpose::Plan,
            system: "system".to_string(),
            prompt: "make a folder".to_string(),
        }
    }

    #[test]
    fn missing_credential_fails_fast() {
        let cfg = OracleConfig {
            api_key_env: "SHELLPILOT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..OracleConfig::default()
        };
        let err = OpenAiOracle::from_config(&cfg).err().expect("error");
        assert!(matches!(err, OracleError::MissingCredential { ref var } if var == "SHELLPILOT_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn completion_returns_first_choice_content() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"mkdir demo"}}]}"#,
        );
        let oracle =
            OpenAiOracle::with_api_key(&config(base_url), "sk-test".to_string()).expect("client");

        let text = oracle.complete(&request()).expect("complete");
        assert_eq!(text, "mkdir demo");

        let raw = server.join().expect("server");
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(raw.contains("\"model\":\"test-model\""));
        assert!(raw.contains("make a folder"));
    }

    #[test]
    fn error_status_is_reported_with_body() {
        let (base_url, server) = serve_once("500 Internal Server Error", r#"{"error":"down"}"#);
        let oracle =
            OpenAiOracle::with_api_key(&config(base_url), "sk-test".to_string()).expect("client");

        let err = oracle.complete(&request()).unwrap_err();
        server.join().expect("server");
        match err {
            OracleError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback("http://127.0.0.1:8080/v1"));
        assert!(is_loopback("http://localhost:11434/v1"));
        assert!(!is_loopback("https://api.openai.com/v1"));
        assert!(!is_loopback("not a url"));
    }

    struct Blank;

    impl Oracle for Blank {
        fn complete(&self, _request: &OracleRequest) -> Result<String, OracleError> {
            Ok("  \n".to_string())
        }
    }

    #[test]
    fn blank_answer_is_empty_error() {
        let err = complete_text(&Blank, &request()).unwrap_err();
        assert!(matches!(err, OracleError::Empty));
    }
}
