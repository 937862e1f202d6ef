use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: 0.0,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

impl OracleRequest {
    pub fn new(config: &OracleConfig, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            messages,
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("{env} environment variable not set")]
    MissingCredentials { env: &'static str },

    #[error("oracle request failed: {message}")]
    Transport { message: String },

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle response parse error: {message}")]
    ResponseParse { message: String },

    #[error("oracle returned an empty completion")]
    EmptyCompletion,
}

/// A completion service that answers one prompt with free text.
pub trait Oracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiOracle {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiOracle {
    pub fn from_env(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = env::var(API_KEY_ENV)
            .map_err(|_| OracleError::MissingCredentials { env: API_KEY_ENV })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &OracleConfig, api_key: String) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| OracleError::Transport {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Oracle for OpenAiOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = self.endpoint();
        let body = request_body(request);
        debug!(url = %url, model = %request.model, messages = request.messages.len(), "sending oracle request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| OracleError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        let text = response.text().map_err(|err| OracleError::Transport {
            message: format!("failed to read response body: {err}"),
        })?;
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value =
            serde_json::from_str(&text).map_err(|err| OracleError::ResponseParse {
                message: format!("invalid JSON: {err}"),
            })?;
        parse_completion(&payload)
    }
}

pub fn request_body(request: &OracleRequest) -> Value {
    json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
    })
}

pub fn parse_completion(payload: &Value) -> Result<String, OracleError> {
    let content = payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| OracleError::ResponseParse {
            message: "missing choices[0].message.content".to_string(),
        })?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(OracleError::EmptyCompletion);
    }
    Ok(trimmed.to_string())
}
