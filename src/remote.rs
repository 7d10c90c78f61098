use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config;
use crate::error::GenerationError;
use crate::model::Backend;

const OPENAI_API_BASE: &str = "https://api.openai.com/";
const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";

#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Request parameters that stay fixed across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&config::Remote> for ChatSettings {
    fn from(remote: &config::Remote) -> Self {
        Self {
            model: remote.model.clone(),
            system_prompt: remote.system_prompt.clone(),
            temperature: remote.temperature,
            max_tokens: remote.max_tokens,
            timeout: remote.timeout(),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
    settings: ChatSettings,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.settings.model)
            .field("has_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, settings: ChatSettings) -> Self {
        let base_url = Url::parse(OPENAI_API_BASE).expect("valid default OpenAI URL");
        Self::with_base_url(api_key, settings, base_url)
    }

    /// `base_url` may carry a path prefix (`https://gw.example/openai`); the
    /// endpoint is resolved beneath it.
    pub fn with_base_url(
        api_key: Option<String>,
        settings: ChatSettings,
        mut base_url: Url,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(concat!("blogsmith/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            settings,
        }
    }

    /// Build from config; `api_key` (from `--api-key`) wins over the
    /// configured environment variable.
    pub fn from_config(
        remote: &config::Remote,
        api_key: Option<String>,
    ) -> Result<Self, GenerationError> {
        let base_url = Url::parse(&remote.base_url)
            .map_err(|e| GenerationError::api(None, format!("invalid base URL: {e}")))?;
        let key = api_key.or_else(|| remote.key_from_env());
        Ok(Self::with_base_url(key, remote.into(), base_url))
    }

    pub fn build_request(&self, prompt: &str) -> Result<reqwest::Request, GenerationError> {
        let key = self.api_key.as_deref().ok_or(GenerationError::MissingCredential)?;
        let endpoint = self
            .base_url
            .join(CHAT_COMPLETIONS_PATH)
            .map_err(|e| GenerationError::api(None, format!("invalid base URL: {e}")))?;
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.settings.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&body)
            .build()
            .map_err(|e| GenerationError::api(None, format!("failed to build request: {e}")))
    }

    async fn execute(&self, request: reqwest::Request) -> Result<String, GenerationError> {
        let res = self.http.execute(request).await.map_err(|e| self.transport_error(e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            warn!(%status, body = %body, "remote API returned an error");
            return Err(GenerationError::api(
                Some(status.as_u16()),
                format!("request failed with {status}"),
            ));
        }

        parse_completion(&body)
    }

    fn transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout {
                backend: Backend::Remote,
                after: self.settings.timeout,
            }
        } else {
            GenerationError::api(
                err.status().map(|s| s.as_u16()),
                format!("failed to reach remote API: {err}"),
            )
        }
    }
}

#[async_trait]
impl RemoteApi for OpenAiClient {
    async fn run(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = self.build_request(prompt)?;
        debug!(
            url = %request.url(),
            model = %self.settings.model,
            "sending chat completion request"
        );
        let deadline = self.settings.timeout;
        let text = match tokio::time::timeout(deadline, self.execute(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GenerationError::Timeout {
                    backend: Backend::Remote,
                    after: deadline,
                })
            }
        };
        info!(
            model = %self.settings.model,
            words = text.split_whitespace().count(),
            "remote generation finished"
        );
        Ok(text)
    }
}

/// Extract the first choice's message content.
pub fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let payload: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::api(None, format!("malformed response body: {e}")))?;
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| GenerationError::api(None, "response contained no completion"))
}
