//! Chat-completion text generation (Groq, OpenAI-compatible API).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use bizproposal_shared::{GenerationConfig, ProposalError, Result, api_key};

use crate::TextGenerator;
use crate::http::{build_client, snippet, transport_error};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generates text with a single user message per prompt.
pub struct GroqGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    timeout_secs: u64,
}

impl GroqGenerator {
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.as_str().trim_end_matches('/')
            ),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build from config, reading the key from the configured env var.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let key = api_key(&config.api_key_env, "Text generation")?;
        Self::new(config, key)
    }
}

#[async_trait]
impl TextGenerator for GroqGenerator {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("generation request", self.timeout_secs, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| format!(", retry after {v}s"))
                .unwrap_or_default();
            return Err(ProposalError::Generator(format!(
                "rate limited by generation service{retry_after}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error("generation response", self.timeout_secs, e))?;

        if !status.is_success() {
            return Err(ProposalError::Generator(format!(
                "generation service returned HTTP {status}: {}",
                snippet(&body)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ProposalError::Generator(format!("malformed generation response: {e}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProposalError::Generator(format!(
                    "generation response has no message content (got: {})",
                    snippet(&body)
                ))
            })?;

        debug!(chars = content.len(), "generation complete");
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
