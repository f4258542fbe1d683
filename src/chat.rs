//! OpenAI chat-completions client.
//!
//! One synchronous request over the full transcript per turn; no streaming,
//! no retries. Failures come back as typed errors so the turn handler can
//! surface them to the user.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::transcript::ChatMessage;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("chat API returned an empty reply")]
    EmptyReply,
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

pub struct ChatClient {
    config: OpenAiConfig,
    api_key: Option<String>,
    client: Client,
}

impl ChatClient {
    pub fn new(config: OpenAiConfig, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            api_key,
            client,
        }
    }

    /// Request one completion over the full transcript.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        debug!(
            "Requesting completion from '{}' over {} message(s)",
            self.config.chat_model,
            messages.len()
        );

        let body = json!({
            "model": self.config.chat_model,
            "messages": messages,
        });

        let url = format!("{}/chat/completions", self.config.api_base);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ChatError::Status {
                status,
                body: snippet,
            });
        }

        let data: ChatResponse = response.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ChatError::EmptyReply)
    }
}
