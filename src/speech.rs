//! OpenAI text-to-speech client.
//!
//! Synthesizes a reply to an mp3 file under the configured audio directory.
//! Each reply gets a unique file name so concurrent turns never race on the
//! same path.

use std::path::PathBuf;

use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::{OpenAiConfig, TtsConfig};

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("speech API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to write audio file: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SpeechClient {
    api_base: String,
    api_key: Option<String>,
    config: TtsConfig,
    client: Client,
}

impl SpeechClient {
    pub fn new(openai: &OpenAiConfig, config: TtsConfig, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(openai.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_base: openai.api_base.clone(),
            api_key,
            config,
            client,
        }
    }

    /// Synthesize speech for the reply text and write it to a fresh mp3
    /// file under the audio directory. Returns the written path.
    pub async fn synthesize(&self, text: &str) -> Result<PathBuf, SpeechError> {
        let body = json!({
            "model": self.config.model,
            "voice": self.config.voice,
            "input": text,
        });

        let url = format!("{}/audio/speech", self.api_base);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(SpeechError::Status {
                status,
                body: snippet,
            });
        }

        let audio = response.bytes().await?;

        tokio::fs::create_dir_all(&self.config.audio_dir).await?;
        let path = self.config.audio_dir.join(format!("{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&path, &audio).await?;

        debug!("Wrote {} byte(s) of audio to {}", audio.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;

    #[tokio::test]
    async fn writes_unique_mp3_files() {
        let app = Router::new().route("/audio/speech", post(|| async { b"ID3 fake mp3".to_vec() }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let audio_dir = tempfile::tempdir().unwrap();
        let openai = OpenAiConfig {
            api_base: format!("http://{addr}"),
            ..OpenAiConfig::default()
        };
        let tts = TtsConfig {
            audio_dir: audio_dir.path().to_path_buf(),
            ..TtsConfig::default()
        };
        let client = SpeechClient::new(&openai, tts, None);

        let first = client.synthesize("hello").await.unwrap();
        let second = client.synthesize("hello again").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(first.extension().unwrap(), "mp3");
        assert_eq!(std::fs::read(&first).unwrap(), b"ID3 fake mp3");
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let openai = OpenAiConfig {
            api_base: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..OpenAiConfig::default()
        };
        let client = SpeechClient::new(&openai, TtsConfig::default(), None);

        let err = client.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, SpeechError::Http(_)));
    }
}
