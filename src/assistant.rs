//! Turn handling: normalize the upload, call the chat API, optionally
//! synthesize speech.
//!
//! Each turn is a linear pipeline over the session transcript. Every stage
//! degrades on its own: a bad upload is skipped with a warning, a chat
//! failure becomes an "Error: ..." reply, a speech failure just drops the
//! audio. Nothing is retried and nothing aborts the service.

use std::path::Path;

use tracing::warn;

use crate::chat::ChatClient;
use crate::config::DocumentConfig;
use crate::document;
use crate::speech::SpeechClient;
use crate::transcript::Transcript;

pub struct TurnOutcome {
    pub reply: String,
    pub audio: Option<std::path::PathBuf>,
}

pub struct Assistant {
    chat: ChatClient,
    speech: SpeechClient,
    document: DocumentConfig,
}

impl Assistant {
    pub fn new(chat: ChatClient, speech: SpeechClient, document: DocumentConfig) -> Self {
        Self {
            chat,
            speech,
            document,
        }
    }

    /// Run one conversation turn.
    ///
    /// Appends the user message(s) to the transcript, requests a completion
    /// over the whole history, and appends the reply. On chat failure the
    /// reply text carries the `Error:` prefix and the transcript gains no
    /// assistant message. Any scratch files from the upload are gone by the
    /// time this returns, success or failure.
    pub async fn respond(
        &self,
        transcript: &mut Transcript,
        user_text: &str,
        upload: Option<&Path>,
        speech_enabled: bool,
    ) -> TurnOutcome {
        match upload {
            Some(path) => self.attach_upload(transcript, user_text, path).await,
            None => transcript.push_user_text(user_text),
        }

        let reply = match self.chat.complete(transcript.messages()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat completion failed: {e}");
                return TurnOutcome {
                    reply: format!("Error: {e}"),
                    audio: None,
                };
            }
        };
        transcript.push_assistant(&reply);

        let audio = if speech_enabled {
            match self.speech.synthesize(&reply).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Speech synthesis failed: {e}");
                    None
                }
            }
        } else {
            None
        };

        TurnOutcome { reply, audio }
    }

    /// Create the per-turn scratch directory, under the configured scratch
    /// root when one is set.
    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        match &self.document.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::tempdir_in(root)
            }
            None => tempfile::tempdir(),
        }
    }

    /// Normalize the upload and append one multimodal user message per page
    /// image. Pages that fail to encode are skipped; if nothing survives the
    /// turn falls back to a plain text message so the chat call still runs.
    /// The scratch directory lives only for this call.
    async fn attach_upload(&self, transcript: &mut Transcript, user_text: &str, path: &Path) {
        let scratch = match self.scratch_dir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Failed to create scratch directory: {e}");
                transcript.push_user_text(user_text);
                return;
            }
        };

        let pages = match document::normalize(path, scratch.path(), &self.document).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("Skipping upload {}: {e}", path.display());
                Vec::new()
            }
        };

        let mut attached = 0usize;
        for page in &pages {
            match document::encode_image(page) {
                Ok(encoded) => {
                    transcript.push_user_with_image(user_text, &document::data_url(&encoded));
                    attached += 1;
                }
                Err(e) => warn!("Skipping page {}: {e}", page.display()),
            }
        }

        if attached == 0 {
            transcript.push_user_text(user_text);
        }
        // scratch drops here; rasterized pages are never reachable again
    }
}
