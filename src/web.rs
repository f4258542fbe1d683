//! HTTP surface for the assistant.
//!
//! Serves the chat page, the multipart chat endpoint, generated reply audio,
//! and the feedback flag endpoint. Transcripts are kept in a per-session
//! store so concurrent sessions never share state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::assistant::Assistant;
use crate::config::{Config, ServerConfig};
use crate::flags::{self, FlagRecord, FlagStore};
use crate::transcript::Transcript;

const PAGE: &str = include_str!("index.html");

/// Uploads are reply-sized documents, not bulk data.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

type SessionMap = HashMap<String, Arc<tokio::sync::Mutex<Transcript>>>;

#[derive(Clone)]
pub struct AppState {
    assistant: Arc<Assistant>,
    sessions: Arc<Mutex<SessionMap>>,
    system_prompt: String,
    audio_dir: PathBuf,
    flags: Arc<FlagStore>,
}

impl AppState {
    pub fn new(assistant: Assistant, config: &Config, flags: FlagStore) -> Self {
        Self {
            assistant: Arc::new(assistant),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            system_prompt: config.openai.system_prompt.clone(),
            audio_dir: config.tts.audio_dir.clone(),
            flags: Arc::new(flags),
        }
    }

    /// Fetch the transcript for a session id, creating a fresh one (seeded
    /// with the system message) for ids we have not seen.
    fn session(&self, session_id: &str) -> Arc<tokio::sync::Mutex<Transcript>> {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(Transcript::new(&self.system_prompt)))
            })
            .clone()
    }
}

// --- Request/Response types ---

#[derive(Serialize)]
struct TurnResponse {
    reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<String>,
}

#[derive(Deserialize)]
struct FlagRequest {
    session_id: String,
    category: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    reply: String,
}

#[derive(Serialize)]
struct SimpleResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Self {
        Self {
            status: status.into(),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            error: Some(message.into()),
        }
    }
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/chat", post(handle_chat))
        .route("/api/flag", post(handle_flag))
        .route("/audio/{name}", get(handle_audio))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(state: AppState, server: &ServerConfig) -> std::io::Result<()> {
    let host = if server.share {
        "0.0.0.0"
    } else {
        server.host.as_str()
    };
    let addr = format!("{host}:{}", server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if server.share {
        info!("Sharing enabled — listening on all interfaces at port {}", server.port);
    }
    info!("Web UI available on http://{addr}");

    axum::serve(listener, router(state)).await
}

// --- Handlers ---

async fn handle_index() -> Html<String> {
    let session_id = Uuid::new_v4().to_string();
    Html(PAGE.replace("{session_id}", &session_id))
}

async fn handle_chat(State(state): State<AppState>, multipart: Multipart) -> Json<TurnResponse> {
    let form = match ChatForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => {
            warn!("Malformed chat form: {e}");
            return Json(TurnResponse {
                reply: format!("Error: {e}"),
                audio_url: None,
            });
        }
    };

    // Spool the upload next to nothing else; the dir lives for this request.
    let (upload_dir, upload_path) = match form.spool_upload() {
        Ok(spooled) => spooled,
        Err(e) => {
            warn!("Failed to spool upload: {e}");
            return Json(TurnResponse {
                reply: format!("Error: {e}"),
                audio_url: None,
            });
        }
    };

    info!(
        "Turn for session {} ({} chars, file: {}, speech: {})",
        form.session_id,
        form.message.len(),
        upload_path.is_some(),
        form.speech,
    );

    let session = state.session(&form.session_id);
    let mut transcript = session.lock().await;
    let outcome = state
        .assistant
        .respond(
            &mut transcript,
            &form.message,
            upload_path.as_deref(),
            form.speech,
        )
        .await;
    drop(transcript);
    drop(upload_dir);

    let audio_url = outcome.audio.as_ref().and_then(|path| {
        path.file_name()
            .map(|name| format!("/audio/{}", name.to_string_lossy()))
    });

    Json(TurnResponse {
        reply: outcome.reply,
        audio_url,
    })
}

async fn handle_audio(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, StatusCode> {
    if !is_valid_audio_name(&name) {
        return Err(StatusCode::NOT_FOUND);
    }

    let path = state.audio_dir.join(&name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response())
}

async fn handle_flag(
    State(state): State<AppState>,
    Json(req): Json<FlagRequest>,
) -> Json<SimpleResponse> {
    if !flags::is_valid_category(&req.category) {
        return Json(SimpleResponse::err(format!(
            "Unknown flag category: {}",
            req.category
        )));
    }

    info!("Flagged reply in session {}: {}", req.session_id, req.category);
    state.flags.save(&FlagRecord {
        timestamp: flags::now_timestamp(),
        session_id: req.session_id,
        category: req.category,
        message: req.message,
        reply: req.reply,
    });

    Json(SimpleResponse::ok("flagged"))
}

// --- Form parsing ---

struct ChatForm {
    session_id: String,
    message: String,
    speech: bool,
    file_name: Option<String>,
    file_bytes: Vec<u8>,
}

impl ChatForm {
    async fn read(mut multipart: Multipart) -> Result<Self, String> {
        let mut form = Self {
            session_id: String::new(),
            message: String::new(),
            speech: false,
            file_name: None,
            file_bytes: Vec::new(),
        };

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| format!("invalid form data: {e}"))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "session_id" => {
                    form.session_id = field.text().await.map_err(|e| e.to_string())?;
                }
                "message" => {
                    form.message = field.text().await.map_err(|e| e.to_string())?;
                }
                "speech" => {
                    let value = field.text().await.map_err(|e| e.to_string())?;
                    form.speech = value == "true" || value == "on" || value == "1";
                }
                "file" => {
                    // Strip any client-supplied directory components.
                    form.file_name = field
                        .file_name()
                        .and_then(|n| std::path::Path::new(n).file_name())
                        .map(|n| n.to_string_lossy().to_string())
                        .filter(|n| !n.is_empty());
                    form.file_bytes = field.bytes().await.map_err(|e| e.to_string())?.to_vec();
                }
                other => {
                    warn!("Ignoring unknown form field '{other}'");
                }
            }
        }

        if form.session_id.is_empty() {
            return Err("missing session_id".into());
        }
        Ok(form)
    }

    /// Write the upload to a per-request temp dir, keeping its file name so
    /// the extension survives for normalization. Returns (dir guard, path).
    fn spool_upload(&self) -> std::io::Result<(Option<tempfile::TempDir>, Option<PathBuf>)> {
        let Some(name) = &self.file_name else {
            return Ok((None, None));
        };
        if self.file_bytes.is_empty() {
            return Ok((None, None));
        }

        let dir = tempfile::tempdir()?;
        let path = dir.path().join(name);
        std::fs::write(&path, &self.file_bytes)?;
        Ok((Some(dir), Some(path)))
    }
}

/// Reply audio names are always `{uuid}.mp3`; anything else is rejected so
/// the endpoint can never serve arbitrary paths.
fn is_valid_audio_name(name: &str) -> bool {
    name.strip_suffix(".mp3")
        .map(|stem| Uuid::parse_str(stem).is_ok())
        .unwrap_or(false)
}
