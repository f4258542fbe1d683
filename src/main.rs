//! health-assistant-rs: virtual health assistant web service.

mod assistant;
mod chat;
mod config;
mod document;
mod flags;
mod speech;
mod transcript;
mod web;

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "health-assistant-rs", about = "Virtual health assistant web service")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the web UI (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen on all interfaces instead of loopback
    #[arg(long)]
    share: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("health-assistant-rs starting");

    // Load config, with CLI overrides
    let mut config = config::Config::load(args.config.as_deref());
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.share {
        config.server.share = true;
    }

    let api_key = config.api_key();
    if api_key.is_none() {
        warn!("No API key configured (OPENAI_API_KEY unset) — chat requests will fail");
    }

    let chat = chat::ChatClient::new(config.openai.clone(), api_key.clone());
    let speech = speech::SpeechClient::new(&config.openai, config.tts.clone(), api_key);
    let assistant = assistant::Assistant::new(chat, speech, config.document.clone());
    let flag_store = flags::FlagStore::new(flags::FlagStore::default_dir());

    info!(
        "Assistant ready (chat model: {}, voice: {})",
        config.openai.chat_model, config.tts.voice
    );

    let state = web::AppState::new(assistant, &config, flag_store);
    web::serve(state, &config.server).await?;

    Ok(())
}
