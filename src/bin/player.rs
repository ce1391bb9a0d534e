//! Lipsync Stream Player
//!
//! Connects to a lipsync server and plays the returned face stream. The voice
//! sent upstream is either a raw PCM16 (16 kHz mono) file or, when
//! `connection.audio_source_url` is set, a relayed websocket audio broadcast.
//!
//! Usage: `player [ws-url] [session-token] [pcm-file]`

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lipsync_stream::{
    audio::ClockedSink,
    config::AppConfig,
    constants::*,
    transport::websocket,
    video::FrameWriter,
    Session,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lipsync Stream Player");

    let mut config = AppConfig::load_or_default()?;
    let mut args = std::env::args().skip(1);
    if let Some(url) = args.next() {
        config.connection.url = url;
    }
    if let Some(token) = args.next() {
        config.connection.session_token = Some(token);
    }
    let pcm_path = args.next();

    let token = config
        .connection
        .session_token
        .clone()
        .context("No session token given (argument 2 or connection.session_token)")?;

    let mut link =
        websocket::connect(&config.connection.url, &token, INBOUND_QUEUE_CAPACITY).await?;

    let renderer = FrameWriter::new(
        config.output.frame_dir.clone(),
        config.output.frame_queue_capacity,
    )?;
    if let Some(dir) = &config.output.frame_dir {
        tracing::info!("Writing frames to {}", dir.display());
    }
    let sink = Arc::new(ClockedSink::new());

    let session = Arc::new(Session::start(
        &config,
        Box::new(renderer),
        sink.clone(),
        link.transport.clone(),
    )?);

    // Voice comes from a local file if given, otherwise from the audio source
    let voice_task = match (pcm_path, config.connection.audio_source_url.clone()) {
        (Some(path), _) => {
            let pcm = std::fs::read(&path).with_context(|| format!("Failed to read {}", path))?;
            tracing::info!("Streaming {} ({} bytes) as voice", path, pcm.len());
            let session = session.clone();
            let interval = config.stream.frame_interval();
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                for chunk in pcm.chunks(AUDIO_PAYLOAD_SIZE) {
                    ticker.tick().await;
                    if let Err(e) = session.send_audio(chunk.to_vec()) {
                        tracing::warn!("Failed to send voice audio: {}", e);
                        break;
                    }
                }
                tracing::info!("Voice file finished");
            }))
        }
        (None, Some(url)) => {
            let mut source = websocket::open_audio_source(&url, INBOUND_QUEUE_CAPACITY).await?;
            let session = session.clone();
            Some(tokio::spawn(async move {
                while let Some(pcm) = source.inbound.recv().await {
                    if let Err(e) = session.send_audio(pcm) {
                        tracing::warn!("Failed to relay voice audio: {}", e);
                        break;
                    }
                }
                tracing::info!("Audio source finished");
            }))
        }
        (None, None) => None,
    };

    let mut stats_ticker = tokio::time::interval(Duration::from_secs(5));
    stats_ticker.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!("Session {} running - press Ctrl+C to stop", session.id());

    loop {
        tokio::select! {
            message = link.inbound.recv() => match message {
                Some(message) => {
                    // Errors are logged and counted by the session
                    let _ = session.feed(message);
                }
                None => {
                    tracing::info!("Server stream ended");
                    break;
                }
            },
            _ = stats_ticker.tick() => {
                let stats = session.stats();
                let sink_stats = sink.stats();
                let sent = link.transport.stats();
                tracing::info!(
                    "Stats: {} messages ({} malformed), {} batches ({} dropped), {} frames shown, {} audio blocks, {:.0} ms audio buffered, {} silence sent, {:.1} KB upstream",
                    stats.messages_received,
                    stats.malformed_messages,
                    stats.batches_sealed,
                    stats.batches_dropped,
                    stats.frames_presented,
                    sink_stats.blocks_scheduled,
                    sink_stats.buffered_ms,
                    stats.silence_messages_sent,
                    sent.bytes_sent as f64 / 1024.0
                );
                if let Ok(json) = serde_json::to_string(&stats) {
                    tracing::debug!("Session stats: {}", json);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    if let Some(task) = voice_task {
        task.abort();
    }
    session.stop();
    link.shutdown().await;

    Ok(())
}
