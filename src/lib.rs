//! # Lipsync Stream
//!
//! Jitter-buffered playback of a talking-face stream: one socket carries
//! interleaved encoded video frames and raw PCM16 audio, this crate turns it
//! into evenly paced frames and gapless audio.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                                  SESSION                                     │
//! │                                                                              │
//! │   socket message                                                             │
//! │        │                                                                     │
//! │        ▼                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────────────┐    │
//! │  │            Demultiplexer (protocol::wire)                            │    │
//! │  │   [VIDEO|len|index|width|height|image][AUDIO|len|pcm16le]            │    │
//! │  └─────────────────────────────────────────────────────────────────────┘    │
//! │        │ (VideoFrame, AudioChunk)                                           │
//! │        ▼                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────────────┐    │
//! │  │            Chunk Accumulator (buffer::accumulator)                   │    │
//! │  │   seals a Batch every `minimum_chunk_size` messages                  │    │
//! │  └─────────────────────────────────────────────────────────────────────┘    │
//! │        │ FrameBatch                         │ AudioBatch                     │
//! │        ▼                                    ▼                                │
//! │  ┌─────────────┐                      ┌─────────────┐                        │
//! │  │ Video Queue │                      │ Audio Queue │                        │
//! │  └──────┬──────┘                      └──────┬──────┘                        │
//! │         ▼                                    ▼                               │
//! │  ┌─────────────┐                      ┌─────────────┐     ┌─────────────┐   │
//! │  │   Video     │  every 33 ms         │   Audio     │     │  Silence    │   │
//! │  │ Scheduler   │                      │ Jitter      │     │  Watchdog   │   │
//! │  └──────┬──────┘                      │ Player      │     └──────┬──────┘   │
//! │         │                             └──────┬──────┘            │          │
//! └─────────┼────────────────────────────────────┼───────────────────┼──────────┘
//!           ▼                                    ▼                   ▼
//!      Renderer (host)                    AudioSink (host)     Transport (host)
//! ```

pub mod audio;
pub mod buffer;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod video;

pub use error::{Error, Result};
pub use session::Session;

/// Application-wide constants
pub mod constants {
    /// Fixed audio sample rate of the stream (mono)
    pub const SAMPLE_RATE: u32 = 16_000;

    /// Audio payload size carried by every wire message, in bytes
    pub const AUDIO_PAYLOAD_SIZE: usize = 1068;

    /// Default number of messages sealed into one batch
    pub const DEFAULT_MINIMUM_CHUNK_SIZE: usize = 6;

    /// Default video frame interval in milliseconds (~30 fps)
    pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

    /// Default silence watchdog polling interval in milliseconds
    pub const DEFAULT_WATCHDOG_POLL_MS: u64 = 10;

    /// Default fade length at batch boundaries, in samples
    pub const DEFAULT_FADE_SAMPLES: usize = 50;

    /// Default cap on batches waiting in each playback queue
    pub const DEFAULT_MAX_QUEUED_BATCHES: usize = 32;

    /// Default capacity of the renderer's frame hand-off channel
    pub const DEFAULT_FRAME_QUEUE_CAPACITY: usize = 64;

    /// Default lipsync endpoint
    pub const DEFAULT_STREAM_URL: &str = "ws://127.0.0.1:9000/LipsyncStream";

    /// Shortest session token the server will accept
    pub const MIN_SESSION_TOKEN_LEN: usize = 20;

    /// Inbound message buffer for a websocket link
    pub const INBOUND_QUEUE_CAPACITY: usize = 1024;
}
