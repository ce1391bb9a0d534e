//! Error types for the lipsync stream pipeline

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire format errors. Every variant means the message was malformed and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {len} bytes, header needs {needed}")]
    Truncated { needed: usize, len: usize },

    #[error("Malformed message: {field} ends at byte {end}, message is {len} bytes")]
    LengthOutOfBounds {
        field: &'static str,
        end: usize,
        len: usize,
    },

    #[error("Malformed message: video length {0} shorter than frame header")]
    VideoLengthTooShort(u32),

    #[error("Malformed message: invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Playback queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Queue overflow: capacity {capacity}, dropped batch {dropped_sequence}")]
    Overflow {
        capacity: usize,
        dropped_sequence: u64,
    },
}

/// Audio conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Invalid sample alignment: {0} bytes is not a whole number of 16-bit samples")]
    InvalidSampleAlignment(usize),
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport closed")]
    Closed,

    #[error("Invalid session token: {len} characters, need at least {min}")]
    InvalidSessionToken { len: usize, min: usize },
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
