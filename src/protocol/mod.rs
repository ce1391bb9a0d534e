//! Stream message types and wire format
//!
//! Every message from the lipsync server carries exactly one encoded video
//! frame followed by one fixed-size block of PCM16 audio.

pub mod wire;

pub use wire::{demux, encode};

use bytes::Bytes;

use crate::constants::AUDIO_PAYLOAD_SIZE;

/// One encoded video frame. The image bytes are opaque (JPEG in practice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Frame index as sent by the server. Informational only; arrival order wins.
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub encoded_image: Bytes,
}

impl VideoFrame {
    pub fn new(index: u32, width: u32, height: u32, encoded_image: Bytes) -> Self {
        Self {
            index,
            width,
            height,
            encoded_image,
        }
    }
}

/// One message worth of mono PCM16 little-endian audio, always
/// `AUDIO_PAYLOAD_SIZE` bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pcm: Bytes,
}

impl AudioChunk {
    /// Build a chunk from a raw payload, zero-padding or truncating it to
    /// the fixed per-message size.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut pcm = vec![0u8; AUDIO_PAYLOAD_SIZE];
        let n = payload.len().min(AUDIO_PAYLOAD_SIZE);
        pcm[..n].copy_from_slice(&payload[..n]);
        Self { pcm: Bytes::from(pcm) }
    }

    /// Wrap bytes as-is, skipping the fixed-size normalization
    #[cfg(test)]
    pub(crate) fn from_raw(pcm: Bytes) -> Self {
        Self { pcm }
    }

    /// Raw PCM16 little-endian bytes
    pub fn pcm(&self) -> &Bytes {
        &self.pcm
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Number of 16-bit samples in the chunk
    pub fn sample_count(&self) -> usize {
        self.pcm.len() / 2
    }
}
