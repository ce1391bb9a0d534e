//! Sealed batches of frames and audio

use std::time::Duration;

use crate::protocol::{AudioChunk, VideoFrame};

/// A sealed group of messages released together by the accumulator
#[derive(Debug, Clone)]
pub struct Batch {
    /// Monotonic batch number, starting at 0
    pub sequence: u64,
    pub frames: Vec<VideoFrame>,
    pub audio: Vec<AudioChunk>,
    /// Time between the first pushed message and sealing
    pub collection_time: Duration,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into the video and audio halves, which are consumed by
    /// different loops at different rates.
    pub fn split(self) -> (FrameBatch, AudioBatch) {
        (
            FrameBatch {
                sequence: self.sequence,
                frames: self.frames,
            },
            AudioBatch {
                sequence: self.sequence,
                chunks: self.audio,
            },
        )
    }
}

/// Video half of a batch
#[derive(Debug, Clone)]
pub struct FrameBatch {
    pub sequence: u64,
    pub frames: Vec<VideoFrame>,
}

impl FrameBatch {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Audio half of a batch
#[derive(Debug, Clone)]
pub struct AudioBatch {
    pub sequence: u64,
    pub chunks: Vec<AudioChunk>,
}

/// Anything that can sit in a playback queue
pub trait Sequenced {
    fn sequence(&self) -> u64;
}

impl Sequenced for FrameBatch {
    fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Sequenced for AudioBatch {
    fn sequence(&self) -> u64 {
        self.sequence
    }
}
