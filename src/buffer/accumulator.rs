//! Count-gated chunk accumulator
//!
//! Absorbs irregular network delivery by holding demultiplexed messages until
//! `minimum_chunk_size` of them have arrived, then sealing them into one
//! [`Batch`]. There is no timer flush: a partial batch is only ever released
//! by reaching the count, or discarded on stop.

use std::time::{Duration, Instant};

use super::batch::Batch;
use crate::protocol::{AudioChunk, VideoFrame};

/// Accumulates (frame, audio) pairs into fixed-size batches
pub struct ChunkAccumulator {
    minimum_chunk_size: usize,
    pending_frames: Vec<VideoFrame>,
    pending_audio: Vec<AudioChunk>,
    /// Arrival of the first message of the pending batch
    first_push: Option<Instant>,
    next_sequence: u64,
}

impl ChunkAccumulator {
    /// Create an accumulator. `minimum_chunk_size` must be positive.
    pub fn new(minimum_chunk_size: usize) -> Self {
        assert!(minimum_chunk_size > 0, "minimum_chunk_size must be positive");

        Self {
            minimum_chunk_size,
            pending_frames: Vec::with_capacity(minimum_chunk_size),
            pending_audio: Vec::with_capacity(minimum_chunk_size),
            first_push: None,
            next_sequence: 0,
        }
    }

    /// Append one message. Returns the sealed batch when this push completes it.
    pub fn push(&mut self, frame: VideoFrame, audio: AudioChunk) -> Option<Batch> {
        if self.first_push.is_none() {
            self.first_push = Some(Instant::now());
        }
        self.pending_frames.push(frame);
        self.pending_audio.push(audio);

        if self.pending_frames.len() < self.minimum_chunk_size
            || self.pending_audio.len() < self.minimum_chunk_size
        {
            return None;
        }

        let collection_time = self
            .first_push
            .take()
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        let batch = Batch {
            sequence: self.next_sequence,
            frames: std::mem::replace(
                &mut self.pending_frames,
                Vec::with_capacity(self.minimum_chunk_size),
            ),
            audio: std::mem::replace(
                &mut self.pending_audio,
                Vec::with_capacity(self.minimum_chunk_size),
            ),
            collection_time,
        };
        self.next_sequence += 1;

        tracing::debug!(
            "Sealed batch {} ({} messages) after {:.1} ms",
            batch.sequence,
            batch.len(),
            collection_time.as_secs_f64() * 1000.0
        );

        Some(batch)
    }

    /// Drop the partial batch. Returns how many messages were discarded.
    pub fn discard_pending(&mut self) -> usize {
        let discarded = self.pending_frames.len();
        self.pending_frames.clear();
        self.pending_audio.clear();
        self.first_push = None;
        discarded
    }

    /// Messages waiting for the batch to fill
    pub fn pending(&self) -> usize {
        self.pending_frames.len()
    }
}
