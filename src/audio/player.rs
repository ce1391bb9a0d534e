//! Gapless batch audio player
//!
//! Each audio batch becomes one block of samples scheduled back-to-back on the
//! sink's clock: a block starts when the previous one ends, or now if the
//! sink has already caught up.

use std::sync::Arc;
use std::time::Duration;

use super::pcm::{apply_fade, concat_chunks, pcm16le_to_f32, samples_duration};
use super::sink::AudioSink;
use crate::buffer::AudioBatch;
use crate::config::StreamConfig;
use crate::error::AudioError;

/// A block handed to the sink
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBlock {
    pub sequence: u64,
    pub start: Duration,
    pub duration: Duration,
    pub sample_count: usize,
}

/// Converts audio batches and schedules them on an [`AudioSink`]
pub struct AudioJitterPlayer {
    sink: Arc<dyn AudioSink>,
    sample_rate: u32,
    fade_samples: usize,
    volume: f32,
    /// End of the last scheduled block
    scheduled_end: Duration,
    blocks_scheduled: u64,
    samples_scheduled: u64,
    alignment_errors: u64,
}

impl AudioJitterPlayer {
    /// Create a player scheduling into `sink` with the gain and fade length from `config`
    pub fn new(sink: Arc<dyn AudioSink>, config: &StreamConfig) -> Self {
        Self {
            sink,
            sample_rate: config.sample_rate,
            fade_samples: config.fade_samples,
            volume: config.volume,
            scheduled_end: Duration::ZERO,
            blocks_scheduled: 0,
            samples_scheduled: 0,
            alignment_errors: 0,
        }
    }

    /// Convert one batch and schedule it. A batch with an odd byte count is
    /// rejected whole and nothing is scheduled.
    pub fn play(&mut self, batch: &AudioBatch) -> Result<ScheduledBlock, AudioError> {
        let pcm = concat_chunks(&batch.chunks);
        let mut samples = match pcm16le_to_f32(&pcm, self.volume) {
            Ok(samples) => samples,
            Err(e) => {
                self.alignment_errors += 1;
                return Err(e);
            }
        };
        apply_fade(&mut samples, self.fade_samples);

        let sample_count = samples.len();
        let duration = samples_duration(sample_count, self.sample_rate);
        let start = self.sink.now().max(self.scheduled_end);
        self.scheduled_end = start + duration;

        self.sink.schedule_samples(samples, self.sample_rate, start);
        self.blocks_scheduled += 1;
        self.samples_scheduled += sample_count as u64;

        tracing::debug!(
            "Scheduled audio batch {}: {} samples at {:.3}s for {:.3}s",
            batch.sequence,
            sample_count,
            start.as_secs_f64(),
            duration.as_secs_f64()
        );

        Ok(ScheduledBlock {
            sequence: batch.sequence,
            start,
            duration,
            sample_count,
        })
    }

    /// End of the last scheduled block on the sink clock
    pub fn scheduled_end(&self) -> Duration {
        self.scheduled_end
    }

    /// Get player statistics
    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            blocks_scheduled: self.blocks_scheduled,
            samples_scheduled: self.samples_scheduled,
            alignment_errors: self.alignment_errors,
        }
    }
}

/// Player statistics
#[derive(Debug, Clone, Default)]
pub struct PlayerStats {
    pub blocks_scheduled: u64,
    pub samples_scheduled: u64,
    pub alignment_errors: u64,
}
