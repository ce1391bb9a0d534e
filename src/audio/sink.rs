//! Audio output abstraction
//!
//! The host owns the actual output device. The player only needs a monotonic
//! audio clock and a way to schedule a block of samples at a point on it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::pcm::samples_duration;

/// Scheduled audio output
pub trait AudioSink: Send + Sync {
    /// Current position of the audio clock
    fn now(&self) -> Duration;

    /// Play `samples` (mono, normalized) starting at `start` on the audio clock
    fn schedule_samples(&self, samples: Vec<f32>, sample_rate: u32, start: Duration);
}

/// Sink driven by the wall clock that only accounts for what it is given.
///
/// Used when no output device is attached: playback timing is still tracked
/// so the schedule and the watchdog behave as with real output.
pub struct ClockedSink {
    epoch: Instant,
    scheduled_until: Mutex<Duration>,
    blocks_scheduled: AtomicU64,
    samples_scheduled: AtomicU64,
}

impl ClockedSink {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            scheduled_until: Mutex::new(Duration::ZERO),
            blocks_scheduled: AtomicU64::new(0),
            samples_scheduled: AtomicU64::new(0),
        }
    }

    /// End of the last scheduled block on the audio clock
    pub fn scheduled_until(&self) -> Duration {
        *self.scheduled_until.lock()
    }

    /// Audio still waiting to play
    pub fn buffered(&self) -> Duration {
        self.scheduled_until().saturating_sub(self.now())
    }

    /// Get sink statistics
    pub fn stats(&self) -> SinkStats {
        SinkStats {
            blocks_scheduled: self.blocks_scheduled.load(Ordering::Relaxed),
            samples_scheduled: self.samples_scheduled.load(Ordering::Relaxed),
            buffered_ms: self.buffered().as_secs_f64() * 1000.0,
        }
    }
}

impl Default for ClockedSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for ClockedSink {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn schedule_samples(&self, samples: Vec<f32>, sample_rate: u32, start: Duration) {
        let duration = samples_duration(samples.len(), sample_rate);
        let now = self.now();
        tracing::trace!(
            "start vs current {:.3}s vs {:.3}s, duration {:.3}s",
            start.as_secs_f64(),
            now.as_secs_f64(),
            duration.as_secs_f64()
        );

        let mut until = self.scheduled_until.lock();
        *until = (*until).max(start + duration);
        self.blocks_scheduled.fetch_add(1, Ordering::Relaxed);
        self.samples_scheduled
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
    }
}

/// Sink statistics
#[derive(Debug, Clone)]
pub struct SinkStats {
    pub blocks_scheduled: u64,
    pub samples_scheduled: u64,
    pub buffered_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clocked_sink_tracks_schedule() {
        let sink = ClockedSink::new();
        let start = sink.now() + Duration::from_secs(5);
        sink.schedule_samples(vec![0.0; 16_000], 16_000, start);

        assert_eq!(sink.scheduled_until(), start + Duration::from_secs(1));
        assert!(sink.buffered() > Duration::from_secs(5));

        let stats = sink.stats();
        assert_eq!(stats.blocks_scheduled, 1);
        assert_eq!(stats.samples_scheduled, 16_000);
    }
}
