//! Silence watchdog
//!
//! The remote encoder only produces frames while it receives audio. When
//! nothing has been heard or played for one batch worth of time, a block of
//! zeroed PCM is sent upstream so the face keeps moving instead of freezing.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::activity::ActivityClock;
use crate::config::StreamConfig;
use crate::transport::Transport;

pub struct SilenceWatchdog {
    activity: ActivityClock,
    threshold: Duration,
    silence: Bytes,
    silence_sent: Arc<AtomicU64>,
}

impl SilenceWatchdog {
    /// Create a watchdog watching `activity`, with threshold and silence size from `config`
    pub fn new(activity: ActivityClock, config: &StreamConfig) -> Self {
        Self {
            activity,
            threshold: config.silence_threshold(),
            silence: Bytes::from(vec![0u8; config.silence_len()]),
            silence_sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check for inactivity at `now`. Returns the silence message to send,
    /// and counts it as activity.
    pub fn poll(&self, now: Instant) -> Option<Bytes> {
        let idle = now.saturating_duration_since(self.activity.last());
        if idle <= self.threshold {
            return None;
        }

        self.activity.touch_at(now);
        self.silence_sent.fetch_add(1, Ordering::Relaxed);
        Some(self.silence.clone())
    }

    /// Idle time after which silence is sent
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Silence messages sent so far
    pub fn silence_sent(&self) -> u64 {
        self.silence_sent.load(Ordering::Relaxed)
    }

    /// Shared counter of silence messages sent
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.silence_sent.clone()
    }

    /// Poll every `poll_interval` until `running` is cleared, sending silence
    /// through `transport` when due.
    pub async fn run(
        self,
        transport: Arc<dyn Transport>,
        poll_interval: Duration,
        running: Arc<AtomicBool>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while running.load(Ordering::Relaxed) {
            let now = ticker.tick().await;
            if let Some(silence) = self.poll(now) {
                tracing::debug!("Sending silence ({} bytes)", silence.len());
                if let Err(e) = transport.send(silence) {
                    tracing::warn!("Failed to send silence: {}", e);
                }
            }
        }
    }
}
