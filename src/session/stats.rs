//! Session counters

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Counters updated from the feed path and the playback tasks
#[derive(Default)]
pub(crate) struct SessionCounters {
    pub messages_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub malformed_messages: AtomicU64,
    pub batches_sealed: AtomicU64,
    pub batches_dropped: AtomicU64,
    pub frames_presented: AtomicU64,
    pub idle_ticks: AtomicU64,
    pub audio_batches_scheduled: AtomicU64,
    pub alignment_errors: AtomicU64,
    pub audio_messages_sent: AtomicU64,
    pub last_collection_time: Mutex<Option<Duration>>,
    pub last_time_to_first_byte: Mutex<Option<Duration>>,
}

impl SessionCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub malformed_messages: u64,
    pub batches_sealed: u64,
    /// Sealed batches evicted from a full queue, once per batch
    pub batches_dropped: u64,
    pub pending_messages: usize,
    pub video_queue_depth: usize,
    pub audio_queue_depth: usize,
    pub frames_presented: u64,
    pub idle_ticks: u64,
    pub audio_batches_scheduled: u64,
    pub alignment_errors: u64,
    pub audio_messages_sent: u64,
    pub silence_messages_sent: u64,
    /// Time to fill the most recent batch
    pub last_collection_time_ms: Option<f64>,
    /// Delay between the last outbound audio and the next inbound message
    pub last_time_to_first_byte_ms: Option<f64>,
}

pub(crate) struct SnapshotContext {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub pending_messages: usize,
    pub video_queue_depth: usize,
    pub audio_queue_depth: usize,
    pub silence_messages_sent: u64,
}

impl SessionCounters {
    /// Combine the counters with point-in-time state into a snapshot
    pub fn snapshot(&self, ctx: SnapshotContext) -> SessionStats {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        SessionStats {
            session_id: ctx.session_id,
            started_at: ctx.started_at,
            running: ctx.running,
            messages_received: Self::get(&self.messages_received),
            bytes_received: Self::get(&self.bytes_received),
            malformed_messages: Self::get(&self.malformed_messages),
            batches_sealed: Self::get(&self.batches_sealed),
            batches_dropped: Self::get(&self.batches_dropped),
            pending_messages: ctx.pending_messages,
            video_queue_depth: ctx.video_queue_depth,
            audio_queue_depth: ctx.audio_queue_depth,
            frames_presented: Self::get(&self.frames_presented),
            idle_ticks: Self::get(&self.idle_ticks),
            audio_batches_scheduled: Self::get(&self.audio_batches_scheduled),
            alignment_errors: Self::get(&self.alignment_errors),
            audio_messages_sent: Self::get(&self.audio_messages_sent),
            silence_messages_sent: ctx.silence_messages_sent,
            last_collection_time_ms: self.last_collection_time.lock().map(ms),
            last_time_to_first_byte_ms: self.last_time_to_first_byte.lock().map(ms),
        }
    }
}
