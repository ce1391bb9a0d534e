//! Playback session
//!
//! Owns the whole pipeline for one connection. Inbound messages are handled
//! synchronously in [`Session::feed`]; presentation, audio scheduling and the
//! silence watchdog each run as their own tokio task until [`Session::stop`].

pub mod activity;
pub mod stats;
pub mod watchdog;

pub use activity::ActivityClock;
pub use stats::SessionStats;
pub use watchdog::SilenceWatchdog;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::audio::{AudioJitterPlayer, AudioSink};
use crate::buffer::{
    create_shared_queue, AudioBatch, Batch, ChunkAccumulator, FrameBatch, SharedBatchQueue,
};
use crate::config::{AppConfig, StreamConfig};
use crate::error::{Error, Result};
use crate::protocol::demux;
use crate::transport::Transport;
use crate::video::{Renderer, TickOutcome, VideoScheduler};
use stats::{SessionCounters, SnapshotContext};

/// A running playback session
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: StreamConfig,
    running: Arc<AtomicBool>,
    accumulator: Mutex<ChunkAccumulator>,
    video_queue: SharedBatchQueue<FrameBatch>,
    audio_queue: SharedBatchQueue<AudioBatch>,
    audio_ready: Arc<Notify>,
    activity: ActivityClock,
    counters: Arc<SessionCounters>,
    silence_sent: Arc<AtomicU64>,
    transport: Arc<dyn Transport>,
    last_outbound: Mutex<Option<Instant>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Validate `config` and start the playback tasks on the current tokio runtime
    pub fn start(
        config: &AppConfig,
        renderer: Box<dyn Renderer>,
        sink: Arc<dyn AudioSink>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::Config("session must be started inside a tokio runtime".into()))?;

        let stream = config.stream.clone();
        let activity = ActivityClock::new();
        let watchdog = config
            .watchdog
            .enabled
            .then(|| SilenceWatchdog::new(activity.clone(), &stream));

        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config: stream.clone(),
            running: Arc::new(AtomicBool::new(true)),
            accumulator: Mutex::new(ChunkAccumulator::new(stream.minimum_chunk_size)),
            video_queue: create_shared_queue(stream.max_queued_batches),
            audio_queue: create_shared_queue(stream.max_queued_batches),
            audio_ready: Arc::new(Notify::new()),
            activity,
            counters: Arc::new(SessionCounters::default()),
            silence_sent: watchdog
                .as_ref()
                .map(SilenceWatchdog::counter)
                .unwrap_or_default(),
            transport,
            last_outbound: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        };

        {
            let mut tasks = session.tasks.lock();
            tasks.push(runtime.spawn(session.video_loop(renderer)));
            tasks.push(runtime.spawn(session.audio_loop(sink)));
            if let Some(watchdog) = watchdog {
                tasks.push(runtime.spawn(watchdog.run(
                    session.transport.clone(),
                    config.watchdog.poll_interval(),
                    session.running.clone(),
                )));
            }
        }

        tracing::info!(
            "Session {} started: chunk size {}, frame interval {} ms, silence after {} ms",
            session.id,
            stream.minimum_chunk_size,
            stream.frame_interval_ms,
            stream.silence_threshold().as_millis()
        );
        Ok(session)
    }

    fn video_loop(&self, renderer: Box<dyn Renderer>) -> impl std::future::Future<Output = ()> {
        let mut scheduler = VideoScheduler::new(renderer, self.video_queue.clone());
        let frame_interval = self.config.frame_interval();
        let running = self.running.clone();
        let counters = self.counters.clone();

        async move {
            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                match scheduler.tick() {
                    TickOutcome::Presented { .. } => {
                        SessionCounters::incr(&counters.frames_presented)
                    }
                    TickOutcome::Idle => SessionCounters::incr(&counters.idle_ticks),
                }
            }
            tracing::debug!("Video loop finished");
        }
    }

    fn audio_loop(&self, sink: Arc<dyn AudioSink>) -> impl std::future::Future<Output = ()> {
        let mut player = AudioJitterPlayer::new(sink, &self.config);
        let queue = self.audio_queue.clone();
        let ready = self.audio_ready.clone();
        let running = self.running.clone();
        let counters = self.counters.clone();
        let activity = self.activity.clone();

        async move {
            loop {
                ready.notified().await;
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                while let Some(batch) = queue.try_pop() {
                    match player.play(&batch) {
                        Ok(_) => {
                            SessionCounters::incr(&counters.audio_batches_scheduled);
                            activity.touch();
                        }
                        Err(e) => {
                            SessionCounters::incr(&counters.alignment_errors);
                            tracing::warn!("Dropping audio batch {}: {}", batch.sequence, e);
                        }
                    }
                }
            }
            tracing::debug!("Audio loop finished");
        }
    }

    /// Handle one inbound wire message.
    ///
    /// Returns the sequence number of the batch this message completed, if
    /// any. A malformed message is dropped and reported; the session keeps
    /// running.
    pub fn feed(&self, message: impl Into<Bytes>) -> Result<Option<u64>> {
        if !self.is_running() {
            tracing::debug!("Session {} stopped, ignoring message", self.id);
            return Ok(None);
        }

        let message = message.into();
        SessionCounters::incr(&self.counters.messages_received);
        self.counters
            .bytes_received
            .fetch_add(message.len() as u64, Ordering::Relaxed);

        if let Some(sent_at) = self.last_outbound.lock().take() {
            *self.counters.last_time_to_first_byte.lock() = Some(sent_at.elapsed());
        }

        let (frame, audio) = match demux(message) {
            Ok(parts) => parts,
            Err(e) => {
                SessionCounters::incr(&self.counters.malformed_messages);
                tracing::warn!("Dropping malformed message: {}", e);
                return Err(e.into());
            }
        };
        self.activity.touch();

        // Hand-off happens under the lock so batches reach the queues in order
        let mut accumulator = self.accumulator.lock();
        match accumulator.push(frame, audio) {
            Some(batch) => {
                let sequence = batch.sequence;
                self.dispatch(batch);
                Ok(Some(sequence))
            }
            None => Ok(None),
        }
    }

    fn dispatch(&self, batch: Batch) {
        SessionCounters::incr(&self.counters.batches_sealed);
        *self.counters.last_collection_time.lock() = Some(batch.collection_time);

        // Count each evicted batch once, even if both halves overflowed
        let (frames, audio) = batch.split();
        let video_overflow = self.video_queue.push(frames).err();
        let audio_overflow = self.audio_queue.push(audio).err();
        if let Some(e) = video_overflow.or(audio_overflow) {
            SessionCounters::incr(&self.counters.batches_dropped);
            tracing::warn!("{}", Error::from(e));
        }
        self.audio_ready.notify_one();
    }

    /// Send voice audio (PCM16 little-endian, 16 kHz mono) to the server
    pub fn send_audio(&self, pcm: impl Into<Bytes>) -> Result<()> {
        self.transport.send(pcm.into())?;
        self.activity.touch();
        *self.last_outbound.lock() = Some(Instant::now());
        SessionCounters::incr(&self.counters.audio_messages_sent);
        Ok(())
    }

    /// Stop all tasks, discard the partial batch and anything still queued,
    /// and close the transport. Safe to call more than once.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.audio_ready.notify_one();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let discarded = self.accumulator.lock().discard_pending();
        let queued = self.video_queue.clear();
        self.audio_queue.clear();
        self.transport.close();

        tracing::info!(
            "Session {} stopped: discarded {} pending messages, {} queued batches",
            self.id,
            discarded,
            queued
        );
    }

    /// Check if the session is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Unique session id, used in logs and stats
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Get a snapshot of session statistics
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot(SnapshotContext {
            session_id: self.id,
            started_at: self.started_at,
            running: self.is_running(),
            pending_messages: self.accumulator.lock().pending(),
            video_queue_depth: self.video_queue.len(),
            audio_queue_depth: self.audio_queue.len(),
            silence_messages_sent: self.silence_sent.load(Ordering::Relaxed),
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AUDIO_PAYLOAD_SIZE;
    use crate::error::{ProtocolError, TransportError};
    use crate::protocol::{encode, AudioChunk, VideoFrame};
    use crate::transport::ChannelTransport;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        frames: Arc<Mutex<Vec<u32>>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, width: u32, _height: u32, encoded_image: &Bytes) {
            assert_eq!(width, 100);
            self.frames.lock().push(encoded_image[0] as u32);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        blocks: Mutex<Vec<usize>>,
    }

    impl AudioSink for RecordingSink {
        fn now(&self) -> std::time::Duration {
            Duration::ZERO
        }

        fn schedule_samples(&self, samples: Vec<f32>, _sample_rate: u32, _start: Duration) {
            self.blocks.lock().push(samples.len());
        }
    }

    struct Harness {
        session: Session,
        renderer: RecordingRenderer,
        sink: Arc<RecordingSink>,
        outbound: UnboundedReceiver<Bytes>,
    }

    fn harness(config: AppConfig) -> Harness {
        let renderer = RecordingRenderer::default();
        let sink = Arc::new(RecordingSink::default());
        let (transport, outbound) = ChannelTransport::new();
        let session = Session::start(
            &config,
            Box::new(renderer.clone()),
            sink.clone(),
            Arc::new(transport),
        )
        .unwrap();
        Harness {
            session,
            renderer,
            sink,
            outbound,
        }
    }

    fn message(index: u8) -> Bytes {
        encode(
            &VideoFrame::new(index as u32, 100, 100, Bytes::from(vec![index])),
            &AudioChunk::from_payload(&[0u8; AUDIO_PAYLOAD_SIZE]),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_six_messages_make_one_batch() {
        let h = harness(AppConfig::default());

        for i in 0..5 {
            assert_eq!(h.session.feed(message(i)).unwrap(), None);
        }
        assert_eq!(h.session.feed(message(5)).unwrap(), Some(0));

        let stats = h.session.stats();
        assert_eq!(stats.messages_received, 6);
        assert_eq!(stats.batches_sealed, 1);
        assert_eq!(stats.pending_messages, 0);
        assert!(stats.last_collection_time_ms.is_some());

        tokio::time::sleep(Duration::from_millis(33 * 8)).await;

        assert_eq!(*h.renderer.frames.lock(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(*h.sink.blocks.lock(), vec![6 * 534]);

        let stats = h.session.stats();
        assert_eq!(stats.frames_presented, 6);
        assert_eq!(stats.audio_batches_scheduled, 1);
        assert_eq!(stats.video_queue_depth, 0);
        assert_eq!(stats.audio_queue_depth, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_message_is_skipped() {
        let mut config = AppConfig::default();
        config.stream.minimum_chunk_size = 2;
        let h = harness(config);

        h.session.feed(message(0)).unwrap();
        let err = h.session.feed(Bytes::from_static(b"VIDEO")).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Truncated { .. })
        ));
        assert_eq!(h.session.feed(message(1)).unwrap(), Some(0));

        let stats = h.session.stats();
        assert_eq!(stats.malformed_messages, 1);
        assert_eq!(stats.messages_received, 3);
        assert_eq!(stats.batches_sealed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_drops_oldest() {
        let mut config = AppConfig::default();
        config.stream.minimum_chunk_size = 1;
        config.stream.max_queued_batches = 1;
        config.stream.frame_interval_ms = 10_000;
        let h = harness(config);

        // No await in between: the playback tasks cannot drain yet
        for i in 0..3 {
            h.session.feed(message(i)).unwrap();
        }
        let stats = h.session.stats();
        assert_eq!(stats.batches_sealed, 3);
        assert_eq!(stats.batches_dropped, 2);
        assert_eq!(stats.video_queue_depth, 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(*h.renderer.frames.lock(), vec![2]);
        assert_eq!(h.sink.blocks.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_eviction_counts_once() {
        let mut config = AppConfig::default();
        config.stream.minimum_chunk_size = 1;
        config.stream.max_queued_batches = 1;
        let h = harness(config);

        h.session.feed(message(0)).unwrap();
        h.session.feed(message(1)).unwrap();

        let stats = h.session.stats();
        assert_eq!(stats.batches_sealed, 2);
        assert_eq!(stats.batches_dropped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_pending() {
        let mut h = harness(AppConfig::default());
        for i in 0..4 {
            h.session.feed(message(i)).unwrap();
        }
        assert_eq!(h.session.stats().pending_messages, 4);

        h.session.stop();
        h.session.stop();
        assert!(!h.session.is_running());
        assert_eq!(h.session.stats().pending_messages, 0);

        // Later messages are ignored and nothing is ever played
        assert_eq!(h.session.feed(message(4)).unwrap(), None);
        assert_eq!(h.session.feed(message(5)).unwrap(), None);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(h.renderer.frames.lock().is_empty());
        assert!(h.sink.blocks.lock().is_empty());

        // Transport is released
        assert!(matches!(
            h.session.send_audio(Bytes::from_static(&[0, 0])),
            Err(Error::Transport(TransportError::Closed))
        ));
        assert!(h.outbound.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_when_idle() {
        let mut h = harness(AppConfig::default());

        tokio::time::sleep(Duration::from_millis(250)).await;

        let silence = h.outbound.try_recv().unwrap();
        assert_eq!(silence.len(), 1068 * 6);
        assert!(silence.iter().all(|&b| b == 0));
        assert_eq!(h.session.stats().silence_messages_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_silence_while_fed() {
        let mut h = harness(AppConfig::default());

        for i in 0..60u8 {
            h.session.feed(message(i)).unwrap();
            tokio::time::sleep(Duration::from_millis(33)).await;
        }

        assert!(h.outbound.try_recv().is_err());
        assert_eq!(h.session.stats().silence_messages_sent, 0);
        assert_eq!(h.session.stats().batches_sealed, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_audio_forwards_and_measures() {
        let mut config = AppConfig::default();
        config.watchdog.enabled = false;
        let mut h = harness(config);

        h.session.send_audio(vec![1u8, 2, 3, 4]).unwrap();
        assert_eq!(h.outbound.recv().await.unwrap().as_ref(), &[1, 2, 3, 4]);

        tokio::time::sleep(Duration::from_millis(120)).await;
        h.session.feed(message(0)).unwrap();

        let stats = h.session.stats();
        assert_eq!(stats.audio_messages_sent, 1);
        let ttfb = stats.last_time_to_first_byte_ms.unwrap();
        assert!((120.0..130.0).contains(&ttfb));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (transport, _rx) = ChannelTransport::new();
        let result = Session::start(
            &AppConfig::default(),
            Box::new(RecordingRenderer::default()),
            Arc::new(RecordingSink::default()),
            Arc::new(transport),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = AppConfig::default();
        config.stream.minimum_chunk_size = 0;
        let (transport, _rx) = ChannelTransport::new();
        let result = Session::start(
            &config,
            Box::new(RecordingRenderer::default()),
            Arc::new(RecordingSink::default()),
            Arc::new(transport),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
