//! Frame presentation abstraction and a file-dumping renderer

use bytes::Bytes;
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::Error;

/// Presents encoded frames.
///
/// Implementations own decoding. A frame must be decoded before the next
/// call to `render` returns, so presentation order matches call order.
pub trait Renderer: Send {
    fn render(&mut self, width: u32, height: u32, encoded_image: &Bytes);
}

struct PendingFrame {
    number: u64,
    width: u32,
    height: u32,
    image: Bytes,
}

/// Renderer that hands frames to a background thread, which writes them to
/// `frame_dir` (or only counts them when no directory is set).
///
/// The hand-off channel is bounded; frames that don't fit are dropped and
/// counted rather than stalling the video loop.
pub struct FrameWriter {
    tx: Option<Sender<PendingFrame>>,
    thread_handle: Option<JoinHandle<()>>,
    next_number: u64,
    written: Arc<AtomicU64>,
    dropped: AtomicU64,
}

impl FrameWriter {
    pub fn new(frame_dir: Option<PathBuf>, capacity: usize) -> Result<Self, Error> {
        if let Some(dir) = &frame_dir {
            std::fs::create_dir_all(dir)?;
        }

        let (tx, rx) = bounded::<PendingFrame>(capacity);
        let written = Arc::new(AtomicU64::new(0));
        let written_for_thread = written.clone();

        let handle = thread::Builder::new()
            .name("frame-writer".into())
            .spawn(move || {
                while let Ok(frame) = rx.recv() {
                    if let Some(dir) = &frame_dir {
                        let path = dir.join(format!("frame_{:06}.jpg", frame.number));
                        if let Err(e) = std::fs::write(&path, &frame.image) {
                            tracing::warn!("Failed to write {}: {}", path.display(), e);
                            continue;
                        }
                    }
                    tracing::trace!(
                        "Frame {} ({}x{}, {} bytes) consumed",
                        frame.number,
                        frame.width,
                        frame.height,
                        frame.image.len()
                    );
                    written_for_thread.fetch_add(1, Ordering::Relaxed);
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            thread_handle: Some(handle),
            next_number: 0,
            written,
            dropped: AtomicU64::new(0),
        })
    }

    /// Frames fully consumed by the writer thread
    pub fn frames_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Frames dropped because the writer thread fell behind
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting frames and wait for the writer thread to drain
    pub fn finish(&mut self) {
        self.tx.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Renderer for FrameWriter {
    fn render(&mut self, width: u32, height: u32, encoded_image: &Bytes) {
        let Some(tx) = &self.tx else {
            return;
        };

        let frame = PendingFrame {
            number: self.next_number,
            width,
            height,
            image: encoded_image.clone(),
        };
        self.next_number += 1;

        match tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Frame writer busy, dropped frame {}", frame.number);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("Frame writer thread exited");
                self.tx = None;
            }
        }
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        self.finish();
    }
}
