//! Fixed-cadence frame presentation
//!
//! The scheduler is ticked at the frame interval. Each tick presents at most
//! one frame: the next one in the current batch, or the first one of the next
//! queued batch. With nothing queued the tick does nothing; no blank frame is
//! drawn and no catch-up happens later.

use std::sync::Arc;

use super::renderer::Renderer;
use crate::buffer::{BatchQueue, FrameBatch};

/// Position within the batch currently on screen
struct PlaybackCursor {
    batch: FrameBatch,
    position: usize,
}

impl PlaybackCursor {
    fn new(batch: FrameBatch) -> Self {
        Self { batch, position: 0 }
    }

    fn is_finished(&self) -> bool {
        self.position >= self.batch.len()
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Presented { batch_sequence: u64, cursor: usize },
    Idle,
}

/// Presents queued frame batches one frame per tick
pub struct VideoScheduler {
    renderer: Box<dyn Renderer>,
    queue: Arc<BatchQueue<FrameBatch>>,
    cursor: Option<PlaybackCursor>,
    frames_presented: u64,
    idle_ticks: u64,
}

impl VideoScheduler {
    pub fn new(renderer: Box<dyn Renderer>, queue: Arc<BatchQueue<FrameBatch>>) -> Self {
        Self {
            renderer,
            queue,
            cursor: None,
            frames_presented: 0,
            idle_ticks: 0,
        }
    }

    /// Present at most one frame
    pub fn tick(&mut self) -> TickOutcome {
        if self.cursor.as_ref().map_or(true, PlaybackCursor::is_finished) {
            self.cursor = None;
            while let Some(batch) = self.queue.pop() {
                if batch.is_empty() {
                    continue;
                }
                tracing::trace!("Video batch {} started", batch.sequence);
                self.cursor = Some(PlaybackCursor::new(batch));
                break;
            }
        }

        let Some(cursor) = self.cursor.as_mut() else {
            self.idle_ticks += 1;
            return TickOutcome::Idle;
        };

        let position = cursor.position;
        let frame = &cursor.batch.frames[position];
        self.renderer
            .render(frame.width, frame.height, &frame.encoded_image);
        cursor.position += 1;
        self.frames_presented += 1;

        TickOutcome::Presented {
            batch_sequence: cursor.batch.sequence,
            cursor: position,
        }
    }

    /// Frames handed to the renderer so far
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Ticks that found nothing to present
    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }

    /// Frames left in the batch on screen
    pub fn remaining_in_batch(&self) -> usize {
        self.cursor
            .as_ref()
            .map_or(0, |c| c.batch.len().saturating_sub(c.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VideoFrame;
    use bytes::Bytes;
    use parking_lot::Mutex;

    /// Records (width, height, first image byte) per render call
    #[derive(Clone, Default)]
    struct RecordingRenderer {
        calls: Arc<Mutex<Vec<(u32, u32, u8)>>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, width: u32, height: u32, encoded_image: &Bytes) {
            self.calls.lock().push((width, height, encoded_image[0]));
        }
    }

    fn frame_batch(sequence: u64, first: u8, count: u8) -> FrameBatch {
        FrameBatch {
            sequence,
            frames: (first..first + count)
                .map(|i| VideoFrame::new(i as u32, 100, 50, Bytes::from(vec![i])))
                .collect(),
        }
    }

    fn scheduler() -> (VideoScheduler, Arc<BatchQueue<FrameBatch>>, RecordingRenderer) {
        let queue = Arc::new(BatchQueue::new(8));
        let renderer = RecordingRenderer::default();
        let scheduler = VideoScheduler::new(Box::new(renderer.clone()), queue.clone());
        (scheduler, queue, renderer)
    }

    #[test]
    fn test_idle_without_batches() {
        let (mut scheduler, _queue, renderer) = scheduler();
        assert_eq!(scheduler.tick(), TickOutcome::Idle);
        assert_eq!(scheduler.tick(), TickOutcome::Idle);
        assert_eq!(scheduler.idle_ticks(), 2);
        assert!(renderer.calls.lock().is_empty());
    }

    #[test]
    fn test_presents_in_order_once() {
        let (mut scheduler, queue, renderer) = scheduler();
        queue.push(frame_batch(0, 0, 3)).unwrap();
        queue.push(frame_batch(1, 3, 3)).unwrap();

        let outcomes: Vec<_> = (0..7).map(|_| scheduler.tick()).collect();
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Presented { batch_sequence: 0, cursor: 0 },
                TickOutcome::Presented { batch_sequence: 0, cursor: 1 },
                TickOutcome::Presented { batch_sequence: 0, cursor: 2 },
                TickOutcome::Presented { batch_sequence: 1, cursor: 0 },
                TickOutcome::Presented { batch_sequence: 1, cursor: 1 },
                TickOutcome::Presented { batch_sequence: 1, cursor: 2 },
                TickOutcome::Idle,
            ]
        );

        let calls = renderer.calls.lock();
        let order: Vec<u8> = calls.iter().map(|c| c.2).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
        assert!(calls.iter().all(|c| c.0 == 100 && c.1 == 50));
        assert_eq!(scheduler.frames_presented(), 6);
    }

    #[test]
    fn test_resumes_after_idle() {
        let (mut scheduler, queue, renderer) = scheduler();
        assert_eq!(scheduler.tick(), TickOutcome::Idle);

        queue.push(frame_batch(0, 0, 2)).unwrap();
        assert_eq!(
            scheduler.tick(),
            TickOutcome::Presented { batch_sequence: 0, cursor: 0 }
        );
        assert_eq!(scheduler.remaining_in_batch(), 1);
        scheduler.tick();
        assert_eq!(scheduler.tick(), TickOutcome::Idle);

        queue.push(frame_batch(1, 2, 1)).unwrap();
        assert_eq!(
            scheduler.tick(),
            TickOutcome::Presented { batch_sequence: 1, cursor: 0 }
        );
        assert_eq!(renderer.calls.lock().len(), 3);
    }

    #[test]
    fn test_empty_batch_skipped() {
        let (mut scheduler, queue, _renderer) = scheduler();
        queue
            .push(FrameBatch {
                sequence: 0,
                frames: Vec::new(),
            })
            .unwrap();
        queue.push(frame_batch(1, 0, 1)).unwrap();
        assert_eq!(
            scheduler.tick(),
            TickOutcome::Presented { batch_sequence: 1, cursor: 0 }
        );
    }
}
