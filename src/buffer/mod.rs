//! Jitter buffering: batching of demultiplexed messages and the per-stream
//! playback queues.

pub mod accumulator;
pub mod batch;
pub mod queue;

pub use accumulator::ChunkAccumulator;
pub use batch::{AudioBatch, Batch, FrameBatch};
pub use queue::{create_shared_queue, BatchQueue, SharedBatchQueue};
