//! Video subsystem: frame presentation at a fixed cadence

pub mod renderer;
pub mod scheduler;

pub use renderer::{FrameWriter, Renderer};
pub use scheduler::{TickOutcome, VideoScheduler};
