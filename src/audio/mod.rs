//! Audio subsystem: PCM16 conversion and batch playback scheduling

pub mod pcm;
pub mod player;
pub mod sink;

pub use player::{AudioJitterPlayer, ScheduledBlock};
pub use sink::{AudioSink, ClockedSink};
