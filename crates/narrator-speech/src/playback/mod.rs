//! Streaming playback
//!
//! - [`AudioSink`]: the output device seam, with a rodio implementation
//!   behind the `playback` feature
//! - [`probe_device`]: one-shot device check
//! - [`StreamingPlaybackEngine`]: queue plus playback worker

pub mod engine;
pub mod probe;
pub mod sink;

pub use engine::{PlaybackConfig, StreamingPlaybackEngine};
pub use probe::{PROBE_DURATION_MS, probe_device};
#[cfg(feature = "playback")]
pub use sink::RodioSink;
pub use sink::{AudioSink, PlaybackHandle};
