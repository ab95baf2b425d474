//! # Narrator Speech
//!
//! Streaming long-form text-to-speech. Arbitrary text is cleaned into
//! synthesizer-safe form, split into bounded chunks, synthesized one chunk at
//! a time, and played while later chunks are still being synthesized.
//!
//! ## Pipeline
//!
//! ```text
//! text ─► TextNormalizer ─► Chunker ─► SynthesisOrchestrator ─► StreamingPlaybackEngine
//!                                            │                        │
//!                                     SynthesisBackend          AudioSink / simulated
//! ```
//!
//! - **TextNormalizer**: removes emoji, spells out symbols and abbreviations,
//!   replaces links, smooths numbers; a strict variant filters to an ASCII
//!   allow-list
//! - **Chunker**: paragraph, then sentence, then clause splitting under a
//!   character ceiling
//! - **SynthesisOrchestrator**: sequential backend calls with progress and
//!   per-chunk audio notifications
//! - **StreamingPlaybackEngine**: queue plus playback worker with cooperative
//!   stop, simulated playback when no device is usable, and combined audio
//!   for saving
//!
//! ## Features
//!
//! - `playback`: play through the default output device (rodio)
//! - `mp3`: MP3 export
//! - `pocket-tts`: local Pocket-TTS backend
//!
//! ## Example
//!
//! ```rust
//! use narrator_speech::{Chunker, ChunkerConfig, TextNormalizer};
//!
//! let (clean, report) = TextNormalizer::new().normalize("It costs 20% \u{1F600}");
//! assert_eq!(clean, "It costs 20 percent");
//! assert_eq!(report.emojis_removed, 1);
//!
//! let chunks = Chunker::new(ChunkerConfig::default()).chunk(&clean, 200).unwrap();
//! assert_eq!(chunks.len(), 1);
//! ```

mod backend;
pub mod config;
pub mod error;
pub mod export;
mod narrator;
pub mod orchestrator;
pub mod playback;
pub mod text;
pub mod types;

// Backend implementations
pub mod providers;

pub use backend::SynthesisBackend;
pub use config::NarratorConfig;
pub use error::{BackendError, BackendResult, DeviceError, SpeechError, SpeechResult};
pub use export::{ExportFormat, export_audio, load_wav};
pub use narrator::Narrator;
pub use orchestrator::{SynthesisHooks, SynthesisOrchestrator};
pub use playback::{
    AudioSink, PlaybackConfig, PlaybackHandle, StreamingPlaybackEngine, probe_device,
};
pub use text::{
    Chunker, ChunkerConfig, NormalizationReport, NormalizerOptions, TextNormalizer, chunk_text,
    estimate_reading_time, load_text_file,
};
pub use types::{
    AudioData, ModelInfo, PlaybackState, SynthesisRequest, TextChunk, VoiceReference,
};
