//! Synthesis backend implementations
//!
//! Each backend is feature-gated and can be enabled individually.

#[cfg(feature = "pocket-tts")]
pub mod pocket_tts;
