use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Model information reported by a synthesis backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,
    /// Model name
    pub name: String,
    /// Model description
    pub description: Option<String>,
    /// Supported languages
    pub languages: Vec<String>,
}

/// Decoded PCM audio. One value is one synthesized chunk on its way to the
/// player, or the combined audio of a whole session.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    /// Audio samples normalized to [-1.0, 1.0], interleaved when multi-channel
    pub samples: Vec<f32>,
    /// Number of audio channels (typically 1 for mono)
    pub channels: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Mono buffer of zeros lasting `duration_ms`
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let len = (sample_rate as u64 * duration_ms / 1000) as usize;
        Self::new(vec![0.0; len], 1, sample_rate)
    }

    /// Empty mono buffer, the starting point of an accumulator
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), 1, sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as f64 / self.sample_rate as f64 * 1000.0).round() as u64
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Append another buffer's samples. An empty accumulator adopts the
    /// layout of the first buffer appended to it.
    pub fn append(&mut self, other: &AudioData) {
        if self.samples.is_empty() {
            self.channels = other.channels;
            self.sample_rate = other.sample_rate;
        } else if self.sample_rate != other.sample_rate || self.channels != other.channels {
            log::warn!(
                "Appending {}Hz/{}ch audio to a {}Hz/{}ch buffer; samples are concatenated as-is",
                other.sample_rate,
                other.channels,
                self.sample_rate,
                self.channels
            );
        }
        self.samples.extend_from_slice(&other.samples);
    }
}

/// A bounded span of normalized text, the unit of synthesis and playback
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChunk {
    /// 0-based position in synthesis and playback order
    pub sequence_index: usize,
    text: String,
}

impl TextChunk {
    pub(crate) fn new(sequence_index: usize, text: String) -> Self {
        Self {
            sequence_index,
            text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters, not bytes
    pub fn char_length(&self) -> usize {
        self.text.chars().count()
    }
}

/// Speaker identity handed to the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceReference {
    /// WAV clip for zero-shot voice cloning
    File(PathBuf),
    /// Speaker the backend knows by name
    Named(String),
}

impl VoiceReference {
    pub fn named(name: impl Into<String>) -> Self {
        VoiceReference::Named(name.into())
    }
}

/// One backend call
#[derive(Clone, Debug)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Option<VoiceReference>,
    pub language: String,
}

/// Externally visible state of a playback session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// A buffer is being played on a real device
    Playing,
    /// A buffer is being timed without a device
    Simulating,
    /// The last session was cancelled
    Stopped,
}

impl PlaybackState {
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Simulating)
    }
}
