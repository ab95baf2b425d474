//! TOML configuration
//!
//! ```toml
//! [synthesis]
//! language = "en"
//! default_speaker = "Ana Florence"
//! chunk_size = 200
//!
//! [chunker]
//! ceiling = 250
//!
//! [normalizer]
//! remove_emojis = true
//!
//! [playback]
//! poll_interval_ms = 100
//!
//! [audio]
//! output_format = "wav"
//! sample_rate = 22050
//! ```

use crate::export::ExportFormat;
use crate::orchestrator::DEFAULT_LANGUAGE;
use crate::playback::PlaybackConfig;
use crate::text::{ChunkerConfig, NormalizerOptions};
use crate::{SpeechError, SpeechResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub synthesis: SynthesisSettings,
    pub chunker: ChunkerConfig,
    pub normalizer: NormalizerOptions,
    pub playback: PlaybackSettings,
    pub audio: AudioSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    #[serde(default = "default_language")]
    pub language: String,

    /// Speaker used when no voice clip is given
    #[serde(default)]
    pub default_speaker: Option<String>,

    /// Characters per chunk requested from the chunker
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_chunk_size() -> usize {
    200
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            default_speaker: None,
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,

    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Check the output device at startup
    #[serde(default = "default_probe_device")]
    pub probe_device: bool,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_queue_timeout_ms() -> u64 {
    100
}

fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_probe_device() -> bool {
    true
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            queue_timeout_ms: default_queue_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            probe_device: default_probe_device(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    #[serde(default)]
    pub output_format: ExportFormat,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_sample_rate() -> u32 {
    22_050
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            output_format: ExportFormat::default(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl NarratorConfig {
    /// Load settings from a TOML file. A missing file yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> SpeechResult<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(SpeechError::io(e, format!("reading {}", path.display()))),
        };

        let config: NarratorConfig = toml::from_str(&content).map_err(|e| {
            SpeechError::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.narrator/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".narrator").join("config.toml"))
    }

    /// Load from [`default_path`](Self::default_path), or defaults when
    /// there is no home directory
    pub fn load_default() -> SpeechResult<Self> {
        match Self::default_path() {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> SpeechResult<()> {
        if self.synthesis.chunk_size == 0 {
            return Err(SpeechError::Configuration(
                "synthesis.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.synthesis.language.trim().is_empty() {
            return Err(SpeechError::Configuration(
                "synthesis.language cannot be empty".to_string(),
            ));
        }
        self.chunker.validate()?;

        let playback = &self.playback;
        if playback.poll_interval_ms == 0
            || playback.queue_timeout_ms == 0
            || playback.stop_timeout_ms == 0
        {
            return Err(SpeechError::Configuration(
                "playback intervals and timeouts must be greater than zero".to_string(),
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(SpeechError::Configuration(
                "audio.sample_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine settings derived from the `[playback]` and `[audio]` tables
    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig::default()
            .with_poll_interval(Duration::from_millis(self.playback.poll_interval_ms))
            .with_queue_timeout(Duration::from_millis(self.playback.queue_timeout_ms))
            .with_stop_timeout(Duration::from_millis(self.playback.stop_timeout_ms))
            .with_sample_rate(self.audio.sample_rate)
            .with_probe(self.playback.probe_device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_values() {
        let config = NarratorConfig::default();
        assert_eq!(config.synthesis.language, "en");
        assert_eq!(config.synthesis.chunk_size, 200);
        assert_eq!(config.chunker.ceiling, 250);
        assert_eq!(config.playback.poll_interval_ms, 100);
        assert_eq!(config.playback.stop_timeout_ms, 2000);
        assert_eq!(config.audio.output_format, ExportFormat::Wav);
        assert_eq!(config.audio.sample_rate, 22_050);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
[synthesis]
language = "de"
default_speaker = "Ana Florence"

[chunker]
ceiling = 180

[normalizer]
remove_emojis = false

[playback]
stop_timeout_ms = 500
probe_device = false

[audio]
output_format = "mp3"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = NarratorConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.synthesis.language, "de");
        assert_eq!(config.synthesis.default_speaker.as_deref(), Some("Ana Florence"));
        assert_eq!(config.synthesis.chunk_size, 200);
        assert_eq!(config.chunker.ceiling, 180);
        assert!(!config.normalizer.remove_emojis);
        assert!(config.normalizer.replace_special_chars);
        assert_eq!(config.audio.output_format, ExportFormat::Mp3);

        let playback = config.playback_config();
        assert_eq!(playback.stop_timeout, Duration::from_millis(500));
        assert_eq!(playback.poll_interval, Duration::from_millis(100));
        assert!(!playback.probe_device);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NarratorConfig::from_file(dir.path().join("config.toml")).unwrap();
        assert_eq!(config, NarratorConfig::default());
    }

    #[test]
    fn test_config_from_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[synthesis\nlanguage = ").unwrap();

        let err = NarratorConfig::from_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, SpeechError::Configuration(_)));
    }

    #[test]
    fn test_unknown_output_format_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[audio]\noutput_format = \"flac\"\n")
            .unwrap();

        assert!(matches!(
            NarratorConfig::from_file(temp_file.path()),
            Err(SpeechError::Configuration(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = NarratorConfig::default();
        config.synthesis.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = NarratorConfig::default();
        config.chunker.ceiling = 0;
        assert!(config.validate().is_err());

        let mut config = NarratorConfig::default();
        config.playback.queue_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = NarratorConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: NarratorConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }
}
