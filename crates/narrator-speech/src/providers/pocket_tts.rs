//! Pocket-TTS backend, running the model locally on the CPU
//!
//! # Examples
//!
//! ```no_run
//! use narrator_speech::providers::pocket_tts::{PocketTtsBackend, PocketTtsConfig};
//! use narrator_speech::{Narrator, NarratorConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(PocketTtsBackend::new(PocketTtsConfig::default()));
//!     let narrator = Narrator::new(NarratorConfig::default(), backend)?;
//!     narrator.initialize().await?;
//!     narrator.speak("Hello, world!", Default::default()).await?;
//!     narrator.wait_until_idle().await;
//!     Ok(())
//! }
//! ```

use crate::{
    AudioData, BackendError, BackendResult, ModelInfo, SynthesisBackend, SynthesisRequest,
    VoiceReference,
};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use pocket_tts::TTSModel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Speakers shipped as precomputed embeddings
pub const PREDEFINED_VOICES: &[&str] = &[
    "alba", "marius", "javert", "jean", "fantine", "cosette", "eponine", "azelma",
];

const DEFAULT_MODEL_VARIANT: &str = "b6369a24";
const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Configuration for the Pocket-TTS backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketTtsConfig {
    /// Model variant identifier
    #[serde(default = "default_model_variant")]
    pub model_variant: String,

    /// Temperature for generation (0.0 - 1.0, default: 0.7)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Number of LSD decode steps (default: 1)
    #[serde(default = "default_lsd_steps")]
    pub lsd_decode_steps: usize,

    /// End-of-sequence threshold (default: -4.0)
    #[serde(default = "default_eos_threshold")]
    pub eos_threshold: f32,

    #[serde(default)]
    pub noise_clamp: Option<f32>,

    /// Predefined voice used when a request carries no voice reference
    #[serde(default = "default_voice")]
    pub default_voice: String,
}

fn default_model_variant() -> String {
    DEFAULT_MODEL_VARIANT.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_lsd_steps() -> usize {
    1
}

fn default_eos_threshold() -> f32 {
    -4.0
}

fn default_voice() -> String {
    "alba".to_string()
}

impl Default for PocketTtsConfig {
    fn default() -> Self {
        Self {
            model_variant: default_model_variant(),
            temperature: default_temperature(),
            lsd_decode_steps: default_lsd_steps(),
            eos_threshold: default_eos_threshold(),
            noise_clamp: None,
            default_voice: default_voice(),
        }
    }
}

/// HuggingFace location of a predefined voice embedding
fn predefined_voice_path(name: &str) -> BackendResult<String> {
    let name = name.trim().to_lowercase();
    if !PREDEFINED_VOICES.contains(&name.as_str()) {
        return Err(BackendError::Voice(format!(
            "unknown voice '{}', available voices: {}",
            name,
            PREDEFINED_VOICES.join(", ")
        )));
    }
    Ok(format!(
        "hf://kyutai/pocket-tts-without-voice-cloning/embeddings/{}.safetensors",
        name
    ))
}

/// Local Pocket-TTS synthesizer
pub struct PocketTtsBackend {
    config: PocketTtsConfig,
    model: OnceCell<TTSModel>,
    voice_cache: RwLock<HashMap<String, pocket_tts::ModelState>>,
}

impl PocketTtsBackend {
    /// Create the backend. The model is loaded by `initialize`.
    pub fn new(config: PocketTtsConfig) -> Self {
        Self {
            config,
            model: OnceCell::new(),
            voice_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PocketTtsConfig {
        &self.config
    }

    fn model(&self) -> BackendResult<&TTSModel> {
        self.model.get().ok_or(BackendError::NotInitialized)
    }

    fn resolve_voice(
        &self,
        model: &TTSModel,
        voice: Option<&VoiceReference>,
    ) -> BackendResult<pocket_tts::ModelState> {
        let key = match voice {
            Some(VoiceReference::File(path)) => format!("file:{}", path.display()),
            Some(VoiceReference::Named(name)) => name.clone(),
            None => self.config.default_voice.clone(),
        };

        if let Some(state) = self
            .voice_cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(state.clone());
        }

        let state = match voice {
            Some(VoiceReference::File(path)) => load_voice_clip(model, path)?,
            _ => load_predefined_voice(model, &key)?,
        };

        self.voice_cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, state.clone());
        Ok(state)
    }
}

fn load_voice_clip(model: &TTSModel, path: &Path) -> BackendResult<pocket_tts::ModelState> {
    log::debug!("Cloning voice from {}", path.display());
    model
        .get_voice_state(path)
        .map_err(|e| BackendError::Voice(format!("{}: {}", path.display(), e)))
}

fn load_predefined_voice(model: &TTSModel, name: &str) -> BackendResult<pocket_tts::ModelState> {
    let hf_path = predefined_voice_path(name)?;
    let local_path = pocket_tts::weights::download_if_necessary(&hf_path).map_err(|e| {
        BackendError::Voice(format!("failed to download voice '{}': {}", name, e))
    })?;
    model
        .get_voice_state_from_prompt_file(&local_path)
        .map_err(|e| BackendError::Voice(format!("failed to load voice '{}': {}", name, e)))
}

#[async_trait]
impl SynthesisBackend for PocketTtsBackend {
    async fn initialize(&self) -> BackendResult<()> {
        if self.model.get().is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        let model = tokio::task::spawn_blocking(move || {
            TTSModel::load_with_params_device(
                &config.model_variant,
                config.temperature,
                config.lsd_decode_steps,
                config.eos_threshold,
                config.noise_clamp,
                &candle_core::Device::Cpu,
            )
        })
        .await
        .map_err(|e| BackendError::ModelLoad(format!("task join error: {}", e)))?
        .map_err(|e| BackendError::ModelLoad(e.to_string()))?;

        log::info!(
            "Loaded Pocket-TTS model {} ({} Hz)",
            self.config.model_variant,
            model.sample_rate
        );
        // A concurrent initialize may have won; either model is equivalent
        let _ = self.model.set(model);
        Ok(())
    }

    async fn synthesize(&self, request: SynthesisRequest) -> BackendResult<AudioData> {
        let model = self.model()?.clone();
        let voice_state = self.resolve_voice(&model, request.voice.as_ref())?;
        let sample_rate = model.sample_rate as u32;
        let text = request.text;

        let result = tokio::task::spawn_blocking(move || {
            model
                .generate(&text, &voice_state)
                .map_err(|e| BackendError::Generation(format!("{} (text length: {})", e, text.len())))
        })
        .await
        .map_err(|e| BackendError::Generation(format!("task join error: {}", e)))??;

        // Shape is [samples] or [1, samples]
        let tensor = if result.dims().len() > 1 {
            result
                .squeeze(0)
                .map_err(|e| BackendError::Generation(format!("failed to squeeze tensor: {}", e)))?
        } else {
            result
        };
        let samples = tensor
            .to_vec1::<f32>()
            .map_err(|e| BackendError::Generation(format!("failed to extract samples: {}", e)))?;

        Ok(AudioData::new(samples, 1, sample_rate))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            id: self.config.model_variant.clone(),
            name: format!("pocket-tts {}", self.config.model_variant),
            description: Some("Pocket-TTS (24kHz, CPU)".to_string()),
            languages: self.supported_languages(),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.model
            .get()
            .map(|m| m.sample_rate as u32)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PocketTtsConfig::default();
        assert_eq!(config.model_variant, "b6369a24");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.lsd_decode_steps, 1);
        assert_eq!(config.eos_threshold, -4.0);
        assert_eq!(config.default_voice, "alba");
    }

    #[test]
    fn test_predefined_voice_path() {
        assert_eq!(
            predefined_voice_path("Alba").unwrap(),
            "hf://kyutai/pocket-tts-without-voice-cloning/embeddings/alba.safetensors"
        );
        assert!(matches!(
            predefined_voice_path("Ana Florence"),
            Err(BackendError::Voice(_))
        ));
    }

    #[tokio::test]
    async fn test_synthesize_before_initialize() {
        let backend = PocketTtsBackend::new(PocketTtsConfig::default());
        let request = SynthesisRequest {
            text: "Hello".to_string(),
            voice: None,
            language: "en".to_string(),
        };
        assert!(matches!(
            backend.synthesize(request).await,
            Err(BackendError::NotInitialized)
        ));
        assert_eq!(backend.sample_rate(), 24_000);
    }

    #[tokio::test]
    #[ignore = "requires HuggingFace model download"]
    async fn test_generate_speech() {
        let backend = PocketTtsBackend::new(PocketTtsConfig::default());
        backend.initialize().await.unwrap();

        let audio = backend
            .synthesize(SynthesisRequest {
                text: "Hello world".to_string(),
                voice: Some(VoiceReference::named("alba")),
                language: "en".to_string(),
            })
            .await
            .unwrap();
        assert!(!audio.is_empty());
    }
}
