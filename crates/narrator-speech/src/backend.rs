use crate::{AudioData, BackendResult, ModelInfo, SynthesisRequest};
use async_trait::async_trait;

/// External speech synthesizer.
///
/// Implementations are assumed non-reentrant: the orchestrator never has
/// more than one `synthesize` call in flight per backend. Retrying failed
/// calls, if wanted, belongs in the implementation.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Load the model (required before the first `synthesize`)
    ///
    /// Default implementation is a no-op for backends that are ready on
    /// construction.
    async fn initialize(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Synthesize one chunk of text
    ///
    /// # Arguments
    /// * `request` - Sanitized text, optional voice reference and language
    ///
    /// # Returns
    /// Decoded audio for the whole request
    async fn synthesize(&self, request: SynthesisRequest) -> BackendResult<AudioData>;

    /// Get current model information
    fn model_info(&self) -> ModelInfo;

    /// Get the output sample rate
    fn sample_rate(&self) -> u32 {
        24_000
    }

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String> {
        vec!["en".to_string()]
    }
}
