use thiserror::Error;

/// Pipeline-level errors surfaced to callers
#[derive(Error, Debug)]
pub enum SpeechError {
    /// Invalid argument or settings; never retried
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A chunk failed to synthesize and the session was aborted
    #[error(
        "Synthesis failed on chunk {index} of {total}: {source}\nAudio already queued for playback keeps playing"
    )]
    Synthesis {
        index: usize,
        total: usize,
        #[source]
        source: BackendError,
    },

    /// Backend failure outside a synthesis session, such as a model load
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Operation called in the wrong lifecycle phase
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// IO error
    #[error("IO error during {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Container encoding failed
    #[error("Audio export failed: {0}")]
    Export(String),
}

impl SpeechError {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        SpeechError::Io {
            source,
            context: context.into(),
        }
    }

    /// Index of the chunk that failed, if this is a synthesis failure
    pub fn failed_chunk(&self) -> Option<usize> {
        match self {
            SpeechError::Synthesis { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type SpeechResult<T> = Result<T, SpeechError>;

/// Errors raised by synthesis backend adapters
#[derive(Error, Debug)]
pub enum BackendError {
    /// Backend used before its model was loaded
    #[error("Synthesis backend is not initialized")]
    NotInitialized,

    /// Model failed to load
    #[error(
        "Model load failed: {0}\nSuggestion: Ensure the model is downloaded and the device is supported"
    )]
    ModelLoad(String),

    /// Audio generation failed
    #[error(
        "Audio generation failed: {0}\nSuggestion: Try a smaller chunk size or check model initialization"
    )]
    Generation(String),

    /// Voice reference could not be used
    #[error("Invalid voice reference: {0}")]
    Voice(String),

    /// Other errors
    #[error("Backend error: {0}")]
    Other(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Output device failures. These never leave the playback engine: the
/// affected buffer is simulated instead.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No output audio device is available")]
    NoOutputDevice,
    #[error("Failed to submit samples to the output device: {0}")]
    Submit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_error_reports_chunk_index() {
        let err = SpeechError::Synthesis {
            index: 3,
            total: 7,
            source: BackendError::Generation("token budget exceeded".to_string()),
        };
        assert_eq!(err.failed_chunk(), Some(3));
        let message = err.to_string();
        assert!(message.contains("chunk 3 of 7"));
        assert!(message.contains("token budget exceeded"));
    }

    #[test]
    fn non_synthesis_errors_have_no_chunk() {
        let err = SpeechError::Configuration("max_chars must be positive".to_string());
        assert_eq!(err.failed_chunk(), None);
    }
}
