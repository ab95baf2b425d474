//! Text preparation: normalization for speech and chunking for synthesis

pub mod chunker;
pub mod normalizer;
mod symbols;

pub use chunker::{
    Chunker, ChunkerConfig, DEFAULT_CHUNK_CEILING, DEFAULT_WORDS_PER_MINUTE, chunk_text,
    estimate_reading_time,
};
pub use normalizer::{NormalizationReport, NormalizerOptions, TextNormalizer, sanitize_for_synthesis};

use crate::{SpeechError, SpeechResult};
use std::path::Path;

/// Read a UTF-8 text document from disk
pub fn load_text_file(path: impl AsRef<Path>) -> SpeechResult<String> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| SpeechError::io(e, format!("reading {}", path.display())))?;
    log::debug!("Loaded {} characters from {}", text.chars().count(), path.display());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_text_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Chapter one.\n\nIt begins.").unwrap();

        let text = load_text_file(file.path()).unwrap();
        assert_eq!(text, "Chapter one.\n\nIt begins.");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_text_file(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, SpeechError::Io { .. }));
    }
}
