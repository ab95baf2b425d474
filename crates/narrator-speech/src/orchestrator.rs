//! Sequential chunk-by-chunk synthesis
//!
//! The orchestrator owns the backend seam. It sanitizes each chunk with the
//! strict allow-list, calls the backend one chunk at a time, and reports
//! every buffer to the caller as soon as it is ready so playback can start
//! while later chunks are still being synthesized.

use crate::text::TextNormalizer;
use crate::{
    AudioData, SpeechError, SpeechResult, SynthesisBackend, SynthesisRequest, TextChunk,
    VoiceReference,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Language used when none is configured
pub const DEFAULT_LANGUAGE: &str = "en";

pub type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + Send + 'a>;
pub type AudioReadyFn<'a> = Box<dyn FnMut(AudioData) + Send + 'a>;

/// Optional notifications for a synthesis session
#[derive(Default)]
pub struct SynthesisHooks<'a> {
    pub(crate) on_progress: Option<ProgressFn<'a>>,
    pub(crate) on_audio_ready: Option<AudioReadyFn<'a>>,
    pub(crate) cancel: Option<Arc<AtomicBool>>,
}

impl<'a> SynthesisHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(completed, total)` after each chunk
    pub fn with_progress(mut self, f: impl FnMut(usize, usize) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Called with each chunk's audio as soon as it is synthesized
    pub fn with_audio_ready(mut self, f: impl FnMut(AudioData) + Send + 'a) -> Self {
        self.on_audio_ready = Some(Box::new(f));
        self
    }

    /// Abort the session before the next chunk once `flag` is set. Audio
    /// synthesized after the flag was raised is dropped.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn progress(&mut self, completed: usize, total: usize) {
        if let Some(f) = self.on_progress.as_mut() {
            f(completed, total);
        }
    }

    fn audio_ready(&mut self, audio: AudioData) {
        if let Some(f) = self.on_audio_ready.as_mut() {
            f(audio);
        }
    }
}

impl std::fmt::Debug for SynthesisHooks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisHooks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_audio_ready", &self.on_audio_ready.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Drives a [`SynthesisBackend`] over an ordered chunk sequence
pub struct SynthesisOrchestrator {
    backend: Arc<dyn SynthesisBackend>,
    normalizer: TextNormalizer,
    language: String,
    default_speaker: Option<String>,
    voice: RwLock<Option<VoiceReference>>,
    initialized: AtomicBool,
    // Held for a whole session so the backend never sees two calls at once
    session: tokio::sync::Mutex<()>,
}

impl SynthesisOrchestrator {
    pub fn new(backend: Arc<dyn SynthesisBackend>) -> Self {
        Self {
            backend,
            normalizer: TextNormalizer::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            default_speaker: None,
            voice: RwLock::new(None),
            initialized: AtomicBool::new(false),
            session: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Speaker used when no voice reference is set
    pub fn with_default_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.default_speaker = Some(speaker.into());
        self
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn backend(&self) -> &Arc<dyn SynthesisBackend> {
        &self.backend
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Load the backend model. Must succeed before the first synthesis.
    pub async fn initialize(&self) -> SpeechResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let info = self.backend.model_info();
        log::info!("Initializing synthesis backend {}", info.name);
        self.backend.initialize().await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Set or clear the voice reference used for following sessions.
    ///
    /// A file reference must point at an existing `.wav` clip.
    pub fn set_voice(&self, voice: Option<VoiceReference>) -> SpeechResult<()> {
        if let Some(VoiceReference::File(path)) = &voice {
            validate_voice_file(path)?;
        }
        match &voice {
            Some(v) => log::info!("Voice set to {:?}", v),
            None => log::info!("Voice cleared, using default speaker"),
        }
        *self.voice.write().unwrap_or_else(|e| e.into_inner()) = voice;
        Ok(())
    }

    /// Use a WAV clip as the speaker reference
    pub fn load_voice_file(&self, path: impl AsRef<Path>) -> SpeechResult<()> {
        self.set_voice(Some(VoiceReference::File(path.as_ref().to_path_buf())))
    }

    /// Explicitly set voice reference, if any
    pub fn voice(&self) -> Option<VoiceReference> {
        self.voice.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn effective_voice(&self) -> Option<VoiceReference> {
        self.voice()
            .or_else(|| self.default_speaker.clone().map(VoiceReference::Named))
    }

    /// Synthesize `chunks` in order, reporting each buffer through `hooks`
    /// as soon as it is ready.
    ///
    /// Returns the concatenation of every chunk's audio. The first backend
    /// failure aborts the session with [`SpeechError::Synthesis`]; buffers
    /// already handed to `on_audio_ready` are not taken back. A cancelled
    /// session returns the audio reported so far.
    pub async fn synthesize_streaming(
        &self,
        chunks: &[TextChunk],
        mut hooks: SynthesisHooks<'_>,
    ) -> SpeechResult<AudioData> {
        if !self.is_initialized() {
            return Err(SpeechError::IllegalState(
                "synthesis backend must be initialized before synthesizing".to_string(),
            ));
        }
        if chunks.is_empty() {
            return Err(SpeechError::Configuration(
                "no text chunks provided".to_string(),
            ));
        }

        let _session = self.session.lock().await;
        let total = chunks.len();
        let voice = self.effective_voice();
        let mut combined = AudioData::empty(self.backend.sample_rate());
        log::info!("Synthesizing {} chunk(s)", total);

        for (position, chunk) in chunks.iter().enumerate() {
            if hooks.is_cancelled() {
                log::info!("Synthesis cancelled after {}/{} chunk(s)", position, total);
                return Ok(combined);
            }
            let (cleaned, _) = self.normalizer.normalize_strict(chunk.text());
            log::debug!(
                "Chunk {}/{}: {} chars after cleaning",
                position + 1,
                total,
                cleaned.chars().count()
            );

            if cleaned.is_empty() {
                log::debug!("Chunk {} has no speakable text, skipping", chunk.sequence_index);
                hooks.progress(position + 1, total);
                continue;
            }

            let request = SynthesisRequest {
                text: cleaned,
                voice: voice.clone(),
                language: self.language.clone(),
            };
            let audio = self.backend.synthesize(request).await.map_err(|source| {
                log::error!("Synthesis failed on chunk {}/{}: {}", position + 1, total, source);
                SpeechError::Synthesis {
                    index: chunk.sequence_index,
                    total,
                    source,
                }
            })?;

            if hooks.is_cancelled() {
                log::info!("Synthesis cancelled after {}/{} chunk(s)", position, total);
                return Ok(combined);
            }
            combined.append(&audio);
            hooks.audio_ready(audio);
            hooks.progress(position + 1, total);
        }

        log::info!(
            "Synthesis complete: {} chunk(s), {} ms of audio",
            total,
            combined.duration_ms()
        );
        Ok(combined)
    }

    /// Synthesize `chunks` into a single buffer without streaming
    pub async fn synthesize(
        &self,
        chunks: &[TextChunk],
        on_progress: Option<ProgressFn<'_>>,
    ) -> SpeechResult<AudioData> {
        let hooks = SynthesisHooks {
            on_progress,
            ..SynthesisHooks::default()
        };
        self.synthesize_streaming(chunks, hooks).await
    }
}

fn validate_voice_file(path: &Path) -> SpeechResult<()> {
    if !path.exists() {
        return Err(SpeechError::Configuration(format!(
            "voice file not found: {}",
            path.display()
        )));
    }
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return Err(SpeechError::Configuration(format!(
            "voice file must be a .wav clip: {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::chunk_text;
    use crate::{BackendError, BackendResult, ModelInfo};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockBackend {
        requests: Mutex<Vec<SynthesisRequest>>,
        fail_on: Option<String>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(text: &str) -> Self {
            Self {
                fail_on: Some(text.to_string()),
                ..Self::new()
            }
        }

        fn texts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SynthesisBackend for MockBackend {
        async fn synthesize(&self, request: SynthesisRequest) -> BackendResult<AudioData> {
            if self.fail_on.as_deref() == Some(request.text.as_str()) {
                return Err(BackendError::Generation("token budget exceeded".to_string()));
            }
            // One sample per character keeps durations easy to check
            let samples = vec![0.1; request.text.len()];
            self.requests.lock().unwrap().push(request);
            Ok(AudioData::new(samples, 1, 1000))
        }

        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                id: "mock".to_string(),
                name: "Mock".to_string(),
                description: None,
                languages: vec!["en".to_string()],
            }
        }

        fn sample_rate(&self) -> u32 {
            1000
        }
    }

    async fn ready(backend: Arc<MockBackend>) -> SynthesisOrchestrator {
        let orchestrator = SynthesisOrchestrator::new(backend);
        orchestrator.initialize().await.unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn test_requires_initialization() {
        let orchestrator = SynthesisOrchestrator::new(Arc::new(MockBackend::new()));
        let chunks = chunk_text("Hello.", 100).unwrap();

        let err = orchestrator
            .synthesize_streaming(&chunks, SynthesisHooks::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::IllegalState(_)));
    }

    #[tokio::test]
    async fn test_empty_chunk_list_is_rejected() {
        let orchestrator = ready(Arc::new(MockBackend::new())).await;
        let err = orchestrator.synthesize(&[], None).await.unwrap_err();
        assert!(matches!(err, SpeechError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_streams_chunks_in_order() {
        let backend = Arc::new(MockBackend::new());
        let orchestrator = ready(backend.clone()).await;
        let chunks = chunk_text("First.\n\nSecond one.\n\nThird.", 100).unwrap();

        let mut progress = Vec::new();
        let mut buffers = Vec::new();
        let hooks = SynthesisHooks::new()
            .with_progress(|done, total| progress.push((done, total)))
            .with_audio_ready(|audio| buffers.push(audio.samples.len()));
        let combined = orchestrator
            .synthesize_streaming(&chunks, hooks)
            .await
            .unwrap();

        assert_eq!(backend.texts(), vec!["First.", "Second one.", "Third."]);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(buffers, vec![6, 11, 6]);
        assert_eq!(combined.samples.len(), 23);
        assert_eq!(combined.sample_rate, 1000);
    }

    #[tokio::test]
    async fn test_failure_reports_chunk_index_and_stops() {
        let backend = Arc::new(MockBackend::failing_on("Second."));
        let orchestrator = ready(backend.clone()).await;
        let chunks = chunk_text("First.\n\nSecond.\n\nThird.", 100).unwrap();

        let mut delivered = 0;
        let hooks = SynthesisHooks::new().with_audio_ready(|_| delivered += 1);
        let err = orchestrator
            .synthesize_streaming(&chunks, hooks)
            .await
            .unwrap_err();

        assert_eq!(err.failed_chunk(), Some(1));
        assert!(matches!(
            err,
            SpeechError::Synthesis {
                total: 3,
                source: BackendError::Generation(_),
                ..
            }
        ));
        assert_eq!(delivered, 1);
        assert_eq!(backend.texts(), vec!["First."]);
    }

    #[tokio::test]
    async fn test_cancel_skips_remaining_chunks() {
        let backend = Arc::new(MockBackend::new());
        let orchestrator = ready(backend.clone()).await;
        let chunks = chunk_text("First.\n\nSecond.\n\nThird.", 100).unwrap();

        let cancel = Arc::new(AtomicBool::new(false));
        let raise = cancel.clone();
        let hooks = SynthesisHooks::new()
            .with_cancel(cancel)
            .with_audio_ready(move |_| raise.store(true, Ordering::SeqCst));
        let combined = orchestrator
            .synthesize_streaming(&chunks, hooks)
            .await
            .unwrap();

        assert_eq!(backend.texts(), vec!["First."]);
        assert_eq!(combined.samples.len(), 6);
    }

    #[tokio::test]
    async fn test_chunks_are_sanitized_before_synthesis() {
        let backend = Arc::new(MockBackend::new());
        let orchestrator = ready(backend.clone()).await;
        let chunks = chunk_text("Caf\u{e9} \u{2603} *ok*\n\n\u{1F600}", 100).unwrap();

        let mut progress = Vec::new();
        let hooks = SynthesisHooks::new().with_progress(|done, total| progress.push((done, total)));
        orchestrator
            .synthesize_streaming(&chunks, hooks)
            .await
            .unwrap();

        assert_eq!(backend.texts(), vec!["Caf ok"]);
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_default_speaker_and_language() {
        let backend = Arc::new(MockBackend::new());
        let orchestrator = SynthesisOrchestrator::new(backend.clone())
            .with_default_speaker("Ana Florence")
            .with_language("es");
        orchestrator.initialize().await.unwrap();

        let chunks = chunk_text("Hola.", 100).unwrap();
        orchestrator.synthesize(&chunks, None).await.unwrap();

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].voice, Some(VoiceReference::named("Ana Florence")));
        assert_eq!(requests[0].language, "es");
    }

    #[test]
    fn test_voice_file_validation() {
        let orchestrator = SynthesisOrchestrator::new(Arc::new(MockBackend::new()));
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.wav");
        assert!(matches!(
            orchestrator.load_voice_file(&missing),
            Err(SpeechError::Configuration(_))
        ));

        let not_wav = dir.path().join("voice.mp3");
        std::fs::write(&not_wav, b"id3").unwrap();
        assert!(matches!(
            orchestrator.load_voice_file(&not_wav),
            Err(SpeechError::Configuration(_))
        ));
        assert_eq!(orchestrator.voice(), None);

        let clip = dir.path().join("voice.WAV");
        std::fs::write(&clip, b"RIFF").unwrap();
        orchestrator.load_voice_file(&clip).unwrap();
        assert_eq!(orchestrator.voice(), Some(VoiceReference::File(clip)));

        orchestrator.set_voice(None).unwrap();
        assert_eq!(orchestrator.voice(), None);
    }
}
