//! Speak sessions: the whole text-to-playback flow behind one value

use crate::config::NarratorConfig;
use crate::export::{ExportFormat, export_audio};
use crate::orchestrator::{ProgressFn, SynthesisHooks, SynthesisOrchestrator};
use crate::playback::StreamingPlaybackEngine;
use crate::text::{Chunker, NormalizationReport, TextNormalizer};
use crate::{AudioData, SpeechError, SpeechResult, SynthesisBackend, TextChunk};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Normalizer, chunker, orchestrator and playback engine wired together
pub struct Narrator {
    config: NarratorConfig,
    normalizer: TextNormalizer,
    chunker: Chunker,
    orchestrator: SynthesisOrchestrator,
    engine: StreamingPlaybackEngine,
    // Raised by `stop`, lowered when the next session starts
    cancelled: Arc<AtomicBool>,
}

impl Narrator {
    /// Build a narrator playing on the default output device
    pub fn new(config: NarratorConfig, backend: Arc<dyn SynthesisBackend>) -> SpeechResult<Self> {
        let engine = StreamingPlaybackEngine::new(config.playback_config());
        Self::with_engine(config, backend, engine)
    }

    /// Build a narrator around an existing playback engine
    pub fn with_engine(
        config: NarratorConfig,
        backend: Arc<dyn SynthesisBackend>,
        engine: StreamingPlaybackEngine,
    ) -> SpeechResult<Self> {
        config.validate()?;

        let normalizer = TextNormalizer::with_options(config.normalizer.clone());
        let mut orchestrator = SynthesisOrchestrator::new(backend)
            .with_language(config.synthesis.language.clone())
            .with_normalizer(normalizer.clone());
        if let Some(speaker) = &config.synthesis.default_speaker {
            orchestrator = orchestrator.with_default_speaker(speaker.clone());
        }

        Ok(Self {
            chunker: Chunker::new(config.chunker.clone()),
            normalizer,
            orchestrator,
            engine,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn initialize(&self) -> SpeechResult<()> {
        self.orchestrator.initialize().await
    }

    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &SynthesisOrchestrator {
        &self.orchestrator
    }

    pub fn engine(&self) -> &StreamingPlaybackEngine {
        &self.engine
    }

    /// Normalize the whole document and split it into chunks of at most
    /// `max_chars` (further limited by the chunker ceiling)
    ///
    /// Normalization turns paragraph breaks into sentence pauses, so the
    /// chunker sees one paragraph and splits on sentences. This keeps short
    /// paragraphs packed together instead of synthesized one per call.
    pub fn prepare(
        &self,
        text: &str,
        max_chars: usize,
    ) -> SpeechResult<(Vec<TextChunk>, NormalizationReport)> {
        let (normalized, report) = self.normalizer.normalize(text);
        let chunks = self.chunker.chunk(&normalized, max_chars)?;
        Ok((chunks, report))
    }

    /// Start a streaming session: every chunk is queued for playback as soon
    /// as it is synthesized.
    ///
    /// Returns when synthesis is complete; playback may still be running.
    /// Use [`wait_until_idle`](Self::wait_until_idle) to wait for it. After
    /// [`stop`](Self::stop) no further chunk is synthesized or queued and the
    /// audio produced so far is returned. A cancel flag set on `hooks` is
    /// replaced by the narrator's own.
    pub async fn speak(&self, text: &str, hooks: SynthesisHooks<'_>) -> SpeechResult<AudioData> {
        if self.engine.is_shut_down() {
            return Err(SpeechError::IllegalState(
                "playback engine has been shut down".to_string(),
            ));
        }

        let (chunks, report) = self.prepare(text, self.config.synthesis.chunk_size)?;
        log::info!(
            "Speaking {} chunk(s), {} characters after normalization",
            chunks.len(),
            report.final_length
        );
        self.engine.clear_combined_audio();
        self.cancelled.store(false, Ordering::SeqCst);

        let SynthesisHooks {
            on_progress,
            mut on_audio_ready,
            ..
        } = hooks;
        let engine = &self.engine;
        let cancelled = self.cancelled.clone();
        let session = SynthesisHooks {
            on_progress,
            on_audio_ready: Some(Box::new(move |audio: AudioData| {
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                let notify = on_audio_ready.as_mut().map(|f| (f, audio.clone()));
                if let Err(e) = engine.enqueue(audio) {
                    log::error!("Failed to queue audio for playback: {}", e);
                }
                // A stop that raced the enqueue must not leave a new worker running
                if cancelled.load(Ordering::SeqCst) {
                    engine.stop();
                    return;
                }
                if let Some((f, audio)) = notify {
                    f(audio);
                }
            })),
            cancel: Some(self.cancelled.clone()),
        };

        self.orchestrator.synthesize_streaming(&chunks, session).await
    }

    /// Synthesize `text` into one buffer without playing it
    pub async fn convert(
        &self,
        text: &str,
        max_chars: usize,
        on_progress: Option<ProgressFn<'_>>,
    ) -> SpeechResult<AudioData> {
        let (chunks, _) = self.prepare(text, max_chars)?;
        self.orchestrator.synthesize(&chunks, on_progress).await
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    /// Wait until every queued buffer has played or playback was stopped
    pub async fn wait_until_idle(&self) {
        let interval = Duration::from_millis(self.config.playback.poll_interval_ms);
        while self.engine.is_playing() {
            tokio::time::sleep(interval).await;
        }
    }

    /// Stop playback, discard queued audio, and end the running session so
    /// no later chunk is synthesized. The combined audio keeps everything
    /// queued so far.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.engine.stop();
    }

    /// Save the audio of the last session. The container follows the file
    /// extension, or `[audio] output_format` when the extension names none.
    pub fn save_combined(&self, path: impl AsRef<Path>) -> SpeechResult<()> {
        let audio = self.engine.get_combined_audio();
        if audio.is_empty() {
            return Err(SpeechError::IllegalState(
                "no audio has been generated yet".to_string(),
            ));
        }
        let path = path.as_ref();
        let format = ExportFormat::from_path_or(path, self.config.audio.output_format);
        export_audio(&audio, format, path)
    }
}
