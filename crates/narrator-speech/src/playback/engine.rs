//! Streaming playback engine
//!
//! Buffers are queued by the producer (the synthesis loop) and played in
//! arrival order by a dedicated worker thread. The worker lives for one
//! session: it is started by the first `enqueue` and retires once the
//! queue has stayed empty for `queue_timeout`. Without a usable device the
//! worker simulates playback by waiting out each buffer's duration.
//!
//! ```text
//! enqueue ──► mpsc queue ──► worker ──► AudioSink (or simulated wait)
//!    │
//!    └──► combined audio
//! ```

use super::probe::probe_device;
use super::sink::AudioSink;
use crate::{AudioData, DeviceError, PlaybackState, SpeechError, SpeechResult};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timing knobs for the playback worker
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// How often device status and the stop flag are checked while a
    /// buffer plays
    pub poll_interval: Duration,
    /// How long an idle worker waits for the next buffer before retiring
    pub queue_timeout: Duration,
    /// Upper bound on how long `stop` waits for the worker
    pub stop_timeout: Duration,
    /// Sample rate of the probe buffer and of an empty combined buffer
    pub sample_rate: u32,
    /// Probe the sink at construction; when false the sink is trusted
    pub probe_device: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            queue_timeout: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(2),
            sample_rate: 22_050,
            probe_device: true,
        }
    }
}

impl PlaybackConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_probe(mut self, probe_device: bool) -> Self {
        self.probe_device = probe_device;
        self
    }
}

fn state_to_u8(state: PlaybackState) -> u8 {
    match state {
        PlaybackState::Idle => 0,
        PlaybackState::Playing => 1,
        PlaybackState::Simulating => 2,
        PlaybackState::Stopped => 3,
    }
}

fn state_from_u8(value: u8) -> PlaybackState {
    match value {
        1 => PlaybackState::Playing,
        2 => PlaybackState::Simulating,
        3 => PlaybackState::Stopped,
        _ => PlaybackState::Idle,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the running worker of the current session
struct Worker {
    id: u64,
    sender: mpsc::Sender<AudioData>,
    cancel: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

struct Shared {
    sink: Option<Arc<dyn AudioSink>>,
    config: PlaybackConfig,
    state: AtomicU8,
    buffers_played: AtomicUsize,
    combined: Mutex<AudioData>,
    worker: Mutex<Option<Worker>>,
    next_worker_id: AtomicU64,
    shut_down: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: PlaybackState) {
        self.state.store(state_to_u8(state), Ordering::SeqCst);
    }

    /// State change made by a worker. A cancelled worker may outlive `stop`
    /// when detached and must not overwrite `Stopped`.
    fn report(&self, state: PlaybackState, cancel: &AtomicBool) {
        if !cancel.load(Ordering::SeqCst) {
            self.set_state(state);
        }
    }

    fn run_worker(
        &self,
        id: u64,
        queue: mpsc::Receiver<AudioData>,
        cancel: Arc<AtomicBool>,
        done: mpsc::Sender<()>,
    ) {
        log::debug!("Playback worker {} started", id);
        loop {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            let audio = match queue.recv_timeout(self.config.queue_timeout) {
                Ok(audio) => audio,
                Err(RecvTimeoutError::Timeout) => match self.retire_if_idle(id, &queue) {
                    Some(audio) => audio,
                    None => break,
                },
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            self.play(&audio, &cancel);
        }

        let discarded = queue.try_iter().count();
        if discarded > 0 {
            log::warn!("Discarded {} queued buffer(s) after stop", discarded);
        }
        log::debug!("Playback worker {} finished", id);
        let _ = done.send(());
    }

    /// Called when the queue has been empty for `queue_timeout`. Clears
    /// the worker slot unless a buffer slipped in meanwhile, in which case
    /// it is returned for playback.
    fn retire_if_idle(&self, id: u64, queue: &mpsc::Receiver<AudioData>) -> Option<AudioData> {
        let mut slot = lock(&self.worker);
        if let Ok(audio) = queue.try_recv() {
            return Some(audio);
        }
        if slot.as_ref().is_some_and(|worker| worker.id == id) {
            *slot = None;
            self.set_state(PlaybackState::Idle);
            log::debug!("Playback queue drained, session idle");
        }
        None
    }

    fn play(&self, audio: &AudioData, cancel: &AtomicBool) {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        match &self.sink {
            Some(sink) => {
                if let Err(e) = self.play_on_device(sink.as_ref(), audio, cancel) {
                    if cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    log::warn!("Audio device failed ({}), simulating playback instead", e);
                    self.simulate(audio, cancel);
                }
            }
            None => self.simulate(audio, cancel),
        }
        if !cancel.load(Ordering::SeqCst) {
            self.buffers_played.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn play_on_device(
        &self,
        sink: &dyn AudioSink,
        audio: &AudioData,
        cancel: &AtomicBool,
    ) -> Result<(), DeviceError> {
        let mut handle = sink.submit(audio)?;
        self.report(PlaybackState::Playing, cancel);
        while handle.is_playing() {
            if cancel.load(Ordering::SeqCst) {
                handle.stop();
                return Ok(());
            }
            thread::sleep(self.config.poll_interval);
        }
        Ok(())
    }

    fn simulate(&self, audio: &AudioData, cancel: &AtomicBool) {
        self.report(PlaybackState::Simulating, cancel);
        log::info!("Simulating playback of {} ms of audio", audio.duration_ms());

        let deadline = Instant::now() + audio.duration();
        loop {
            if cancel.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep(self.config.poll_interval.min(deadline - now));
        }
    }
}

/// Plays audio buffers in order while the producer keeps synthesizing
pub struct StreamingPlaybackEngine {
    shared: Arc<Shared>,
    has_device: bool,
}

impl StreamingPlaybackEngine {
    /// Engine on the default output device when the `playback` feature is
    /// enabled, simulated playback otherwise
    pub fn new(config: PlaybackConfig) -> Self {
        #[cfg(feature = "playback")]
        let engine = Self::with_sink(Arc::new(super::sink::RodioSink::new()), config);
        #[cfg(not(feature = "playback"))]
        let engine = Self::without_device(config);
        engine
    }

    /// Engine playing through `sink`. The sink is probed once here and the
    /// result kept for the engine's lifetime.
    pub fn with_sink(sink: Arc<dyn AudioSink>, config: PlaybackConfig) -> Self {
        let usable = !config.probe_device || probe_device(sink.as_ref(), config.sample_rate);
        Self::build(usable.then_some(sink), config)
    }

    /// Engine that always simulates playback
    pub fn without_device(config: PlaybackConfig) -> Self {
        Self::build(None, config)
    }

    fn build(sink: Option<Arc<dyn AudioSink>>, config: PlaybackConfig) -> Self {
        let has_device = sink.is_some();
        let combined = AudioData::empty(config.sample_rate);
        Self {
            shared: Arc::new(Shared {
                sink,
                config,
                state: AtomicU8::new(state_to_u8(PlaybackState::Idle)),
                buffers_played: AtomicUsize::new(0),
                combined: Mutex::new(combined),
                worker: Mutex::new(None),
                next_worker_id: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
            has_device,
        }
    }

    /// Queue a buffer for playback and add it to the combined audio.
    ///
    /// Never waits for playback; starts a worker if none is running.
    pub fn enqueue(&self, audio: AudioData) -> SpeechResult<()> {
        if self.shared.shut_down.load(Ordering::SeqCst) {
            return Err(SpeechError::IllegalState(
                "cannot enqueue audio after the playback engine was shut down".to_string(),
            ));
        }

        lock(&self.shared.combined).append(&audio);

        let mut slot = lock(&self.shared.worker);
        let audio = match slot.as_ref() {
            Some(worker) => match worker.sender.send(audio) {
                Ok(()) => return Ok(()),
                // Worker died without clearing its slot
                Err(mpsc::SendError(audio)) => audio,
            },
            None => audio,
        };
        *slot = Some(self.spawn_worker(audio)?);
        Ok(())
    }

    fn spawn_worker(&self, first: AudioData) -> SpeechResult<Worker> {
        let id = self.shared.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let (sender, queue) = mpsc::channel();
        let (done_tx, done) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        // Cannot fail: the receiver is alive
        let _ = sender.send(first);

        let shared = self.shared.clone();
        let worker_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("narrator-playback-{}", id))
            .spawn(move || shared.run_worker(id, queue, worker_cancel, done_tx))
            .map_err(|e| SpeechError::io(e, "spawning playback worker"))?;

        Ok(Worker {
            id,
            sender,
            cancel,
            done,
            handle,
        })
    }

    /// Cancel the session: the current buffer stops, queued buffers are
    /// discarded, and the worker is joined for at most `stop_timeout`.
    pub fn stop(&self) {
        let Some(worker) = lock(&self.shared.worker).take() else {
            return;
        };
        let Worker {
            id,
            sender,
            cancel,
            done,
            handle,
        } = worker;

        cancel.store(true, Ordering::SeqCst);
        drop(sender);

        match done.recv_timeout(self.shared.config.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    log::warn!("Playback worker {} panicked", id);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Playback worker {} did not stop within {:?}, detaching it",
                    id,
                    self.shared.config.stop_timeout
                );
            }
        }

        self.shared.set_state(PlaybackState::Stopped);
        log::info!("Playback stopped");
    }

    /// Stop playback and refuse further buffers
    pub fn shutdown(&self) {
        self.shared.shut_down.store(true, Ordering::SeqCst);
        self.stop();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::SeqCst)
    }

    /// True while a worker is running.
    ///
    /// The worker retires once the queue has stayed empty for
    /// `queue_timeout`. When the producer is slower than playback, this
    /// turns false between buffers of one speak session and true again on
    /// the next `enqueue`.
    pub fn is_playing(&self) -> bool {
        lock(&self.shared.worker).is_some()
    }

    pub fn state(&self) -> PlaybackState {
        state_from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Whether the probe found a usable output device
    pub fn has_audio_device(&self) -> bool {
        self.has_device
    }

    /// Buffers played to completion since the engine was created
    pub fn buffers_played(&self) -> usize {
        self.shared.buffers_played.load(Ordering::SeqCst)
    }

    /// Everything enqueued since the last [`clear_combined_audio`](Self::clear_combined_audio),
    /// whether or not it has been played yet
    pub fn get_combined_audio(&self) -> AudioData {
        lock(&self.shared.combined).clone()
    }

    pub fn clear_combined_audio(&self) {
        *lock(&self.shared.combined) = AudioData::empty(self.shared.config.sample_rate);
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.shared.config
    }
}

impl Drop for StreamingPlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
