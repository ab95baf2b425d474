//! One-shot output device check

use super::sink::AudioSink;
use crate::AudioData;

/// Length of the silent buffer submitted by [`probe_device`]
pub const PROBE_DURATION_MS: u64 = 100;

/// Check whether `sink` can play audio right now.
///
/// Submits a short silent buffer and stops it immediately. Any device
/// error means no usable device.
pub fn probe_device(sink: &dyn AudioSink, sample_rate: u32) -> bool {
    let silence = AudioData::silent(PROBE_DURATION_MS, sample_rate);
    match sink.submit(&silence) {
        Ok(mut handle) => {
            handle.stop();
            log::info!("Audio output device available");
            true
        }
        Err(e) => {
            log::info!("No usable audio output device ({}), playback will be simulated", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceError;
    use crate::playback::sink::PlaybackHandle;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StopFlag(Arc<AtomicBool>);

    impl PlaybackHandle for StopFlag {
        fn is_playing(&self) -> bool {
            !self.0.load(Ordering::SeqCst)
        }

        fn stop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CountingSink {
        submitted_samples: AtomicUsize,
        stopped: Arc<AtomicBool>,
    }

    impl AudioSink for CountingSink {
        fn submit(&self, audio: &AudioData) -> Result<Box<dyn PlaybackHandle>, DeviceError> {
            self.submitted_samples
                .store(audio.samples.len(), Ordering::SeqCst);
            Ok(Box::new(StopFlag(self.stopped.clone())))
        }
    }

    struct NoDevice;

    impl AudioSink for NoDevice {
        fn submit(&self, _audio: &AudioData) -> Result<Box<dyn PlaybackHandle>, DeviceError> {
            Err(DeviceError::NoOutputDevice)
        }
    }

    #[test]
    fn test_probe_plays_and_stops_silence() {
        let sink = CountingSink::default();
        assert!(probe_device(&sink, 22_050));
        assert_eq!(sink.submitted_samples.load(Ordering::SeqCst), 2205);
        assert!(sink.stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_probe_reports_missing_device() {
        assert!(!probe_device(&NoDevice, 22_050));
    }

    #[test]
    #[ignore = "requires an audio output device"]
    #[cfg(feature = "playback")]
    fn test_probe_default_device() {
        assert!(probe_device(&crate::playback::RodioSink::new(), 22_050));
    }
}
