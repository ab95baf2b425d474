use crate::{AudioData, DeviceError};

/// A buffer currently playing on an output device
pub trait PlaybackHandle {
    /// True until the device has played every sample
    fn is_playing(&self) -> bool;

    /// Stop playback early
    fn stop(&mut self);
}

/// Low-level audio output.
///
/// `submit` may fail at any time, including after earlier submissions
/// succeeded.
pub trait AudioSink: Send + Sync {
    fn submit(&self, audio: &AudioData) -> Result<Box<dyn PlaybackHandle>, DeviceError>;
}

#[cfg(feature = "playback")]
pub use rodio_sink::RodioSink;

#[cfg(feature = "playback")]
mod rodio_sink {
    use super::{AudioSink, PlaybackHandle};
    use crate::{AudioData, DeviceError};
    use rodio::{OutputStream, OutputStreamBuilder, Sink};

    /// Default system output through rodio
    ///
    /// A stream is opened per submission so a device that disappears and
    /// comes back mid-session is picked up again on the next buffer.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RodioSink;

    impl RodioSink {
        pub fn new() -> Self {
            Self
        }
    }

    struct RodioPlayback {
        _stream: OutputStream,
        sink: Sink,
    }

    impl PlaybackHandle for RodioPlayback {
        fn is_playing(&self) -> bool {
            !self.sink.empty()
        }

        fn stop(&mut self) {
            self.sink.stop();
        }
    }

    impl AudioSink for RodioSink {
        fn submit(&self, audio: &AudioData) -> Result<Box<dyn PlaybackHandle>, DeviceError> {
            let stream = OutputStreamBuilder::open_default_stream()
                .map_err(|_| DeviceError::NoOutputDevice)?;
            let sink = Sink::connect_new(stream.mixer());

            let channels = u16::try_from(audio.channels.max(1))
                .map_err(|_| DeviceError::Submit(format!("unsupported channel count {}", audio.channels)))?;
            let source =
                rodio::buffer::SamplesBuffer::new(channels, audio.sample_rate, audio.samples.clone());
            sink.append(source);

            Ok(Box::new(RodioPlayback {
                _stream: stream,
                sink,
            }))
        }
    }
}
