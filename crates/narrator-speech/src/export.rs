//! Writing audio to WAV or MP3 containers

use crate::{AudioData, SpeechError, SpeechResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Supported output containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Wav,
    Mp3,
}

impl ExportFormat {
    /// MP3 when the path ends in `.mp3`, WAV otherwise
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_path_or(path, Self::Wav)
    }

    /// Format named by the path's extension, `fallback` when the path has
    /// no `.wav` or `.mp3` extension
    pub fn from_path_or(path: impl AsRef<Path>, fallback: Self) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or(fallback)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            other => Err(SpeechError::Configuration(format!(
                "unsupported audio format '{}', expected wav or mp3",
                other
            ))),
        }
    }
}

/// Write `audio` to `path` in the given container
pub fn export_audio(
    audio: &AudioData,
    format: ExportFormat,
    path: impl AsRef<Path>,
) -> SpeechResult<()> {
    let path = path.as_ref();
    match format {
        ExportFormat::Wav => write_wav(audio, path)?,
        ExportFormat::Mp3 => write_mp3(audio, path)?,
    }
    log::info!(
        "Saved {} ms of audio to {} ({})",
        audio.duration_ms(),
        path.display(),
        format
    );
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn write_wav(audio: &AudioData, path: &Path) -> SpeechResult<()> {
    let spec = hound::WavSpec {
        channels: u16::try_from(audio.channels.max(1))
            .map_err(|_| SpeechError::Export(format!("too many channels: {}", audio.channels)))?,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let export_err = |e: hound::Error| SpeechError::Export(format!("{}: {}", path.display(), e));
    let mut writer = hound::WavWriter::create(path, spec).map_err(export_err)?;
    for &sample in &audio.samples {
        writer.write_sample(to_i16(sample)).map_err(export_err)?;
    }
    writer.finalize().map_err(export_err)
}

#[cfg(feature = "mp3")]
fn write_mp3(audio: &AudioData, path: &Path) -> SpeechResult<()> {
    use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};

    let channels = match audio.channels {
        1 | 2 => audio.channels as u8,
        n => {
            return Err(SpeechError::Export(format!(
                "MP3 export supports mono or stereo audio, got {} channels",
                n
            )));
        }
    };

    let mut builder = Builder::new()
        .ok_or_else(|| SpeechError::Export("failed to create LAME encoder".to_string()))?;
    builder
        .set_num_channels(channels)
        .map_err(|e| SpeechError::Export(format!("channels: {:?}", e)))?;
    builder
        .set_sample_rate(audio.sample_rate)
        .map_err(|e| SpeechError::Export(format!("sample rate: {:?}", e)))?;
    builder
        .set_brate(Bitrate::Kbps192)
        .map_err(|e| SpeechError::Export(format!("bitrate: {:?}", e)))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| SpeechError::Export(format!("quality: {:?}", e)))?;
    let mut encoder = builder
        .build()
        .map_err(|e| SpeechError::Export(format!("encoder init: {:?}", e)))?;

    let pcm: Vec<i16> = audio.samples.iter().copied().map(to_i16).collect();
    let mut mp3 = Vec::new();
    let encoded = if channels == 1 {
        encoder.encode_to_vec(MonoPcm(&pcm), &mut mp3)
    } else {
        encoder.encode_to_vec(InterleavedPcm(&pcm), &mut mp3)
    };
    encoded.map_err(|e| SpeechError::Export(format!("encoding: {:?}", e)))?;
    encoder
        .flush_to_vec::<FlushNoGap>(&mut mp3)
        .map_err(|e| SpeechError::Export(format!("flush: {:?}", e)))?;

    std::fs::write(path, mp3)
        .map_err(|e| SpeechError::io(e, format!("writing {}", path.display())))
}

#[cfg(not(feature = "mp3"))]
fn write_mp3(_audio: &AudioData, _path: &Path) -> SpeechResult<()> {
    Err(SpeechError::Configuration(
        "MP3 export is not available\nSuggestion: build with the 'mp3' feature enabled"
            .to_string(),
    ))
}

/// Read a WAV file into normalized f32 samples
pub fn load_wav(path: impl AsRef<Path>) -> SpeechResult<AudioData> {
    let path = path.as_ref();
    let read_err = |e: hound::Error| match e {
        hound::Error::IoError(source) => SpeechError::io(source, format!("reading {}", path.display())),
        other => SpeechError::Configuration(format!("invalid WAV file {}: {}", path.display(), other)),
    };

    let mut reader = hound::WavReader::open(path).map_err(read_err)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                .collect::<Result<_, _>>()
                .map_err(read_err)?,
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
                .collect::<Result<_, _>>()
                .map_err(read_err)?,
            bits => {
                return Err(SpeechError::Configuration(format!(
                    "unsupported WAV bit depth: {bits}"
                )));
            }
        },
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(read_err)?,
    };

    Ok(AudioData::new(samples, spec.channels as usize, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone() -> AudioData {
        let samples = (0..2400)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        AudioData::new(samples, 1, 24_000)
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("wav".parse::<ExportFormat>().unwrap(), ExportFormat::Wav);
        assert_eq!(" MP3 ".parse::<ExportFormat>().unwrap(), ExportFormat::Mp3);
        assert!(matches!(
            "ogg".parse::<ExportFormat>(),
            Err(SpeechError::Configuration(_))
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path("book.mp3"), ExportFormat::Mp3);
        assert_eq!(ExportFormat::from_path("book.MP3"), ExportFormat::Mp3);
        assert_eq!(ExportFormat::from_path("book.wav"), ExportFormat::Wav);
        assert_eq!(ExportFormat::from_path("book"), ExportFormat::Wav);
    }

    #[test]
    fn test_format_fallback_for_unknown_extension() {
        let mp3 = ExportFormat::Mp3;
        assert_eq!(ExportFormat::from_path_or("book", mp3), ExportFormat::Mp3);
        assert_eq!(ExportFormat::from_path_or("book.audio", mp3), ExportFormat::Mp3);
        assert_eq!(ExportFormat::from_path_or("book.WAV", mp3), ExportFormat::Wav);
        assert_eq!(
            ExportFormat::from_path_or("book.mp3", ExportFormat::Wav),
            ExportFormat::Mp3
        );
    }

    #[test]
    fn test_wav_export_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let audio = tone();

        export_audio(&audio, ExportFormat::Wav, &path).unwrap();
        let loaded = load_wav(&path).unwrap();

        assert_eq!(loaded.sample_rate, 24_000);
        assert_eq!(loaded.channels, 1);
        assert_eq!(loaded.samples.len(), audio.samples.len());
        for (a, b) in audio.samples.iter().zip(&loaded.samples) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_load_missing_wav() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_wav(dir.path().join("nope.wav")).unwrap_err();
        assert!(matches!(err, SpeechError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wav file").unwrap();
        assert!(matches!(load_wav(&path), Err(SpeechError::Configuration(_))));
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn test_mp3_export_writes_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp3");

        export_audio(&tone(), ExportFormat::Mp3, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // 100 ms of audio spans several frames, each opening with a sync word
        assert!(bytes.len() > 100);
        assert!(bytes.windows(2).any(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0));
    }

    #[cfg(not(feature = "mp3"))]
    #[test]
    fn test_mp3_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_audio(&tone(), ExportFormat::Mp3, dir.path().join("out.mp3")).unwrap_err();
        assert!(matches!(err, SpeechError::Configuration(_)));
    }
}
