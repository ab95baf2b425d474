use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use narrator_speech::orchestrator::ProgressFn;
use narrator_speech::{
    Chunker, ExportFormat, Narrator, NarratorConfig, StreamingPlaybackEngine, SynthesisBackend,
    SynthesisHooks, TextNormalizer, estimate_reading_time, export_audio, load_text_file,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "narrator")]
#[command(about = "Narrator - Read long-form text aloud or convert it to audio", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to ~/.narrator/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a text file to a WAV or MP3 file
    Convert {
        /// Input text file
        input: PathBuf,

        /// Output audio file (.wav or .mp3; other names use the configured format)
        output: PathBuf,

        /// WAV clip of the voice to clone
        #[arg(long)]
        voice: Option<PathBuf>,

        /// Maximum characters per chunk
        #[arg(long, default_value_t = 2000)]
        chunk_size: usize,

        /// Language code
        #[arg(long)]
        language: Option<String>,
    },
    /// Read a text file aloud, playing audio as it is synthesized
    Speak {
        /// Input text file
        input: PathBuf,

        /// WAV clip of the voice to clone
        #[arg(long)]
        voice: Option<PathBuf>,

        /// Save the session audio to this file (.wav or .mp3)
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print the normalized text of a file
    Normalize {
        /// Input text file
        input: PathBuf,

        /// Apply the synthesis allow-list
        #[arg(long)]
        strict: bool,
    },
    /// Print the chunks a file would be synthesized in
    Chunk {
        /// Input text file
        input: PathBuf,

        /// Maximum characters per chunk (defaults to the configured size)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Check whether an audio output device is usable
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let config = match &cli.config {
        Some(path) => NarratorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => NarratorConfig::load_default().context("Failed to load default config")?,
    };

    match cli.command {
        Commands::Convert {
            input,
            output,
            voice,
            chunk_size,
            language,
        } => {
            let mut config = config;
            if let Some(language) = language {
                config.synthesis.language = language;
            }
            convert(config, &input, &output, voice.as_deref(), chunk_size).await?;
        }
        Commands::Speak { input, voice, save } => {
            speak(config, &input, voice.as_deref(), save.as_deref()).await?;
        }
        Commands::Normalize { input, strict } => normalize(&config, &input, strict)?,
        Commands::Chunk { input, chunk_size } => {
            let chunk_size = chunk_size.unwrap_or(config.synthesis.chunk_size);
            chunk(&config, &input, chunk_size)?;
        }
        Commands::Probe => probe(&config),
    }

    Ok(())
}

#[cfg(feature = "pocket-tts")]
fn create_backend() -> Result<Arc<dyn SynthesisBackend>> {
    use narrator_speech::providers::pocket_tts::{PocketTtsBackend, PocketTtsConfig};
    Ok(Arc::new(PocketTtsBackend::new(PocketTtsConfig::default())))
}

#[cfg(not(feature = "pocket-tts"))]
fn create_backend() -> Result<Arc<dyn SynthesisBackend>> {
    anyhow::bail!(
        "No synthesis backend available\nSuggestion: rebuild with `--features pocket-tts`"
    )
}

async fn create_narrator(config: NarratorConfig, voice: Option<&Path>) -> Result<Narrator> {
    let narrator = Narrator::new(config, create_backend()?)?;
    if let Some(voice) = voice {
        narrator.orchestrator().load_voice_file(voice)?;
    }
    log::info!("Loading synthesis model...");
    narrator
        .initialize()
        .await
        .context("Failed to initialize the synthesis backend")?;
    Ok(narrator)
}

async fn convert(
    config: NarratorConfig,
    input: &Path,
    output: &Path,
    voice: Option<&Path>,
    chunk_size: usize,
) -> Result<()> {
    let format = ExportFormat::from_path_or(output, config.audio.output_format);
    let text = load_text_file(input)?;
    println!(
        "Loaded {} characters (about {:.1} minutes of speech)",
        text.chars().count(),
        estimate_reading_time(&text, narrator_speech::text::DEFAULT_WORDS_PER_MINUTE)
    );

    let narrator = create_narrator(config, voice).await?;
    let progress: ProgressFn<'_> =
        Box::new(|done, total| println!("Progress: {}/{} chunks", done, total));
    let audio = narrator.convert(&text, chunk_size, Some(progress)).await?;

    export_audio(&audio, format, output)?;
    println!(
        "Saved {:.1} seconds of audio to {}",
        audio.duration().as_secs_f64(),
        output.display()
    );
    Ok(())
}

async fn speak(
    config: NarratorConfig,
    input: &Path,
    voice: Option<&Path>,
    save: Option<&Path>,
) -> Result<()> {
    let text = load_text_file(input)?;
    let narrator = create_narrator(config, voice).await?;
    if !narrator.engine().has_audio_device() {
        println!("No audio device available, playback will be simulated");
    }

    let session = async {
        let hooks = SynthesisHooks::new()
            .with_progress(|done, total| println!("Progress: {}/{} chunks", done, total));
        narrator.speak(&text, hooks).await?;
        narrator.wait_until_idle().await;
        Ok::<_, narrator_speech::SpeechError>(())
    };

    tokio::select! {
        result = session => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nStopping playback...");
            narrator.stop();
        }
    }

    if let Some(path) = save {
        narrator.save_combined(path)?;
        println!("Saved session audio to {}", path.display());
    }
    Ok(())
}

fn normalize(config: &NarratorConfig, input: &Path, strict: bool) -> Result<()> {
    let text = load_text_file(input)?;
    let normalizer = TextNormalizer::with_options(config.normalizer.clone());
    let (cleaned, report) = if strict {
        normalizer.normalize_strict(&text)
    } else {
        normalizer.normalize(&text)
    };

    println!("{}", cleaned);
    eprintln!();
    for step in &report.steps {
        eprintln!("- {}", step);
    }
    eprintln!(
        "{} -> {} characters ({:+}), {} emojis removed, {} special characters replaced",
        report.original_length,
        report.final_length,
        report.length_change(),
        report.emojis_removed,
        report.special_chars_replaced
    );
    if strict {
        eprintln!("{} unsupported characters removed", report.unsupported_chars_removed);
    }
    Ok(())
}

fn chunk(config: &NarratorConfig, input: &Path, chunk_size: usize) -> Result<()> {
    let text = load_text_file(input)?;
    let (normalized, _) = TextNormalizer::with_options(config.normalizer.clone()).normalize(&text);
    let chunks = Chunker::new(config.chunker.clone()).chunk(&normalized, chunk_size)?;

    for chunk in &chunks {
        println!(
            "[{}] ({} chars) {}",
            chunk.sequence_index,
            chunk.char_length(),
            chunk.text()
        );
    }
    println!(
        "\n{} chunks, estimated reading time {:.1} minutes",
        chunks.len(),
        estimate_reading_time(&normalized, narrator_speech::text::DEFAULT_WORDS_PER_MINUTE)
    );
    Ok(())
}

fn probe(config: &NarratorConfig) {
    let engine = StreamingPlaybackEngine::new(config.playback_config().with_probe(true));
    if engine.has_audio_device() {
        println!("Audio output device available");
    } else {
        println!("No usable audio output device, playback will be simulated");
    }
}
