use anyhow::{Context, Result};
use beatswap::audio::io::DEFAULT_MP3_KBPS;
use beatswap::audio::{OutputFormat, WavBits};
use beatswap::{SwapConfig, TempoSpec};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Swap two beats inside every bar of an audio track.
///
/// The track is cut into bars of the given tempo, each bar into equal beats,
/// and the two chosen beats trade places. The result keeps the input's
/// length and is written as output_<name>.mp3 (or .wav).
#[derive(Debug, Parser)]
#[command(name = "beatswap", version, about, long_about = None)]
struct Cli {
    /// Source audio file (MP3, MP4/AAC, WAV, FLAC, OGG)
    input: PathBuf,

    /// Tempo in beats per minute, e.g. 120
    #[arg(long)]
    bpm: String,

    /// Beats in one bar
    #[arg(long, short = 'b', default_value = "4")]
    beats_per_bar: String,

    /// Two beats to exchange, comma separated (1-based)
    #[arg(long, short = 's', default_value = "2,4")]
    swap: String,

    /// Directory for the output file [default: current directory]
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Output container
    #[arg(long, value_enum, default_value_t = Format::Mp3)]
    format: Format,

    /// MP3 bitrate in kbps (64, 96, 128, 160, 192, 256 or 320)
    #[arg(long, default_value_t = DEFAULT_MP3_KBPS)]
    bitrate: u16,

    /// Resample the result to this rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Write 16-bit PCM instead of 32-bit float (WAV output)
    #[arg(long)]
    pcm16: bool,

    /// Print a JSON report instead of the output path
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Mp3,
    Wav,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Validate the raw fields before touching any audio
    let tempo = TempoSpec::parse(&cli.bpm, &cli.beats_per_bar, &cli.swap)?;

    let config = SwapConfig {
        source: cli.input,
        bpm: tempo.bpm,
        beats_per_bar: tempo.beats_per_bar,
        swap_spec: cli.swap,
        output_dir: cli.output_dir,
        output_sample_rate: cli.sample_rate,
        format: match cli.format {
            Format::Mp3 => OutputFormat::Mp3,
            Format::Wav => OutputFormat::Wav,
        },
        mp3_kbps: cli.bitrate,
        wav_bits: if cli.pcm16 {
            WavBits::Pcm16
        } else {
            WavBits::Float32
        },
    };

    let source = config.source.display().to_string();
    let report = beatswap::run(config).with_context(|| format!("processing {} failed", source))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Saved as: {}", report.output.display());
    }
    Ok(())
}
