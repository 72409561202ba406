use serde::Serialize;
use std::path::{Path, PathBuf};

use super::SwapConfig;
use super::io::{self, Encoder, Mp3Encoder, OutputFormat, WavEncoder};
use super::swapper::{self, SwapStats};
use super::tempo::TempoSpec;
use crate::error::BeatSwapError;

/// Summary of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bpm: f64,
    pub beats_per_bar: u32,
    /// The exchanged beats, 1-based.
    pub swapped_beats: (u32, u32),
    pub bar_ms: u64,
    pub beat_ms: u64,
    #[serde(flatten)]
    pub stats: SwapStats,
    pub input_duration_ms: u64,
    pub output_duration_ms: u64,
}

/// `output_<basename>.<extension>` for a source path.
pub fn output_file_name(source: &Path, extension: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "audio".to_string());
    format!("output_{}.{}", stem, extension)
}

fn check_source(source: &Path) -> Result<(), BeatSwapError> {
    if source.as_os_str().is_empty() {
        return Err(BeatSwapError::MissingInput);
    }
    Ok(())
}

/// Decode `source_path`, swap beats in every bar and return the encoded
/// result as MP3 bytes.
///
/// All tempo and swap validation happens before the file is opened.
pub fn swap_beats<P: AsRef<Path>>(
    source_path: P,
    bpm: f64,
    beats_per_bar: u32,
    swap_spec: &str,
) -> Result<Vec<u8>, BeatSwapError> {
    let source = source_path.as_ref();
    check_source(source)?;
    let spec = TempoSpec::new(bpm, beats_per_bar, swap_spec)?;

    let audio = io::decode_file(source)?;
    let (swapped, _) = swapper::process_spec(&audio, &spec);
    Mp3Encoder::default().encode(&swapped)
}

/// Run a full job with the configured output format.
pub fn run(config: SwapConfig) -> Result<SwapReport, BeatSwapError> {
    match config.format {
        OutputFormat::Mp3 => {
            let encoder = Mp3Encoder {
                kbps: config.mp3_kbps,
            };
            run_with_encoder(config, &encoder)
        }
        OutputFormat::Wav => {
            let encoder = WavEncoder {
                bits: config.wav_bits,
            };
            run_with_encoder(config, &encoder)
        }
    }
}

/// Run a full job: validate, decode, swap, optionally resample, encode and
/// write `output_<basename>.<ext>` into the output directory.
pub fn run_with_encoder(
    config: SwapConfig,
    encoder: &dyn Encoder,
) -> Result<SwapReport, BeatSwapError> {
    check_source(&config.source)?;
    let spec = TempoSpec::new(config.bpm, config.beats_per_bar, &config.swap_spec)?;
    let timing = spec.timing();

    log::info!(
        "swapping beats {:?} of {} at {} BPM ({} beats/bar)",
        spec.swap_one_based(),
        config.source.display(),
        spec.bpm,
        spec.beats_per_bar
    );

    let audio = io::decode_file(&config.source)?;
    let (swapped, stats) = swapper::process_spec(&audio, &spec);
    let input_duration_ms = audio.duration_ms();
    drop(audio);

    let swapped = match config.output_sample_rate {
        Some(rate) if rate != swapped.sample_rate() => io::resample(&swapped, rate)?,
        _ => swapped,
    };
    let output_duration_ms = swapped.duration_ms();

    let bytes = encoder.encode(&swapped)?;
    let file_name = output_file_name(&config.source, encoder.extension());
    let output = match &config.output_dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    };
    std::fs::write(&output, &bytes)
        .map_err(|e| BeatSwapError::EncodeFailure(format!("{}: {}", output.display(), e)))?;

    log::info!("wrote {} ({} bytes)", output.display(), bytes.len());

    Ok(SwapReport {
        input: config.source,
        output,
        bpm: spec.bpm,
        beats_per_bar: spec.beats_per_bar,
        swapped_beats: spec.swap_one_based(),
        bar_ms: timing.bar_ms,
        beat_ms: timing.beat_ms,
        stats,
        input_duration_ms,
        output_duration_ms,
    })
}
