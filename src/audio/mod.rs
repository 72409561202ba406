pub mod buffer;
pub mod io;
pub mod job;
pub mod swapper;
pub mod tempo;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use buffer::AudioBuffer;
pub use io::{
    Encoder, Mp3Encoder, OutputFormat, WavBits, WavEncoder, decode_file, encode_mp3, encode_wav,
};
pub use job::{SwapReport, output_file_name, run, swap_beats};
pub use swapper::{SwapStats, process};
pub use tempo::{BeatTiming, TempoSpec, compute_durations, parse_swap_indices};

/// Everything one run needs, passed by value into [`run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapConfig {
    pub source: PathBuf,
    pub bpm: f64,
    pub beats_per_bar: u32,
    /// Two 1-based beats separated by a comma, e.g. `"2,4"`.
    pub swap_spec: String,
    /// Where the result is written; the working directory when unset.
    pub output_dir: Option<PathBuf>,
    /// Resample the result to this rate before writing.
    pub output_sample_rate: Option<u32>,
    pub format: OutputFormat,
    /// Constant bitrate for MP3 output.
    pub mp3_kbps: u16,
    /// Sample encoding for WAV output.
    pub wav_bits: WavBits,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            bpm: 120.0,
            beats_per_bar: 4,
            swap_spec: "2,4".to_string(),
            output_dir: None,
            output_sample_rate: None,
            format: OutputFormat::Mp3,
            mp3_kbps: io::DEFAULT_MP3_KBPS,
            wav_bits: WavBits::Float32,
        }
    }
}
