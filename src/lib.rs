pub mod audio;
pub mod error;

pub use audio::{AudioBuffer, SwapConfig, SwapReport, TempoSpec, run, swap_beats};
pub use error::{BeatSwapError, ErrorKind};
