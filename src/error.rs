//! Error types for beat swapping.

use std::fmt;

/// Fieldless discriminant of [`BeatSwapError`], for callers that branch on
/// the failure kind rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidTempo,
    DegenerateBeat,
    MalformedSwapSpec,
    SwapIndexOutOfRange,
    DuplicateSwapIndex,
    MissingInput,
    InvalidFormat,
    DecodeFailure,
    EncodeFailure,
}

/// Errors that can occur while validating input or swapping beats.
#[derive(Debug, Clone, PartialEq)]
pub enum BeatSwapError {
    /// BPM or beats-per-bar is not a strictly positive number.
    InvalidTempo(String),
    /// Beat duration rounds to zero milliseconds.
    DegenerateBeat { bpm: f64 },
    /// Swap input is not exactly two comma-separated integers.
    MalformedSwapSpec(String),
    /// A 1-based swap index lies outside `[1, total_beats]`.
    SwapIndexOutOfRange { index: i64, total_beats: u32 },
    /// Both swap indices name the same beat.
    DuplicateSwapIndex { index: u32 },
    /// No source file was supplied.
    MissingInput,
    /// Buffer parameters are inconsistent (channels, sample rate, length).
    InvalidFormat(String),
    /// The codec collaborator could not decode the source.
    DecodeFailure(String),
    /// The codec collaborator could not encode or write the result.
    EncodeFailure(String),
}

impl BeatSwapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BeatSwapError::InvalidTempo(_) => ErrorKind::InvalidTempo,
            BeatSwapError::DegenerateBeat { .. } => ErrorKind::DegenerateBeat,
            BeatSwapError::MalformedSwapSpec(_) => ErrorKind::MalformedSwapSpec,
            BeatSwapError::SwapIndexOutOfRange { .. } => ErrorKind::SwapIndexOutOfRange,
            BeatSwapError::DuplicateSwapIndex { .. } => ErrorKind::DuplicateSwapIndex,
            BeatSwapError::MissingInput => ErrorKind::MissingInput,
            BeatSwapError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            BeatSwapError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            BeatSwapError::EncodeFailure(_) => ErrorKind::EncodeFailure,
        }
    }

    /// True for failures detected before any audio is touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidTempo
                | ErrorKind::DegenerateBeat
                | ErrorKind::MalformedSwapSpec
                | ErrorKind::SwapIndexOutOfRange
                | ErrorKind::DuplicateSwapIndex
                | ErrorKind::MissingInput
        )
    }
}

impl fmt::Display for BeatSwapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeatSwapError::InvalidTempo(msg) => write!(f, "invalid tempo: {}", msg),
            BeatSwapError::DegenerateBeat { bpm } => write!(
                f,
                "BPM {} is too high: one beat rounds to 0 ms",
                bpm
            ),
            BeatSwapError::MalformedSwapSpec(msg) => {
                write!(f, "malformed swap beats: {}", msg)
            }
            BeatSwapError::SwapIndexOutOfRange { index, total_beats } => write!(
                f,
                "beat {} is out of range: beats must be between 1 and {}",
                index, total_beats
            ),
            BeatSwapError::DuplicateSwapIndex { index } => write!(
                f,
                "cannot swap beat {} with itself: the two beats must differ",
                index
            ),
            BeatSwapError::MissingInput => write!(f, "no input file selected"),
            BeatSwapError::InvalidFormat(msg) => write!(f, "invalid audio format: {}", msg),
            BeatSwapError::DecodeFailure(msg) => write!(f, "decode failed: {}", msg),
            BeatSwapError::EncodeFailure(msg) => write!(f, "encode failed: {}", msg),
        }
    }
}

impl std::error::Error for BeatSwapError {}

impl From<hound::Error> for BeatSwapError {
    fn from(err: hound::Error) -> Self {
        BeatSwapError::EncodeFailure(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for BeatSwapError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        BeatSwapError::DecodeFailure(err.to_string())
    }
}
