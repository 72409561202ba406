use serde::Serialize;
use std::num::IntErrorKind;

use crate::error::BeatSwapError;

/// Millisecond lengths of one bar and one beat at a given tempo.
///
/// `bar_ms` and `beat_ms` are rounded independently from the same real-valued
/// beat length, so `bar_ms` is not always `beats_per_bar * beat_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeatTiming {
    pub bar_ms: u64,
    pub beat_ms: u64,
    pub beats_per_bar: u32,
}

impl BeatTiming {
    pub fn new(bpm: f64, beats_per_bar: u32) -> Result<Self, BeatSwapError> {
        let (bar_ms, beat_ms) = compute_durations(bpm, beats_per_bar)?;
        Ok(Self {
            bar_ms,
            beat_ms,
            beats_per_bar,
        })
    }

    /// Span covered by the nominal beats of one bar.
    pub fn beats_span_ms(&self) -> u64 {
        self.beat_ms.saturating_mul(self.beats_per_bar as u64)
    }
}

/// Convert tempo into `(bar_ms, beat_ms)`.
pub fn compute_durations(bpm: f64, beats_per_bar: u32) -> Result<(u64, u64), BeatSwapError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(BeatSwapError::InvalidTempo(format!(
            "BPM must be greater than 0, got {}",
            bpm
        )));
    }
    if beats_per_bar == 0 {
        return Err(BeatSwapError::InvalidTempo(
            "beats per bar must be greater than 0".to_string(),
        ));
    }

    let seconds_per_beat = 60.0 / bpm;
    let beat_ms = calculate_ms(seconds_per_beat)
        .ok_or_else(|| BeatSwapError::InvalidTempo(format!("BPM {} is too low", bpm)))?;
    let bar_ms = calculate_ms(beats_per_bar as f64 * seconds_per_beat)
        .ok_or_else(|| BeatSwapError::InvalidTempo(format!("BPM {} is too low", bpm)))?;

    if beat_ms == 0 {
        return Err(BeatSwapError::DegenerateBeat { bpm });
    }

    log::debug!(
        "{} BPM, {} beats/bar -> beat {} ms, bar {} ms",
        bpm,
        beats_per_bar,
        beat_ms,
        bar_ms
    );
    Ok((bar_ms, beat_ms))
}

fn calculate_ms(seconds: f64) -> Option<u64> {
    let ms = (seconds * 1000.0).round();
    (ms.is_finite() && ms < u64::MAX as f64).then_some(ms as u64)
}

/// Parse a swap pair such as `"2,4"` into 0-based indices.
///
/// Whitespace anywhere in the input is ignored. Range is checked before
/// duplication, so `"5,5"` with four beats reports the range.
pub fn parse_swap_indices(input: &str, total_beats: u32) -> Result<(u32, u32), BeatSwapError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let parts: Vec<&str> = compact.split(',').collect();
    if parts.len() != 2 {
        return Err(BeatSwapError::MalformedSwapSpec(format!(
            "expected two beats separated by a comma, got {:?}",
            input
        )));
    }

    let first = parse_beat(parts[0], total_beats)?;
    let second = parse_beat(parts[1], total_beats)?;

    if first == second {
        return Err(BeatSwapError::DuplicateSwapIndex { index: first });
    }

    Ok((first - 1, second - 1))
}

fn parse_beat(token: &str, total_beats: u32) -> Result<u32, BeatSwapError> {
    let value = match token.parse::<i64>() {
        Ok(v) => v,
        Err(e) => {
            return Err(match e.kind() {
                IntErrorKind::PosOverflow => BeatSwapError::SwapIndexOutOfRange {
                    index: i64::MAX,
                    total_beats,
                },
                IntErrorKind::NegOverflow => BeatSwapError::SwapIndexOutOfRange {
                    index: i64::MIN,
                    total_beats,
                },
                _ => BeatSwapError::MalformedSwapSpec(format!(
                    "{:?} is not a whole number",
                    token
                )),
            });
        }
    };

    if value < 1 || value > total_beats as i64 {
        return Err(BeatSwapError::SwapIndexOutOfRange {
            index: value,
            total_beats,
        });
    }
    Ok(value as u32)
}

/// Validated tempo description for one processing run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoSpec {
    pub bpm: f64,
    pub beats_per_bar: u32,
    /// 0-based beat positions to exchange.
    pub swap: (u32, u32),
    timing: BeatTiming,
}

impl TempoSpec {
    pub fn new(bpm: f64, beats_per_bar: u32, swap_spec: &str) -> Result<Self, BeatSwapError> {
        let timing = BeatTiming::new(bpm, beats_per_bar)?;
        let swap = parse_swap_indices(swap_spec, beats_per_bar)?;
        Ok(Self {
            bpm,
            beats_per_bar,
            swap,
            timing,
        })
    }

    /// Build from raw text fields as typed by a user.
    pub fn parse(bpm: &str, beats_per_bar: &str, swap_spec: &str) -> Result<Self, BeatSwapError> {
        let bpm_text = bpm.trim();
        if bpm_text.is_empty() {
            return Err(BeatSwapError::InvalidTempo("BPM is required".to_string()));
        }
        let bpm: f64 = bpm_text
            .parse()
            .map_err(|_| BeatSwapError::InvalidTempo(format!("{:?} is not a number", bpm_text)))?;

        let bpb_text = beats_per_bar.trim();
        if bpb_text.is_empty() {
            return Err(BeatSwapError::InvalidTempo(
                "beats per bar is required".to_string(),
            ));
        }
        let bpb: i64 = bpb_text.parse().map_err(|_| {
            BeatSwapError::InvalidTempo(format!("{:?} is not a whole number", bpb_text))
        })?;
        let bpb = u32::try_from(bpb)
            .ok()
            .filter(|&b| b > 0)
            .ok_or_else(|| {
                BeatSwapError::InvalidTempo(format!(
                    "beats per bar must be greater than 0, got {}",
                    bpb
                ))
            })?;

        if swap_spec.trim().is_empty() {
            return Err(BeatSwapError::MalformedSwapSpec(
                "swap beats are required".to_string(),
            ));
        }

        Self::new(bpm, bpb, swap_spec)
    }

    pub fn timing(&self) -> BeatTiming {
        self.timing
    }

    /// The swapped beats as the user numbers them (1-based).
    pub fn swap_one_based(&self) -> (u32, u32) {
        (self.swap.0 + 1, self.swap.1 + 1)
    }
}
