//! Per-bar beat exchange over a decoded timeline.
//!
//! Bars and beats are never materialized as buffers: each bar is described by
//! frame ranges into the source, the swap reorders those ranges, and samples
//! are copied exactly once into the output.

use std::ops::Range;

use serde::Serialize;

use super::buffer::AudioBuffer;
use super::tempo::{BeatTiming, TempoSpec};

/// Counters from one pass over a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SwapStats {
    /// Bars visited, including a trailing partial bar.
    pub bars: usize,
    /// Bars subdivided into beats and swapped.
    pub bars_swapped: usize,
    /// Bars shorter than one beat, copied through untouched.
    pub bars_passed_through: usize,
}

/// Swap beats `idx1` and `idx2` (0-based) in every bar of `audio`.
///
/// The result always has exactly as many frames as the input.
pub fn process(
    audio: &AudioBuffer,
    bar_ms: u64,
    beat_ms: u64,
    beats_per_bar: u32,
    idx1: u32,
    idx2: u32,
) -> AudioBuffer {
    let timing = BeatTiming {
        bar_ms,
        beat_ms,
        beats_per_bar,
    };
    process_with_stats(audio, timing, idx1, idx2).0
}

/// Run [`process_with_stats`] with the timing and swap pair of a validated spec.
pub fn process_spec(audio: &AudioBuffer, spec: &TempoSpec) -> (AudioBuffer, SwapStats) {
    process_with_stats(audio, spec.timing(), spec.swap.0, spec.swap.1)
}

pub fn process_with_stats(
    audio: &AudioBuffer,
    timing: BeatTiming,
    idx1: u32,
    idx2: u32,
) -> (AudioBuffer, SwapStats) {
    let mut stats = SwapStats::default();

    if timing.bar_ms == 0
        || timing.beat_ms == 0
        || idx1 >= timing.beats_per_bar
        || idx2 >= timing.beats_per_bar
    {
        log::warn!("unusable timing {:?} for beats {}/{}, copying input", timing, idx1, idx2);
        return (audio.clone(), stats);
    }

    let total_frames = audio.num_frames();
    let rate = audio.sample_rate();
    let mut output = Vec::with_capacity(audio.samples().len());
    let mut beats: Vec<Range<usize>> = Vec::new();
    let mut bar_index: u64 = 0;

    loop {
        let bar_start_ms = bar_index.saturating_mul(timing.bar_ms);
        let bar_start = audio.frame_at_ms(bar_start_ms);
        if bar_start >= total_frames {
            break;
        }
        let bar_end = audio.frame_at_ms(bar_start_ms.saturating_add(timing.bar_ms));
        let bar_len = bar_end - bar_start;
        stats.bars += 1;

        if bar_len < ms_to_frames(timing.beat_ms, rate) {
            output.extend_from_slice(audio.frames(bar_start..bar_end));
            stats.bars_passed_through += 1;
            log::trace!("bar {} ({} frames) passed through", bar_index, bar_len);
        } else {
            split_bar(bar_len, rate, timing, idx1.max(idx2) as usize + 1, &mut beats);
            beats.swap(idx1 as usize, idx2 as usize);

            for beat in &beats {
                output.extend_from_slice(
                    audio.frames(bar_start + beat.start..bar_start + beat.end),
                );
            }
            // Independent rounding can leave a bar longer than its beats.
            let covered = ms_to_frames(timing.beats_span_ms(), rate).min(bar_len);
            output.extend_from_slice(audio.frames(bar_start + covered..bar_end));
            stats.bars_swapped += 1;
        }

        bar_index += 1;
    }

    log::debug!(
        "swapped beats {} and {} in {} of {} bars ({} passed through)",
        idx1 + 1,
        idx2 + 1,
        stats.bars_swapped,
        stats.bars,
        stats.bars_passed_through
    );

    (audio.with_samples(output), stats)
}

/// Fill `beats` with bar-relative frame ranges, one per beat position.
///
/// Positions past the end of the bar are empty ranges; only as many are
/// materialized as needed to cover the bar and reach `min_positions`.
fn split_bar(
    bar_len: usize,
    rate: u32,
    timing: BeatTiming,
    min_positions: usize,
    beats: &mut Vec<Range<usize>>,
) {
    beats.clear();
    for i in 0..timing.beats_per_bar as u64 {
        let start = ms_to_frames(i.saturating_mul(timing.beat_ms), rate).min(bar_len);
        if start >= bar_len && beats.len() >= min_positions {
            break;
        }
        let end = ms_to_frames((i + 1).saturating_mul(timing.beat_ms), rate).min(bar_len);
        beats.push(start..end);
    }
}

fn ms_to_frames(ms: u64, rate: u32) -> usize {
    let frames = ms as u128 * rate as u128 / 1000;
    frames.min(usize::MAX as u128) as usize
}
