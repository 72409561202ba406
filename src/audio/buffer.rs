use std::ops::Range;

use crate::error::BeatSwapError;

/// Decoded audio held in memory as interleaved `f32` samples.
///
/// For mono audio, samples are stored sequentially: `[s0, s1, s2, ...]`
/// For stereo audio, samples are interleaved: `[L0, R0, L1, R1, ...]`
///
/// Time positions are given in milliseconds and resolve to frame indices as
/// `floor(ms * sample_rate / 1000)`, clamped to the buffer length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(data: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self, BeatSwapError> {
        if channels == 0 {
            return Err(BeatSwapError::InvalidFormat(
                "channel count must be at least 1".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(BeatSwapError::InvalidFormat(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if data.len() % channels as usize != 0 {
            return Err(BeatSwapError::InvalidFormat(format!(
                "{} samples do not divide into {} channels",
                data.len(),
                channels
            )));
        }
        Ok(Self {
            data,
            channels,
            sample_rate,
        })
    }

    pub fn from_mono(data: Vec<f32>, sample_rate: u32) -> Result<Self, BeatSwapError> {
        Self::new(data, 1, sample_rate)
    }

    /// An empty buffer with the same channel layout and sample rate.
    pub fn empty_like(&self) -> Self {
        Self {
            data: Vec::new(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    /// A buffer in this buffer's format holding `data`, which must be whole
    /// frames.
    pub(crate) fn with_samples(&self, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len() % self.channels as usize, 0);
        Self {
            data,
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.data
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_frames(&self) -> usize {
        self.data.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total duration, rounded to the nearest millisecond.
    pub fn duration_ms(&self) -> u64 {
        let frames = self.num_frames() as u128;
        let rate = self.sample_rate as u128;
        ((frames * 1000 + rate / 2) / rate) as u64
    }

    /// Frame index at `ms`, clamped to the buffer length.
    pub fn frame_at_ms(&self, ms: u64) -> usize {
        let frame = (ms as u128 * self.sample_rate as u128) / 1000;
        frame.min(self.num_frames() as u128) as usize
    }

    /// Borrow the interleaved samples covering a frame range.
    ///
    /// The range is clamped to the buffer; an inverted range yields an empty
    /// slice.
    pub fn frames(&self, range: Range<usize>) -> &[f32] {
        let n = self.num_frames();
        let start = range.start.min(n);
        let end = range.end.clamp(start, n);
        let ch = self.channels as usize;
        &self.data[start * ch..end * ch]
    }

    /// New buffer covering frames `[start, end)`, clamped.
    pub fn slice_frames(&self, start: usize, end: usize) -> Self {
        Self {
            data: self.frames(start..end).to_vec(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    /// New buffer covering `[start_ms, end_ms)`, clamped to the actual length.
    pub fn slice(&self, start_ms: u64, end_ms: u64) -> Self {
        self.slice_frames(self.frame_at_ms(start_ms), self.frame_at_ms(end_ms))
    }

    /// Append another buffer's samples.
    pub fn append(&mut self, other: &AudioBuffer) -> Result<(), BeatSwapError> {
        self.check_same_format(other)?;
        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    /// Join buffers in sequence order. All buffers must share channel layout
    /// and sample rate.
    pub fn concat(buffers: &[AudioBuffer]) -> Result<AudioBuffer, BeatSwapError> {
        let first = buffers.first().ok_or_else(|| {
            BeatSwapError::InvalidFormat("cannot concatenate zero buffers".to_string())
        })?;
        let total: usize = buffers.iter().map(|b| b.data.len()).sum();
        let mut out = first.empty_like();
        out.data.reserve_exact(total);
        for buffer in buffers {
            out.append(buffer)?;
        }
        Ok(out)
    }

    fn check_same_format(&self, other: &AudioBuffer) -> Result<(), BeatSwapError> {
        if self.channels != other.channels || self.sample_rate != other.sample_rate {
            return Err(BeatSwapError::InvalidFormat(format!(
                "cannot join {} ch @ {} Hz with {} ch @ {} Hz",
                self.channels, self.sample_rate, other.channels, other.sample_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, rate: u32) -> AudioBuffer {
        AudioBuffer::from_mono((0..frames).map(|i| i as f32).collect(), rate).unwrap()
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(AudioBuffer::new(vec![0.0], 0, 44100).is_err());
        assert!(AudioBuffer::new(vec![0.0], 1, 0).is_err());
        assert!(AudioBuffer::new(vec![0.0, 0.0, 0.0], 2, 44100).is_err());
    }

    #[test]
    fn test_duration_ms() {
        let buf = AudioBuffer::new(vec![0.0; 44100 * 2], 2, 44100).unwrap();
        assert_eq!(buf.num_frames(), 44100);
        assert_eq!(buf.duration_ms(), 1000);

        // 1.5 ms rounds up
        let buf = ramp(3, 2000);
        assert_eq!(buf.duration_ms(), 2);
    }

    #[test]
    fn test_slice_is_clamped() {
        let buf = ramp(1000, 1000);
        let tail = buf.slice(900, 5000);
        assert_eq!(tail.num_frames(), 100);
        assert_eq!(tail.samples()[0], 900.0);

        let past_end = buf.slice(2000, 3000);
        assert!(past_end.is_empty());

        let inverted = buf.slice(500, 100);
        assert!(inverted.is_empty());
    }

    #[test]
    fn test_slice_then_concat_is_lossless() {
        let buf = ramp(44_123, 44100);
        let a = buf.slice(0, 333);
        let b = buf.slice(333, 1001);
        let joined = AudioBuffer::concat(&[a, b]).unwrap();
        assert_eq!(joined, buf.slice(0, 1001));
    }

    #[test]
    fn test_stereo_slice_stays_frame_aligned() {
        let data: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let buf = AudioBuffer::new(data, 2, 1000).unwrap();
        let mid = buf.slice(2, 5);
        assert_eq!(mid.samples(), &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_concat_mismatched_format() {
        let mono = ramp(10, 1000);
        let other_rate = ramp(10, 2000);
        assert!(AudioBuffer::concat(&[mono, other_rate]).is_err());
        assert!(AudioBuffer::concat(&[]).is_err());
    }
}
