use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use mp3lame_encoder::{Bitrate, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::AudioBuffer;
use crate::error::BeatSwapError;

/// Full scale of 16-bit PCM, used for both export and import.
const PCM16_SCALE: f32 = 32768.0;

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;

pub const DEFAULT_MP3_KBPS: u16 = 192;

/// Container written by [`run`](super::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp3,
    Wav,
}

/// Sample encoding for WAV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WavBits {
    #[default]
    Float32,
    Pcm16,
}

/// Turns a finished buffer into file bytes.
pub trait Encoder {
    /// File extension of the encoded output, without the dot.
    fn extension(&self) -> &'static str;

    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, BeatSwapError>;
}

/// Constant-bitrate MP3 through LAME.
#[derive(Debug, Clone, Copy)]
pub struct Mp3Encoder {
    pub kbps: u16,
}

impl Default for Mp3Encoder {
    fn default() -> Self {
        Self {
            kbps: DEFAULT_MP3_KBPS,
        }
    }
}

impl Encoder for Mp3Encoder {
    fn extension(&self) -> &'static str {
        "mp3"
    }

    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, BeatSwapError> {
        encode_mp3(buffer, self.kbps)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder {
    pub bits: WavBits,
}

impl Encoder for WavEncoder {
    fn extension(&self) -> &'static str {
        "wav"
    }

    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, BeatSwapError> {
        encode_wav(buffer, self.bits)
    }
}

/// Decode any supported file (MP3, MP4/AAC, WAV, FLAC, OGG) into memory.
///
/// WAV files are read with hound so samples come back bit-exact; everything
/// else goes through symphonia.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, BeatSwapError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if ext.as_deref() == Some("wav") {
        return import_wav(path);
    }

    let file = File::open(path)
        .map_err(|e| BeatSwapError::DecodeFailure(format!("{}: {}", path.display(), e)))?;
    decode_source(Box::new(file), ext.as_deref())
}

/// Decode an in-memory container, using `extension` as a format hint.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer, BeatSwapError> {
    decode_source(Box::new(Cursor::new(bytes)), extension)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
) -> Result<AudioBuffer, BeatSwapError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BeatSwapError::DecodeFailure("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    // Rate and channel count of the first decoded packet; every later packet
    // must match it.
    let mut layout: Option<(u32, u16)> = None;
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<(SignalSpec, SampleBuffer<f32>)> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(e) => {
                end_of_stream(e)?;
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        check_layout(&mut layout, &spec)?;

        let frames = decoded.capacity();
        let fits = sample_buf.as_ref().is_some_and(|(buf_spec, buf)| {
            *buf_spec == spec && buf.capacity() >= frames * spec.channels.count()
        });
        if !fits {
            sample_buf = Some((spec, SampleBuffer::new(frames as u64, spec)));
        }
        if let Some((_, buf)) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let (sample_rate, channels) = match layout {
        Some(layout) => layout,
        None => (
            codec_params
                .sample_rate
                .ok_or_else(|| BeatSwapError::DecodeFailure("unknown sample rate".to_string()))?,
            codec_params
                .channels
                .map(|c| c.count() as u16)
                .ok_or_else(|| {
                    BeatSwapError::DecodeFailure("unknown channel layout".to_string())
                })?,
        ),
    };

    let buffer = AudioBuffer::new(samples, channels, sample_rate)
        .map_err(|e| BeatSwapError::DecodeFailure(e.to_string()))?;
    log::debug!(
        "decoded {} frames, {} ch @ {} Hz ({} ms)",
        buffer.num_frames(),
        channels,
        sample_rate,
        buffer.duration_ms()
    );
    Ok(buffer)
}

/// Sort out an error from `next_packet`: `Ok` when the stream simply ended.
fn end_of_stream(err: SymphoniaError) -> Result<(), BeatSwapError> {
    match err {
        SymphoniaError::IoError(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
        SymphoniaError::ResetRequired => {
            log::warn!("decoder reset requested mid-track, refusing a truncated result");
            Err(BeatSwapError::DecodeFailure(
                "stream requires a decoder reset (chained streams are not supported)".to_string(),
            ))
        }
        e => Err(e.into()),
    }
}

fn check_layout(layout: &mut Option<(u32, u16)>, spec: &SignalSpec) -> Result<(), BeatSwapError> {
    let current = (spec.rate, spec.channels.count() as u16);
    match *layout {
        None => {
            *layout = Some(current);
            Ok(())
        }
        Some(first) if first == current => Ok(()),
        Some((rate, channels)) => Err(BeatSwapError::DecodeFailure(format!(
            "stream changed from {} ch @ {} Hz to {} ch @ {} Hz mid-track",
            channels, rate, current.1, current.0
        ))),
    }
}

/// Read a WAV file with its channel layout intact.
pub fn import_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, BeatSwapError> {
    let path = path.as_ref();
    let decode_err =
        |e: hound::Error| BeatSwapError::DecodeFailure(format!("{}: {}", path.display(), e));

    let mut reader = WavReader::open(path).map_err(decode_err)?;
    let spec = reader.spec();

    // Read samples as f32 in interleaved order
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_err)?,
        SampleFormat::Int => {
            // 2^(bits - 1), which is PCM16_SCALE for 16-bit files
            let max_value = 2_i64.pow(spec.bits_per_sample as u32 - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)?
        }
    };

    AudioBuffer::new(samples, spec.channels, spec.sample_rate)
        .map_err(|e| BeatSwapError::DecodeFailure(e.to_string()))
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn wav_spec(buffer: &AudioBuffer, bits: WavBits) -> WavSpec {
    let (bits_per_sample, sample_format) = match bits {
        WavBits::Float32 => (32, SampleFormat::Float),
        WavBits::Pcm16 => (16, SampleFormat::Int),
    };
    WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample,
        sample_format,
    }
}

fn write_samples<W: std::io::Write + std::io::Seek>(
    mut writer: WavWriter<W>,
    buffer: &AudioBuffer,
    bits: WavBits,
) -> Result<(), BeatSwapError> {
    match bits {
        WavBits::Float32 => {
            for &sample in buffer.samples() {
                writer.write_sample(sample)?;
            }
        }
        WavBits::Pcm16 => {
            for &sample in buffer.samples() {
                writer.write_sample(to_pcm16(sample))?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Encode a buffer as WAV bytes.
pub fn encode_wav(buffer: &AudioBuffer, bits: WavBits) -> Result<Vec<u8>, BeatSwapError> {
    let mut bytes = Vec::new();
    let writer = WavWriter::new(Cursor::new(&mut bytes), wav_spec(buffer, bits))?;
    write_samples(writer, buffer, bits)?;
    Ok(bytes)
}

/// Write a buffer to disk as WAV.
pub fn write_wav_file<P: AsRef<Path>>(
    path: P,
    buffer: &AudioBuffer,
    bits: WavBits,
) -> Result<(), BeatSwapError> {
    let writer = WavWriter::create(&path, wav_spec(buffer, bits))?;
    write_samples(writer, buffer, bits)
}

fn mp3_bitrate(kbps: u16) -> Result<Bitrate, BeatSwapError> {
    Ok(match kbps {
        64 => Bitrate::Kbps64,
        96 => Bitrate::Kbps96,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        other => {
            return Err(BeatSwapError::EncodeFailure(format!(
                "unsupported MP3 bitrate {} kbps",
                other
            )));
        }
    })
}

fn mp3_error(err: impl std::fmt::Debug) -> BeatSwapError {
    BeatSwapError::EncodeFailure(format!("mp3: {:?}", err))
}

/// Encode a mono or stereo buffer as constant-bitrate MP3 bytes.
///
/// The decoded stream comes back slightly longer than the input: LAME adds
/// its encoder delay at the front and pads the last MP3 frame.
pub fn encode_mp3(buffer: &AudioBuffer, kbps: u16) -> Result<Vec<u8>, BeatSwapError> {
    let channels = buffer.channels();
    if channels > 2 {
        return Err(BeatSwapError::InvalidFormat(format!(
            "MP3 holds at most 2 channels, got {}",
            channels
        )));
    }
    let bitrate = mp3_bitrate(kbps)?;

    let mut builder = mp3lame_encoder::Builder::new()
        .ok_or_else(|| BeatSwapError::EncodeFailure("mp3: LAME failed to initialize".into()))?;
    builder.set_num_channels(channels as u8).map_err(mp3_error)?;
    builder
        .set_sample_rate(buffer.sample_rate())
        .map_err(mp3_error)?;
    builder.set_brate(bitrate).map_err(mp3_error)?;
    builder.set_quality(Quality::Best).map_err(mp3_error)?;
    let mut encoder = builder.build().map_err(mp3_error)?;

    let pcm: Vec<i16> = buffer.samples().iter().map(|&s| to_pcm16(s)).collect();

    let mut out: Vec<u8> = Vec::new();
    out.reserve(mp3lame_encoder::max_required_buffer_size(pcm.len()));
    let written = if channels == 1 {
        encoder.encode(MonoPcm(pcm.as_slice()), out.spare_capacity_mut())
    } else {
        encoder.encode(InterleavedPcm(pcm.as_slice()), out.spare_capacity_mut())
    }
    .map_err(mp3_error)?;
    // SAFETY: LAME initialized `written` bytes of the spare capacity
    unsafe { out.set_len(out.len() + written) };

    out.reserve(7200);
    let written = encoder
        .flush::<FlushNoGap>(out.spare_capacity_mut())
        .map_err(mp3_error)?;
    // SAFETY: as above
    unsafe { out.set_len(out.len() + written) };

    log::debug!(
        "encoded {} frames as {} kbps MP3 ({} bytes)",
        buffer.num_frames(),
        kbps,
        out.len()
    );
    Ok(out)
}

/// Convert a buffer to `target_rate`. Returns the input unchanged when the
/// rates already match.
///
/// The result holds exactly `round(frames * target_rate / source_rate)`
/// frames, aligned with the input: the filter delay is removed from the
/// front and the tail is flushed out of the filter.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, BeatSwapError> {
    let input_rate = buffer.sample_rate();
    let channels = buffer.channels();
    if input_rate == target_rate {
        return Ok(buffer.clone());
    }
    if target_rate == 0 {
        return Err(BeatSwapError::InvalidFormat(
            "target sample rate must be greater than 0".to_string(),
        ));
    }
    if buffer.is_empty() {
        return AudioBuffer::new(Vec::new(), channels, target_rate);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ch = channels as usize;
    let frames = buffer.num_frames();
    let ratio = target_rate as f64 / input_rate as f64;
    let expected = (frames as f64 * ratio).round() as usize;

    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0, // Max ratio
        params,
        RESAMPLE_CHUNK,
        ch,
    )
    .map_err(|e| resample_error(input_rate, target_rate, e))?;
    let delay = resampler.output_delay();

    let planar: Vec<Vec<f32>> = (0..ch)
        .map(|c| buffer.samples().iter().skip(c).step_by(ch).copied().collect())
        .collect();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(delay + expected); ch];

    let mut pos = 0;
    while pos < frames {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(frames);
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..end]).collect();
        let block = if end - pos == needed {
            resampler.process(chunk.as_slice(), None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        }
        .map_err(|e| resample_error(input_rate, target_rate, e))?;
        extend_planar(&mut output, block);
        pos = end;
    }

    // Feed silence until the delayed tail has come out
    while output.first().map_or(0, Vec::len) < delay + expected {
        let block = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| resample_error(input_rate, target_rate, e))?;
        if block.first().is_none_or(Vec::is_empty) {
            break;
        }
        extend_planar(&mut output, block);
    }

    let mut interleaved = Vec::with_capacity(expected * ch);
    for i in delay..delay + expected {
        for channel in &output {
            interleaved.push(channel.get(i).copied().unwrap_or(0.0));
        }
    }

    log::debug!(
        "resampled {} -> {} frames ({} Hz -> {} Hz, filter delay {})",
        frames,
        expected,
        input_rate,
        target_rate,
        delay
    );
    AudioBuffer::new(interleaved, channels, target_rate)
}

fn extend_planar(output: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (channel, samples) in output.iter_mut().zip(block) {
        channel.extend_from_slice(&samples);
    }
}

fn resample_error(input_rate: u32, target_rate: u32, err: impl std::fmt::Display) -> BeatSwapError {
    BeatSwapError::EncodeFailure(format!(
        "resampling {} Hz -> {} Hz: {}",
        input_rate, target_rate, err
    ))
}
