use assert_approx_eq::assert_approx_eq;
use beatswap::audio::OutputFormat;
use beatswap::audio::io::{self, WavBits};
use beatswap::{AudioBuffer, BeatSwapError, ErrorKind, SwapConfig};
use std::path::{Path, PathBuf};

const RATE: u32 = 8000;
const FRAMES_PER_MS: usize = (RATE / 1000) as usize;

/// Stereo ramp: the left channel rises through [0, 1), the right mirrors it.
fn stereo_ramp(ms: usize) -> AudioBuffer {
    let frames = ms * FRAMES_PER_MS;
    let data: Vec<f32> = (0..frames)
        .flat_map(|f| {
            let v = f as f32 / frames as f32;
            [v, -v]
        })
        .collect();
    AudioBuffer::new(data, 2, RATE).unwrap()
}

/// Stereo sine at 44.1 kHz, a rate every MP3 bitrate supports.
fn stereo_tone_44k(ms: usize) -> AudioBuffer {
    let data: Vec<f32> = (0..ms * 441 / 10)
        .flat_map(|f| {
            let v = 0.4 * (f as f32 * 0.06).sin();
            [v, -v]
        })
        .collect();
    AudioBuffer::new(data, 2, 44100).unwrap()
}

fn write_source(dir: &Path, name: &str, audio: &AudioBuffer) -> PathBuf {
    let path = dir.join(name);
    io::write_wav_file(&path, audio, WavBits::Float32).unwrap();
    path
}

fn config(source: PathBuf, out: &Path, bpm: f64, beats_per_bar: u32, swap: &str) -> SwapConfig {
    SwapConfig {
        source,
        bpm,
        beats_per_bar,
        swap_spec: swap.to_string(),
        output_dir: Some(out.to_path_buf()),
        format: OutputFormat::Wav,
        ..SwapConfig::default()
    }
}

/// Samples of `audio` for the given millisecond ranges, in order.
fn pick(audio: &AudioBuffer, ranges_ms: &[(usize, usize)]) -> Vec<f32> {
    ranges_ms
        .iter()
        .flat_map(|&(a, b)| {
            audio
                .frames(a * FRAMES_PER_MS..b * FRAMES_PER_MS)
                .iter()
                .copied()
        })
        .collect()
}

#[test]
fn test_two_full_bars_at_120_swap_second_and_fourth() {
    let dir = tempfile::tempdir().unwrap();
    let input = stereo_ramp(4000);
    let source = write_source(dir.path(), "groove.wav", &input);

    let report = beatswap::run(config(source, dir.path(), 120.0, 4, "2,4")).unwrap();

    assert_eq!(report.output, dir.path().join("output_groove.wav"));
    assert_eq!(report.bar_ms, 2000);
    assert_eq!(report.beat_ms, 500);
    assert_eq!(report.swapped_beats, (2, 4));
    assert_eq!(report.stats.bars, 2);
    assert_eq!(report.input_duration_ms, 4000);
    assert_eq!(report.output_duration_ms, 4000);

    let output = io::decode_file(&report.output).unwrap();
    assert_eq!(output.num_frames(), input.num_frames());
    let expected = pick(
        &input,
        &[
            (0, 500),
            (1500, 2000),
            (1000, 1500),
            (500, 1000),
            (2000, 2500),
            (3500, 4000),
            (3000, 3500),
            (2500, 3000),
        ],
    );
    assert_eq!(output.samples(), expected.as_slice());
}

#[test]
fn test_ninety_in_three_with_remainder() {
    let dir = tempfile::tempdir().unwrap();
    let input = stereo_ramp(5000);
    let source = write_source(dir.path(), "waltz.wav", &input);

    let report = beatswap::run(config(source, dir.path(), 90.0, 3, "1,3")).unwrap();
    assert_eq!(report.bar_ms, 2000);
    assert_eq!(report.beat_ms, 667);
    assert_eq!(report.stats.bars, 3);
    assert_eq!(report.stats.bars_passed_through, 0);

    let output = io::decode_file(&report.output).unwrap();
    assert_eq!(output.num_frames(), input.num_frames());

    // Full bars: first and third beats exchanged, the third one 666 ms long
    let expected = pick(
        &input,
        &[
            (1334, 2000),
            (667, 1334),
            (0, 667),
            (3334, 4000),
            (2667, 3334),
            (2000, 2667),
        ],
    );
    assert_eq!(&output.samples()[..expected.len()], expected.as_slice());
}

#[test]
fn test_short_trailing_bar_is_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let input = stereo_ramp(4250);
    let source = write_source(dir.path(), "tail.wav", &input);

    let report = beatswap::run(config(source, dir.path(), 120.0, 4, "1,4")).unwrap();
    assert_eq!(report.stats.bars_passed_through, 1);

    let output = io::decode_file(&report.output).unwrap();
    assert_eq!(output.num_frames(), input.num_frames());
    let tail = 4000 * FRAMES_PER_MS;
    assert_eq!(
        output.frames(tail..output.num_frames()),
        input.frames(tail..input.num_frames())
    );
}

#[test]
fn test_swapping_twice_restores_the_track() {
    let dir = tempfile::tempdir().unwrap();
    let first_dir = dir.path().join("first");
    let second_dir = dir.path().join("second");
    std::fs::create_dir_all(&first_dir).unwrap();
    std::fs::create_dir_all(&second_dir).unwrap();

    let input = stereo_ramp(8000);
    let source = write_source(dir.path(), "loop.wav", &input);

    let once = beatswap::run(config(source, &first_dir, 120.0, 4, "1,3")).unwrap();
    let twice = beatswap::run(config(once.output, &second_dir, 120.0, 4, "3,1")).unwrap();

    let restored = io::decode_file(&twice.output).unwrap();
    assert_eq!(restored, input);
}

#[test]
fn test_swap_beats_returns_mp3_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let input = stereo_tone_44k(3000);
    let source = write_source(dir.path(), "bytes.wav", &input);

    let bytes = beatswap::swap_beats(&source, 120.0, 4, "2,3").unwrap();
    let decoded = io::decode_bytes(bytes, Some("mp3")).unwrap();

    assert_eq!(decoded.channels(), 2);
    assert_eq!(decoded.sample_rate(), 44100);
    let diff = decoded.num_frames().abs_diff(input.num_frames());
    assert!(diff <= 4 * 1152, "{} decoded frames", decoded.num_frames());
}

#[test]
fn test_default_run_writes_mp3() {
    let dir = tempfile::tempdir().unwrap();
    let input = stereo_tone_44k(2000);
    let source = write_source(dir.path(), "default.wav", &input);

    let mut cfg = config(source, dir.path(), 120.0, 4, "2,4");
    cfg.format = SwapConfig::default().format;
    let report = beatswap::run(cfg).unwrap();

    assert_eq!(report.output, dir.path().join("output_default.mp3"));
    let decoded = io::decode_file(&report.output).unwrap();
    assert_eq!(decoded.channels(), 2);
    assert_eq!(decoded.sample_rate(), 44100);
}

#[test]
fn test_invalid_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "quiet.wav", &stereo_ramp(1000));
    let out_dir = dir.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();

    let cases = [
        (0.0, 4, "2,4", ErrorKind::InvalidTempo),
        (120.0, 0, "2,4", ErrorKind::InvalidTempo),
        (1e7, 4, "2,4", ErrorKind::DegenerateBeat),
        (120.0, 4, "2", ErrorKind::MalformedSwapSpec),
        (120.0, 4, "0,4", ErrorKind::SwapIndexOutOfRange),
        (120.0, 4, "2,2", ErrorKind::DuplicateSwapIndex),
    ];
    for (bpm, bpb, swap, kind) in cases {
        let err = beatswap::run(config(source.clone(), &out_dir, bpm, bpb, swap)).unwrap_err();
        assert_eq!(err.kind(), kind, "{} {} {:?}", bpm, bpb, swap);
        assert!(err.is_validation());
    }
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
}

#[test]
fn test_undecodable_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.mp3");
    std::fs::write(&source, b"this is not an mp3 stream").unwrap();

    let err = beatswap::run(config(source, dir.path(), 120.0, 4, "2,4")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[test]
fn test_missing_source() {
    let err = beatswap::swap_beats("", 120.0, 4, "2,4").unwrap_err();
    assert_eq!(err, BeatSwapError::MissingInput);
}

#[test]
fn test_resampled_pcm16_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = stereo_ramp(2000);
    let source = write_source(dir.path(), "rate.wav", &input);

    let mut cfg = config(source, dir.path(), 120.0, 4, "2,4");
    cfg.output_sample_rate = Some(16000);
    cfg.wav_bits = WavBits::Pcm16;
    let report = beatswap::run(cfg).unwrap();
    assert_eq!(report.output_duration_ms, 2000);

    let spec = hound::WavReader::open(&report.output).unwrap().spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.channels, 2);

    let output = io::decode_file(&report.output).unwrap();
    assert_eq!(output.num_frames(), input.num_frames() * 2);

    // Output 600 ms sits in the moved fourth beat, at input 1600 ms
    let at_600 = output.frames(9600..9601);
    assert_approx_eq!(at_600[0], 0.8, 0.01);
    assert_approx_eq!(at_600[1], -0.8, 0.01);
    // Output 1200 ms is input 1200 ms, the third beat stays in place
    let at_1200 = output.frames(19200..19201);
    assert_approx_eq!(at_1200[0], 0.6, 0.01);
}

#[test]
fn test_report_serializes() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "json.wav", &stereo_ramp(2000));
    let report = beatswap::run(config(source, dir.path(), 120.0, 4, "2,4")).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["bar_ms"], 2000);
    assert_eq!(json["bars"], 1);
    assert_eq!(json["swapped_beats"][0], 2);
}
