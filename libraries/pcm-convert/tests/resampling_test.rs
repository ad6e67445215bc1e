//! Resampler integration tests
//!
//! Lifecycle, byte contract and signal sanity of the rubato-backed
//! resampler at each quality preset.

use pcm_convert::resampling::{Resampler, ResamplerConfig, ResamplingError, ResamplingQuality};
use pcm_convert::SampleFormat;
use std::f64::consts::PI;

fn config(quality: ResamplingQuality, worker_threads: usize) -> ResamplerConfig {
    ResamplerConfig {
        quality,
        worker_threads,
        chunk_frames: Some(256),
    }
}

/// Interleaved F32 little-endian sine, same value on every channel
fn sine_f32_le(frames: usize, channels: usize, frequency: f64, rate: u32) -> Vec<u8> {
    (0..frames)
        .flat_map(|i| {
            let v = ((2.0 * PI * frequency * i as f64 / f64::from(rate)).sin() * 0.5) as f32;
            std::iter::repeat(v.to_le_bytes()).take(channels).flatten()
        })
        .collect()
}

fn decode_f32_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

#[test]
fn test_every_quality_resamples() {
    for quality in ResamplingQuality::ALL {
        let mut resampler =
            Resampler::open(44100, 48000, 2, SampleFormat::F32, &config(quality, 1)).unwrap();

        let input = sine_f32_le(8192, 2, 1000.0, 44100);
        let mut output = resampler.process(&input).unwrap();
        output.extend(resampler.flush().unwrap());
        resampler.close().unwrap();

        let samples = decode_f32_le(&output);
        assert_eq!(samples.len() % 2, 0, "{quality:?}");
        assert!(samples.iter().all(|s| s.is_finite()), "{quality:?}");

        let frames = samples.len() / 2;
        let expected = (8192.0 * 48000.0 / 44100.0) as usize;
        assert!(
            frames + 64 >= expected && frames <= expected + 512,
            "{quality:?}: {frames} frames, expected about {expected}"
        );

        // amplitude survives a 1 kHz tone
        let settled = &samples[samples.len() / 4..samples.len() * 3 / 4];
        let p = peak(settled);
        assert!((0.4..0.6).contains(&p), "{quality:?}: peak {p}");
    }
}

#[test]
fn test_downsampling() {
    let mut resampler = Resampler::open(
        96000,
        48000,
        1,
        SampleFormat::F32,
        &config(ResamplingQuality::Medium, 1),
    )
    .unwrap();

    let input = sine_f32_le(9600, 1, 440.0, 96000);
    let mut output = resampler.process(&input).unwrap();
    output.extend(resampler.flush().unwrap());

    let frames = output.len() / 4;
    assert!((4700..=5100).contains(&frames), "got {frames} frames");
}

#[test]
fn test_integer_format_byte_contract() {
    let mut resampler = Resampler::open(
        8000,
        16000,
        1,
        SampleFormat::S24,
        &config(ResamplingQuality::Quick, 1),
    )
    .unwrap();

    // 1000 S24 frames plus one dangling byte
    let mut input = vec![0u8; 3000];
    input.push(0xFF);
    let output = resampler.process(&input).unwrap();
    assert_eq!(output.len() % 3, 0);
    // silence in, silence out
    assert!(output.iter().all(|&b| b == 0));
}

#[test]
fn test_too_short_for_one_frame_group() {
    let mut resampler = Resampler::open(
        8000,
        16000,
        2,
        SampleFormat::S16,
        &config(ResamplingQuality::Quick, 1),
    )
    .unwrap();
    let err = resampler.process(&[0, 0, 0]).unwrap_err();
    assert_eq!(
        err,
        ResamplingError::FrameSize {
            format: SampleFormat::S16,
            expected: 4,
            actual: 3
        }
    );
    assert!(resampler.process(&[]).unwrap().is_empty());
}

#[test]
fn test_chunked_matches_single_call() {
    let input = sine_f32_le(4096, 1, 440.0, 22050);
    let cfg = config(ResamplingQuality::High, 1);

    let mut whole = Resampler::open(22050, 44100, 1, SampleFormat::F32, &cfg).unwrap();
    let mut expected = whole.process(&input).unwrap();
    expected.extend(whole.flush().unwrap());

    let mut chunked = Resampler::open(22050, 44100, 1, SampleFormat::F32, &cfg).unwrap();
    let mut actual = Vec::new();
    for chunk in input.chunks(4 * 100) {
        actual.extend(chunked.process(chunk).unwrap());
    }
    actual.extend(chunked.flush().unwrap());

    assert_eq!(actual, expected);
}

#[test]
fn test_reset_restarts_stream() {
    let input = sine_f32_le(1024, 1, 440.0, 44100);
    let cfg = config(ResamplingQuality::Medium, 1);
    let mut resampler = Resampler::open(44100, 48000, 1, SampleFormat::F32, &cfg).unwrap();

    let first = resampler.process(&input).unwrap();
    resampler.reset().unwrap();
    let second = resampler.process(&input).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_worker_threads_do_not_change_output() {
    let input = sine_f32_le(8192, 4, 440.0, 44100);
    let mut serial =
        Resampler::open(44100, 48000, 4, SampleFormat::F32, &config(ResamplingQuality::Low, 1))
            .unwrap();
    let mut parallel =
        Resampler::open(44100, 48000, 4, SampleFormat::F32, &config(ResamplingQuality::Low, 3))
            .unwrap();

    assert_eq!(
        serial.process(&input).unwrap(),
        parallel.process(&input).unwrap()
    );
}

#[test]
fn test_closed_resampler() {
    let mut resampler = Resampler::open(
        44100,
        48000,
        1,
        SampleFormat::S16,
        &config(ResamplingQuality::Quick, 1),
    )
    .unwrap();
    assert!(!resampler.is_closed());
    resampler.close().unwrap();

    assert!(resampler.is_closed());
    assert_eq!(resampler.process(&[0, 0]), Err(ResamplingError::Closed));
    assert_eq!(resampler.flush(), Err(ResamplingError::Closed));
    assert_eq!(resampler.reset(), Err(ResamplingError::Closed));
    assert_eq!(resampler.close(), Err(ResamplingError::Closed));
    assert_eq!(resampler.latency(), 0);
}

#[test]
fn test_output_frame_estimate() {
    let resampler = Resampler::open(
        44100,
        96000,
        2,
        SampleFormat::F64,
        &config(ResamplingQuality::Quick, 1),
    )
    .unwrap();
    assert_eq!(resampler.calculate_output_frames(44100), 96000);
    assert_eq!(resampler.calculate_output_frames(1), 3);
}

#[test]
fn test_stream_total_with_aligned_and_unaligned_input() {
    // chunk_frames is 256, so 1024 lines up exactly and leaves nothing pending
    for frames in [1023usize, 1024, 1025] {
        let mut resampler = Resampler::open(
            22050,
            44100,
            2,
            SampleFormat::F32,
            &config(ResamplingQuality::High, 1),
        )
        .unwrap();

        let input = sine_f32_le(frames, 2, 440.0, 22050);
        let mut output = resampler.process(&input).unwrap();
        output.extend(resampler.flush().unwrap());

        let out_frames = output.len() / 8;
        assert_eq!(
            out_frames,
            resampler.calculate_output_frames(frames) + resampler.latency(),
            "{frames} input frames"
        );
    }
}
