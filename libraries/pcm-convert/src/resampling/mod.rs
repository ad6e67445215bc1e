//! Sample rate conversion
//!
//! The resampler is the one stateful stage of a conversion pipeline. It keeps
//! filter history between calls, so buffers of one stream must be fed in
//! order and one `Resampler` must never be shared between streams.
//!
//! ## Byte contract
//!
//! `Resampler::process` takes and returns **little-endian** interleaved PCM
//! in the format fixed at `open`. Samples are decoded to normalized `f64`,
//! run through the backend, then re-encoded with rounding and saturation.
//!
//! ## Backends
//!
//! Backends implement `ResamplerImpl` over interleaved `f64`. The shipped
//! backend is `RubatoResampler`, which runs one mono rubato resampler per
//! channel and spreads the channels over `worker_threads` scoped threads.
//!
//! ## Example
//!
//! ```rust
//! use pcm_convert::resampling::{Resampler, ResamplerConfig, ResamplingQuality};
//! use pcm_convert::SampleFormat;
//!
//! let config = ResamplerConfig {
//!     quality: ResamplingQuality::Quick,
//!     ..ResamplerConfig::default()
//! };
//! let mut resampler = Resampler::open(16_000, 32_000, 1, SampleFormat::S16, &config).unwrap();
//!
//! let input = vec![0u8; 4096]; // 2048 mono S16 frames
//! let output = resampler.process(&input).unwrap();
//! assert_eq!(output.len() % 2, 0);
//! resampler.close().unwrap();
//! ```

mod rubato_backend;

use crate::byte_order::ByteOrder;
use crate::error::PcmError;
use crate::format::SampleFormat;
use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub use rubato_backend::RubatoResampler;

/// Resampling errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResamplingError {
    #[error("Invalid sample rate: {0} Hz (must be > 0)")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count: {0} (must be >= 1)")]
    InvalidChannelCount(usize),

    #[error("Frame size mismatch for {format}: expected a multiple of {expected} bytes, got {actual}")]
    FrameSize {
        format: SampleFormat,
        expected: usize,
        actual: usize,
    },

    #[error("Resampler initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Resampler is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ResamplingError>;

/// Resampling quality presets, from fastest to most accurate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResamplingQuality {
    /// Linear polynomial interpolation
    Quick,
    /// Cubic polynomial interpolation
    Low,
    /// Short sinc filter
    /// - Passband: 90% of Nyquist
    Medium,
    /// Sinc filter
    /// - Passband: 95% of Nyquist
    #[default]
    High,
    /// Long sinc filter
    /// - Passband: 99% of Nyquist
    VeryHigh,
}

impl ResamplingQuality {
    /// Every preset, in ascending quality order
    pub const ALL: [ResamplingQuality; 5] = [
        ResamplingQuality::Quick,
        ResamplingQuality::Low,
        ResamplingQuality::Medium,
        ResamplingQuality::High,
        ResamplingQuality::VeryHigh,
    ];

    /// Frames per backend chunk when the config does not override it
    pub fn default_chunk_frames(&self) -> usize {
        match self {
            Self::Quick | Self::Low | Self::Medium | Self::High => 1024,
            Self::VeryHigh => 2048,
        }
    }

    /// True for presets that use a windowed sinc filter
    pub fn uses_sinc(&self) -> bool {
        *self >= Self::Medium
    }
}

/// Resampler construction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplerConfig {
    pub quality: ResamplingQuality,

    /// Threads the backend may spread channels over
    pub worker_threads: usize,

    /// Backend chunk size in frames; `None` uses the quality default
    pub chunk_frames: Option<usize>,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            quality: ResamplingQuality::default(),
            worker_threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            chunk_frames: None,
        }
    }
}

impl ResamplerConfig {
    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
            .filter(|&frames| frames > 0)
            .unwrap_or_else(|| self.quality.default_chunk_frames())
    }
}

/// Trait for resampler backends
pub trait ResamplerImpl: Send {
    /// Process interleaved samples
    ///
    /// # Arguments
    /// - `input`: Interleaved normalized samples (e.g., [L, R, L, R, ...])
    ///
    /// # Returns
    /// Interleaved output samples at the output rate. May be shorter than
    /// the rate ratio suggests while the backend holds input back.
    fn process(&mut self, input: &[f64]) -> Result<Vec<f64>>;

    /// Drain input held back by the backend
    fn flush(&mut self) -> Result<Vec<f64>>;

    fn input_rate(&self) -> u32;

    fn output_rate(&self) -> u32;

    fn channels(&self) -> usize;

    /// Clear filter history and held-back input
    fn reset(&mut self);

    /// Delay introduced by the backend, in output frames
    fn latency(&self) -> usize {
        0
    }
}

/// Owned resampler handle
///
/// Created by `open` (or `with_backend`), released by `close` or on drop.
pub struct Resampler {
    backend: Option<Box<dyn ResamplerImpl>>,
    format: SampleFormat,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
}

impl std::fmt::Debug for Resampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resampler")
            .field("format", &self.format)
            .field("input_rate", &self.input_rate)
            .field("output_rate", &self.output_rate)
            .field("channels", &self.channels)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Resampler {
    /// Open a rubato-backed resampler
    ///
    /// # Arguments
    /// - `input_rate`: Input sample rate (Hz)
    /// - `output_rate`: Output sample rate (Hz)
    /// - `channels`: Interleaved channel count
    /// - `format`: Sample format of the little-endian byte buffers
    /// - `config`: Quality, chunking and threading
    pub fn open(
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        format: SampleFormat,
        config: &ResamplerConfig,
    ) -> Result<Self> {
        Self::validate(input_rate, output_rate, channels)?;
        let backend = RubatoResampler::new(input_rate, output_rate, channels, config)?;
        debug!(
            input_rate,
            output_rate,
            channels,
            %format,
            quality = ?config.quality,
            worker_threads = config.worker_threads,
            "opened resampler"
        );
        Self::with_backend(Box::new(backend), format)
    }

    /// Wrap a custom backend
    pub fn with_backend(backend: Box<dyn ResamplerImpl>, format: SampleFormat) -> Result<Self> {
        let (input_rate, output_rate, channels) =
            (backend.input_rate(), backend.output_rate(), backend.channels());
        Self::validate(input_rate, output_rate, channels)?;
        Ok(Self {
            backend: Some(backend),
            format,
            input_rate,
            output_rate,
            channels,
        })
    }

    fn validate(input_rate: u32, output_rate: u32, channels: usize) -> Result<()> {
        if input_rate == 0 {
            return Err(ResamplingError::InvalidSampleRate(input_rate));
        }
        if output_rate == 0 {
            return Err(ResamplingError::InvalidSampleRate(output_rate));
        }
        if channels == 0 {
            return Err(ResamplingError::InvalidChannelCount(channels));
        }
        Ok(())
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn ResamplerImpl>> {
        self.backend.as_mut().ok_or(ResamplingError::Closed)
    }

    /// Resample a little-endian interleaved buffer
    ///
    /// Trailing bytes that do not form a whole multi-channel frame are
    /// dropped. A non-empty buffer without one whole frame is an error.
    pub fn process(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let format = self.format;
        let group_size = format.frame_size() * self.channels;
        if self.backend.is_none() {
            return Err(ResamplingError::Closed);
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let whole = input.len() - input.len() % group_size;
        if whole == 0 {
            return Err(ResamplingError::FrameSize {
                format,
                expected: group_size,
                actual: input.len(),
            });
        }
        if whole != input.len() {
            trace!(
                dropped = input.len() - whole,
                "resampler truncated partial frame group"
            );
        }

        let samples = decode_le(&input[..whole], format)?;
        let resampled = self.backend_mut()?.process(&samples)?;
        if resampled.is_empty() {
            trace!(input_frames = whole / group_size, "resampler holding input back");
        }
        Ok(encode_le(&resampled, format))
    }

    /// Drain held-back input at end of stream
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        let format = self.format;
        let resampled = self.backend_mut()?.flush()?;
        Ok(encode_le(&resampled, format))
    }

    /// Clear continuity state without releasing the backend
    pub fn reset(&mut self) -> Result<()> {
        self.backend_mut()?.reset();
        Ok(())
    }

    /// Release the backend; later calls fail with `Closed`
    pub fn close(&mut self) -> Result<()> {
        match self.backend.take() {
            Some(backend) => {
                drop(backend);
                debug!(
                    input_rate = self.input_rate,
                    output_rate = self.output_rate,
                    "closed resampler"
                );
                Ok(())
            }
            None => Err(ResamplingError::Closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Backend delay in output frames (0 once closed)
    pub fn latency(&self) -> usize {
        self.backend.as_ref().map_or(0, |backend| backend.latency())
    }

    /// Expected output frames for `input_frames` over a long stream
    ///
    /// Useful for pre-allocating buffers
    pub fn calculate_output_frames(&self, input_frames: usize) -> usize {
        let frames = input_frames as u64 * u64::from(self.output_rate);
        frames.div_ceil(u64::from(self.input_rate)) as usize
    }
}

/// Every chunk must be a whole frame; a short tail is a `FrameSize` error
fn decode_le(bytes: &[u8], format: SampleFormat) -> Result<Vec<f64>> {
    bytes
        .chunks(format.frame_size())
        .map(|frame| {
            Sample::decode(frame, format, ByteOrder::LittleEndian)
                .map(Sample::to_normalized)
                .map_err(|err| match err {
                    PcmError::FrameSize {
                        format,
                        expected,
                        actual,
                    } => ResamplingError::FrameSize {
                        format,
                        expected,
                        actual,
                    },
                    other => ResamplingError::ProcessingFailed(other.to_string()),
                })
        })
        .collect()
}

fn encode_le(samples: &[f64], format: SampleFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * format.frame_size());
    for &value in samples {
        Sample::from_normalized(value, format).encode_into(ByteOrder::LittleEndian, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Repeats every frame `factor` times; exact and stateless
    struct RepeatBackend {
        factor: usize,
        channels: usize,
    }

    impl ResamplerImpl for RepeatBackend {
        fn process(&mut self, input: &[f64]) -> Result<Vec<f64>> {
            Ok(input
                .chunks(self.channels)
                .flat_map(|frame| std::iter::repeat(frame).take(self.factor).flatten().copied())
                .collect())
        }

        fn flush(&mut self) -> Result<Vec<f64>> {
            Ok(Vec::new())
        }

        fn input_rate(&self) -> u32 {
            8000
        }

        fn output_rate(&self) -> u32 {
            8000 * self.factor as u32
        }

        fn channels(&self) -> usize {
            self.channels
        }

        fn reset(&mut self) {}
    }

    fn quick() -> ResamplerConfig {
        ResamplerConfig {
            quality: ResamplingQuality::Quick,
            worker_threads: 1,
            chunk_frames: Some(256),
        }
    }

    #[test]
    fn test_quality_order() {
        assert!(ResamplingQuality::Quick < ResamplingQuality::Low);
        assert!(ResamplingQuality::High < ResamplingQuality::VeryHigh);
        assert!(!ResamplingQuality::Low.uses_sinc());
        assert!(ResamplingQuality::Medium.uses_sinc());
    }

    #[test]
    fn test_chunk_frames_override() {
        let mut config = quick();
        assert_eq!(config.chunk_frames(), 256);
        config.chunk_frames = Some(0);
        assert_eq!(config.chunk_frames(), 1024);
    }

    #[test]
    fn test_invalid_sample_rates() {
        let result = Resampler::open(0, 48000, 2, SampleFormat::S16, &quick());
        assert!(matches!(result, Err(ResamplingError::InvalidSampleRate(0))));

        let result = Resampler::open(44100, 0, 2, SampleFormat::S16, &quick());
        assert!(matches!(result, Err(ResamplingError::InvalidSampleRate(0))));
    }

    #[test]
    fn test_invalid_channels() {
        let result = Resampler::open(44100, 48000, 0, SampleFormat::F32, &quick());
        assert!(matches!(result, Err(ResamplingError::InvalidChannelCount(0))));
    }

    #[test]
    fn test_byte_codec_through_backend() {
        let backend = RepeatBackend {
            factor: 2,
            channels: 2,
        };
        let mut resampler = Resampler::with_backend(Box::new(backend), SampleFormat::S16).unwrap();

        let input: Vec<u8> = [100i16, -100]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let output = resampler.process(&input).unwrap();
        let expected: Vec<u8> = [100i16, -100, 100, -100]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_process_truncation() {
        let backend = RepeatBackend {
            factor: 1,
            channels: 2,
        };
        let mut resampler = Resampler::with_backend(Box::new(backend), SampleFormat::U8).unwrap();

        assert!(resampler.process(&[]).unwrap().is_empty());
        assert_eq!(resampler.process(&[1, 2, 3]).unwrap(), vec![1, 2]);
        assert_eq!(
            resampler.process(&[1]),
            Err(ResamplingError::FrameSize {
                format: SampleFormat::U8,
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_closed_handle_fails() {
        let mut resampler = Resampler::open(8000, 16000, 1, SampleFormat::S16, &quick()).unwrap();
        resampler.close().unwrap();
        assert!(resampler.is_closed());
        assert_eq!(resampler.process(&[0, 0]), Err(ResamplingError::Closed));
        assert_eq!(resampler.reset(), Err(ResamplingError::Closed));
        assert_eq!(resampler.close(), Err(ResamplingError::Closed));
        assert_eq!(resampler.latency(), 0);
    }

    #[test]
    fn test_decode_le_rejects_partial_frame() {
        let samples = decode_le(&[0x00, 0x40, 0x00, 0xC0], SampleFormat::S16).unwrap();
        assert_eq!(samples, vec![0.5, -0.5]);

        assert_eq!(
            decode_le(&[0x00, 0x40, 0x01], SampleFormat::S16),
            Err(ResamplingError::FrameSize {
                format: SampleFormat::S16,
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_output_size_calculation() {
        let resampler = Resampler::open(44100, 96000, 2, SampleFormat::F32, &quick()).unwrap();
        let expected = (2048.0f64 * (96000.0f64 / 44100.0f64)).ceil() as usize;
        assert_eq!(resampler.calculate_output_frames(2048), expected);
    }
}
