//! Error types for PCM conversion

use crate::format::SampleFormat;
use crate::resampling::ResamplingError;
use thiserror::Error;

/// Result type alias using `PcmError`
pub type Result<T> = std::result::Result<T, PcmError>;

/// Errors raised by the conversion stages and the pipeline
///
/// Every variant describes a deterministic input-shape problem; none of
/// them is worth retrying with the same arguments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PcmError {
    /// Unknown sample format tag
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Unknown byte order tag
    #[error("Invalid byte order: {0} (expected little-endian or big-endian)")]
    InvalidByteOrder(String),

    /// Sample rate of zero
    #[error("Invalid sample rate: {0} Hz (must be > 0)")]
    InvalidSampleRate(u32),

    /// Channel count of zero
    #[error("Invalid channel count: {0} (must be >= 1)")]
    InvalidChannels(usize),

    /// Buffer or frame length inconsistent with the format's frame size
    #[error("Frame size mismatch for {format}: expected {expected} bytes, got {actual}")]
    FrameSize {
        format: SampleFormat,
        expected: usize,
        actual: usize,
    },

    /// Buffer holds less than one whole frame
    #[error("PCM buffer too short: {len} bytes, need at least one {frame_size}-byte frame")]
    PcmLen { len: usize, frame_size: usize },

    /// Neither side of a channel conversion is mono
    #[error(
        "Cannot convert {from_channels} channels to {to_channels}: only mono to multi-channel or multi-channel to mono is supported"
    )]
    ChannelsConvert { from_channels: u16, to_channels: u16 },

    /// Resampler failure with no dedicated variant above
    #[error("Resampling failed: {0}")]
    Resampling(ResamplingError),
}

impl PcmError {
    pub(crate) fn frame_size(format: SampleFormat, expected: usize, actual: usize) -> Self {
        Self::FrameSize {
            format,
            expected,
            actual,
        }
    }
}

impl From<ResamplingError> for PcmError {
    fn from(err: ResamplingError) -> Self {
        match err {
            ResamplingError::InvalidSampleRate(rate) => Self::InvalidSampleRate(rate),
            ResamplingError::InvalidChannelCount(channels) => Self::InvalidChannels(channels),
            ResamplingError::FrameSize {
                format,
                expected,
                actual,
            } => Self::FrameSize {
                format,
                expected,
                actual,
            },
            other => Self::Resampling(other),
        }
    }
}
