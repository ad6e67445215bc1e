//! Sample format catalog
//!
//! Static metadata for every supported PCM encoding. The frame size is the
//! single source of truth for all chunking in the other stages.

use crate::error::{PcmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric domain of a sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumericDomain {
    UnsignedInt,
    SignedInt,
    Float,
}

/// PCM sample encoding
///
/// Raw numeric tags follow declaration order (`U8 = 0` .. `F64 = 5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    S16,
    /// Signed 24-bit integer, packed in 3 bytes
    S24,
    /// Signed 32-bit integer
    S32,
    /// IEEE 754 single precision
    F32,
    /// IEEE 754 double precision
    F64,
}

impl SampleFormat {
    /// Every supported format, in tag order
    pub const ALL: [SampleFormat; 6] = [
        SampleFormat::U8,
        SampleFormat::S16,
        SampleFormat::S24,
        SampleFormat::S32,
        SampleFormat::F32,
        SampleFormat::F64,
    ];

    /// Size of one frame (one channel, one instant) in bytes
    pub const fn frame_size(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    pub const fn bits_per_sample(self) -> u32 {
        self.frame_size() as u32 * 8
    }

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "unsigned-8-bit",
            SampleFormat::S16 => "signed-16-bit",
            SampleFormat::S24 => "signed-24-bit",
            SampleFormat::S32 => "signed-32-bit",
            SampleFormat::F32 => "32-bit-float",
            SampleFormat::F64 => "64-bit-float",
        }
    }

    pub const fn domain(self) -> NumericDomain {
        match self {
            SampleFormat::U8 => NumericDomain::UnsignedInt,
            SampleFormat::S16 | SampleFormat::S24 | SampleFormat::S32 => NumericDomain::SignedInt,
            SampleFormat::F32 | SampleFormat::F64 => NumericDomain::Float,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self.domain(), NumericDomain::Float)
    }

    /// Raw numeric tag
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Whole frames contained in `len` bytes
    pub const fn frames_in(self, len: usize) -> usize {
        len / self.frame_size()
    }
}

impl TryFrom<u32> for SampleFormat {
    type Error = PcmError;

    fn try_from(tag: u32) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| PcmError::InvalidFormat(format!("tag {}", tag)))
    }
}

impl FromStr for SampleFormat {
    type Err = PcmError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| {
                lowered == format.name() || lowered == format!("{:?}", format).to_ascii_lowercase()
            })
            .ok_or_else(|| PcmError::InvalidFormat(s.to_string()))
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
