//! Byte-order bridge
//!
//! Reversible conversion of raw buffers between little- and big-endian
//! layouts, frame by frame.

use crate::error::{PcmError, Result};
use crate::format::SampleFormat;
use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Byte order of multi-byte frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    #[serde(alias = "le", alias = "little")]
    LittleEndian,
    #[serde(alias = "be", alias = "big")]
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the host
    #[cfg(target_endian = "little")]
    pub const NATIVE: ByteOrder = ByteOrder::LittleEndian;
    #[cfg(target_endian = "big")]
    pub const NATIVE: ByteOrder = ByteOrder::BigEndian;

    pub const fn is_little_endian(self) -> bool {
        matches!(self, ByteOrder::LittleEndian)
    }

    pub const fn name(self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "little-endian",
            ByteOrder::BigEndian => "big-endian",
        }
    }
}

impl FromStr for ByteOrder {
    type Err = PcmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "le" | "little" | "little-endian" | "littleendian" => Ok(ByteOrder::LittleEndian),
            "be" | "big" | "big-endian" | "bigendian" => Ok(ByteOrder::BigEndian),
            _ => Err(PcmError::InvalidByteOrder(s.to_string())),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Re-encode every frame of `buffer` from `from` to `to`
///
/// Returns a copy when the orders match, the buffer is empty, or the format
/// is `U8`. Trailing bytes that do not form a whole frame are dropped.
pub fn swap_byte_order(
    buffer: &[u8],
    format: SampleFormat,
    from: ByteOrder,
    to: ByteOrder,
) -> Result<Vec<u8>> {
    if from == to || buffer.is_empty() {
        return Ok(buffer.to_vec());
    }

    let frame_size = format.frame_size();
    if buffer.len() < frame_size {
        return Err(PcmError::frame_size(format, frame_size, buffer.len()));
    }

    let whole = buffer.len() - buffer.len() % frame_size;
    if whole != buffer.len() {
        trace!(
            dropped = buffer.len() - whole,
            %format,
            "byte-order bridge truncated partial frame"
        );
    }

    if format == SampleFormat::U8 {
        return Ok(buffer[..whole].to_vec());
    }

    let mut out = Vec::with_capacity(whole);
    for frame in buffer[..whole].chunks_exact(frame_size) {
        Sample::decode(frame, format, from)?.encode_into(to, &mut out);
    }
    Ok(out)
}
