//! Format converter
//!
//! Re-encodes frames between any two sample formats with `F32` as the
//! numeric hub:
//!
//! ```text
//!   F64 ──narrow──► F32 ──pivot──► S32 ──window──► S24 / S16 / U8
//!    ▲               │ ▲                              │
//!    └────widen──────┘ └──────────pivot───────────────┘
//! ```
//!
//! Conversions between two integer formats never touch a float. They resize
//! the frame's byte window: the most significant bytes stay aligned and the
//! least significant end is zero-filled or dropped. This is a byte copy, not
//! an amplitude-correct bit-depth change (`U8` is copied as if it were
//! signed, and narrowing does not round), and it is kept that way so output
//! stays byte-compatible with existing consumers of this converter.

use crate::byte_order::{swap_byte_order, ByteOrder};
use crate::error::{PcmError, Result};
use crate::format::SampleFormat;
use crate::sample::Sample;
use tracing::trace;

/// Scale between the f32 hub and the i32 pivot
const PIVOT_SCALE: f64 = 2_147_483_647.0;

/// Map a hub float onto the signed 32-bit pivot
///
/// `v * 2147483647`, truncated toward zero and saturated to the `i32` range.
pub fn float_to_pivot(value: f32) -> i32 {
    let scaled = f64::from(value) * PIVOT_SCALE;
    if scaled > f64::from(i32::MAX) {
        return i32::MAX;
    }
    if scaled < f64::from(i32::MIN) {
        return i32::MIN;
    }
    scaled as i32
}

/// Map the signed 32-bit pivot back onto the hub float
pub fn pivot_to_float(pivot: i32) -> f32 {
    pivot as f32 / i32::MAX as f32
}

/// Resize a frame's byte window to `len` bytes, keeping the most
/// significant bytes aligned
fn resize_window(frame: &[u8], len: usize, order: ByteOrder, out: &mut Vec<u8>) {
    let keep = frame.len().min(len);
    match order {
        ByteOrder::LittleEndian => {
            out.extend(std::iter::repeat(0).take(len - keep));
            out.extend_from_slice(&frame[frame.len() - keep..]);
        }
        ByteOrder::BigEndian => {
            out.extend_from_slice(&frame[..keep]);
            out.extend(std::iter::repeat(0).take(len - keep));
        }
    }
}

/// Convert a single frame from `src` to `dst`, both stored in `order`
///
/// The encoded result is appended to `out`.
pub fn convert_frame(
    frame: &[u8],
    src: SampleFormat,
    dst: SampleFormat,
    order: ByteOrder,
    out: &mut Vec<u8>,
) -> Result<()> {
    if frame.len() != src.frame_size() {
        return Err(PcmError::frame_size(src, src.frame_size(), frame.len()));
    }

    if src == dst {
        out.extend_from_slice(frame);
        return Ok(());
    }

    match (src, dst) {
        (SampleFormat::F64, _) => {
            let value = Sample::decode(frame, src, order)?.to_f64();
            let hub = Sample::F32(value as f32).encode(order);
            convert_frame(&hub, SampleFormat::F32, dst, order, out)
        }
        (_, SampleFormat::F64) => {
            let mut hub = Vec::with_capacity(SampleFormat::F32.frame_size());
            convert_frame(frame, src, SampleFormat::F32, order, &mut hub)?;
            // f32 -> f64 is exact, so decoding the hub through to_f64 widens it
            let value = Sample::decode(&hub, SampleFormat::F32, order)?.to_f64();
            Sample::F64(value).encode_into(order, out);
            Ok(())
        }
        (SampleFormat::F32, _) => {
            let value = Sample::decode(frame, src, order)?.to_f64() as f32;
            let pivot = Sample::S32(float_to_pivot(value)).encode(order);
            convert_frame(&pivot, SampleFormat::S32, dst, order, out)
        }
        (_, SampleFormat::F32) => {
            let mut window = Vec::with_capacity(SampleFormat::S32.frame_size());
            resize_window(frame, SampleFormat::S32.frame_size(), order, &mut window);
            let pivot = Sample::decode(&window, SampleFormat::S32, order)?.to_f64() as i32;
            Sample::F32(pivot_to_float(pivot)).encode_into(order, out);
            Ok(())
        }
        _ => {
            resize_window(frame, dst.frame_size(), order, out);
            Ok(())
        }
    }
}

/// Buffer-level converter for one `(format, byte order)` pair
///
/// Stateless; one instance can serve any number of threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatConverter {
    src_format: SampleFormat,
    dst_format: SampleFormat,
    src_order: ByteOrder,
    dst_order: ByteOrder,
}

impl FormatConverter {
    pub fn new(
        src_format: SampleFormat,
        dst_format: SampleFormat,
        src_order: ByteOrder,
        dst_order: ByteOrder,
    ) -> Self {
        Self {
            src_format,
            dst_format,
            src_order,
            dst_order,
        }
    }

    pub fn src_format(&self) -> SampleFormat {
        self.src_format
    }

    pub fn dst_format(&self) -> SampleFormat {
        self.dst_format
    }

    pub fn src_order(&self) -> ByteOrder {
        self.src_order
    }

    pub fn dst_order(&self) -> ByteOrder {
        self.dst_order
    }

    /// True when `convert` only copies whole frames
    pub fn is_identity(&self) -> bool {
        self.src_format == self.dst_format && self.src_order == self.dst_order
    }

    /// Bytes produced for `len` input bytes
    pub fn output_len(&self, len: usize) -> usize {
        self.src_format.frames_in(len) * self.dst_format.frame_size()
    }

    /// Convert a whole buffer
    ///
    /// Fails with `PcmLen` when the buffer holds no whole source frame.
    /// A trailing partial frame is dropped.
    pub fn convert(&self, buffer: &[u8]) -> Result<Vec<u8>> {
        let frame_size = self.src_format.frame_size();
        if buffer.len() < frame_size {
            return Err(PcmError::PcmLen {
                len: buffer.len(),
                frame_size,
            });
        }

        let whole = buffer.len() - buffer.len() % frame_size;
        if whole != buffer.len() {
            trace!(
                dropped = buffer.len() - whole,
                format = %self.src_format,
                "format converter truncated partial frame"
            );
        }

        let mut out = Vec::with_capacity(self.output_len(whole));
        for frame in buffer[..whole].chunks_exact(frame_size) {
            if self.src_order == self.dst_order {
                convert_frame(frame, self.src_format, self.dst_format, self.dst_order, &mut out)?;
            } else {
                let reordered =
                    swap_byte_order(frame, self.src_format, self.src_order, self.dst_order)?;
                convert_frame(
                    &reordered,
                    self.src_format,
                    self.dst_format,
                    self.dst_order,
                    &mut out,
                )?;
            }
        }
        Ok(out)
    }
}
