//! Tagged sample values
//!
//! `Sample` carries one decoded frame in the native numeric type of its
//! format. Every stage that needs the numeric value of a frame goes through
//! `Sample::decode` and `Sample::encode_into` instead of matching on raw
//! byte layouts itself.

use crate::byte_order::ByteOrder;
use crate::error::{PcmError, Result};
use crate::format::SampleFormat;

const S24_MIN: i32 = -(1 << 23);
const S24_MAX: i32 = (1 << 23) - 1;

/// One decoded frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    U8(u8),
    S16(i16),
    /// Sign-extended 24-bit value
    S24(i32),
    S32(i32),
    F32(f32),
    F64(f64),
}

/// Copy a frame into a fixed array, validating its length
fn frame_array<const N: usize>(frame: &[u8], format: SampleFormat) -> Result<[u8; N]> {
    frame
        .try_into()
        .map_err(|_| PcmError::frame_size(format, N, frame.len()))
}

impl Sample {
    /// Decode one frame of `format` stored in `order`
    pub fn decode(frame: &[u8], format: SampleFormat, order: ByteOrder) -> Result<Self> {
        let le = order.is_little_endian();
        let sample = match format {
            SampleFormat::U8 => Sample::U8(frame_array::<1>(frame, format)?[0]),
            SampleFormat::S16 => {
                let bytes = frame_array::<2>(frame, format)?;
                Sample::S16(if le {
                    i16::from_le_bytes(bytes)
                } else {
                    i16::from_be_bytes(bytes)
                })
            }
            SampleFormat::S24 => {
                let [a, b, c] = frame_array::<3>(frame, format)?;
                // Place the 24 bits high in an i32 and shift back down to sign-extend
                let widened = if le {
                    i32::from_le_bytes([0, a, b, c])
                } else {
                    i32::from_be_bytes([a, b, c, 0])
                };
                Sample::S24(widened >> 8)
            }
            SampleFormat::S32 => {
                let bytes = frame_array::<4>(frame, format)?;
                Sample::S32(if le {
                    i32::from_le_bytes(bytes)
                } else {
                    i32::from_be_bytes(bytes)
                })
            }
            SampleFormat::F32 => {
                let bytes = frame_array::<4>(frame, format)?;
                Sample::F32(if le {
                    f32::from_le_bytes(bytes)
                } else {
                    f32::from_be_bytes(bytes)
                })
            }
            SampleFormat::F64 => {
                let bytes = frame_array::<8>(frame, format)?;
                Sample::F64(if le {
                    f64::from_le_bytes(bytes)
                } else {
                    f64::from_be_bytes(bytes)
                })
            }
        };
        Ok(sample)
    }

    /// Append the encoded frame to `out`
    pub fn encode_into(self, order: ByteOrder, out: &mut Vec<u8>) {
        let le = order.is_little_endian();
        match self {
            Sample::U8(v) => out.push(v),
            Sample::S16(v) => out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() }),
            Sample::S24(v) => {
                if le {
                    out.extend_from_slice(&v.to_le_bytes()[..3]);
                } else {
                    out.extend_from_slice(&v.to_be_bytes()[1..]);
                }
            }
            Sample::S32(v) => out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() }),
            Sample::F32(v) => out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() }),
            Sample::F64(v) => out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() }),
        }
    }

    pub fn encode(self, order: ByteOrder) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.format().frame_size());
        self.encode_into(order, &mut out);
        out
    }

    pub fn format(self) -> SampleFormat {
        match self {
            Sample::U8(_) => SampleFormat::U8,
            Sample::S16(_) => SampleFormat::S16,
            Sample::S24(_) => SampleFormat::S24,
            Sample::S32(_) => SampleFormat::S32,
            Sample::F32(_) => SampleFormat::F32,
            Sample::F64(_) => SampleFormat::F64,
        }
    }

    /// Raw numeric value, no scaling
    pub fn to_f64(self) -> f64 {
        match self {
            Sample::U8(v) => f64::from(v),
            Sample::S16(v) => f64::from(v),
            Sample::S24(v) | Sample::S32(v) => f64::from(v),
            Sample::F32(v) => f64::from(v),
            Sample::F64(v) => v,
        }
    }

    /// Narrow a raw numeric value into `format`
    ///
    /// Integer targets truncate toward zero and saturate at the format's
    /// bounds (NaN becomes 0).
    pub fn from_f64_truncating(value: f64, format: SampleFormat) -> Self {
        match format {
            SampleFormat::U8 => Sample::U8(value as u8),
            SampleFormat::S16 => Sample::S16(value as i16),
            SampleFormat::S24 => Sample::S24((value as i32).clamp(S24_MIN, S24_MAX)),
            SampleFormat::S32 => Sample::S32(value as i32),
            SampleFormat::F32 => Sample::F32(value as f32),
            SampleFormat::F64 => Sample::F64(value),
        }
    }

    /// Value scaled to nominal full scale `[-1.0, 1.0)`
    ///
    /// `U8` is offset-binary around 128. Float formats pass through.
    pub fn to_normalized(self) -> f64 {
        match self {
            Sample::U8(v) => (f64::from(v) - 128.0) / 128.0,
            Sample::S16(v) => f64::from(v) / 32_768.0,
            Sample::S24(v) => f64::from(v) / 8_388_608.0,
            Sample::S32(v) => f64::from(v) / 2_147_483_648.0,
            Sample::F32(v) => f64::from(v),
            Sample::F64(v) => v,
        }
    }

    /// Inverse of `to_normalized`, rounding to nearest and saturating
    pub fn from_normalized(value: f64, format: SampleFormat) -> Self {
        match format {
            SampleFormat::U8 => Sample::U8((value * 128.0 + 128.0).round() as u8),
            SampleFormat::S16 => Sample::S16((value * 32_768.0).round() as i16),
            SampleFormat::S24 => {
                Sample::S24(((value * 8_388_608.0).round() as i32).clamp(S24_MIN, S24_MAX))
            }
            SampleFormat::S32 => Sample::S32((value * 2_147_483_648.0).round() as i32),
            SampleFormat::F32 => Sample::F32(value as f32),
            SampleFormat::F64 => Sample::F64(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s24_sign_extension() {
        let le = Sample::decode(&[0xFF, 0xFF, 0xFF], SampleFormat::S24, ByteOrder::LittleEndian)
            .unwrap();
        assert_eq!(le, Sample::S24(-1));

        let be = Sample::decode(&[0x80, 0x00, 0x00], SampleFormat::S24, ByteOrder::BigEndian)
            .unwrap();
        assert_eq!(be, Sample::S24(S24_MIN));
    }

    #[test]
    fn test_s24_encode_layout() {
        let sample = Sample::S24(0x123456);
        assert_eq!(sample.encode(ByteOrder::LittleEndian), vec![0x56, 0x34, 0x12]);
        assert_eq!(sample.encode(ByteOrder::BigEndian), vec![0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = Sample::decode(&[0, 1, 2], SampleFormat::S32, ByteOrder::LittleEndian)
            .unwrap_err();
        assert_eq!(
            err,
            PcmError::FrameSize {
                format: SampleFormat::S32,
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_truncating_narrow() {
        assert_eq!(Sample::from_f64_truncating(15.9, SampleFormat::U8), Sample::U8(15));
        assert_eq!(Sample::from_f64_truncating(-2.7, SampleFormat::S16), Sample::S16(-2));
        assert_eq!(
            Sample::from_f64_truncating(1e12, SampleFormat::S24),
            Sample::S24(S24_MAX)
        );
        assert_eq!(
            Sample::from_f64_truncating(f64::NAN, SampleFormat::S32),
            Sample::S32(0)
        );
    }

    #[test]
    fn test_normalized_round_trip_integers() {
        for sample in [
            Sample::U8(0),
            Sample::U8(255),
            Sample::S16(i16::MIN),
            Sample::S16(1234),
            Sample::S24(S24_MAX),
            Sample::S32(i32::MIN),
            Sample::S32(-77),
        ] {
            let back = Sample::from_normalized(sample.to_normalized(), sample.format());
            assert_eq!(back, sample);
        }
    }

    #[test]
    fn test_from_normalized_saturates() {
        assert_eq!(Sample::from_normalized(2.0, SampleFormat::S16), Sample::S16(i16::MAX));
        assert_eq!(Sample::from_normalized(-2.0, SampleFormat::U8), Sample::U8(0));
    }
}
