//! Channel mixer
//!
//! Mono to N-channel upmix by duplication, N-channel to mono downmix by
//! averaging. Neither direction changes the sample format or byte order.

use crate::byte_order::ByteOrder;
use crate::error::{PcmError, Result};
use crate::format::SampleFormat;
use crate::sample::Sample;
use tracing::trace;

/// Shared length checks. `Ok(None)` means the buffer is empty.
fn whole_len(buffer: &[u8], format: SampleFormat, group: usize) -> Result<Option<usize>> {
    if buffer.is_empty() {
        return Ok(None);
    }
    let frame_size = format.frame_size();
    if buffer.len() < frame_size {
        return Err(PcmError::frame_size(format, frame_size, buffer.len()));
    }

    let group_size = frame_size * group;
    let whole = buffer.len() - buffer.len() % group_size;
    if whole != buffer.len() {
        trace!(
            dropped = buffer.len() - whole,
            %format,
            channels = group,
            "channel mixer truncated partial frame group"
        );
    }
    Ok(Some(whole))
}

/// Upmix a mono buffer to `target_channels` by repeating every frame
///
/// Frames are copied byte for byte; there is no gain compensation.
pub fn duplicate(buffer: &[u8], format: SampleFormat, target_channels: usize) -> Result<Vec<u8>> {
    if target_channels == 1 {
        return Ok(buffer.to_vec());
    }
    if target_channels == 0 {
        return Err(PcmError::InvalidChannels(target_channels));
    }
    let Some(whole) = whole_len(buffer, format, 1)? else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(whole * target_channels);
    for frame in buffer[..whole].chunks_exact(format.frame_size()) {
        for _ in 0..target_channels {
            out.extend_from_slice(frame);
        }
    }
    Ok(out)
}

/// Downmix an interleaved `channels`-channel buffer to mono
///
/// Each output frame is the arithmetic mean of its group, accumulated in
/// f64 and narrowed back to `format` by truncation toward zero.
pub fn average(
    buffer: &[u8],
    format: SampleFormat,
    channels: usize,
    order: ByteOrder,
) -> Result<Vec<u8>> {
    if channels == 1 {
        return Ok(buffer.to_vec());
    }
    if channels == 0 {
        return Err(PcmError::InvalidChannels(channels));
    }
    let Some(whole) = whole_len(buffer, format, channels)? else {
        return Ok(Vec::new());
    };

    let frame_size = format.frame_size();
    let mut out = Vec::with_capacity(whole / channels);
    for group in buffer[..whole].chunks_exact(frame_size * channels) {
        let values = group
            .chunks_exact(frame_size)
            .map(|frame| Sample::decode(frame, format, order).map(Sample::to_f64))
            .collect::<Result<Vec<_>>>()?;
        let mean = if format.is_float() {
            float_mean(&values)
        } else {
            values.iter().sum::<f64>() / channels as f64
        };
        Sample::from_f64_truncating(mean, format).encode_into(order, &mut out);
    }
    Ok(out)
}

/// Mean as an offset from the first value, so a group of equal floats
/// averages back to the same bits
fn float_mean(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    let offset: f64 = values.iter().map(|v| v - first).sum();
    first + offset / values.len() as f64
}
