//! PCM format conversion
//!
//! Converts raw interleaved PCM between sample formats, byte orders,
//! channel layouts and sample rates.
//!
//! This crate provides:
//! - A catalog of six sample formats (`U8`, `S16`, `S24`, `S32`, `F32`, `F64`)
//! - Byte-order swapping for every format
//! - Frame-level format conversion through an `F32`/`S32` hub
//! - Mono/N-channel mixing (duplicate up, average down)
//! - Sample-rate conversion backed by rubato
//! - A pipeline that runs all of the above in a fixed order
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌────────┐
//! │ source PCM │──►│ downmix  │──►│ format/order │──►│ resampler │──►│ upmix  │──► destination PCM
//! └────────────┘   └──────────┘   └──────────────┘   └───────────┘   └────────┘
//! ```
//!
//! Every stage takes a byte slice and returns a new `Vec<u8>`. Trailing
//! bytes that do not form a whole frame are dropped.
//!
//! # Example
//!
//! ```rust
//! use pcm_convert::{ByteOrder, ConversionPipeline, SampleFormat, StreamShape};
//! use pcm_convert::resampling::ResamplerConfig;
//!
//! # fn example() -> pcm_convert::Result<()> {
//! let source = StreamShape::new(48_000, SampleFormat::S16, ByteOrder::LittleEndian, 2);
//! let destination = StreamShape::new(48_000, SampleFormat::F32, ByteOrder::BigEndian, 1);
//!
//! let mut pipeline = ConversionPipeline::new(source, destination, &ResamplerConfig::default())?;
//! let output = pipeline.process(&[0x00, 0x40, 0x00, 0x40])?;
//! assert_eq!(output, 0.5f32.to_be_bytes().to_vec());
//! pipeline.release()?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![deny(unsafe_code)]

mod byte_order;
mod channels;
mod convert;
mod error;
mod format;
mod pipeline;
pub mod resampling;
mod sample;

pub use byte_order::{swap_byte_order, ByteOrder};
pub use channels::{average, duplicate};
pub use convert::{convert_frame, float_to_pivot, pivot_to_float, FormatConverter};
pub use error::{PcmError, Result};
pub use format::{NumericDomain, SampleFormat};
pub use pipeline::{ConversionPipeline, StreamShape};
pub use resampling::{
    Resampler, ResamplerConfig, ResamplerImpl, ResamplingError, ResamplingQuality,
    RubatoResampler,
};
pub use sample::Sample;
