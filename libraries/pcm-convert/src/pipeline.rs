//! Conversion pipeline
//!
//! Sequences the channel mixer, format converter and resampler for one
//! stream:
//!
//! ```text
//!  source ─► downmix ─► format/order ─► [LE bridge ─► resample ─► BE bridge] ─► upmix ─► destination
//!            (N → 1)                     (only when the destination is big-endian)      (1 → N)
//! ```
//!
//! Downmixing happens before resampling and upmixing after, so the resampler
//! always runs at `min(source.channels, destination.channels)`.

use crate::byte_order::{swap_byte_order, ByteOrder};
use crate::channels::{average, duplicate};
use crate::convert::FormatConverter;
use crate::error::{PcmError, Result};
use crate::format::SampleFormat;
use crate::resampling::{Resampler, ResamplerConfig, ResamplerImpl};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One side of a conversion
///
/// Defaults to CD audio: 44.1 kHz stereo S16 little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamShape {
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub byte_order: ByteOrder,
    /// Interleaved channel count (1 = mono)
    pub channels: u16,
}

impl Default for StreamShape {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            format: SampleFormat::S16,
            byte_order: ByteOrder::LittleEndian,
            channels: 2,
        }
    }
}

impl StreamShape {
    pub fn new(sample_rate: u32, format: SampleFormat, byte_order: ByteOrder, channels: u16) -> Self {
        Self {
            sample_rate,
            format,
            byte_order,
            channels,
        }
    }

    /// Bytes per multi-channel frame group
    pub fn bytes_per_instant(&self) -> usize {
        self.format.frame_size() * usize::from(self.channels)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PcmError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(PcmError::InvalidChannels(usize::from(self.channels)));
        }
        Ok(())
    }
}

/// Fixed-order converter for one stream
///
/// `process` takes `&mut self`: the resampler keeps filter history, so calls
/// on one pipeline are serialized and must arrive in stream order. Separate
/// pipelines share nothing.
#[derive(Debug)]
pub struct ConversionPipeline {
    source: StreamShape,
    destination: StreamShape,
    converter: FormatConverter,
    resampler: Resampler,
}

impl ConversionPipeline {
    /// Validate both shapes and open the rubato-backed resampler
    pub fn new(
        source: StreamShape,
        destination: StreamShape,
        config: &ResamplerConfig,
    ) -> Result<Self> {
        let converter = Self::prepare(&source, &destination)?;
        let resampler = Resampler::open(
            source.sample_rate,
            destination.sample_rate,
            Self::resampling_channels(&source, &destination),
            destination.format,
            config,
        )?;
        Ok(Self::assemble(source, destination, converter, resampler))
    }

    /// Same as `new`, with a caller-supplied resampler backend
    ///
    /// The backend must report the source and destination rates and the
    /// narrower of the two channel counts.
    pub fn with_backend(
        source: StreamShape,
        destination: StreamShape,
        backend: Box<dyn ResamplerImpl>,
    ) -> Result<Self> {
        let converter = Self::prepare(&source, &destination)?;
        let resampler = Resampler::with_backend(backend, destination.format)?;

        let expected_channels = Self::resampling_channels(&source, &destination);
        if resampler.channels() != expected_channels {
            return Err(PcmError::InvalidChannels(resampler.channels()));
        }
        if resampler.input_rate() != source.sample_rate {
            return Err(PcmError::InvalidSampleRate(resampler.input_rate()));
        }
        if resampler.output_rate() != destination.sample_rate {
            return Err(PcmError::InvalidSampleRate(resampler.output_rate()));
        }
        Ok(Self::assemble(source, destination, converter, resampler))
    }

    /// Check a shape pair without opening a resampler
    ///
    /// Both shapes must be valid, and differing channel counts need a mono
    /// side.
    pub fn validate_shapes(source: &StreamShape, destination: &StreamShape) -> Result<()> {
        source.validate()?;
        destination.validate()?;

        if source.channels != destination.channels && source.channels != 1 && destination.channels != 1
        {
            return Err(PcmError::ChannelsConvert {
                from_channels: source.channels,
                to_channels: destination.channels,
            });
        }
        Ok(())
    }

    fn prepare(source: &StreamShape, destination: &StreamShape) -> Result<FormatConverter> {
        Self::validate_shapes(source, destination)?;

        Ok(FormatConverter::new(
            source.format,
            destination.format,
            source.byte_order,
            destination.byte_order,
        ))
    }

    fn resampling_channels(source: &StreamShape, destination: &StreamShape) -> usize {
        usize::from(source.channels.min(destination.channels))
    }

    fn assemble(
        source: StreamShape,
        destination: StreamShape,
        converter: FormatConverter,
        resampler: Resampler,
    ) -> Self {
        debug!(
            source_rate = source.sample_rate,
            source_format = %source.format,
            source_order = %source.byte_order,
            source_channels = source.channels,
            destination_rate = destination.sample_rate,
            destination_format = %destination.format,
            destination_order = %destination.byte_order,
            destination_channels = destination.channels,
            "conversion pipeline ready"
        );
        Self {
            source,
            destination,
            converter,
            resampler,
        }
    }

    pub fn source(&self) -> &StreamShape {
        &self.source
    }

    pub fn destination(&self) -> &StreamShape {
        &self.destination
    }

    /// Channel count the resampler runs at
    pub fn resampler_channels(&self) -> usize {
        self.resampler.channels()
    }

    /// Convert one buffer of the source stream
    ///
    /// Stops at the first failing stage; no partial output is returned.
    pub fn process(&mut self, buffer: &[u8]) -> Result<Vec<u8>> {
        let (src, dst) = (self.source, self.destination);
        let mut data = buffer.to_vec();

        if dst.channels < src.channels {
            data = average(&data, src.format, usize::from(src.channels), src.byte_order)?;
        }

        if !self.converter.is_identity() {
            data = self.converter.convert(&data)?;
        }

        if dst.sample_rate != src.sample_rate {
            data = self.resample(&data)?;
        }

        self.upmix(data)
    }

    /// Drain the resampler at end of stream
    ///
    /// The tail goes through the same post-resampling stages as `process`.
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        if self.destination.sample_rate == self.source.sample_rate {
            return Ok(Vec::new());
        }
        let tail = self.resampler.flush()?;
        let tail = self.to_destination_order(tail)?;
        self.upmix(tail)
    }

    /// Clear resampler continuity so the pipeline can start a new stream
    pub fn reset(&mut self) -> Result<()> {
        self.resampler.reset()?;
        Ok(())
    }

    /// Release the resampler
    pub fn release(mut self) -> Result<()> {
        self.close_resampler()
    }

    fn close_resampler(&mut self) -> Result<()> {
        if self.resampler.is_closed() {
            return Ok(());
        }
        self.resampler.close()?;
        debug!("conversion pipeline released");
        Ok(())
    }

    /// Resample in little-endian, bridging a big-endian destination
    fn resample(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let dst = self.destination;
        if dst.byte_order.is_little_endian() {
            return Ok(self.resampler.process(data)?);
        }
        let le = swap_byte_order(data, dst.format, ByteOrder::BigEndian, ByteOrder::LittleEndian)?;
        let resampled = self.resampler.process(&le)?;
        self.to_destination_order(resampled)
    }

    fn to_destination_order(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let dst = self.destination;
        if dst.byte_order.is_little_endian() {
            return Ok(data);
        }
        swap_byte_order(&data, dst.format, ByteOrder::LittleEndian, dst.byte_order)
    }

    fn upmix(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let (src, dst) = (self.source, self.destination);
        if dst.channels > src.channels {
            return duplicate(&data, dst.format, usize::from(dst.channels));
        }
        Ok(data)
    }
}

impl Drop for ConversionPipeline {
    fn drop(&mut self) {
        if !self.resampler.is_closed() {
            debug!("conversion pipeline dropped without release, releasing now");
            if let Err(err) = self.close_resampler() {
                warn!(error = %err, "failed to release resampler");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampling::ResamplingQuality;

    const LE: ByteOrder = ByteOrder::LittleEndian;
    const BE: ByteOrder = ByteOrder::BigEndian;

    fn quick() -> ResamplerConfig {
        ResamplerConfig {
            quality: ResamplingQuality::Quick,
            worker_threads: 1,
            chunk_frames: Some(64),
        }
    }

    fn shape(rate: u32, format: SampleFormat, order: ByteOrder, channels: u16) -> StreamShape {
        StreamShape::new(rate, format, order, channels)
    }

    #[test]
    fn test_validation() {
        let good = shape(8000, SampleFormat::S16, LE, 1);
        let zero_rate = shape(0, SampleFormat::S16, LE, 1);
        let zero_channels = shape(8000, SampleFormat::S16, LE, 0);

        assert_eq!(
            ConversionPipeline::new(zero_rate, good, &quick()).unwrap_err(),
            PcmError::InvalidSampleRate(0)
        );
        assert_eq!(
            ConversionPipeline::new(good, zero_channels, &quick()).unwrap_err(),
            PcmError::InvalidChannels(0)
        );
    }

    #[test]
    fn test_rejects_n_to_m_channels() {
        let src = shape(8000, SampleFormat::S16, LE, 2);
        let dst = shape(8000, SampleFormat::S16, LE, 3);
        assert_eq!(
            ConversionPipeline::new(src, dst, &quick()).unwrap_err(),
            PcmError::ChannelsConvert {
                from_channels: 2,
                to_channels: 3
            }
        );
    }

    #[test]
    fn test_validate_shapes() {
        let stereo = shape(48000, SampleFormat::S16, LE, 2);
        let mono = shape(48000, SampleFormat::F32, BE, 1);
        let surround = shape(48000, SampleFormat::S16, LE, 6);

        ConversionPipeline::validate_shapes(&stereo, &mono).unwrap();
        ConversionPipeline::validate_shapes(&mono, &surround).unwrap();
        assert_eq!(
            ConversionPipeline::validate_shapes(&surround, &stereo),
            Err(PcmError::ChannelsConvert {
                from_channels: 6,
                to_channels: 2
            })
        );
    }

    #[test]
    fn test_resampler_runs_at_narrower_channel_count() {
        let src = shape(8000, SampleFormat::S16, LE, 1);
        let dst = shape(16000, SampleFormat::S16, LE, 6);
        let pipeline = ConversionPipeline::new(src, dst, &quick()).unwrap();
        assert_eq!(pipeline.resampler_channels(), 1);

        let pipeline = ConversionPipeline::new(dst, src, &quick()).unwrap();
        assert_eq!(pipeline.resampler_channels(), 1);
    }

    #[test]
    fn test_identity_pipeline_copies_input() {
        let s = shape(44100, SampleFormat::S24, BE, 2);
        let mut pipeline = ConversionPipeline::new(s, s, &quick()).unwrap();
        let input: Vec<u8> = (0..12).collect();
        assert_eq!(pipeline.process(&input).unwrap(), input);
        assert!(pipeline.flush().unwrap().is_empty());
        pipeline.release().unwrap();
    }

    #[test]
    fn test_downmix_then_convert() {
        let src = shape(8000, SampleFormat::U8, LE, 2);
        let dst = shape(8000, SampleFormat::S16, BE, 1);
        let mut pipeline = ConversionPipeline::new(src, dst, &quick()).unwrap();
        // (10 + 20) / 2 = 15 -> byte window [15, 0] in big-endian
        assert_eq!(pipeline.process(&[10, 20]).unwrap(), vec![15, 0]);
    }

    #[test]
    fn test_convert_then_upmix() {
        let src = shape(8000, SampleFormat::S16, LE, 1);
        let dst = shape(8000, SampleFormat::S16, BE, 2);
        let mut pipeline = ConversionPipeline::new(src, dst, &quick()).unwrap();
        assert_eq!(
            pipeline.process(&[0x34, 0x12]).unwrap(),
            vec![0x12, 0x34, 0x12, 0x34]
        );
    }

    #[test]
    fn test_release_then_drop_is_quiet() {
        let s = shape(8000, SampleFormat::F32, LE, 1);
        let pipeline = ConversionPipeline::new(s, s, &quick()).unwrap();
        pipeline.release().unwrap();
    }

    #[test]
    fn test_stage_error_aborts() {
        let src = shape(8000, SampleFormat::S32, LE, 1);
        let dst = shape(8000, SampleFormat::S16, LE, 1);
        let mut pipeline = ConversionPipeline::new(src, dst, &quick()).unwrap();
        assert_eq!(
            pipeline.process(&[1, 2, 3]).unwrap_err(),
            PcmError::PcmLen {
                len: 3,
                frame_size: 4
            }
        );
    }
}
