//! Rubato resampler backend
//!
//! One mono rubato resampler per channel ("lane"). Lanes are fed identical
//! frame counts, so they always produce identical output lengths and can be
//! re-interleaved frame by frame. Large buffers spread the lanes over scoped
//! worker threads.

use super::{ResamplerConfig, ResamplerImpl, ResamplingError, ResamplingQuality, Result};
use rubato::{
    FastFixedIn, FastFixedOut, PolynomialDegree, Resampler as RubatoResamplerTrait, SincFixedIn,
    SincFixedOut, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;
use std::thread;

/// Below this many frames per call, lanes run on the calling thread
const PARALLEL_MIN_FRAMES: usize = 4096;

/// Enum to hold different rubato resampler types
enum RubatoResamplerType {
    FastIn(FastFixedIn<f64>),
    FastOut(FastFixedOut<f64>),
    SincIn(SincFixedIn<f64>),
    SincOut(SincFixedOut<f64>),
}

impl RubatoResamplerType {
    fn new(ratio: f64, quality: ResamplingQuality, chunk_size: usize) -> Result<Self> {
        let init_failed = |kind: &str, e: rubato::ResamplerConstructionError| {
            ResamplingError::InitializationFailed(format!("{} creation failed: {}", kind, e))
        };

        let resampler = match quality {
            ResamplingQuality::Quick | ResamplingQuality::Low => {
                let degree = if quality == ResamplingQuality::Quick {
                    PolynomialDegree::Linear
                } else {
                    PolynomialDegree::Cubic
                };
                if ratio >= 1.0 {
                    Self::FastIn(
                        FastFixedIn::new(ratio, 2.0, degree, chunk_size, 1)
                            .map_err(|e| init_failed("FastFixedIn", e))?,
                    )
                } else {
                    Self::FastOut(
                        FastFixedOut::new(ratio, 2.0, degree, chunk_size, 1)
                            .map_err(|e| init_failed("FastFixedOut", e))?,
                    )
                }
            }
            _ => {
                let params = quality_to_params(quality);
                if ratio >= 1.0 {
                    Self::SincIn(
                        SincFixedIn::<f64>::new(ratio, 2.0, params, chunk_size, 1)
                            .map_err(|e| init_failed("SincFixedIn", e))?,
                    )
                } else {
                    Self::SincOut(
                        SincFixedOut::<f64>::new(ratio, 2.0, params, chunk_size, 1)
                            .map_err(|e| init_failed("SincFixedOut", e))?,
                    )
                }
            }
        };
        Ok(resampler)
    }

    fn input_frames_next(&self) -> usize {
        match self {
            Self::FastIn(r) => r.input_frames_next(),
            Self::FastOut(r) => r.input_frames_next(),
            Self::SincIn(r) => r.input_frames_next(),
            Self::SincOut(r) => r.input_frames_next(),
        }
    }

    fn output_delay(&self) -> usize {
        match self {
            Self::FastIn(r) => r.output_delay(),
            Self::FastOut(r) => r.output_delay(),
            Self::SincIn(r) => r.output_delay(),
            Self::SincOut(r) => r.output_delay(),
        }
    }

    fn process(&mut self, chunk: &[f64]) -> Result<Vec<f64>> {
        let wave_in: [&[f64]; 1] = [chunk];
        let output = match self {
            Self::FastIn(r) => r.process(&wave_in[..], None),
            Self::FastOut(r) => r.process(&wave_in[..], None),
            Self::SincIn(r) => r.process(&wave_in[..], None),
            Self::SincOut(r) => r.process(&wave_in[..], None),
        }
        .map_err(|e| ResamplingError::ProcessingFailed(format!("rubato process failed: {}", e)))?;
        Ok(output.into_iter().next().unwrap_or_default())
    }

    /// Zero-padded partial chunk; `None` pushes pure silence through the
    /// delay line
    fn process_partial(&mut self, chunk: Option<&[f64]>) -> Result<Vec<f64>> {
        let wave_in: Option<[&[f64]; 1]> = chunk.map(|samples| [samples]);
        let wave_in = wave_in.as_ref().map(|channels| &channels[..]);
        let output = match self {
            Self::FastIn(r) => r.process_partial(wave_in, None),
            Self::FastOut(r) => r.process_partial(wave_in, None),
            Self::SincIn(r) => r.process_partial(wave_in, None),
            Self::SincOut(r) => r.process_partial(wave_in, None),
        }
        .map_err(|e| ResamplingError::ProcessingFailed(format!("rubato flush failed: {}", e)))?;
        Ok(output.into_iter().next().unwrap_or_default())
    }

    fn reset(&mut self) {
        match self {
            Self::FastIn(r) => r.reset(),
            Self::FastOut(r) => r.reset(),
            Self::SincIn(r) => r.reset(),
            Self::SincOut(r) => r.reset(),
        }
    }
}

/// Convert a sinc quality preset to rubato parameters
fn quality_to_params(quality: ResamplingQuality) -> SincInterpolationParameters {
    match quality {
        ResamplingQuality::Quick | ResamplingQuality::Low | ResamplingQuality::Medium => {
            SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.9,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 128,
                window: WindowFunction::Blackman,
            }
        }
        ResamplingQuality::High => SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris,
        },
        ResamplingQuality::VeryHigh => SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.99,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 512,
            window: WindowFunction::BlackmanHarris2,
        },
    }
}

/// One channel: a mono resampler plus the input it has not consumed yet
struct Lane {
    resampler: RubatoResamplerType,
    /// Samples waiting for a complete chunk
    pending: VecDeque<f64>,
    /// Frames pushed since the last reset
    frames_in: u64,
    /// Frames handed out since the last reset
    frames_out: u64,
}

/// Upper bound on silent chunks pushed while draining the delay line
const MAX_DRAIN_CHUNKS: usize = 64;

impl Lane {
    fn new(resampler: RubatoResamplerType) -> Self {
        Self {
            resampler,
            pending: VecDeque::new(),
            frames_in: 0,
            frames_out: 0,
        }
    }

    fn push(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        self.pending.extend(input.iter().copied());
        self.frames_in += input.len() as u64;

        let mut output = Vec::new();
        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f64> = self.pending.drain(..needed).collect();
            output.extend(self.resampler.process(&chunk)?);
        }
        self.frames_out += output.len() as u64;
        Ok(output)
    }

    /// Drain held-back input and the filter delay line
    ///
    /// The whole stream comes out as `ceil(frames_in * ratio)` frames plus
    /// `output_delay`, however the input lined up with the chunk size.
    fn flush(&mut self, ratio: f64) -> Result<Vec<f64>> {
        if self.frames_in == 0 {
            self.pending.clear();
            return Ok(Vec::new());
        }
        let total = (self.frames_in as f64 * ratio).ceil() as u64
            + self.resampler.output_delay() as u64;
        let needed = total.saturating_sub(self.frames_out) as usize;

        let mut output = Vec::with_capacity(needed);
        if !self.pending.is_empty() {
            let remaining: Vec<f64> = self.pending.drain(..).collect();
            output.extend(self.resampler.process_partial(Some(&remaining))?);
        }
        for _ in 0..MAX_DRAIN_CHUNKS {
            if output.len() >= needed {
                break;
            }
            let tail = self.resampler.process_partial(None)?;
            if tail.is_empty() {
                break;
            }
            output.extend(tail);
        }
        output.truncate(needed);
        self.frames_out += output.len() as u64;
        Ok(output)
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.frames_in = 0;
        self.frames_out = 0;
        self.resampler.reset();
    }
}

/// Rubato-based resampler implementation
pub struct RubatoResampler {
    lanes: Vec<Lane>,
    input_rate: u32,
    output_rate: u32,
    worker_threads: usize,
}

impl RubatoResampler {
    /// Create a new rubato resampler
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        config: &ResamplerConfig,
    ) -> Result<Self> {
        if input_rate == 0 {
            return Err(ResamplingError::InvalidSampleRate(input_rate));
        }
        if output_rate == 0 {
            return Err(ResamplingError::InvalidSampleRate(output_rate));
        }
        if channels == 0 {
            return Err(ResamplingError::InvalidChannelCount(channels));
        }

        let ratio = f64::from(output_rate) / f64::from(input_rate);
        let chunk_size = config.chunk_frames();
        let lanes = (0..channels)
            .map(|_| RubatoResamplerType::new(ratio, config.quality, chunk_size).map(Lane::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            lanes,
            input_rate,
            output_rate,
            worker_threads: config.worker_threads.max(1),
        })
    }

    fn ratio(&self) -> f64 {
        f64::from(self.output_rate) / f64::from(self.input_rate)
    }

    fn is_passthrough(&self) -> bool {
        self.input_rate == self.output_rate
    }

    /// Deinterleave samples from [L, R, L, R, ...] to [[L, L, ...], [R, R, ...]]
    fn deinterleave(&self, interleaved: &[f64]) -> Vec<Vec<f64>> {
        let channels = self.lanes.len();
        let frames = interleaved.len() / channels;
        let mut split = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (lane, &sample) in split.iter_mut().zip(frame) {
                lane.push(sample);
            }
        }
        split
    }

    /// Interleave samples from [[L, L, ...], [R, R, ...]] to [L, R, L, R, ...]
    fn interleave(&self, lanes: Vec<Vec<f64>>) -> Vec<f64> {
        let frames = lanes.iter().map(Vec::len).min().unwrap_or(0);
        let mut interleaved = Vec::with_capacity(frames * lanes.len());
        for frame_idx in 0..frames {
            for lane in &lanes {
                interleaved.push(lane[frame_idx]);
            }
        }
        interleaved
    }

    /// Run `op` on every lane, on worker threads when `parallel` is set
    fn run_lanes<F>(&mut self, inputs: &[Vec<f64>], parallel: bool, op: F) -> Result<Vec<Vec<f64>>>
    where
        F: Fn(&mut Lane, &[f64]) -> Result<Vec<f64>> + Sync,
    {
        let lane_count = self.lanes.len();
        let workers = self.worker_threads.min(lane_count);
        if !parallel || workers <= 1 {
            return self
                .lanes
                .iter_mut()
                .zip(inputs)
                .map(|(lane, input)| op(lane, input.as_slice()))
                .collect();
        }

        let per_worker = lane_count.div_ceil(workers);
        let op = &op;
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .lanes
                .chunks_mut(per_worker)
                .zip(inputs.chunks(per_worker))
                .map(|(lanes, inputs)| {
                    scope.spawn(move || {
                        lanes
                            .iter_mut()
                            .zip(inputs)
                            .map(|(lane, input)| op(lane, input.as_slice()))
                            .collect::<Result<Vec<_>>>()
                    })
                })
                .collect();

            let mut outputs = Vec::with_capacity(lane_count);
            for handle in handles {
                let lane_outputs = handle.join().map_err(|_| {
                    ResamplingError::ProcessingFailed("resampler worker panicked".to_string())
                })??;
                outputs.extend(lane_outputs);
            }
            Ok(outputs)
        })
    }
}

impl ResamplerImpl for RubatoResampler {
    fn process(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let channels = self.lanes.len();
        if input.len() % channels != 0 {
            return Err(ResamplingError::ProcessingFailed(format!(
                "Input buffer size {} is not a multiple of channel count {}",
                input.len(),
                channels
            )));
        }

        // 1:1 passthrough - avoid resampling overhead when rates match
        if self.is_passthrough() {
            return Ok(input.to_vec());
        }

        let parallel = input.len() / channels >= PARALLEL_MIN_FRAMES;
        let split = self.deinterleave(input);
        let outputs = self.run_lanes(&split, parallel, |lane, samples| lane.push(samples))?;
        Ok(self.interleave(outputs))
    }

    fn flush(&mut self) -> Result<Vec<f64>> {
        if self.is_passthrough() {
            return Ok(Vec::new());
        }
        let ratio = self.ratio();
        let inputs = vec![Vec::new(); self.lanes.len()];
        let outputs = self.run_lanes(&inputs, false, |lane, _| lane.flush(ratio))?;
        Ok(self.interleave(outputs))
    }

    fn input_rate(&self) -> u32 {
        self.input_rate
    }

    fn output_rate(&self) -> u32 {
        self.output_rate
    }

    fn channels(&self) -> usize {
        self.lanes.len()
    }

    fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.reset();
        }
    }

    fn latency(&self) -> usize {
        self.lanes
            .first()
            .map_or(0, |lane| lane.resampler.output_delay())
    }
}
