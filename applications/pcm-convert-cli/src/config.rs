/// CLI configuration
///
/// Layered lowest to highest: built-in defaults, optional TOML file,
/// `PCMCONV_` environment variables, command-line flags.
use crate::error::{CliError, Result};
use clap::Args;
use pcm_convert::resampling::{ResamplerConfig, ResamplingQuality};
use pcm_convert::{ByteOrder, ConversionPipeline, SampleFormat, StreamShape};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `PCMCONV_SOURCE__SAMPLE_RATE=48000`
pub const ENV_PREFIX: &str = "PCMCONV";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub source: StreamShape,

    #[serde(default)]
    pub destination: StreamShape,

    #[serde(default)]
    pub resampler: ResamplerConfig,

    /// Source frames read per pipeline call
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            source: StreamShape::default(),
            destination: StreamShape::default(),
            resampler: ResamplerConfig::default(),
            chunk_frames: default_chunk_frames(),
        }
    }
}

/// Command-line overrides, applied after file and environment
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Source sample rate (Hz)
    #[arg(long)]
    pub from_rate: Option<u32>,

    /// Source sample format (u8, s16, s24, s32, f32, f64)
    #[arg(long)]
    pub from_format: Option<SampleFormat>,

    /// Source byte order (le, be)
    #[arg(long)]
    pub from_order: Option<ByteOrder>,

    /// Source channel count
    #[arg(long)]
    pub from_channels: Option<u16>,

    /// Destination sample rate (Hz)
    #[arg(long)]
    pub to_rate: Option<u32>,

    /// Destination sample format
    #[arg(long)]
    pub to_format: Option<SampleFormat>,

    /// Destination byte order
    #[arg(long)]
    pub to_order: Option<ByteOrder>,

    /// Destination channel count
    #[arg(long)]
    pub to_channels: Option<u16>,

    /// Resampling quality (quick, low, medium, high, very-high)
    #[arg(long, value_parser = parse_quality)]
    pub quality: Option<ResamplingQuality>,

    /// Resampler worker threads
    #[arg(long)]
    pub worker_threads: Option<usize>,

    /// Source frames per pipeline call
    #[arg(long)]
    pub chunk_frames: Option<usize>,
}

impl CliConfig {
    /// Load configuration from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, default_environment())
    }

    /// Load with an explicit environment source
    pub fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            settings =
                settings.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        settings = settings.add_source(env);

        let config = settings.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: &Overrides) {
        let source = &mut self.source;
        if let Some(rate) = overrides.from_rate {
            source.sample_rate = rate;
        }
        if let Some(format) = overrides.from_format {
            source.format = format;
        }
        if let Some(order) = overrides.from_order {
            source.byte_order = order;
        }
        if let Some(channels) = overrides.from_channels {
            source.channels = channels;
        }

        let destination = &mut self.destination;
        if let Some(rate) = overrides.to_rate {
            destination.sample_rate = rate;
        }
        if let Some(format) = overrides.to_format {
            destination.format = format;
        }
        if let Some(order) = overrides.to_order {
            destination.byte_order = order;
        }
        if let Some(channels) = overrides.to_channels {
            destination.channels = channels;
        }

        if let Some(quality) = overrides.quality {
            self.resampler.quality = quality;
        }
        if let Some(threads) = overrides.worker_threads {
            self.resampler.worker_threads = threads;
        }
        if let Some(frames) = overrides.chunk_frames {
            self.chunk_frames = frames;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        ConversionPipeline::validate_shapes(&self.source, &self.destination)?;

        if self.chunk_frames == 0 {
            return Err(CliError::Config("chunk_frames must be at least 1".to_string()));
        }

        if self.resampler.worker_threads == 0 {
            return Err(CliError::Config(
                "resampler.worker_threads must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Bytes read per pipeline call
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_frames * self.source.bytes_per_instant()
    }
}

fn default_environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn default_chunk_frames() -> usize {
    128
}

fn parse_quality(value: &str) -> std::result::Result<ResamplingQuality, String> {
    match value.to_ascii_lowercase().as_str() {
        "quick" => Ok(ResamplingQuality::Quick),
        "low" => Ok(ResamplingQuality::Low),
        "medium" => Ok(ResamplingQuality::Medium),
        "high" => Ok(ResamplingQuality::High),
        "very-high" | "veryhigh" => Ok(ResamplingQuality::VeryHigh),
        other => Err(format!(
            "unknown quality '{other}' (expected quick, low, medium, high or very-high)"
        )),
    }
}
