/// PCM Convert - raw PCM format, channel and sample rate converter
use anyhow::Context;
use clap::Parser;
use pcm_convert_cli::{convert_file, CliConfig, Overrides};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pcm-convert")]
#[command(about = "Convert raw PCM between formats, byte orders, channel counts and sample rates", long_about = None)]
struct Cli {
    /// Raw PCM input file
    #[arg(short, long)]
    input: PathBuf,

    /// Raw PCM output file (created or truncated)
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file path (TOML)
    #[arg(short, long, env = "PCMCONV_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pcm_convert=info,pcm_convert_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply(&cli.overrides);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        source = ?config.source,
        destination = ?config.destination,
        quality = ?config.resampler.quality,
        "Starting conversion"
    );

    let summary = convert_file(&config, &cli.input, &cli.output).with_context(|| {
        format!(
            "Failed to convert {} into {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;

    println!(
        "Converted {} bytes into {} bytes in {:.2?}",
        summary.bytes_in, summary.bytes_out, summary.elapsed
    );
    Ok(())
}
