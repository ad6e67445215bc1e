//! Chunked stream conversion
//!
//! Reads `chunk_frames` source frame groups at a time, runs them through one
//! `ConversionPipeline`, then flushes and releases it at end of input.

use crate::config::CliConfig;
use crate::error::Result;
use pcm_convert::ConversionPipeline;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Totals for one conversion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionSummary {
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Pipeline calls, not counting the final flush
    pub chunks: u64,
    pub elapsed: Duration,
}

/// Convert `input` into `output` (created or truncated)
pub fn convert_file(config: &CliConfig, input: &Path, output: &Path) -> Result<ConversionSummary> {
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    debug!(input = %input.display(), output = %output.display(), "converting file");
    convert_stream(config, reader, writer)
}

/// Convert everything `reader` yields into `writer`
pub fn convert_stream<R: Read, W: Write>(
    config: &CliConfig,
    mut reader: R,
    mut writer: W,
) -> Result<ConversionSummary> {
    config.validate()?;
    let started = Instant::now();
    let mut pipeline =
        ConversionPipeline::new(config.source, config.destination, &config.resampler)?;

    let group = config.source.bytes_per_instant();
    let mut buffer = vec![0u8; config.chunk_bytes()];
    let mut summary = ConversionSummary::default();

    loop {
        let filled = read_chunk(&mut reader, &mut buffer)?;
        if filled == 0 {
            break;
        }
        summary.bytes_in += filled as u64;

        let whole = filled - filled % group;
        if whole != filled {
            warn!(
                dropped = filled - whole,
                "input ends with a partial frame group"
            );
        }
        if whole == 0 {
            break;
        }

        let converted = pipeline.process(&buffer[..whole])?;
        writer.write_all(&converted)?;
        summary.bytes_out += converted.len() as u64;
        summary.chunks += 1;
    }

    let tail = pipeline.flush()?;
    writer.write_all(&tail)?;
    summary.bytes_out += tail.len() as u64;
    writer.flush()?;
    pipeline.release()?;

    summary.elapsed = started.elapsed();
    info!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        chunks = summary.chunks,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "conversion complete"
    );
    Ok(summary)
}

/// Fill `buffer` unless the reader runs dry first; returns bytes read
fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
