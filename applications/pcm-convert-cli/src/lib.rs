//! PCM Convert command-line library
//!
//! Configuration loading and the chunked file conversion loop behind the
//! `pcm-convert` binary. Exposed as a library for testing.

pub mod config;
pub mod error;
pub mod runner;

pub use crate::config::{CliConfig, Overrides};
pub use crate::error::{CliError, Result};
pub use crate::runner::{convert_file, convert_stream, ConversionSummary};
