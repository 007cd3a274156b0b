use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{
    parse_bit_depth, parse_block_size, parse_channels, parse_compression_level, parse_log_level,
    parse_sample_rate, Options,
};

/// Decode FLAC streams to raw PCM and encode raw PCM to FLAC
#[derive(Parser, Debug)]
#[command(name = "flac-bridge")]
#[command(version)]
#[cfg_attr(
    feature = "libflac",
    command(about = "FLAC decode/encode bridge (libFLAC backend)", long_about = None)
)]
#[cfg_attr(
    not(feature = "libflac"),
    command(
        about = "PCMF container decode/encode bridge; build with --features libflac for FLAC files",
        long_about = None
    )
)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (nothing, user, error, warning, info, debug, all)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a stream to raw interleaved little-endian PCM
    Decode {
        input: PathBuf,
        output: PathBuf,

        /// Output bit depth (8, 16, 24, 32)
        #[arg(short, long, value_name = "BITS")]
        bits: Option<String>,
    },

    /// Encode raw interleaved little-endian PCM
    Encode {
        input: PathBuf,
        output: PathBuf,

        /// Sample rate in Hz
        #[arg(long, value_name = "HZ")]
        rate: Option<String>,

        /// Number of interleaved channels
        #[arg(long, value_name = "N")]
        channels: Option<String>,

        /// Input bit depth (8, 16, 24, 32)
        #[arg(long, value_name = "BITS")]
        bits: Option<String>,

        /// Compression level (0-8)
        #[arg(short = 'L', long, value_name = "LEVEL")]
        level: Option<String>,

        /// Samples per frame
        #[arg(long, value_name = "SAMPLES")]
        block_size: Option<String>,
    },

    /// Print stream format and STREAMINFO fields
    Info { input: PathBuf },
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref level) = self.log_level {
            opts.log_level = parse_log_level(level).context("Invalid log level")?;
        }

        match &self.command {
            Command::Decode { bits, .. } => {
                if let Some(bits) = bits {
                    opts.output_bits = parse_bit_depth(bits).context("Invalid output depth")?;
                }
            }
            Command::Encode {
                rate,
                channels,
                bits,
                level,
                block_size,
                ..
            } => {
                if let Some(rate) = rate {
                    opts.raw_sample_rate = Some(parse_sample_rate(rate)?);
                }
                if let Some(channels) = channels {
                    opts.raw_channels = Some(parse_channels(channels)?);
                }
                if let Some(bits) = bits {
                    opts.raw_bits = Some(parse_bit_depth(bits).context("Invalid input depth")?);
                }
                if let Some(level) = level {
                    opts.compression_level = parse_compression_level(level)?;
                }
                if let Some(size) = block_size {
                    opts.block_size = parse_block_size(size)?;
                }
            }
            Command::Info { .. } => {}
        }

        Ok(opts)
    }
}
