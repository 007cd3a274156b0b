use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logging::LogLevel;
use crate::sound::decoder::DEFAULT_RING_CAPACITY;
use crate::sound::encoder::{DEFAULT_BLOCK_SIZE, DEFAULT_COMPRESSION_LEVEL, MAX_SAMPLE_RATE};
use crate::sound::formats::BitDepth;

/// Options that can be set via CLI or config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Depth of decoded output
    pub output_bits: BitDepth,
    /// Initial decoder ring buffer size in bytes
    pub ring_capacity: usize,
    pub compression_level: u32,
    pub block_size: u32,
    /// Written into the encoder's initial header; input length if unset
    pub total_samples_estimate: Option<u64>,

    // Format of raw PCM input when encoding
    pub raw_sample_rate: Option<u32>,
    pub raw_channels: Option<u32>,
    pub raw_bits: Option<BitDepth>,

    pub log_level: LogLevel,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output_bits: BitDepth::Bits16,
            ring_capacity: DEFAULT_RING_CAPACITY,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            block_size: DEFAULT_BLOCK_SIZE,
            total_samples_estimate: None,
            raw_sample_rate: None,
            raw_channels: None,
            raw_bits: None,
            log_level: LogLevel::default(),
        }
    }
}

/// Config file layout
///
/// ```toml
/// log_level = "info"
///
/// [decode]
/// output_bits = 24
/// ring_capacity = 131072
///
/// [encode]
/// compression_level = 8
/// block_size = 4608
/// sample_rate = 44100
/// channels = 2
/// bits = 16
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    log_level: Option<String>,
    decode: DecodeSection,
    encode: EncodeSection,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DecodeSection {
    output_bits: Option<u32>,
    ring_capacity: Option<usize>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EncodeSection {
    compression_level: Option<u32>,
    block_size: Option<u32>,
    total_samples_estimate: Option<u64>,
    sample_rate: Option<u32>,
    channels: Option<u32>,
    bits: Option<u32>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

/// Load options from a TOML file, or defaults without one
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let Some(path) = path else {
        return Ok(Options::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Parse TOML config text on top of the defaults
///
/// Unknown keys are logged and ignored.
pub fn parse_config(text: &str) -> Result<Options> {
    let file: FileConfig = toml::from_str(text).context("Failed to parse TOML")?;
    warn_unknown("", &file.unknown);
    warn_unknown("decode.", &file.decode.unknown);
    warn_unknown("encode.", &file.encode.unknown);

    let mut opts = Options::default();
    if let Some(level) = &file.log_level {
        opts.log_level = parse_log_level(level)?;
    }

    let decode = file.decode;
    if let Some(bits) = decode.output_bits {
        opts.output_bits = check_bit_depth(bits).context("decode.output_bits")?;
    }
    if let Some(capacity) = decode.ring_capacity {
        opts.ring_capacity = check_ring_capacity(capacity).context("decode.ring_capacity")?;
    }

    let encode = file.encode;
    if let Some(level) = encode.compression_level {
        opts.compression_level =
            check_compression_level(level).context("encode.compression_level")?;
    }
    if let Some(size) = encode.block_size {
        opts.block_size = check_block_size(size).context("encode.block_size")?;
    }
    opts.total_samples_estimate = encode.total_samples_estimate;
    if let Some(rate) = encode.sample_rate {
        opts.raw_sample_rate = Some(check_sample_rate(rate).context("encode.sample_rate")?);
    }
    if let Some(channels) = encode.channels {
        opts.raw_channels = Some(check_channels(channels).context("encode.channels")?);
    }
    if let Some(bits) = encode.bits {
        opts.raw_bits = Some(check_bit_depth(bits).context("encode.bits")?);
    }

    Ok(opts)
}

fn warn_unknown(prefix: &str, keys: &BTreeMap<String, toml::Value>) {
    for key in keys.keys() {
        log::warn!("ignoring unknown config key: {}{}", prefix, key);
    }
}

pub fn check_bit_depth(bits: u32) -> Result<BitDepth> {
    Ok(BitDepth::from_bits(bits)?)
}

pub fn check_compression_level(level: u32) -> Result<u32> {
    if level > 8 {
        anyhow::bail!("Compression level out of range (0 to 8)");
    }
    Ok(level)
}

pub fn check_block_size(size: u32) -> Result<u32> {
    if !(16..=65535).contains(&size) {
        anyhow::bail!("Block size out of range (16 to 65535)");
    }
    Ok(size)
}

pub fn check_sample_rate(rate: u32) -> Result<u32> {
    if !(1..=MAX_SAMPLE_RATE).contains(&rate) {
        anyhow::bail!("Sample rate out of range (1 to {})", MAX_SAMPLE_RATE);
    }
    Ok(rate)
}

pub fn check_channels(channels: u32) -> Result<u32> {
    if !(1..=8).contains(&channels) {
        anyhow::bail!("Channel count out of range (1 to 8)");
    }
    Ok(channels)
}

/// Rounded up to a power of two when the ring is built
pub fn check_ring_capacity(capacity: usize) -> Result<usize> {
    if capacity == 0 {
        anyhow::bail!("Ring capacity must be positive");
    }
    Ok(capacity)
}

/// Parse a bit depth: 8, 16, 24 or 32
pub fn parse_bit_depth(s: &str) -> Result<BitDepth> {
    check_bit_depth(s.trim().parse().context("Invalid bit depth")?)
}

/// Parse a compression level (0-8)
pub fn parse_compression_level(s: &str) -> Result<u32> {
    check_compression_level(s.trim().parse().context("Invalid compression level")?)
}

/// Parse a block size (16-65535 samples)
pub fn parse_block_size(s: &str) -> Result<u32> {
    check_block_size(s.trim().parse().context("Invalid block size")?)
}

pub fn parse_sample_rate(s: &str) -> Result<u32> {
    check_sample_rate(s.trim().parse().context("Invalid sample rate")?)
}

pub fn parse_channels(s: &str) -> Result<u32> {
    check_channels(s.trim().parse().context("Invalid channel count")?)
}

pub fn parse_ring_capacity(s: &str) -> Result<usize> {
    check_ring_capacity(s.trim().parse().context("Invalid ring capacity")?)
}

/// Parse a log level by name or number (0-6)
pub fn parse_log_level(s: &str) -> Result<LogLevel> {
    let s = s.trim();
    if let Ok(n) = s.parse::<i32>() {
        if !(0..=6).contains(&n) {
            anyhow::bail!("Log level out of range (0 to 6)");
        }
        return Ok(LogLevel::from_i32(n));
    }

    match s.to_lowercase().as_str() {
        "nothing" | "off" => Ok(LogLevel::Nothing),
        "user" => Ok(LogLevel::User),
        "error" => Ok(LogLevel::Error),
        "warning" | "warn" => Ok(LogLevel::Warning),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "all" | "trace" => Ok(LogLevel::All),
        _ => anyhow::bail!(
            "Invalid log level: {}. Valid options: nothing, user, error, warning, info, debug, all",
            s
        ),
    }
}
