use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use flac_bridge::cli::{Cli, Command};
use flac_bridge::config::{self, Options};
use flac_bridge::logging;
use flac_bridge::sound::{
    pcm_to_i32, DecodeBackend, EncodeBackend, FrameDecoder, ReadStatus, StreamEncoder,
};

/// Samples per channel moved per read or encode call
const CHUNK_SAMPLES: usize = 4096;

#[cfg(not(feature = "libflac"))]
fn decode_backend() -> Result<impl DecodeBackend> {
    Ok(flac_bridge::sound::MemoryDecoder::new())
}

#[cfg(feature = "libflac")]
fn decode_backend() -> Result<impl DecodeBackend> {
    Ok(flac_bridge::sound::LibFlacDecoder::new()?)
}

#[cfg(not(feature = "libflac"))]
fn encode_backend() -> Result<impl EncodeBackend> {
    Ok(flac_bridge::sound::MemoryEncoder::new())
}

#[cfg(feature = "libflac")]
fn encode_backend() -> Result<impl EncodeBackend> {
    Ok(flac_bridge::sound::LibFlacEncoder::new()?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = config::load_config(cli.config.as_deref())?;
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;

    match &cli.command {
        Command::Decode { input, output, .. } => decode(input, output, &options),
        Command::Encode { input, output, .. } => encode(input, output, &options),
        Command::Info { input } => info(input),
    }
}

fn decode(input: &Path, output: &Path, options: &Options) -> Result<()> {
    let mut decoder = FrameDecoder::with_ring_capacity(
        options.output_bits.bits(),
        options.ring_capacity,
        decode_backend()?,
    )?;
    decoder
        .open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    let format = decoder.format();
    log::info!(
        "decoding {}: {} Hz, {} channels, {} bits -> {} bits",
        input.display(),
        format.sample_rate,
        format.channels,
        format.bits_per_sample,
        options.output_bits.bits()
    );

    let frame_bytes = format.channels as usize * options.output_bits.bytes_per_sample();
    let mut buf = vec![0u8; CHUNK_SAMPLES * frame_bytes];
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut out = BufWriter::new(file);

    let mut total = 0u64;
    loop {
        let outcome = decoder.read_samples(CHUNK_SAMPLES, &mut buf)?;
        out.write_all(&buf[..outcome.samples * frame_bytes])?;
        total += outcome.samples as u64;

        match outcome.status {
            ReadStatus::Ok => {}
            ReadStatus::EndOfStream => break,
            ReadStatus::Error(e) => {
                return Err(e).with_context(|| format!("Decode failed after {} samples", total))
            }
        }
    }
    out.flush()?;

    println!(
        "Decoded {} samples ({} Hz, {} channels, {} bits) to {}",
        total,
        format.sample_rate,
        format.channels,
        options.output_bits.bits(),
        output.display()
    );
    Ok(())
}

fn encode(input: &Path, output: &Path, options: &Options) -> Result<()> {
    let rate = options.raw_sample_rate.context("--rate is required for encode")?;
    let channels = options
        .raw_channels
        .context("--channels is required for encode")?;
    let depth = options.raw_bits.context("--bits is required for encode")?;

    let pcm = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let frame_bytes = channels as usize * depth.bytes_per_sample();
    let total = pcm.len() / frame_bytes;
    let trailing = pcm.len() % frame_bytes;
    if trailing != 0 {
        log::warn!("ignoring {} trailing bytes of {}", trailing, input.display());
    }

    let mut encoder = StreamEncoder::new(rate, channels, depth.bits(), encode_backend()?)?;
    encoder.set_compression_level(options.compression_level)?;
    encoder.set_block_size(options.block_size)?;
    encoder.set_total_samples_estimate(options.total_samples_estimate.unwrap_or(total as u64))?;
    encoder
        .init_file(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut samples = vec![0i32; CHUNK_SAMPLES * channels as usize];
    for chunk in pcm[..total * frame_bytes].chunks(CHUNK_SAMPLES * frame_bytes) {
        let converted = pcm_to_i32(chunk, depth.bits(), &mut samples)?;
        encoder.process_interleaved(&samples[..converted], converted / channels as usize)?;
    }
    encoder.finish()?;

    println!(
        "Encoded {} samples ({} Hz, {} channels, {} bits) to {}",
        total,
        rate,
        channels,
        depth.bits(),
        output.display()
    );
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let mut decoder = FrameDecoder::new(16, decode_backend()?)?;
    decoder
        .open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let info = *decoder
        .stream_info()
        .context("Stream carries no STREAMINFO")?;

    let md5: String = info.md5_signature.iter().map(|b| format!("{:02x}", b)).collect();
    let seconds = if info.sample_rate > 0 {
        info.total_samples as f64 / f64::from(info.sample_rate)
    } else {
        0.0
    };

    println!("File:            {}", input.display());
    println!("Backend:         {}", decoder.version());
    println!("Sample rate:     {} Hz", info.sample_rate);
    println!("Channels:        {}", info.channels);
    println!("Bits per sample: {}", info.bits_per_sample);
    println!("Total samples:   {} ({:.3} s)", info.total_samples, seconds);
    println!("Block size:      {}..{}", info.min_block_size, info.max_block_size);
    println!("Frame size:      {}..{} bytes", info.min_frame_size, info.max_frame_size);
    println!("MD5:             {}", md5);
    Ok(())
}
