//! Encoder front end
//!
//! [`StreamEncoder`] validates parameters, drives an [`EncodeBackend`] and
//! collects what it produces. In stream mode encoded bytes pile up in an
//! [`OutputAccumulator`] until [`StreamEncoder::take_bytes`]; in file mode
//! the backend writes the file itself. Either way `finish` captures the
//! final STREAMINFO block.

use std::path::Path;

use super::accumulator::OutputAccumulator;
use super::backend::{EncodeBackend, EncodeSink, EncoderSettings, WriteStatus};
use super::error::{BridgeError, BridgeResult};
use super::formats::{BitDepth, StreamFormat};
use super::stream_info::{StreamInfo, STREAMINFO_LEN};

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 5;
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;
pub const MAX_SAMPLE_RATE: u32 = 655_350;

const MIN_BLOCK_SIZE: u32 = 16;
const MAX_BLOCK_SIZE: u32 = 65_535;

/// Receives the backend's write and metadata callbacks
#[derive(Debug, Default)]
struct EncodeState {
    output: OutputAccumulator,
    stream_info: Option<[u8; STREAMINFO_LEN]>,
}

impl EncodeSink for EncodeState {
    fn on_write(&mut self, bytes: &[u8], samples: u32, current_frame: u32) -> WriteStatus {
        log::trace!(
            "encoded {} bytes ({} samples, frame {})",
            bytes.len(),
            samples,
            current_frame
        );
        self.output.push(bytes);
        WriteStatus::Continue
    }

    fn on_metadata(&mut self, info: &StreamInfo) {
        log::debug!(
            "final STREAMINFO: {} samples, frames {}..{} bytes",
            info.total_samples,
            info.min_frame_size,
            info.max_frame_size
        );
        self.stream_info = Some(info.serialize());
    }
}

/// Encoder taking interleaved `i32` samples right-justified to the bit depth
pub struct StreamEncoder<B: EncodeBackend> {
    backend: B,
    settings: EncoderSettings,
    state: EncodeState,
    initialized: bool,
}

impl<B: EncodeBackend> StreamEncoder<B> {
    /// Create an encoder for the given format
    ///
    /// `sample_rate` must be 1..=655350, `channels` 1..=8 and `bits_per_sample`
    /// one of 8, 16, 24, 32.
    pub fn new(
        sample_rate: u32,
        channels: u32,
        bits_per_sample: u32,
        backend: B,
    ) -> BridgeResult<Self> {
        if !(1..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(BridgeError::InvalidArgument(format!(
                "invalid sample rate: {} (must be 1-{})",
                sample_rate, MAX_SAMPLE_RATE
            )));
        }
        if !(1..=8).contains(&channels) {
            return Err(BridgeError::InvalidArgument(format!(
                "invalid channels: {} (must be 1-8)",
                channels
            )));
        }
        BitDepth::from_bits(bits_per_sample)?;

        Ok(Self {
            backend,
            settings: EncoderSettings {
                sample_rate,
                channels,
                bits_per_sample,
                compression_level: DEFAULT_COMPRESSION_LEVEL,
                block_size: DEFAULT_BLOCK_SIZE,
                total_samples_estimate: 0,
                verify: true,
            },
            state: EncodeState::default(),
            initialized: false,
        })
    }

    fn ensure_not_initialized(&self, what: &str) -> BridgeResult<()> {
        if self.initialized {
            return Err(BridgeError::InvalidArgument(format!(
                "cannot {} after initialization",
                what
            )));
        }
        Ok(())
    }

    /// 0 (fastest) to 8 (best), default 5
    pub fn set_compression_level(&mut self, level: u32) -> BridgeResult<()> {
        self.ensure_not_initialized("set compression level")?;
        if level > 8 {
            return Err(BridgeError::InvalidArgument(format!(
                "invalid compression level: {} (must be 0-8)",
                level
            )));
        }
        self.settings.compression_level = level;
        Ok(())
    }

    /// Hint for the header written at init; the real count is filled in at finish
    /// where the output allows it
    pub fn set_total_samples_estimate(&mut self, total_samples: u64) -> BridgeResult<()> {
        self.ensure_not_initialized("set total samples")?;
        self.settings.total_samples_estimate = total_samples;
        Ok(())
    }

    /// Samples per channel in each frame, 16..=65535
    pub fn set_block_size(&mut self, block_size: u32) -> BridgeResult<()> {
        self.ensure_not_initialized("set block size")?;
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(BridgeError::InvalidArgument(format!(
                "invalid block size: {} (must be {}-{})",
                block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        self.settings.block_size = block_size;
        Ok(())
    }

    pub fn set_verify(&mut self, verify: bool) -> BridgeResult<()> {
        self.ensure_not_initialized("change verify")?;
        self.settings.verify = verify;
        Ok(())
    }

    /// Start encoding into the internal accumulator
    pub fn init_stream(&mut self) -> BridgeResult<()> {
        self.ensure_not_initialized("initialize encoder")?;
        self.state.stream_info = None;
        self.backend.init_stream(&self.settings, &mut self.state)?;
        self.initialized = true;
        log::debug!("{} encoder initialized in stream mode", self.backend.name());
        Ok(())
    }

    /// Start encoding straight into a file
    pub fn init_file(&mut self, path: impl AsRef<Path>) -> BridgeResult<()> {
        self.ensure_not_initialized("initialize encoder")?;
        self.state.stream_info = None;
        self.backend.init_file(&self.settings, path.as_ref())?;
        self.initialized = true;
        log::debug!(
            "{} encoder initialized for {}",
            self.backend.name(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Encode `count` samples per channel from interleaved `samples`
    pub fn process_interleaved(&mut self, samples: &[i32], count: usize) -> BridgeResult<()> {
        if !self.initialized {
            return Err(BridgeError::NotReady("encoder not initialized".to_string()));
        }
        if count == 0 {
            return Err(BridgeError::InvalidArgument(
                "sample count must be positive".to_string(),
            ));
        }
        let needed = count
            .checked_mul(self.settings.channels as usize)
            .ok_or_else(|| {
                BridgeError::InvalidArgument(format!("sample count {} overflows", count))
            })?;
        if samples.len() < needed {
            return Err(BridgeError::InvalidArgument(format!(
                "samples slice too small: need {}, got {}",
                needed,
                samples.len()
            )));
        }

        if !self
            .backend
            .process_interleaved(&samples[..needed], count, &mut self.state)
        {
            return Err(BridgeError::Backend {
                state: self.backend.state().to_string(),
                message: "process interleaved failed".to_string(),
            });
        }
        Ok(())
    }

    /// Remove and return encoded bytes produced since the last call
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.state.output.drain()
    }

    /// Flush the last partial block and finalize the stream
    ///
    /// The encoder can be initialized again afterwards.
    pub fn finish(&mut self) -> BridgeResult<()> {
        if !self.initialized {
            return Err(BridgeError::NotReady("encoder not initialized".to_string()));
        }
        let ok = self.backend.finish(&mut self.state);
        self.initialized = false;
        if !ok {
            return Err(BridgeError::Backend {
                state: self.backend.state().to_string(),
                message: "encoder finish failed (possible verify mismatch)".to_string(),
            });
        }
        Ok(())
    }

    /// STREAMINFO block captured by the last successful `finish`
    pub fn stream_info(&self) -> Option<&[u8; STREAMINFO_LEN]> {
        self.state.stream_info.as_ref()
    }

    /// Configured sample rate, channels and bit depth
    pub fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.settings.sample_rate,
            channels: self.settings.channels,
            bits_per_sample: self.settings.bits_per_sample,
        }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl<B: EncodeBackend> Drop for StreamEncoder<B> {
    fn drop(&mut self) {
        if self.initialized && !self.backend.finish(&mut self.state) {
            log::warn!("encoder finish during drop failed: {}", self.backend.state());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::backend::MemoryEncoder;

    fn encoder(channels: u32, bits: u32) -> StreamEncoder<MemoryEncoder> {
        StreamEncoder::new(44100, channels, bits, MemoryEncoder::new()).unwrap()
    }

    #[test]
    fn test_new_validation() {
        assert!(StreamEncoder::new(0, 2, 16, MemoryEncoder::new()).is_err());
        assert!(StreamEncoder::new(655_351, 2, 16, MemoryEncoder::new()).is_err());
        assert!(StreamEncoder::new(655_350, 2, 16, MemoryEncoder::new()).is_ok());
        assert!(StreamEncoder::new(44100, 0, 16, MemoryEncoder::new()).is_err());
        assert!(StreamEncoder::new(44100, 9, 16, MemoryEncoder::new()).is_err());
        assert!(matches!(
            StreamEncoder::new(44100, 2, 20, MemoryEncoder::new()),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let enc = encoder(2, 16);
        assert_eq!(enc.settings().compression_level, 5);
        assert_eq!(enc.settings().block_size, 4096);
        assert!(enc.settings().verify);
        assert_eq!(enc.format().channels, 2);
        assert!(!enc.is_initialized());
    }

    #[test]
    fn test_compression_level_range() {
        let mut enc = encoder(1, 16);
        assert!(enc.set_compression_level(0).is_ok());
        assert!(enc.set_compression_level(8).is_ok());
        assert!(enc.set_compression_level(9).is_err());
        assert_eq!(enc.settings().compression_level, 8);
    }

    #[test]
    fn test_setters_rejected_after_init() {
        let mut enc = encoder(1, 16);
        enc.init_stream().unwrap();
        assert!(enc.set_total_samples_estimate(10).is_err());
        assert!(enc.set_compression_level(3).is_err());
        assert!(enc.set_block_size(1024).is_err());
        assert!(matches!(
            enc.init_stream(),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_process_preconditions() {
        let mut enc = encoder(2, 16);
        assert!(matches!(
            enc.process_interleaved(&[0, 0], 1),
            Err(BridgeError::NotReady(_))
        ));
        enc.init_stream().unwrap();
        assert!(matches!(
            enc.process_interleaved(&[0, 0], 0),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            enc.process_interleaved(&[0, 0, 0], 2),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(enc.process_interleaved(&[0, 0, 0, 0], 2).is_ok());
    }

    #[test]
    fn test_stream_mode_collects_bytes_and_stream_info() {
        let mut enc = encoder(2, 16);
        enc.set_block_size(16).unwrap();
        enc.init_stream().unwrap();

        let header = enc.take_bytes();
        assert_eq!(&header[..4], b"PCMF");
        assert!(enc.take_bytes().is_empty());

        let samples: Vec<i32> = (0..40).collect();
        enc.process_interleaved(&samples, 20).unwrap();
        let first = enc.take_bytes();
        assert_eq!(first.len(), 4 + 16 * 2 * 2);
        assert!(enc.stream_info().is_none());

        enc.finish().unwrap();
        assert_eq!(enc.take_bytes().len(), 4 + 4 * 2 * 2);
        assert!(!enc.is_initialized());

        let info = StreamInfo::parse(enc.stream_info().unwrap()).unwrap();
        assert_eq!(info.total_samples, 20);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 44100);
    }

    #[test]
    fn test_finish_reports_verify_mismatch() {
        let mut enc = encoder(1, 8);
        enc.set_block_size(16).unwrap();
        enc.init_stream().unwrap();
        // 300 does not fit 8 bits; it stays pending until finish flushes it
        enc.process_interleaved(&[1, 300], 2).unwrap();
        let err = enc.finish().unwrap_err();
        assert!(err.to_string().contains("VERIFY_MISMATCH"));
        assert!(enc.stream_info().is_none());
    }

    #[test]
    fn test_reinit_after_finish() {
        let mut enc = encoder(1, 16);
        enc.init_stream().unwrap();
        enc.finish().unwrap();
        assert!(enc.finish().is_err());
        enc.init_stream().unwrap();
        assert!(enc.stream_info().is_none());
    }
}
