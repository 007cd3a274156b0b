//! Sample format definitions
//!
//! Output depths the decoder can produce and the stream format reported by
//! the backend's metadata callback.

use super::error::{BridgeError, BridgeResult};

/// Bit depth of packed PCM samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BitDepth {
    /// 8-bit signed (1 byte per sample)
    Bits8 = 8,
    /// 16-bit signed little-endian (2 bytes per sample)
    Bits16 = 16,
    /// 24-bit signed little-endian (3 bytes per sample)
    Bits24 = 24,
    /// 32-bit signed little-endian (4 bytes per sample)
    Bits32 = 32,
}

impl BitDepth {
    /// Validate a bit count
    pub fn from_bits(bits: u32) -> BridgeResult<Self> {
        match bits {
            8 => Ok(BitDepth::Bits8),
            16 => Ok(BitDepth::Bits16),
            24 => Ok(BitDepth::Bits24),
            32 => Ok(BitDepth::Bits32),
            other => Err(BridgeError::InvalidArgument(format!(
                "invalid bit depth: {}, must be 8, 16, 24, or 32",
                other
            ))),
        }
    }

    /// Returns the number of bits
    pub fn bits(&self) -> u32 {
        *self as u32
    }

    /// Returns the number of bytes per sample
    pub fn bytes_per_sample(&self) -> usize {
        (*self as usize) / 8
    }
}

impl Default for BitDepth {
    fn default() -> Self {
        BitDepth::Bits16
    }
}

/// Audio format of an open stream
///
/// All fields are zero until the backend has delivered stream metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFormat {
    /// Sample frequency in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u32,
    /// Source bit depth as stored in the stream
    pub bits_per_sample: u32,
}

impl StreamFormat {
    /// Whether metadata has been received
    pub fn is_known(&self) -> bool {
        self.channels > 0 && self.bits_per_sample > 0
    }

    /// Bytes needed to hold one source sample, rounding partial bytes up
    pub fn source_bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize + 7) / 8
    }
}
