//! STREAMINFO header block
//!
//! The 34-byte block every FLAC reader expects right after the stream marker.
//! Layout, all big-endian:
//!
//! | bytes  | field                                                        |
//! |--------|--------------------------------------------------------------|
//! | 0-1    | min block size (16 bits)                                     |
//! | 2-3    | max block size (16 bits)                                     |
//! | 4-6    | min frame size (24 bits)                                     |
//! | 7-9    | max frame size (24 bits)                                     |
//! | 10-17  | sample rate (20) / channels-1 (3) / bps-1 (5) / samples (36) |
//! | 18-33  | MD5 of the unencoded audio                                   |
//!
//! Serializing never fails. Fields wider than their slot are a caller bug:
//! they trip a debug assertion and are masked to the slot width in release
//! builds.

use super::error::{BridgeError, BridgeResult};
use super::formats::StreamFormat;

/// Size of a serialized STREAMINFO block
pub const STREAMINFO_LEN: usize = 34;

const MAX_FRAME_SIZE: u32 = (1 << 24) - 1;
const MAX_SAMPLE_RATE: u32 = (1 << 20) - 1;
const MAX_TOTAL_SAMPLES: u64 = (1 << 36) - 1;

/// Decoded STREAMINFO fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    /// Smallest frame in bytes, 0 if unknown
    pub min_frame_size: u32,
    /// Largest frame in bytes, 0 if unknown
    pub max_frame_size: u32,
    pub sample_rate: u32,
    /// Channel count, 1 to 8
    pub channels: u32,
    /// Bits per sample, 1 to 32
    pub bits_per_sample: u32,
    /// Samples per channel, 0 if unknown
    pub total_samples: u64,
    /// All zero when the encoder did not compute it
    pub md5_signature: [u8; 16],
}

impl StreamInfo {
    /// Pack the fields into the canonical 34-byte block
    pub fn serialize(&self) -> [u8; STREAMINFO_LEN] {
        debug_assert!(self.min_frame_size <= MAX_FRAME_SIZE);
        debug_assert!(self.max_frame_size <= MAX_FRAME_SIZE);
        debug_assert!(self.sample_rate <= MAX_SAMPLE_RATE);
        debug_assert!((1..=8).contains(&self.channels));
        debug_assert!((1..=32).contains(&self.bits_per_sample));
        debug_assert!(self.total_samples <= MAX_TOTAL_SAMPLES);

        let mut out = [0u8; STREAMINFO_LEN];

        out[0..2].copy_from_slice(&self.min_block_size.to_be_bytes());
        out[2..4].copy_from_slice(&self.max_block_size.to_be_bytes());
        out[4..7].copy_from_slice(&(self.min_frame_size & MAX_FRAME_SIZE).to_be_bytes()[1..]);
        out[7..10].copy_from_slice(&(self.max_frame_size & MAX_FRAME_SIZE).to_be_bytes()[1..]);

        let packed = (u64::from(self.sample_rate & MAX_SAMPLE_RATE) << 44)
            | (u64::from(self.channels.wrapping_sub(1) & 0x07) << 41)
            | (u64::from(self.bits_per_sample.wrapping_sub(1) & 0x1F) << 36)
            | (self.total_samples & MAX_TOTAL_SAMPLES);
        out[10..18].copy_from_slice(&packed.to_be_bytes());

        out[18..34].copy_from_slice(&self.md5_signature);
        out
    }

    /// Unpack a STREAMINFO block
    pub fn parse(data: &[u8]) -> BridgeResult<Self> {
        if data.len() < STREAMINFO_LEN {
            return Err(BridgeError::InvalidArgument(format!(
                "STREAMINFO block too short: {} bytes",
                data.len()
            )));
        }

        let min_block_size = u16::from_be_bytes([data[0], data[1]]);
        let max_block_size = u16::from_be_bytes([data[2], data[3]]);
        let min_frame_size = u32::from_be_bytes([0, data[4], data[5], data[6]]);
        let max_frame_size = u32::from_be_bytes([0, data[7], data[8], data[9]]);

        let mut packed_bytes = [0u8; 8];
        packed_bytes.copy_from_slice(&data[10..18]);
        let packed = u64::from_be_bytes(packed_bytes);

        let mut md5_signature = [0u8; 16];
        md5_signature.copy_from_slice(&data[18..34]);

        Ok(StreamInfo {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate: (packed >> 44) as u32,
            channels: ((packed >> 41) & 0x07) as u32 + 1,
            bits_per_sample: ((packed >> 36) & 0x1F) as u32 + 1,
            total_samples: packed & MAX_TOTAL_SAMPLES,
            md5_signature,
        })
    }

    /// Sample rate, channels and bit depth
    pub fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }
}
