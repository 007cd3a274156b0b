//! Codec backend interface
//!
//! A backend does the actual frame decoding and encoding and reports results
//! through callbacks, synchronously, on the calling thread. The decoder and
//! encoder in this crate hand a sink to every backend call; the backend may
//! only use it for the duration of that call.
//!
//! Implementations:
//! - [`memory`]: pure-Rust verbatim frame container, always available
//! - `libflac`: the system libFLAC, behind the `libflac` feature

use std::path::Path;

use super::error::{BridgeError, BridgeResult, DecoderState, EncoderState, StreamErrorStatus};
use super::stream_info::StreamInfo;

pub mod handle;
pub mod memory;

#[cfg(feature = "libflac")]
pub mod libflac;

pub use memory::{MemoryDecoder, MemoryEncoder};

/// What a write callback tells the backend to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Continue,
    Abort,
}

/// One decoded frame, planar
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Samples per channel in this frame
    pub block_size: usize,
    /// One slice per channel, each `block_size` long
    pub channels: &'a [&'a [i32]],
}

/// Receiver for decode callbacks
pub trait DecodeSink {
    /// Stream metadata, delivered once per open before any frame
    fn on_metadata(&mut self, info: &StreamInfo);

    /// A stream error the backend recovered from or gave up on
    fn on_error(&mut self, status: StreamErrorStatus);

    /// One decoded frame
    fn on_frame(&mut self, frame: &Frame<'_>) -> WriteStatus;
}

/// Receiver for encode callbacks
pub trait EncodeSink {
    /// A chunk of encoded bytes; `samples` is 0 for header writes
    fn on_write(&mut self, bytes: &[u8], samples: u32, current_frame: u32) -> WriteStatus;

    /// Final stream metadata, delivered once by `finish`
    fn on_metadata(&mut self, info: &StreamInfo);
}

/// Decoding side of a codec backend
pub trait DecodeBackend {
    /// Backend name, e.g. "libFLAC"
    fn name(&self) -> &'static str;

    /// Backend library version
    fn version(&self) -> String;

    /// Open a file and process it up to the end of the metadata
    fn open(&mut self, path: &Path, sink: &mut dyn DecodeSink) -> BridgeResult<()>;

    /// Open an in-memory stream and process it up to the end of the metadata
    fn open_from_bytes(&mut self, _data: &[u8], _sink: &mut dyn DecodeSink) -> BridgeResult<()> {
        Err(BridgeError::InvalidArgument(format!(
            "{} backend cannot decode from memory",
            self.name()
        )))
    }

    /// Decode exactly one frame, or reach end of stream
    ///
    /// Returns `false` on a hard failure; `state()` tells what happened.
    fn decode_one_frame(&mut self, sink: &mut dyn DecodeSink) -> bool;

    /// Reposition to an absolute sample
    ///
    /// The backend may deliver the frame containing the target, starting at
    /// the target sample, through `sink` before returning.
    fn seek_absolute(&mut self, sample: u64, sink: &mut dyn DecodeSink) -> bool;

    /// Release the open stream; the backend can be opened again afterwards
    fn finish(&mut self);

    /// Current state
    fn state(&self) -> DecoderState;

    /// Whether a stream is currently open
    fn is_open(&self) -> bool {
        self.state() != DecoderState::Uninitialized
    }
}

/// Parameters an encode backend is initialized with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    /// 0 (fastest) to 8 (best)
    pub compression_level: u32,
    /// Samples per frame
    pub block_size: u32,
    /// Hint written into the initial header, 0 if unknown
    pub total_samples_estimate: u64,
    /// Decode every frame again and compare while encoding
    pub verify: bool,
}

/// Encoding side of a codec backend
pub trait EncodeBackend {
    fn name(&self) -> &'static str;

    /// Start a stream whose bytes go to `sink`
    fn init_stream(&mut self, settings: &EncoderSettings, sink: &mut dyn EncodeSink)
        -> BridgeResult<()>;

    /// Start a stream written straight to `path`
    fn init_file(&mut self, settings: &EncoderSettings, path: &Path) -> BridgeResult<()>;

    /// Encode `count` samples per channel from interleaved `samples`
    fn process_interleaved(
        &mut self,
        samples: &[i32],
        count: usize,
        sink: &mut dyn EncodeSink,
    ) -> bool;

    /// Flush pending samples and deliver final metadata
    ///
    /// Returns `false` if flushing failed (e.g. verify mismatch).
    fn finish(&mut self, sink: &mut dyn EncodeSink) -> bool;

    fn state(&self) -> EncoderState;
}
