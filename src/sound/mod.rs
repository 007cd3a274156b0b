//! FLAC decode and encode transfer core
//!
//! Bridges a codec backend that pushes decoded frames through callbacks to a
//! caller that pulls an arbitrary number of interleaved PCM samples at a
//! chosen output depth, and collects the bytes an encoding backend pushes out.
//!
//! # Architecture
//!
//! - [`ring_buffer`]: bounded byte FIFO between frame callbacks and reads
//! - [`sample`]: packing `i32` samples to and from little-endian bytes
//! - [`decoder`]: `FrameDecoder`, the pull loop; [`seek`] adds repositioning
//! - [`stream_info`]: the 34-byte STREAMINFO block
//! - [`encoder`]: `StreamEncoder` with its [`accumulator`]
//! - [`backend`]: the codec interface and its implementations

pub mod accumulator;
pub mod backend;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod formats;
pub mod ring_buffer;
pub mod sample;
pub mod seek;
pub mod stream_info;

pub use accumulator::OutputAccumulator;
pub use backend::{DecodeBackend, EncodeBackend, MemoryDecoder, MemoryEncoder};
pub use decoder::{FrameDecoder, PumpPhase, ReadOutcome, ReadStatus};
pub use encoder::StreamEncoder;
pub use error::{BridgeError, BridgeResult, DecoderState, EncoderState, StreamErrorStatus};
pub use formats::{BitDepth, StreamFormat};
pub use ring_buffer::{InsufficientSpace, RingBuffer};
pub use sample::pcm_to_i32;
pub use stream_info::{StreamInfo, STREAMINFO_LEN};

#[cfg(feature = "libflac")]
pub use backend::libflac::{LibFlacDecoder, LibFlacEncoder};
