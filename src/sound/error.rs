//! Error types shared by the decode and encode paths
//!
//! Every public operation in [`crate::sound`] returns a [`BridgeResult`]. The
//! variants follow the kinds a caller needs to tell apart: bad input, calls
//! made before setup finished, undersized buffers, positions outside the
//! stream, and failures reported by the codec backend.

use std::fmt;

use super::ring_buffer::InsufficientSpace;

/// Error status delivered through a backend's error callback
///
/// These are per-frame stream problems. They are latched by the decoder and
/// surfaced once; retrying is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorStatus {
    LostSync,
    BadHeader,
    FrameCrcMismatch,
    UnparseableStream,
    BadMetadata,
    OutOfBounds,
    MissingFrame,
    Unknown(u32),
}

impl StreamErrorStatus {
    /// Map a raw libFLAC-style status code
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => StreamErrorStatus::LostSync,
            1 => StreamErrorStatus::BadHeader,
            2 => StreamErrorStatus::FrameCrcMismatch,
            3 => StreamErrorStatus::UnparseableStream,
            4 => StreamErrorStatus::BadMetadata,
            5 => StreamErrorStatus::OutOfBounds,
            6 => StreamErrorStatus::MissingFrame,
            other => StreamErrorStatus::Unknown(other),
        }
    }
}

impl fmt::Display for StreamErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamErrorStatus::LostSync => write!(f, "lost sync"),
            StreamErrorStatus::BadHeader => write!(f, "bad header"),
            StreamErrorStatus::FrameCrcMismatch => write!(f, "frame CRC mismatch"),
            StreamErrorStatus::UnparseableStream => write!(f, "unparseable stream"),
            StreamErrorStatus::BadMetadata => write!(f, "bad metadata"),
            StreamErrorStatus::OutOfBounds => write!(f, "out of bounds"),
            StreamErrorStatus::MissingFrame => write!(f, "missing frame"),
            StreamErrorStatus::Unknown(code) => write!(f, "unknown error status: {}", code),
        }
    }
}

/// Decoder backend state, as reported after each backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    SearchForMetadata,
    ReadMetadata,
    SearchForFrameSync,
    ReadFrame,
    EndOfStream,
    OggError,
    SeekError,
    Aborted,
    MemoryAllocationError,
    Uninitialized,
}

impl DecoderState {
    /// Map a raw libFLAC `FLAC__StreamDecoderState` value
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => DecoderState::SearchForMetadata,
            1 => DecoderState::ReadMetadata,
            2 => DecoderState::SearchForFrameSync,
            3 => DecoderState::ReadFrame,
            4 => DecoderState::EndOfStream,
            5 => DecoderState::OggError,
            6 => DecoderState::SeekError,
            7 => DecoderState::Aborted,
            8 => DecoderState::MemoryAllocationError,
            _ => DecoderState::Uninitialized,
        }
    }

    /// Canonical state name, matching libFLAC's resolved state strings
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderState::SearchForMetadata => "FLAC__STREAM_DECODER_SEARCH_FOR_METADATA",
            DecoderState::ReadMetadata => "FLAC__STREAM_DECODER_READ_METADATA",
            DecoderState::SearchForFrameSync => "FLAC__STREAM_DECODER_SEARCH_FOR_FRAME_SYNC",
            DecoderState::ReadFrame => "FLAC__STREAM_DECODER_READ_FRAME",
            DecoderState::EndOfStream => "FLAC__STREAM_DECODER_END_OF_STREAM",
            DecoderState::OggError => "FLAC__STREAM_DECODER_OGG_ERROR",
            DecoderState::SeekError => "FLAC__STREAM_DECODER_SEEK_ERROR",
            DecoderState::Aborted => "FLAC__STREAM_DECODER_ABORTED",
            DecoderState::MemoryAllocationError => {
                "FLAC__STREAM_DECODER_MEMORY_ALLOCATION_ERROR"
            }
            DecoderState::Uninitialized => "FLAC__STREAM_DECODER_UNINITIALIZED",
        }
    }
}

impl fmt::Display for DecoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder backend state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Ok,
    Uninitialized,
    OggError,
    VerifyMismatch,
    ClientError,
    IoError,
    FramingError,
    MemoryAllocationError,
}

impl EncoderState {
    /// Map a raw libFLAC `FLAC__StreamEncoderState` value
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => EncoderState::Ok,
            1 => EncoderState::Uninitialized,
            2 => EncoderState::OggError,
            3 | 4 => EncoderState::VerifyMismatch,
            5 => EncoderState::ClientError,
            6 => EncoderState::IoError,
            7 => EncoderState::FramingError,
            8 => EncoderState::MemoryAllocationError,
            _ => EncoderState::Uninitialized,
        }
    }
}

impl fmt::Display for EncoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncoderState::Ok => "OK",
            EncoderState::Uninitialized => "UNINITIALIZED",
            EncoderState::OggError => "OGG_ERROR",
            EncoderState::VerifyMismatch => "VERIFY_MISMATCH",
            EncoderState::ClientError => "CLIENT_ERROR",
            EncoderState::IoError => "IO_ERROR",
            EncoderState::FramingError => "FRAMING_ERROR",
            EncoderState::MemoryAllocationError => "MEMORY_ALLOCATION_ERROR",
        };
        f.write_str(name)
    }
}

/// Error type for decoder and encoder operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Bad caller input: non-positive counts, unsupported bit depth, ...
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted before the required setup happened
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("Position {position} out of range (total samples: {total})")]
    OutOfRange { position: i64, total: u64 },

    #[error(transparent)]
    InsufficientSpace(#[from] InsufficientSpace),

    /// Error reported through the backend's error callback
    #[error("FLAC decoder error: {0}")]
    Stream(StreamErrorStatus),

    /// A decode or encode call failed without a more specific callback error
    #[error("{message} (state: {state})")]
    Backend { state: String, message: String },

    #[error("Seek failed, decoder state: {state}")]
    SeekFailed { state: DecoderState },

    #[error("I/O error: {0}")]
    Io(String),

    /// Stream exhausted; not a failure
    #[error("End of stream")]
    EndOfStream,
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e.to_string())
    }
}

/// Result type for decoder and encoder operations
pub type BridgeResult<T> = Result<T, BridgeError>;
