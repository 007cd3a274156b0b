//! Pull-based decoder over a callback-driven backend
//!
//! [`FrameDecoder`] asks its backend for one frame at a time and hands the
//! caller exactly as many interleaved samples as requested. Frames arrive
//! through [`DecodeSink`] callbacks while the backend call is on the stack;
//! the sink converts each frame to the output depth and parks the bytes in a
//! [`RingBuffer`] until the caller takes them.
//!
//! # Read loop
//!
//! Each iteration first surfaces a latched backend error, then moves whatever
//! whole samples are buffered into the caller's slice, then classifies the
//! situation with [`pump_phase`]:
//!
//! - [`PumpPhase::HaveEnough`]: request satisfied, return `Ok`
//! - [`PumpPhase::EndOfStream`]: backend is done; return what was delivered
//!   with `Ok`, or `EndOfStream` if nothing was
//! - [`PumpPhase::NeedMoreInput`]: decode one more frame and loop
//!
//! Because buffered bytes are drained before every backend call, the ring
//! never holds more than one frame.

use std::path::Path;

use super::backend::{DecodeBackend, DecodeSink, Frame, WriteStatus};
use super::error::{BridgeError, BridgeResult, DecoderState, StreamErrorStatus};
use super::formats::{BitDepth, StreamFormat};
use super::ring_buffer::RingBuffer;
use super::sample::interleave_frame;
use super::stream_info::StreamInfo;

/// Ring capacity used unless one is given: two max-size 32-bit stereo frames
pub const DEFAULT_RING_CAPACITY: usize = 2 * 2 * 4 * 4096;

/// Reported by [`FrameDecoder::resolved_state`] when no stream is open
pub const NOT_INITIALIZED_STATE: &str = "DECODER_NOT_INITIALIZED";

/// How a `read_samples` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// Samples were delivered; more may follow
    Ok,
    /// No samples left; reported once nothing was delivered in the call
    EndOfStream,
    /// The backend failed; samples delivered earlier in the call are kept
    Error(BridgeError),
}

/// Result of one `read_samples` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Samples per channel written to the destination
    pub samples: usize,
    pub status: ReadStatus,
}

impl ReadOutcome {
    pub fn is_end_of_stream(&self) -> bool {
        self.status == ReadStatus::EndOfStream
    }
}

/// Where the read loop stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpPhase {
    /// Buffer is short and the backend has more; decode another frame
    NeedMoreInput,
    /// Buffer holds everything still requested
    HaveEnough,
    /// Buffer is short and the backend has nothing more
    EndOfStream,
}

/// Classify the read loop from buffered samples, samples still wanted and
/// whether the backend reached the end of its stream
pub fn pump_phase(available: usize, remaining: usize, backend_done: bool) -> PumpPhase {
    if available >= remaining {
        PumpPhase::HaveEnough
    } else if backend_done {
        PumpPhase::EndOfStream
    } else {
        PumpPhase::NeedMoreInput
    }
}

/// State the backend's callbacks write into
#[derive(Debug)]
pub(crate) struct PumpState {
    pub(crate) ring: RingBuffer,
    pub(crate) info: Option<StreamInfo>,
    pub(crate) format: StreamFormat,
    output_width: usize,
    /// First error reported since the last read; never overwritten
    pub(crate) pending_error: Option<BridgeError>,
    scratch: Vec<u8>,
}

impl PumpState {
    fn new(output_width: usize, ring_capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(ring_capacity),
            info: None,
            format: StreamFormat::default(),
            output_width,
            pending_error: None,
            scratch: Vec::new(),
        }
    }

    fn latch(&mut self, error: BridgeError) {
        if self.pending_error.is_none() {
            self.pending_error = Some(error);
        }
    }

    fn reset(&mut self) {
        self.ring.reset();
        self.info = None;
        self.format = StreamFormat::default();
        self.pending_error = None;
    }

    /// Bytes per interleaved sample frame at the output depth
    fn sample_frame_bytes(&self) -> usize {
        self.format.channels as usize * self.output_width
    }
}

impl DecodeSink for PumpState {
    fn on_metadata(&mut self, info: &StreamInfo) {
        if self.info.is_some() {
            log::debug!("ignoring repeated STREAMINFO");
            return;
        }
        log::debug!(
            "STREAMINFO: {} Hz, {} channels, {} bits, {} samples, blocks {}..{}",
            info.sample_rate,
            info.channels,
            info.bits_per_sample,
            info.total_samples,
            info.min_block_size,
            info.max_block_size
        );

        self.info = Some(*info);
        self.format = info.format();

        let wanted = 2 * usize::from(info.max_block_size) * self.sample_frame_bytes();
        if wanted > self.ring.capacity() {
            log::debug!(
                "growing ring buffer from {} to {} bytes",
                self.ring.capacity(),
                wanted.next_power_of_two()
            );
            self.ring = RingBuffer::new(wanted);
        }
    }

    fn on_error(&mut self, status: StreamErrorStatus) {
        log::error!("FLAC decoder error callback: {}", status);
        self.latch(BridgeError::Stream(status));
    }

    fn on_frame(&mut self, frame: &Frame<'_>) -> WriteStatus {
        if !self.format.is_known() {
            self.latch(BridgeError::NotReady(
                "frame delivered before stream metadata".to_string(),
            ));
            return WriteStatus::Abort;
        }
        if frame.channels.len() != self.format.channels as usize {
            self.latch(BridgeError::Backend {
                state: DecoderState::ReadFrame.to_string(),
                message: format!(
                    "frame has {} channels, stream has {}",
                    frame.channels.len(),
                    self.format.channels
                ),
            });
            return WriteStatus::Abort;
        }

        interleave_frame(
            frame.channels,
            frame.block_size,
            self.format.source_bytes_per_sample(),
            self.output_width,
            &mut self.scratch,
        );

        match self.ring.write(&self.scratch) {
            Ok(()) => WriteStatus::Continue,
            Err(e) => {
                log::error!("write callback: {}", e);
                self.latch(e.into());
                WriteStatus::Abort
            }
        }
    }
}

/// Decoder delivering interleaved little-endian PCM at a fixed output depth
pub struct FrameDecoder<B: DecodeBackend> {
    pub(crate) backend: B,
    pub(crate) pump: PumpState,
    output_depth: BitDepth,
    pub(crate) current_sample: u64,
}

impl<B: DecodeBackend> FrameDecoder<B> {
    /// Create a decoder producing `output_bits` (8, 16, 24 or 32) per sample
    pub fn new(output_bits: u32, backend: B) -> BridgeResult<Self> {
        Self::with_ring_capacity(output_bits, DEFAULT_RING_CAPACITY, backend)
    }

    /// Like [`FrameDecoder::new`] with an explicit initial ring capacity
    pub fn with_ring_capacity(
        output_bits: u32,
        ring_capacity: usize,
        backend: B,
    ) -> BridgeResult<Self> {
        let output_depth = BitDepth::from_bits(output_bits)?;
        Ok(Self {
            backend,
            pump: PumpState::new(output_depth.bytes_per_sample(), ring_capacity),
            output_depth,
            current_sample: 0,
        })
    }

    /// Open a stream and read through its metadata
    pub fn open(&mut self, path: impl AsRef<Path>) -> BridgeResult<()> {
        let path = path.as_ref();
        self.close();
        log::debug!("opening {} with {} backend", path.display(), self.backend.name());
        let result = self.backend.open(path, &mut self.pump);
        self.finish_open(result)
    }

    /// Open an in-memory stream and read through its metadata
    pub fn open_from_bytes(&mut self, data: &[u8]) -> BridgeResult<()> {
        self.close();
        let result = self.backend.open_from_bytes(data, &mut self.pump);
        self.finish_open(result)
    }

    fn finish_open(&mut self, result: BridgeResult<()>) -> BridgeResult<()> {
        let result = result.and_then(|()| {
            if self.pump.format.is_known() {
                Ok(())
            } else {
                Err(BridgeError::Backend {
                    state: self.backend.state().to_string(),
                    message: "stream has no metadata".to_string(),
                })
            }
        });

        if let Err(e) = result {
            log::warn!("open failed: {}", e);
            self.backend.finish();
            self.pump.reset();
            self.current_sample = 0;
            return Err(e);
        }
        Ok(())
    }

    /// Release the open stream, if any, and clear all stream state
    pub fn close(&mut self) {
        if self.backend.is_open() {
            self.backend.finish();
        }
        self.pump.reset();
        self.current_sample = 0;
    }

    /// Read up to `count` samples per channel into `dest`
    ///
    /// `dest` must hold `count * channels * output_bytes` bytes. Returns `Err`
    /// only when the request is rejected before any work is done; failures
    /// during decoding come back as [`ReadStatus::Error`] together with the
    /// samples already delivered by this call.
    pub fn read_samples(&mut self, count: usize, dest: &mut [u8]) -> BridgeResult<ReadOutcome> {
        if count == 0 {
            return Err(BridgeError::InvalidArgument(
                "sample count must be positive".to_string(),
            ));
        }
        if !self.pump.format.is_known() {
            return Err(BridgeError::NotReady(
                "stream format unknown; open a stream first".to_string(),
            ));
        }

        let frame_bytes = self.pump.sample_frame_bytes();
        let needed = count.checked_mul(frame_bytes).ok_or_else(|| {
            BridgeError::InvalidArgument(format!("sample count {} overflows buffer size", count))
        })?;
        if dest.len() < needed {
            return Err(BridgeError::BufferTooSmall {
                needed,
                got: dest.len(),
            });
        }

        let mut delivered = 0usize;
        loop {
            if let Some(error) = self.pump.pending_error.take() {
                return Ok(ReadOutcome {
                    samples: delivered,
                    status: ReadStatus::Error(error),
                });
            }

            let remaining = count - delivered;
            let available = self.pump.ring.available_read() / frame_bytes;
            let take = available.min(remaining);
            if take > 0 {
                let start = delivered * frame_bytes;
                let read = self
                    .pump
                    .ring
                    .read(&mut dest[start..start + take * frame_bytes]);
                debug_assert_eq!(read, take * frame_bytes);
                delivered += take;
                self.current_sample += take as u64;
            }

            let backend_done = self.backend.state() == DecoderState::EndOfStream;
            match pump_phase(available, remaining, backend_done) {
                PumpPhase::HaveEnough => {
                    return Ok(ReadOutcome {
                        samples: delivered,
                        status: ReadStatus::Ok,
                    });
                }
                PumpPhase::EndOfStream => {
                    let status = if delivered == 0 {
                        ReadStatus::EndOfStream
                    } else {
                        ReadStatus::Ok
                    };
                    return Ok(ReadOutcome {
                        samples: delivered,
                        status,
                    });
                }
                PumpPhase::NeedMoreInput => {
                    if !self.backend.decode_one_frame(&mut self.pump) {
                        let state = self.backend.state();
                        let error = self.pump.pending_error.take().unwrap_or_else(|| {
                            BridgeError::Backend {
                                state: state.to_string(),
                                message: "failed to process frame".to_string(),
                            }
                        });
                        log::warn!("decode stopped after {} samples: {}", delivered, error);
                        return Ok(ReadOutcome {
                            samples: delivered,
                            status: ReadStatus::Error(error),
                        });
                    }
                }
            }
        }
    }

    /// Stream format; all zero until a stream is open
    pub fn format(&self) -> StreamFormat {
        self.pump.format
    }

    /// Full STREAMINFO of the open stream
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.pump.info.as_ref()
    }

    /// Samples per channel in the stream, 0 if unknown
    pub fn total_samples(&self) -> u64 {
        self.pump.info.map(|info| info.total_samples).unwrap_or(0)
    }

    /// Next sample index `read_samples` will deliver
    pub fn current_position(&self) -> u64 {
        self.current_sample
    }

    pub fn output_depth(&self) -> BitDepth {
        self.output_depth
    }

    /// Backend state name, or [`NOT_INITIALIZED_STATE`] with no open stream
    pub fn resolved_state(&self) -> String {
        if self.backend.is_open() {
            self.backend.state().as_str().to_string()
        } else {
            NOT_INITIALIZED_STATE.to_string()
        }
    }

    /// Backend library version
    pub fn version(&self) -> String {
        self.backend.version()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: DecodeBackend> Drop for FrameDecoder<B> {
    fn drop(&mut self) {
        if self.backend.is_open() {
            self.backend.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::backend::{
        EncodeBackend, EncodeSink, EncoderSettings, MemoryDecoder, MemoryEncoder,
    };

    struct Bytes(Vec<u8>);

    impl EncodeSink for Bytes {
        fn on_write(&mut self, bytes: &[u8], _samples: u32, _frame: u32) -> WriteStatus {
            self.0.extend_from_slice(bytes);
            WriteStatus::Continue
        }

        fn on_metadata(&mut self, _info: &StreamInfo) {}
    }

    /// Interleaved samples to a PCMF container with an exact sample count
    fn container(samples: &[i32], channels: u32, bits: u32, block_size: u32) -> Vec<u8> {
        let count = samples.len() / channels as usize;
        let settings = EncoderSettings {
            sample_rate: 8000,
            channels,
            bits_per_sample: bits,
            compression_level: 5,
            block_size,
            total_samples_estimate: count as u64,
            verify: true,
        };
        let mut encoder = MemoryEncoder::new();
        let mut out = Bytes(Vec::new());
        encoder.init_stream(&settings, &mut out).unwrap();
        assert!(encoder.process_interleaved(samples, count, &mut out));
        assert!(encoder.finish(&mut out));
        out.0
    }

    fn open_ramp(n: i32, block_size: u32) -> FrameDecoder<MemoryDecoder> {
        let samples: Vec<i32> = (0..n).collect();
        let mut decoder = FrameDecoder::new(16, MemoryDecoder::new()).unwrap();
        decoder
            .open_from_bytes(&container(&samples, 1, 16, block_size))
            .unwrap();
        decoder
    }

    fn as_i16(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_pump_phase() {
        assert_eq!(pump_phase(10, 4, false), PumpPhase::HaveEnough);
        assert_eq!(pump_phase(4, 4, true), PumpPhase::HaveEnough);
        assert_eq!(pump_phase(3, 4, false), PumpPhase::NeedMoreInput);
        assert_eq!(pump_phase(3, 4, true), PumpPhase::EndOfStream);
        assert_eq!(pump_phase(0, 1, true), PumpPhase::EndOfStream);
    }

    #[test]
    fn test_new_rejects_bad_depth() {
        assert!(matches!(
            FrameDecoder::new(20, MemoryDecoder::new()),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_read_spanning_frames() {
        let mut decoder = open_ramp(10, 4);
        assert_eq!(decoder.total_samples(), 10);
        assert_eq!(decoder.format().channels, 1);

        let mut buf = [0u8; 14];
        let outcome = decoder.read_samples(7, &mut buf).unwrap();
        assert_eq!(outcome.samples, 7);
        assert_eq!(outcome.status, ReadStatus::Ok);
        assert_eq!(as_i16(&buf), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(decoder.current_position(), 7);
    }

    #[test]
    fn test_partial_then_end_of_stream() {
        let mut decoder = open_ramp(5, 4);
        let mut buf = [0u8; 16];

        let outcome = decoder.read_samples(8, &mut buf).unwrap();
        assert_eq!(outcome.samples, 5);
        assert_eq!(outcome.status, ReadStatus::Ok);
        assert_eq!(as_i16(&buf[..10]), vec![0, 1, 2, 3, 4]);

        let outcome = decoder.read_samples(8, &mut buf).unwrap();
        assert_eq!(outcome.samples, 0);
        assert!(outcome.is_end_of_stream());

        // End of stream is sticky
        assert!(decoder.read_samples(1, &mut buf).unwrap().is_end_of_stream());
    }

    #[test]
    fn test_ring_stays_within_one_frame() {
        let mut decoder = FrameDecoder::with_ring_capacity(16, 8, MemoryDecoder::new()).unwrap();
        let samples: Vec<i32> = (0..100).collect();
        decoder
            .open_from_bytes(&container(&samples, 1, 16, 4))
            .unwrap();

        // Much larger than the ring: draining between frames keeps it fitting
        let mut buf = vec![0u8; 200];
        let outcome = decoder.read_samples(100, &mut buf).unwrap();
        assert_eq!(outcome.samples, 100);
        assert_eq!(as_i16(&buf)[99], 99);
    }

    #[test]
    fn test_frame_larger_than_ring_latches_error() {
        let mut decoder = FrameDecoder::with_ring_capacity(16, 8, MemoryDecoder::new()).unwrap();
        // Header claims max block 0, so the ring is not grown for the 16-sample frame
        let mut data = container(&(0..16).collect::<Vec<_>>(), 1, 16, 16);
        data[4..8].copy_from_slice(&[0, 0, 0, 0]);
        decoder.open_from_bytes(&data).unwrap();

        let mut buf = [0u8; 32];
        let outcome = decoder.read_samples(16, &mut buf).unwrap();
        assert_eq!(outcome.samples, 0);
        assert!(matches!(
            outcome.status,
            ReadStatus::Error(BridgeError::InsufficientSpace(_))
        ));
    }

    #[test]
    fn test_repeated_metadata_is_ignored() {
        let info = StreamInfo {
            min_block_size: 4,
            max_block_size: 4,
            sample_rate: 8000,
            channels: 1,
            bits_per_sample: 16,
            total_samples: 4,
            ..StreamInfo::default()
        };
        let mut pump = PumpState::new(2, 64);
        pump.on_metadata(&info);
        let left = [1, 2, 3, 4];
        let planes: [&[i32]; 1] = [&left];
        let frame = Frame {
            block_size: 4,
            channels: &planes,
        };
        assert_eq!(pump.on_frame(&frame), WriteStatus::Continue);

        let other = StreamInfo {
            max_block_size: 65535,
            channels: 2,
            bits_per_sample: 24,
            ..info
        };
        pump.on_metadata(&other);
        assert_eq!(pump.info, Some(info));
        assert_eq!(pump.format.channels, 1);
        assert_eq!(pump.ring.capacity(), 64);
        assert_eq!(pump.ring.available_read(), 8);
    }

    #[test]
    fn test_preconditions() {
        let mut decoder = FrameDecoder::new(16, MemoryDecoder::new()).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            decoder.read_samples(1, &mut buf),
            Err(BridgeError::NotReady(_))
        ));

        let mut decoder = open_ramp(4, 4);
        assert!(matches!(
            decoder.read_samples(0, &mut buf),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            decoder.read_samples(usize::MAX, &mut buf),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert_eq!(
            decoder.read_samples(3, &mut buf),
            Err(BridgeError::BufferTooSmall { needed: 6, got: 4 })
        );
        assert_eq!(decoder.current_position(), 0);
    }

    #[test]
    fn test_widening_output() {
        let samples = vec![1, -1, 0x7FFF];
        let mut decoder = FrameDecoder::new(32, MemoryDecoder::new()).unwrap();
        decoder
            .open_from_bytes(&container(&samples, 1, 16, 16))
            .unwrap();
        let mut buf = [0u8; 12];
        assert_eq!(decoder.read_samples(3, &mut buf).unwrap().samples, 3);
        let values: Vec<i32> = buf
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(values, vec![0x1_0000, -0x1_0000, 0x7FFF_0000]);
    }

    #[test]
    fn test_resolved_state_and_close() {
        let mut decoder = FrameDecoder::new(16, MemoryDecoder::new()).unwrap();
        assert_eq!(decoder.resolved_state(), NOT_INITIALIZED_STATE);
        assert!(decoder.version().contains("PCMF"));

        decoder
            .open_from_bytes(&container(&[1, 2, 3], 1, 16, 4))
            .unwrap();
        assert_eq!(
            decoder.resolved_state(),
            "FLAC__STREAM_DECODER_SEARCH_FOR_FRAME_SYNC"
        );
        assert_eq!(decoder.stream_info().unwrap().max_block_size, 4);

        decoder.close();
        assert_eq!(decoder.resolved_state(), NOT_INITIALIZED_STATE);
        assert!(!decoder.format().is_known());
        assert!(decoder.stream_info().is_none());
        assert_eq!(decoder.total_samples(), 0);
    }

    #[test]
    fn test_failed_open_resets_state() {
        let mut decoder = open_ramp(4, 4);
        assert!(decoder.open_from_bytes(b"not a stream at all, not even close").is_err());
        assert!(!decoder.format().is_known());
        assert_eq!(decoder.current_position(), 0);
        assert_eq!(decoder.resolved_state(), NOT_INITIALIZED_STATE);
    }

    #[test]
    fn test_reopen_restarts_position() {
        let mut decoder = open_ramp(6, 4);
        let mut buf = [0u8; 8];
        decoder.read_samples(4, &mut buf).unwrap();
        assert_eq!(decoder.current_position(), 4);

        let samples: Vec<i32> = (100..106).collect();
        decoder
            .open_from_bytes(&container(&samples, 1, 16, 4))
            .unwrap();
        assert_eq!(decoder.current_position(), 0);
        decoder.read_samples(2, &mut buf).unwrap();
        assert_eq!(as_i16(&buf[..4]), vec![100, 101]);
    }
}
