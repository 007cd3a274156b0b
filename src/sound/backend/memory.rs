//! Pure-Rust verbatim frame backend
//!
//! Stores PCM without compression in a small framed container so the whole
//! decode and encode path can run without libFLAC:
//!
//! ```text
//! "PCMF" | STREAMINFO (34 bytes) | frame*
//! frame = block size (u32 LE) | channel 0 samples | channel 1 samples | ...
//! ```
//!
//! Samples are stored little-endian at `ceil(bits / 8)` bytes each, one
//! channel after another. The MD5 field of the header is left zeroed.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::{
    DecodeBackend, DecodeSink, EncodeBackend, EncodeSink, EncoderSettings, Frame, WriteStatus,
};
use crate::sound::error::{
    BridgeError, BridgeResult, DecoderState, EncoderState, StreamErrorStatus,
};
use crate::sound::sample::{pack_sample, unpack_sample, MAX_SAMPLE_WIDTH};
use crate::sound::stream_info::{StreamInfo, STREAMINFO_LEN};

/// Container magic
pub const MAGIC: [u8; 4] = *b"PCMF";

/// Magic plus STREAMINFO
pub const HEADER_LEN: usize = MAGIC.len() + STREAMINFO_LEN;

const MAX_TOTAL_SAMPLES: u64 = (1 << 36) - 1;

fn read_le_u32(cursor: &mut Cursor<&[u8]>) -> Option<u32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf).ok()?;
    Some(u32::from_le_bytes(buf))
}

fn width_for(bits_per_sample: u32) -> usize {
    (bits_per_sample as usize + 7) / 8
}

/// Location of one frame inside the container
#[derive(Debug, Clone, Copy)]
struct FrameEntry {
    /// Offset of the first sample byte
    offset: usize,
    first_sample: u64,
    block_size: usize,
}

/// Decoder for the verbatim container
#[derive(Debug)]
pub struct MemoryDecoder {
    data: Vec<u8>,
    info: StreamInfo,
    frames: Vec<FrameEntry>,
    /// Trailing bytes that do not form a whole frame
    truncated: bool,
    truncation_reported: bool,
    next_frame: usize,
    state: DecoderState,
    planar: Vec<Vec<i32>>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            info: StreamInfo::default(),
            frames: Vec::new(),
            truncated: false,
            truncation_reported: false,
            next_frame: 0,
            state: DecoderState::Uninitialized,
            planar: Vec::new(),
        }
    }

    /// Samples per channel actually present in the frames
    pub fn indexed_samples(&self) -> u64 {
        self.frames
            .last()
            .map(|f| f.first_sample + f.block_size as u64)
            .unwrap_or(0)
    }

    fn index_frames(&mut self) {
        let channels = self.info.channels as usize;
        let width = width_for(self.info.bits_per_sample);
        let mut cursor = Cursor::new(&self.data[..]);
        cursor.set_position(HEADER_LEN as u64);

        let mut first_sample = 0u64;
        while (cursor.position() as usize) < self.data.len() {
            let Some(block_size) = read_le_u32(&mut cursor) else {
                self.truncated = true;
                break;
            };
            let block_size = block_size as usize;
            let offset = cursor.position() as usize;
            let end = block_size
                .checked_mul(channels * width)
                .and_then(|len| offset.checked_add(len));

            match end {
                Some(end) if end <= self.data.len() => {
                    self.frames.push(FrameEntry {
                        offset,
                        first_sample,
                        block_size,
                    });
                    first_sample += block_size as u64;
                    cursor.set_position(end as u64);
                }
                _ => {
                    self.truncated = true;
                    break;
                }
            }
        }
    }

    /// Deliver frame `index` starting `skip` samples in
    fn emit_frame(&mut self, index: usize, skip: usize, sink: &mut dyn DecodeSink) -> WriteStatus {
        let entry = self.frames[index];
        let channels = self.info.channels as usize;
        let width = width_for(self.info.bits_per_sample);
        let block = entry.block_size;

        self.planar.resize_with(channels, Vec::new);
        for (ch, plane) in self.planar.iter_mut().enumerate() {
            let base = entry.offset + ch * block * width;
            plane.clear();
            plane.extend(
                self.data[base + skip * width..base + block * width]
                    .chunks_exact(width)
                    .map(|bytes| unpack_sample(bytes, width)),
            );
        }

        let slices: Vec<&[i32]> = self.planar.iter().map(Vec::as_slice).collect();
        sink.on_frame(&Frame {
            block_size: block - skip,
            channels: &slices,
        })
    }
}

impl Default for MemoryDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeBackend for MemoryDecoder {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn version(&self) -> String {
        format!("PCMF verbatim {}", env!("CARGO_PKG_VERSION"))
    }

    fn open(&mut self, path: &Path, sink: &mut dyn DecodeSink) -> BridgeResult<()> {
        let data = std::fs::read(path)
            .map_err(|e| BridgeError::Io(format!("{}: {}", path.display(), e)))?;
        self.open_from_bytes(&data, sink)
    }

    fn open_from_bytes(&mut self, data: &[u8], sink: &mut dyn DecodeSink) -> BridgeResult<()> {
        self.finish();

        if data.len() < HEADER_LEN || data[..MAGIC.len()] != MAGIC {
            return Err(BridgeError::Backend {
                state: DecoderState::Uninitialized.to_string(),
                message: "init error: not a PCMF stream (FLAC input needs the libflac feature)"
                    .to_string(),
            });
        }

        self.state = DecoderState::ReadMetadata;
        self.info = StreamInfo::parse(&data[MAGIC.len()..HEADER_LEN])?;
        self.data = data.to_vec();
        self.index_frames();

        log::debug!(
            "PCMF stream: {} Hz, {} channels, {} bits, {} frames{}",
            self.info.sample_rate,
            self.info.channels,
            self.info.bits_per_sample,
            self.frames.len(),
            if self.truncated { ", truncated" } else { "" }
        );

        sink.on_metadata(&self.info);
        self.state = DecoderState::SearchForFrameSync;
        Ok(())
    }

    fn decode_one_frame(&mut self, sink: &mut dyn DecodeSink) -> bool {
        match self.state {
            DecoderState::Uninitialized
            | DecoderState::Aborted
            | DecoderState::OggError
            | DecoderState::MemoryAllocationError => return false,
            DecoderState::EndOfStream => return true,
            _ => {}
        }

        if self.next_frame < self.frames.len() {
            self.state = DecoderState::ReadFrame;
            let status = self.emit_frame(self.next_frame, 0, sink);
            self.next_frame += 1;
            if status == WriteStatus::Abort {
                self.state = DecoderState::Aborted;
                return false;
            }
            self.state = DecoderState::SearchForFrameSync;
            return true;
        }

        if self.truncated && !self.truncation_reported {
            self.truncation_reported = true;
            sink.on_error(StreamErrorStatus::LostSync);
        }
        self.state = DecoderState::EndOfStream;
        true
    }

    fn seek_absolute(&mut self, sample: u64, sink: &mut dyn DecodeSink) -> bool {
        match self.state {
            DecoderState::Uninitialized | DecoderState::Aborted => return false,
            _ => {}
        }

        if sample >= self.indexed_samples() {
            self.state = DecoderState::SeekError;
            return false;
        }

        let index = self
            .frames
            .partition_point(|f| f.first_sample + f.block_size as u64 <= sample);
        let skip = (sample - self.frames[index].first_sample) as usize;

        self.state = DecoderState::ReadFrame;
        let status = self.emit_frame(index, skip, sink);
        self.next_frame = index + 1;
        if status == WriteStatus::Abort {
            self.state = DecoderState::Aborted;
            return false;
        }
        self.state = DecoderState::SearchForFrameSync;
        true
    }

    fn finish(&mut self) {
        self.data = Vec::new();
        self.frames.clear();
        self.info = StreamInfo::default();
        self.truncated = false;
        self.truncation_reported = false;
        self.next_frame = 0;
        self.state = DecoderState::Uninitialized;
    }

    fn state(&self) -> DecoderState {
        self.state
    }
}

enum Output {
    Sink,
    File(BufWriter<File>),
}

/// Encoder for the verbatim container
pub struct MemoryEncoder {
    settings: Option<EncoderSettings>,
    output: Output,
    /// Interleaved samples waiting for a full block
    pending: Vec<i32>,
    info: StreamInfo,
    frame_number: u32,
    samples_written: u64,
    state: EncoderState,
    frame_buf: Vec<u8>,
}

impl MemoryEncoder {
    pub fn new() -> Self {
        Self {
            settings: None,
            output: Output::Sink,
            pending: Vec::new(),
            info: StreamInfo::default(),
            frame_number: 0,
            samples_written: 0,
            state: EncoderState::Uninitialized,
            frame_buf: Vec::new(),
        }
    }

    fn begin(&mut self, settings: &EncoderSettings) -> BridgeResult<[u8; HEADER_LEN]> {
        if self.state == EncoderState::Ok {
            return Err(BridgeError::NotReady(
                "encoder already initialized".to_string(),
            ));
        }
        if !(1..=8).contains(&settings.channels) {
            return Err(BridgeError::InvalidArgument(format!(
                "invalid channel count: {}",
                settings.channels
            )));
        }
        if !(1..=32).contains(&settings.bits_per_sample) {
            return Err(BridgeError::InvalidArgument(format!(
                "invalid bits per sample: {}",
                settings.bits_per_sample
            )));
        }
        if settings.block_size == 0 || settings.block_size > u32::from(u16::MAX) {
            return Err(BridgeError::InvalidArgument(format!(
                "invalid block size: {}",
                settings.block_size
            )));
        }
        if settings.total_samples_estimate > MAX_TOTAL_SAMPLES {
            return Err(BridgeError::InvalidArgument(format!(
                "total samples estimate too large: {}",
                settings.total_samples_estimate
            )));
        }

        self.settings = Some(*settings);
        self.pending.clear();
        self.frame_number = 0;
        self.samples_written = 0;
        self.info = StreamInfo {
            min_block_size: settings.block_size as u16,
            max_block_size: settings.block_size as u16,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            bits_per_sample: settings.bits_per_sample,
            total_samples: settings.total_samples_estimate,
            md5_signature: [0; 16],
        };

        let mut header = [0u8; HEADER_LEN];
        header[..MAGIC.len()].copy_from_slice(&MAGIC);
        header[MAGIC.len()..].copy_from_slice(&self.info.serialize());
        Ok(header)
    }

    /// Pack `block` samples per channel from `pending[start..]` and emit them
    fn write_frame(&mut self, start: usize, block: usize, sink: &mut dyn EncodeSink) -> bool {
        let Some(settings) = self.settings else {
            return false;
        };
        let channels = settings.channels as usize;
        let width = width_for(settings.bits_per_sample);

        self.frame_buf.clear();
        self.frame_buf
            .extend_from_slice(&(block as u32).to_le_bytes());

        let mut bytes = [0u8; MAX_SAMPLE_WIDTH];
        for ch in 0..channels {
            for i in 0..block {
                let value = self.pending[start + i * channels + ch];
                pack_sample(value, width, &mut bytes);
                if settings.verify && unpack_sample(&bytes, width) != value {
                    log::warn!(
                        "verify mismatch in frame {}, channel {}, sample {}: {} exceeds {} bits",
                        self.frame_number,
                        ch,
                        i,
                        value,
                        settings.bits_per_sample
                    );
                    self.state = EncoderState::VerifyMismatch;
                    return false;
                }
                self.frame_buf.extend_from_slice(&bytes[..width]);
            }
        }

        let frame_len = self.frame_buf.len() as u32;
        if self.frame_number == 0 {
            self.info.min_frame_size = frame_len;
        } else {
            self.info.min_frame_size = self.info.min_frame_size.min(frame_len);
        }
        self.info.max_frame_size = self.info.max_frame_size.max(frame_len);

        match &mut self.output {
            Output::Sink => {
                if sink.on_write(&self.frame_buf, block as u32, self.frame_number)
                    == WriteStatus::Abort
                {
                    self.state = EncoderState::ClientError;
                    return false;
                }
            }
            Output::File(writer) => {
                if let Err(e) = writer.write_all(&self.frame_buf) {
                    log::warn!("PCMF frame write failed: {}", e);
                    self.state = EncoderState::IoError;
                    return false;
                }
            }
        }

        self.frame_number = self.frame_number.wrapping_add(1);
        self.samples_written += block as u64;
        true
    }

    fn rewrite_header(&mut self) -> std::io::Result<()> {
        if let Output::File(writer) = &mut self.output {
            writer.seek(SeekFrom::Start(MAGIC.len() as u64))?;
            writer.write_all(&self.info.serialize())?;
            writer.flush()?;
        }
        Ok(())
    }
}

impl Default for MemoryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeBackend for MemoryEncoder {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn init_stream(
        &mut self,
        settings: &EncoderSettings,
        sink: &mut dyn EncodeSink,
    ) -> BridgeResult<()> {
        let header = self.begin(settings)?;
        self.output = Output::Sink;
        if sink.on_write(&header, 0, 0) == WriteStatus::Abort {
            self.state = EncoderState::ClientError;
            return Err(BridgeError::Backend {
                state: self.state.to_string(),
                message: "write callback rejected the stream header".to_string(),
            });
        }
        self.state = EncoderState::Ok;
        Ok(())
    }

    fn init_file(&mut self, settings: &EncoderSettings, path: &Path) -> BridgeResult<()> {
        let header = self.begin(settings)?;
        let file = File::create(path)
            .map_err(|e| BridgeError::Io(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header)?;
        self.output = Output::File(writer);
        self.state = EncoderState::Ok;
        Ok(())
    }

    fn process_interleaved(
        &mut self,
        samples: &[i32],
        count: usize,
        sink: &mut dyn EncodeSink,
    ) -> bool {
        let Some(settings) = self.settings else {
            return false;
        };
        if self.state != EncoderState::Ok {
            return false;
        }

        let channels = settings.channels as usize;
        let wanted = count.saturating_mul(channels).min(samples.len());
        self.pending.extend_from_slice(&samples[..wanted]);

        let block = settings.block_size as usize;
        let frame_len = block * channels;
        let mut consumed = 0;
        let mut ok = true;
        while self.pending.len() - consumed >= frame_len {
            if !self.write_frame(consumed, block, sink) {
                ok = false;
                break;
            }
            consumed += frame_len;
        }
        self.pending.drain(..consumed);
        ok
    }

    fn finish(&mut self, sink: &mut dyn EncodeSink) -> bool {
        let Some(settings) = self.settings else {
            return true;
        };

        let mut ok = self.state == EncoderState::Ok;
        if ok && !self.pending.is_empty() {
            let remaining = self.pending.len() / settings.channels as usize;
            ok = self.write_frame(0, remaining, sink);
        }
        self.pending.clear();

        if ok {
            self.info.total_samples = self.samples_written.min(MAX_TOTAL_SAMPLES);
            if let Err(e) = self.rewrite_header() {
                log::warn!("PCMF header rewrite failed: {}", e);
                self.state = EncoderState::IoError;
                ok = false;
            }
        }

        if ok {
            sink.on_metadata(&self.info);
            self.state = EncoderState::Uninitialized;
        }
        self.output = Output::Sink;
        self.settings = None;
        ok
    }

    fn state(&self) -> EncoderState {
        self.state
    }
}
