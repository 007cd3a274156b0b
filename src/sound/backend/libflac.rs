//! libFLAC backend
//!
//! Binds the system libFLAC stream decoder and encoder. The client data
//! passed to libFLAC is a [`Handle`] packed into the pointer, never a pointer
//! to Rust memory. Each callback resolves the handle to a mailbox, records
//! what happened and returns; once the libFLAC call is back the recorded
//! events are replayed to the caller's sink in order.
//!
//! A write callback can therefore not stop libFLAC mid-call. When the sink
//! asks to abort during replay, the backend refuses all further work and
//! reports `Aborted`.

use std::ffi::{CStr, CString};
use std::path::Path;
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_uint, c_void, size_t};
use parking_lot::Mutex;

use super::handle::{Handle, HandleTable};
use super::{
    DecodeBackend, DecodeSink, EncodeBackend, EncodeSink, EncoderSettings, Frame, WriteStatus,
};
use crate::sound::error::{
    BridgeError, BridgeResult, DecoderState, EncoderState, StreamErrorStatus,
};
use crate::sound::stream_info::StreamInfo;

#[repr(C)]
struct FlacStreamDecoder {
    _private: [u8; 0],
}

#[repr(C)]
struct FlacStreamEncoder {
    _private: [u8; 0],
}

/// Leading fields of `FLAC__FrameHeader`, the first member of `FLAC__Frame`
#[allow(dead_code)]
#[repr(C)]
struct FrameHeaderPrefix {
    blocksize: c_uint,
    sample_rate: c_uint,
    channels: c_uint,
    channel_assignment: c_int,
    bits_per_sample: c_uint,
}

#[repr(C)]
struct RawStreamInfo {
    min_blocksize: c_uint,
    max_blocksize: c_uint,
    min_framesize: c_uint,
    max_framesize: c_uint,
    sample_rate: c_uint,
    channels: c_uint,
    bits_per_sample: c_uint,
    total_samples: u64,
    md5sum: [u8; 16],
}

/// `FLAC__StreamMetadata` as far as the STREAMINFO member of its data union
#[allow(dead_code)]
#[repr(C)]
struct RawStreamMetadata {
    kind: c_int,
    is_last: c_int,
    length: c_uint,
    stream_info: RawStreamInfo,
}

const METADATA_TYPE_STREAMINFO: c_int = 0;
const DECODER_WRITE_CONTINUE: c_int = 0;
const DECODER_WRITE_ABORT: c_int = 1;
const ENCODER_WRITE_OK: c_int = 0;
const ENCODER_WRITE_FATAL: c_int = 1;
const INIT_STATUS_OK: c_int = 0;

type DecoderWriteCallback = unsafe extern "C" fn(
    *const FlacStreamDecoder,
    *const FrameHeaderPrefix,
    *const *const i32,
    *mut c_void,
) -> c_int;
type DecoderMetadataCallback =
    unsafe extern "C" fn(*const FlacStreamDecoder, *const RawStreamMetadata, *mut c_void);
type DecoderErrorCallback = unsafe extern "C" fn(*const FlacStreamDecoder, c_int, *mut c_void);
type EncoderWriteCallback = unsafe extern "C" fn(
    *const FlacStreamEncoder,
    *const u8,
    size_t,
    c_uint,
    c_uint,
    *mut c_void,
) -> c_int;
type EncoderMetadataCallback =
    unsafe extern "C" fn(*const FlacStreamEncoder, *const RawStreamMetadata, *mut c_void);

extern "C" {
    static FLAC__VERSION_STRING: *const c_char;

    fn FLAC__stream_decoder_new() -> *mut FlacStreamDecoder;
    fn FLAC__stream_decoder_delete(decoder: *mut FlacStreamDecoder);
    fn FLAC__stream_decoder_init_file(
        decoder: *mut FlacStreamDecoder,
        filename: *const c_char,
        write_callback: Option<DecoderWriteCallback>,
        metadata_callback: Option<DecoderMetadataCallback>,
        error_callback: Option<DecoderErrorCallback>,
        client_data: *mut c_void,
    ) -> c_int;
    fn FLAC__stream_decoder_process_until_end_of_metadata(decoder: *mut FlacStreamDecoder)
        -> c_int;
    fn FLAC__stream_decoder_process_single(decoder: *mut FlacStreamDecoder) -> c_int;
    fn FLAC__stream_decoder_seek_absolute(decoder: *mut FlacStreamDecoder, sample: u64) -> c_int;
    fn FLAC__stream_decoder_flush(decoder: *mut FlacStreamDecoder) -> c_int;
    fn FLAC__stream_decoder_finish(decoder: *mut FlacStreamDecoder) -> c_int;
    fn FLAC__stream_decoder_get_state(decoder: *const FlacStreamDecoder) -> c_int;

    fn FLAC__stream_encoder_new() -> *mut FlacStreamEncoder;
    fn FLAC__stream_encoder_delete(encoder: *mut FlacStreamEncoder);
    fn FLAC__stream_encoder_set_channels(encoder: *mut FlacStreamEncoder, value: c_uint) -> c_int;
    fn FLAC__stream_encoder_set_bits_per_sample(
        encoder: *mut FlacStreamEncoder,
        value: c_uint,
    ) -> c_int;
    fn FLAC__stream_encoder_set_sample_rate(encoder: *mut FlacStreamEncoder, value: c_uint)
        -> c_int;
    fn FLAC__stream_encoder_set_compression_level(
        encoder: *mut FlacStreamEncoder,
        value: c_uint,
    ) -> c_int;
    fn FLAC__stream_encoder_set_blocksize(encoder: *mut FlacStreamEncoder, value: c_uint) -> c_int;
    fn FLAC__stream_encoder_set_verify(encoder: *mut FlacStreamEncoder, value: c_int) -> c_int;
    fn FLAC__stream_encoder_set_total_samples_estimate(
        encoder: *mut FlacStreamEncoder,
        value: u64,
    ) -> c_int;
    fn FLAC__stream_encoder_init_stream(
        encoder: *mut FlacStreamEncoder,
        write_callback: Option<EncoderWriteCallback>,
        seek_callback: *const c_void,
        tell_callback: *const c_void,
        metadata_callback: Option<EncoderMetadataCallback>,
        client_data: *mut c_void,
    ) -> c_int;
    fn FLAC__stream_encoder_init_file(
        encoder: *mut FlacStreamEncoder,
        filename: *const c_char,
        progress_callback: *const c_void,
        client_data: *mut c_void,
    ) -> c_int;
    fn FLAC__stream_encoder_process_interleaved(
        encoder: *mut FlacStreamEncoder,
        buffer: *const i32,
        samples: c_uint,
    ) -> c_int;
    fn FLAC__stream_encoder_finish(encoder: *mut FlacStreamEncoder) -> c_int;
    fn FLAC__stream_encoder_get_state(encoder: *const FlacStreamEncoder) -> c_int;
}

fn decoder_init_status_name(status: c_int) -> &'static str {
    match status {
        0 => "FLAC__STREAM_DECODER_INIT_STATUS_OK",
        1 => "FLAC__STREAM_DECODER_INIT_STATUS_UNSUPPORTED_CONTAINER",
        2 => "FLAC__STREAM_DECODER_INIT_STATUS_INVALID_CALLBACKS",
        3 => "FLAC__STREAM_DECODER_INIT_STATUS_MEMORY_ALLOCATION_ERROR",
        4 => "FLAC__STREAM_DECODER_INIT_STATUS_ERROR_OPENING_FILE",
        5 => "FLAC__STREAM_DECODER_INIT_STATUS_ALREADY_INITIALIZED",
        _ => "unknown init status",
    }
}

fn encoder_init_status_name(status: c_int) -> &'static str {
    match status {
        0 => "FLAC__STREAM_ENCODER_INIT_STATUS_OK",
        1 => "FLAC__STREAM_ENCODER_INIT_STATUS_ENCODER_ERROR",
        2 => "FLAC__STREAM_ENCODER_INIT_STATUS_UNSUPPORTED_CONTAINER",
        3 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_CALLBACKS",
        4 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_NUMBER_OF_CHANNELS",
        5 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_BITS_PER_SAMPLE",
        6 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_SAMPLE_RATE",
        7 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_BLOCK_SIZE",
        8 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_MAX_LPC_ORDER",
        9 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_QLP_COEFF_PRECISION",
        10 => "FLAC__STREAM_ENCODER_INIT_STATUS_BLOCK_SIZE_TOO_SMALL_FOR_LPC_ORDER",
        11 => "FLAC__STREAM_ENCODER_INIT_STATUS_NOT_STREAMABLE",
        12 => "FLAC__STREAM_ENCODER_INIT_STATUS_INVALID_METADATA",
        13 => "FLAC__STREAM_ENCODER_INIT_STATUS_ALREADY_INITIALIZED",
        _ => "unknown init status",
    }
}

fn path_to_cstring(path: &Path) -> BridgeResult<CString> {
    let s = path.to_str().ok_or_else(|| {
        BridgeError::InvalidArgument(format!("path is not valid UTF-8: {}", path.display()))
    })?;
    CString::new(s)
        .map_err(|_| BridgeError::InvalidArgument(format!("path contains NUL: {}", s)))
}

fn stream_info_from_raw(raw: &RawStreamInfo) -> StreamInfo {
    StreamInfo {
        min_block_size: raw.min_blocksize as u16,
        max_block_size: raw.max_blocksize as u16,
        min_frame_size: raw.min_framesize,
        max_frame_size: raw.max_framesize,
        sample_rate: raw.sample_rate,
        channels: raw.channels,
        bits_per_sample: raw.bits_per_sample,
        total_samples: raw.total_samples,
        md5_signature: raw.md5sum,
    }
}

/// Read a STREAMINFO out of a metadata callback argument
///
/// # Safety
/// `metadata` must be null or point to a valid `FLAC__StreamMetadata`.
unsafe fn read_stream_info(metadata: *const RawStreamMetadata) -> Option<StreamInfo> {
    let metadata = metadata.as_ref()?;
    if metadata.kind != METADATA_TYPE_STREAMINFO {
        return None;
    }
    Some(stream_info_from_raw(&metadata.stream_info))
}

// =============================================================================
// Decoder
// =============================================================================

enum DecodeEvent {
    Metadata(StreamInfo),
    Error(StreamErrorStatus),
    Frame {
        block_size: usize,
        channels: Vec<Vec<i32>>,
    },
}

#[derive(Default)]
struct DecodeMailbox {
    events: Mutex<Vec<DecodeEvent>>,
}

static DECODERS: HandleTable<DecodeMailbox> = HandleTable::new();

unsafe extern "C" fn decoder_write_callback(
    _decoder: *const FlacStreamDecoder,
    frame: *const FrameHeaderPrefix,
    buffer: *const *const i32,
    client_data: *mut c_void,
) -> c_int {
    let Some(mailbox) = DECODERS.get(Handle::from_raw(client_data as usize)) else {
        return DECODER_WRITE_ABORT;
    };
    let Some(header) = frame.as_ref() else {
        return DECODER_WRITE_ABORT;
    };

    let block_size = header.blocksize as usize;
    let channels = (0..header.channels as usize)
        .map(|ch| std::slice::from_raw_parts(*buffer.add(ch), block_size).to_vec())
        .collect();
    mailbox.events.lock().push(DecodeEvent::Frame {
        block_size,
        channels,
    });
    DECODER_WRITE_CONTINUE
}

unsafe extern "C" fn decoder_metadata_callback(
    _decoder: *const FlacStreamDecoder,
    metadata: *const RawStreamMetadata,
    client_data: *mut c_void,
) {
    let Some(mailbox) = DECODERS.get(Handle::from_raw(client_data as usize)) else {
        return;
    };
    if let Some(info) = read_stream_info(metadata) {
        mailbox.events.lock().push(DecodeEvent::Metadata(info));
    }
}

unsafe extern "C" fn decoder_error_callback(
    _decoder: *const FlacStreamDecoder,
    status: c_int,
    client_data: *mut c_void,
) {
    if let Some(mailbox) = DECODERS.get(Handle::from_raw(client_data as usize)) {
        mailbox
            .events
            .lock()
            .push(DecodeEvent::Error(StreamErrorStatus::from_raw(status as u32)));
    }
}

/// Decoder backed by `FLAC__StreamDecoder`
pub struct LibFlacDecoder {
    raw: NonNull<FlacStreamDecoder>,
    handle: Option<Handle>,
    aborted: bool,
}

impl LibFlacDecoder {
    pub fn new() -> BridgeResult<Self> {
        let raw = NonNull::new(unsafe { FLAC__stream_decoder_new() }).ok_or_else(|| {
            BridgeError::Backend {
                state: DecoderState::MemoryAllocationError.to_string(),
                message: "failed to create FLAC decoder".to_string(),
            }
        })?;
        Ok(Self {
            raw,
            handle: None,
            aborted: false,
        })
    }

    /// Hand recorded callback events to `sink`
    fn replay(&mut self, sink: &mut dyn DecodeSink) -> WriteStatus {
        let Some(mailbox) = self.handle.and_then(|h| DECODERS.get(h)) else {
            return WriteStatus::Continue;
        };
        let events = std::mem::take(&mut *mailbox.events.lock());

        for event in events {
            match event {
                DecodeEvent::Metadata(info) => sink.on_metadata(&info),
                DecodeEvent::Error(status) => sink.on_error(status),
                DecodeEvent::Frame {
                    block_size,
                    channels,
                } => {
                    let slices: Vec<&[i32]> = channels.iter().map(Vec::as_slice).collect();
                    let frame = Frame {
                        block_size,
                        channels: &slices,
                    };
                    if sink.on_frame(&frame) == WriteStatus::Abort {
                        self.aborted = true;
                        return WriteStatus::Abort;
                    }
                }
            }
        }
        WriteStatus::Continue
    }

    fn discard_events(&self) {
        if let Some(mailbox) = self.handle.and_then(|h| DECODERS.get(h)) {
            mailbox.events.lock().clear();
        }
    }

    fn raw_state(&self) -> DecoderState {
        DecoderState::from_raw(unsafe { FLAC__stream_decoder_get_state(self.raw.as_ptr()) } as u32)
    }

    /// libFLAC refuses both decoding and seeking until a failed seek is flushed
    ///
    /// Done lazily so `state()` keeps reporting `SeekError` until the next call.
    fn recover_from_seek_error(&mut self) {
        if self.raw_state() == DecoderState::SeekError {
            unsafe { FLAC__stream_decoder_flush(self.raw.as_ptr()) };
        }
    }
}

impl DecodeBackend for LibFlacDecoder {
    fn name(&self) -> &'static str {
        "libFLAC"
    }

    fn version(&self) -> String {
        let version = unsafe { CStr::from_ptr(FLAC__VERSION_STRING) };
        format!("libFLAC {}", version.to_string_lossy())
    }

    fn open(&mut self, path: &Path, sink: &mut dyn DecodeSink) -> BridgeResult<()> {
        self.finish();
        let c_path = path_to_cstring(path)?;

        let handle = DECODERS.insert(DecodeMailbox::default()).ok_or_else(|| {
            BridgeError::Backend {
                state: DecoderState::Uninitialized.to_string(),
                message: "too many open decoders".to_string(),
            }
        })?;

        let status = unsafe {
            FLAC__stream_decoder_init_file(
                self.raw.as_ptr(),
                c_path.as_ptr(),
                Some(decoder_write_callback),
                Some(decoder_metadata_callback),
                Some(decoder_error_callback),
                handle.to_raw() as *mut c_void,
            )
        };
        if status != INIT_STATUS_OK {
            DECODERS.remove(handle);
            return Err(BridgeError::Backend {
                state: self.raw_state().to_string(),
                message: format!("init error: {}", decoder_init_status_name(status)),
            });
        }
        self.handle = Some(handle);

        let ok =
            unsafe { FLAC__stream_decoder_process_until_end_of_metadata(self.raw.as_ptr()) } != 0;
        self.replay(sink);
        if !ok {
            let state = self.raw_state();
            self.finish();
            return Err(BridgeError::Backend {
                state: state.to_string(),
                message: "failed to process metadata".to_string(),
            });
        }
        Ok(())
    }

    fn decode_one_frame(&mut self, sink: &mut dyn DecodeSink) -> bool {
        if self.handle.is_none() || self.aborted {
            return false;
        }
        self.recover_from_seek_error();

        let ok = unsafe { FLAC__stream_decoder_process_single(self.raw.as_ptr()) } != 0;
        let replayed = self.replay(sink);
        ok && replayed == WriteStatus::Continue
    }

    fn seek_absolute(&mut self, sample: u64, sink: &mut dyn DecodeSink) -> bool {
        if self.handle.is_none() || self.aborted {
            return false;
        }
        self.recover_from_seek_error();

        let ok = unsafe { FLAC__stream_decoder_seek_absolute(self.raw.as_ptr(), sample) } != 0;
        if !ok {
            self.discard_events();
            return false;
        }
        self.replay(sink) == WriteStatus::Continue
    }

    fn finish(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { FLAC__stream_decoder_finish(self.raw.as_ptr()) };
            DECODERS.remove(handle);
        }
        self.aborted = false;
    }

    fn state(&self) -> DecoderState {
        if self.handle.is_none() {
            DecoderState::Uninitialized
        } else if self.aborted {
            DecoderState::Aborted
        } else {
            self.raw_state()
        }
    }
}

impl Drop for LibFlacDecoder {
    fn drop(&mut self) {
        self.finish();
        unsafe { FLAC__stream_decoder_delete(self.raw.as_ptr()) };
    }
}

// =============================================================================
// Encoder
// =============================================================================

enum EncodeEvent {
    Write {
        bytes: Vec<u8>,
        samples: u32,
        current_frame: u32,
    },
    Metadata(StreamInfo),
}

#[derive(Default)]
struct EncodeMailbox {
    events: Mutex<Vec<EncodeEvent>>,
}

static ENCODERS: HandleTable<EncodeMailbox> = HandleTable::new();

unsafe extern "C" fn encoder_write_callback(
    _encoder: *const FlacStreamEncoder,
    buffer: *const u8,
    bytes: size_t,
    samples: c_uint,
    current_frame: c_uint,
    client_data: *mut c_void,
) -> c_int {
    let Some(mailbox) = ENCODERS.get(Handle::from_raw(client_data as usize)) else {
        return ENCODER_WRITE_FATAL;
    };
    let bytes = if bytes == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(buffer, bytes).to_vec()
    };
    mailbox.events.lock().push(EncodeEvent::Write {
        bytes,
        samples,
        current_frame,
    });
    ENCODER_WRITE_OK
}

unsafe extern "C" fn encoder_metadata_callback(
    _encoder: *const FlacStreamEncoder,
    metadata: *const RawStreamMetadata,
    client_data: *mut c_void,
) {
    let Some(mailbox) = ENCODERS.get(Handle::from_raw(client_data as usize)) else {
        return;
    };
    if let Some(info) = read_stream_info(metadata) {
        mailbox.events.lock().push(EncodeEvent::Metadata(info));
    }
}

/// Encoder backed by `FLAC__StreamEncoder`
pub struct LibFlacEncoder {
    raw: NonNull<FlacStreamEncoder>,
    /// Set in stream mode only
    handle: Option<Handle>,
    active: bool,
    aborted: bool,
}

impl LibFlacEncoder {
    pub fn new() -> BridgeResult<Self> {
        let raw = NonNull::new(unsafe { FLAC__stream_encoder_new() }).ok_or_else(|| {
            BridgeError::Backend {
                state: EncoderState::MemoryAllocationError.to_string(),
                message: "failed to create FLAC encoder".to_string(),
            }
        })?;
        Ok(Self {
            raw,
            handle: None,
            active: false,
            aborted: false,
        })
    }

    fn configure(&mut self, settings: &EncoderSettings) -> BridgeResult<()> {
        if self.active {
            return Err(BridgeError::NotReady(
                "encoder already initialized".to_string(),
            ));
        }

        let raw = self.raw.as_ptr();
        let fail = |what: &str| BridgeError::Backend {
            state: EncoderState::Uninitialized.to_string(),
            message: format!("failed to set {}", what),
        };
        unsafe {
            if FLAC__stream_encoder_set_channels(raw, settings.channels) == 0 {
                return Err(fail("channels"));
            }
            if FLAC__stream_encoder_set_bits_per_sample(raw, settings.bits_per_sample) == 0 {
                return Err(fail("bits per sample"));
            }
            if FLAC__stream_encoder_set_sample_rate(raw, settings.sample_rate) == 0 {
                return Err(fail("sample rate"));
            }
            if FLAC__stream_encoder_set_compression_level(raw, settings.compression_level) == 0 {
                return Err(fail("compression level"));
            }
            if FLAC__stream_encoder_set_blocksize(raw, settings.block_size) == 0 {
                return Err(fail("block size"));
            }
            if FLAC__stream_encoder_set_verify(raw, c_int::from(settings.verify)) == 0 {
                return Err(fail("verify"));
            }
            if FLAC__stream_encoder_set_total_samples_estimate(
                raw,
                settings.total_samples_estimate,
            ) == 0
            {
                return Err(fail("total samples estimate"));
            }
        }
        Ok(())
    }

    fn replay(&mut self, sink: &mut dyn EncodeSink) -> WriteStatus {
        let Some(mailbox) = self.handle.and_then(|h| ENCODERS.get(h)) else {
            return WriteStatus::Continue;
        };
        let events = std::mem::take(&mut *mailbox.events.lock());

        for event in events {
            match event {
                EncodeEvent::Write {
                    bytes,
                    samples,
                    current_frame,
                } => {
                    if sink.on_write(&bytes, samples, current_frame) == WriteStatus::Abort {
                        self.aborted = true;
                        return WriteStatus::Abort;
                    }
                }
                EncodeEvent::Metadata(info) => sink.on_metadata(&info),
            }
        }
        WriteStatus::Continue
    }

    fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            ENCODERS.remove(handle);
        }
    }

    fn raw_state(&self) -> EncoderState {
        EncoderState::from_raw(unsafe { FLAC__stream_encoder_get_state(self.raw.as_ptr()) } as u32)
    }
}

impl EncodeBackend for LibFlacEncoder {
    fn name(&self) -> &'static str {
        "libFLAC"
    }

    fn init_stream(
        &mut self,
        settings: &EncoderSettings,
        sink: &mut dyn EncodeSink,
    ) -> BridgeResult<()> {
        self.configure(settings)?;
        let handle = ENCODERS.insert(EncodeMailbox::default()).ok_or_else(|| {
            BridgeError::Backend {
                state: EncoderState::Uninitialized.to_string(),
                message: "too many open encoders".to_string(),
            }
        })?;

        let status = unsafe {
            FLAC__stream_encoder_init_stream(
                self.raw.as_ptr(),
                Some(encoder_write_callback),
                ptr::null(),
                ptr::null(),
                Some(encoder_metadata_callback),
                handle.to_raw() as *mut c_void,
            )
        };
        if status != INIT_STATUS_OK {
            ENCODERS.remove(handle);
            return Err(BridgeError::Backend {
                state: self.raw_state().to_string(),
                message: format!(
                    "init stream encoder error: {}",
                    encoder_init_status_name(status)
                ),
            });
        }

        self.handle = Some(handle);
        self.active = true;
        self.aborted = false;

        // The stream marker and header are written during init
        if self.replay(sink) == WriteStatus::Abort {
            return Err(BridgeError::Backend {
                state: EncoderState::ClientError.to_string(),
                message: "write callback rejected the stream header".to_string(),
            });
        }
        Ok(())
    }

    fn init_file(&mut self, settings: &EncoderSettings, path: &Path) -> BridgeResult<()> {
        self.configure(settings)?;
        let c_path = path_to_cstring(path)?;

        let status = unsafe {
            FLAC__stream_encoder_init_file(
                self.raw.as_ptr(),
                c_path.as_ptr(),
                ptr::null(),
                ptr::null_mut(),
            )
        };
        if status != INIT_STATUS_OK {
            return Err(BridgeError::Backend {
                state: self.raw_state().to_string(),
                message: format!("init encoder error: {}", encoder_init_status_name(status)),
            });
        }
        self.active = true;
        self.aborted = false;
        Ok(())
    }

    fn process_interleaved(
        &mut self,
        samples: &[i32],
        count: usize,
        sink: &mut dyn EncodeSink,
    ) -> bool {
        if !self.active || self.aborted {
            return false;
        }
        let Ok(count) = c_uint::try_from(count) else {
            return false;
        };

        let ok = unsafe {
            FLAC__stream_encoder_process_interleaved(self.raw.as_ptr(), samples.as_ptr(), count)
        } != 0;
        let replayed = self.replay(sink);
        ok && replayed == WriteStatus::Continue
    }

    fn finish(&mut self, sink: &mut dyn EncodeSink) -> bool {
        if !self.active {
            return true;
        }
        let ok = unsafe { FLAC__stream_encoder_finish(self.raw.as_ptr()) } != 0;
        let replayed = self.replay(sink);
        self.release_handle();
        self.active = false;
        ok && replayed == WriteStatus::Continue
    }

    fn state(&self) -> EncoderState {
        if self.aborted {
            EncoderState::ClientError
        } else {
            self.raw_state()
        }
    }
}

impl Drop for LibFlacEncoder {
    fn drop(&mut self) {
        if self.active {
            unsafe { FLAC__stream_encoder_finish(self.raw.as_ptr()) };
        }
        self.release_handle();
        unsafe { FLAC__stream_encoder_delete(self.raw.as_ptr()) };
    }
}
