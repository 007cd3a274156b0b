//! Shared helpers for integration tests
//!
//! [`ScriptedBackend`] replays a fixed list of steps, one per
//! `decode_one_frame` call, so read loop behavior can be checked against
//! exact frame and error sequences.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;

use flac_bridge::sound::backend::{DecodeBackend, DecodeSink, Frame, WriteStatus};
use flac_bridge::sound::{BridgeResult, DecoderState, StreamErrorStatus, StreamInfo};

/// What one `decode_one_frame` call does
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver a planar frame
    Frame(Vec<Vec<i32>>),
    /// Report stream errors, in order, without a frame
    Errors(Vec<StreamErrorStatus>),
    /// Report an error, then deliver a frame in the same call
    ErrorThenFrame(StreamErrorStatus, Vec<Vec<i32>>),
    /// Fail the call outright with the given state
    Fail(DecoderState),
}

#[derive(Debug)]
pub struct ScriptedBackend {
    info: Option<StreamInfo>,
    script: Vec<Step>,
    steps: VecDeque<Step>,
    after_seek: Option<Vec<Step>>,
    seek_fails: bool,
    state: DecoderState,
    pub seeks: Vec<u64>,
    pub decode_calls: usize,
}

impl ScriptedBackend {
    pub fn new(info: Option<StreamInfo>, steps: Vec<Step>) -> Self {
        Self {
            info,
            script: steps,
            steps: VecDeque::new(),
            after_seek: None,
            seek_fails: false,
            state: DecoderState::Uninitialized,
            seeks: Vec::new(),
            decode_calls: 0,
        }
    }

    /// Replace the remaining script with `steps` after each successful seek
    pub fn with_seek_script(mut self, steps: Vec<Step>) -> Self {
        self.after_seek = Some(steps);
        self
    }

    /// Make every seek fail with `SeekError`
    pub fn failing_seeks(mut self) -> Self {
        self.seek_fails = true;
        self
    }
}

impl DecodeBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn version(&self) -> String {
        "scripted 1.0".to_string()
    }

    fn open(&mut self, _path: &Path, sink: &mut dyn DecodeSink) -> BridgeResult<()> {
        self.steps = self.script.iter().cloned().collect();
        self.state = DecoderState::SearchForFrameSync;
        if let Some(info) = &self.info {
            sink.on_metadata(info);
        }
        Ok(())
    }

    fn decode_one_frame(&mut self, sink: &mut dyn DecodeSink) -> bool {
        self.decode_calls += 1;
        if self.state == DecoderState::EndOfStream {
            return true;
        }

        let step = match self.steps.pop_front() {
            Some(step) => step,
            None => {
                self.state = DecoderState::EndOfStream;
                return true;
            }
        };

        match step {
            Step::Frame(planes) => deliver(&planes, sink, &mut self.state),
            Step::Errors(statuses) => {
                for status in statuses {
                    sink.on_error(status);
                }
                true
            }
            Step::ErrorThenFrame(status, planes) => {
                sink.on_error(status);
                deliver(&planes, sink, &mut self.state)
            }
            Step::Fail(state) => {
                self.state = state;
                false
            }
        }
    }

    fn seek_absolute(&mut self, sample: u64, _sink: &mut dyn DecodeSink) -> bool {
        self.seeks.push(sample);
        if self.seek_fails {
            self.state = DecoderState::SeekError;
            return false;
        }
        if let Some(steps) = &self.after_seek {
            self.steps = steps.iter().cloned().collect();
        }
        self.state = DecoderState::SearchForFrameSync;
        true
    }

    fn finish(&mut self) {
        self.steps.clear();
        self.state = DecoderState::Uninitialized;
    }

    fn state(&self) -> DecoderState {
        self.state
    }
}

fn deliver(planes: &[Vec<i32>], sink: &mut dyn DecodeSink, state: &mut DecoderState) -> bool {
    let channels: Vec<&[i32]> = planes.iter().map(Vec::as_slice).collect();
    let frame = Frame {
        block_size: planes.first().map_or(0, Vec::len),
        channels: &channels,
    };
    match sink.on_frame(&frame) {
        WriteStatus::Continue => true,
        WriteStatus::Abort => {
            *state = DecoderState::Aborted;
            false
        }
    }
}

/// STREAMINFO for a 44.1 kHz stream
pub fn stream_info(channels: u32, bits_per_sample: u32, total_samples: u64) -> StreamInfo {
    StreamInfo {
        min_block_size: 16,
        max_block_size: 4096,
        sample_rate: 44100,
        channels,
        bits_per_sample,
        total_samples,
        ..StreamInfo::default()
    }
}

/// Stereo planes of `len` samples starting at sample `start`
///
/// Left carries the sample index, right its negation.
pub fn stereo_planes(start: i32, len: i32) -> Vec<Vec<i32>> {
    let left: Vec<i32> = (start..start + len).collect();
    let right: Vec<i32> = left.iter().map(|v| -v).collect();
    vec![left, right]
}

pub fn stereo_ramp(start: i32, len: i32) -> Step {
    Step::Frame(stereo_planes(start, len))
}

/// Decode 16-bit little-endian interleaved bytes
pub fn as_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Interleaved values `stereo_ramp` frames decode to
pub fn expected_stereo(start: i32, len: i32) -> Vec<i16> {
    (start..start + len)
        .flat_map(|v| [v as i16, -v as i16])
        .collect()
}
