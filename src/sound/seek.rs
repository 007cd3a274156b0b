//! Seeking for [`FrameDecoder`]
//!
//! A seek throws away everything buffered, repositions the backend and only
//! then commits the new position. If the backend refuses, the position stays
//! where it was.

use std::io::SeekFrom;

use super::backend::DecodeBackend;
use super::decoder::FrameDecoder;
use super::error::{BridgeError, BridgeResult};

/// Turn a [`SeekFrom`] into a signed absolute sample index
fn resolve_target(pos: SeekFrom, current: u64, total: u64) -> BridgeResult<i64> {
    let target = match pos {
        SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
        SeekFrom::Current(delta) => (current as i64).saturating_add(delta),
        SeekFrom::End(delta) => {
            if total == 0 {
                return Err(BridgeError::InvalidArgument(
                    "cannot seek relative to the end of a stream of unknown length".to_string(),
                ));
            }
            (total as i64).saturating_add(delta)
        }
    };
    Ok(target)
}

impl<B: DecodeBackend> FrameDecoder<B> {
    /// Move to a sample position, returning the new absolute position
    ///
    /// Fails with `OutOfRange` for negative targets and, when the stream
    /// length is known, for targets at or past the end. A backend failure
    /// yields `SeekFailed` and leaves the position unchanged.
    pub fn seek(&mut self, pos: SeekFrom) -> BridgeResult<u64> {
        if !self.pump.format.is_known() {
            return Err(BridgeError::NotReady(
                "no stream open to seek in".to_string(),
            ));
        }

        let total = self.total_samples();
        let target = resolve_target(pos, self.current_sample, total)?;
        if target < 0 || (total > 0 && target as u64 >= total) {
            return Err(BridgeError::OutOfRange {
                position: target,
                total,
            });
        }
        let target = target as u64;

        self.pump.ring.reset();
        if !self.backend.seek_absolute(target, &mut self.pump) {
            // Drop anything the backend wrote before giving up
            self.pump.ring.reset();
            let state = self.backend.state();
            log::warn!("seek to sample {} failed: {}", target, state);
            return Err(BridgeError::SeekFailed { state });
        }

        log::debug!("seeked from sample {} to {}", self.current_sample, target);
        self.current_sample = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target(SeekFrom::Start(5), 2, 10).unwrap(), 5);
        assert_eq!(resolve_target(SeekFrom::Current(-3), 2, 10).unwrap(), -1);
        assert_eq!(resolve_target(SeekFrom::Current(4), 2, 0).unwrap(), 6);
        assert_eq!(resolve_target(SeekFrom::End(-1), 2, 10).unwrap(), 9);
        assert_eq!(
            resolve_target(SeekFrom::Start(u64::MAX), 0, 10).unwrap(),
            i64::MAX
        );
    }

    #[test]
    fn test_resolve_end_needs_known_length() {
        assert!(matches!(
            resolve_target(SeekFrom::End(0), 0, 0),
            Err(BridgeError::InvalidArgument(_))
        ));
    }
}
