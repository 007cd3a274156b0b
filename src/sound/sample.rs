//! Sample packing between integer PCM values and interleaved bytes
//!
//! Samples travel as sign-extended `i32` everywhere except at the byte
//! boundary, where exactly `width` little-endian bytes are written or read.
//! 24-bit samples only exist as three bytes on this boundary; sign extension
//! from bit 23 happens here and nowhere else.
//!
//! Width changes work on whole bytes. Narrowing drops the low-order bytes
//! (24-bit `0x123456` becomes 16-bit `0x1234`, no rounding or dither);
//! widening shifts the value up so full scale stays full scale.

use super::error::BridgeResult;
use super::formats::BitDepth;

/// Largest supported sample width in bytes
pub const MAX_SAMPLE_WIDTH: usize = 4;

fn assert_width(width: usize) {
    assert!(
        (1..=MAX_SAMPLE_WIDTH).contains(&width),
        "unsupported sample width: {} bytes",
        width
    );
}

/// Write `value` as `width` little-endian two's-complement bytes
///
/// Bits above the target width are dropped.
///
/// # Panics
/// Panics if `width` is not 1, 2, 3 or 4, or `dest` is shorter than `width`.
#[inline]
pub fn pack_sample(value: i32, width: usize, dest: &mut [u8]) {
    assert_width(width);
    dest[..width].copy_from_slice(&value.to_le_bytes()[..width]);
}

/// Read a signed sample of `width` little-endian bytes
///
/// # Panics
/// Panics if `width` is not 1, 2, 3 or 4, or `bytes` is shorter than `width`.
#[inline]
pub fn unpack_sample(bytes: &[u8], width: usize) -> i32 {
    match width {
        1 => bytes[0] as i8 as i32,
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        3 => {
            let v = bytes[0] as i32 | (bytes[1] as i32) << 8 | (bytes[2] as i32) << 16;
            if v & 0x80_0000 != 0 {
                v | !0xFF_FFFF
            } else {
                v
            }
        }
        4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        other => panic!("unsupported sample width: {} bytes", other),
    }
}

/// Move a sample from one byte width to another
#[inline]
pub fn rescale_sample(value: i32, source_width: usize, output_width: usize) -> i32 {
    if output_width < source_width {
        value >> ((source_width - output_width) * 8)
    } else if output_width > source_width {
        value << ((output_width - source_width) * 8)
    } else {
        value
    }
}

/// Interleave one decoded frame into `out`
///
/// `channels` holds one slice per channel, each at least `sample_count` long.
/// Output is sample-major with channels inner: `L0 R0 L1 R1 ...`. `out` is
/// cleared first.
pub fn interleave_frame(
    channels: &[&[i32]],
    sample_count: usize,
    source_width: usize,
    output_width: usize,
    out: &mut Vec<u8>,
) {
    assert_width(output_width);
    out.clear();
    out.reserve(sample_count * channels.len() * output_width);

    let mut bytes = [0u8; MAX_SAMPLE_WIDTH];
    for i in 0..sample_count {
        for channel in channels {
            let value = rescale_sample(channel[i], source_width, output_width);
            pack_sample(value, output_width, &mut bytes);
            out.extend_from_slice(&bytes[..output_width]);
        }
    }
}

/// Convert interleaved little-endian PCM bytes to `i32` samples
///
/// 8-bit input is read as signed. Converts
/// `min(pcm.len() / bytes_per_sample, out.len())` samples and returns that
/// count; trailing bytes that do not form a whole sample are ignored.
pub fn pcm_to_i32(pcm: &[u8], bits_per_sample: u32, out: &mut [i32]) -> BridgeResult<usize> {
    let width = BitDepth::from_bits(bits_per_sample)?.bytes_per_sample();
    let count = (pcm.len() / width).min(out.len());

    for (dst, chunk) in out[..count].iter_mut().zip(pcm.chunks_exact(width)) {
        *dst = unpack_sample(chunk, width);
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::error::BridgeError;
    use proptest::prelude::*;

    #[test]
    fn test_pack_16bit() {
        let mut buf = [0u8; 2];
        pack_sample(-2, 2, &mut buf);
        assert_eq!(buf, [0xFE, 0xFF]);
        pack_sample(0x1234, 2, &mut buf);
        assert_eq!(buf, [0x34, 0x12]);
    }

    #[test]
    fn test_pack_8bit_truncates_to_low_byte() {
        let mut buf = [0u8; 1];
        pack_sample(-1, 1, &mut buf);
        assert_eq!(buf, [0xFF]);
        pack_sample(0x17F, 1, &mut buf);
        assert_eq!(buf, [0x7F]);
    }

    #[test]
    fn test_24bit_sign_extension() {
        let mut buf = [0u8; 3];
        pack_sample(-8_388_608, 3, &mut buf);
        assert_eq!(buf, [0x00, 0x00, 0x80]);
        assert_eq!(unpack_sample(&buf, 3), -8_388_608);

        pack_sample(-1, 3, &mut buf);
        assert_eq!(buf, [0xFF, 0xFF, 0xFF]);
        assert_eq!(unpack_sample(&buf, 3), -1);

        assert_eq!(unpack_sample(&[0xFF, 0xFF, 0x7F], 3), 8_388_607);
    }

    #[test]
    fn test_narrow_24_to_16_keeps_high_bytes() {
        let mut packed = [0u8; 3];
        pack_sample(0x123456, 3, &mut packed);
        assert_eq!(packed, [0x56, 0x34, 0x12]);

        // The two high-order bytes of the 24-bit value, read as 16-bit
        assert_eq!(unpack_sample(&packed[1..3], 2), 0x1234);

        let narrowed = rescale_sample(0x123456, 3, 2);
        assert_eq!(narrowed, 0x1234);

        // Truncation, not rounding
        assert_eq!(rescale_sample(0x1234FF, 3, 2), 0x1234);
        assert_eq!(rescale_sample(-1, 3, 2), -1);
    }

    #[test]
    fn test_widen_16_to_24() {
        assert_eq!(rescale_sample(0x1234, 2, 3), 0x123400);
        assert_eq!(rescale_sample(-32768, 2, 3), -8_388_608);
        assert_eq!(rescale_sample(77, 2, 2), 77);
    }

    #[test]
    #[should_panic(expected = "unsupported sample width")]
    fn test_pack_invalid_width_panics() {
        let mut buf = [0u8; 8];
        pack_sample(0, 5, &mut buf);
    }

    #[test]
    #[should_panic(expected = "unsupported sample width")]
    fn test_unpack_invalid_width_panics() {
        unpack_sample(&[0u8; 8], 0);
    }

    #[test]
    fn test_interleave_frame_stereo() {
        let left = [1, 2, 3];
        let right = [-1, -2, -3];
        let mut out = Vec::new();
        interleave_frame(&[&left[..], &right[..]], 3, 2, 2, &mut out);
        assert_eq!(
            out,
            vec![1, 0, 0xFF, 0xFF, 2, 0, 0xFE, 0xFF, 3, 0, 0xFD, 0xFF]
        );
    }

    #[test]
    fn test_interleave_frame_narrows() {
        let mono = [0x123456];
        let mut out = Vec::new();
        interleave_frame(&[&mono[..]], 1, 3, 2, &mut out);
        assert_eq!(out, vec![0x34, 0x12]);
    }

    #[test]
    fn test_pcm_to_i32_depths() {
        let mut out = [0i32; 4];

        assert_eq!(pcm_to_i32(&[0x80, 0x7F], 8, &mut out).unwrap(), 2);
        assert_eq!(&out[..2], &[-128, 127]);

        assert_eq!(pcm_to_i32(&[0x00, 0x80, 0xFF, 0x7F], 16, &mut out).unwrap(), 2);
        assert_eq!(&out[..2], &[-32768, 32767]);

        assert_eq!(pcm_to_i32(&[0x00, 0x00, 0x80], 24, &mut out).unwrap(), 1);
        assert_eq!(out[0], -8_388_608);

        assert_eq!(pcm_to_i32(&[0xFF, 0xFF, 0xFF, 0x7F], 32, &mut out).unwrap(), 1);
        assert_eq!(out[0], i32::MAX);
    }

    #[test]
    fn test_pcm_to_i32_limits_to_output_len() {
        let pcm = [1u8, 0, 2, 0, 3, 0, 4];
        let mut out = [0i32; 2];
        assert_eq!(pcm_to_i32(&pcm, 16, &mut out).unwrap(), 2);
        assert_eq!(out, [1, 2]);

        let mut big = [0i32; 8];
        assert_eq!(pcm_to_i32(&pcm, 16, &mut big).unwrap(), 3);
    }

    #[test]
    fn test_pcm_to_i32_rejects_bad_depth() {
        let mut out = [0i32; 2];
        assert!(matches!(
            pcm_to_i32(&[0, 0], 12, &mut out),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_pack_unpack_8(x in (i8::MIN as i32)..=(i8::MAX as i32)) {
            let mut buf = [0u8; 1];
            pack_sample(x, 1, &mut buf);
            prop_assert_eq!(unpack_sample(&buf, 1), x);
        }

        #[test]
        fn prop_pack_unpack_16(x in (i16::MIN as i32)..=(i16::MAX as i32)) {
            let mut buf = [0u8; 2];
            pack_sample(x, 2, &mut buf);
            prop_assert_eq!(unpack_sample(&buf, 2), x);
        }

        #[test]
        fn prop_pack_unpack_24(x in -8_388_608i32..=8_388_607) {
            let mut buf = [0u8; 3];
            pack_sample(x, 3, &mut buf);
            prop_assert_eq!(unpack_sample(&buf, 3), x);
        }

        #[test]
        fn prop_pack_unpack_32(x in any::<i32>()) {
            let mut buf = [0u8; 4];
            pack_sample(x, 4, &mut buf);
            prop_assert_eq!(unpack_sample(&buf, 4), x);
        }
    }
}
