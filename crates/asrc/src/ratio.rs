//! Rate ratio calculation.
//!
//! The converter core is programmed with `dst / src` in Q22 fixed point. It
//! can upsample by at most [`UP_MAX`] and downsample by at most [`DN_MAX`].

use platform::Q22Ratio;

use crate::config::SocRevision;
use crate::error::RangeError;

/// Largest upsampling factor.
pub const UP_MAX: u32 = 8;

/// Largest downsampling divisor.
pub const DN_MAX: u32 = 7;

/// Largest accepted Q22 ratio (8.0).
pub const MAX_RATIO: u32 = UP_MAX << Q22Ratio::FRAC_BITS;

/// Smallest accepted Q22 ratio, `round(2^22 / 7)`.
pub const MIN_RATIO: u32 = 599_186;

/// Zero-init size used when upsampling or at unity.
pub const ZERO_INIT_DEFAULT: u8 = 32;

/// `round(dst_hz * 2^22 / src_hz)`, checked against the hardware limits.
///
/// ```
/// use asrc::ratio::compute_ratio;
///
/// assert_eq!(compute_ratio(48_000, 48_000).map(|r| r.bits()), Ok(0x0040_0000));
/// ```
pub fn compute_ratio(src_hz: u32, dst_hz: u32) -> Result<Q22Ratio, RangeError> {
    if src_hz == 0 || dst_hz == 0 {
        return Err(RangeError::ZeroRate);
    }
    let src = u64::from(src_hz);
    // Both terms fit: dst < 2^32, so dst << 22 < 2^54.
    let scaled = (u64::from(dst_hz) << Q22Ratio::FRAC_BITS).saturating_add(src / 2);
    let ratio = scaled.checked_div(src).ok_or(RangeError::ZeroRate)?;
    check_bits(ratio)
}

fn check_bits(ratio: u64) -> Result<Q22Ratio, RangeError> {
    if ratio > u64::from(MAX_RATIO) {
        return Err(RangeError::UpsampleTooLarge);
    }
    if ratio < u64::from(MIN_RATIO) {
        return Err(RangeError::DownsampleTooLarge);
    }
    u32::try_from(ratio)
        .ok()
        .and_then(|bits| Q22Ratio::from_bits(bits).ok())
        .ok_or(RangeError::DownsampleTooLarge)
}

/// Check a caller-supplied ratio against the limits of `revision`.
pub fn validate_ratio(ratio: Q22Ratio, revision: SocRevision) -> Result<(), RangeError> {
    check_bits(u64::from(ratio.bits()))?;
    if revision.forbids_downsampling() && ratio.is_downsampling() {
        return Err(RangeError::DownsampleUnsupported);
    }
    Ok(())
}

/// Samples of silence primed into the FIFOs before the first frame.
///
/// Downsampling needs proportionally more priming: `32 / ratio`, capped at
/// the 8-bit register width.
#[must_use]
pub fn zero_init_size(ratio: Q22Ratio) -> u8 {
    if !ratio.is_downsampling() {
        return ZERO_INIT_DEFAULT;
    }
    let size = (u64::from(ZERO_INIT_DEFAULT) << Q22Ratio::FRAC_BITS)
        .checked_div(u64::from(ratio.bits()))
        .unwrap_or(u64::from(u8::MAX));
    u8::try_from(size).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_rates_give_exact_unity() {
        assert_eq!(compute_ratio(48_000, 48_000), Ok(Q22Ratio::UNITY));
    }

    #[test]
    fn doubling_gives_two_point_zero() {
        assert_eq!(compute_ratio(48_000, 96_000).map(Q22Ratio::bits), Ok(0x0080_0000));
    }

    #[test]
    fn cd_to_dat_rounds_to_nearest() {
        // 48000 / 44100 * 2^22 = 4565228.9...
        assert_eq!(compute_ratio(44_100, 48_000).map(Q22Ratio::bits), Ok(4_565_229));
    }

    #[test]
    fn twenty_four_x_upsampling_is_rejected() {
        assert_eq!(compute_ratio(8_000, 192_000), Err(RangeError::UpsampleTooLarge));
    }

    #[test]
    fn limits_are_inclusive() {
        assert_eq!(compute_ratio(8_000, 64_000).map(Q22Ratio::bits), Ok(MAX_RATIO));
        assert_eq!(compute_ratio(56_000, 8_000).map(Q22Ratio::bits), Ok(MIN_RATIO));
        assert_eq!(compute_ratio(56_001, 8_000), Err(RangeError::DownsampleTooLarge));
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert_eq!(compute_ratio(0, 48_000), Err(RangeError::ZeroRate));
        assert_eq!(compute_ratio(48_000, 0), Err(RangeError::ZeroRate));
    }

    #[test]
    fn rev0_refuses_downsampling() {
        let half = compute_ratio(96_000, 48_000).unwrap_or(Q22Ratio::UNITY);
        assert_eq!(
            validate_ratio(half, SocRevision::Rev0),
            Err(RangeError::DownsampleUnsupported)
        );
        assert_eq!(validate_ratio(half, SocRevision::Rev1), Ok(()));
        assert_eq!(validate_ratio(Q22Ratio::UNITY, SocRevision::Rev0), Ok(()));
    }

    #[test]
    fn zero_init_scales_with_downsampling() {
        assert_eq!(zero_init_size(Q22Ratio::UNITY), 32);
        let half = compute_ratio(96_000, 48_000).unwrap_or(Q22Ratio::UNITY);
        assert_eq!(zero_init_size(half), 64);
        let seventh = Q22Ratio::from_bits(MIN_RATIO).unwrap_or(Q22Ratio::UNITY);
        assert_eq!(zero_init_size(seventh), 224);
        let tiny = Q22Ratio::from_bits(0x1000).unwrap_or(Q22Ratio::UNITY);
        assert_eq!(zero_init_size(tiny), 255);
    }
}
