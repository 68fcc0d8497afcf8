//! ASRC domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions keep invalid values away from the converter:
//! - `PairId`: one of the four hardware pairs, validated 0–3
//! - `Q22Ratio`: output/input rate ratio in Q22 fixed point
//! - `VolumeGain`: Q24 linear gain, floor ≈ −120 dB
//! - `RampTime`: 16-step hardware ramp-time selector
//! - `ChannelCount`: 2, 4, 6 or 8 interleaved channels

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

fn check_range(value: u32, min: u32, max: u32) -> Result<u32, OutOfRangeError> {
    if value < min || value > max {
        Err(OutOfRangeError { value, min, max })
    } else {
        Ok(value)
    }
}

// ── PairId ───────────────────────────────────────────────────────────────────

/// Index of one of the four independent ASRC pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct PairId(u8);

impl PairId {
    /// Number of pairs in the converter.
    pub const COUNT: usize = 4;

    /// Every pair, in index order.
    pub const ALL: [PairId; Self::COUNT] = [PairId(0), PairId(1), PairId(2), PairId(3)];

    /// Create a `PairId`, returning an error if `index >= 4`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `index > 3`.
    pub fn try_new(index: u8) -> Result<Self, OutOfRangeError> {
        check_range(u32::from(index), 0, 3).map(|_| Self(index))
    }

    /// Return the pair index (0–3).
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Pair index as `usize`, for table lookups.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// DMA channel carrying memory → FIFO-in traffic for this pair.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: index <= 3
    pub fn tx_channel(self) -> u8 {
        self.0 * 2
    }

    /// DMA channel carrying FIFO-out → memory traffic for this pair.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: index <= 3
    pub fn rx_channel(self) -> u8 {
        self.0 * 2 + 1
    }
}

// ── Q22Ratio ─────────────────────────────────────────────────────────────────

/// Output/input sample-rate ratio in unsigned Q22 fixed point.
///
/// Bits 31–22 hold the integer part, bits 21–0 the fraction, so
/// `Q22Ratio::UNITY` (`0x0040_0000`) is 1.0. The type itself only enforces a
/// non-zero value; hardware limits are checked by the engine's ratio
/// calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Q22Ratio(u32);

impl Q22Ratio {
    /// Number of fractional bits.
    pub const FRAC_BITS: u32 = 22;

    /// 1.0 (no rate change).
    pub const UNITY: Q22Ratio = Q22Ratio(1 << Self::FRAC_BITS);

    /// Wrap a raw Q22 value, rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `raw == 0`.
    pub fn from_bits(raw: u32) -> Result<Self, OutOfRangeError> {
        check_range(raw, 1, u32::MAX).map(Self)
    }

    /// Raw Q22 register value.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Integer part (bits 31–22).
    #[must_use]
    pub fn integer(self) -> u32 {
        self.0 >> Self::FRAC_BITS
    }

    /// Fractional part (bits 21–0).
    #[must_use]
    pub fn fraction(self) -> u32 {
        self.0 & ((1 << Self::FRAC_BITS) - 1)
    }

    /// `true` when the output rate is lower than the input rate.
    #[must_use]
    pub fn is_downsampling(self) -> bool {
        self.0 < Self::UNITY.0
    }
}

// ── VolumeGain ───────────────────────────────────────────────────────────────

/// Linear output gain in unsigned Q24 fixed point (`0x0100_0000` = 0 dB).
///
/// The hardware floor `0x11` corresponds to roughly −120 dB; anything lower
/// is rejected so it can never be written to the gain register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct VolumeGain(u32);

impl VolumeGain {
    /// Minimum gain register value (≈ −120 dB).
    pub const MIN: u32 = 0x11;

    /// Maximum gain register value (0 dB).
    pub const MAX: u32 = 0x0100_0000;

    /// Unity gain.
    pub const UNITY: VolumeGain = VolumeGain(Self::MAX);

    /// Create a `VolumeGain`, returning an error outside `MIN..=MAX`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `q24 < 0x11` or `q24 > 0x0100_0000`.
    pub fn try_new(q24: u32) -> Result<Self, OutOfRangeError> {
        check_range(q24, Self::MIN, Self::MAX).map(Self)
    }

    /// Return the raw Q24 gain.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for VolumeGain {
    fn default() -> Self {
        Self::UNITY
    }
}

// ── RampTime ─────────────────────────────────────────────────────────────────

/// Hardware volume-ramp step selector (16 discrete steps, 0 = fastest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct RampTime(u8);

impl RampTime {
    /// Slowest ramp selector.
    pub const MAX: u8 = 15;

    /// Create a `RampTime`, returning an error if `step > 15`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `step > 15`.
    pub fn try_new(step: u8) -> Result<Self, OutOfRangeError> {
        check_range(u32::from(step), 0, u32::from(Self::MAX)).map(|_| Self(step))
    }

    /// Return the step selector (0–15).
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

// ── VolumeRamp ───────────────────────────────────────────────────────────────

/// Volume ramp parameters: target gain plus ramp speed and wait in each
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeRamp {
    /// Gain the ramp converges on.
    pub gain: VolumeGain,
    /// Ramp speed when the gain rises.
    pub up_time: RampTime,
    /// Ramp speed when the gain falls.
    pub down_time: RampTime,
    /// Samples to hold before each upward step.
    pub up_wait: u8,
    /// Samples to hold before each downward step.
    pub down_wait: u8,
}

// ── Bitwidth ─────────────────────────────────────────────────────────────────

/// PCM sample width on either side of the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bitwidth {
    /// 16-bit samples, packed two per 32-bit word.
    #[default]
    Bits16,
    /// 24-bit samples in 32-bit containers.
    Bits24,
}

impl Bitwidth {
    /// Parse a bit count (16 or 24).
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] for any other width.
    pub fn try_from_bits(bits: u8) -> Result<Self, OutOfRangeError> {
        match bits {
            16 => Ok(Self::Bits16),
            24 => Ok(Self::Bits24),
            other => Err(OutOfRangeError {
                value: u32::from(other),
                min: 16,
                max: 24,
            }),
        }
    }

    /// Bits per sample.
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            Self::Bits16 => 16,
            Self::Bits24 => 24,
        }
    }

    /// Bytes one sample occupies in memory.
    #[must_use]
    pub fn container_bytes(self) -> usize {
        match self {
            Self::Bits16 => 2,
            Self::Bits24 => 4,
        }
    }
}

// ── ChannelCount ─────────────────────────────────────────────────────────────

/// Number of interleaved channels: 2, 4, 6 or 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ChannelCount(u8);

impl ChannelCount {
    /// Stereo.
    pub const STEREO: ChannelCount = ChannelCount(2);

    /// Largest channel count any pair supports.
    pub const MAX: ChannelCount = ChannelCount(8);

    /// Create a `ChannelCount`, returning an error unless `n ∈ {2, 4, 6, 8}`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] for odd counts or counts outside 2–8.
    pub fn try_new(n: u8) -> Result<Self, OutOfRangeError> {
        let value = check_range(u32::from(n), 2, 8)?;
        if value % 2 == 0 {
            Ok(Self(n))
        } else {
            Err(OutOfRangeError {
                value,
                min: 2,
                max: 8,
            })
        }
    }

    /// Return the channel count.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ChannelCount {
    fn default() -> Self {
        Self::STEREO
    }
}

// ── Topology enums ───────────────────────────────────────────────────────────

/// Where a pair's input comes from and its output goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairPath {
    /// Host memory → converter → host memory (synchronous push/pop).
    M2M,
    /// Host memory → converter → audio interface (ring streaming).
    MemoryToPeripheral,
    /// Audio interface → converter → host memory (ring streaming).
    PeripheralToMemory,
}

/// Reference clock a pair tracks in asynchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockSource {
    /// DMA request rate of the memory side.
    #[default]
    Dma = 0,
    /// I2S master clock of audio port 0.
    Port0 = 1,
    /// I2S master clock of audio port 1.
    Port1 = 2,
    /// I2S master clock of audio port 2.
    Port2 = 3,
    /// External reference pin.
    External = 4,
}

/// Rate-tracking mode of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncMode {
    /// Input and output clocks are locked; the programmed ratio is exact.
    #[default]
    Sync,
    /// The converter tracks the selected reference clock.
    Async(ClockSource),
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn pair_id_maps_to_adjacent_dma_channels() {
        for (i, pair) in PairId::ALL.iter().enumerate() {
            assert_eq!(pair.index(), i);
            assert_eq!(pair.rx_channel(), pair.tx_channel() + 1);
        }
        assert_eq!(PairId::ALL[3].tx_channel(), 6);
        assert!(PairId::try_new(4).is_err());
    }

    #[test]
    fn q22_splits_integer_and_fraction() {
        let r = Q22Ratio::from_bits(0x0060_0000).unwrap_or(Q22Ratio::UNITY);
        assert_eq!(r.integer(), 1);
        assert_eq!(r.fraction(), 0x0020_0000);
        assert!(!r.is_downsampling());
        assert!(Q22Ratio::from_bits(0).is_err());
    }

    #[test]
    fn gain_floor_is_enforced() {
        let err = VolumeGain::try_new(0x10);
        assert_eq!(
            err,
            Err(OutOfRangeError {
                value: 0x10,
                min: 0x11,
                max: 0x0100_0000
            })
        );
        assert!(VolumeGain::try_new(0x11).is_ok());
        assert!(VolumeGain::try_new(0x0100_0001).is_err());
    }

    #[test]
    fn channel_count_accepts_even_counts_only() {
        for n in [2u8, 4, 6, 8] {
            assert!(ChannelCount::try_new(n).is_ok(), "{n} rejected");
        }
        for n in [0u8, 1, 3, 5, 7, 9, 10] {
            assert!(ChannelCount::try_new(n).is_err(), "{n} accepted");
        }
    }

    #[test]
    fn ramp_time_has_sixteen_steps() {
        assert!(RampTime::try_new(15).is_ok());
        assert!(RampTime::try_new(16).is_err());
    }

    #[test]
    fn bitwidth_parses_supported_widths() {
        assert_eq!(Bitwidth::try_from_bits(24), Ok(Bitwidth::Bits24));
        assert!(Bitwidth::try_from_bits(32).is_err());
        assert_eq!(Bitwidth::Bits16.container_bytes(), 2);
    }
}
