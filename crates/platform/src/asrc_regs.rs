//! ASRC block register map.
//!
//! The converter exposes three groups of registers:
//!
//! - **Global** registers shared by all pairs (enable, reset, sync mode,
//!   routing, clock select). Each pair owns a bit or a 4-bit field inside
//!   them, so updates are read-modify-write.
//! - **Pair** blocks (ratio, zero-init, volume), one per pair.
//! - **FIFO** blocks (format/threshold/DMA-enable, drain status, data ports),
//!   one per pair.
//!
//! Offsets move between SoC revisions, so they are carried in an
//! [`AsrcRegisterMap`] value supplied by the board configuration instead of
//! being hard-coded. Field layouts inside the registers are fixed and exposed
//! as constants.

use crate::asrc_types::{Bitwidth, ChannelCount, PairId, VolumeRamp};

/// SoC-specific register offsets of the ASRC block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AsrcRegisterMap {
    /// Per-pair converter enable bits.
    pub enable: u32,
    /// Per-pair converter reset bits (active high).
    pub reset: u32,
    /// Per-pair async-mode bits (set = track reference clock).
    pub sync_mode: u32,
    /// Per-pair 4-bit reference clock selectors.
    pub clock_select: u32,
    /// Per-pair 4-bit input source selectors.
    pub input_route: u32,
    /// Per-pair 4-bit output sink selectors.
    pub output_route: u32,
    /// Offset of pair 0's register block.
    pub pair_block: u32,
    /// Distance between pair blocks.
    pub pair_stride: u32,
    /// Offset of pair 0's FIFO block.
    pub fifo_block: u32,
    /// Distance between FIFO blocks.
    pub fifo_stride: u32,
}

impl AsrcRegisterMap {
    /// Register layout of the TCC803x family.
    pub const TCC803X: AsrcRegisterMap = AsrcRegisterMap {
        enable: 0x000,
        reset: 0x004,
        sync_mode: 0x008,
        clock_select: 0x00C,
        input_route: 0x010,
        output_route: 0x014,
        pair_block: 0x100,
        pair_stride: 0x40,
        fifo_block: 0x400,
        fifo_stride: 0x40,
    };

    /// Offset of register `reg` (`PAIR_*`) in `pair`'s block.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: pair <= 3, offsets are small SoC constants
    pub fn pair_reg(&self, pair: PairId, reg: u32) -> u32 {
        self.pair_block + u32::from(pair.get()) * self.pair_stride + reg
    }

    /// Offset of register `reg` (`FIFO_*`) in `pair`'s FIFO block.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: pair <= 3, offsets are small SoC constants
    pub fn fifo_reg(&self, pair: PairId, reg: u32) -> u32 {
        self.fifo_block + u32::from(pair.get()) * self.fifo_stride + reg
    }

    /// Largest offset any register in the map uses, plus one word.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: see pair_reg / fifo_reg
    pub fn window_len(&self) -> u32 {
        let last = PairId::ALL[PairId::COUNT - 1];
        let globals = [
            self.enable,
            self.reset,
            self.sync_mode,
            self.clock_select,
            self.input_route,
            self.output_route,
        ];
        let highest = globals
            .into_iter()
            .chain([
                self.pair_reg(last, PAIR_VOL_RAMP_GAIN),
                self.fifo_reg(last, FIFO_OUT_DATA),
            ])
            .max()
            .unwrap_or(0);
        highest + 4
    }
}

// ── Pair block ───────────────────────────────────────────────────────────────

/// Q22 output/input ratio.
pub const PAIR_RATIO: u32 = 0x00;
/// Zero-fill priming size in samples (8-bit).
pub const PAIR_ZERO_INIT: u32 = 0x04;
/// Q24 output gain.
pub const PAIR_VOL_GAIN: u32 = 0x08;
/// Ramp configuration (see `VOL_RAMP_*`).
pub const PAIR_VOL_RAMP: u32 = 0x0C;
/// Q24 ramp target gain.
pub const PAIR_VOL_RAMP_GAIN: u32 = 0x10;

/// `VOL_RAMP[3:0]`: up-ramp time step.
pub const VOL_RAMP_UP_TIME_SHIFT: u32 = 0;
/// `VOL_RAMP[7:4]`: down-ramp time step.
pub const VOL_RAMP_DOWN_TIME_SHIFT: u32 = 4;
/// `VOL_RAMP[15:8]`: up-ramp wait.
pub const VOL_RAMP_UP_WAIT_SHIFT: u32 = 8;
/// `VOL_RAMP[23:16]`: down-ramp wait.
pub const VOL_RAMP_DOWN_WAIT_SHIFT: u32 = 16;
/// `VOL_RAMP[31]`: ramp enable.
pub const VOL_RAMP_ENABLE: u32 = 1 << 31;

/// Pack ramp timing into a `PAIR_VOL_RAMP` value (enable bit set).
#[must_use]
pub fn vol_ramp_word(ramp: &VolumeRamp) -> u32 {
    (u32::from(ramp.up_time.get()) << VOL_RAMP_UP_TIME_SHIFT)
        | (u32::from(ramp.down_time.get()) << VOL_RAMP_DOWN_TIME_SHIFT)
        | (u32::from(ramp.up_wait) << VOL_RAMP_UP_WAIT_SHIFT)
        | (u32::from(ramp.down_wait) << VOL_RAMP_DOWN_WAIT_SHIFT)
        | VOL_RAMP_ENABLE
}

// ── FIFO block ───────────────────────────────────────────────────────────────

/// Input FIFO configuration.
pub const FIFO_IN_CFG: u32 = 0x00;
/// Output FIFO configuration.
pub const FIFO_OUT_CFG: u32 = 0x04;
/// Drain status (see `FIFO_STATUS_*`).
pub const FIFO_STATUS: u32 = 0x08;
/// Input FIFO data port (DMA destination for TX).
pub const FIFO_IN_DATA: u32 = 0x10;
/// Output FIFO data port (DMA source for RX).
pub const FIFO_OUT_DATA: u32 = 0x14;

/// `FIFO_*_CFG[0]`: 24-bit samples in 32-bit containers (clear = packed 16-bit).
pub const FIFO_CFG_WIDTH_24: u32 = 1 << 0;
/// `FIFO_*_CFG[7:4]`: channel count.
pub const FIFO_CFG_CHANNELS_SHIFT: u32 = 4;
/// Channel-count field mask.
pub const FIFO_CFG_CHANNELS_MASK: u32 = 0xF;
/// `FIFO_*_CFG[8]`: raise DMA requests.
pub const FIFO_CFG_DMA_EN: u32 = 1 << 8;
/// `FIFO_*_CFG[23:16]`: DMA request threshold in words.
pub const FIFO_CFG_THRESHOLD_SHIFT: u32 = 16;
/// `FIFO_*_CFG[31]`: FIFO enable.
pub const FIFO_CFG_ENABLE: u32 = 1 << 31;

/// `FIFO_STATUS[0]`: input FIFO empty and pipeline idle.
pub const FIFO_STATUS_IN_CLEARED: u32 = 1 << 0;
/// `FIFO_STATUS[1]`: output FIFO empty.
pub const FIFO_STATUS_OUT_CLEARED: u32 = 1 << 1;

/// Build a FIFO configuration word (enable and DMA-enable set).
#[must_use]
pub fn fifo_cfg_word(width: Bitwidth, channels: ChannelCount, threshold: u8) -> u32 {
    let width_bit = match width {
        Bitwidth::Bits16 => 0,
        Bitwidth::Bits24 => FIFO_CFG_WIDTH_24,
    };
    width_bit
        | ((u32::from(channels.get()) & FIFO_CFG_CHANNELS_MASK) << FIFO_CFG_CHANNELS_SHIFT)
        | (u32::from(threshold) << FIFO_CFG_THRESHOLD_SHIFT)
        | FIFO_CFG_DMA_EN
        | FIFO_CFG_ENABLE
}

// ── Global fields ────────────────────────────────────────────────────────────

/// Bit of `pair` in the enable/reset/sync-mode registers.
#[must_use]
pub fn pair_bit(pair: PairId) -> u32 {
    1 << pair.get()
}

/// Shift of `pair`'s 4-bit field in the routing and clock-select registers.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // Safety: pair <= 3
pub fn pair_field_shift(pair: PairId) -> u32 {
    u32::from(pair.get()) * 4
}

/// Width mask of one routing / clock-select field.
pub const PAIR_FIELD_MASK: u32 = 0xF;

/// Routing selector: the pair's memory-side DMA port.
pub const ROUTE_DMA: u32 = 0x0;
/// Routing selector: the audio interface bound to the pair.
pub const ROUTE_PERIPHERAL: u32 = 0x1;
