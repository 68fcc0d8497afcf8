//! ARM PL080 DMA controller register map.
//!
//! Reference: ARM PrimeCell DMA Controller (PL080) Technical Reference
//! Manual, r1p3, Chapter 3 (Programmer's Model).
//!
//! Offsets are relative to the controller base. Channel registers repeat every
//! [`CHANNEL_STRIDE`] bytes starting at [`CHANNEL_BASE`]; use [`channel_reg`]
//! to address them.

/// Number of channels on the controller.
pub const CHANNELS: u8 = 8;

// ── Global registers ─────────────────────────────────────────────────────────

/// Combined interrupt status (TC | error), one bit per channel.
pub const INT_STATUS: u32 = 0x000;
/// Terminal-count interrupt status after masking.
pub const INT_TC_STATUS: u32 = 0x004;
/// Write 1 to clear terminal-count interrupts.
pub const INT_TC_CLEAR: u32 = 0x008;
/// Error interrupt status after masking.
pub const INT_ERROR_STATUS: u32 = 0x00C;
/// Write 1 to clear error interrupts.
pub const INT_ERR_CLEAR: u32 = 0x010;
/// Raw terminal-count status (before masking).
pub const RAW_INT_TC_STATUS: u32 = 0x014;
/// Raw error status (before masking).
pub const RAW_INT_ERROR_STATUS: u32 = 0x018;
/// Channels with the enable bit set.
pub const ENABLED_CHANNELS: u32 = 0x01C;
/// Software burst request, one bit per request line.
pub const SOFT_BREQ: u32 = 0x020;
/// Controller configuration.
pub const CONFIGURATION: u32 = 0x030;
/// Request-line synchronisation logic disable, one bit per request line.
pub const SYNC: u32 = 0x034;

/// `CONFIGURATION`: controller enable.
pub const CONFIGURATION_E: u32 = 1 << 0;

/// Mask covering one status bit per channel.
pub const ALL_CHANNELS_MASK: u32 = (1 << CHANNELS) - 1;

// ── Channel registers ────────────────────────────────────────────────────────

/// Offset of channel 0's register block.
pub const CHANNEL_BASE: u32 = 0x100;
/// Distance between consecutive channel blocks.
pub const CHANNEL_STRIDE: u32 = 0x20;

/// Channel source address (current address while active).
pub const CH_SRC_ADDR: u32 = 0x00;
/// Channel destination address (current address while active).
pub const CH_DST_ADDR: u32 = 0x04;
/// Next linked-list item address (0 = end of chain).
pub const CH_LLI: u32 = 0x08;
/// Channel control word (see `CTRL_*`).
pub const CH_CONTROL: u32 = 0x0C;
/// Channel configuration (see `CFG_*`).
pub const CH_CONFIGURATION: u32 = 0x10;

/// Offset of register `reg` in channel `channel`'s block.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // Safety: channel < 8, reg < 0x20
pub const fn channel_reg(channel: u8, reg: u32) -> u32 {
    CHANNEL_BASE + channel as u32 * CHANNEL_STRIDE + reg
}

/// Status-register bit for `channel`.
#[must_use]
pub const fn channel_bit(channel: u8) -> u32 {
    1 << channel
}

// ── Control word ─────────────────────────────────────────────────────────────

/// `CONTROL[11:0]`: transfer size in source-width units.
pub const CTRL_TRANSFER_SIZE_MASK: u32 = 0xFFF;
/// `CONTROL[14:12]`: source burst size.
pub const CTRL_SB_SIZE_SHIFT: u32 = 12;
/// `CONTROL[17:15]`: destination burst size.
pub const CTRL_DB_SIZE_SHIFT: u32 = 15;
/// `CONTROL[20:18]`: source transfer width.
pub const CTRL_S_WIDTH_SHIFT: u32 = 18;
/// `CONTROL[23:21]`: destination transfer width.
pub const CTRL_D_WIDTH_SHIFT: u32 = 21;
/// `CONTROL[26]`: increment source address after each transfer.
pub const CTRL_SI: u32 = 1 << 26;
/// `CONTROL[27]`: increment destination address after each transfer.
pub const CTRL_DI: u32 = 1 << 27;
/// `CONTROL[31]`: raise terminal-count interrupt when this item completes.
pub const CTRL_I: u32 = 1 << 31;

/// Burst-size field encodings (transfers per burst).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum BurstSize {
    /// 1 transfer.
    One = 0,
    /// 4 transfers.
    Four = 1,
    /// 8 transfers.
    Eight = 2,
    /// 16 transfers.
    Sixteen = 3,
}

/// Transfer-width field encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TransferWidth {
    /// 8-bit.
    Byte = 0,
    /// 16-bit.
    HalfWord = 1,
    /// 32-bit.
    Word = 2,
}

impl TransferWidth {
    /// Bytes moved per transfer.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
        }
    }
}

// ── Channel configuration ────────────────────────────────────────────────────

/// `CONFIG[0]`: channel enable.
pub const CFG_E: u32 = 1 << 0;
/// `CONFIG[4:1]`: source peripheral request line.
pub const CFG_SRC_PERIPH_SHIFT: u32 = 1;
/// `CONFIG[9:6]`: destination peripheral request line.
pub const CFG_DST_PERIPH_SHIFT: u32 = 6;
/// Request-line field width mask.
pub const CFG_PERIPH_MASK: u32 = 0xF;
/// `CONFIG[13:11]`: flow control and transfer type.
pub const CFG_FLOW_SHIFT: u32 = 11;
/// Flow-control field width mask.
pub const CFG_FLOW_MASK: u32 = 0x7;
/// `CONFIG[14]`: unmask error interrupt.
pub const CFG_IE: u32 = 1 << 14;
/// `CONFIG[15]`: unmask terminal-count interrupt.
pub const CFG_ITC: u32 = 1 << 15;
/// `CONFIG[16]`: locked transfers.
pub const CFG_L: u32 = 1 << 16;
/// `CONFIG[17]`: channel FIFO holds data (read-only).
pub const CFG_ACTIVE: u32 = 1 << 17;
/// `CONFIG[18]`: ignore further source requests.
pub const CFG_HALT: u32 = 1 << 18;

/// Flow-control field encodings (DMA controller is flow controller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum FlowControl {
    /// Memory to memory.
    MemToMem = 0b000,
    /// Memory to peripheral.
    MemToPeriph = 0b001,
    /// Peripheral to memory.
    PeriphToMem = 0b010,
    /// Peripheral to peripheral.
    PeriphToPeriph = 0b011,
}

/// Bytes occupied by one linked-list item in memory (src, dst, next, control).
pub const LLI_BYTES: u32 = 16;
