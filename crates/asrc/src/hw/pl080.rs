//! PL080 DMA controller operations.

use platform::pl080::{self as regs, FlowControl};
use platform::RegisterBus;

use crate::lli::Descriptor;

/// Static channel configuration (everything but the enable and halt bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSetup {
    /// Request line of the source peripheral.
    pub src_periph: u8,
    /// Request line of the destination peripheral.
    pub dst_periph: u8,
    /// Transfer type with the DMA controller as flow controller.
    pub flow: FlowControl,
    /// Unmask terminal-count and error interrupts.
    pub interrupts: bool,
}

impl ChannelSetup {
    /// Memory → FIFO on request line `line`.
    #[must_use]
    pub fn mem_to_periph(line: u8) -> Self {
        Self {
            src_periph: 0,
            dst_periph: line,
            flow: FlowControl::MemToPeriph,
            interrupts: true,
        }
    }

    /// FIFO → memory on request line `line`.
    #[must_use]
    pub fn periph_to_mem(line: u8) -> Self {
        Self {
            src_periph: line,
            dst_periph: 0,
            flow: FlowControl::PeriphToMem,
            interrupts: true,
        }
    }

    fn word(&self) -> u32 {
        let periph = |line: u8, shift: u32| (u32::from(line) & regs::CFG_PERIPH_MASK) << shift;
        let src = periph(self.src_periph, regs::CFG_SRC_PERIPH_SHIFT);
        let dst = periph(self.dst_periph, regs::CFG_DST_PERIPH_SHIFT);
        let flow = ((self.flow as u32) & regs::CFG_FLOW_MASK) << regs::CFG_FLOW_SHIFT;
        let mut word = src | dst | flow;
        if self.interrupts {
            word |= regs::CFG_IE | regs::CFG_ITC;
        }
        word
    }
}

/// Leaf operations on a PL080 register window.
#[derive(Debug)]
pub struct Pl080<B> {
    bus: B,
}

impl<B: RegisterBus> Pl080<B> {
    /// Wrap the controller's register window.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Read a controller register (diagnostics).
    pub fn read(&self, offset: u32) -> u32 {
        self.bus.read(offset)
    }

    /// Set the controller enable bit.
    pub fn enable_controller(&self) {
        critical_section::with(|_| self.bus.modify(regs::CONFIGURATION, 0, regs::CONFIGURATION_E));
    }

    /// Clear the controller enable bit.
    pub fn disable_controller(&self) {
        critical_section::with(|_| self.bus.modify(regs::CONFIGURATION, regs::CONFIGURATION_E, 0));
    }

    /// Masked terminal-count status, one bit per channel.
    pub fn tc_status(&self) -> u32 {
        self.bus.read(regs::INT_TC_STATUS)
    }

    /// Masked error status, one bit per channel.
    pub fn error_status(&self) -> u32 {
        self.bus.read(regs::INT_ERROR_STATUS)
    }

    /// Clear terminal-count and error interrupts for the channels in `mask`.
    pub fn clear_interrupts(&self, mask: u32) {
        self.bus.write(regs::INT_TC_CLEAR, mask);
        self.bus.write(regs::INT_ERR_CLEAR, mask);
    }

    /// Program `channel`'s static configuration; leaves it disabled.
    pub fn configure_channel(&self, channel: u8, setup: &ChannelSetup) {
        self.bus
            .write(regs::channel_reg(channel, regs::CH_CONFIGURATION), setup.word());
    }

    /// Load `descriptor` into `channel`'s address, link and control registers.
    pub fn load_descriptor(&self, channel: u8, descriptor: &Descriptor) {
        self.bus
            .write(regs::channel_reg(channel, regs::CH_SRC_ADDR), descriptor.source);
        self.bus
            .write(regs::channel_reg(channel, regs::CH_DST_ADDR), descriptor.destination);
        self.bus
            .write(regs::channel_reg(channel, regs::CH_LLI), descriptor.next.unwrap_or(0));
        self.bus
            .write(regs::channel_reg(channel, regs::CH_CONTROL), descriptor.control_word());
    }

    /// Start `channel`.
    pub fn enable_channel(&self, channel: u8) {
        self.bus.modify(
            regs::channel_reg(channel, regs::CH_CONFIGURATION),
            regs::CFG_HALT,
            regs::CFG_E,
        );
    }

    /// Stop `channel` accepting new requests; data in its FIFO still drains.
    pub fn halt_channel(&self, channel: u8) {
        self.bus
            .modify(regs::channel_reg(channel, regs::CH_CONFIGURATION), 0, regs::CFG_HALT);
    }

    /// Clear `channel`'s enable and halt bits.
    pub fn disable_channel(&self, channel: u8) {
        self.bus.modify(
            regs::channel_reg(channel, regs::CH_CONFIGURATION),
            regs::CFG_E | regs::CFG_HALT,
            0,
        );
    }

    /// `true` while `channel`'s FIFO still holds data.
    pub fn is_active(&self, channel: u8) -> bool {
        self.bus.read(regs::channel_reg(channel, regs::CH_CONFIGURATION)) & regs::CFG_ACTIVE != 0
    }

    /// `true` while `channel` is enabled.
    pub fn is_enabled(&self, channel: u8) -> bool {
        self.bus.read(regs::ENABLED_CHANNELS) & regs::channel_bit(channel) != 0
    }

    /// Current source address of `channel`.
    pub fn current_src(&self, channel: u8) -> u32 {
        self.bus.read(regs::channel_reg(channel, regs::CH_SRC_ADDR))
    }

    /// Current destination address of `channel`.
    pub fn current_dst(&self, channel: u8) -> u32 {
        self.bus.read(regs::channel_reg(channel, regs::CH_DST_ADDR))
    }

    /// Enable or bypass the synchronisation logic of request `line`.
    ///
    /// The converter runs on the DMA clock domain, so its request lines are
    /// bypassed (bit set).
    pub fn set_sync_bypass(&self, line: u8, bypass: bool) {
        let bit = regs::channel_bit(line);
        critical_section::with(|_| {
            if bypass {
                self.bus.modify(regs::SYNC, 0, bit);
            } else {
                self.bus.modify(regs::SYNC, bit, 0);
            }
        });
    }
}
