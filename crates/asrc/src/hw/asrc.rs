//! ASRC block operations.

use platform::asrc_regs::{self as regs, AsrcRegisterMap};
use platform::{
    Bitwidth, ChannelCount, PairId, Q22Ratio, RegisterBus, SyncMode, VolumeGain, VolumeRamp,
};

/// Routing selector for one side of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    /// The pair's DMA FIFO port.
    Dma,
    /// The audio interface bound to the pair.
    Peripheral,
}

impl Route {
    fn selector(self) -> u32 {
        match self {
            Self::Dma => regs::ROUTE_DMA,
            Self::Peripheral => regs::ROUTE_PERIPHERAL,
        }
    }
}

/// Leaf operations on the ASRC register window.
///
/// Global registers hold one bit or nibble per pair; every update of them
/// runs inside a critical section so concurrent pairs cannot lose each
/// other's bits.
#[derive(Debug)]
pub struct AsrcHw<B> {
    bus: B,
    map: AsrcRegisterMap,
    phys_base: u32,
}

impl<B: RegisterBus> AsrcHw<B> {
    /// Wrap the ASRC register window at bus address `phys_base`.
    pub fn new(bus: B, map: AsrcRegisterMap, phys_base: u32) -> Self {
        Self {
            bus,
            map,
            phys_base,
        }
    }

    /// Register offsets in use.
    pub fn map(&self) -> &AsrcRegisterMap {
        &self.map
    }

    /// Read an ASRC register (diagnostics).
    pub fn read(&self, offset: u32) -> u32 {
        self.bus.read(offset)
    }

    fn modify_global(&self, offset: u32, clear: u32, set: u32) {
        critical_section::with(|_| self.bus.modify(offset, clear, set));
    }

    fn set_field(&self, offset: u32, pair: PairId, value: u32) {
        let shift = regs::pair_field_shift(pair);
        self.modify_global(
            offset,
            regs::PAIR_FIELD_MASK << shift,
            (value & regs::PAIR_FIELD_MASK) << shift,
        );
    }

    /// Start the pair's converter.
    pub fn enable_pair(&self, pair: PairId) {
        self.modify_global(self.map.enable, 0, regs::pair_bit(pair));
    }

    /// Stop the pair's converter.
    pub fn disable_pair(&self, pair: PairId) {
        self.modify_global(self.map.enable, regs::pair_bit(pair), 0);
    }

    /// Pulse the pair's reset: clears its pipeline and FIFOs.
    pub fn reset_pair(&self, pair: PairId) {
        let bit = regs::pair_bit(pair);
        self.modify_global(self.map.reset, 0, bit);
        self.modify_global(self.map.reset, bit, 0);
    }

    /// Select synchronous operation or the async reference clock.
    pub fn set_sync_mode(&self, pair: PairId, mode: SyncMode) {
        let bit = regs::pair_bit(pair);
        match mode {
            SyncMode::Sync => self.modify_global(self.map.sync_mode, bit, 0),
            SyncMode::Async(clock) => {
                self.set_field(self.map.clock_select, pair, clock as u32);
                self.modify_global(self.map.sync_mode, 0, bit);
            }
        }
    }

    /// Where the pair's input comes from.
    pub fn set_input_route(&self, pair: PairId, route: Route) {
        self.set_field(self.map.input_route, pair, route.selector());
    }

    /// Where the pair's output goes.
    pub fn set_output_route(&self, pair: PairId, route: Route) {
        self.set_field(self.map.output_route, pair, route.selector());
    }

    /// Program the Q22 output/input ratio.
    pub fn set_ratio(&self, pair: PairId, ratio: Q22Ratio) {
        self.bus
            .write(self.map.pair_reg(pair, regs::PAIR_RATIO), ratio.bits());
    }

    /// Program the zero-fill priming size.
    pub fn set_zero_init(&self, pair: PairId, samples: u8) {
        self.bus
            .write(self.map.pair_reg(pair, regs::PAIR_ZERO_INIT), u32::from(samples));
    }

    /// Format, threshold and DMA enable of the input FIFO.
    pub fn configure_fifo_in(
        &self,
        pair: PairId,
        width: Bitwidth,
        channels: ChannelCount,
        threshold: u8,
    ) {
        self.bus.write(
            self.map.fifo_reg(pair, regs::FIFO_IN_CFG),
            regs::fifo_cfg_word(width, channels, threshold),
        );
    }

    /// Format, threshold and DMA enable of the output FIFO.
    pub fn configure_fifo_out(
        &self,
        pair: PairId,
        width: Bitwidth,
        channels: ChannelCount,
        threshold: u8,
    ) {
        self.bus.write(
            self.map.fifo_reg(pair, regs::FIFO_OUT_CFG),
            regs::fifo_cfg_word(width, channels, threshold),
        );
    }

    /// Disable both FIFOs and their DMA requests.
    pub fn disable_fifos(&self, pair: PairId) {
        self.bus.write(self.map.fifo_reg(pair, regs::FIFO_IN_CFG), 0);
        self.bus.write(self.map.fifo_reg(pair, regs::FIFO_OUT_CFG), 0);
    }

    /// Program the output gain.
    pub fn set_volume_gain(&self, pair: PairId, gain: VolumeGain) {
        self.bus
            .write(self.map.pair_reg(pair, regs::PAIR_VOL_GAIN), gain.get());
    }

    /// Program the ramp timing and target gain.
    pub fn set_volume_ramp(&self, pair: PairId, ramp: &VolumeRamp) {
        self.bus.write(
            self.map.pair_reg(pair, regs::PAIR_VOL_RAMP_GAIN),
            ramp.gain.get(),
        );
        self.bus.write(
            self.map.pair_reg(pair, regs::PAIR_VOL_RAMP),
            regs::vol_ramp_word(ramp),
        );
    }

    /// `true` once the input FIFO and pipeline are empty.
    pub fn fifo_in_cleared(&self, pair: PairId) -> bool {
        let status = self.bus.read(self.map.fifo_reg(pair, regs::FIFO_STATUS));
        status & regs::FIFO_STATUS_IN_CLEARED != 0
    }

    /// `true` once the output FIFO is empty.
    pub fn fifo_out_cleared(&self, pair: PairId) -> bool {
        let status = self.bus.read(self.map.fifo_reg(pair, regs::FIFO_STATUS));
        status & regs::FIFO_STATUS_OUT_CLEARED != 0
    }

    /// Bus address of the input FIFO data port.
    pub fn fifo_in_phys(&self, pair: PairId) -> u32 {
        self.phys_base
            .wrapping_add(self.map.fifo_reg(pair, regs::FIFO_IN_DATA))
    }

    /// Bus address of the output FIFO data port.
    pub fn fifo_out_phys(&self, pair: PairId) -> u32 {
        self.phys_base
            .wrapping_add(self.map.fifo_reg(pair, regs::FIFO_OUT_DATA))
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use platform::mocks::{SimBus, SimulatedSoc};
    use platform::{ClockSource, RampTime};

    const PHYS: u32 = 0x1660_0000;
    const MAP: AsrcRegisterMap = AsrcRegisterMap::TCC803X;

    fn block() -> (SimulatedSoc, AsrcHw<SimBus>) {
        let sim = SimulatedSoc::new(MAP, PHYS);
        let hw = AsrcHw::new(sim.asrc_bus(), MAP, PHYS);
        (sim, hw)
    }

    #[test]
    fn enable_bits_of_other_pairs_survive() {
        let (sim, hw) = block();
        hw.enable_pair(PairId::ALL[0]);
        hw.enable_pair(PairId::ALL[2]);
        hw.disable_pair(PairId::ALL[0]);
        assert_eq!(sim.asrc_reg(MAP.enable), 0b100);
    }

    #[test]
    fn reset_is_a_pulse() {
        let (sim, hw) = block();
        hw.reset_pair(PairId::ALL[1]);
        assert_eq!(sim.asrc_writes(MAP.reset), [0b10, 0]);
    }

    #[test]
    fn async_mode_selects_clock_nibble() {
        let (sim, hw) = block();
        hw.set_sync_mode(PairId::ALL[3], SyncMode::Async(ClockSource::Port2));
        assert_eq!(sim.asrc_reg(MAP.clock_select), 3 << 12);
        assert_eq!(sim.asrc_reg(MAP.sync_mode), 0b1000);
        hw.set_sync_mode(PairId::ALL[3], SyncMode::Sync);
        assert_eq!(sim.asrc_reg(MAP.sync_mode), 0);
    }

    #[test]
    fn routes_are_per_pair_nibbles() {
        let (sim, hw) = block();
        hw.set_output_route(PairId::ALL[2], Route::Peripheral);
        hw.set_input_route(PairId::ALL[3], Route::Peripheral);
        hw.set_output_route(PairId::ALL[1], Route::Dma);
        assert_eq!(sim.asrc_reg(MAP.output_route), 1 << 8);
        assert_eq!(sim.asrc_reg(MAP.input_route), 1 << 12);
    }

    #[test]
    fn volume_ramp_writes_target_and_timing() {
        let (sim, hw) = block();
        let pair = PairId::ALL[0];
        let ramp = VolumeRamp {
            gain: VolumeGain::try_new(0x0080_0000).unwrap_or_default(),
            up_time: RampTime::try_new(1).unwrap_or_default(),
            down_time: RampTime::try_new(2).unwrap_or_default(),
            up_wait: 0,
            down_wait: 0,
        };
        hw.set_volume_ramp(pair, &ramp);
        assert_eq!(sim.asrc_reg(MAP.pair_reg(pair, regs::PAIR_VOL_RAMP_GAIN)), 0x0080_0000);
        assert_eq!(
            sim.asrc_reg(MAP.pair_reg(pair, regs::PAIR_VOL_RAMP)),
            regs::VOL_RAMP_ENABLE | 0x21
        );
    }

    #[test]
    fn fifo_ports_are_offset_from_block_base() {
        let (_sim, hw) = block();
        let pair = PairId::ALL[1];
        assert_eq!(hw.fifo_in_phys(pair), PHYS + MAP.fifo_reg(pair, regs::FIFO_IN_DATA));
        assert_eq!(hw.fifo_out_phys(pair), hw.fifo_in_phys(pair) + 4);
        assert!(hw.fifo_in_cleared(pair));
        assert!(hw.fifo_out_cleared(pair));
    }
}
