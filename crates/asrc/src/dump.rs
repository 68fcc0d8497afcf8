//! Register snapshots for diagnostics.

use platform::asrc_regs as regs;
use platform::pl080;
use platform::{PairId, RegisterBus};

use crate::hw::{AsrcHw, Pl080};

/// Maximum entries in a [`RegisterDump`].
pub const DUMP_CAPACITY: usize = 32;

/// Register window an entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterBlock {
    /// ASRC register window.
    Asrc,
    /// PL080 register window.
    Dma,
}

/// One register read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterEntry {
    /// Window the offset is relative to.
    pub block: RegisterBlock,
    /// Short register name.
    pub name: &'static str,
    /// Byte offset inside the window.
    pub offset: u32,
    /// Value read.
    pub value: u32,
}

/// Snapshot of one pair's registers.
pub type RegisterDump = heapless::Vec<RegisterEntry, DUMP_CAPACITY>;

const CHANNEL_REGS: [(&str, &str, u32); 5] = [
    ("tx.src_addr", "rx.src_addr", pl080::CH_SRC_ADDR),
    ("tx.dst_addr", "rx.dst_addr", pl080::CH_DST_ADDR),
    ("tx.lli", "rx.lli", pl080::CH_LLI),
    ("tx.control", "rx.control", pl080::CH_CONTROL),
    ("tx.config", "rx.config", pl080::CH_CONFIGURATION),
];

pub(crate) fn collect<B: RegisterBus>(
    asrc: &AsrcHw<B>,
    dma: &Pl080<B>,
    pair: PairId,
) -> RegisterDump {
    let map = asrc.map();
    let asrc_regs: [(&'static str, u32); 14] = [
        ("enable", map.enable),
        ("reset", map.reset),
        ("sync_mode", map.sync_mode),
        ("clock_select", map.clock_select),
        ("input_route", map.input_route),
        ("output_route", map.output_route),
        ("ratio", map.pair_reg(pair, regs::PAIR_RATIO)),
        ("zero_init", map.pair_reg(pair, regs::PAIR_ZERO_INIT)),
        ("vol_gain", map.pair_reg(pair, regs::PAIR_VOL_GAIN)),
        ("vol_ramp", map.pair_reg(pair, regs::PAIR_VOL_RAMP)),
        ("vol_ramp_gain", map.pair_reg(pair, regs::PAIR_VOL_RAMP_GAIN)),
        ("fifo_in_cfg", map.fifo_reg(pair, regs::FIFO_IN_CFG)),
        ("fifo_out_cfg", map.fifo_reg(pair, regs::FIFO_OUT_CFG)),
        ("fifo_status", map.fifo_reg(pair, regs::FIFO_STATUS)),
    ];
    let dma_globals: [(&'static str, u32); 4] = [
        ("dma.config", pl080::CONFIGURATION),
        ("dma.enabled", pl080::ENABLED_CHANNELS),
        ("dma.raw_tc", pl080::RAW_INT_TC_STATUS),
        ("dma.raw_err", pl080::RAW_INT_ERROR_STATUS),
    ];

    let mut dump = RegisterDump::new();
    // Capacity covers every entry pushed below; overflow only truncates.
    for (name, offset) in asrc_regs {
        let _ = dump.push(RegisterEntry {
            block: RegisterBlock::Asrc,
            name,
            offset,
            value: asrc.read(offset),
        });
    }
    for (name, offset) in dma_globals {
        let _ = dump.push(RegisterEntry {
            block: RegisterBlock::Dma,
            name,
            offset,
            value: dma.read(offset),
        });
    }
    for (tx_name, rx_name, reg) in CHANNEL_REGS {
        for (name, channel) in [(tx_name, pair.tx_channel()), (rx_name, pair.rx_channel())] {
            let offset = pl080::channel_reg(channel, reg);
            let _ = dump.push(RegisterEntry {
                block: RegisterBlock::Dma,
                name,
                offset,
                value: dma.read(offset),
            });
        }
    }
    dump
}
