//! Mock implementations for testing
//!
//! [`SimulatedSoc`] models the parts of the SoC the ASRC engine touches: the
//! ASRC register window, the PL080 DMA controller and a block of
//! DMA-reachable memory. It is good enough to run the engine end to end on a
//! host:
//!
//! - Arming a pair's TX channel while its RX channel is already armed runs a
//!   one-shot conversion synchronously: the TX chain is read from memory,
//!   resampled by the programmed Q22 ratio (sample-and-hold), and written
//!   through the RX chain. The TX channel then raises its terminal-count
//!   interrupt and the RX channel's destination register points one past the
//!   last byte produced. Output that does not fit the RX chain ends the RX
//!   channel with its own terminal count and leaves TX stalled, as the
//!   converter backs up.
//! - Ring-mode channels advance one linked-list item per
//!   [`SimulatedSoc::advance_stream`] call.
//! - Fault knobs make channels refuse to go idle, FIFOs refuse to drain,
//!   completions never arrive, or transfers end in a bus error.
//!
//! The simulator never raises a real interrupt; tests poll
//! [`SimulatedSoc::irq_pending`] and call the engine's interrupt handler.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)] // host-only test double

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::asrc_regs::{self, AsrcRegisterMap};
use crate::asrc_types::PairId;
use crate::bus::RegisterBus;
use crate::dma_memory::{DmaAllocator, DmaMemoryError, DmaRegion, StaticDmaPool};
use crate::pl080;

/// Bus address of the first byte of simulated DMA memory.
pub const SIM_DMA_PHYS_BASE: u32 = 0x4000_0000;

/// Default size of simulated DMA memory.
pub const SIM_DMA_MEMORY_BYTES: usize = 2 << 20;

/// Maximum linked-list items followed before a chain is treated as corrupt.
const MAX_WALK: usize = 256;

/// Which register window a [`SimBus`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Asrc,
    Dma,
}

/// One linked-list item as the controller sees it.
#[derive(Debug, Clone, Copy)]
struct Item {
    src: u32,
    dst: u32,
    next: u32,
    control: u32,
}

impl Item {
    fn bytes(&self) -> usize {
        // Word-wide transfers only; the engine never programs anything else.
        ((self.control & pl080::CTRL_TRANSFER_SIZE_MASK) as usize) * 4
    }
}

struct SimState {
    asrc_map: AsrcRegisterMap,
    asrc_phys_base: u32,
    asrc: BTreeMap<u32, u32>,
    asrc_log: Vec<(u32, u32)>,
    dma: BTreeMap<u32, u32>,
    raw_tc: u32,
    raw_err: u32,
    active: u32,
    mem_ptr: *mut u8,
    mem_len: usize,
    stuck_active: u32,
    stuck_fifo: bool,
    suppress_completion: bool,
    bus_error: u32,
    conversions: usize,
}

// Safety: `mem_ptr` points into a leaked allocation that lives forever; every
// access goes through the state mutex.
unsafe impl Send for SimState {}

impl SimState {
    fn mem_slice(&self, phys: u32, len: usize) -> Option<(*mut u8, usize)> {
        let offset = phys.checked_sub(SIM_DMA_PHYS_BASE)? as usize;
        if offset.checked_add(len)? > self.mem_len {
            return None;
        }
        // Safety: offset + len checked against the arena length.
        Some((unsafe { self.mem_ptr.add(offset) }, len))
    }

    fn mem_read(&self, phys: u32, len: usize) -> Option<Vec<u8>> {
        let (ptr, len) = self.mem_slice(phys, len)?;
        // Safety: `mem_slice` bounds-checked the span.
        Some(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
    }

    fn mem_write(&self, phys: u32, data: &[u8]) -> bool {
        match self.mem_slice(phys, data.len()) {
            Some((ptr, len)) => {
                // Safety: `mem_slice` bounds-checked the span.
                unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, len) };
                true
            }
            None => false,
        }
    }

    fn mem_word(&self, phys: u32) -> Option<u32> {
        let bytes = self.mem_read(phys, 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn dma_reg(&self, offset: u32) -> u32 {
        self.dma.get(&offset).copied().unwrap_or(0)
    }

    fn asrc_reg(&self, offset: u32) -> u32 {
        self.asrc.get(&offset).copied().unwrap_or(0)
    }

    fn ch(&self, channel: u8, reg: u32) -> u32 {
        self.dma_reg(pl080::channel_reg(channel, reg))
    }

    fn set_ch(&mut self, channel: u8, reg: u32, value: u32) {
        self.dma.insert(pl080::channel_reg(channel, reg), value);
    }

    fn channel_enabled(&self, channel: u8) -> bool {
        self.ch(channel, pl080::CH_CONFIGURATION) & pl080::CFG_E != 0
    }

    fn current_item(&self, channel: u8) -> Item {
        Item {
            src: self.ch(channel, pl080::CH_SRC_ADDR),
            dst: self.ch(channel, pl080::CH_DST_ADDR),
            next: self.ch(channel, pl080::CH_LLI),
            control: self.ch(channel, pl080::CH_CONTROL),
        }
    }

    fn load_item(&self, phys: u32) -> Option<Item> {
        Some(Item {
            src: self.mem_word(phys)?,
            dst: self.mem_word(phys + 4)?,
            next: self.mem_word(phys + 8)?,
            control: self.mem_word(phys + 12)?,
        })
    }

    /// Items of a one-shot chain, starting with the one loaded in the channel.
    fn walk_chain(&self, channel: u8) -> Vec<Item> {
        let mut items = Vec::new();
        let mut item = self.current_item(channel);
        loop {
            items.push(item);
            if item.next == 0 || items.len() >= MAX_WALK {
                break;
            }
            match self.load_item(item.next) {
                Some(next) => item = next,
                None => break,
            }
        }
        items
    }

    fn write_dma(&mut self, offset: u32, value: u32) {
        match offset {
            pl080::INT_TC_CLEAR => self.raw_tc &= !value,
            pl080::INT_ERR_CLEAR => self.raw_err &= !value,
            pl080::INT_STATUS
            | pl080::INT_TC_STATUS
            | pl080::INT_ERROR_STATUS
            | pl080::RAW_INT_TC_STATUS
            | pl080::RAW_INT_ERROR_STATUS
            | pl080::ENABLED_CHANNELS => {}
            _ => {
                let channel_cfg = (0..pl080::CHANNELS)
                    .find(|&ch| pl080::channel_reg(ch, pl080::CH_CONFIGURATION) == offset);
                match channel_cfg {
                    Some(channel) => self.write_channel_config(channel, value),
                    None => {
                        self.dma.insert(offset, value);
                    }
                }
            }
        }
    }

    fn write_channel_config(&mut self, channel: u8, value: u32) {
        let bit = pl080::channel_bit(channel);
        let was_enabled = self.channel_enabled(channel);
        let enable = value & pl080::CFG_E != 0;
        self.set_ch(channel, pl080::CH_CONFIGURATION, value & !pl080::CFG_ACTIVE);

        if enable && !was_enabled {
            self.active |= bit;
            self.on_channel_enabled(channel);
        } else if (!enable || value & pl080::CFG_HALT != 0) && self.stuck_active & bit == 0 {
            self.active &= !bit;
        }
    }

    fn on_channel_enabled(&mut self, channel: u8) {
        // Even channels carry TX, odd channels RX; a one-shot conversion
        // starts once both halves of an M2M pair are armed.
        let pair_index = channel / 2;
        let Some(pair) = PairId::ALL.get(usize::from(pair_index)).copied() else {
            return;
        };
        if !self.suppress_completion {
            self.start_conversion(pair);
        }
    }

    fn start_conversion(&mut self, pair: PairId) {
        let tx = pair.tx_channel();
        let rx = pair.rx_channel();
        if !(self.channel_enabled(tx) && self.channel_enabled(rx)) {
            return;
        }
        let tx_item = self.current_item(tx);
        let fifo_in = self.asrc_phys_base + self.asrc_map.fifo_reg(pair, asrc_regs::FIFO_IN_DATA);
        if tx_item.dst != fifo_in || self.chain_is_ring(tx) {
            return;
        }
        if self.bus_error & pl080::channel_bit(tx) != 0 {
            self.finish_channel(tx);
            self.raw_err |= pl080::channel_bit(tx);
            return;
        }
        self.convert(pair);
    }

    fn chain_is_ring(&self, channel: u8) -> bool {
        let first = self.current_item(channel);
        let mut seen = Vec::new();
        let mut next = first.next;
        while next != 0 && seen.len() < MAX_WALK {
            if seen.contains(&next) {
                return true;
            }
            seen.push(next);
            match self.load_item(next) {
                Some(item) => next = item.next,
                None => return false,
            }
        }
        seen.len() >= MAX_WALK
    }

    fn finish_channel(&mut self, channel: u8) {
        let cfg = self.ch(channel, pl080::CH_CONFIGURATION);
        self.set_ch(channel, pl080::CH_CONFIGURATION, cfg & !pl080::CFG_E);
        if self.stuck_active & pl080::channel_bit(channel) == 0 {
            self.active &= !pl080::channel_bit(channel);
        }
    }

    fn convert(&mut self, pair: PairId) {
        let tx = pair.tx_channel();
        let rx = pair.rx_channel();

        let tx_items = self.walk_chain(tx);
        let mut input = Vec::new();
        for item in &tx_items {
            if let Some(bytes) = self.mem_read(item.src, item.bytes()) {
                input.extend_from_slice(&bytes);
            }
        }

        let ratio = u64::from(self.asrc_reg(self.asrc_map.pair_reg(pair, asrc_regs::PAIR_RATIO)));
        let in_cfg = self.asrc_reg(self.asrc_map.fifo_reg(pair, asrc_regs::FIFO_IN_CFG));
        let out_cfg = self.asrc_reg(self.asrc_map.fifo_reg(pair, asrc_regs::FIFO_OUT_CFG));
        let output = resample(&input, ratio, in_cfg, out_cfg);

        let rx_items = self.walk_chain(rx);
        let rx_capacity: usize = rx_items.iter().map(Item::bytes).sum();
        let mut written = 0usize;
        let mut end = self.ch(rx, pl080::CH_DST_ADDR);
        for item in &rx_items {
            if written >= output.len() {
                break;
            }
            let take = item.bytes().min(output.len() - written);
            if self.mem_write(item.dst, &output[written..written + take]) {
                written += take;
                end = item.dst + take as u32;
            }
        }
        self.set_ch(rx, pl080::CH_DST_ADDR, end);
        self.conversions += 1;

        if output.len() > rx_capacity {
            if rx_items.last().is_some_and(|i| i.control & pl080::CTRL_I != 0) {
                self.raw_tc |= pl080::channel_bit(rx);
            }
            self.finish_channel(rx);
            return;
        }

        if let Some(last) = tx_items.last() {
            self.set_ch(tx, pl080::CH_SRC_ADDR, last.src + last.bytes() as u32);
            self.set_ch(tx, pl080::CH_LLI, 0);
            self.set_ch(tx, pl080::CH_CONTROL, last.control & !pl080::CTRL_TRANSFER_SIZE_MASK);
            if last.control & pl080::CTRL_I != 0 {
                self.raw_tc |= pl080::channel_bit(tx);
            }
        }
        self.finish_channel(tx);
    }

    fn masked(&self, raw: u32, unmask: u32) -> u32 {
        (0..pl080::CHANNELS)
            .filter(|&ch| self.ch(ch, pl080::CH_CONFIGURATION) & unmask != 0)
            .fold(0, |acc, ch| acc | (raw & pl080::channel_bit(ch)))
    }

    fn read_dma(&self, offset: u32) -> u32 {
        match offset {
            pl080::RAW_INT_TC_STATUS => self.raw_tc,
            pl080::RAW_INT_ERROR_STATUS => self.raw_err,
            pl080::INT_TC_STATUS => self.masked(self.raw_tc, pl080::CFG_ITC),
            pl080::INT_ERROR_STATUS => self.masked(self.raw_err, pl080::CFG_IE),
            pl080::INT_STATUS => {
                self.masked(self.raw_tc, pl080::CFG_ITC) | self.masked(self.raw_err, pl080::CFG_IE)
            }
            pl080::ENABLED_CHANNELS => (0..pl080::CHANNELS)
                .filter(|&ch| self.channel_enabled(ch))
                .fold(0, |acc, ch| acc | pl080::channel_bit(ch)),
            _ => {
                let channel_cfg = (0..pl080::CHANNELS)
                    .find(|&ch| pl080::channel_reg(ch, pl080::CH_CONFIGURATION) == offset);
                match channel_cfg {
                    Some(channel) if self.active & pl080::channel_bit(channel) != 0 => {
                        self.dma_reg(offset) | pl080::CFG_ACTIVE
                    }
                    _ => self.dma_reg(offset),
                }
            }
        }
    }

    fn read_asrc(&self, offset: u32) -> u32 {
        let is_status = PairId::ALL
            .iter()
            .any(|&p| self.asrc_map.fifo_reg(p, asrc_regs::FIFO_STATUS) == offset);
        if is_status {
            if self.stuck_fifo {
                0
            } else {
                asrc_regs::FIFO_STATUS_IN_CLEARED | asrc_regs::FIFO_STATUS_OUT_CLEARED
            }
        } else {
            self.asrc_reg(offset)
        }
    }

    fn advance_stream(&mut self, channel: u8, fill: u8) -> bool {
        if !self.channel_enabled(channel) {
            return false;
        }
        let item = self.current_item(channel);
        let bytes = item.bytes();
        let control = self.ch(channel, pl080::CH_CONTROL);
        if control & pl080::CTRL_DI != 0 {
            let _ = self.mem_write(item.dst, &std::vec![fill; bytes]);
        }
        if item.control & pl080::CTRL_I != 0 {
            self.raw_tc |= pl080::channel_bit(channel);
        }
        if item.next == 0 {
            self.finish_channel(channel);
            return true;
        }
        if let Some(next) = self.load_item(item.next) {
            self.set_ch(channel, pl080::CH_SRC_ADDR, next.src);
            self.set_ch(channel, pl080::CH_DST_ADDR, next.dst);
            self.set_ch(channel, pl080::CH_LLI, next.next);
            self.set_ch(channel, pl080::CH_CONTROL, next.control);
        }
        true
    }
}

fn frame_layout(cfg: u32) -> (usize, usize) {
    let container = if cfg & asrc_regs::FIFO_CFG_WIDTH_24 != 0 { 4 } else { 2 };
    let channels =
        ((cfg >> asrc_regs::FIFO_CFG_CHANNELS_SHIFT) & asrc_regs::FIFO_CFG_CHANNELS_MASK) as usize;
    (container, channels.max(1))
}

fn read_sample(bytes: &[u8], container: usize) -> i32 {
    if container == 2 {
        i32::from(i16::from_le_bytes([bytes[0], bytes[1]])) << 8
    } else {
        // Sign-extend the low 24 bits of the container.
        (i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) << 8) >> 8
    }
}

fn write_sample(out: &mut Vec<u8>, value: i32, container: usize) {
    if container == 2 {
        out.extend_from_slice(&((value >> 8) as i16).to_le_bytes());
    } else {
        out.extend_from_slice(&(value & 0x00FF_FFFF).to_le_bytes());
    }
}

/// Sample-and-hold resampler standing in for the converter core.
fn resample(input: &[u8], ratio_q22: u64, in_cfg: u32, out_cfg: u32) -> Vec<u8> {
    let (in_container, in_channels) = frame_layout(in_cfg);
    let (out_container, out_channels) = frame_layout(out_cfg);
    let in_frame = in_container * in_channels;
    let in_frames = (input.len() / in_frame) as u64;
    if ratio_q22 == 0 || in_frames == 0 {
        return Vec::new();
    }
    let out_frames = (in_frames * ratio_q22) >> 22;
    let mut out = Vec::with_capacity(out_frames as usize * out_container * out_channels);
    for j in 0..out_frames {
        let src_frame = (((j << 22) / ratio_q22).min(in_frames - 1)) as usize;
        let frame = &input[src_frame * in_frame..(src_frame + 1) * in_frame];
        for ch in 0..out_channels {
            let value = if ch < in_channels {
                read_sample(&frame[ch * in_container..], in_container)
            } else {
                0
            };
            write_sample(&mut out, value, out_container);
        }
    }
    out
}

/// Host model of the ASRC block, the PL080 and DMA memory.
///
/// Cloning shares the same simulated hardware.
#[derive(Clone)]
pub struct SimulatedSoc {
    state: Arc<Mutex<SimState>>,
    pool: Arc<Mutex<StaticDmaPool>>,
}

impl SimulatedSoc {
    /// Simulate an ASRC block with register map `asrc_map` whose FIFO data
    /// ports live at bus address `asrc_phys_base`.
    pub fn new(asrc_map: AsrcRegisterMap, asrc_phys_base: u32) -> Self {
        let memory: &'static mut [u8] = std::vec![0u8; SIM_DMA_MEMORY_BYTES].leak();
        let mem_ptr = memory.as_mut_ptr();
        let mem_len = memory.len();
        let pool = StaticDmaPool::new(memory, SIM_DMA_PHYS_BASE);
        let state = SimState {
            asrc_map,
            asrc_phys_base,
            asrc: BTreeMap::new(),
            asrc_log: Vec::new(),
            dma: BTreeMap::new(),
            raw_tc: 0,
            raw_err: 0,
            active: 0,
            mem_ptr,
            mem_len,
            stuck_active: 0,
            stuck_fifo: false,
            suppress_completion: false,
            bus_error: 0,
            conversions: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            pool: Arc::new(Mutex::new(pool)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register window of the ASRC block.
    pub fn asrc_bus(&self) -> SimBus {
        SimBus {
            state: Arc::clone(&self.state),
            window: Window::Asrc,
        }
    }

    /// Register window of the DMA controller.
    pub fn dma_bus(&self) -> SimBus {
        SimBus {
            state: Arc::clone(&self.state),
            window: Window::Dma,
        }
    }

    /// `true` while any unmasked TC or error interrupt is pending.
    pub fn irq_pending(&self) -> bool {
        self.lock().read_dma(pl080::INT_STATUS) != 0
    }

    /// Current value of an ASRC register.
    pub fn asrc_reg(&self, offset: u32) -> u32 {
        self.lock().read_asrc(offset)
    }

    /// Current value of a DMA controller register.
    pub fn dma_reg(&self, offset: u32) -> u32 {
        self.lock().read_dma(offset)
    }

    /// Every value written to ASRC register `offset`, oldest first.
    pub fn asrc_writes(&self, offset: u32) -> Vec<u32> {
        self.lock()
            .asrc_log
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|&(_, v)| v)
            .collect()
    }

    /// Number of one-shot conversions run so far.
    pub fn conversions(&self) -> usize {
        self.lock().conversions
    }

    /// Keep `channel`'s active bit set no matter what is written.
    pub fn set_stuck_active(&self, channel: u8, stuck: bool) {
        let mut state = self.lock();
        let bit = pl080::channel_bit(channel);
        if stuck {
            state.stuck_active |= bit;
        } else {
            state.stuck_active &= !bit;
        }
    }

    /// Make every FIFO report "not drained".
    pub fn set_stuck_fifo(&self, stuck: bool) {
        self.lock().stuck_fifo = stuck;
    }

    /// Accept transfers but never complete them.
    pub fn set_suppress_completion(&self, suppress: bool) {
        self.lock().suppress_completion = suppress;
    }

    /// Run a conversion withheld by [`set_suppress_completion`], as if its
    /// completion interrupt arrived late. Does nothing unless both of the
    /// pair's channels are still armed.
    ///
    /// [`set_suppress_completion`]: Self::set_suppress_completion
    pub fn release_completion(&self, pair: PairId) {
        self.lock().start_conversion(pair);
    }

    /// End the next transfer on `channel` with a bus error.
    pub fn set_bus_error(&self, channel: u8, fail: bool) {
        let mut state = self.lock();
        let bit = pl080::channel_bit(channel);
        if fail {
            state.bus_error |= bit;
        } else {
            state.bus_error &= !bit;
        }
    }

    /// Move a ring-mode channel past its current item, filling incrementing
    /// destinations with `fill`. Returns `false` if the channel is disabled.
    pub fn advance_stream(&self, channel: u8, fill: u8) -> bool {
        self.lock().advance_stream(channel, fill)
    }
}

impl DmaAllocator for SimulatedSoc {
    fn allocate(&mut self, len: usize, align: usize) -> Result<DmaRegion, DmaMemoryError> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allocate(len, align)
    }
}

/// One register window of a [`SimulatedSoc`].
#[derive(Clone)]
pub struct SimBus {
    state: Arc<Mutex<SimState>>,
    window: Window,
}

impl RegisterBus for SimBus {
    fn read(&self, offset: u32) -> u32 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match self.window {
            Window::Asrc => state.read_asrc(offset),
            Window::Dma => state.read_dma(offset),
        }
    }

    fn write(&self, offset: u32, value: u32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match self.window {
            Window::Asrc => {
                state.asrc.insert(offset, value);
                state.asrc_log.push((offset, value));
            }
            Window::Dma => state.write_dma(offset, value),
        }
    }
}
