//! The ASRC subsystem: every pair plus the hardware they share.
//!
//! One [`AsrcSubsystem`] is built at start-up and lives for the rest of the
//! program. It owns the register windows, allocates each pair's buffers and
//! descriptor tables once, and serialises operations per pair with an async
//! mutex. Pairs are independent; only the global ASRC and DMA registers are
//! shared, and those are updated inside critical sections.

use core::sync::atomic::Ordering;

use embassy_time::{with_timeout, Duration};
use platform::pl080::{channel_bit, ALL_CHANNELS_MASK};
use platform::{
    DmaAllocator, DmaRegion, PairId, PairPath, RegisterBus, VolumeGain, VolumeRamp,
};

use crate::config::{AsrcConfig, PairConfig};
use crate::dump::{self, RegisterDump};
use crate::error::Error;
use crate::fmt::{debug, error, info, trace, warn};
use crate::hw::{AsrcHw, ChannelSetup, Pl080, Route};
use crate::lli::{
    self, ChainEndpoints, ChainMode, DescriptorChain, Direction, TABLE_BYTES, UNIT_BYTES,
};
use crate::pair::{PairInfo, PairInner, PairSlot, PairState};
use crate::ratio;

/// Alignment of PCM buffers (one cache line).
const BUFFER_ALIGN: usize = 32;

/// Alignment of descriptor tables (one item).
const TABLE_ALIGN: usize = 16;

/// The ASRC M2M data path.
pub struct AsrcSubsystem<B: RegisterBus> {
    pub(crate) config: AsrcConfig,
    pub(crate) asrc: AsrcHw<B>,
    pub(crate) dma: Pl080<B>,
    pub(crate) pairs: heapless::Vec<Option<PairSlot>, { PairId::COUNT }>,
}

impl<B: RegisterBus> AsrcSubsystem<B> {
    /// Validate `config`, allocate every declared pair's DMA memory from
    /// `alloc`, enable the DMA controller and reset the converters.
    pub fn new(
        config: AsrcConfig,
        asrc_bus: B,
        dma_bus: B,
        alloc: &mut impl DmaAllocator,
    ) -> Result<Self, Error> {
        config.validate()?;
        let asrc = AsrcHw::new(asrc_bus, config.registers, config.asrc_phys_base);
        let dma = Pl080::new(dma_bus);

        let mut pairs = heapless::Vec::new();
        for id in PairId::ALL {
            let slot = match config.topology(id) {
                Some(topology) => {
                    let buffers: [DmaRegion; 4] = [
                        alloc.allocate(config.tx_buffer_bytes, BUFFER_ALIGN)?,
                        alloc.allocate(config.rx_buffer_bytes, BUFFER_ALIGN)?,
                        alloc.allocate(TABLE_BYTES, TABLE_ALIGN)?,
                        alloc.allocate(TABLE_BYTES, TABLE_ALIGN)?,
                    ];
                    Some(PairSlot::new(id, topology, buffers))
                }
                None => None,
            };
            pairs
                .push(slot)
                .map_err(|_| Error::InvalidConfig("too many pairs"))?;
        }

        dma.enable_controller();
        dma.clear_interrupts(ALL_CHANNELS_MASK);
        for slot in pairs.iter().flatten() {
            asrc.disable_pair(slot.id);
            asrc.reset_pair(slot.id);
        }
        info!(
            "ASRC ready: {} pairs, {} B TX / {} B RX each",
            pairs.iter().flatten().count(),
            config.tx_buffer_bytes,
            config.rx_buffer_bytes
        );

        Ok(Self {
            config,
            asrc,
            dma,
            pairs,
        })
    }

    /// Configuration the subsystem was built with.
    pub fn config(&self) -> &AsrcConfig {
        &self.config
    }

    /// Validate a raw pair index.
    pub fn pair_id(raw: u8) -> Result<PairId, Error> {
        PairId::try_new(raw).map_err(|_| Error::InvalidPair(raw))
    }

    pub(crate) fn slot(&self, pair: PairId) -> Result<&PairSlot, Error> {
        self.pairs
            .get(pair.index())
            .and_then(Option::as_ref)
            .ok_or(Error::PairUnavailable)
    }

    /// Current state of `pair`.
    pub fn state(&self, pair: PairId) -> Result<PairState, Error> {
        Ok(self.slot(pair)?.state.get())
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Configure a stopped pair and apply its persisted volume settings.
    pub async fn start(&self, pair: PairId, cfg: &PairConfig) -> Result<(), Error> {
        let slot = self.slot(pair)?;
        let mut inner = slot.inner.lock().await;
        if inner.started || slot.state.get() != PairState::Stopped {
            return Err(Error::AlreadyStarted);
        }
        self.configure_locked(slot, &mut inner, cfg)?;
        inner.started = true;
        debug!("pair {}: started", pair.get());
        Ok(())
    }

    /// Reprogram the format of a started, idle pair.
    pub async fn configure(&self, pair: PairId, cfg: &PairConfig) -> Result<(), Error> {
        let slot = self.slot(pair)?;
        let mut inner = slot.inner.lock().await;
        match slot.state.get() {
            PairState::Stopped => return Err(Error::NotStarted),
            PairState::Armed | PairState::Draining => return Err(Error::InvalidState),
            PairState::Configured => {}
        }
        self.configure_locked(slot, &mut inner, cfg)
    }

    /// Halt both DMA directions, disable and reset the converter.
    ///
    /// Reachable from every state. A `push` blocked on this pair completes
    /// with [`Error::Cancelled`]. Stopping a stopped pair does nothing.
    pub async fn stop(&self, pair: PairId) -> Result<(), Error> {
        let slot = self.slot(pair)?;
        if slot.state.claim(PairState::Armed, PairState::Stopped) {
            warn!("pair {}: stop cancels the pending transfer", pair.get());
            slot.done.signal(Err(Error::Cancelled));
        }
        let mut inner = slot.inner.lock().await;
        if !inner.started {
            slot.state.set(PairState::Stopped);
            return Ok(());
        }

        if let Err(e) = self.quiesce(slot) {
            error!("pair {}: teardown incomplete: {:?}", pair.get(), e);
        }
        self.asrc.disable_fifos(pair);
        self.asrc.disable_pair(pair);
        self.asrc.reset_pair(pair);

        slot.readable.store(0, Ordering::Release);
        slot.periods.store(0, Ordering::Release);
        slot.stream_fault.store(false, Ordering::Release);
        *inner = PairInner {
            gain: inner.gain,
            ramp: inner.ramp,
            ..PairInner::default()
        };
        slot.state.set(PairState::Stopped);
        debug!("pair {}: stopped", pair.get());
        Ok(())
    }

    pub(crate) fn configure_locked(
        &self,
        slot: &PairSlot,
        inner: &mut PairInner,
        cfg: &PairConfig,
    ) -> Result<(), Error> {
        let max = slot.topology.max_channels;
        if cfg.channels > max {
            return Err(Error::ChannelOverLimit {
                requested: cfg.channels.get(),
                max: max.get(),
            });
        }
        ratio::validate_ratio(cfg.ratio, self.config.revision)?;

        let id = slot.id;
        let (input, output) = match slot.topology.path {
            PairPath::M2M => (Route::Dma, Route::Dma),
            PairPath::MemoryToPeripheral => (Route::Dma, Route::Peripheral),
            PairPath::PeripheralToMemory => (Route::Peripheral, Route::Dma),
        };
        let threshold = self.config.fifo_threshold;

        self.asrc.disable_pair(id);
        self.asrc.reset_pair(id);
        self.asrc.set_input_route(id, input);
        self.asrc.set_output_route(id, output);
        self.asrc
            .set_sync_mode(id, cfg.sync_mode.unwrap_or(slot.topology.sync_mode));
        self.asrc.set_ratio(id, cfg.ratio);
        self.asrc.set_zero_init(id, ratio::zero_init_size(cfg.ratio));
        self.asrc
            .configure_fifo_in(id, cfg.src_bitwidth, cfg.channels, threshold);
        self.asrc
            .configure_fifo_out(id, cfg.dst_bitwidth, cfg.channels, threshold);
        self.setup_channels(id);
        self.asrc.enable_pair(id);
        self.apply_volume(id, inner);

        inner.config = Some(*cfg);
        slot.state.set(PairState::Configured);
        debug!(
            "pair {}: configured ratio {} channels {}",
            id.get(),
            cfg.ratio.bits(),
            cfg.channels.get()
        );
        Ok(())
    }

    fn setup_channels(&self, id: PairId) {
        let (tx, rx) = (id.tx_channel(), id.rx_channel());
        self.dma.disable_channel(tx);
        self.dma.disable_channel(rx);
        self.dma
            .configure_channel(tx, &ChannelSetup::mem_to_periph(tx));
        self.dma
            .configure_channel(rx, &ChannelSetup::periph_to_mem(rx));
        self.dma.set_sync_bypass(tx, true);
        self.dma.set_sync_bypass(rx, true);
    }

    fn apply_volume(&self, id: PairId, inner: &PairInner) {
        self.asrc.set_volume_gain(id, inner.gain);
        if let Some(ramp) = &inner.ramp {
            self.asrc.set_volume_ramp(id, ramp);
        }
    }

    fn arm(&self, channel: u8, chain: &DescriptorChain) -> Result<(), Error> {
        let first = chain.first().ok_or(Error::InvalidStream)?;
        self.dma.clear_interrupts(channel_bit(channel));
        self.dma.load_descriptor(channel, first);
        self.dma.enable_channel(channel);
        Ok(())
    }

    // ── M2M transfer ─────────────────────────────────────────────────────────

    /// Convert `data` and wait for the result.
    ///
    /// Copies `data` into the pair's TX buffer, arms RX then TX, and waits for
    /// the completion interrupt. Returns the number of converted bytes now
    /// ready to [`pop`](Self::pop); the count follows from the achieved ratio,
    /// not from `data.len()`.
    ///
    /// Fails with [`Error::BufferTooLarge`] when `data` exceeds the TX buffer
    /// or its worst-case output at the configured ratio and widths exceeds
    /// the RX buffer.
    ///
    /// On [`Error::Timeout`] the pair stays armed; the next `push` quiesces
    /// and re-arms, or `stop` recovers it.
    pub async fn push(&self, pair: PairId, data: &[u8]) -> Result<usize, Error> {
        let slot = self.slot(pair)?;
        if slot.is_streaming_path() {
            return Err(Error::UnsupportedPath);
        }
        let mut inner = slot.inner.lock().await;
        match slot.state.get() {
            PairState::Stopped => return Err(Error::NotStarted),
            PairState::Draining => return Err(Error::InvalidState),
            PairState::Configured | PairState::Armed => {}
        }
        if data.is_empty() {
            return Ok(0);
        }
        if data.len() > slot.tx.len() {
            return Err(Error::BufferTooLarge {
                len: data.len(),
                capacity: slot.tx.len(),
            });
        }
        let cfg = inner.config.ok_or(Error::NotStarted)?;
        let worst = cfg.max_output_bytes(data.len());
        if worst > slot.rx.len() {
            return Err(Error::BufferTooLarge {
                len: worst,
                capacity: slot.rx.len(),
            });
        }
        // Claimed, not just read: a late completion racing this re-arm must
        // either win the claim itself or find nothing armed.
        if slot.state.claim(PairState::Armed, PairState::Configured) {
            warn!("pair {}: re-arming after an unfinished transfer", pair.get());
            if let Err(e) = self.quiesce(slot) {
                slot.state.set(PairState::Armed);
                return Err(e);
            }
        } else if slot.state.get() != PairState::Configured {
            // The late completion won; its output must be popped first.
            return Err(Error::InvalidState);
        }

        load_padded(&slot.tx, data)?;
        let tx_chain = lli::build_tx_chain(
            &ChainEndpoints {
                memory: slot.tx.phys_addr(),
                fifo: self.asrc.fifo_in_phys(pair),
                table: slot.tx_table.phys_addr(),
            },
            data.len(),
            ChainMode::OneShot,
        )?;
        let rx_chain = lli::build_rx_chain(
            &ChainEndpoints {
                memory: slot.rx.phys_addr(),
                fifo: self.asrc.fifo_out_phys(pair),
                table: slot.rx_table.phys_addr(),
            },
            slot.rx.len(),
            ChainMode::OneShot,
        )?;
        tx_chain.write_table(&slot.tx_table)?;
        rx_chain.write_table(&slot.rx_table)?;

        slot.readable.store(0, Ordering::Release);
        inner.read_offset = 0;
        slot.done.reset();
        slot.state.set(PairState::Armed);
        // RX first: output produced before RX is armed would be lost.
        self.arm(pair.rx_channel(), &rx_chain)?;
        self.arm(pair.tx_channel(), &tx_chain)?;
        trace!(
            "pair {}: armed {} B over {} TX items",
            pair.get(),
            data.len(),
            tx_chain.len()
        );

        let timeout = Duration::from_millis(self.config.completion_timeout_ms);
        match with_timeout(timeout, slot.done.wait()).await {
            Ok(Ok(produced)) => {
                trace!("pair {}: {} B ready", pair.get(), produced);
                Ok(produced)
            }
            Ok(Err(e)) => {
                warn!("pair {}: transfer failed: {:?}", pair.get(), e);
                Err(e)
            }
            Err(_) => {
                warn!(
                    "pair {}: no completion within {} ms",
                    pair.get(),
                    self.config.completion_timeout_ms
                );
                Err(Error::Timeout)
            }
        }
    }

    /// Copy up to `out.len()` converted bytes out of the RX buffer.
    ///
    /// When the last byte has been popped the pair returns to `Configured`.
    pub async fn pop(&self, pair: PairId, out: &mut [u8]) -> Result<usize, Error> {
        let slot = self.slot(pair)?;
        if slot.is_streaming_path() {
            return Err(Error::UnsupportedPath);
        }
        let mut inner = slot.inner.lock().await;
        match slot.state.get() {
            PairState::Stopped => return Err(Error::NotStarted),
            PairState::Configured | PairState::Armed => return Err(Error::InvalidState),
            PairState::Draining => {}
        }
        let readable = slot.readable.load(Ordering::Acquire);
        let n = out.len().min(readable);
        let dst = out.get_mut(..n).ok_or(Error::InvalidState)?;
        slot.rx.read(inner.read_offset, dst)?;
        inner.read_offset = inner.read_offset.saturating_add(n);
        let left = readable.saturating_sub(n);
        slot.readable.store(left, Ordering::Release);
        if left == 0 {
            slot.state.set(PairState::Configured);
            debug!("pair {}: drained", pair.get());
        }
        Ok(n)
    }

    // ── Volume ───────────────────────────────────────────────────────────────

    /// Set the Q24 output gain; applied at once unless the pair is stopped.
    ///
    /// Values below the −120 dB floor are rejected before any register write.
    pub async fn set_volume_gain(&self, pair: PairId, gain_q24: u32) -> Result<(), Error> {
        let slot = self.slot(pair)?;
        let gain = VolumeGain::try_new(gain_q24).map_err(Error::VolumeOutOfRange)?;
        let mut inner = slot.inner.lock().await;
        inner.gain = gain;
        if inner.started {
            self.asrc.set_volume_gain(pair, gain);
        }
        debug!("pair {}: gain {}", pair.get(), gain.get());
        Ok(())
    }

    /// Set the volume ramp; applied at once unless the pair is stopped.
    pub async fn set_volume_ramp(&self, pair: PairId, ramp: VolumeRamp) -> Result<(), Error> {
        let slot = self.slot(pair)?;
        let mut inner = slot.inner.lock().await;
        inner.ramp = Some(ramp);
        if inner.started {
            self.asrc.set_volume_ramp(pair, &ramp);
        }
        debug!(
            "pair {}: ramp up {} down {}",
            pair.get(),
            ramp.up_time.get(),
            ramp.down_time.get()
        );
        Ok(())
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    /// Path, state and format of `pair`.
    pub async fn info(&self, pair: PairId) -> Result<PairInfo, Error> {
        let slot = self.slot(pair)?;
        let inner = slot.inner.lock().await;
        let cfg = inner.config;
        Ok(PairInfo {
            pair,
            path: slot.topology.path,
            state: slot.state.get(),
            started: inner.started,
            max_channels: slot.topology.max_channels,
            channels: cfg.map(|c| c.channels),
            ratio: cfg.map(|c| c.ratio),
            src_bitwidth: cfg.map(|c| c.src_bitwidth),
            dst_bitwidth: cfg.map(|c| c.dst_bitwidth),
            sync_mode: cfg
                .and_then(|c| c.sync_mode)
                .unwrap_or(slot.topology.sync_mode),
            volume_gain: inner.gain,
            readable: slot.readable.load(Ordering::Acquire),
        })
    }

    /// Snapshot of the pair's ASRC registers and both DMA channels.
    pub async fn dump_registers(&self, pair: PairId) -> Result<RegisterDump, Error> {
        let slot = self.slot(pair)?;
        let _inner = slot.inner.lock().await;
        let regs = dump::collect(&self.asrc, &self.dma, pair);
        for entry in &regs {
            debug!(
                "pair {}: {} @ {} = {}",
                pair.get(),
                entry.name,
                entry.offset,
                entry.value
            );
        }
        Ok(regs)
    }

    // ── Power management ─────────────────────────────────────────────────────

    /// Quiesce every pair and disable the DMA controller.
    ///
    /// Pending transfers complete with [`Error::Cancelled`]; un-popped output
    /// is dropped. Started pairs come back `Configured` after
    /// [`resume`](Self::resume).
    pub async fn suspend(&self) {
        for slot in self.pairs.iter().flatten() {
            if slot.state.claim(PairState::Armed, PairState::Configured) {
                slot.done.signal(Err(Error::Cancelled));
            }
            let mut inner = slot.inner.lock().await;
            if !inner.started {
                continue;
            }
            if let Err(e) = self.quiesce(slot) {
                error!("pair {}: suspend teardown incomplete: {:?}", slot.id.get(), e);
            }
            let dropped = slot.readable.swap(0, Ordering::AcqRel);
            if dropped > 0 {
                warn!("pair {}: suspend drops {} unread bytes", slot.id.get(), dropped);
            }
            inner.read_offset = 0;
            inner.stream_bytes = 0;
            self.asrc.disable_fifos(slot.id);
            self.asrc.disable_pair(slot.id);
            slot.state.set(PairState::Configured);
        }
        self.dma.disable_controller();
        info!("ASRC suspended");
    }

    /// Re-enable the DMA controller and reprogram every started pair with
    /// its persisted format, gain and ramp.
    pub async fn resume(&self) -> Result<(), Error> {
        self.dma.enable_controller();
        self.dma.clear_interrupts(ALL_CHANNELS_MASK);
        for slot in self.pairs.iter().flatten() {
            let mut inner = slot.inner.lock().await;
            if !inner.started {
                continue;
            }
            if let Some(cfg) = inner.config {
                self.configure_locked(slot, &mut inner, &cfg)?;
            }
        }
        info!("ASRC resumed");
        Ok(())
    }

    // ── Ring streaming ───────────────────────────────────────────────────────

    /// Start continuous streaming on a peripheral pair: `periods` items of
    /// `period_bytes` each, looping over the pair's TX (playback) or RX
    /// (capture) buffer. Every period raises an interrupt.
    pub async fn arm_stream(
        &self,
        pair: PairId,
        period_bytes: usize,
        periods: usize,
    ) -> Result<(), Error> {
        let slot = self.slot(pair)?;
        let mut inner = slot.inner.lock().await;
        let (direction, channel, region, table, fifo) = match slot.topology.path {
            PairPath::MemoryToPeripheral => (
                Direction::Tx,
                pair.tx_channel(),
                &slot.tx,
                &slot.tx_table,
                self.asrc.fifo_in_phys(pair),
            ),
            PairPath::PeripheralToMemory => (
                Direction::Rx,
                pair.rx_channel(),
                &slot.rx,
                &slot.rx_table,
                self.asrc.fifo_out_phys(pair),
            ),
            PairPath::M2M => return Err(Error::UnsupportedPath),
        };
        match slot.state.get() {
            PairState::Stopped => return Err(Error::NotStarted),
            PairState::Armed | PairState::Draining => return Err(Error::InvalidState),
            PairState::Configured => {}
        }
        let total = period_bytes
            .checked_mul(periods)
            .ok_or(Error::InvalidStream)?;
        if total > region.len() {
            return Err(Error::BufferTooLarge {
                len: total,
                capacity: region.len(),
            });
        }
        let chain = lli::build_ring_chain(
            direction,
            &ChainEndpoints {
                memory: region.phys_addr(),
                fifo,
                table: table.phys_addr(),
            },
            period_bytes,
            periods,
        )?;
        chain.write_table(table)?;

        slot.periods.store(0, Ordering::Release);
        slot.stream_fault.store(false, Ordering::Release);
        inner.stream_bytes = total;
        slot.state.set(PairState::Armed);
        self.arm(channel, &chain)?;
        debug!(
            "pair {}: streaming {} periods of {} B",
            pair.get(),
            periods,
            period_bytes
        );
        Ok(())
    }

    /// Byte offset of the DMA engine inside the armed ring.
    pub async fn stream_position(&self, pair: PairId) -> Result<usize, Error> {
        let slot = self.slot(pair)?;
        let inner = slot.inner.lock().await;
        let (current, base) = match slot.topology.path {
            PairPath::MemoryToPeripheral => {
                (self.dma.current_src(pair.tx_channel()), slot.tx.phys_addr())
            }
            PairPath::PeripheralToMemory => {
                (self.dma.current_dst(pair.rx_channel()), slot.rx.phys_addr())
            }
            PairPath::M2M => return Err(Error::UnsupportedPath),
        };
        if slot.state.get() != PairState::Armed {
            return Err(Error::InvalidState);
        }
        let offset = current.checked_sub(base).map_or(0, |o| o as usize);
        Ok(if offset < inner.stream_bytes { offset } else { 0 })
    }

    /// Ring periods completed since the stream was armed.
    pub fn periods_elapsed(&self, pair: PairId) -> Result<u32, Error> {
        let slot = self.slot(pair)?;
        if !slot.is_streaming_path() {
            return Err(Error::UnsupportedPath);
        }
        if slot.stream_fault.load(Ordering::Acquire) {
            return Err(Error::DmaBus);
        }
        Ok(slot.periods.load(Ordering::Acquire))
    }

    /// Copy playback samples into the ring of a memory-to-peripheral pair.
    pub async fn write_stream(
        &self,
        pair: PairId,
        offset: usize,
        data: &[u8],
    ) -> Result<usize, Error> {
        let slot = self.slot(pair)?;
        if slot.topology.path != PairPath::MemoryToPeripheral {
            return Err(Error::UnsupportedPath);
        }
        let inner = slot.inner.lock().await;
        if !inner.started {
            return Err(Error::NotStarted);
        }
        slot.tx.write(offset, data)?;
        Ok(data.len())
    }

    /// Copy captured samples out of the ring of a peripheral-to-memory pair.
    pub async fn read_stream(
        &self,
        pair: PairId,
        offset: usize,
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let slot = self.slot(pair)?;
        if slot.topology.path != PairPath::PeripheralToMemory {
            return Err(Error::UnsupportedPath);
        }
        let inner = slot.inner.lock().await;
        if !inner.started {
            return Err(Error::NotStarted);
        }
        slot.rx.read(offset, out)?;
        Ok(out.len())
    }
}

/// Copy `data` to the start of `region` and zero the tail of its last word.
fn load_padded(region: &DmaRegion, data: &[u8]) -> Result<(), Error> {
    region.write(0, data)?;
    let padded = data.len().next_multiple_of(UNIT_BYTES);
    let pad = padded.saturating_sub(data.len());
    if pad > 0 {
        let zeros = [0u8; UNIT_BYTES];
        region.write(data.len(), zeros.get(..pad).unwrap_or(&[]))?;
    }
    Ok(())
}
