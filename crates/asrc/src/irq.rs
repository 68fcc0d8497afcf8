//! Completion and interrupt bridge.
//!
//! [`AsrcSubsystem::handle_dma_interrupt`] is called from the DMA controller's
//! interrupt vector (or a task woken by it). It never blocks on the pair
//! locks: it claims the armed transfer through the atomic state, drains the
//! hardware with bounded busy-waits and hands the result to the waiting
//! `push` through the pair's completion signal.

use core::sync::atomic::Ordering;

use embassy_time::{block_for, Duration};
use platform::pl080::channel_bit;
use platform::RegisterBus;

use crate::error::{Error, HangSite};
use crate::fmt::{error, trace, warn};
use crate::hw::poll_until;
use crate::pair::{PairSlot, PairState};
use crate::subsystem::AsrcSubsystem;

impl<B: RegisterBus> AsrcSubsystem<B> {
    /// Service the DMA controller interrupt.
    ///
    /// Acknowledges every pending terminal-count and error bit, then routes
    /// each to the pair owning the channel. An interrupt with nothing pending
    /// is ignored.
    pub fn handle_dma_interrupt(&self) {
        let tc = self.dma.tc_status();
        let err = self.dma.error_status();
        let pending = tc | err;
        if pending == 0 {
            trace!("spurious DMA interrupt");
            return;
        }
        self.dma.clear_interrupts(pending);

        for slot in self.pairs.iter().flatten() {
            let mask = channel_bit(slot.id.tx_channel()) | channel_bit(slot.id.rx_channel());
            let done = tc & mask;
            let failed = err & mask;
            if done | failed == 0 {
                continue;
            }
            if slot.is_streaming_path() {
                service_stream(slot, done, failed);
            } else {
                self.service_transfer(slot, done, failed != 0);
            }
        }
    }

    fn service_transfer(&self, slot: &PairSlot, done: u32, failed: bool) {
        if !slot.state.claim(PairState::Armed, PairState::Draining) {
            warn!("pair {}: completion with no transfer armed", slot.id.get());
            return;
        }
        // Only the last RX item interrupts; RX ending while TX still runs
        // means the output did not fit.
        let rx_full = done & channel_bit(slot.id.rx_channel()) != 0
            && done & channel_bit(slot.id.tx_channel()) == 0;
        let result = if failed {
            error!("pair {}: DMA bus error", slot.id.get());
            self.abort_transfer(slot, Error::DmaBus)
        } else if rx_full {
            error!("pair {}: RX buffer full before input consumed", slot.id.get());
            self.abort_transfer(slot, Error::Overflow { capacity: slot.rx.len() })
        } else {
            self.complete_transfer(slot)
        };

        match result {
            Ok(produced) => {
                slot.readable.store(produced, Ordering::Release);
                if produced == 0 {
                    slot.state.set(PairState::Configured);
                }
                trace!("pair {}: transfer complete, {} B", slot.id.get(), produced);
            }
            // Left armed so the next push re-quiesces before reuse.
            Err(_) => slot.state.set(PairState::Armed),
        }
        slot.done.signal(result);
    }

    /// Halt TX, wait for both FIFOs to drain, halt RX.
    fn abort_transfer(&self, slot: &PairSlot, cause: Error) -> Result<usize, Error> {
        if let Err(e) = self.quiesce(slot) {
            error!("pair {}: teardown after {:?}: {:?}", slot.id.get(), cause, e);
        }
        Err(cause)
    }

    fn drain_and_halt(&self, slot: &PairSlot) -> Result<(), Error> {
        let id = slot.id;
        let (tx, rx) = (id.tx_channel(), id.rx_channel());
        let budget = self.config.poll;
        let settle = Duration::from_micros(self.config.drain_settle_us);

        self.dma.halt_channel(tx);
        poll_until(budget, HangSite::TxHalt, || !self.dma.is_active(tx))?;
        poll_until(budget, HangSite::FifoInDrain, || self.asrc.fifo_in_cleared(id))?;
        block_for(settle);
        poll_until(budget, HangSite::FifoOutDrain, || self.asrc.fifo_out_cleared(id))?;
        block_for(settle);
        self.dma.halt_channel(rx);
        poll_until(budget, HangSite::RxHalt, || !self.dma.is_active(rx))
    }

    fn disable_channels(&self, slot: &PairSlot) {
        self.dma.disable_channel(slot.id.tx_channel());
        self.dma.disable_channel(slot.id.rx_channel());
    }

    /// Drain the pair and measure how much the RX channel wrote.
    pub(crate) fn complete_transfer(&self, slot: &PairSlot) -> Result<usize, Error> {
        let drained = self.drain_and_halt(slot);
        let end = self.dma.current_dst(slot.id.rx_channel());
        let produced = end
            .checked_sub(slot.rx.phys_addr())
            .map_or(0, |n| n as usize)
            .min(slot.rx.len());
        self.disable_channels(slot);
        drained.map(|()| produced)
    }

    /// Stop both channels of the pair, whatever they were doing.
    pub(crate) fn quiesce(&self, slot: &PairSlot) -> Result<(), Error> {
        let drained = self.drain_and_halt(slot);
        self.disable_channels(slot);
        drained
    }
}

fn service_stream(slot: &PairSlot, done: u32, failed: u32) {
    if failed != 0 {
        error!("pair {}: DMA bus error while streaming", slot.id.get());
        slot.stream_fault.store(true, Ordering::Release);
        return;
    }
    let elapsed = slot
        .periods
        .fetch_add(done.count_ones(), Ordering::AcqRel)
        .wrapping_add(done.count_ones());
    trace!("pair {}: period {}", slot.id.get(), elapsed);
}
