//! Per-pair state.
//!
//! ```text
//! Stopped --start--> Configured --push--> Armed --completion--> Draining
//!    ^                   ^                                          |
//!    |                   +-------------- pop (last byte) -----------+
//!    +---- stop (from any state)
//! ```
//!
//! The state lives in an atomic mirror so the interrupt bridge and `stop` can
//! claim an armed transfer without the pair lock. Every other transition is
//! made while holding the lock.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use platform::{
    Bitwidth, ChannelCount, DmaRegion, PairId, PairPath, Q22Ratio, SyncMode, VolumeGain, VolumeRamp,
};

use crate::config::{PairConfig, PairTopology};
use crate::error::Error;

/// Lifecycle state of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PairState {
    /// Hardware disabled; only `start` is accepted.
    Stopped = 0,
    /// Format programmed; ready to push or arm a stream.
    Configured = 1,
    /// DMA running; waiting for completion.
    Armed = 2,
    /// Conversion finished; output waiting to be popped.
    Draining = 3,
}

impl PairState {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Configured,
            2 => Self::Armed,
            3 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Atomic [`PairState`] cell.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    const fn new() -> Self {
        Self(AtomicU8::new(PairState::Stopped as u8))
    }

    pub(crate) fn get(&self) -> PairState {
        PairState::from_bits(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: PairState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move `from` → `to` only if the pair is still in `from`.
    pub(crate) fn claim(&self, from: PairState, to: PairState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Lock-protected pair data.
#[derive(Debug, Default)]
pub(crate) struct PairInner {
    /// `true` between `start` and `stop`.
    pub started: bool,
    /// Format in effect, reapplied on resume.
    pub config: Option<PairConfig>,
    /// Persisted output gain.
    pub gain: VolumeGain,
    /// Persisted ramp, applied only once set.
    pub ramp: Option<VolumeRamp>,
    /// Next RX byte `pop` hands out.
    pub read_offset: usize,
    /// Bytes in the armed ring, for streaming pairs.
    pub stream_bytes: usize,
}

/// One pair: static topology, owned DMA memory, lock, completion slot.
pub(crate) struct PairSlot {
    pub id: PairId,
    pub topology: PairTopology,
    pub inner: Mutex<CriticalSectionRawMutex, PairInner>,
    pub state: StateCell,
    /// Completion of the outstanding one-shot transfer.
    pub done: Signal<CriticalSectionRawMutex, Result<usize, Error>>,
    /// Converted bytes not yet popped; written by the interrupt bridge.
    pub readable: AtomicUsize,
    /// Ring periods completed since `arm_stream`.
    pub periods: AtomicU32,
    /// Set when a streaming channel reports a bus error.
    pub stream_fault: AtomicBool,
    pub tx: DmaRegion,
    pub rx: DmaRegion,
    pub tx_table: DmaRegion,
    pub rx_table: DmaRegion,
}

impl PairSlot {
    pub(crate) fn new(
        id: PairId,
        topology: PairTopology,
        buffers: [DmaRegion; 4],
    ) -> Self {
        let [tx, rx, tx_table, rx_table] = buffers;
        Self {
            id,
            topology,
            inner: Mutex::new(PairInner::default()),
            state: StateCell::new(),
            done: Signal::new(),
            readable: AtomicUsize::new(0),
            periods: AtomicU32::new(0),
            stream_fault: AtomicBool::new(false),
            tx,
            rx,
            tx_table,
            rx_table,
        }
    }

    pub(crate) fn is_streaming_path(&self) -> bool {
        self.topology.path != PairPath::M2M
    }
}

/// Snapshot returned by `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairInfo {
    /// Pair index.
    pub pair: PairId,
    /// Input / output wiring.
    pub path: PairPath,
    /// Current lifecycle state.
    pub state: PairState,
    /// `true` between `start` and `stop`.
    pub started: bool,
    /// Channel limit of the pair.
    pub max_channels: ChannelCount,
    /// Configured channel count.
    pub channels: Option<ChannelCount>,
    /// Configured ratio.
    pub ratio: Option<Q22Ratio>,
    /// Configured input width.
    pub src_bitwidth: Option<Bitwidth>,
    /// Configured output width.
    pub dst_bitwidth: Option<Bitwidth>,
    /// Sync mode in effect.
    pub sync_mode: SyncMode,
    /// Persisted output gain.
    pub volume_gain: VolumeGain,
    /// Converted bytes waiting to be popped.
    pub readable: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_succeeds_once() {
        let cell = StateCell::new();
        cell.set(PairState::Armed);
        assert!(cell.claim(PairState::Armed, PairState::Draining));
        assert!(!cell.claim(PairState::Armed, PairState::Stopped));
        assert_eq!(cell.get(), PairState::Draining);
    }

    #[test]
    fn state_round_trips_through_bits() {
        for state in [
            PairState::Stopped,
            PairState::Configured,
            PairState::Armed,
            PairState::Draining,
        ] {
            assert_eq!(PairState::from_bits(state as u8), state);
        }
    }
}
