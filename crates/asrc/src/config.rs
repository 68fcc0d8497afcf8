//! Board and pair configuration.
//!
//! [`AsrcConfig`] describes the hardware once, at start-up: where the blocks
//! live, which pairs exist and how they are wired, how large their buffers
//! are, and how long the engine waits on hardware. [`PairConfig`] is the
//! per-stream format a caller passes to `start`.

use platform::asrc_regs::AsrcRegisterMap;
use platform::{Bitwidth, ChannelCount, PairId, PairPath, Q22Ratio, SyncMode};

use crate::error::Error;
use crate::lli::{MAX_CHAIN_BYTES, UNIT_BYTES};
use crate::ratio;

/// SoC revision, where it changes converter behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocRevision {
    /// First silicon: converter output is corrupted for ratios below 1.0, so
    /// downsampling is refused.
    Rev0,
    /// Later silicon, full ratio range.
    #[default]
    Rev1,
}

impl SocRevision {
    /// `true` when the converter cannot downsample.
    #[must_use]
    pub fn forbids_downsampling(self) -> bool {
        matches!(self, Self::Rev0)
    }
}

/// Bound on a hardware polling loop: check `attempts` times, waiting
/// `delay_us` microseconds between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollBudget {
    /// Number of checks before giving up.
    pub attempts: u32,
    /// Busy-wait between checks, in microseconds.
    pub delay_us: u64,
}

/// Static description of one pair, fixed by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairTopology {
    /// Where input comes from and output goes to.
    pub path: PairPath,
    /// Most channels this pair may be configured with.
    pub max_channels: ChannelCount,
    /// Rate-tracking mode used when a [`PairConfig`] does not pick one.
    pub sync_mode: SyncMode,
}

/// Subsystem configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AsrcConfig {
    /// Bus address of the ASRC register block (FIFO data ports are DMA targets).
    pub asrc_phys_base: u32,
    /// SoC-specific ASRC register offsets.
    pub registers: AsrcRegisterMap,
    /// Per-pair topology; `None` leaves the pair unused.
    pub pairs: [Option<PairTopology>; PairId::COUNT],
    /// TX (memory → converter) buffer bytes per pair.
    pub tx_buffer_bytes: usize,
    /// RX (converter → memory) buffer bytes per pair. Pushes whose
    /// worst-case output does not fit are refused.
    pub rx_buffer_bytes: usize,
    /// How long `push` waits for the completion interrupt.
    pub completion_timeout_ms: u64,
    /// Bound on every halt / drain polling loop.
    pub poll: PollBudget,
    /// Settle delay after each FIFO drain check, in microseconds.
    pub drain_settle_us: u64,
    /// Silicon revision.
    pub revision: SocRevision,
    /// FIFO DMA request threshold, in words.
    pub fifo_threshold: u8,
}

impl AsrcConfig {
    /// Reference profile for the TCC803x evaluation board: two M2M pairs,
    /// one playback pair feeding the audio port and one capture pair.
    #[must_use]
    pub const fn tcc803x() -> Self {
        Self {
            asrc_phys_base: 0x1660_0000,
            registers: AsrcRegisterMap::TCC803X,
            pairs: [
                Some(PairTopology {
                    path: PairPath::M2M,
                    max_channels: ChannelCount::MAX,
                    sync_mode: SyncMode::Sync,
                }),
                Some(PairTopology {
                    path: PairPath::M2M,
                    max_channels: ChannelCount::STEREO,
                    sync_mode: SyncMode::Sync,
                }),
                Some(PairTopology {
                    path: PairPath::MemoryToPeripheral,
                    max_channels: ChannelCount::STEREO,
                    sync_mode: SyncMode::Async(platform::ClockSource::Port0),
                }),
                Some(PairTopology {
                    path: PairPath::PeripheralToMemory,
                    max_channels: ChannelCount::STEREO,
                    sync_mode: SyncMode::Async(platform::ClockSource::Port1),
                }),
            ],
            tx_buffer_bytes: 16 * 1024,
            // A full TX buffer at 8x, widened from 16 to 24 bit, plus priming.
            rx_buffer_bytes: 272 * 1024,
            completion_timeout_ms: 1000,
            poll: PollBudget {
                attempts: 1000,
                delay_us: 1,
            },
            drain_settle_us: 10,
            revision: SocRevision::Rev1,
            fifo_threshold: 4,
        }
    }

    /// Topology of `pair`, if the board declares it.
    #[must_use]
    pub fn topology(&self, pair: PairId) -> Option<PairTopology> {
        self.pairs.get(pair.index()).copied().flatten()
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), Error> {
        for bytes in [self.tx_buffer_bytes, self.rx_buffer_bytes] {
            if bytes == 0 || bytes % UNIT_BYTES != 0 {
                return Err(Error::InvalidConfig("buffer size must be a non-zero multiple of 4"));
            }
            if bytes > MAX_CHAIN_BYTES {
                return Err(Error::InvalidConfig("buffer exceeds the longest descriptor chain"));
            }
        }
        if self.poll.attempts == 0 {
            return Err(Error::InvalidConfig("poll budget needs at least one attempt"));
        }
        if self.completion_timeout_ms == 0 {
            return Err(Error::InvalidConfig("completion timeout must be non-zero"));
        }
        if self.pairs.iter().all(Option::is_none) {
            return Err(Error::InvalidConfig("no pairs declared"));
        }
        Ok(())
    }
}

impl Default for AsrcConfig {
    fn default() -> Self {
        Self::tcc803x()
    }
}

/// Stream format of one pair, supplied to `start` / `configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairConfig {
    /// Rate-tracking mode; `None` uses the pair's topology default.
    pub sync_mode: Option<SyncMode>,
    /// Input sample width.
    pub src_bitwidth: Bitwidth,
    /// Output sample width.
    pub dst_bitwidth: Bitwidth,
    /// Interleaved channels on both sides.
    pub channels: ChannelCount,
    /// Output/input rate ratio.
    pub ratio: Q22Ratio,
}

impl PairConfig {
    /// Same-width format converting `src_hz` to `dst_hz`.
    pub fn from_rates(
        src_hz: u32,
        dst_hz: u32,
        bitwidth: Bitwidth,
        channels: ChannelCount,
    ) -> Result<Self, Error> {
        Ok(Self {
            sync_mode: None,
            src_bitwidth: bitwidth,
            dst_bitwidth: bitwidth,
            channels,
            ratio: ratio::compute_ratio(src_hz, dst_hz)?,
        })
    }

    /// Upper bound on the bytes the converter writes for `input_bytes` of
    /// input, counting the zero-fill priming frames.
    #[must_use]
    pub fn max_output_bytes(&self, input_bytes: usize) -> usize {
        let channels = u64::from(self.channels.get());
        let in_frame = container(self.src_bitwidth).saturating_mul(channels);
        let out_frame = container(self.dst_bitwidth).saturating_mul(channels);
        let in_frames = u64::try_from(input_bytes)
            .unwrap_or(u64::MAX)
            .div_ceil(in_frame.max(1));
        let frames = in_frames.saturating_add(u64::from(ratio::zero_init_size(self.ratio)));
        let out_frames = frames
            .saturating_mul(u64::from(self.ratio.bits()))
            .div_ceil(u64::from(Q22Ratio::UNITY.bits()));
        usize::try_from(out_frames.saturating_mul(out_frame)).unwrap_or(usize::MAX)
    }
}

fn container(width: Bitwidth) -> u64 {
    u64::try_from(width.container_bytes()).unwrap_or(u64::MAX)
}
