//! Engine error types.

use platform::{DmaMemoryError, OutOfRangeError};

use crate::lli::ChainError;

/// Ratio outside what the converter core can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeError {
    /// One of the rates was zero.
    #[error("sample rate must be non-zero")]
    ZeroRate,
    /// More than 8x upsampling.
    #[error("ratio exceeds 8x upsampling")]
    UpsampleTooLarge,
    /// More than 7x downsampling.
    #[error("ratio exceeds 7x downsampling")]
    DownsampleTooLarge,
    /// Downsampling on a SoC revision whose converter cannot do it.
    #[error("downsampling is not supported on this SoC revision")]
    DownsampleUnsupported,
}

/// Polling loop that ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HangSite {
    /// TX channel stayed active after halt.
    #[error("TX DMA channel did not go idle")]
    TxHalt,
    /// Input FIFO never reported empty.
    #[error("ASRC input FIFO did not drain")]
    FifoInDrain,
    /// Output FIFO never reported empty.
    #[error("ASRC output FIFO did not drain")]
    FifoOutDrain,
    /// RX channel stayed active after halt.
    #[error("RX DMA channel did not go idle")]
    RxHalt,
}

/// Errors returned by [`AsrcSubsystem`](crate::AsrcSubsystem) operations.
///
/// Configuration errors are returned before any register is touched.
/// Transfer errors (`Timeout`, `HardwareHung`, `DmaBus`) leave the pair in a
/// degraded state; issue `stop` before reconfiguring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Raw pair index outside 0–3.
    #[error("pair {0} does not exist")]
    InvalidPair(u8),
    /// The board configuration declares no such pair.
    #[error("pair is not present in this configuration")]
    PairUnavailable,
    /// Ratio rejected by the range checks.
    #[error("ratio out of range: {0}")]
    RatioOutOfRange(RangeError),
    /// More channels than the pair was declared with.
    #[error("{requested} channels exceed the pair limit of {max}")]
    ChannelOverLimit {
        /// Channels requested.
        requested: u8,
        /// Channels the pair supports.
        max: u8,
    },
    /// `start` on a pair that is not stopped.
    #[error("pair already started")]
    AlreadyStarted,
    /// Operation needs a started pair.
    #[error("pair not started")]
    NotStarted,
    /// Operation not valid in the pair's current state.
    #[error("operation not valid in the current pair state")]
    InvalidState,
    /// Push larger than the TX buffer, or whose worst-case output is larger
    /// than the RX buffer.
    #[error("{len} bytes exceed the buffer capacity of {capacity}")]
    BufferTooLarge {
        /// Bytes offered.
        len: usize,
        /// Buffer capacity.
        capacity: usize,
    },
    /// The converter filled the RX buffer before it consumed all input.
    #[error("converted output overran the {capacity} byte RX buffer")]
    Overflow {
        /// RX buffer capacity.
        capacity: usize,
    },
    /// Completion not signalled within the configured timeout.
    #[error("transfer did not complete in time")]
    Timeout,
    /// A bounded hardware polling loop gave up.
    #[error("hardware hung: {0}")]
    HardwareHung(HangSite),
    /// The DMA controller reported a bus error on one of the pair's channels.
    #[error("DMA bus error")]
    DmaBus,
    /// The pending transfer was cancelled by `stop` or `suspend`.
    #[error("transfer cancelled")]
    Cancelled,
    /// Operation does not apply to the pair's path (M2M vs. streaming).
    #[error("operation not supported on this pair path")]
    UnsupportedPath,
    /// Volume gain outside the documented range.
    #[error("volume gain {} outside {}..={}", .0.value, .0.min, .0.max)]
    VolumeOutOfRange(OutOfRangeError),
    /// Ring geometry the descriptor builder cannot express.
    #[error("invalid stream geometry")]
    InvalidStream,
    /// Board configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// DMA memory allocation or access failed.
    #[error("DMA memory: {0}")]
    DmaMemory(DmaMemoryError),
}

impl From<RangeError> for Error {
    fn from(e: RangeError) -> Self {
        Self::RatioOutOfRange(e)
    }
}

impl From<DmaMemoryError> for Error {
    fn from(e: DmaMemoryError) -> Self {
        Self::DmaMemory(e)
    }
}

impl From<ChainError> for Error {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::TooLong { bytes, max } => Self::BufferTooLarge {
                len: bytes,
                capacity: max,
            },
            ChainError::Empty | ChainError::BadPeriod => Self::InvalidStream,
        }
    }
}
