//! ASRC memory-to-memory data path
//!
//! Drives the hardware asynchronous sample-rate converter of a TCC803x-class
//! SoC through its PL080 DMA controller. Up to four converter pairs run
//! independently; each takes PCM from memory, converts it by a Q22 rate
//! ratio and writes the result back to memory (or, on peripheral pairs,
//! streams to and from an audio interface through a DMA ring).
//!
//! ```text
//!   push(pcm) ─► TX buffer ─DMA─► FIFO in ─► converter ─► FIFO out ─DMA─► RX buffer ─► pop()
//!                                                               │
//!                                DMA TC interrupt ─► handle_dma_interrupt ─► push returns
//! ```
//!
//! # Modules
//!
//! - [`ratio`] - Q22 ratio and zero-fill priming
//! - [`lli`] - PL080 linked-list descriptor chains
//! - [`hw`] - register-level leaf operations
//! - [`subsystem`] - pair lifecycle, push / pop, volume, streaming, power
//! - `irq` - completion bridge ([`AsrcSubsystem::handle_dma_interrupt`])
//! - [`control`] - request dispatch for the user-facing control channel
//! - [`dump`] - register snapshots
//!
//! # Features
//!
//! - `defmt`: log through defmt (hardware builds)
//! - `tracing`: log through tracing (host builds)
//! - `std`: `std::error::Error` impls

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

mod fmt;

pub mod config;
pub mod control;
pub mod dump;
pub mod error;
pub mod hw;
mod irq;
pub mod lli;
pub mod pair;
pub mod ratio;
pub mod subsystem;

pub use config::{AsrcConfig, PairConfig, PairTopology, PollBudget, SocRevision};
pub use control::{Request, Response};
pub use dump::{RegisterBlock, RegisterDump, RegisterEntry};
pub use error::{Error, HangSite, RangeError};
pub use pair::{PairInfo, PairState};
pub use subsystem::AsrcSubsystem;
