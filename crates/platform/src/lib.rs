//! Hardware Abstraction Layer (HAL) for the ASRC memory-to-memory data path
//!
//! This crate provides the hardware-facing building blocks the `asrc` engine is
//! composed from, so the engine can be developed and tested without the SoC.
//!
//! # Architecture Layers
//!
//! ```text
//! Control surface (asrc::control)
//!         ↓
//! Engine (asrc: ratio, descriptor builder, pair state machine, IRQ bridge)
//!         ↓
//! Platform HAL (this crate - register bus, DMA memory, register maps)
//!         ↓
//! Hardware Layer (MMIO) / SoC simulator (mocks)
//! ```
//!
//! # Modules
//!
//! - [`bus`] - 32-bit register window access ([`RegisterBus`], [`MmioBus`])
//! - [`dma_memory`] - DMA-coherent regions and the allocator that hands them out
//! - [`asrc_types`] - validated ASRC domain newtypes (ratio, gain, ramp, ...)
//! - [`pl080`] - PL080 DMA controller register map
//! - [`asrc_regs`] - ASRC block register map (SoC-revision specific offsets)
//! - `mocks` - host-side SoC simulator (`std` feature or tests)
//!
//! # Features
//!
//! - `std`: Enable standard library support and the SoC simulator
//! - `defmt`: Enable `defmt::Format` derives on all platform types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(feature = "std")]
extern crate std;

pub mod asrc_regs;
pub mod asrc_types;
pub mod bus;
pub mod dma_memory;
pub mod pl080;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export the register bus
pub use bus::{MmioBus, RegisterBus};

// Re-export DMA memory types
pub use dma_memory::{DmaAllocator, DmaMemoryError, DmaRegion, StaticDmaPool};

// Re-export ASRC domain types
pub use asrc_types::{
    Bitwidth, ChannelCount, ClockSource, OutOfRangeError, PairId, PairPath, Q22Ratio, RampTime,
    SyncMode, VolumeGain, VolumeRamp,
};
