//! Register-level leaf operations.
//!
//! [`AsrcHw`] and [`Pl080`] own a [`RegisterBus`](platform::RegisterBus) each
//! and expose one method per hardware action: a single write or a single
//! read-modify-write, addressed by explicit pair / channel numbers. No state
//! is kept here; the pair state machine composes these calls.

pub mod asrc;
pub mod pl080;

pub use asrc::{AsrcHw, Route};
pub use pl080::{ChannelSetup, Pl080};

use embassy_time::{block_for, Duration};

use crate::config::PollBudget;
use crate::error::{Error, HangSite};
use crate::fmt::error;

/// Spin until `done` holds, checking at most `budget.attempts` times.
///
/// This is a genuine busy-wait: it runs in interrupt context while the
/// hardware drains, so it must not yield.
pub(crate) fn poll_until(
    budget: PollBudget,
    site: HangSite,
    mut done: impl FnMut() -> bool,
) -> Result<(), Error> {
    for _ in 0..budget.attempts {
        if done() {
            return Ok(());
        }
        block_for(Duration::from_micros(budget.delay_us));
    }
    if done() {
        return Ok(());
    }
    error!("poll budget of {} attempts exhausted: {:?}", budget.attempts, site);
    Err(Error::HardwareHung(site))
}
