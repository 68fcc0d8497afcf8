//! Suspend / resume.
// Integration test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//!
//! Run with: cargo test -p asrc --test power

mod common;

use std::time::Duration;

use asrc::{Error, PairState};
use common::{harness, pair, stereo16, stereo_ramp, with_irqs};
use embassy_futures::join::join;
use platform::asrc_regs::PAIR_RATIO;
use platform::pl080;

/// Suspend drops unread output and parks the controller; resume
/// reprograms the pair and it converts again.
#[tokio::test]
async fn test_suspend_resume_cycle() {
    let h = harness();
    let p = pair(0);
    let ratio_reg = h.asrc.config().registers.pair_reg(p, PAIR_RATIO);
    h.asrc.start(p, &stereo16(48_000, 96_000)).await.unwrap();
    with_irqs(&h, h.asrc.push(p, &stereo_ramp(32))).await.unwrap();
    assert_eq!(h.asrc.state(p), Ok(PairState::Draining));

    h.asrc.suspend().await;
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));
    assert_eq!(h.asrc.info(p).await.unwrap().readable, 0);
    assert_eq!(h.sim.dma_reg(pl080::CONFIGURATION) & pl080::CONFIGURATION_E, 0);

    h.asrc.resume().await.unwrap();
    assert_ne!(h.sim.dma_reg(pl080::CONFIGURATION) & pl080::CONFIGURATION_E, 0);
    assert_eq!(h.sim.asrc_writes(ratio_reg), [0x0080_0000, 0x0080_0000]);
    assert_eq!(with_irqs(&h, h.asrc.push(p, &stereo_ramp(32))).await, Ok(256));
}

/// A push waiting at suspend time completes with `Cancelled`.
#[tokio::test]
async fn test_suspend_cancels_pending_push() {
    let h = harness();
    let p = pair(1);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.sim.set_suppress_completion(true);
    let input = stereo_ramp(64);
    let suspender = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.asrc.suspend().await;
    };
    let (pushed, ()) = join(h.asrc.push(p, &input), suspender).await;
    assert_eq!(pushed, Err(Error::Cancelled));
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));
}

/// Pairs that were never started are left alone.
#[tokio::test]
async fn test_resume_skips_stopped_pairs() {
    let h = harness();
    let p = pair(1);
    let ratio_reg = h.asrc.config().registers.pair_reg(p, PAIR_RATIO);
    h.asrc.suspend().await;
    h.asrc.resume().await.unwrap();
    assert_eq!(h.asrc.state(p), Ok(PairState::Stopped));
    assert!(h.sim.asrc_writes(ratio_reg).is_empty());
}
