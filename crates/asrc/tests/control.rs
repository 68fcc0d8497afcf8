//! Control-surface dispatch.
// Integration test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//!
//! Run with: cargo test -p asrc --test control

mod common;

use asrc::{AsrcConfig, Error, PairState, RangeError, Request, Response, SocRevision};
use common::{harness, harness_with, stereo16, stereo_ramp, test_config, with_irqs};
use platform::{Bitwidth, ChannelCount, PairPath};

#[tokio::test]
async fn test_unknown_pair_is_rejected() {
    let h = harness();
    assert_eq!(h.asrc.handle(4, Request::GetInfo).await, Err(Error::InvalidPair(4)));
    assert_eq!(h.asrc.handle(255, Request::Stop).await, Err(Error::InvalidPair(255)));
}

#[tokio::test]
async fn test_absent_pair_is_unavailable() {
    let config = AsrcConfig {
        pairs: [test_config().pairs[0], None, None, None],
        ..test_config()
    };
    let h = harness_with(config);
    assert_eq!(h.asrc.handle(2, Request::GetInfo).await, Err(Error::PairUnavailable));
}

/// Start, push, pop, inspect, stop through the request enum.
#[tokio::test]
async fn test_full_cycle_through_requests() {
    let h = harness();
    assert_eq!(
        h.asrc.handle(0, Request::Start(stereo16(48_000, 96_000))).await,
        Ok(Response::Started)
    );

    let input = stereo_ramp(64);
    let pushed = with_irqs(&h, h.asrc.handle(0, Request::PushPcm(&input))).await;
    assert_eq!(pushed, Ok(Response::Pushed(512)));

    let Ok(Response::Info(info)) = h.asrc.handle(0, Request::GetInfo).await else {
        panic!("expected pair info");
    };
    assert_eq!(info.path, PairPath::M2M);
    assert_eq!(info.state, PairState::Draining);
    assert_eq!(info.readable, 512);
    assert_eq!(info.ratio.map(|r| r.bits()), Some(0x0080_0000));

    let mut out = vec![0u8; 512];
    assert_eq!(
        h.asrc.handle(0, Request::PopPcm(&mut out)).await,
        Ok(Response::Popped(512))
    );
    assert_eq!(
        h.asrc.handle(0, Request::SetVolumeGain(0x0020_0000)).await,
        Ok(Response::VolumeUpdated)
    );

    let Ok(Response::Registers(regs)) = h.asrc.handle(0, Request::DumpRegisters).await else {
        panic!("expected register dump");
    };
    let gain = regs.iter().find(|e| e.name == "vol_gain").map(|e| e.value);
    assert_eq!(gain, Some(0x0020_0000));

    assert_eq!(h.asrc.handle(0, Request::Stop).await, Ok(Response::Stopped));
}

/// Configuration errors leave the pair stopped and the hardware untouched.
#[tokio::test]
async fn test_channel_limit_is_enforced() {
    let h = harness();
    let cfg = asrc::PairConfig::from_rates(
        48_000,
        48_000,
        Bitwidth::Bits16,
        ChannelCount::try_new(4).unwrap(),
    )
    .unwrap();
    assert_eq!(
        h.asrc.handle(1, Request::Start(cfg)).await,
        Err(Error::ChannelOverLimit {
            requested: 4,
            max: 2
        })
    );
    assert_eq!(h.asrc.state(common::pair(1)), Ok(PairState::Stopped));
    // Pair 0 takes eight channels.
    assert_eq!(h.asrc.handle(0, Request::Start(cfg)).await, Ok(Response::Started));
}

#[tokio::test]
async fn test_rev0_refuses_downsampling() {
    let h = harness_with(AsrcConfig {
        revision: SocRevision::Rev0,
        ..test_config()
    });
    assert_eq!(
        h.asrc.handle(0, Request::Start(stereo16(96_000, 48_000))).await,
        Err(Error::RatioOutOfRange(RangeError::DownsampleUnsupported))
    );
    assert_eq!(
        h.asrc.handle(0, Request::Start(stereo16(48_000, 96_000))).await,
        Ok(Response::Started)
    );
}
