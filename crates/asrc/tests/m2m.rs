//! Memory-to-memory conversion through the simulated SoC.
// Integration test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
//!
//! Run with: cargo test -p asrc --test m2m

mod common;

use std::time::Duration;

use asrc::ratio::MAX_RATIO;
use asrc::{AsrcConfig, Error, HangSite, PairConfig, PairState};
use common::{harness, harness_with, pair, stereo16, stereo_ramp, test_config, with_irqs};
use embassy_futures::join::join;
use platform::asrc_regs::{PAIR_RATIO, PAIR_ZERO_INIT};
use platform::{Bitwidth, ChannelCount, Q22Ratio, RegisterBus};

/// 16-bit stereo in, 24-bit stereo out, at the largest upsampling ratio.
fn widening_max_ratio() -> PairConfig {
    PairConfig {
        sync_mode: None,
        src_bitwidth: Bitwidth::Bits16,
        dst_bitwidth: Bitwidth::Bits24,
        channels: ChannelCount::STEREO,
        ratio: Q22Ratio::from_bits(MAX_RATIO).unwrap(),
    }
}

/// 256 stereo frames doubled in rate come back as 512 frames.
#[tokio::test]
async fn test_push_pop_doubles_rate() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 96_000)).await.unwrap();
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));

    let input = stereo_ramp(256);
    assert_eq!(input.len(), 1024);
    let produced = with_irqs(&h, h.asrc.push(p, &input)).await;
    assert_eq!(produced, Ok(2048));
    assert_eq!(h.asrc.state(p), Ok(PairState::Draining));

    let mut out = vec![0u8; 4096];
    let n = h.asrc.pop(p, &mut out).await.unwrap();
    assert_eq!(n, 2048);
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));

    // Sample-and-hold: output frame j repeats input frame j / 2.
    for j in [0usize, 1, 2, 3, 100, 511] {
        let left = i16::from_le_bytes([out[j * 4], out[j * 4 + 1]]);
        assert_eq!(left, i16::try_from(j / 2).unwrap(), "frame {j}");
    }
}

/// Ratio and zero-fill size are programmed from the configured rates.
#[tokio::test]
async fn test_start_programs_ratio_and_priming() {
    let h = harness();
    let p = pair(1);
    h.asrc.start(p, &stereo16(44_100, 48_000)).await.unwrap();
    let map = h.asrc.config().registers;
    assert_eq!(h.sim.asrc_reg(map.pair_reg(p, PAIR_RATIO)), 4_565_229);
    assert_eq!(h.sim.asrc_reg(map.pair_reg(p, PAIR_ZERO_INIT)), 32);

    h.asrc.configure(p, &stereo16(96_000, 48_000)).await.unwrap();
    assert_eq!(h.sim.asrc_reg(map.pair_reg(p, PAIR_RATIO)), 0x0020_0000);
    assert_eq!(h.sim.asrc_reg(map.pair_reg(p, PAIR_ZERO_INIT)), 64);
}

/// Downsampling by two halves the output.
#[tokio::test]
async fn test_downsampling_halves_output() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(96_000, 48_000)).await.unwrap();
    let produced = with_irqs(&h, h.asrc.push(p, &stereo_ramp(400))).await;
    assert_eq!(produced, Ok(800));
}

/// Pops smaller than the output hand it out in order.
#[tokio::test]
async fn test_partial_pops_drain_in_order() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    let input = stereo_ramp(300);
    assert_eq!(with_irqs(&h, h.asrc.push(p, &input)).await, Ok(1200));

    let mut first = vec![0u8; 1000];
    assert_eq!(h.asrc.pop(p, &mut first).await, Ok(1000));
    assert_eq!(h.asrc.state(p), Ok(PairState::Draining));
    let mut rest = vec![0u8; 1000];
    assert_eq!(h.asrc.pop(p, &mut rest).await, Ok(200));
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));

    first.extend_from_slice(&rest[..200]);
    assert_eq!(first, input, "unity ratio copies the input");
    assert_eq!(h.asrc.pop(p, &mut rest).await, Err(Error::InvalidState));
}

/// A second push on the same pair waits for the first to finish, then finds
/// its output unread.
#[tokio::test]
async fn test_same_pair_pushes_are_serialised() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 96_000)).await.unwrap();
    let first = stereo_ramp(64);
    let second = vec![0x55u8; 256];
    let (r1, r2) = with_irqs(&h, join(h.asrc.push(p, &first), h.asrc.push(p, &second))).await;
    assert_eq!(r1, Ok(512));
    assert_eq!(r2, Err(Error::InvalidState));
    assert_eq!(h.sim.conversions(), 1);
    assert_eq!(h.asrc.state(p), Ok(PairState::Draining));

    let mut out = vec![0u8; 512];
    assert_eq!(h.asrc.pop(p, &mut out).await, Ok(512));
    let expected: Vec<u8> = first.chunks(4).flat_map(|f| [f, f].concat()).collect();
    assert_eq!(out, expected);
}

/// Both M2M pairs convert at the same time.
#[tokio::test]
async fn test_pairs_convert_concurrently() {
    let h = harness();
    let (a, b) = (pair(0), pair(1));
    h.asrc.start(a, &stereo16(48_000, 96_000)).await.unwrap();
    h.asrc.start(b, &stereo16(48_000, 48_000)).await.unwrap();
    let input = stereo_ramp(128);
    let (ra, rb) = with_irqs(&h, join(h.asrc.push(a, &input), h.asrc.push(b, &input))).await;
    assert_eq!(ra, Ok(1024));
    assert_eq!(rb, Ok(512));
    assert_eq!(h.sim.conversions(), 2);
}

/// An odd-length push is padded to a whole word.
#[tokio::test]
async fn test_unaligned_push_is_padded() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    let mut input = stereo_ramp(4);
    input.push(0x7F);
    assert_eq!(with_irqs(&h, h.asrc.push(p, &input)).await, Ok(20));
}

#[tokio::test]
async fn test_empty_push_returns_zero() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    assert_eq!(h.asrc.push(p, &[]).await, Ok(0));
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));
    assert_eq!(h.sim.conversions(), 0);
}

// ── Lifecycle errors ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_push_before_start_is_rejected() {
    let h = harness();
    assert_eq!(h.asrc.push(pair(0), &[0; 16]).await, Err(Error::NotStarted));
    let mut out = [0u8; 16];
    assert_eq!(h.asrc.pop(pair(0), &mut out).await, Err(Error::NotStarted));
}

#[tokio::test]
async fn test_pop_before_push_is_rejected() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    let mut out = [0u8; 16];
    assert_eq!(h.asrc.pop(p, &mut out).await, Err(Error::InvalidState));
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let h = harness();
    let p = pair(0);
    let cfg = stereo16(48_000, 48_000);
    h.asrc.start(p, &cfg).await.unwrap();
    assert_eq!(h.asrc.start(p, &cfg).await, Err(Error::AlreadyStarted));
}

/// Stop is accepted in every state, including twice in a row.
#[tokio::test]
async fn test_stop_is_idempotent() {
    let h = harness();
    let p = pair(0);
    assert_eq!(h.asrc.stop(p).await, Ok(()));
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    with_irqs(&h, h.asrc.push(p, &stereo_ramp(16))).await.unwrap();
    assert_eq!(h.asrc.state(p), Ok(PairState::Draining));
    assert_eq!(h.asrc.stop(p).await, Ok(()));
    assert_eq!(h.asrc.stop(p).await, Ok(()));
    assert_eq!(h.asrc.state(p), Ok(PairState::Stopped));
    let info = h.asrc.info(p).await.unwrap();
    assert_eq!(info.readable, 0);
    assert!(!info.started);
}

#[tokio::test]
async fn test_oversized_push_is_rejected() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    let capacity = h.asrc.config().tx_buffer_bytes;
    let input = vec![0u8; capacity + 4];
    assert_eq!(
        h.asrc.push(p, &input).await,
        Err(Error::BufferTooLarge {
            len: capacity + 4,
            capacity
        })
    );
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));
}

/// A push whose worst-case output would not fit the RX buffer is refused
/// before any hardware is touched.
#[tokio::test]
async fn test_push_refused_when_output_cannot_fit() {
    let h = harness_with(AsrcConfig {
        rx_buffer_bytes: 64 * 1024,
        ..test_config()
    });
    let p = pair(0);
    h.asrc.start(p, &widening_max_ratio()).await.unwrap();
    assert_eq!(
        h.asrc.push(p, &vec![0u8; 16 * 1024]).await,
        Err(Error::BufferTooLarge {
            len: 264_192,
            capacity: 64 * 1024
        })
    );
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));
    assert_eq!(h.sim.conversions(), 0);
}

/// A full TX buffer at 8x with 16 to 24 bit widening converts in one piece
/// on the reference board.
#[tokio::test]
async fn test_full_push_at_max_upsampling_is_not_truncated() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &widening_max_ratio()).await.unwrap();
    let input = stereo_ramp(4096);
    assert_eq!(input.len(), h.asrc.config().tx_buffer_bytes);
    assert_eq!(with_irqs(&h, h.asrc.push(p, &input)).await, Ok(262_144));

    let mut out = vec![0u8; 300 * 1024];
    assert_eq!(h.asrc.pop(p, &mut out).await, Ok(262_144));
    // Last output frame holds the last input frame, widened.
    let last = i32::from_le_bytes([out[262_136], out[262_137], out[262_138], out[262_139]]);
    assert_eq!(last, 4095 << 8);
}

/// RX filling up before TX drains ends the push with `Overflow` instead of
/// a short count, and the pair recovers.
#[tokio::test]
async fn test_rx_overrun_is_reported() {
    let h = harness_with(AsrcConfig {
        rx_buffer_bytes: 4096,
        ..test_config()
    });
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    // The converter runs at 8x while the engine sized the push for unity.
    let ratio_reg = h.asrc.config().registers.pair_reg(p, PAIR_RATIO);
    h.sim.asrc_bus().write(ratio_reg, MAX_RATIO);
    assert_eq!(
        with_irqs(&h, h.asrc.push(p, &stereo_ramp(256))).await,
        Err(Error::Overflow { capacity: 4096 })
    );
    assert_eq!(h.asrc.state(p), Ok(PairState::Armed));
    assert!(!h.sim.irq_pending());

    h.sim.asrc_bus().write(ratio_reg, Q22Ratio::UNITY.bits());
    assert_eq!(with_irqs(&h, h.asrc.push(p, &stereo_ramp(256))).await, Ok(1024));
}

#[tokio::test]
async fn test_streaming_pairs_refuse_push() {
    let h = harness();
    let p = pair(2);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    assert_eq!(h.asrc.push(p, &[0; 16]).await, Err(Error::UnsupportedPath));
}

// ── Failure paths ────────────────────────────────────────────────────────────

/// No completion: push times out, the pair stays armed, the next push
/// recovers it.
#[tokio::test]
async fn test_timeout_then_recovery() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.sim.set_suppress_completion(true);
    assert_eq!(
        with_irqs(&h, h.asrc.push(p, &stereo_ramp(64))).await,
        Err(Error::Timeout)
    );
    assert_eq!(h.asrc.state(p), Ok(PairState::Armed));

    h.sim.set_suppress_completion(false);
    assert_eq!(with_irqs(&h, h.asrc.push(p, &stereo_ramp(64))).await, Ok(256));
}

/// A completion that arrives after its push timed out is delivered as
/// output to pop, never as the result of the next push.
#[tokio::test]
async fn test_late_completion_is_not_handed_to_next_push() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.sim.set_suppress_completion(true);
    let stale = stereo_ramp(64);
    assert_eq!(
        with_irqs(&h, h.asrc.push(p, &stale)).await,
        Err(Error::Timeout)
    );
    h.sim.set_suppress_completion(false);

    h.sim.release_completion(p);
    h.asrc.handle_dma_interrupt();
    assert_eq!(h.asrc.state(p), Ok(PairState::Draining));
    assert_eq!(h.asrc.push(p, &stereo_ramp(32)).await, Err(Error::InvalidState));

    let mut out = vec![0u8; 256];
    assert_eq!(h.asrc.pop(p, &mut out).await, Ok(256));
    assert_eq!(out, stale);
    assert_eq!(with_irqs(&h, h.asrc.push(p, &stereo_ramp(32))).await, Ok(128));
}

/// A TX channel that never goes idle ends the drain with a hang report.
#[tokio::test]
async fn test_stuck_channel_reports_hang() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.sim.set_stuck_active(p.tx_channel(), true);
    assert_eq!(
        with_irqs(&h, h.asrc.push(p, &stereo_ramp(64))).await,
        Err(Error::HardwareHung(HangSite::TxHalt))
    );
    assert_eq!(h.asrc.state(p), Ok(PairState::Armed));

    // Stop still completes, and the pair is usable after a restart.
    assert_eq!(h.asrc.stop(p).await, Ok(()));
    h.sim.set_stuck_active(p.tx_channel(), false);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    assert_eq!(with_irqs(&h, h.asrc.push(p, &stereo_ramp(64))).await, Ok(256));
}

#[tokio::test]
async fn test_undrained_fifo_reports_hang() {
    let h = harness();
    let p = pair(1);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.sim.set_stuck_fifo(true);
    assert_eq!(
        with_irqs(&h, h.asrc.push(p, &stereo_ramp(64))).await,
        Err(Error::HardwareHung(HangSite::FifoInDrain))
    );
    h.sim.set_stuck_fifo(false);
}

/// A bus error completes the push with `DmaBus`; the pair re-arms cleanly.
#[tokio::test]
async fn test_bus_error_is_reported() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.sim.set_bus_error(p.tx_channel(), true);
    assert_eq!(
        with_irqs(&h, h.asrc.push(p, &stereo_ramp(64))).await,
        Err(Error::DmaBus)
    );
    h.sim.set_bus_error(p.tx_channel(), false);
    assert_eq!(with_irqs(&h, h.asrc.push(p, &stereo_ramp(64))).await, Ok(256));
}

/// Stop while a push is waiting cancels it.
#[tokio::test]
async fn test_stop_cancels_pending_push() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.sim.set_suppress_completion(true);
    let input = stereo_ramp(64);
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.asrc.stop(p).await
    };
    let (pushed, stopped) = join(h.asrc.push(p, &input), stopper).await;
    assert_eq!(pushed, Err(Error::Cancelled));
    assert_eq!(stopped, Ok(()));
    assert_eq!(h.asrc.state(p), Ok(PairState::Stopped));
}

/// Interrupts with nothing pending, or for an idle pair, change nothing.
#[tokio::test]
async fn test_spurious_interrupts_are_ignored() {
    let h = harness();
    let p = pair(0);
    h.asrc.start(p, &stereo16(48_000, 48_000)).await.unwrap();
    h.asrc.handle_dma_interrupt();
    assert_eq!(h.asrc.state(p), Ok(PairState::Configured));
}
