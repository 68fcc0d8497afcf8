//! Shared harness: an engine wired to the SoC simulator, plus an interrupt
//! pump standing in for the DMA interrupt vector.
#![allow(dead_code, clippy::expect_used)]

use core::convert::Infallible;
use core::future::Future;
use std::time::Duration;

use asrc::{AsrcConfig, AsrcSubsystem, PairConfig, PollBudget};
use embassy_futures::select::{select, Either};
use platform::mocks::{SimBus, SimulatedSoc};
use platform::{Bitwidth, ChannelCount, PairId};

pub type Engine = AsrcSubsystem<SimBus>;

pub struct Harness {
    pub sim: SimulatedSoc,
    pub asrc: Engine,
}

/// Reference board with budgets shrunk so failure paths finish quickly.
pub fn test_config() -> AsrcConfig {
    AsrcConfig {
        completion_timeout_ms: 50,
        poll: PollBudget {
            attempts: 8,
            delay_us: 1,
        },
        drain_settle_us: 0,
        ..AsrcConfig::tcc803x()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: AsrcConfig) -> Harness {
    init_logging();
    let mut sim = SimulatedSoc::new(config.registers, config.asrc_phys_base);
    let (asrc_bus, dma_bus) = (sim.asrc_bus(), sim.dma_bus());
    let asrc = AsrcSubsystem::new(config, asrc_bus, dma_bus, &mut sim)
        .expect("engine construction should succeed");
    Harness { sim, asrc }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn pair(index: u8) -> PairId {
    PairId::try_new(index).expect("pair index in range")
}

/// 16-bit stereo at the given rates.
pub fn stereo16(src_hz: u32, dst_hz: u32) -> PairConfig {
    PairConfig::from_rates(src_hz, dst_hz, Bitwidth::Bits16, ChannelCount::STEREO)
        .expect("rates in range")
}

/// Interleaved stereo ramp: frame `i` holds `(i, -i)`.
pub fn stereo_ramp(frames: usize) -> Vec<u8> {
    (0..frames)
        .flat_map(|i| {
            let left = i16::try_from(i % 0x7FFF).unwrap_or(0);
            let mut frame = left.to_le_bytes().to_vec();
            frame.extend_from_slice(&left.wrapping_neg().to_le_bytes());
            frame
        })
        .collect()
}

/// Run `fut` while servicing simulated DMA interrupts.
pub async fn with_irqs<F: Future>(h: &Harness, fut: F) -> F::Output {
    match select(fut, irq_pump(h)).await {
        Either::First(out) => out,
        Either::Second(never) => match never {},
    }
}

async fn irq_pump(h: &Harness) -> Infallible {
    loop {
        if h.sim.irq_pending() {
            h.asrc.handle_dma_interrupt();
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
