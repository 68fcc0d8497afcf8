//! Property-based tests for the ratio calculator and descriptor builder.
//! Verifies invariants hold for ALL valid inputs, not just fixed examples.
#![allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use asrc::lli::{
    build_ring_chain, build_rx_chain, build_tx_chain, descriptor_phys_addr, ChainEndpoints,
    ChainMode, Direction, MAX_CHAIN_BYTES, MAX_CHAIN_LEN, MAX_TRANSFER_UNITS, UNIT_BYTES,
};
use asrc::ratio::{compute_ratio, MAX_RATIO, MIN_RATIO};
use asrc::RangeError;
use proptest::prelude::*;

const EP: ChainEndpoints = ChainEndpoints {
    memory: 0x4000_0000,
    fifo: 0x1660_0410,
    table: 0x4010_0000,
};

proptest! {
    /// An accepted ratio is the nearest Q22 value to dst / src.
    #[test]
    fn ratio_is_nearest_q22(src in 1u32..=400_000, dst in 1u32..=400_000) {
        if let Ok(ratio) = compute_ratio(src, dst) {
            let exact = u128::from(dst) << 22;
            let got = u128::from(ratio.bits()) * u128::from(src);
            let err = exact.abs_diff(got);
            prop_assert!(err * 2 <= u128::from(src), "{} -> {}: {}", src, dst, ratio.bits());
            prop_assert!((MIN_RATIO..=MAX_RATIO).contains(&ratio.bits()));
        }
    }

    /// Ratios inside the hardware window are never refused.
    #[test]
    fn in_window_ratios_are_accepted(src in 8_000u32..=192_000, factor in 0.15f64..=7.9) {
        let dst = (f64::from(src) * factor) as u32;
        prop_assert!(compute_ratio(src, dst).is_ok(), "{} -> {}", src, dst);
    }

    /// Upsampling past 8x is refused.
    #[test]
    fn ratios_above_window_are_refused(src in 8_000u32..=192_000, factor in 8.1f64..=30.0) {
        let dst = (f64::from(src) * factor) as u32;
        prop_assert_eq!(compute_ratio(src, dst), Err(RangeError::UpsampleTooLarge));
    }

    /// Downsampling past 1/7 is refused.
    #[test]
    fn ratios_below_window_are_refused(src in 8_000u32..=192_000, factor in 0.01f64..=0.14) {
        let dst = (f64::from(src) * factor) as u32;
        prop_assert_eq!(compute_ratio(src, dst), Err(RangeError::DownsampleTooLarge));
    }

    /// A one-shot TX chain covers the buffer exactly, in order, with a single
    /// interrupt on the last item.
    #[test]
    fn tx_chain_covers_buffer(bytes in 1usize..=MAX_CHAIN_BYTES) {
        let chain = build_tx_chain(&EP, bytes, ChainMode::OneShot).unwrap();
        let items = chain.descriptors();
        prop_assert!(items.len() <= MAX_CHAIN_LEN);
        prop_assert_eq!(chain.total_units() as usize, bytes.div_ceil(UNIT_BYTES));

        let mut expected_src = EP.memory;
        for (i, d) in items.iter().enumerate() {
            let last = i + 1 == items.len();
            prop_assert!(d.transfer_units > 0 && d.transfer_units <= MAX_TRANSFER_UNITS);
            prop_assert_eq!(d.source, expected_src);
            prop_assert_eq!(d.destination, EP.fifo);
            prop_assert_eq!(d.flags.interrupt_on_completion, last);
            let next = if last { None } else { Some(descriptor_phys_addr(EP.table, i + 1)) };
            prop_assert_eq!(d.next, next);
            expected_src += d.transfer_units * UNIT_BYTES as u32;
        }
    }

    /// RX chains mirror TX chains with the FIFO as source.
    #[test]
    fn rx_chain_writes_to_memory(bytes in 1usize..=MAX_CHAIN_BYTES) {
        let chain = build_rx_chain(&EP, bytes, ChainMode::OneShot).unwrap();
        let first = chain.first().unwrap();
        prop_assert_eq!(first.source, EP.fifo);
        prop_assert_eq!(first.destination, EP.memory);
        prop_assert!(first.flags.increment_destination);
        prop_assert!(!first.flags.increment_source);
    }

    /// Ring chains interrupt every period and loop back to the first item.
    #[test]
    fn ring_chain_loops(
        units in 1usize..=(MAX_TRANSFER_UNITS as usize),
        periods in 2usize..=MAX_CHAIN_LEN,
    ) {
        let period = units * UNIT_BYTES;
        let chain = build_ring_chain(Direction::Rx, &EP, period, periods).unwrap();
        let items = chain.descriptors();
        prop_assert_eq!(items.len(), periods);
        prop_assert!(items.iter().all(|d| d.flags.interrupt_on_completion));
        prop_assert_eq!(items[periods - 1].next, Some(EP.table));
        prop_assert_eq!(items[1].destination, EP.memory + period as u32);
    }

    /// Anything past the chain capacity is refused.
    #[test]
    fn oversized_buffers_are_refused(extra in 1usize..=4096) {
        prop_assert!(build_tx_chain(&EP, MAX_CHAIN_BYTES + extra, ChainMode::OneShot).is_err());
    }
}
