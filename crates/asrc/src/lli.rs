//! Scatter-gather descriptor chains for the PL080.
//!
//! A transfer is described by up to [`MAX_CHAIN_LEN`] linked-list items
//! ("LLIs"), each moving at most [`MAX_TRANSFER_UNITS`] 32-bit words. The
//! items live in an index-addressed table in DMA memory owned by the pair;
//! item `i` sits at [`descriptor_phys_addr`]`(table, i)` and links to item
//! `i + 1` by bus address.
//!
//! Two modes share the builder:
//!
//! - [`ChainMode::OneShot`]: the last item ends the chain and is the only one
//!   that raises an interrupt. Used by synchronous M2M push.
//! - [`ChainMode::Ring`]: the last item links back to item 0 and every item
//!   raises an interrupt. Used for continuous streaming.
//!
//! Building a chain has no hardware side effects; [`DescriptorChain::write_table`]
//! stores it into the table, and the channel is loaded with item 0 separately.

use platform::pl080::{self, BurstSize, TransferWidth};
use platform::{DmaMemoryError, DmaRegion};

/// Bytes per transfer unit (one 32-bit word).
pub const UNIT_BYTES: usize = 4;

/// Largest transfer count a single item can carry (12-bit field).
pub const MAX_TRANSFER_UNITS: u32 = pl080::CTRL_TRANSFER_SIZE_MASK;

/// Most items in one chain.
pub const MAX_CHAIN_LEN: usize = 32;

/// Most bytes one chain can move.
#[allow(clippy::arithmetic_side_effects)] // Safety: constant, 32 * 4095 * 4
pub const MAX_CHAIN_BYTES: usize = MAX_CHAIN_LEN * MAX_TRANSFER_UNITS as usize * UNIT_BYTES;

/// Bytes of DMA memory a full descriptor table needs.
#[allow(clippy::arithmetic_side_effects)] // Safety: constant, 32 * 16
pub const TABLE_BYTES: usize = MAX_CHAIN_LEN * pl080::LLI_BYTES as usize;

/// How the last item of a chain ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainMode {
    /// Terminate; interrupt on the last item only.
    OneShot,
    /// Link back to item 0; interrupt on every item.
    Ring,
}

/// Which side of the converter a chain feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host memory → input FIFO.
    Tx,
    /// Output FIFO → host memory.
    Rx,
}

/// Why a chain could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainError {
    /// Zero bytes requested.
    Empty,
    /// More bytes than [`MAX_CHAIN_LEN`] items can carry.
    TooLong {
        /// Bytes requested.
        bytes: usize,
        /// Bytes the chain can carry.
        max: usize,
    },
    /// Ring period is zero, unaligned, or larger than one item.
    BadPeriod,
}

/// Addresses a chain is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChainEndpoints {
    /// Bus address of the host-memory buffer.
    pub memory: u32,
    /// Bus address of the FIFO data port.
    pub fifo: u32,
    /// Bus address of descriptor table item 0.
    pub table: u32,
}

/// Per-item control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlFlags {
    /// Transfer width on both sides.
    pub width: TransferWidth,
    /// Advance the source address after each unit.
    pub increment_source: bool,
    /// Advance the destination address after each unit.
    pub increment_destination: bool,
    /// Burst size on both sides.
    pub burst: BurstSize,
    /// Raise the terminal-count interrupt when this item completes.
    pub interrupt_on_completion: bool,
}

impl ControlFlags {
    fn for_direction(direction: Direction, interrupt_on_completion: bool) -> Self {
        Self {
            width: TransferWidth::Word,
            increment_source: direction == Direction::Tx,
            increment_destination: direction == Direction::Rx,
            burst: BurstSize::Four,
            interrupt_on_completion,
        }
    }

    /// PL080 control word for an item of `units` transfers.
    #[must_use]
    pub fn control_word(&self, units: u32) -> u32 {
        let mut word = (units & pl080::CTRL_TRANSFER_SIZE_MASK)
            | ((self.burst as u32) << pl080::CTRL_SB_SIZE_SHIFT)
            | ((self.burst as u32) << pl080::CTRL_DB_SIZE_SHIFT)
            | ((self.width as u32) << pl080::CTRL_S_WIDTH_SHIFT)
            | ((self.width as u32) << pl080::CTRL_D_WIDTH_SHIFT);
        if self.increment_source {
            word |= pl080::CTRL_SI;
        }
        if self.increment_destination {
            word |= pl080::CTRL_DI;
        }
        if self.interrupt_on_completion {
            word |= pl080::CTRL_I;
        }
        word
    }
}

/// One linked-list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Descriptor {
    /// First source bus address.
    pub source: u32,
    /// First destination bus address.
    pub destination: u32,
    /// Transfers in this item (1..=4095).
    pub transfer_units: u32,
    /// Bus address of the next item; `None` ends the chain.
    pub next: Option<u32>,
    /// Width, increment, burst and interrupt flags.
    pub flags: ControlFlags,
}

impl Descriptor {
    /// PL080 control word.
    #[must_use]
    pub fn control_word(&self) -> u32 {
        self.flags.control_word(self.transfer_units)
    }

    /// In-memory layout: source, destination, next, control.
    #[must_use]
    pub fn words(&self) -> [u32; 4] {
        [
            self.source,
            self.destination,
            self.next.unwrap_or(0),
            self.control_word(),
        ]
    }
}

/// Bus address of item `index` in a table starting at `table`.
#[must_use]
// Safety: index < MAX_CHAIN_LEN
#[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
pub fn descriptor_phys_addr(table: u32, index: usize) -> u32 {
    table.wrapping_add(index as u32 * pl080::LLI_BYTES)
}

/// An ordered run of linked descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorChain {
    mode: ChainMode,
    items: heapless::Vec<Descriptor, MAX_CHAIN_LEN>,
}

impl DescriptorChain {
    /// The chain's mode.
    #[must_use]
    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    /// Items in order.
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.items
    }

    /// Item 0, which the channel registers are loaded with.
    #[must_use]
    pub fn first(&self) -> Option<&Descriptor> {
        self.items.first()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if the chain has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all transfer counts.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, d| acc.saturating_add(d.transfer_units))
    }

    /// Store every item into `table` at its index.
    #[allow(clippy::arithmetic_side_effects)] // Safety: i < MAX_CHAIN_LEN
    pub fn write_table(&self, table: &DmaRegion) -> Result<(), DmaMemoryError> {
        for (i, item) in self.items.iter().enumerate() {
            table.write_words(i * pl080::LLI_BYTES as usize, &item.words())?;
        }
        Ok(())
    }
}

/// Chain reading `total_bytes` from memory into the input FIFO.
pub fn build_tx_chain(
    endpoints: &ChainEndpoints,
    total_bytes: usize,
    mode: ChainMode,
) -> Result<DescriptorChain, ChainError> {
    build(Direction::Tx, endpoints, total_bytes, MAX_TRANSFER_UNITS, mode)
}

/// Chain writing up to `total_bytes` from the output FIFO into memory.
pub fn build_rx_chain(
    endpoints: &ChainEndpoints,
    total_bytes: usize,
    mode: ChainMode,
) -> Result<DescriptorChain, ChainError> {
    build(Direction::Rx, endpoints, total_bytes, MAX_TRANSFER_UNITS, mode)
}

/// Ring chain with one item per period, for continuous streaming.
// Safety: periods <= MAX_CHAIN_LEN, period_bytes <= one item
#[allow(clippy::arithmetic_side_effects)]
pub fn build_ring_chain(
    direction: Direction,
    endpoints: &ChainEndpoints,
    period_bytes: usize,
    periods: usize,
) -> Result<DescriptorChain, ChainError> {
    let max_period = MAX_TRANSFER_UNITS as usize * UNIT_BYTES;
    if period_bytes == 0 || period_bytes % UNIT_BYTES != 0 || period_bytes > max_period {
        return Err(ChainError::BadPeriod);
    }
    if periods < 2 || periods > MAX_CHAIN_LEN {
        return Err(ChainError::BadPeriod);
    }
    #[allow(clippy::cast_possible_truncation)] // period_bytes / 4 <= 4095
    let units = (period_bytes / UNIT_BYTES) as u32;
    build(direction, endpoints, period_bytes * periods, units, ChainMode::Ring)
}

// Safety: bounded by MAX_CHAIN_BYTES check
#[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
fn build(
    direction: Direction,
    endpoints: &ChainEndpoints,
    total_bytes: usize,
    chunk_units: u32,
    mode: ChainMode,
) -> Result<DescriptorChain, ChainError> {
    if total_bytes == 0 {
        return Err(ChainError::Empty);
    }
    let max = MAX_CHAIN_LEN * chunk_units as usize * UNIT_BYTES;
    if total_bytes > max {
        return Err(ChainError::TooLong {
            bytes: total_bytes,
            max,
        });
    }

    // A sub-unit tail still needs one whole transfer.
    let mut remaining = total_bytes.div_ceil(UNIT_BYTES) as u32;
    let mut items = heapless::Vec::new();
    let mut offset = 0u32;
    let mut index = 0usize;
    while remaining > 0 {
        let units = remaining.min(chunk_units);
        remaining -= units;
        let last = remaining == 0;
        let memory = endpoints.memory.wrapping_add(offset);
        let (source, destination) = match direction {
            Direction::Tx => (memory, endpoints.fifo),
            Direction::Rx => (endpoints.fifo, memory),
        };
        let next = match (last, mode) {
            (false, _) => Some(descriptor_phys_addr(endpoints.table, index + 1)),
            (true, ChainMode::OneShot) => None,
            (true, ChainMode::Ring) => Some(descriptor_phys_addr(endpoints.table, 0)),
        };
        let interrupt = last || mode == ChainMode::Ring;
        items
            .push(Descriptor {
                source,
                destination,
                transfer_units: units,
                next,
                flags: ControlFlags::for_direction(direction, interrupt),
            })
            .map_err(|_| ChainError::TooLong {
                bytes: total_bytes,
                max,
            })?;
        offset = offset.wrapping_add(units * UNIT_BYTES as u32);
        index += 1;
    }
    Ok(DescriptorChain { mode, items })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    const EP: ChainEndpoints = ChainEndpoints {
        memory: 0x4000_0000,
        fifo: 0x1660_0410,
        table: 0x4010_0000,
    };

    #[test]
    fn small_buffer_is_one_terminated_item() {
        let chain = build_tx_chain(&EP, 1024, ChainMode::OneShot).unwrap();
        assert_eq!(chain.len(), 1);
        let d = chain.first().unwrap();
        assert_eq!(d.transfer_units, 256);
        assert_eq!(d.next, None);
        assert!(d.flags.interrupt_on_completion);
        assert_eq!((d.source, d.destination), (EP.memory, EP.fifo));
    }

    #[test]
    fn large_buffer_splits_at_transfer_limit() {
        let bytes = (MAX_TRANSFER_UNITS as usize * 2 + 10) * UNIT_BYTES;
        let chain = build_tx_chain(&EP, bytes, ChainMode::OneShot).unwrap();
        let units: Vec<u32> = chain.descriptors().iter().map(|d| d.transfer_units).collect();
        assert_eq!(units, [MAX_TRANSFER_UNITS, MAX_TRANSFER_UNITS, 10]);
        assert_eq!(chain.descriptors()[1].source, EP.memory + MAX_TRANSFER_UNITS * 4);
        assert_eq!(chain.descriptors()[0].next, Some(EP.table + 16));
        assert_eq!(chain.descriptors()[1].next, Some(EP.table + 32));
        assert_eq!(chain.descriptors()[2].next, None);
    }

    #[test]
    fn exact_multiple_has_no_trailing_item() {
        let bytes = MAX_TRANSFER_UNITS as usize * 2 * UNIT_BYTES;
        let chain = build_tx_chain(&EP, bytes, ChainMode::OneShot).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.descriptors().iter().all(|d| d.transfer_units > 0));
    }

    #[test]
    fn sub_unit_tail_rounds_up() {
        let chain = build_tx_chain(&EP, 6, ChainMode::OneShot).unwrap();
        assert_eq!(chain.total_units(), 2);
        let chain = build_tx_chain(&EP, 1, ChainMode::OneShot).unwrap();
        assert_eq!(chain.total_units(), 1);
    }

    #[test]
    fn only_last_item_interrupts_in_one_shot() {
        let bytes = MAX_TRANSFER_UNITS as usize * 3 * UNIT_BYTES;
        let chain = build_rx_chain(&EP, bytes, ChainMode::OneShot).unwrap();
        let flags: Vec<bool> = chain
            .descriptors()
            .iter()
            .map(|d| d.flags.interrupt_on_completion)
            .collect();
        assert_eq!(flags, [false, false, true]);
    }

    #[test]
    fn rx_items_mirror_tx() {
        let chain = build_rx_chain(&EP, 64, ChainMode::OneShot).unwrap();
        let d = chain.first().unwrap();
        assert_eq!((d.source, d.destination), (EP.fifo, EP.memory));
        assert!(!d.flags.increment_source);
        assert!(d.flags.increment_destination);
        assert_ne!(d.control_word() & pl080::CTRL_DI, 0);
        assert_eq!(d.control_word() & pl080::CTRL_SI, 0);
    }

    #[test]
    fn ring_wraps_to_first_item_and_interrupts_everywhere() {
        let chain = build_ring_chain(Direction::Tx, &EP, 256, 4).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.mode(), ChainMode::Ring);
        assert_eq!(chain.descriptors()[3].next, Some(EP.table));
        assert!(chain
            .descriptors()
            .iter()
            .all(|d| d.flags.interrupt_on_completion));
        assert_eq!(chain.descriptors()[2].source, EP.memory + 512);
    }

    #[test]
    fn ring_rejects_bad_geometry() {
        assert_eq!(build_ring_chain(Direction::Rx, &EP, 0, 4), Err(ChainError::BadPeriod));
        assert_eq!(build_ring_chain(Direction::Rx, &EP, 6, 4), Err(ChainError::BadPeriod));
        assert_eq!(build_ring_chain(Direction::Rx, &EP, 256, 1), Err(ChainError::BadPeriod));
        assert_eq!(build_ring_chain(Direction::Rx, &EP, 256, 33), Err(ChainError::BadPeriod));
        assert_eq!(
            build_ring_chain(Direction::Rx, &EP, (MAX_TRANSFER_UNITS as usize + 1) * 4, 2),
            Err(ChainError::BadPeriod)
        );
    }

    #[test]
    fn empty_and_oversized_are_rejected() {
        assert_eq!(build_tx_chain(&EP, 0, ChainMode::OneShot), Err(ChainError::Empty));
        assert_eq!(
            build_tx_chain(&EP, MAX_CHAIN_BYTES + 1, ChainMode::OneShot),
            Err(ChainError::TooLong {
                bytes: MAX_CHAIN_BYTES + 1,
                max: MAX_CHAIN_BYTES
            })
        );
    }

    #[test]
    fn control_word_encodes_word_bursts_of_four() {
        let flags = ControlFlags::for_direction(Direction::Tx, true);
        let word = flags.control_word(100);
        assert_eq!(word & pl080::CTRL_TRANSFER_SIZE_MASK, 100);
        assert_eq!((word >> pl080::CTRL_SB_SIZE_SHIFT) & 0x7, BurstSize::Four as u32);
        assert_eq!((word >> pl080::CTRL_D_WIDTH_SHIFT) & 0x7, TransferWidth::Word as u32);
        assert_ne!(word & pl080::CTRL_I, 0);
    }

    #[test]
    fn table_layout_matches_descriptor_addresses() {
        let memory: &'static mut [u8] = vec![0u8; TABLE_BYTES].leak();
        let mut pool = platform::StaticDmaPool::new(memory, EP.table);
        let table = platform::DmaAllocator::allocate(&mut pool, TABLE_BYTES, 16).unwrap();
        let bytes = MAX_TRANSFER_UNITS as usize * 2 * UNIT_BYTES;
        let chain = build_tx_chain(&EP, bytes, ChainMode::OneShot).unwrap();
        chain.write_table(&table).unwrap();
        // Item 0's `next` word points at item 1, whose source word follows.
        let next = table.read_word(8).unwrap();
        assert_eq!(next, descriptor_phys_addr(EP.table, 1));
        let item1_src = table.read_word((next - EP.table) as usize).unwrap();
        assert_eq!(item1_src, EP.memory + MAX_TRANSFER_UNITS * 4);
        assert_eq!(table.read_word(16 + 8).unwrap(), 0);
    }
}
