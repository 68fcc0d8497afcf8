//! DMA-coherent memory regions.
//!
//! The DMA controller addresses memory by *physical* address, the CPU by
//! pointer. A [`DmaRegion`] carries both views of one contiguous block so the
//! descriptor builder can compute bus addresses while the engine copies PCM
//! data in and out through the CPU view.
//!
//! Regions are handed out once at start-up by a [`DmaAllocator`] and live for
//! the lifetime of the program; the engine never frees or reallocates them.
//!
//! ## Placement
//!
//! The memory behind a [`StaticDmaPool`] must be reachable by the DMA master
//! and must not be cached (or must be covered by an MPU region configured as
//! non-cacheable). Placing the pool in tightly-coupled memory that the DMA
//! controller cannot see causes silent data corruption.
//!
//! ```rust
//! use platform::dma_memory::{DmaAllocator, StaticDmaPool};
//!
//! static mut POOL: [u8; 4096] = [0; 4096];
//!
//! // Safety: POOL is only handed out once, here.
//! let memory: &'static mut [u8] = unsafe { &mut *core::ptr::addr_of_mut!(POOL) };
//! let mut pool = StaticDmaPool::new(memory, 0x2000_0000);
//! let region = pool.allocate(1024, 32).unwrap();
//! assert_eq!(region.phys_addr(), 0x2000_0000);
//! ```

use core::ptr::NonNull;
use core::sync::atomic::{compiler_fence, Ordering};

/// Errors produced by DMA memory allocation and region access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaMemoryError {
    /// The pool cannot satisfy an allocation of `requested` bytes.
    OutOfMemory {
        /// Bytes requested (including alignment padding).
        requested: usize,
        /// Bytes still free in the pool.
        available: usize,
    },
    /// Alignment is zero or not a power of two.
    BadAlignment,
    /// An access touched bytes outside the region.
    OutOfBounds {
        /// First byte of the access.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Region capacity.
        capacity: usize,
    },
}

impl core::fmt::Display for DmaMemoryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                available,
            } => write!(f, "DMA pool exhausted: {requested} bytes requested, {available} free"),
            Self::BadAlignment => write!(f, "DMA alignment must be a non-zero power of two"),
            Self::OutOfBounds {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "DMA region access {offset}+{len} exceeds capacity {capacity}"
            ),
        }
    }
}

/// One contiguous, DMA-reachable block of memory.
///
/// Data is copied in and out through `&self`: the same bytes are also written
/// by the DMA controller behind the CPU's back, so the region behaves like a
/// shared device buffer rather than an exclusively borrowed slice. The engine
/// serialises CPU access per pair and only touches a region while its DMA
/// channels are idle.
#[derive(Debug)]
pub struct DmaRegion {
    ptr: NonNull<u8>,
    phys: u32,
    len: usize,
}

// Safety: a region is device-shared memory with a 'static lifetime; access
// ordering is the owner's responsibility (see type docs).
unsafe impl Send for DmaRegion {}
// Safety: as above.
unsafe impl Sync for DmaRegion {}

impl DmaRegion {
    /// Build a region from its CPU pointer and bus address.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for the rest of
    /// the program, no other Rust reference may alias that memory, and `phys`
    /// must be the address the DMA controller uses for `ptr`.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, phys: u32, len: usize) -> Self {
        Self { ptr, phys, len }
    }

    /// Bus (physical) address of the first byte.
    pub fn phys_addr(&self) -> u32 {
        self.phys
    }

    /// Capacity in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` for a zero-length region.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bus address of the byte at `offset`, if it lies inside the region.
    pub fn phys_at(&self, offset: usize) -> Option<u32> {
        if offset > self.len {
            return None;
        }
        u32::try_from(offset)
            .ok()
            .and_then(|offset| self.phys.checked_add(offset))
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), DmaMemoryError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(DmaMemoryError::OutOfBounds {
                offset,
                len,
                capacity: self.len,
            }),
        }
    }

    /// Copy `data` into the region starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<(), DmaMemoryError> {
        self.check(offset, data.len())?;
        // Safety: bounds checked above; `from_raw_parts` guarantees validity.
        unsafe {
            let dst = self.ptr.as_ptr().add(offset);
            core::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        // Make the CPU writes visible before any subsequent DMA enable.
        compiler_fence(Ordering::Release);
        Ok(())
    }

    /// Copy `out.len()` bytes starting at `offset` out of the region.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<(), DmaMemoryError> {
        self.check(offset, out.len())?;
        compiler_fence(Ordering::Acquire);
        // Safety: bounds checked above; `from_raw_parts` guarantees validity.
        unsafe {
            let src = self.ptr.as_ptr().add(offset);
            core::ptr::copy_nonoverlapping(src, out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    /// Store little-endian 32-bit words starting at `offset`.
    // Safety: i < words.len(); bounds of the whole span checked first
    #[allow(clippy::arithmetic_side_effects)]
    pub fn write_words(&self, offset: usize, words: &[u32]) -> Result<(), DmaMemoryError> {
        self.check(offset, words.len().saturating_mul(4))?;
        for (i, word) in words.iter().enumerate() {
            self.write(offset + i * 4, &word.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read one little-endian 32-bit word at `offset`.
    pub fn read_word(&self, offset: usize) -> Result<u32, DmaMemoryError> {
        let mut bytes = [0u8; 4];
        self.read(offset, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Fill the whole region with `byte`.
    pub fn fill(&self, byte: u8) {
        // Safety: the whole region is valid per `from_raw_parts`.
        unsafe { core::ptr::write_bytes(self.ptr.as_ptr(), byte, self.len) };
        compiler_fence(Ordering::Release);
    }
}

/// Source of DMA-coherent regions.
pub trait DmaAllocator {
    /// Allocate `len` bytes whose bus address is aligned to `align`.
    fn allocate(&mut self, len: usize, align: usize) -> Result<DmaRegion, DmaMemoryError>;
}

/// Bump allocator over a `'static` block of DMA-reachable memory.
///
/// Regions are never returned to the pool.
#[derive(Debug)]
pub struct StaticDmaPool {
    base: NonNull<u8>,
    phys_base: u32,
    len: usize,
    next: usize,
}

// Safety: the pool exclusively owns its 'static block.
unsafe impl Send for StaticDmaPool {}

impl StaticDmaPool {
    /// Create a pool over `memory`, whose first byte is at bus address `phys_base`.
    pub fn new(memory: &'static mut [u8], phys_base: u32) -> Self {
        let len = memory.len();
        Self {
            base: NonNull::from(memory).cast(),
            phys_base,
            len,
            next: 0,
        }
    }

    /// Bytes not yet handed out.
    #[allow(clippy::arithmetic_side_effects)] // Safety: next <= len invariant
    pub fn remaining(&self) -> usize {
        self.len - self.next
    }
}

impl DmaAllocator for StaticDmaPool {
    #[allow(clippy::arithmetic_side_effects)] // Safety: every step is checked or bounded by `len`
    fn allocate(&mut self, len: usize, align: usize) -> Result<DmaRegion, DmaMemoryError> {
        if align == 0 || !align.is_power_of_two() {
            return Err(DmaMemoryError::BadAlignment);
        }
        let out_of_memory = DmaMemoryError::OutOfMemory {
            requested: len,
            available: self.remaining(),
        };
        // Align on the bus address; that is what the DMA controller checks.
        let cursor = (self.phys_base as usize)
            .checked_add(self.next)
            .ok_or(out_of_memory)?;
        let padding = cursor.wrapping_neg() & (align - 1);
        let start = self.next.checked_add(padding).ok_or(out_of_memory)?;
        let end = start.checked_add(len).ok_or(out_of_memory)?;
        if end > self.len {
            return Err(DmaMemoryError::OutOfMemory {
                requested: len + padding,
                available: self.remaining(),
            });
        }
        let phys = u32::try_from(start)
            .ok()
            .and_then(|start| self.phys_base.checked_add(start))
            .ok_or(out_of_memory)?;
        self.next = end;
        // Safety: start..end lies inside the 'static block owned by the pool
        // and is never handed out again.
        Ok(unsafe { DmaRegion::from_raw_parts(self.base.add(start), phys, len) })
    }
}
