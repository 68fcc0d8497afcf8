//! Register bus abstraction
//!
//! Every hardware block in the ASRC data path (the converter itself and the
//! PL080 DMA controller) is a window of 32-bit registers addressed by
//! base-address-plus-offset. The engine only ever talks to a [`RegisterBus`];
//! the concrete window is either real MMIO ([`MmioBus`]) or the host simulator
//! (`mocks::SimBus`).
//!
//! Register access goes through `&self`: a register window is shared memory
//! that both thread-mode code and the DMA interrupt handler touch, exactly
//! like the RAL `RWRegister` types.

/// A window of 32-bit device registers.
pub trait RegisterBus {
    /// Read the register at `offset` bytes from the window base.
    fn read(&self, offset: u32) -> u32;

    /// Write `value` to the register at `offset` bytes from the window base.
    fn write(&self, offset: u32, value: u32);

    /// Read-modify-write: clear the bits in `clear`, then set the bits in `set`.
    ///
    /// This is *not* atomic with respect to other contexts. Callers that share
    /// a register across pairs must hold a critical section around the call.
    fn modify(&self, offset: u32, clear: u32, set: u32) {
        let value = (self.read(offset) & !clear) | set;
        self.write(offset, value);
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value);
    }
}

/// Memory-mapped register window.
///
/// Accesses are volatile 32-bit loads and stores at `base + offset`.
#[derive(Debug)]
pub struct MmioBus {
    base: *mut u32,
}

// Safety: OK to share a register window between thread mode and the DMA
// interrupt handler; every access is a single volatile word access.
unsafe impl Sync for MmioBus {}
// Safety: the window describes device memory, not thread-local data.
unsafe impl Send for MmioBus {}

impl MmioBus {
    /// Create a register window at `base`.
    ///
    /// # Safety
    ///
    /// Caller must make sure that `base` points to the start of a device
    /// register block that is valid for the lifetime of the returned window,
    /// and that every offset the engine uses lies within that block.
    pub const unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }

    /// Base address of the window.
    pub fn base(&self) -> *mut u32 {
        self.base
    }
}

impl RegisterBus for MmioBus {
    fn read(&self, offset: u32) -> u32 {
        // Safety: `new` requires the offset to lie inside a valid register block.
        unsafe { self.base.byte_add(offset as usize).read_volatile() }
    }

    fn write(&self, offset: u32, value: u32) {
        // Safety: `new` requires the offset to lie inside a valid register block.
        unsafe { self.base.byte_add(offset as usize).write_volatile(value) }
    }
}
