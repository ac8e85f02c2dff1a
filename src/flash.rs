//! The flash controller contract.
//!
//! This is the external collaborator described in the spec as "out of
//! scope": the physical NOR flash device. The catalog never talks to
//! hardware directly, only through this trait, so the same catalog logic
//! runs against a real QSPI/SPI-NOR driver or against the RAM-backed mock in
//! [`crate::test_support`].

use core::fmt;

/// A single erase-before-write NOR flash device, memory-mapped for reads.
///
/// Implementors own the actual bus transactions; the catalog only ever
/// calls these methods in the sequences documented on each one. `addr` for
/// [`FlashController::page_write`] must be page-aligned, and the supplied
/// slice must not exceed [`FlashController::page_size`].
///
/// Every mutating call here must leave memory-mapped mode exactly as it
/// found it from the adapter's own point of view — the catalog is
/// responsible for the disable/enable bracketing, not the adapter.
pub trait FlashController {
    /// Device-specific failure detail. The catalog only distinguishes
    /// success from failure; this type exists so an adapter can still
    /// report *why* to a caller that downcasts `CatalogError::Flash`.
    type Error: fmt::Debug;

    /// One-time bring-up of the flash device. Memory-mapped read mode must
    /// be enabled when this returns successfully.
    fn startup(&mut self) -> Result<(), Self::Error>;

    /// Erase the subsector containing `addr`. `addr` need not itself be
    /// subsector-aligned; the controller rounds down.
    fn erase_subsector(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Program `buf` (at most [`FlashController::page_size`] bytes) at
    /// page-aligned `addr`. The destination page must already be erased.
    fn page_write(&mut self, buf: &[u8], addr: u32) -> Result<(), Self::Error>;

    /// Enable the memory-mapped read window.
    fn enable_mmap(&mut self) -> Result<(), Self::Error>;

    /// Disable the memory-mapped read window. Must be called before any
    /// erase or program.
    fn disable_mmap(&mut self) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes through the memory-mapped window starting at
    /// `addr`. Only valid while mmap is enabled.
    fn read_mapped(&self, addr: u32, buf: &mut [u8]);

    /// Round `addr` down to the start of its containing subsector.
    fn subsector_base(&self, addr: u32) -> u32;

    /// Round `addr` down to the start of its containing page.
    fn page_base(&self, addr: u32) -> u32;

    /// Size in bytes of the smallest erasable unit.
    fn subsector_size(&self) -> u32;

    /// Size in bytes of the largest programmable unit.
    fn page_size(&self) -> u32;

    /// Start address (inclusive) of the area reserved for feature storage.
    fn kf_start(&self) -> u32;

    /// End address (exclusive) of the area reserved for feature storage.
    fn kf_end(&self) -> u32;
}
