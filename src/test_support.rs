//! A RAM-backed [`FlashController`] mock, so the catalog's logic can be
//! exercised off-target. Only built for tests or when the `hosted` feature
//! is enabled; never linked into a board image.

use crate::flash::FlashController;

/// The injected failure a [`MockFlash`] reports once armed by
/// [`MockFlash::fail_next_erase`] / [`MockFlash::fail_next_write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectedFailure;

/// In-memory stand-in for a NOR flash device.
///
/// Erases set a subsector to all-`0xFF`; programs only ever clear bits
/// (`byte &= new_byte`), the same one-directional behavior real NOR flash
/// has, so a test that accidentally writes the same page twice without an
/// intervening erase sees the same corruption a real board would.
/// `read_mapped` panics if memory-mapped mode is currently disabled, and
/// `erase_subsector`/`page_write` panic if it's currently enabled — this
/// catches a missing disable/enable bracket immediately instead of letting
/// it silently corrupt the image. `fail_next_erase`/`fail_next_write` let a
/// test arm a one-shot (or sticky) failure to exercise the catalog's error
/// paths.
pub struct MockFlash {
    data: Vec<u8>,
    flash_base: u32,
    subsector_size: u32,
    page_size: u32,
    kf_start: u32,
    kf_end: u32,
    mmap_enabled: bool,
    fail_erase: FailureMode,
    fail_write: FailureMode,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Never,
    Once,
    Always,
}

impl MockFlash {
    pub fn new(flash_base: u32, flash_size: u32, subsector_size: u32, page_size: u32, kf_start: u32, kf_end: u32) -> MockFlash {
        MockFlash {
            data: vec![0xFFu8; flash_size as usize],
            flash_base,
            subsector_size,
            page_size,
            kf_start,
            kf_end,
            mmap_enabled: false,
            fail_erase: FailureMode::Never,
            fail_write: FailureMode::Never,
        }
    }

    fn offset(&self, addr: u32) -> usize {
        (addr - self.flash_base) as usize
    }

    /// Fail the next `erase_subsector` call, then resume succeeding.
    pub fn fail_next_erase(&mut self) {
        self.fail_erase = FailureMode::Once;
    }

    /// Fail every `page_write` call from now on.
    pub fn fail_all_writes(&mut self) {
        self.fail_write = FailureMode::Always;
    }
}

impl FlashController for MockFlash {
    type Error = InjectedFailure;

    fn startup(&mut self) -> Result<(), Self::Error> {
        self.mmap_enabled = true;
        Ok(())
    }

    fn erase_subsector(&mut self, addr: u32) -> Result<(), Self::Error> {
        assert!(!self.mmap_enabled, "erase while memory-mapped mode is enabled");
        match self.fail_erase {
            FailureMode::Never => {}
            FailureMode::Once => {
                self.fail_erase = FailureMode::Never;
                return Err(InjectedFailure);
            }
            FailureMode::Always => return Err(InjectedFailure),
        }
        let base = self.subsector_base(addr);
        let off = self.offset(base);
        let len = self.subsector_size as usize;
        self.data[off..off + len].fill(0xFF);
        Ok(())
    }

    fn page_write(&mut self, buf: &[u8], addr: u32) -> Result<(), Self::Error> {
        assert!(!self.mmap_enabled, "program while memory-mapped mode is enabled");
        assert!(buf.len() <= self.page_size as usize, "write larger than a page");
        match self.fail_write {
            FailureMode::Never => {}
            FailureMode::Once => {
                self.fail_write = FailureMode::Never;
                return Err(InjectedFailure);
            }
            FailureMode::Always => return Err(InjectedFailure),
        }
        let off = self.offset(addr);
        for (i, byte) in buf.iter().enumerate() {
            self.data[off + i] &= byte;
        }
        Ok(())
    }

    fn enable_mmap(&mut self) -> Result<(), Self::Error> {
        self.mmap_enabled = true;
        Ok(())
    }

    fn disable_mmap(&mut self) -> Result<(), Self::Error> {
        self.mmap_enabled = false;
        Ok(())
    }

    fn read_mapped(&self, addr: u32, buf: &mut [u8]) {
        assert!(self.mmap_enabled, "read while memory-mapped mode is disabled");
        let off = self.offset(addr);
        buf.copy_from_slice(&self.data[off..off + buf.len()]);
    }

    fn subsector_base(&self, addr: u32) -> u32 {
        let off = self.offset(addr) as u32;
        self.flash_base + (off / self.subsector_size) * self.subsector_size
    }

    fn page_base(&self, addr: u32) -> u32 {
        let off = self.offset(addr) as u32;
        self.flash_base + (off / self.page_size) * self.page_size
    }

    fn subsector_size(&self) -> u32 {
        self.subsector_size
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn kf_start(&self) -> u32 {
        self.kf_start
    }

    fn kf_end(&self) -> u32 {
        self.kf_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erase_resets_to_all_ones() {
        let mut flash = MockFlash::new(0, 8192, 4096, 256, 0, 8192);
        flash.disable_mmap().unwrap();
        flash.page_write(&[0x00; 4], 0).unwrap();
        flash.erase_subsector(0).unwrap();
        flash.enable_mmap().unwrap();
        let mut buf = [0u8; 4];
        flash.read_mapped(0, &mut buf);
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    #[should_panic(expected = "memory-mapped")]
    fn read_while_unmapped_panics() {
        let mut flash = MockFlash::new(0, 4096, 4096, 256, 0, 4096);
        flash.disable_mmap().unwrap();
        let mut buf = [0u8; 4];
        flash.read_mapped(0, &mut buf);
    }
}
