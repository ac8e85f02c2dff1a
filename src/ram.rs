//! RAM arena sub-allocation: derive the next feature's RAM region from the
//! arena's high-water mark, reusing a REMOVED slot's region when it still
//! fits.
//!
//! Pure arithmetic over already-read headers; no flash I/O, so this is
//! unit-testable without a [`crate::flash::FlashController`] at all.

use crate::config::Config;
use crate::geometry;
use crate::header::{FeatureHeader, Status};

/// Choose the RAM region for a feature requesting `size_ram` bytes.
///
/// `last_header` is the header of the most recently scanned USED feature
/// (`None` when the catalog is empty, in which case the arena's base is
/// handed out directly). `candidate_header` is the header currently
/// occupying the slot the install engine picked for the new feature; when
/// it is REMOVED and its RAM region is still within the buffer and at
/// least as large as what's requested, that region is reused instead of
/// advancing the high-water mark.
///
/// Returns `None` when no region of the requested size remains.
pub fn derive_ram_address(
    cfg: &Config,
    last_header: Option<&FeatureHeader>,
    candidate_header: Option<&FeatureHeader>,
    size_ram: u32,
) -> Option<u32> {
    let buffer_base = cfg.ram_buffer_base;
    let buffer_end = buffer_base + cfg.ram_buffer_size;

    let last_header = match last_header {
        None => return Some(buffer_base),
        Some(h) => h,
    };

    if let Some(candidate) = candidate_header {
        if candidate.status == Status::Removed
            && candidate.ram_address >= buffer_base
            && candidate.ram_address < buffer_end
            && size_ram <= candidate.ram_size
        {
            return Some(candidate.ram_address);
        }
    }

    let addr = geometry::next_aligned_ram(last_header.ram_address + last_header.ram_size, cfg.ram_align);
    let fits = addr.checked_add(size_ram).map(|end| end <= buffer_end).unwrap_or(false);
    if fits {
        Some(addr)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(status: Status, ram_address: u32, ram_size: u32) -> FeatureHeader {
        FeatureHeader {
            status,
            nb_subsectors: 1,
            rom_address: 0,
            rom_size: 0,
            ram_address,
            ram_size,
            feature_index: 0,
        }
    }

    fn cfg() -> Config {
        let mut cfg = Config::default();
        cfg.ram_buffer_base = 0;
        cfg.ram_buffer_size = 100 * 1024;
        cfg.ram_align = 256;
        cfg
    }

    #[test]
    fn empty_catalog_hands_out_the_base() {
        assert_eq!(derive_ram_address(&cfg(), None, None, 8192), Some(0));
    }

    #[test]
    fn advances_past_the_last_feature_aligned() {
        let last = header(Status::Used, 0, 8192);
        assert_eq!(derive_ram_address(&cfg(), Some(&last), None, 1024), Some(8192 + 256));
    }

    #[test]
    fn reuses_a_removed_slots_region_when_it_fits() {
        let last = header(Status::Used, 0, 8192);
        let removed = header(Status::Removed, 40960, 4096);
        assert_eq!(derive_ram_address(&cfg(), Some(&last), Some(&removed), 2048), Some(40960));
    }

    #[test]
    fn does_not_reuse_a_removed_region_too_small_for_the_request() {
        let last = header(Status::Used, 0, 8192);
        let removed = header(Status::Removed, 40960, 1024);
        assert_eq!(derive_ram_address(&cfg(), Some(&last), Some(&removed), 2048), Some(8192 + 256));
    }

    #[test]
    fn three_large_features_exhaust_a_small_buffer() {
        let c = cfg();
        let first = derive_ram_address(&c, None, None, 40 * 1024).unwrap();
        assert_eq!(first, 0);
        let h1 = header(Status::Used, first, 40 * 1024);
        let second = derive_ram_address(&c, Some(&h1), None, 40 * 1024).unwrap();
        let h2 = header(Status::Used, second, 40 * 1024);
        assert_eq!(derive_ram_address(&c, Some(&h2), None, 40 * 1024), None);
    }
}
