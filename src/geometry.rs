//! Pure, side-effect-free layout arithmetic.
//!
//! Everything here is a function of [`Config`] (and, for RAM arithmetic, of
//! addresses already computed elsewhere) — no flash I/O, no mutable state.

use crate::config::Config;
use crate::header::HEADER_SIZE;

/// Size in bytes of the area reserved for feature storage.
pub fn kf_area_size(kf_start: u32, kf_end: u32) -> u32 {
    kf_end - kf_start
}

/// Size in bytes of one feature slot (header + ROM payload), rounded down
/// to a whole number of subsectors. Zero when `max_features` is zero.
pub fn slot_size(kf_start: u32, kf_end: u32, subsector_size: u32, max_features: u32) -> u32 {
    if max_features == 0 {
        return 0;
    }
    let area = kf_area_size(kf_start, kf_end);
    let subsectors_in_area = area / subsector_size;
    let subsectors_per_slot = subsectors_in_area / max_features;
    subsectors_per_slot * subsector_size
}

/// The largest ROM payload a slot can hold, given its total size.
pub fn max_rom_size(slot_size: u32) -> u32 {
    slot_size.saturating_sub(HEADER_SIZE as u32)
}

/// Base address of the slot logically following the slot at `slot_base`,
/// or `None` if that would fall at or past `kf_end`.
pub fn next_slot(slot_base: u32, slot_size: u32, kf_end: u32) -> Option<u32> {
    if slot_size == 0 {
        return None;
    }
    let next = slot_base.checked_add(slot_size)?;
    if next < kf_end {
        Some(next)
    } else {
        None
    }
}

/// Index (0-based) of the slot containing `addr`, given the area start and
/// slot size. Callers are expected to have already checked `addr` lies
/// within the KF area.
pub fn slot_index(addr: u32, kf_start: u32, slot_size: u32) -> u32 {
    (addr - kf_start) / slot_size
}

/// The next address, strictly greater than `addr`, aligned to `ram_align`.
///
/// Always advances past `addr` even when `addr` is already aligned — this
/// is how two features never end up sharing a RAM region boundary even
/// when a size happens to be a multiple of the alignment.
pub fn next_aligned_ram(addr: u32, ram_align: u32) -> u32 {
    (addr & !(ram_align - 1)) + ram_align
}

/// Convenience: slot size as configured by `cfg` alone (area bounds come
/// from the adapter at call sites, but tests frequently only have a
/// `Config` to hand).
pub fn configured_slot_size(cfg: &Config) -> u32 {
    slot_size(
        cfg.kf_start,
        cfg.kf_end(),
        cfg.subsector_size,
        cfg.max_nb_dynamic_features,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_size_matches_scenario() {
        // page=256, subsector=4096, slot=65536, max_features=4 => area=256KiB
        let kf_start = 0x9000_0000;
        let kf_end = kf_start + 256 * 1024;
        assert_eq!(slot_size(kf_start, kf_end, 4096, 4), 65536);
    }

    #[test]
    fn slot_size_zero_when_no_features() {
        assert_eq!(slot_size(0, 1024, 4096, 0), 0);
    }

    #[test]
    fn next_aligned_ram_always_advances() {
        assert_eq!(next_aligned_ram(0, 256), 256);
        assert_eq!(next_aligned_ram(256, 256), 512);
        assert_eq!(next_aligned_ram(300, 256), 512);
    }

    #[test]
    fn next_slot_stops_at_kf_end() {
        let kf_start = 0;
        let kf_end = 65536 * 4;
        assert_eq!(next_slot(0, 65536, kf_end), Some(65536));
        assert_eq!(next_slot(65536 * 3, 65536, kf_end), None);
    }
}
