//! Walks the slot chain to rebuild the cached catalog state, and the two
//! narrower walks the install engine needs (first free slot, handle lookup).
//!
//! Grounded on `LLKERNEL_IMPL_getAllocatedFeaturesCount` and
//! `llkernel_get_free_feature_slot`.

use crate::config::Config;
use crate::error::CatalogError;
use crate::flash::FlashController;
use crate::geometry;
use crate::header::{FeatureHandle, FeatureHeader, Status, HEADER_SIZE};
use crate::state::CatalogState;

pub(crate) fn read_header<F: FlashController>(flash: &F, cfg: &Config, addr: u32) -> FeatureHeader {
    let mut buf = [0u8; HEADER_SIZE];
    flash.read_mapped(addr, &mut buf);
    FeatureHeader::decode(&buf, cfg)
}

/// Write `data` to `addr` in `page_size`-sized chunks, as the original's
/// `llkernel_flash_write` does.
pub(crate) fn write_paged<F: FlashController>(
    flash: &mut F,
    mut addr: u32,
    data: &[u8],
    page_size: u32,
) -> Result<(), CatalogError<F::Error>> {
    let page_size = page_size as usize;
    let mut remaining = data;
    while !remaining.is_empty() {
        let chunk_len = remaining.len().min(page_size);
        let (chunk, rest) = remaining.split_at(chunk_len);
        flash.page_write(chunk, addr).map_err(CatalogError::FlashWrite)?;
        addr += chunk_len as u32;
        remaining = rest;
    }
    Ok(())
}

/// Rewrite a USED slot's `feature_index` in place, bracketed by a
/// disable/erase/reprogram/enable mmap cycle.
///
/// `scratch` must be at least as large as a subsector; the caller owns that
/// buffer so this function never allocates.
fn rewrite_index<F: FlashController>(
    flash: &mut F,
    cfg: &Config,
    slot: u32,
    new_index: u32,
    subsector_size: u32,
    page_size: u32,
    scratch: &mut [u8],
) -> Result<(), CatalogError<F::Error>> {
    let ss = subsector_size as usize;
    debug_assert!(ss <= scratch.len(), "scratch buffer smaller than a subsector");
    let buf = &mut scratch[..ss];
    flash.read_mapped(slot, buf);
    buf[24..28].copy_from_slice(&new_index.to_le_bytes());

    flash.disable_mmap().map_err(CatalogError::MmapToggle)?;
    let result = (|| {
        flash.erase_subsector(slot).map_err(CatalogError::FlashErase)?;
        write_paged(flash, slot, buf, page_size)
    })();
    if let Err(e) = flash.enable_mmap() {
        log::warn!("kf: failed to re-enable mmap after index compaction: {:?}", e);
    }
    result
}

/// Walk every slot from `kf_start`, classifying each by status, compacting
/// any USED slot whose stored `feature_index` has drifted from its scan
/// ordinal, and stopping at the first FREE slot.
///
/// Errors from a failed compaction are logged, not surfaced — the caller
/// has no way to report a mid-scan flash fault through this interface, a
/// choice carried over unchanged from the original.
pub fn scan_and_compact<F: FlashController>(
    flash: &mut F,
    cfg: &Config,
    scratch: &mut [u8],
) -> CatalogState {
    let kf_start = flash.kf_start();
    let kf_end = flash.kf_end();
    let subsector_size = flash.subsector_size();
    let page_size = flash.page_size();
    let slot_size = geometry::slot_size(kf_start, kf_end, subsector_size, cfg.max_nb_dynamic_features);

    let mut state = CatalogState::empty();
    if slot_size == 0 {
        return state;
    }

    let mut slot = kf_start;
    loop {
        let header = read_header(flash, cfg, slot);
        match header.status {
            Status::Used => {
                let mut rewrite_failed = false;
                if header.feature_index != state.nb_features {
                    if let Err(e) =
                        rewrite_index(flash, cfg, slot, state.nb_features, subsector_size, page_size, scratch)
                    {
                        log::error!("kf: failed to compact feature index at 0x{:x}: {:?}", slot, e);
                        rewrite_failed = true;
                    }
                }
                state.last_feature = Some(FeatureHandle(slot));
                state.nb_features += 1;
                if rewrite_failed {
                    break;
                }
            }
            Status::Removed => {
                // Skipped without disturbing last_feature: a removed slot
                // contributes neither to the count nor to the RAM arena
                // cursor, but the original leaves its RAM region reusable.
            }
            Status::Free => break,
        }

        match geometry::next_slot(slot, slot_size, kf_end) {
            Some(next) => slot = next,
            None => break,
        }
    }

    state
}

/// First slot whose status is not USED (i.e. REMOVED or FREE), for the
/// install engine. Equivalent to `llkernel_get_free_feature_slot`.
pub fn find_free_slot<F: FlashController>(flash: &F, cfg: &Config) -> Option<u32> {
    let kf_start = flash.kf_start();
    let kf_end = flash.kf_end();
    let subsector_size = flash.subsector_size();
    let slot_size = geometry::slot_size(kf_start, kf_end, subsector_size, cfg.max_nb_dynamic_features);
    if slot_size == 0 {
        return None;
    }

    let mut slot = kf_start;
    loop {
        let header = read_header(flash, cfg, slot);
        if header.status != Status::Used {
            return Some(slot);
        }
        match geometry::next_slot(slot, slot_size, kf_end) {
            Some(next) => slot = next,
            None => return None,
        }
    }
}

/// Translate a 0-based feature index into a handle, using the cached
/// `nb_features` as the scan's upper bound rather than re-walking to a
/// FREE slot. Equivalent to `LLKERNEL_IMPL_getFeatureHandle`.
pub fn get_feature_handle<F: FlashController>(
    flash: &F,
    cfg: &Config,
    index: u32,
    nb_features: u32,
) -> Option<FeatureHandle> {
    if index >= nb_features {
        return None;
    }

    let kf_start = flash.kf_start();
    let kf_end = flash.kf_end();
    let subsector_size = flash.subsector_size();
    let slot_size = geometry::slot_size(kf_start, kf_end, subsector_size, cfg.max_nb_dynamic_features);
    if slot_size == 0 {
        return None;
    }

    let mut slot = kf_start;
    loop {
        let header = read_header(flash, cfg, slot);
        match header.status {
            Status::Used if header.feature_index == index => return Some(FeatureHandle(slot)),
            Status::Used | Status::Removed => {}
            Status::Free => return None,
        }
        match geometry::next_slot(slot, slot_size, kf_end) {
            Some(next) => slot = next,
            None => return None,
        }
    }
}
