//! Install and free the catalog's feature slots.
//!
//! Grounded on `LLKERNEL_IMPL_allocateFeature` and `LLKERNEL_IMPL_freeFeature`.

use crate::config::Config;
use crate::error::CatalogError;
use crate::flash::FlashController;
use crate::geometry;
use crate::header::{FeatureHandle, FeatureHeader, Status, HEADER_SIZE};
use crate::ram;
use crate::scanner::{self, read_header, write_paged};
use crate::state::CatalogState;

/// Scratch buffers the engine needs; owned by [`crate::Catalog`] so no
/// allocation happens on the hot path.
pub struct Scratch<'a> {
    pub page: &'a mut [u8],
    pub subsector: &'a mut [u8],
}

/// Rebuild the catalog, find room for `size_rom`/`size_ram` bytes, and
/// commit a new USED header. Returns the new feature's handle.
///
/// On any failure the slot is left untouched (or, if a partial erase/write
/// already happened, in whatever state the flash adapter reports — the
/// caller has already been told via the `None`/error return that the
/// feature did not install).
pub fn allocate_feature<F: FlashController>(
    flash: &mut F,
    cfg: &Config,
    state: &mut CatalogState,
    scratch: Scratch<'_>,
    size_rom: u32,
    size_ram: u32,
) -> Result<FeatureHandle, CatalogError<F::Error>> {
    if cfg.max_nb_dynamic_features == 0 {
        return Err(CatalogError::ConfigMaxFeaturesZero);
    }
    if size_ram > cfg.ram_buffer_size {
        return Err(CatalogError::RamTooLarge);
    }

    let kf_start = flash.kf_start();
    let kf_end = flash.kf_end();
    let subsector_size = flash.subsector_size();
    let page_size = flash.page_size();
    let slot_size = geometry::slot_size(kf_start, kf_end, subsector_size, cfg.max_nb_dynamic_features);

    if size_rom + HEADER_SIZE as u32 > slot_size {
        return Err(CatalogError::RomTooLarge);
    }

    *state = scanner::scan_and_compact(flash, cfg, scratch.subsector);

    let slot_base = scanner::find_free_slot(flash, cfg).ok_or(CatalogError::TooManyFeatures)?;
    let candidate_header = read_header(flash, cfg, slot_base);
    let last_header = match state.last_feature {
        Some(h) => Some(read_header(flash, cfg, h.address())),
        None => None,
    };

    let ram_address = ram::derive_ram_address(cfg, last_header.as_ref(), Some(&candidate_header), size_ram)
        .ok_or(CatalogError::RamOverflow)?;

    let rom_address = slot_base + HEADER_SIZE as u32;

    flash.disable_mmap().map_err(CatalogError::MmapToggle)?;
    let nb_subsectors = {
        let mut addr = slot_base;
        let mut n = 0u32;
        let mut erase_err = None;
        while addr < rom_address + size_rom {
            if let Err(e) = flash.erase_subsector(addr) {
                erase_err = Some(e);
                break;
            }
            n += 1;
            addr += subsector_size;
        }
        if let Some(e) = erase_err {
            if let Err(mmap_err) = flash.enable_mmap() {
                log::warn!("kf: failed to re-enable mmap after a failed erase: {:?}", mmap_err);
            }
            return Err(CatalogError::FlashErase(e));
        }
        n
    };

    let header = FeatureHeader {
        status: Status::Used,
        nb_subsectors,
        rom_address,
        rom_size: size_rom,
        ram_address,
        ram_size: size_ram,
        feature_index: state.nb_features,
    };

    let page = &mut scratch.page[..page_size as usize];
    page.iter_mut().for_each(|b| *b = 0xFF);
    header.encode(&mut page[..HEADER_SIZE], cfg);

    let write_result = write_paged(flash, slot_base, page, page_size);
    if let Err(e) = flash.enable_mmap() {
        log::warn!("kf: failed to re-enable mmap after writing a feature header: {:?}", e);
    }
    write_result?;

    state.last_feature = Some(FeatureHandle(slot_base));
    state.nb_features += 1;
    Ok(FeatureHandle(slot_base))
}

/// Mark a USED slot REMOVED. A no-op if the slot is already anything else.
///
/// The RAM region recorded in the header is left as-is; it becomes
/// available for reuse by a later [`allocate_feature`] call once that slot
/// is picked as a free slot again.
pub fn free_feature<F: FlashController>(
    flash: &mut F,
    cfg: &Config,
    state: &mut CatalogState,
    page: &mut [u8],
    handle: FeatureHandle,
) -> Result<(), CatalogError<F::Error>> {
    let page_size = flash.page_size();
    let mut header = read_header(flash, cfg, handle.address());
    if header.status != Status::Used {
        return Ok(());
    }
    header.status = Status::Removed;
    header.nb_subsectors = 1;

    let page = &mut page[..page_size as usize];
    page.iter_mut().for_each(|b| *b = 0xFF);
    header.encode(&mut page[..HEADER_SIZE], cfg);

    flash.disable_mmap().map_err(CatalogError::MmapToggle)?;
    let result = (|| {
        flash.erase_subsector(handle.address()).map_err(CatalogError::FlashErase)?;
        write_paged(flash, handle.address(), page, page_size)
    })();
    if let Err(e) = flash.enable_mmap() {
        log::warn!("kf: failed to re-enable mmap after freeing a feature: {:?}", e);
    }
    result?;

    state.nb_features = state.nb_features.saturating_sub(1);
    Ok(())
}
