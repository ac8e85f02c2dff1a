//! Buffered streaming copy into a feature's ROM region.
//!
//! A feature's ROM payload usually arrives in chunks smaller than a flash
//! page. The streamer accumulates bytes in a page-sized buffer and only
//! touches flash once a page is either full or explicitly [`flush`]ed,
//! carrying a partial tail across calls. Grounded on
//! `LLKERNEL_IMPL_copyToROM` / `LLKERNEL_IMPL_flushCopyToROM`.

use crate::config::Config;
use crate::error::CatalogError;
use crate::flash::FlashController;
use crate::geometry;

/// Carry-over cursor for an in-progress `copy_to_rom` stream. The byte
/// contents themselves live in the caller-owned scratch buffer passed to
/// every call; this only tracks where that buffer's valid data ends.
#[derive(Debug, Default)]
pub struct Stream {
    target_page_address: Option<u32>,
    write_buffer_offset: u32,
}

impl Stream {
    pub fn new() -> Stream {
        Stream { target_page_address: None, write_buffer_offset: 0 }
    }

    /// Whether a partial page is currently buffered, pending [`flush`].
    pub fn has_pending(&self) -> bool {
        self.target_page_address.is_some()
    }
}

fn validate_range<F: FlashController>(
    flash: &F,
    cfg: &Config,
    dest: u32,
    len: u32,
) -> Result<(), CatalogError<F::Error>> {
    let kf_start = flash.kf_start();
    let kf_end = flash.kf_end();
    if dest < kf_start || dest.checked_add(len).map_or(true, |end| end > kf_end) {
        return Err(CatalogError::RomRangeOutOfKf);
    }

    let subsector_size = flash.subsector_size();
    let slot_size = geometry::slot_size(kf_start, kf_end, subsector_size, cfg.max_nb_dynamic_features);
    if slot_size == 0 || len > slot_size {
        return Err(CatalogError::RomRangeOutOfKf);
    }

    let start_slot = geometry::slot_index(dest, kf_start, slot_size);
    let end_slot = geometry::slot_index(dest + len - 1, kf_start, slot_size);
    if start_slot != end_slot {
        return Err(CatalogError::RomRangeCrossesSlot);
    }
    Ok(())
}

/// Append `data` to the ROM region starting at `dest`.
///
/// `buffer` is the page-sized scratch the stream assembles into; the same
/// buffer must be passed on every call for a given `Stream` so its buffered
/// tail survives across calls, and to [`flush`] at the end of the stream.
pub fn copy_to_rom<F: FlashController>(
    flash: &mut F,
    cfg: &Config,
    stream: &mut Stream,
    buffer: &mut [u8],
    dest: u32,
    data: &[u8],
) -> Result<(), CatalogError<F::Error>> {
    if data.is_empty() {
        return Ok(());
    }
    validate_range(flash, cfg, dest, data.len() as u32)?;

    let page_size = flash.page_size();
    let buffer = &mut buffer[..page_size as usize];

    let mut dest = dest;
    let mut src_off = 0usize;
    let mut remaining = data.len();

    if let Some(target) = stream.target_page_address {
        let new_offset = dest.wrapping_sub(target);
        if new_offset > stream.write_buffer_offset && new_offset < page_size {
            for b in &mut buffer[stream.write_buffer_offset as usize..new_offset as usize] {
                *b = 0xFF;
            }
            stream.write_buffer_offset = new_offset;
        } else if new_offset != stream.write_buffer_offset {
            flush(flash, stream, buffer)?;
        }
    }

    while remaining > 0 {
        let page_address = flash.page_base(dest);
        let buffer_offset = (dest - page_address) as usize;
        let copy_size = (page_size as usize - buffer_offset).min(remaining);

        if stream.target_page_address.is_none() {
            // Fresh page: make the untouched tail deterministic, then
            // recover any real prefix this write doesn't start at.
            buffer.fill(0xFF);
            if buffer_offset != 0 {
                flash.read_mapped(page_address, &mut buffer[..buffer_offset]);
            }
        }

        buffer[buffer_offset..buffer_offset + copy_size]
            .copy_from_slice(&data[src_off..src_off + copy_size]);

        if buffer_offset + copy_size == page_size as usize {
            flash.disable_mmap().map_err(CatalogError::MmapToggle)?;
            let result = flash.page_write(buffer, page_address).map_err(CatalogError::FlashWrite);
            if let Err(e) = flash.enable_mmap() {
                log::warn!("kf: failed to re-enable mmap after a ROM page write: {:?}", e);
            }
            result?;
            stream.target_page_address = None;
            stream.write_buffer_offset = 0;
        } else {
            stream.target_page_address = Some(page_address);
            stream.write_buffer_offset = (buffer_offset + copy_size) as u32;
        }

        dest += copy_size as u32;
        src_off += copy_size;
        remaining -= copy_size;
    }

    Ok(())
}

/// Force out a partially filled page. A no-op when no bytes are buffered.
/// Idempotent: calling it twice in a row does nothing the second time.
pub fn flush<F: FlashController>(
    flash: &mut F,
    stream: &mut Stream,
    buffer: &mut [u8],
) -> Result<(), CatalogError<F::Error>> {
    let Some(page_address) = stream.target_page_address else {
        return Ok(());
    };

    let page_size = flash.page_size() as usize;
    let buffer = &mut buffer[..page_size];

    flash.disable_mmap().map_err(CatalogError::MmapToggle)?;
    let result = flash.page_write(buffer, page_address).map_err(CatalogError::FlashWrite);
    if let Err(e) = flash.enable_mmap() {
        log::warn!("kf: failed to re-enable mmap after flushing a ROM page: {:?}", e);
    }
    result?;

    stream.target_page_address = None;
    stream.write_buffer_offset = 0;
    Ok(())
}
