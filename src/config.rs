//! Build-time sizes and magic numbers.
//!
//! The original LLKERNEL implementation pulls these from link-time symbols
//! and `#define`s resolved at compile time. A portable crate has no
//! equivalent of a linker symbol, so they live here as an ordinary value a
//! board's startup code constructs once and hands to [`crate::Catalog::new`].

/// Upper bound on [`Config::page_size`] this crate supports.
///
/// The catalog holds its staging buffers inline (`[u8; MAX_PAGE_SIZE]`)
/// rather than allocating them, so a board's actual page size must fit.
/// [`Config::default`]'s 256-byte page fits comfortably; this cap covers
/// every NOR part in the ecosystem this crate targets.
pub const MAX_PAGE_SIZE: usize = 4096;

/// Upper bound on [`Config::subsector_size`] this crate supports, for the
/// same inline-buffer reason as [`MAX_PAGE_SIZE`]. Index compaction copies
/// a whole subsector into a staging buffer of this size.
pub const MAX_SUBSECTOR_SIZE: usize = 4096;

/// Status word for a slot whose feature is installed and live.
pub const USED_MAGIC: u32 = 0x181C_77E8;
/// Status word for a slot whose feature has been uninstalled.
pub const REMOVED_MAGIC: u32 = 0x003A_DCA7;
/// Status word of a slot that has never been written since its last erase.
pub const FREE_MAGIC: u32 = 0xFFFF_FFFF;

/// Board-level sizing and addressing configuration for the feature catalog.
///
/// Mirrors `LLKERNEL_flash_configuration.h`: every field has the same default
/// as the original's `#define`, so a board that only cares about
/// `max_nb_dynamic_features` can start from [`Config::default`] and override
/// just that one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Start address of the whole flash device.
    pub flash_base: u32,
    /// Total size of the flash device in bytes.
    pub flash_size: u32,
    /// Largest unit the flash controller can program in one call.
    pub page_size: u32,
    /// Smallest unit the flash controller can erase.
    pub subsector_size: u32,
    /// Start address of the area reserved for feature storage.
    pub kf_start: u32,
    /// Size in bytes of the area reserved for feature storage.
    pub kf_block_size: u32,
    /// Size in bytes of the RAM arena backing feature working memory.
    pub ram_buffer_size: u32,
    /// Base address of the RAM arena.
    pub ram_buffer_base: u32,
    /// Alignment, in bytes, required of every RAM region handed to a feature.
    pub ram_align: u32,
    /// Status word meaning "installed".
    pub used_magic: u32,
    /// Status word meaning "uninstalled".
    pub removed_magic: u32,
    /// Upper bound on the number of features the catalog can hold,
    /// equivalent to the original's `max_nb_dynamic_features` linker symbol.
    pub max_nb_dynamic_features: u32,
}

impl Config {
    /// End address (exclusive) of the feature storage area.
    pub fn kf_end(&self) -> u32 {
        self.kf_start + self.kf_block_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            flash_base: 0x9000_0000,
            flash_size: 0x0400_0000, // 64 MiB
            page_size: 0x100,        // 256 B
            subsector_size: 4 * 1024,
            kf_start: 0x9000_0000,
            kf_block_size: 0x0040_0000, // 4 MiB
            ram_buffer_size: 100 * 1024,
            ram_buffer_base: 0,
            ram_align: 256,
            used_magic: USED_MAGIC,
            removed_magic: REMOVED_MAGIC,
            max_nb_dynamic_features: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.page_size, 256);
        assert_eq!(cfg.subsector_size, 4096);
        assert_eq!(cfg.kf_block_size, 4 * 1024 * 1024);
        assert_eq!(cfg.ram_buffer_size, 100 * 1024);
        assert_eq!(cfg.ram_align, 256);
        assert_eq!(cfg.used_magic, USED_MAGIC);
        assert_eq!(cfg.removed_magic, REMOVED_MAGIC);
        assert_eq!(cfg.kf_end(), cfg.kf_start + 4 * 1024 * 1024);
    }
}
