//! Flash-resident dynamic feature catalog for the KF managed-runtime
//! kernel.
//!
//! The kernel ships a fixed core image but needs to grow optional
//! "features" (installable ROM/RAM modules) after the fact, without a
//! filesystem. This crate is the catalog that makes that possible: a
//! fixed-size table of slots carved out of a reserved flash region, each
//! either FREE, USED by a live feature, or REMOVED (uninstalled but not
//! yet reclaimed), plus the RAM arena sub-allocator that hands each
//! installed feature its own working-memory region.
//!
//! [`Catalog`] is the entry point; it is generic over [`FlashController`],
//! the trait a board implements once against its actual NOR flash driver.
//! Everything else in this crate is pure bookkeeping on top of that one
//! trait, which is also why [`test_support::MockFlash`] can exercise the
//! whole catalog off-target.
#![cfg_attr(not(any(test, feature = "hosted")), no_std)]

mod catalog;
mod config;
mod engine;
mod error;
mod flash;
mod geometry;
mod header;
mod ram;
mod scanner;
mod state;
mod streamer;

#[cfg(any(test, feature = "hosted"))]
pub mod test_support;

pub use catalog::Catalog;
pub use config::{Config, FREE_MAGIC, MAX_PAGE_SIZE, MAX_SUBSECTOR_SIZE, REMOVED_MAGIC, USED_MAGIC};
pub use error::{CatalogError, FeatureInitError};
pub use flash::FlashController;
pub use header::{FeatureHandle, FeatureHeader, Status};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockFlash;
    use lazy_static::lazy_static;
    use rand::Rng;

    lazy_static! {
        /// A board config shared read-only by the tests that don't care
        /// about its exact shape, so they don't each hand-build one.
        static ref SHARED_CFG: Config = cfg_for(4);
    }

    fn cfg_for(max_features: u32) -> Config {
        Config {
            flash_base: 0,
            flash_size: 256 * 1024,
            page_size: 256,
            subsector_size: 4096,
            kf_start: 0,
            kf_block_size: 256 * 1024,
            ram_buffer_size: 100 * 1024,
            ram_buffer_base: 0,
            ram_align: 256,
            used_magic: USED_MAGIC,
            removed_magic: REMOVED_MAGIC,
            max_nb_dynamic_features: max_features,
        }
    }

    fn mock_flash(cfg: &Config) -> MockFlash {
        MockFlash::new(
            cfg.flash_base,
            cfg.flash_size,
            cfg.subsector_size,
            cfg.page_size,
            cfg.kf_start,
            cfg.kf_end(),
        )
    }

    #[test]
    fn empty_catalog_reports_zero_features() {
        let cfg = cfg_for(4);
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();
        assert_eq!(catalog.get_allocated_features_count(), 0);
        assert_eq!(catalog.get_feature_handle(0), None);
    }

    #[test]
    fn install_then_lookup_round_trips() {
        let cfg = cfg_for(4);
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();

        let handle = catalog.allocate_feature(1024, 8192).expect("install should succeed");
        assert_eq!(catalog.get_allocated_features_count(), 1);
        assert_eq!(catalog.get_feature_handle(0), Some(handle));
        assert_eq!(catalog.get_feature_address_rom(handle), Some(handle.address() + 32));
        assert_eq!(catalog.get_feature_address_ram(handle), Some(0));
    }

    #[test]
    fn streamed_copy_then_flush_lands_in_rom() {
        let cfg = *SHARED_CFG;
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();
        let handle = catalog.allocate_feature(600, 0).unwrap();
        let rom = catalog.get_feature_address_rom(handle).unwrap();

        let mut rng = rand::thread_rng();
        let payload: Vec<u8> = (0..600).map(|_| rng.gen()).collect();
        catalog.copy_to_rom(rom, &payload[..300]).unwrap();
        catalog.copy_to_rom(rom + 300, &payload[300..]).unwrap();
        catalog.flush_copy_to_rom().unwrap();
    }

    #[test]
    fn free_then_reinstall_reuses_the_slot() {
        let cfg = cfg_for(4);
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();

        let first = catalog.allocate_feature(100, 512).unwrap();
        catalog.free_feature(first);
        assert_eq!(catalog.get_allocated_features_count(), 0);

        let second = catalog.allocate_feature(100, 512).unwrap();
        assert_eq!(second, first);
        assert_eq!(catalog.get_allocated_features_count(), 1);
        assert_eq!(catalog.get_feature_address_ram(second), Some(0));
    }

    #[test]
    fn out_of_slots_fails_cleanly() {
        let cfg = cfg_for(2);
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();

        assert!(catalog.allocate_feature(100, 100).is_some());
        assert!(catalog.allocate_feature(100, 100).is_some());
        assert_eq!(catalog.allocate_feature(100, 100), None);
    }

    #[test]
    fn ram_exhaustion_fails_the_third_install() {
        let mut cfg = cfg_for(4);
        cfg.ram_buffer_size = 100 * 1024;
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();

        assert!(catalog.allocate_feature(100, 40 * 1024).is_some());
        assert!(catalog.allocate_feature(100, 40 * 1024).is_some());
        assert_eq!(catalog.allocate_feature(100, 40 * 1024), None);
    }

    #[test]
    fn rom_too_large_is_rejected_up_front() {
        let cfg = cfg_for(4);
        let flash = mock_flash(&cfg);
        let slot_size = geometry_slot_size(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();
        assert_eq!(catalog.allocate_feature(slot_size, 0), None);
    }

    fn geometry_slot_size(cfg: &Config) -> u32 {
        crate::geometry::configured_slot_size(cfg)
    }

    #[test]
    fn auto_free_on_corrupted_content() {
        let cfg = cfg_for(4);
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();
        let handle = catalog.allocate_feature(100, 100).unwrap();

        catalog.on_feature_initialization_error(handle, FeatureInitError::CorruptedContent);
        assert_eq!(catalog.get_allocated_features_count(), 0);
    }

    #[test]
    fn non_fatal_init_error_does_not_free() {
        let cfg = cfg_for(4);
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();
        let handle = catalog.allocate_feature(100, 100).unwrap();

        catalog.on_feature_initialization_error(handle, FeatureInitError::AlreadyInstalled);
        assert_eq!(catalog.get_allocated_features_count(), 1);
    }

    #[test]
    fn index_compaction_rewrites_feature_index_after_free() {
        let cfg = cfg_for(4);
        let flash = mock_flash(&cfg);
        let mut catalog = Catalog::new(flash, cfg).unwrap();

        let a = catalog.allocate_feature(100, 100).unwrap();
        let b = catalog.allocate_feature(100, 100).unwrap();
        let c = catalog.allocate_feature(100, 100).unwrap();

        catalog.free_feature(b);
        assert_eq!(catalog.get_allocated_features_count(), 2);

        assert_eq!(catalog.get_feature_handle(0), Some(a));
        assert_eq!(catalog.get_feature_handle(1), Some(c));
    }

    #[test]
    fn adapter_error_propagation_leaves_state_unchanged() {
        let cfg = cfg_for(4);
        let mut flash = mock_flash(&cfg);
        flash.fail_all_writes();
        let mut catalog = Catalog::new(flash, cfg).unwrap();

        assert_eq!(catalog.allocate_feature(100, 100), None);
        assert_eq!(catalog.get_allocated_features_count(), 0);
    }
}
