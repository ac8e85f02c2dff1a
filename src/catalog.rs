//! The public facade: one `Catalog<F>` per board, owning the staging
//! buffers and cached state every other module operates on.

use crate::config::{Config, MAX_PAGE_SIZE, MAX_SUBSECTOR_SIZE};
use crate::engine::{self, Scratch};
use crate::error::{CatalogError, FeatureInitError};
use crate::flash::FlashController;
use crate::header::FeatureHandle;
use crate::scanner;
use crate::state::CatalogState;
use crate::streamer::{self, Stream};

/// Owns a flash adapter and the whole feature catalog living on it.
///
/// There is exactly one `Catalog` per board; every operation takes
/// `&mut self`, so the type system is what enforces the single-threaded,
/// non-reentrant execution model — two overlapping calls simply cannot
/// both hold a `&mut Catalog` at once.
pub struct Catalog<F: FlashController> {
    flash: F,
    cfg: Config,
    state: CatalogState,
    stream: Stream,
    page: [u8; MAX_PAGE_SIZE],
    subsector: [u8; MAX_SUBSECTOR_SIZE],
}

impl<F: FlashController> Catalog<F> {
    /// Bring up `flash` and perform the initial catalog scan.
    pub fn new(mut flash: F, cfg: Config) -> Result<Catalog<F>, CatalogError<F::Error>> {
        assert!(
            flash.page_size() as usize <= MAX_PAGE_SIZE,
            "configured page_size exceeds this build's MAX_PAGE_SIZE"
        );
        assert!(
            flash.subsector_size() as usize <= MAX_SUBSECTOR_SIZE,
            "configured subsector_size exceeds this build's MAX_SUBSECTOR_SIZE"
        );

        flash.startup().map_err(CatalogError::FlashStartup)?;

        let mut catalog = Catalog {
            flash,
            cfg,
            state: CatalogState::empty(),
            stream: Stream::new(),
            page: [0u8; MAX_PAGE_SIZE],
            subsector: [0u8; MAX_SUBSECTOR_SIZE],
        };
        catalog.state = scanner::scan_and_compact(&mut catalog.flash, &catalog.cfg, &mut catalog.subsector);
        log::debug!("kf: catalog initialized with {} installed feature(s)", catalog.state.nb_features);
        Ok(catalog)
    }

    /// Rebuild the catalog from flash, compacting any drifted indices, and
    /// return the current count of installed features.
    pub fn get_allocated_features_count(&mut self) -> u32 {
        log::debug!("kf: get_allocated_features_count");
        self.state = scanner::scan_and_compact(&mut self.flash, &self.cfg, &mut self.subsector);
        self.state.nb_features
    }

    /// Handle of the `index`-th installed feature, in scan order.
    pub fn get_feature_handle(&self, index: u32) -> Option<FeatureHandle> {
        log::debug!("kf: get_feature_handle({})", index);
        scanner::get_feature_handle(&self.flash, &self.cfg, index, self.state.nb_features)
    }

    /// Absolute ROM address of `handle`'s payload, iff it is still USED.
    pub fn get_feature_address_rom(&self, handle: FeatureHandle) -> Option<u32> {
        let header = scanner::read_header(&self.flash, &self.cfg, handle.address());
        (header.status == crate::header::Status::Used).then_some(header.rom_address)
    }

    /// Absolute RAM address of `handle`'s working memory, iff it is still
    /// USED.
    pub fn get_feature_address_ram(&self, handle: FeatureHandle) -> Option<u32> {
        let header = scanner::read_header(&self.flash, &self.cfg, handle.address());
        (header.status == crate::header::Status::Used).then_some(header.ram_address)
    }

    /// Install a new feature with the given ROM and RAM footprints.
    ///
    /// Returns `None` (the external sentinel `0`) on any failure; the
    /// specific [`CatalogError`] is logged, not returned, matching the
    /// original's `int32_t`-sentinel boundary.
    pub fn allocate_feature(&mut self, size_rom: u32, size_ram: u32) -> Option<FeatureHandle> {
        log::debug!("kf: allocate_feature(size_rom={}, size_ram={})", size_rom, size_ram);
        let scratch = Scratch { page: &mut self.page, subsector: &mut self.subsector };
        match engine::allocate_feature(&mut self.flash, &self.cfg, &mut self.state, scratch, size_rom, size_ram) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("kf: allocate_feature failed: {}", e);
                None
            }
        }
    }

    /// Uninstall a feature. A no-op if `handle` is not currently USED.
    pub fn free_feature(&mut self, handle: FeatureHandle) {
        log::debug!("kf: free_feature(0x{:x})", handle.address());
        if let Err(e) = engine::free_feature(&mut self.flash, &self.cfg, &mut self.state, &mut self.page, handle) {
            log::error!("kf: free_feature failed: {}", e);
        }
    }

    /// Stream `data` into ROM at `dest`, buffering a partial trailing page
    /// until it fills or [`Catalog::flush_copy_to_rom`] is called.
    pub fn copy_to_rom(&mut self, dest: u32, data: &[u8]) -> Result<(), CatalogError<F::Error>> {
        log::debug!("kf: copy_to_rom(dest=0x{:x}, len={})", dest, data.len());
        let result = streamer::copy_to_rom(&mut self.flash, &self.cfg, &mut self.stream, &mut self.page, dest, data);
        if let Err(ref e) = result {
            log::error!("kf: copy_to_rom failed: {}", e);
        }
        result
    }

    /// Force out any partially filled page left by [`Catalog::copy_to_rom`].
    pub fn flush_copy_to_rom(&mut self) -> Result<(), CatalogError<F::Error>> {
        log::debug!("kf: flush_copy_to_rom");
        let result = streamer::flush(&mut self.flash, &mut self.stream, &mut self.page);
        if let Err(ref e) = result {
            log::error!("kf: flush_copy_to_rom failed: {}", e);
        }
        result
    }

    /// Report the outcome of the runtime's attempt to initialize a feature.
    /// Always succeeds from the caller's point of view: the three codes
    /// that mean the installed image itself is unusable trigger an
    /// automatic [`Catalog::free_feature`], and every other code is logged
    /// only.
    pub fn on_feature_initialization_error(&mut self, handle: FeatureHandle, code: FeatureInitError) {
        log::error!("kf: feature at 0x{:x} failed to initialize: {}", handle.address(), code);
        if code.triggers_auto_free() {
            self.free_feature(handle);
        }
    }
}
