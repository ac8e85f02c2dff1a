//! The catalog's process-wide cached view, rebuilt by every scan.

use crate::header::FeatureHandle;

/// Count of USED features and a handle to the most recently observed one.
///
/// Rebuilt wholesale by [`crate::scanner::scan_and_compact`]; adjusted
/// in-place (without a rescan) by [`crate::engine::free_feature`] and the
/// index-lookup path, exactly as the original's two module globals were.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogState {
    pub nb_features: u32,
    pub last_feature: Option<FeatureHandle>,
}

impl CatalogState {
    /// The state of a catalog with no installed features.
    pub fn empty() -> CatalogState {
        CatalogState { nb_features: 0, last_feature: None }
    }
}
