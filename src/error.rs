//! Catalog-internal errors and the runtime's feature-initialization outcome
//! codes.

use core::fmt;

use num_derive::{FromPrimitive, ToPrimitive};

/// Errors local to the catalog's own bookkeeping and flash interactions.
///
/// Every fallible operation in this crate returns one of these (wrapped in
/// a `Result`) rather than panicking; `Flash` carries the adapter's own
/// error type so a caller can still inspect device-specific detail.
#[derive(Debug)]
pub enum CatalogError<E> {
    /// One-time flash bring-up reported failure.
    FlashStartup(E),
    /// A subsector erase reported failure.
    FlashErase(E),
    /// A page program reported failure.
    FlashWrite(E),
    /// Enabling or disabling memory-mapped mode reported failure.
    MmapToggle(E),
    /// Every slot is already USED or REMOVED; no FREE slot remains.
    TooManyFeatures,
    /// Requested ROM size does not fit in a slot alongside the header.
    RomTooLarge,
    /// Requested RAM size exceeds the whole RAM arena.
    RamTooLarge,
    /// The RAM arena has no room left for this feature's RAM region.
    RamOverflow,
    /// `copy_to_rom`'s destination range falls outside `[kf_start, kf_end)`.
    RomRangeOutOfKf,
    /// `copy_to_rom`'s destination range spans more than one slot.
    RomRangeCrossesSlot,
    /// `max_nb_dynamic_features` is configured as zero.
    ConfigMaxFeaturesZero,
}

impl<E: fmt::Debug> fmt::Display for CatalogError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::FlashStartup(e) => write!(f, "flash startup failed: {:?}", e),
            CatalogError::FlashErase(e) => write!(f, "flash erase failed: {:?}", e),
            CatalogError::FlashWrite(e) => write!(f, "flash write failed: {:?}", e),
            CatalogError::MmapToggle(e) => write!(f, "memory-mapped mode toggle failed: {:?}", e),
            CatalogError::TooManyFeatures => write!(f, "too many features installed"),
            CatalogError::RomTooLarge => write!(f, "requested ROM size larger than maximum feature size"),
            CatalogError::RamTooLarge => write!(f, "requested RAM size larger than the RAM buffer"),
            CatalogError::RamOverflow => write!(f, "no more space to allocate RAM for feature"),
            CatalogError::RomRangeOutOfKf => {
                write!(f, "feature cannot be installed outside of the defined ROM area")
            }
            CatalogError::RomRangeCrossesSlot => {
                write!(f, "the ROM copy overlaps another feature slot")
            }
            CatalogError::ConfigMaxFeaturesZero => {
                write!(f, "max_nb_dynamic_features is configured as zero")
            }
        }
    }
}

/// Outcome codes the host runtime reports back after attempting to
/// initialize a freshly installed feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum FeatureInitError {
    CorruptedContent = 0,
    IncompatibleKernelWrongUid = 1,
    TooManyInstalled = 2,
    AlreadyInstalled = 3,
    IncompatibleKernelWrongAddresses = 4,
    RomOverlap = 5,
    RamOverlap = 6,
    RamAddressChanged = 7,
}

impl FeatureInitError {
    /// Human-readable name, matching the taxonomy in the spec's error
    /// handling section. Equivalent to the original's
    /// `llkernel_error_code_to_str`.
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureInitError::CorruptedContent => "CORRUPTED_CONTENT",
            FeatureInitError::IncompatibleKernelWrongUid => "INCOMPATIBLE_KERNEL_WRONG_UID",
            FeatureInitError::TooManyInstalled => "TOO_MANY_INSTALLED",
            FeatureInitError::AlreadyInstalled => "ALREADY_INSTALLED",
            FeatureInitError::IncompatibleKernelWrongAddresses => {
                "INCOMPATIBLE_KERNEL_WRONG_ADDRESSES"
            }
            FeatureInitError::RomOverlap => "ROM_OVERLAP",
            FeatureInitError::RamOverlap => "RAM_OVERLAP",
            FeatureInitError::RamAddressChanged => "RAM_ADDRESS_CHANGED",
        }
    }

    /// Whether this outcome should trigger an automatic
    /// [`crate::Catalog::free_feature`] of the offending handle.
    pub fn triggers_auto_free(self) -> bool {
        matches!(
            self,
            FeatureInitError::CorruptedContent
                | FeatureInitError::IncompatibleKernelWrongUid
                | FeatureInitError::IncompatibleKernelWrongAddresses
        )
    }
}

impl fmt::Display for FeatureInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{FromPrimitive, ToPrimitive};

    #[test]
    fn wire_codes_round_trip() {
        let all = [
            FeatureInitError::CorruptedContent,
            FeatureInitError::IncompatibleKernelWrongUid,
            FeatureInitError::TooManyInstalled,
            FeatureInitError::AlreadyInstalled,
            FeatureInitError::IncompatibleKernelWrongAddresses,
            FeatureInitError::RomOverlap,
            FeatureInitError::RamOverlap,
            FeatureInitError::RamAddressChanged,
        ];
        for variant in all {
            let code = variant.to_u32().unwrap();
            assert_eq!(FeatureInitError::from_u32(code), Some(variant));
        }
    }

    #[test]
    fn auto_free_taxonomy_matches_spec() {
        assert!(FeatureInitError::CorruptedContent.triggers_auto_free());
        assert!(FeatureInitError::IncompatibleKernelWrongUid.triggers_auto_free());
        assert!(FeatureInitError::IncompatibleKernelWrongAddresses.triggers_auto_free());
        assert!(!FeatureInitError::TooManyInstalled.triggers_auto_free());
        assert!(!FeatureInitError::AlreadyInstalled.triggers_auto_free());
        assert!(!FeatureInitError::RomOverlap.triggers_auto_free());
        assert!(!FeatureInitError::RamOverlap.triggers_auto_free());
        assert!(!FeatureInitError::RamAddressChanged.triggers_auto_free());
    }

    #[test]
    fn display_matches_taxonomy_names() {
        assert_eq!(FeatureInitError::RamAddressChanged.to_string(), "RAM_ADDRESS_CHANGED");
    }
}
