//! The on-flash feature header: a fixed 32-byte, little-endian record at
//! the start of every slot.

use crate::config::Config;

/// Size in bytes of an encoded [`FeatureHeader`].
pub const HEADER_SIZE: usize = 32;

/// Effective state of a slot, discriminated by its `status` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The slot holds a live, installed feature.
    Used,
    /// The slot held a feature that has since been uninstalled.
    Removed,
    /// The slot has never been written since its last erase.
    Free,
}

impl Status {
    fn from_word(word: u32, cfg: &Config) -> Status {
        if word == cfg.used_magic {
            Status::Used
        } else if word == cfg.removed_magic {
            Status::Removed
        } else {
            Status::Free
        }
    }

    fn to_word(self, cfg: &Config) -> u32 {
        match self {
            Status::Used => cfg.used_magic,
            Status::Removed => cfg.removed_magic,
            Status::Free => crate::config::FREE_MAGIC,
        }
    }
}

/// Opaque identifier of an installed feature.
///
/// This is, bit for bit, the absolute flash address of the feature's
/// header — the same contract the original implementation uses — but
/// wrapped in a newtype so callers cannot do address arithmetic on it
/// directly. A handle survives across scans: it is always a slot base
/// address, and slot base addresses never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureHandle(pub u32);

impl FeatureHandle {
    /// The address this handle addresses, for passing to a
    /// [`crate::flash::FlashController`].
    pub fn address(self) -> u32 {
        self.0
    }
}

/// In-memory view of the 32-byte on-flash feature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureHeader {
    pub status: Status,
    pub nb_subsectors: u32,
    pub rom_address: u32,
    pub rom_size: u32,
    pub ram_address: u32,
    pub ram_size: u32,
    pub feature_index: u32,
}

impl FeatureHeader {
    /// Decode a header from its 32-byte little-endian on-flash encoding.
    ///
    /// `buf` must be at least [`HEADER_SIZE`] bytes; only the first
    /// `HEADER_SIZE` are consulted.
    pub fn decode(buf: &[u8], cfg: &Config) -> FeatureHeader {
        debug_assert!(buf.len() >= HEADER_SIZE);
        let word = |off: usize| -> u32 {
            u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
        };
        FeatureHeader {
            status: Status::from_word(word(0), cfg),
            nb_subsectors: word(4),
            rom_address: word(8),
            rom_size: word(12),
            ram_address: word(16),
            ram_size: word(20),
            feature_index: word(24),
        }
    }

    /// Encode this header into its 32-byte little-endian on-flash form,
    /// written into the first [`HEADER_SIZE`] bytes of `out`. The
    /// remaining bytes of `out` (the rest of the page) are left untouched —
    /// callers that need the "fill page tail with 0xFF" behavior of a
    /// freshly allocated header do that themselves, since only `allocate`
    /// needs it (`free` reuses the whole previous page image).
    pub fn encode(&self, out: &mut [u8], cfg: &Config) {
        debug_assert!(out.len() >= HEADER_SIZE);
        let mut put = |off: usize, v: u32| {
            out[off..off + 4].copy_from_slice(&v.to_le_bytes());
        };
        put(0, self.status.to_word(cfg));
        put(4, self.nb_subsectors);
        put(8, self.rom_address);
        put(12, self.rom_size);
        put(16, self.ram_address);
        put(20, self.ram_size);
        put(24, self.feature_index);
        put(28, 0xFFFF_FFFF); // reserved
    }
}
