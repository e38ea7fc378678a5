//! Media inventory: the ordered list of images a placeholder can claim.
//!
//! The converter extracts images as `image1.png`, `image2.jpeg`, … in the
//! order it meets them in the document. Pairing is positional, so the
//! inventory keeps the listing order exactly as given and only filters out
//! entries that are not raster images. Sorting the listing is the job of
//! whoever produced it (see [`crate::vault::FsVault::list_directory`]).

use crate::error::ReconcileWarning;
use serde::Serialize;
use tracing::{debug, warn};

/// One candidate image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAsset {
    /// File name as found on disk, without any directory part.
    pub original_name: String,
    /// Extension including the leading dot, in its on-disk case.
    pub extension: String,
    /// 0-based position within the inventory.
    pub ordinal: usize,
}

impl MediaAsset {
    /// Display name given to this asset inside a document called `base_name`.
    pub fn renamed(&self, base_name: &str) -> RenamedAsset<'_> {
        RenamedAsset {
            new_name: format!("{}-img{}{}", base_name, self.ordinal + 1, self.extension),
            asset: self,
        }
    }
}

/// An asset together with its derived display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedAsset<'a> {
    pub asset: &'a MediaAsset,
    pub new_name: String,
}

/// The ordered, filtered inventory for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInventory {
    assets: Vec<MediaAsset>,
}

impl MediaInventory {
    /// Build an inventory from directory entry names.
    ///
    /// Entries may carry a directory prefix (`media/x/image1.png`); only the
    /// last segment is kept. Extensions are compared case-insensitively
    /// against `allowed` (lower-case, no dot). Ordinals follow listing order.
    pub fn build<S: AsRef<str>>(listing: &[S], allowed: &[String]) -> Self {
        let assets: Vec<MediaAsset> = listing
            .iter()
            .filter_map(|entry| {
                let name = file_name(entry.as_ref());
                let dot = name.rfind('.').filter(|&i| i > 0)?;
                let ext = &name[dot + 1..];
                allowed
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(ext))
                    .then(|| (name.to_string(), name[dot..].to_string()))
            })
            .enumerate()
            .map(|(ordinal, (original_name, extension))| MediaAsset {
                original_name,
                extension,
                ordinal,
            })
            .collect();

        debug!(
            "Media inventory: {} of {} listed entries accepted",
            assets.len(),
            listing.len()
        );
        Self { assets }
    }

    /// Build from a listing that may have failed.
    ///
    /// A read failure is not fatal: the inventory is empty and the failure
    /// comes back as a warning so every placeholder turns into a visible
    /// not-found marker.
    pub fn from_listing_result<S: AsRef<str>>(
        dir: &str,
        listing: std::io::Result<Vec<S>>,
        allowed: &[String],
    ) -> (Self, Option<ReconcileWarning>) {
        match listing {
            Ok(entries) => (Self::build(&entries, allowed), None),
            Err(e) => {
                warn!("Cannot read media directory '{}': {}", dir, e);
                (
                    Self::default(),
                    Some(ReconcileWarning::InventoryRead {
                        dir: dir.to_string(),
                        reason: e.to_string(),
                    }),
                )
            }
        }
    }

    pub fn assets(&self) -> &[MediaAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Last path segment, accepting either separator.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
