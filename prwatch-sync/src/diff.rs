//! URL-keyed delta between a surface's existing entries and the target set.

use std::collections::HashSet;

use serde::Serialize;

use prwatch_core::types::{ItemKey, TargetSet};

/// What a reconciler must remove and create to make a surface match a
/// [`TargetSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceDiff<Id> {
    /// Entries to delete: URL not targeted, or a repeat of a URL already kept.
    pub stale: Vec<Id>,
    /// Target keys with no existing entry, in target-set order.
    pub missing: Vec<ItemKey>,
    /// Entries left in place.
    pub kept: usize,
}

impl<Id> SurfaceDiff<Id> {
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.missing.is_empty()
    }
}

/// Compute the delta for `existing` `(url, id)` pairs.
///
/// The first entry seen for a targeted URL is kept; later entries with the
/// same URL are stale so each key ends up present exactly once.
pub fn diff_surface<Id>(
    existing: impl IntoIterator<Item = (ItemKey, Id)>,
    target: &TargetSet,
) -> SurfaceDiff<Id> {
    let mut seen = HashSet::new();
    let mut stale = Vec::new();
    for (key, id) in existing {
        if !target.contains(&key) || !seen.insert(key) {
            stale.push(id);
        }
    }
    let kept = seen.len();
    let missing = target
        .keys()
        .filter(|key| !seen.contains(*key))
        .cloned()
        .collect();
    SurfaceDiff {
        stale,
        missing,
        kept,
    }
}

/// Outcome of applying a diff to one surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub removed: usize,
    /// The folder or group had to be created this run.
    pub bootstrapped: bool,
}
