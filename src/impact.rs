//! Accumulator of touched files for one tracking session.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::path_filter::PathFilter;

/// The result of a tracking session: impacted file path → `true`, ordered.
pub type ImpactedFiles = BTreeMap<String, bool>;

/// Grow-only set of impacted files. Every path that makes it in has passed
/// the session's [`PathFilter`]; insertion is idempotent.
#[derive(Debug, Default)]
pub(crate) struct ImpactedFileSet {
    files: HashSet<Arc<str>>,
}

impl ImpactedFileSet {
    /// Apply the filter and insert. Returns true only when the path was
    /// included *and* not already present — the fixed-point resolver uses
    /// this to decide whether a round made progress.
    pub(crate) fn record(&mut self, filter: &PathFilter, path: Arc<str>) -> bool {
        if !filter.includes(&path) {
            return false;
        }
        self.files.insert(path)
    }

    /// Snapshot of the current keys, for iteration while the set grows.
    pub(crate) fn keys(&self) -> Vec<Arc<str>> {
        self.files.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn into_map(self) -> ImpactedFiles {
        self.files
            .into_iter()
            .map(|path| (path.to_string(), true))
            .collect()
    }
}
