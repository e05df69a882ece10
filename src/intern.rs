//! Shared-string interning for file paths and constant names.
//!
//! Interning serves two purposes. Repeated lookups of structurally identical
//! names must not grow memory without bound, so the process cache stores one
//! shared allocation per distinct string. And the line-event hot path dedupes
//! consecutive events by comparing interned handles in O(1) instead of
//! comparing path strings byte-by-byte.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Interns strings into shared `Arc<str>` handles. Two `intern` calls with
/// equal input return pointer-identical handles for the interner's lifetime.
#[derive(Debug, Default)]
pub struct PathInterner {
    table: Mutex<HashSet<Arc<str>>>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, value: &str) -> Arc<str> {
        let mut table = lock(&self.table);
        if let Some(existing) = table.get(value) {
            return Arc::clone(existing);
        }
        let shared: Arc<str> = Arc::from(value);
        table.insert(Arc::clone(&shared));
        shared
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.table).len()
    }
}

/// An interned source-file path as handed out by a host runtime.
///
/// Equality and hashing compare contents; [`SourcePath::same_handle`] compares
/// the underlying allocation, which is what the consecutive-event dedup uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePath(Arc<str>);

impl SourcePath {
    pub fn new(interner: &PathInterner, path: &str) -> Self {
        Self(interner.intern(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// O(1) identity comparison of the interned allocation. Two handles for
    /// the same path minted by the same interner always compare equal here;
    /// handles from different interners may not, which only costs a redundant
    /// (idempotent) set insertion downstream.
    pub fn same_handle(&self, other: &SourcePath) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn into_arc(self) -> Arc<str> {
        self.0
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked. The
/// protected maps and sets stay structurally valid across panics.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
