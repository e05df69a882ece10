//! Process-lifetime cache of resolved constant locations and per-file
//! extracted references.
//!
//! Resolving a constant's defining file and parsing a file for the constants
//! it references are both expensive and typically stable across many test
//! runs in one process, so this cache is intentionally process-wide rather
//! than per-tracker. Callers may snapshot it, replace it (e.g. restoring a
//! snapshot persisted by a previous process) or clear it between runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::intern::{lock, PathInterner};

/// Cached extraction result for one file: the content digest the references
/// were extracted under, plus the ordered reference list itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstRefEntry {
    pub digest: String,
    pub refs: Vec<String>,
}

/// Plain-data snapshot of the process cache, suitable for serialization.
///
/// Both sub-maps are always present; a payload omitting one deserializes to
/// an empty map. Unknown keys are rejected so a malformed replacement payload
/// fails fast instead of being silently coerced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheData {
    #[serde(default)]
    pub const_refs: BTreeMap<String, ConstRefEntry>,
    #[serde(default)]
    pub const_locations: BTreeMap<String, String>,
}

struct RefEntry {
    digest: String,
    refs: Vec<Arc<str>>,
}

/// Shared, process-lifetime key-value stores backing constant resolution.
///
/// Two independent maps:
/// - `const_refs`: file path → digest + extracted reference names. An entry
///   is replaced whenever the file's digest changes and evicted when digest
///   computation or extraction fails.
/// - `const_locations`: constant name → defining file path. Entries are
///   immutable once written and never proactively invalidated.
///
/// Both maps are mutex-protected: line and allocation callbacks may arrive
/// from concurrently executing threads.
pub struct ProcessCache {
    interner: PathInterner,
    const_refs: Mutex<HashMap<Arc<str>, RefEntry>>,
    const_locations: Mutex<HashMap<Arc<str>, Arc<str>>>,
}

lazy_static! {
    static ref GLOBAL: Arc<ProcessCache> = Arc::new(ProcessCache::new());
}

impl Default for ProcessCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessCache {
    pub fn new() -> Self {
        Self {
            interner: PathInterner::new(),
            const_refs: Mutex::new(HashMap::new()),
            const_locations: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache instance shared by trackers that are not given
    /// an explicit one.
    pub fn global() -> Arc<ProcessCache> {
        Arc::clone(&GLOBAL)
    }

    /// Snapshot both maps as plain data, ordered for determinism.
    pub fn snapshot(&self) -> CacheData {
        let const_refs = lock(&self.const_refs)
            .iter()
            .map(|(path, entry)| {
                (
                    path.to_string(),
                    ConstRefEntry {
                        digest: entry.digest.clone(),
                        refs: entry.refs.iter().map(|r| r.to_string()).collect(),
                    },
                )
            })
            .collect();
        let const_locations = lock(&self.const_locations)
            .iter()
            .map(|(name, path)| (name.to_string(), path.to_string()))
            .collect();
        CacheData {
            const_refs,
            const_locations,
        }
    }

    /// Replace the cache content: clear both maps, then merge in `data`
    /// key-by-key.
    pub fn replace(&self, data: CacheData) {
        {
            let mut refs = lock(&self.const_refs);
            refs.clear();
            for (path, entry) in data.const_refs {
                let path = self.interner.intern(&path);
                let refs_interned = entry
                    .refs
                    .iter()
                    .map(|r| self.interner.intern(r))
                    .collect();
                refs.insert(
                    path,
                    RefEntry {
                        digest: entry.digest,
                        refs: refs_interned,
                    },
                );
            }
        }
        let mut locations = lock(&self.const_locations);
        locations.clear();
        for (name, path) in data.const_locations {
            locations.insert(self.interner.intern(&name), self.interner.intern(&path));
        }
    }

    /// Replace from an untyped JSON payload, e.g. one loaded from a snapshot
    /// persisted by a previous process. Fails fast if the payload does not
    /// have the expected two-map shape.
    pub fn replace_json(&self, payload: serde_json::Value) -> Result<(), TrackerError> {
        let data: CacheData =
            serde_json::from_value(payload).map_err(TrackerError::InvalidCachePayload)?;
        self.replace(data);
        Ok(())
    }

    /// Reset both maps to present-but-empty.
    pub fn clear(&self) {
        lock(&self.const_refs).clear();
        lock(&self.const_locations).clear();
    }

    pub(crate) fn intern(&self, value: &str) -> Arc<str> {
        self.interner.intern(value)
    }

    /// Cached reference list for `path`, but only if the cached digest still
    /// matches the file's current digest.
    pub(crate) fn lookup_refs(&self, path: &str, digest: &str) -> Option<Vec<Arc<str>>> {
        let refs = lock(&self.const_refs);
        let entry = refs.get(path)?;
        if entry.digest == digest {
            Some(entry.refs.clone())
        } else {
            None
        }
    }

    /// Store (or overwrite) the extraction result for `path`.
    pub(crate) fn store_refs(
        &self,
        path: &str,
        digest: String,
        names: Vec<String>,
    ) -> Vec<Arc<str>> {
        let path = self.interner.intern(path);
        let names: Vec<Arc<str>> = names.iter().map(|n| self.interner.intern(n)).collect();
        lock(&self.const_refs).insert(
            path,
            RefEntry {
                digest,
                refs: names.clone(),
            },
        );
        names
    }

    /// Drop any cached extraction result for `path`. Called when digest
    /// computation or extraction fails, so stale state cannot block a later
    /// successful attempt.
    pub(crate) fn evict_refs(&self, path: &str) {
        lock(&self.const_refs).remove(path);
    }

    pub(crate) fn lookup_location(&self, name: &str) -> Option<Arc<str>> {
        lock(&self.const_locations).get(name).cloned()
    }

    /// Record a successful resolution. Entries are immutable once written:
    /// a second store for the same name keeps the first location.
    pub(crate) fn store_location(&self, name: &str, path: &str) -> Arc<str> {
        let name = self.interner.intern(name);
        let path = self.interner.intern(path);
        Arc::clone(
            lock(&self.const_locations)
                .entry(name)
                .or_insert(path),
        )
    }
}
