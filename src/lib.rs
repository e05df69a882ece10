//! tracecov — file-granular test impact tracker.
//!
//! Computes, for one test execution, the set of source files that execution
//! touched. Touch is inferred from three signals observed during the run:
//!
//! - files whose lines actually execute,
//! - files defining the runtime types of objects instantiated during the run
//!   (including their full ancestor/mixin chain),
//! - files reachable transitively through named-constant references from
//!   files already known to be touched.
//!
//! The engine is reactive: a [`Tracker`] subscribes to a [`HostRuntime`]'s
//! line and allocation events, accumulates touched files while the host runs
//! the test, and on `stop()` saturates the set through ancestor chains and a
//! bounded fixed-point expansion over constant references. Constant
//! resolution and per-file reference extraction are cached process-wide in a
//! [`ProcessCache`], which callers can snapshot, replace or clear between
//! runs.
//!
//! ```
//! use std::sync::Arc;
//! use tracecov::{sim::SimRuntime, Tracker, TrackerConfig};
//!
//! let runtime = Arc::new(SimRuntime::new());
//! let mut tracker = Tracker::new(TrackerConfig::with_root("/repo"), runtime.clone());
//!
//! let impacted = tracker
//!     .record(|| {
//!         // the host fires events while the test executes
//!         runtime.fire_line("/repo/lib/a.rb");
//!     })
//!     .unwrap();
//! assert_eq!(impacted.get("/repo/lib/a.rb"), Some(&true));
//! ```

mod allocation;
mod cache;
mod digest;
mod error;
mod extract;
mod host;
mod impact;
mod intern;
mod path_filter;
mod resolver;
pub mod sim;
mod tracker;

pub use cache::{CacheData, ConstRefEntry, ProcessCache};
pub use digest::{ContentDigest, Xxh3Digest};
pub use error::TrackerError;
pub use extract::{extract_from_content, ReferenceExtractor, RegexExtractor};
pub use host::{
    AllocationEvent, AllocationHook, HookId, HookScope, HostRuntime, LineHook, ObjectKind, TypeId,
};
pub use impact::ImpactedFiles;
pub use intern::{PathInterner, SourcePath};
pub use path_filter::PathFilter;
pub use tracker::{Tracker, TrackerConfig};

/// Snapshot of the process-wide cache shared by trackers constructed via
/// [`Tracker::new`].
pub fn cache_snapshot() -> CacheData {
    ProcessCache::global().snapshot()
}

/// Replace the process-wide cache content (clear-then-merge).
pub fn replace_cache(data: CacheData) {
    ProcessCache::global().replace(data);
}

/// Replace the process-wide cache from an untyped JSON payload; fails fast
/// if the payload does not have the expected two-map shape.
pub fn replace_cache_json(payload: serde_json::Value) -> Result<(), TrackerError> {
    ProcessCache::global().replace_json(payload)
}

/// Reset the process-wide cache to present-but-empty maps.
pub fn clear_cache() {
    ProcessCache::global().clear();
}
