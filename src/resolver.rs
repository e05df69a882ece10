//! Constant resolution: name → defining file, digest-cached reference
//! extraction, and the fixed-point expansion run at `stop()`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::cache::ProcessCache;
use crate::digest::ContentDigest;
use crate::extract::ReferenceExtractor;
use crate::host::HostRuntime;
use crate::impact::ImpactedFileSet;
use crate::path_filter::PathFilter;

/// Round cap for the fixed-point resolution. Reference cycles converge well
/// before this because each file is parsed and each name resolved at most
/// once per `stop()`; the cap guarantees termination regardless.
pub(crate) const MAX_RESOLUTION_ROUNDS: usize = 10;

/// Resolves a constant name to its defining file via the host, backed by the
/// process-wide `const_locations` map.
pub(crate) struct ConstantResolver<'a> {
    pub(crate) cache: &'a ProcessCache,
    pub(crate) runtime: &'a dyn HostRuntime,
}

impl ConstantResolver<'_> {
    /// `None` when the name is unresolvable, the lookup fails inside the
    /// host, or the host returns a malformed (empty) location. Failures are
    /// never propagated and never cached — a later definition of the same
    /// name can still resolve.
    pub(crate) fn resolve(&self, name: &str) -> Option<Arc<str>> {
        if let Some(hit) = self.cache.lookup_location(name) {
            return Some(hit);
        }

        let located = match self.runtime.const_source_location(name) {
            Ok(located) => located,
            Err(err) => {
                log::debug!("const lookup failed for {name}: {err:#}");
                None
            }
        }?;
        if located.is_empty() {
            return None;
        }

        Some(self.cache.store_location(name, &located))
    }
}

/// Referenced constant names for `file`, via the digest-keyed extraction
/// cache.
///
/// A digest failure (file vanished) or extraction failure evicts any stale
/// cache entry and yields `None`; a digest hit returns the cached list
/// without invoking the extractor.
pub(crate) fn cached_references(
    cache: &ProcessCache,
    digester: &dyn ContentDigest,
    extractor: &dyn ReferenceExtractor,
    file: &str,
) -> Option<Vec<Arc<str>>> {
    let digest = match digester.digest(Path::new(file)) {
        Ok(digest) => digest,
        Err(err) => {
            log::debug!("digest failed for {file}: {err:#}");
            cache.evict_refs(file);
            return None;
        }
    };

    if let Some(refs) = cache.lookup_refs(file, &digest) {
        return Some(refs);
    }

    match extractor.extract(Path::new(file)) {
        Ok(names) => Some(cache.store_refs(file, digest, names)),
        Err(err) => {
            log::debug!("extraction failed for {file}: {err:#}");
            cache.evict_refs(file);
            None
        }
    }
}

/// Iteratively saturate the impacted set through constant references.
///
/// Each round snapshots the current keys, extracts references from files not
/// yet processed this call, resolves names not yet seen this call, and adds
/// resolved files that pass the filter. Halts as soon as a round adds
/// nothing new, or after [`MAX_RESOLUTION_ROUNDS`].
pub(crate) fn resolve_constant_references(
    impacted: &mut ImpactedFileSet,
    filter: &PathFilter,
    cache: &ProcessCache,
    runtime: &dyn HostRuntime,
    digester: &dyn ContentDigest,
    extractor: &dyn ReferenceExtractor,
) {
    let resolver = ConstantResolver { cache, runtime };
    let mut processed_files: HashSet<Arc<str>> = HashSet::new();
    let mut seen_consts: HashSet<Arc<str>> = HashSet::new();

    for round in 0..MAX_RESOLUTION_ROUNDS {
        let mut found_new_file = false;

        for file in impacted.keys() {
            if !processed_files.insert(Arc::clone(&file)) {
                continue;
            }

            let Some(names) = cached_references(cache, digester, extractor, &file) else {
                continue;
            };

            for name in names {
                if !seen_consts.insert(Arc::clone(&name)) {
                    continue;
                }
                let Some(resolved) = resolver.resolve(&name) else {
                    continue;
                };
                if impacted.record(filter, resolved) {
                    found_new_file = true;
                }
            }
        }

        if !found_new_file {
            log::debug!(
                "constant resolution converged after {} round(s), {} file(s) impacted",
                round + 1,
                impacted.len()
            );
            return;
        }
    }

    log::debug!(
        "constant resolution stopped at the {MAX_RESOLUTION_ROUNDS}-round cap, {} file(s) impacted",
        impacted.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRuntime;
    use anyhow::anyhow;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExtractor {
        calls: AtomicUsize,
        names: Vec<String>,
    }

    impl CountingExtractor {
        fn new(names: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                names: names.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReferenceExtractor for CountingExtractor {
        fn extract(&self, _path: &Path) -> anyhow::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.names.clone())
        }
    }

    struct FailingExtractor;

    impl ReferenceExtractor for FailingExtractor {
        fn extract(&self, path: &Path) -> anyhow::Result<Vec<String>> {
            Err(anyhow!("parse error in {}", path.display()))
        }
    }

    fn temp_source(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(content).expect("write");
        f.flush().expect("flush");
        f
    }

    #[test]
    fn resolve_caches_successful_lookups() {
        let cache = ProcessCache::new();
        let runtime = SimRuntime::new();
        runtime.define_const("BAR", "/repo/lib/bar.rb");
        let resolver = ConstantResolver {
            cache: &cache,
            runtime: &runtime,
        };

        assert_eq!(resolver.resolve("BAR").as_deref(), Some("/repo/lib/bar.rb"));
        assert_eq!(runtime.const_lookup_count(), 1);
        // second resolve is served from the cache
        assert_eq!(resolver.resolve("BAR").as_deref(), Some("/repo/lib/bar.rb"));
        assert_eq!(runtime.const_lookup_count(), 1);
    }

    #[test]
    fn failed_lookups_are_absent_and_not_cached() {
        let cache = ProcessCache::new();
        let runtime = SimRuntime::new();
        runtime.fail_const("BROKEN");
        let resolver = ConstantResolver {
            cache: &cache,
            runtime: &runtime,
        };

        assert!(resolver.resolve("BROKEN").is_none());
        assert!(resolver.resolve("UNKNOWN").is_none());

        // a later definition still resolves — failures were not cached
        runtime.define_const("UNKNOWN", "/repo/lib/unknown.rb");
        assert_eq!(
            resolver.resolve("UNKNOWN").as_deref(),
            Some("/repo/lib/unknown.rb")
        );
    }

    #[test]
    fn unchanged_file_is_extracted_exactly_once() {
        let cache = ProcessCache::new();
        let digester = crate::digest::Xxh3Digest;
        let extractor = CountingExtractor::new(&["BAR"]);
        let file = temp_source(b"x = BAR\n");
        let path = file.path().to_string_lossy().to_string();

        let first = cached_references(&cache, &digester, &extractor, &path).expect("refs");
        let second = cached_references(&cache, &digester, &extractor, &path).expect("refs");
        assert_eq!(first, second);
        assert_eq!(extractor.calls(), 1);
    }

    #[test]
    fn changed_content_forces_one_reextraction() {
        let cache = ProcessCache::new();
        let digester = crate::digest::Xxh3Digest;
        let extractor = CountingExtractor::new(&["BAR"]);
        let mut file = temp_source(b"x = BAR\n");
        let path = file.path().to_string_lossy().to_string();

        cached_references(&cache, &digester, &extractor, &path).expect("refs");
        file.write_all(b"y = QUX\n").expect("append");
        file.flush().expect("flush");

        cached_references(&cache, &digester, &extractor, &path).expect("refs");
        cached_references(&cache, &digester, &extractor, &path).expect("refs");
        assert_eq!(extractor.calls(), 2);
    }

    #[test]
    fn digest_failure_evicts_and_returns_none() {
        let cache = ProcessCache::new();
        let digester = crate::digest::Xxh3Digest;
        let extractor = CountingExtractor::new(&["BAR"]);

        // seed a cache entry, then make the file vanish
        let file = temp_source(b"x = BAR\n");
        let path = file.path().to_string_lossy().to_string();
        let digest = digester.digest(file.path()).expect("digest");
        cached_references(&cache, &digester, &extractor, &path).expect("refs");
        drop(file);

        assert!(cached_references(&cache, &digester, &extractor, &path).is_none());
        assert!(cache.lookup_refs(&path, &digest).is_none());
    }

    #[test]
    fn extraction_failure_evicts_and_returns_none() {
        let cache = ProcessCache::new();
        let digester = crate::digest::Xxh3Digest;
        let file = temp_source(b"x = BAR\n");
        let path = file.path().to_string_lossy().to_string();
        let digest = digester.digest(file.path()).expect("digest");

        cache.store_refs(&path, "stale-digest".to_string(), vec!["OLD".to_string()]);
        assert!(cached_references(&cache, &digester, &FailingExtractor, &path).is_none());
        assert!(cache.lookup_refs(&path, &digest).is_none());
        assert!(cache.lookup_refs(&path, "stale-digest").is_none());
    }
}
