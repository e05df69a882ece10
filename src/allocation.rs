//! Allocation-derived impact: which types were instantiated during the run,
//! and which files define them and their ancestors.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::host::{AllocationEvent, HostRuntime, TypeId};
use crate::impact::ImpactedFileSet;
use crate::intern::lock;
use crate::path_filter::PathFilter;
use crate::resolver::ConstantResolver;

/// Records runtime types instantiated during a session.
///
/// Object creation is the highest-frequency event in the system, so the
/// per-event path is a kind check, a name check and one set insertion —
/// the expensive ancestor walk is deferred to `stop()`.
#[derive(Debug, Default)]
pub(crate) struct AllocationRecorder {
    types: Mutex<HashSet<TypeId>>,
}

impl AllocationRecorder {
    /// Per-event path. Skips value kinds and anonymous types; de-duplicates
    /// by type identity, keeping no count.
    pub(crate) fn record(&self, runtime: &dyn HostRuntime, event: &AllocationEvent) {
        if !event.kind.is_plain() {
            return;
        }
        if runtime.type_name(event.type_id).is_none() {
            return;
        }
        lock(&self.types).insert(event.type_id);
    }

    /// Take the recorded set, leaving the recorder empty for reuse.
    pub(crate) fn drain(&self) -> Vec<TypeId> {
        std::mem::take(&mut *lock(&self.types)).into_iter().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.types).len()
    }
}

/// Walk each recorded type's full ancestor/mixin chain, resolve every
/// ancestor's name to its defining file and feed it through the impacted
/// set. A failed ancestor enumeration means that type contributes nothing;
/// the session continues.
pub(crate) fn expand_ancestors(
    types: &[TypeId],
    runtime: &dyn HostRuntime,
    resolver: &ConstantResolver<'_>,
    filter: &PathFilter,
    impacted: &mut ImpactedFileSet,
) {
    for &ty in types {
        let ancestors = match runtime.ancestors(ty) {
            Ok(chain) => chain,
            Err(err) => {
                log::debug!("ancestor walk failed for {ty:?}: {err:#}");
                continue;
            }
        };
        for ancestor in ancestors {
            let Some(name) = runtime.type_name(ancestor) else {
                continue;
            };
            let Some(file) = resolver.resolve(&name) else {
                continue;
            };
            impacted.record(filter, file);
        }
    }
}
