//! Tracker lifecycle: the public surface tying the event hooks, the
//! allocation recorder, the impacted set and the fixed-point resolver
//! together.

use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use serde::{Deserialize, Serialize};

use crate::allocation::{expand_ancestors, AllocationRecorder};
use crate::cache::ProcessCache;
use crate::digest::{ContentDigest, Xxh3Digest};
use crate::error::TrackerError;
use crate::extract::{ReferenceExtractor, RegexExtractor};
use crate::host::{AllocationEvent, AllocationHook, HookId, HookScope, HostRuntime, LineHook};
use crate::impact::{ImpactedFileSet, ImpactedFiles};
use crate::intern::{lock, SourcePath};
use crate::path_filter::PathFilter;
use crate::resolver::{resolve_constant_references, ConstantResolver};

fn bool_true() -> bool {
    true
}

fn default_root() -> String {
    std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Tracker construction options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Only files under this path count as impacted. Defaults to the current
    /// working directory; `start()` fails if it ends up empty.
    #[serde(default = "default_root")]
    pub root: String,

    /// Files under this prefix are excluded even when under `root`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_path: Option<String>,

    /// true: one process-wide line hook observed by every thread.
    /// false: hook only the thread that calls `start()`.
    #[serde(default = "bool_true")]
    pub threads: bool,

    /// Expand the impacted set through constant references at `stop()`.
    #[serde(default = "bool_true")]
    pub constant_references: bool,

    /// Record instantiated types and attribute their ancestor chains.
    #[serde(default = "bool_true")]
    pub allocations: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            ignored_path: None,
            threads: true,
            constant_references: true,
            allocations: true,
        }
    }
}

impl TrackerConfig {
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

/// Per-session mutable state, shared with the host's event callbacks.
/// Mutex-protected: in multi-thread mode callbacks arrive from concurrently
/// executing threads.
struct Session {
    filter: PathFilter,
    state: Mutex<SessionState>,
    allocations: AllocationRecorder,
}

#[derive(Default)]
struct SessionState {
    impacted: ImpactedFileSet,
    last_file: Option<SourcePath>,
}

impl LineHook for Session {
    fn on_line(&self, runtime: &dyn HostRuntime) {
        // exactly one frame is requested; with none, the event cannot be
        // attributed to a file
        let Some(frame) = runtime.top_frame() else {
            return;
        };

        let mut state = lock(&self.state);

        // Consecutive events from the same file are dropped by handle
        // identity. An A→B→A excursion records A twice, which is harmless:
        // the impacted set is a set. This yields file-granular touch
        // detection, not line coverage.
        if let Some(last) = &state.last_file {
            if last.same_handle(&frame) {
                return;
            }
        }
        state.last_file = Some(frame.clone());
        state.impacted.record(&self.filter, frame.into_arc());
    }
}

impl AllocationHook for Session {
    fn on_allocation(&self, runtime: &dyn HostRuntime, event: &AllocationEvent) {
        self.allocations.record(runtime, event);
    }
}

#[derive(Clone, Copy)]
enum RunState {
    Idle,
    Running {
        line_hook: HookId,
        alloc_hook: Option<HookId>,
        started_by: ThreadId,
    },
}

/// Tracks which source files one test execution touches.
///
/// `start()` subscribes to the host's line (and optionally allocation)
/// events; `stop()` detaches them, expands the impacted set through ancestor
/// chains and constant references, and returns the result. A tracker is
/// owned by its creator and can be reused: `stop()` resets transient state
/// but keeps the configuration.
pub struct Tracker {
    config: TrackerConfig,
    runtime: Arc<dyn HostRuntime>,
    digester: Arc<dyn ContentDigest>,
    extractor: Arc<dyn ReferenceExtractor>,
    cache: Arc<ProcessCache>,
    session: Arc<Session>,
    run: RunState,
}

impl Tracker {
    /// Tracker with the default collaborators: XXH3 digests, the regex
    /// reference extractor and the process-wide cache.
    pub fn new(config: TrackerConfig, runtime: Arc<dyn HostRuntime>) -> Self {
        Self::with_collaborators(
            config,
            runtime,
            Arc::new(Xxh3Digest),
            Arc::new(RegexExtractor),
            ProcessCache::global(),
        )
    }

    /// Tracker with explicit collaborators, e.g. a real parser for
    /// extraction or an isolated cache.
    pub fn with_collaborators(
        config: TrackerConfig,
        runtime: Arc<dyn HostRuntime>,
        digester: Arc<dyn ContentDigest>,
        extractor: Arc<dyn ReferenceExtractor>,
        cache: Arc<ProcessCache>,
    ) -> Self {
        let session = Arc::new(Session {
            filter: PathFilter::new(config.root.clone(), config.ignored_path.clone()),
            state: Mutex::new(SessionState::default()),
            allocations: AllocationRecorder::default(),
        });
        Self {
            config,
            runtime,
            digester,
            extractor,
            cache,
            session,
            run: RunState::Idle,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(self.run, RunState::Running { .. })
    }

    /// Subscribe the event hooks and begin tracking.
    pub fn start(&mut self) -> Result<(), TrackerError> {
        if self.is_running() {
            return Err(TrackerError::AlreadyStarted);
        }
        if self.config.root.is_empty() {
            return Err(TrackerError::RootRequired);
        }

        let scope = if self.config.threads {
            HookScope::AllThreads
        } else {
            HookScope::CurrentThread
        };
        let line: Arc<dyn LineHook> = self.session.clone();
        let line_hook = self.runtime.subscribe_line(scope, line);
        let alloc_hook = if self.config.allocations {
            let alloc: Arc<dyn AllocationHook> = self.session.clone();
            Some(self.runtime.subscribe_allocation(alloc))
        } else {
            None
        };

        self.run = RunState::Running {
            line_hook,
            alloc_hook,
            started_by: std::thread::current().id(),
        };
        log::debug!("tracking started, root={}", self.config.root);
        Ok(())
    }

    /// Scoped form: start, run `work`, then stop and return its result.
    pub fn record<F: FnOnce()>(&mut self, work: F) -> Result<ImpactedFiles, TrackerError> {
        self.start()?;
        work();
        self.stop()
    }

    /// Detach all hooks, expand the impacted set and return it, resetting
    /// transient state so the tracker can be started again.
    ///
    /// In single-thread mode this must run on the thread that called
    /// `start()`; a foreign-thread call fails and leaves the session
    /// running.
    pub fn stop(&mut self) -> Result<ImpactedFiles, TrackerError> {
        let (line_hook, alloc_hook, started_by) = match self.run {
            RunState::Idle => return Err(TrackerError::NotStarted),
            RunState::Running {
                line_hook,
                alloc_hook,
                started_by,
            } => (line_hook, alloc_hook, started_by),
        };
        if !self.config.threads && std::thread::current().id() != started_by {
            return Err(TrackerError::ForeignThread);
        }

        // Detach before touching state, so no further callback can observe
        // or mutate a stopped session.
        self.runtime.unsubscribe(line_hook);
        if let Some(id) = alloc_hook {
            self.runtime.unsubscribe(id);
        }
        self.run = RunState::Idle;

        let mut impacted = {
            let mut state = lock(&self.session.state);
            state.last_file = None;
            std::mem::take(&mut state.impacted)
        };

        if self.config.allocations {
            let types = self.session.allocations.drain();
            let resolver = ConstantResolver {
                cache: &self.cache,
                runtime: self.runtime.as_ref(),
            };
            expand_ancestors(
                &types,
                self.runtime.as_ref(),
                &resolver,
                &self.session.filter,
                &mut impacted,
            );
        }

        if self.config.constant_references {
            resolve_constant_references(
                &mut impacted,
                &self.session.filter,
                &self.cache,
                self.runtime.as_ref(),
                self.digester.as_ref(),
                self.extractor.as_ref(),
            );
        }

        log::debug!("tracking stopped, {} file(s) impacted", impacted.len());
        Ok(impacted.into_map())
    }
}
