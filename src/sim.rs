//! In-memory host runtime for tests and embedders.
//!
//! A [`SimRuntime`] is scripted up front (constant locations, type names,
//! ancestor chains) and then driven with [`SimRuntime::fire_line`] /
//! [`SimRuntime::fire_allocation`], which deliver events to subscribed hooks
//! exactly the way a real host VM would: the frame is set first, then every
//! eligible hook runs on the firing thread.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use anyhow::{anyhow, Result};

use crate::host::{
    AllocationEvent, AllocationHook, HookId, HookScope, HostRuntime, LineHook, ObjectKind, TypeId,
};
use crate::intern::{lock, PathInterner, SourcePath};

#[derive(Default)]
struct SimState {
    next_hook: u64,
    line_hooks: Vec<LineSubscription>,
    alloc_hooks: Vec<(HookId, Arc<dyn AllocationHook>)>,
    frame: Option<SourcePath>,
    const_locations: HashMap<String, String>,
    failing_consts: HashSet<String>,
    const_lookups: usize,
    type_names: HashMap<TypeId, String>,
    ancestor_chains: HashMap<TypeId, Vec<TypeId>>,
    failing_ancestors: HashSet<TypeId>,
}

struct LineSubscription {
    id: HookId,
    scope: HookScope,
    subscriber: ThreadId,
    hook: Arc<dyn LineHook>,
}

/// Scriptable in-memory implementation of [`HostRuntime`].
#[derive(Default)]
pub struct SimRuntime {
    interner: PathInterner,
    state: Mutex<SimState>,
}

impl SimRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the defining file for a constant name.
    pub fn define_const(&self, name: &str, path: &str) {
        lock(&self.state)
            .const_locations
            .insert(name.to_string(), path.to_string());
    }

    /// Make defining-file lookups for `name` fail, as a raising host lookup
    /// would.
    pub fn fail_const(&self, name: &str) {
        lock(&self.state).failing_consts.insert(name.to_string());
    }

    /// Script a runtime type: optional resolvable name plus its ancestors.
    /// The type itself heads its own ancestor chain, mirroring how hosts
    /// report the chain.
    pub fn define_type(&self, ty: TypeId, name: Option<&str>, ancestors: &[TypeId]) {
        let mut state = lock(&self.state);
        if let Some(name) = name {
            state.type_names.insert(ty, name.to_string());
        }
        let mut chain = vec![ty];
        chain.extend_from_slice(ancestors);
        state.ancestor_chains.insert(ty, chain);
    }

    /// Make ancestor enumeration for `ty` fail.
    pub fn fail_ancestors(&self, ty: TypeId) {
        lock(&self.state).failing_ancestors.insert(ty);
    }

    /// Deliver a "line about to execute" event attributed to `path`. The
    /// path handle is interned, so repeated events for the same file hand
    /// hooks an identical handle.
    pub fn fire_line(&self, path: &str) {
        let frame = SourcePath::new(&self.interner, path);
        self.deliver_line(Some(frame));
    }

    /// Deliver a line event with no stack frame available.
    pub fn fire_line_without_frame(&self) {
        self.deliver_line(None);
    }

    fn deliver_line(&self, frame: Option<SourcePath>) {
        let hooks: Vec<Arc<dyn LineHook>> = {
            let mut state = lock(&self.state);
            state.frame = frame;
            let current = std::thread::current().id();
            state
                .line_hooks
                .iter()
                .filter(|sub| match sub.scope {
                    HookScope::AllThreads => true,
                    HookScope::CurrentThread => sub.subscriber == current,
                })
                .map(|sub| Arc::clone(&sub.hook))
                .collect()
        };
        // hooks re-enter the runtime (top_frame), so invoke them unlocked
        for hook in hooks {
            hook.on_line(self);
        }
    }

    /// Deliver an "object created" event.
    pub fn fire_allocation(&self, kind: ObjectKind, ty: TypeId) {
        let hooks: Vec<Arc<dyn AllocationHook>> = lock(&self.state)
            .alloc_hooks
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        let event = AllocationEvent { kind, type_id: ty };
        for hook in hooks {
            hook.on_allocation(self, &event);
        }
    }

    /// Number of live line subscriptions (for asserting detach on stop).
    pub fn line_hook_count(&self) -> usize {
        lock(&self.state).line_hooks.len()
    }

    /// Number of live allocation subscriptions.
    pub fn allocation_hook_count(&self) -> usize {
        lock(&self.state).alloc_hooks.len()
    }

    /// How many defining-file lookups reached the host (cache misses).
    pub fn const_lookup_count(&self) -> usize {
        lock(&self.state).const_lookups
    }
}

impl HostRuntime for SimRuntime {
    fn subscribe_line(&self, scope: HookScope, hook: Arc<dyn LineHook>) -> HookId {
        let mut state = lock(&self.state);
        state.next_hook += 1;
        let id = HookId(state.next_hook);
        state.line_hooks.push(LineSubscription {
            id,
            scope,
            subscriber: std::thread::current().id(),
            hook,
        });
        id
    }

    fn subscribe_allocation(&self, hook: Arc<dyn AllocationHook>) -> HookId {
        let mut state = lock(&self.state);
        state.next_hook += 1;
        let id = HookId(state.next_hook);
        state.alloc_hooks.push((id, hook));
        id
    }

    fn unsubscribe(&self, id: HookId) {
        let mut state = lock(&self.state);
        state.line_hooks.retain(|sub| sub.id != id);
        state.alloc_hooks.retain(|(hook_id, _)| *hook_id != id);
    }

    fn top_frame(&self) -> Option<SourcePath> {
        lock(&self.state).frame.clone()
    }

    fn type_name(&self, ty: TypeId) -> Option<String> {
        lock(&self.state).type_names.get(&ty).cloned()
    }

    fn ancestors(&self, ty: TypeId) -> Result<Vec<TypeId>> {
        let state = lock(&self.state);
        if state.failing_ancestors.contains(&ty) {
            return Err(anyhow!("ancestor enumeration failed for {ty:?}"));
        }
        Ok(state.ancestor_chains.get(&ty).cloned().unwrap_or_default())
    }

    fn const_source_location(&self, name: &str) -> Result<Option<String>> {
        let mut state = lock(&self.state);
        state.const_lookups += 1;
        if state.failing_consts.contains(name) {
            return Err(anyhow!("defining-file lookup raised for {name}"));
        }
        Ok(state.const_locations.get(name).cloned())
    }
}
