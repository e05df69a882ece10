//! Host-runtime abstraction: event subscription and introspection.
//!
//! The tracker does no work of its own accord — everything happens inside
//! callbacks fired by a host runtime while a test executes. This module
//! defines the interface a host has to provide: line/allocation event
//! subscription, one-frame stack inspection, type naming, ancestor-chain
//! enumeration and defining-file lookup for named constants. The in-memory
//! [`crate::sim::SimRuntime`] is the reference implementation.

use std::sync::Arc;

use anyhow::Result;

use crate::intern::SourcePath;

/// Opaque handle identifying a runtime type (a class, struct or mixin as the
/// host understands it). Identity-keyed: two events for the same type must
/// carry the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u64);

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Scope of a line-event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookScope {
    /// One subscription observed by every execution thread.
    AllThreads,
    /// Only the thread that subscribed sees events.
    CurrentThread,
}

/// Coarse shape of a freshly allocated object. Only the two plain object
/// shapes contribute to impact; primitive and builtin value kinds are noise
/// at allocation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Object,
    Struct,
    String,
    Array,
    Map,
    Numeric,
    Other,
}

impl ObjectKind {
    pub fn is_plain(self) -> bool {
        matches!(self, ObjectKind::Object | ObjectKind::Struct)
    }
}

/// One "object created" event as delivered by the host.
#[derive(Debug, Clone)]
pub struct AllocationEvent {
    pub kind: ObjectKind,
    pub type_id: TypeId,
}

/// Callback for "line about to execute" events. The runtime passes itself so
/// the hook can inspect the current stack frame.
pub trait LineHook: Send + Sync {
    fn on_line(&self, runtime: &dyn HostRuntime);
}

/// Callback for "object created" events. This is the highest-frequency event
/// in the system; implementations must do negligible work per call.
pub trait AllocationHook: Send + Sync {
    fn on_allocation(&self, runtime: &dyn HostRuntime, event: &AllocationEvent);
}

/// The host runtime's event-subscription and introspection primitives.
///
/// Introspection methods that can fail inside the host (`ancestors`,
/// `const_source_location`) return `Result`; the tracker core absorbs every
/// such failure as "contributes nothing" rather than aborting a session.
pub trait HostRuntime: Send + Sync {
    fn subscribe_line(&self, scope: HookScope, hook: Arc<dyn LineHook>) -> HookId;

    fn subscribe_allocation(&self, hook: Arc<dyn AllocationHook>) -> HookId;

    /// Detach a subscription. After this returns, the hook will not be
    /// invoked again.
    fn unsubscribe(&self, id: HookId);

    /// The source file of the currently executing frame, as an interned
    /// handle. `None` when no frame is available; the event is then skipped
    /// since no file can be attributed.
    fn top_frame(&self) -> Option<SourcePath>;

    /// Resolved name of a runtime type. `None` for anonymous or ephemeral
    /// types, which carry no file mapping.
    fn type_name(&self, ty: TypeId) -> Option<String>;

    /// Full ancestor/mixin chain of a type, including the type itself.
    fn ancestors(&self, ty: TypeId) -> Result<Vec<TypeId>>;

    /// Defining file for a named constant, or `Ok(None)` if the host cannot
    /// resolve it.
    fn const_source_location(&self, name: &str) -> Result<Option<String>>;
}
