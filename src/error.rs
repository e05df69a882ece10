use thiserror::Error;

/// Fatal, user-facing tracker errors.
///
/// Everything else that can go wrong during a session (failed digest, failed
/// extraction, failed symbol resolution, failed ancestor walks) is absorbed at
/// the collaborator boundary and degrades to "contributes nothing" — see the
/// individual modules. Only misconfiguration and misuse surface as errors.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// `start()` was called without a root path configured.
    #[error("root path is required to start tracking")]
    RootRequired,

    /// `start()` was called while a session is already running.
    #[error("tracker is already running")]
    AlreadyStarted,

    /// `stop()` was called with no session running.
    #[error("tracker is not running")]
    NotStarted,

    /// In single-thread mode, `stop()` must run on the thread that started
    /// the session.
    #[error("tracking was not started by this thread")]
    ForeignThread,

    /// A cache-replacement payload did not have the expected two-map shape.
    #[error("cache payload must be two maps: const_refs and const_locations")]
    InvalidCachePayload(#[source] serde_json::Error),
}
