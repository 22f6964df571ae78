use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum SpawnError {
    /// Submission after `shutdown` was requested. The task is never queued.
    #[error("worker pool is stopped, task rejected")]
    PoolStopped,
    #[error("task panicked: {0}")]
    Panic(String),
    /// The task was still queued when the pool shut down and never ran.
    #[error("task abandoned by pool shutdown before it started")]
    Abandoned,
    #[error("timed out waiting for task result")]
    Timeout,
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
}
