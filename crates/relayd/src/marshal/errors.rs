use thiserror::Error;

/// Errors surfaced to callers of [`super::Marshaler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarshalError {
    /// The executor has shut down; the job was never run.
    #[error("execution thread has stopped")]
    Stopped,
    /// The job started but panicked before producing a result.
    #[error("job panicked on the execution thread")]
    Abandoned,
}
