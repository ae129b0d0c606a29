use thiserror::Error;

/// Contract violations surfaced to the caller.
///
/// Expected edge cases (empty pools, missing history, rejected approvals)
/// are modelled as sentinel values on the individual operations, never as
/// errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown chapter: {0}")]
    UnknownChapter(String),
    #[error("unknown concept: {0}")]
    UnknownConcept(String),
    #[error("unknown question: {0}")]
    UnknownQuestion(String),
}
