use thiserror::Error;

/// Failures surfaced by the conversation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// A thread index outside `0..len`. Always a programming error.
    #[error("thread index {index} out of range (have {len})")]
    InvalidIndex { index: usize, len: usize },

    /// A submission arrived with no model in the slot.
    #[error("no model loaded")]
    NoModelLoaded,

    /// The model call failed mid-stream; partial output was kept.
    #[error("stream failed: {0}")]
    StreamFailure(String),

    /// Thread operations are refused while a turn is streaming.
    #[error("a response is still being generated")]
    Busy,
}

impl ChatError {
    /// Whether the user can act on this error (as opposed to a defect).
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ChatError::InvalidIndex { .. })
    }
}
