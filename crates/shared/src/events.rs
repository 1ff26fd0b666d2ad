//! Events sent from background workers to the UI context.
//!
//! Workers never touch UI-observable state themselves; they push one of
//! these across a channel and the UI applies it on its own thread.

use serde::{Deserialize, Serialize};

use crate::message::Fragment;

/// Progress of a single inference stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Next fragment produced by the model
    Fragment(Fragment),
    /// Stream ended normally or because cancellation was observed
    Finished { cancelled: bool },
    /// The model call raised mid-stream
    Failed { error: String },
    /// The model slot was empty when the worker looked
    ModelMissing,
}

/// Progress of a model asset transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferEvent {
    Progress {
        percent: u8,
        status: String,
    },
    Finished,
    Failed {
        error: String,
    },
    Cancelled,
}

impl TransferEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferEvent::Progress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_terminal_events() {
        assert!(!TransferEvent::Progress {
            percent: 10,
            status: "pulling".into()
        }
        .is_terminal());
        assert!(TransferEvent::Cancelled.is_terminal());
    }
}
