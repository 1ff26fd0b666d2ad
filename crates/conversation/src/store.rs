//! Conversation threads, the active-thread index and the single
//! in-progress message of the active thread's current turn.

use shared::agent_api::ChatMessage;
use shared::{ChatError, Fragment, Marker, Message, Role};
use tracing::{debug, error, info};

use crate::segmenter::StreamSegmenter;

pub const CANCELLED_BANNER: &str = "Cancelled. Thinking tokens:";
pub const OUT_OF_TOKENS_BANNER: &str = "Ran out of tokens while thinking:";

/// Characters of the first message used as a thread's sidebar label.
const LABEL_CHARS: usize = 10;

/// Sidebar entry for one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub index: usize,
    pub label: String,
    pub is_active: bool,
}

#[derive(Debug)]
pub struct ConversationStore {
    threads: Vec<Vec<Message>>,
    active: usize,
    segmenter: StreamSegmenter,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// A store always starts with one empty, active thread.
    pub fn new() -> Self {
        let mut store = Self {
            threads: Vec::new(),
            active: 0,
            segmenter: StreamSegmenter::new(),
        };
        store.new_thread();
        store
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn thread(&self, index: usize) -> Result<&[Message], ChatError> {
        self.threads
            .get(index)
            .map(Vec::as_slice)
            .ok_or(ChatError::InvalidIndex {
                index,
                len: self.threads.len(),
            })
    }

    /// Finalized messages of the active thread.
    pub fn active_thread(&self) -> Result<&[Message], ChatError> {
        self.thread(self.active)
    }

    /// The message currently being streamed (a placeholder between turns).
    pub fn current_message(&self) -> &Message {
        self.segmenter.current()
    }

    /// Append the user's text and return the dialogue to send to the model.
    ///
    /// The snapshot is an owned copy; later changes to the thread do not
    /// show up in it.
    pub fn submit_user_text(&mut self, text: impl Into<String>) -> Vec<ChatMessage> {
        // A previous stream may have been abandoned without finalizing.
        self.segmenter.reset();
        let active = self.ensure_thread();
        self.threads[active].push(Message::user(text));
        self.dialogue_snapshot()
    }

    /// Replayable history: user turns verbatim plus completed answers.
    /// Reasoning traces and unfinished turns are left out.
    pub fn dialogue_snapshot(&self) -> Vec<ChatMessage> {
        self.threads
            .get(self.active)
            .map(|thread| {
                thread
                    .iter()
                    .filter(|msg| {
                        msg.role == Role::User
                            || (msg.role == Role::Assistant && msg.marker == Marker::Text)
                    })
                    .map(|msg| ChatMessage::new(msg.role.as_str(), msg.text.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Feed one streamed fragment into the in-progress message.
    pub fn consume_stream_fragment(&mut self, fragment: &Fragment) -> bool {
        self.segmenter.apply(fragment)
    }

    /// Move the in-progress message into the active thread.
    pub fn finalize_turn(&mut self, was_cancelled: bool) {
        let fragments = self.segmenter.fragment_count();
        let mut message = self.segmenter.take();

        if was_cancelled && message.marker.is_reasoning() {
            message.text = format!("{}\n\n{}", CANCELLED_BANNER, message.expanded_text);
        } else if !was_cancelled && message.marker == Marker::Thinking {
            message.text = format!("{}\n\n{}", OUT_OF_TOKENS_BANNER, message.expanded_text);
        }

        if message.is_placeholder() {
            debug!(was_cancelled, "turn ended before any output");
            return;
        }

        let active = self.ensure_thread();
        info!(
            thread = active,
            fragments,
            was_cancelled,
            marker = ?message.marker,
            "turn finalized"
        );
        self.threads[active].push(message);
    }

    /// Append an empty thread and make it active.
    pub fn new_thread(&mut self) -> usize {
        self.threads.push(Vec::new());
        self.active = self.threads.len() - 1;
        debug!(thread = self.active, "new thread");
        self.active
    }

    /// Remove a thread. Deleting the last one leaves the store empty until
    /// the caller creates a new thread.
    pub fn delete_thread(&mut self, index: usize) -> Result<(), ChatError> {
        self.check_index(index)?;
        self.threads.remove(index);

        if self.active >= index {
            self.active = self.active.saturating_sub(1);
        }
        if !self.threads.is_empty() {
            self.active = self.active.min(self.threads.len() - 1);
        }

        debug!(deleted = index, active = self.active, remaining = self.threads.len(), "thread deleted");
        Ok(())
    }

    /// Make `index` the active thread. An empty store gets a fresh thread
    /// first.
    pub fn switch_thread(&mut self, index: usize) -> Result<(), ChatError> {
        if self.threads.is_empty() {
            self.new_thread();
        }
        self.check_index(index)?;
        self.active = index;
        Ok(())
    }

    /// Sidebar labels for the first `limit` threads, in insertion order.
    pub fn thread_summaries(&self, limit: usize) -> Vec<ThreadSummary> {
        self.threads
            .iter()
            .take(limit)
            .enumerate()
            .map(|(index, thread)| {
                let is_active = index == self.active;
                let label = if is_active {
                    "CURRENT".to_string()
                } else if let Some(first) = thread.first() {
                    first.text.chars().take(LABEL_CHARS).collect()
                } else {
                    "Empty".to_string()
                };
                ThreadSummary {
                    index,
                    label,
                    is_active,
                }
            })
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<(), ChatError> {
        if index < self.threads.len() {
            Ok(())
        } else {
            let err = ChatError::InvalidIndex {
                index,
                len: self.threads.len(),
            };
            error!(%err, "thread index out of range");
            Err(err)
        }
    }

    /// Make sure there is an active thread to write into.
    fn ensure_thread(&mut self) -> usize {
        if self.active >= self.threads.len() {
            if self.threads.is_empty() {
                self.new_thread();
            } else {
                self.active = self.threads.len() - 1;
            }
        }
        self.active
    }
}
