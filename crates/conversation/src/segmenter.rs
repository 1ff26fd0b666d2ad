//! Groups streamed fragments into the in-progress message and decides
//! when the view should be refreshed.

use shared::{Fragment, FragmentKind, Marker, Message, Role};
use tracing::trace;

use crate::rate::RateTracker;

/// Displayed while a reasoning block is being generated.
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// A refresh is requested every this many fragments even without a
/// segment boundary.
pub const REFRESH_INTERVAL: u64 = 32;

#[derive(Debug, Default)]
pub struct StreamSegmenter {
    current: Message,
    previous_marker: Marker,
    fragment_index: u64,
    rate: RateTracker,
}

impl StreamSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Message {
        &self.current
    }

    pub fn fragment_count(&self) -> u64 {
        self.fragment_index
    }

    /// Apply one fragment and return whether a refresh is due.
    pub fn apply(&mut self, fragment: &Fragment) -> bool {
        let rate = self.rate.step();
        let mut forced = false;

        match fragment.kind {
            FragmentKind::ThinkStart => {
                self.current.text = THINKING_PLACEHOLDER.to_string();
                self.current.marker = Marker::Thinking;
                self.current.role = Role::Assistant;
                self.current.tokens_per_second = rate;
            }
            FragmentKind::Thinking => {
                self.current.expanded_text.push_str(&fragment.text);
                self.current.tokens_per_second = rate;
            }
            FragmentKind::ThinkEnd => {
                self.current.tokens_per_second = rate;
                forced = true;
            }
            FragmentKind::Text => {
                if self.previous_marker != Marker::Text {
                    // Boundary between reasoning and answer (or the first answer text).
                    self.current = Message {
                        tokens_per_second: rate,
                        ..Message::assistant_text(fragment.text.clone())
                    };
                    forced = true;
                } else {
                    self.current.text.push_str(&fragment.text);
                    self.current.tokens_per_second = rate;
                }
            }
        }

        let refresh = forced || self.fragment_index % REFRESH_INTERVAL == 0;
        self.previous_marker = self.current.marker;
        self.fragment_index += 1;

        trace!(
            index = self.fragment_index,
            kind = ?fragment.kind,
            refresh,
            "applied fragment"
        );
        refresh
    }

    /// Hand out the in-progress message and start over with an empty
    /// placeholder. Rate timing is reset as well.
    pub fn take(&mut self) -> Message {
        let message = std::mem::take(&mut self.current);
        self.reset();
        message
    }

    /// Drop any partial state, e.g. left over from an abandoned stream.
    pub fn reset(&mut self) {
        self.current = Message::default();
        self.previous_marker = Marker::None;
        self.fragment_index = 0;
        self.rate.reset();
    }
}
