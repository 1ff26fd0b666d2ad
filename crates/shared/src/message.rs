//! Message and fragment types shared by the streaming core and the UI.

use serde::{Deserialize, Serialize};

/// Who produced a message. `None` marks a placeholder that is not yet a real message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    None,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Semantic kind of the most recent fragment that contributed to a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    #[default]
    None,
    Text,
    Thinking,
    ThinkStart,
    ThinkEnd,
    Special,
}

impl Marker {
    /// Markers belonging to a reasoning trace rather than to answer text.
    pub fn is_reasoning(&self) -> bool {
        matches!(
            self,
            Marker::Thinking | Marker::ThinkStart | Marker::ThinkEnd | Marker::Special
        )
    }
}

/// One turn (or partial turn) of dialogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Displayed content, appended to while streaming
    pub text: String,
    pub role: Role,
    pub marker: Marker,
    /// Hidden reasoning trace accumulated next to the displayed text
    pub expanded_text: String,
    /// Last computed generation rate, 0 until meaningful
    pub tokens_per_second: f64,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Role::User,
            ..Self::default()
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Role::Assistant,
            marker: Marker::Text,
            ..Self::default()
        }
    }

    /// True while this is still the empty in-progress slot.
    pub fn is_placeholder(&self) -> bool {
        self.role == Role::None
    }
}

/// Marker attached to a single fragment coming out of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    ThinkStart,
    Thinking,
    ThinkEnd,
    Text,
}

/// One incremental unit of model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl Fragment {
    pub fn new(kind: FragmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FragmentKind::Text, text)
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self::new(FragmentKind::Thinking, text)
    }

    pub fn think_start() -> Self {
        Self::new(FragmentKind::ThinkStart, "")
    }

    pub fn think_end() -> Self {
        Self::new(FragmentKind::ThinkEnd, "")
    }
}
