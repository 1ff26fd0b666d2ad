//! Transcript rendering: a pure mapping from conversation state to the
//! blocks a view paints. Nothing here feeds back into the store.

use shared::{Message, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptBlock {
    pub role: Role,
    /// "You" or "Ember"
    pub speaker: &'static str,
    /// Markdown body
    pub body: String,
    /// Generation rate chip, one decimal, assistant messages only
    pub rate: Option<f64>,
    /// True for the message still being streamed
    pub streaming: bool,
}

pub fn speaker(role: Role) -> Option<&'static str> {
    match role {
        Role::User => Some("You"),
        Role::Assistant => Some("Ember"),
        Role::None => None,
    }
}

fn block(msg: &Message, streaming: bool) -> Option<TranscriptBlock> {
    let speaker = speaker(msg.role)?;
    let rate = (msg.role == Role::Assistant && msg.tokens_per_second > 0.0)
        .then(|| (msg.tokens_per_second * 10.0).round() / 10.0);
    Some(TranscriptBlock {
        role: msg.role,
        speaker,
        body: msg.text.clone(),
        rate,
        streaming,
    })
}

/// Render finalized history followed by the in-progress message.
/// Placeholders (no role yet) render nothing.
pub fn render_transcript(history: &[Message], current: &Message) -> Vec<TranscriptBlock> {
    history
        .iter()
        .filter_map(|msg| block(msg, false))
        .chain(block(current, true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Marker;

    #[test]
    fn test_render_skips_placeholders() {
        let history = vec![Message::user("hi"), Message::assistant_text("hello")];
        let blocks = render_transcript(&history, &Message::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].speaker, "You");
        assert_eq!(blocks[1].speaker, "Ember");
        assert!(!blocks[1].streaming);
    }

    #[test]
    fn test_render_includes_streaming_message_and_rate() {
        let current = Message {
            text: "partial".into(),
            role: Role::Assistant,
            marker: Marker::Text,
            expanded_text: String::new(),
            tokens_per_second: 12.345,
        };
        let blocks = render_transcript(&[Message::user("q")], &current);
        let last = blocks.last().unwrap();
        assert!(last.streaming);
        assert_eq!(last.rate, Some(12.3));
    }

    #[test]
    fn test_user_messages_have_no_rate() {
        let mut msg = Message::user("q");
        msg.tokens_per_second = 5.0;
        let blocks = render_transcript(&[msg], &Message::default());
        assert_eq!(blocks[0].rate, None);
    }
}
