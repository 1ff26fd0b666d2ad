/// Incremental splitter turning raw model output into tagged fragments.
///
/// Reasoning arrives in one of two shapes: a separate `thinking` channel
/// (Ollama's `message.thinking`) or inline `<think>...</think>` tags inside
/// the content. Both come out as `think_start`, `thinking*`, `think_end`,
/// then `text*`. Tags split across chunk boundaries are buffered.
use shared::{Fragment, FragmentKind};

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reasoning {
    Outside,
    /// Opened by the separate thinking channel
    Channel,
    /// Opened by an inline `<think>` tag
    Tag,
}

pub struct ThinkSplitter {
    buffer: String,
    state: Reasoning,
}

impl Default for ThinkSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkSplitter {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            state: Reasoning::Outside,
        }
    }

    /// Feed text from the dedicated reasoning channel.
    pub fn push_thinking(&mut self, text: &str) -> Vec<Fragment> {
        let mut out = Vec::new();
        if text.is_empty() {
            return out;
        }
        if self.state == Reasoning::Outside {
            self.state = Reasoning::Channel;
            out.push(Fragment::think_start());
        }
        out.push(Fragment::thinking(text));
        out
    }

    /// Feed answer content, which may carry inline think tags.
    pub fn push_content(&mut self, text: &str) -> Vec<Fragment> {
        let mut out = Vec::new();
        if text.is_empty() {
            return out;
        }

        // Content after channel reasoning means the reasoning is over.
        if self.state == Reasoning::Channel {
            self.state = Reasoning::Outside;
            out.push(Fragment::think_end());
        }

        self.buffer.push_str(text);

        loop {
            let (tag, kind) = match self.state {
                Reasoning::Tag => (CLOSE_TAG, FragmentKind::Thinking),
                _ => (OPEN_TAG, FragmentKind::Text),
            };

            if let Some(pos) = self.buffer.find(tag) {
                let before = self.buffer[..pos].to_string();
                self.buffer = self.buffer[pos + tag.len()..].to_string();
                if !before.is_empty() {
                    out.push(Fragment::new(kind, before));
                }
                if self.state == Reasoning::Tag {
                    self.state = Reasoning::Outside;
                    out.push(Fragment::think_end());
                } else {
                    self.state = Reasoning::Tag;
                    out.push(Fragment::think_start());
                }
                continue;
            }

            // Hold back a suffix that could still grow into the tag.
            let keep = partial_tag_len(&self.buffer, tag);
            let ready = self.buffer.len() - keep;
            if ready > 0 {
                let emitted = self.buffer[..ready].to_string();
                self.buffer = self.buffer[ready..].to_string();
                out.push(Fragment::new(kind, emitted));
            }
            break;
        }

        out
    }

    /// Flush whatever is still buffered at end of stream. An unterminated
    /// reasoning block is left open on purpose.
    pub fn finish(&mut self) -> Vec<Fragment> {
        let mut out = Vec::new();
        if !self.buffer.is_empty() {
            let kind = if self.state == Reasoning::Tag {
                FragmentKind::Thinking
            } else {
                FragmentKind::Text
            };
            out.push(Fragment::new(kind, std::mem::take(&mut self.buffer)));
        }
        out
    }
}

/// Length of the longest proper prefix of `tag` that ends `haystack`.
fn partial_tag_len(haystack: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&k| haystack.ends_with(&tag[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(frags: &[Fragment]) -> Vec<FragmentKind> {
        frags.iter().map(|f| f.kind).collect()
    }

    fn joined(frags: &[Fragment], kind: FragmentKind) -> String {
        frags
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.text.as_str())
            .collect()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let mut splitter = ThinkSplitter::new();
        let out = splitter.push_content("hello world");
        assert_eq!(out, vec![Fragment::text("hello world")]);
        assert!(splitter.finish().is_empty());
    }

    #[test]
    fn test_inline_tags() {
        let mut splitter = ThinkSplitter::new();
        let out = splitter.push_content("<think>plan it</think>Answer");
        assert_eq!(
            kinds(&out),
            vec![
                FragmentKind::ThinkStart,
                FragmentKind::Thinking,
                FragmentKind::ThinkEnd,
                FragmentKind::Text
            ]
        );
        assert_eq!(joined(&out, FragmentKind::Thinking), "plan it");
        assert_eq!(joined(&out, FragmentKind::Text), "Answer");
    }

    #[test]
    fn test_tags_split_across_chunks() {
        let mut splitter = ThinkSplitter::new();
        let mut out = Vec::new();
        for chunk in ["<thi", "nk>abc", "</th", "ink>", "done"] {
            out.extend(splitter.push_content(chunk));
        }
        out.extend(splitter.finish());
        assert_eq!(joined(&out, FragmentKind::Thinking), "abc");
        assert_eq!(joined(&out, FragmentKind::Text), "done");
        assert_eq!(out.first().map(|f| f.kind), Some(FragmentKind::ThinkStart));
        assert!(kinds(&out).contains(&FragmentKind::ThinkEnd));
    }

    #[test]
    fn test_lone_angle_bracket_is_not_swallowed() {
        let mut splitter = ThinkSplitter::new();
        let mut out = splitter.push_content("a <");
        assert_eq!(joined(&out, FragmentKind::Text), "a ");
        out.extend(splitter.push_content("b"));
        assert_eq!(joined(&out, FragmentKind::Text), "a <b");
    }

    #[test]
    fn test_reasoning_channel_then_content() {
        let mut splitter = ThinkSplitter::new();
        let mut out = splitter.push_thinking("step one ");
        out.extend(splitter.push_thinking("step two"));
        assert_eq!(splitter.state, Reasoning::Channel);
        out.extend(splitter.push_content("final"));
        assert_eq!(splitter.state, Reasoning::Outside);
        assert_eq!(
            kinds(&out),
            vec![
                FragmentKind::ThinkStart,
                FragmentKind::Thinking,
                FragmentKind::Thinking,
                FragmentKind::ThinkEnd,
                FragmentKind::Text
            ]
        );
    }

    #[test]
    fn test_unterminated_reasoning_stays_open() {
        let mut splitter = ThinkSplitter::new();
        let mut out = splitter.push_content("<think>still going</th");
        out.extend(splitter.finish());
        assert!(!kinds(&out).contains(&FragmentKind::ThinkEnd));
        assert_eq!(joined(&out, FragmentKind::Thinking), "still going</th");
    }

    #[test]
    fn test_partial_tag_len() {
        assert_eq!(partial_tag_len("abc<th", OPEN_TAG), 3);
        assert_eq!(partial_tag_len("abc", OPEN_TAG), 0);
        assert_eq!(partial_tag_len("x</think", CLOSE_TAG), 7);
    }
}
