//! In-memory model that replays a fixed fragment script.
//!
//! Used by tests and by anyone who wants to drive the conversation core
//! without a running inference server.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use shared::agent_api::ChatMessage;
use shared::{CancelToken, Fragment, GenerationParams};
use std::sync::Arc;
use std::time::Duration;

use crate::{ChatModel, FragmentStream};

#[derive(Debug, Clone)]
pub struct ScriptedModel {
    name: String,
    script: Vec<Fragment>,
    /// Yield an error after this many fragments
    fail_after: Option<usize>,
    /// Refuse to start at all
    fail_on_start: bool,
    delay: Duration,
    /// Dialogues received, newest last
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>, script: Vec<Fragment>) -> Self {
        Self {
            name: name.into(),
            script,
            fail_after: None,
            fail_on_start: false,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script made of plain text fragments.
    pub fn from_text(name: impl Into<String>, pieces: &[&str]) -> Self {
        Self::new(name, pieces.iter().map(|p| Fragment::text(*p)).collect())
    }

    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn failing_on_start(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    /// Sleep between fragments, to give cancellation a chance to land.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }
}

impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(
        &self,
        dialogue: &[ChatMessage],
        _params: &GenerationParams,
        _cancel: CancelToken,
    ) -> Result<FragmentStream> {
        self.calls.lock().push(dialogue.to_vec());
        if self.fail_on_start {
            return Err(anyhow!("{} refused to start", self.name));
        }

        let delay = self.delay;
        let fail_after = self.fail_after;
        let iter = self
            .script
            .clone()
            .into_iter()
            .enumerate()
            .map(move |(i, fragment)| {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                match fail_after {
                    Some(limit) if i >= limit => Err(anyhow!("scripted failure at fragment {}", i)),
                    _ => Ok(fragment),
                }
            });
        Ok(Box::new(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_script_and_records_dialogue() {
        let model = ScriptedModel::from_text("echo", &["a", "b"]);
        let dialogue = vec![ChatMessage::new("user", "hi")];
        let out: Vec<Fragment> = model
            .stream(&dialogue, &GenerationParams::default(), CancelToken::new())
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec![Fragment::text("a"), Fragment::text("b")]);
        assert_eq!(model.calls(), vec![dialogue]);
    }

    #[test]
    fn test_failure_after_n() {
        let model = ScriptedModel::from_text("flaky", &["a", "b", "c"]).failing_after(1);
        let results: Vec<_> = model
            .stream(&[], &GenerationParams::default(), CancelToken::new())
            .unwrap()
            .collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
