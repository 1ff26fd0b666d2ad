//! UI-side controller for one chat window.
//!
//! `ChatSession` owns the store and is only ever touched from the UI
//! thread. A worker thread streams the model and sends events back; the
//! UI calls [`ChatSession::poll`] every frame to apply them.

use providers::ChatModel;
use shared::events::StreamEvent;
use shared::{CancelToken, ChatError, GenerationParams, Message};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::model_slot::ModelSlot;
use crate::render::{render_transcript, TranscriptBlock};
use crate::store::{ConversationStore, ThreadSummary};
use crate::worker::spawn_inference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A worker is now streaming the reply
    Started,
    /// A turn was already streaming; it has been asked to stop
    CancelRequested,
    /// Blank input
    Ignored,
}

pub struct ChatSession {
    store: ConversationStore,
    params: GenerationParams,
    slot: Arc<ModelSlot>,
    cancel: CancelToken,
    events: Option<Receiver<StreamEvent>>,
    status: String,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(GenerationParams::default())
    }
}

impl ChatSession {
    pub fn new(params: GenerationParams) -> Self {
        Self {
            store: ConversationStore::new(),
            params,
            slot: Arc::new(ModelSlot::new()),
            cancel: CancelToken::new(),
            events: None,
            status: String::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn is_generating(&self) -> bool {
        self.events.is_some()
    }

    pub fn model_slot(&self) -> &Arc<ModelSlot> {
        &self.slot
    }

    pub fn set_creativity(&mut self, value: f64) {
        self.params.set_creativity(value);
    }

    pub fn set_token_length(&mut self, value: f64) {
        self.params.set_token_length(value);
    }

    /// Swap a model into the slot. A stream already running keeps the
    /// handle it started with.
    pub fn load_model(&mut self, model: Arc<dyn ChatModel>) {
        let name = model.name().to_string();
        self.slot.swap_in(model);
        self.status = format!("Loaded {}.", name);
    }

    pub fn unload_model(&mut self) {
        self.slot.swap_out();
    }

    /// Submit user text. While a turn is streaming this is a request to
    /// cancel it instead.
    pub fn submit(&mut self, text: &str) -> Result<SubmitOutcome, ChatError> {
        if self.is_generating() {
            self.cancel();
            return Ok(SubmitOutcome::CancelRequested);
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        let dialogue = self.store.submit_user_text(text);

        if !self.slot.is_loaded() {
            self.status = "Please select a model.".to_string();
            return Err(ChatError::NoModelLoaded);
        }

        let (tx, rx) = channel();
        self.cancel = CancelToken::new();
        if let Err(e) = spawn_inference(
            Arc::clone(&self.slot),
            dialogue,
            self.params,
            self.cancel.clone(),
            tx,
        ) {
            error!(error = %e, "failed to spawn inference worker");
            self.status = format!("Error: {}", e);
            return Err(ChatError::StreamFailure(e.to_string()));
        }

        info!(
            thread = self.store.active_index(),
            max_len = self.params.max_len,
            "turn started"
        );
        self.events = Some(rx);
        self.status = "Generating...".to_string();
        Ok(SubmitOutcome::Started)
    }

    /// Ask the running stream to stop at the next fragment boundary.
    pub fn cancel(&mut self) {
        if self.is_generating() {
            self.cancel.cancel();
            self.status = "Stopping...".to_string();
        }
    }

    /// Apply everything the worker has sent so far. Returns whether the
    /// view should refresh. Failures are reported after the partial turn
    /// has been finalized.
    pub fn poll(&mut self) -> Result<bool, ChatError> {
        let Some(rx) = self.events.take() else {
            return Ok(false);
        };

        let mut refresh = false;
        loop {
            match rx.try_recv() {
                Ok(StreamEvent::Fragment(fragment)) => {
                    refresh |= self.store.consume_stream_fragment(&fragment);
                }
                Ok(StreamEvent::Finished { cancelled }) => {
                    self.store.finalize_turn(cancelled);
                    self.status = "Ready.".to_string();
                    return Ok(true);
                }
                Ok(StreamEvent::Failed { error }) => {
                    return Err(self.fail(ChatError::StreamFailure(error)));
                }
                Ok(StreamEvent::ModelMissing) => {
                    self.store.finalize_turn(self.cancel.is_cancelled());
                    self.status = "Please select a model.".to_string();
                    return Err(ChatError::NoModelLoaded);
                }
                Err(TryRecvError::Empty) => {
                    self.events = Some(rx);
                    return Ok(refresh);
                }
                Err(TryRecvError::Disconnected) => {
                    return Err(self.fail(ChatError::StreamFailure(
                        "generation stopped unexpectedly".to_string(),
                    )));
                }
            }
        }
    }

    fn fail(&mut self, err: ChatError) -> ChatError {
        warn!(%err, "turn ended with an error");
        self.store.finalize_turn(self.cancel.is_cancelled());
        self.status = match &err {
            ChatError::StreamFailure(msg) => format!("Error: {}", msg),
            other => format!("Error: {}", other),
        };
        err
    }

    pub fn new_thread(&mut self) -> Result<usize, ChatError> {
        self.ensure_idle()?;
        Ok(self.store.new_thread())
    }

    pub fn switch_thread(&mut self, index: usize) -> Result<(), ChatError> {
        self.ensure_idle()?;
        self.store.switch_thread(index)
    }

    /// Delete a thread; deleting the last one opens a fresh thread.
    pub fn delete_thread(&mut self, index: usize) -> Result<(), ChatError> {
        self.ensure_idle()?;
        self.store.delete_thread(index)?;
        if self.store.thread_count() == 0 {
            self.store.new_thread();
        }
        Ok(())
    }

    pub fn thread_summaries(&self, limit: usize) -> Vec<ThreadSummary> {
        self.store.thread_summaries(limit)
    }

    /// Blocks for the active thread plus the in-progress message.
    pub fn transcript(&self) -> Vec<TranscriptBlock> {
        let history: &[Message] = self.store.active_thread().unwrap_or(&[]);
        render_transcript(history, self.store.current_message())
    }

    fn ensure_idle(&self) -> Result<(), ChatError> {
        if self.is_generating() {
            Err(ChatError::Busy)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::scripted::ScriptedModel;
    use shared::{Fragment, Marker, Role};
    use std::time::{Duration, Instant};

    use crate::store::CANCELLED_BANNER;

    /// Poll until the turn ends, collecting the final poll result.
    fn drive(session: &mut ChatSession) -> Result<bool, ChatError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let res = session.poll();
            if !session.is_generating() {
                return res;
            }
            assert!(Instant::now() < deadline, "turn never finished");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_full_turn() {
        let model = ScriptedModel::new(
            "reasoner",
            vec![
                Fragment::think_start(),
                Fragment::thinking("consider"),
                Fragment::think_end(),
                Fragment::text("Paris"),
                Fragment::text("."),
            ],
        );
        let mut session = ChatSession::default();
        session.load_model(Arc::new(model.clone()));

        assert_eq!(session.submit("  capital of France?  "), Ok(SubmitOutcome::Started));
        assert!(session.is_generating());
        assert_eq!(drive(&mut session), Ok(true));

        let thread = session.store().active_thread().unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].text, "capital of France?");
        assert_eq!(thread[1].text, "Paris.");
        assert_eq!(thread[1].marker, Marker::Text);
        assert_eq!(session.status(), "Ready.");

        // The replayed dialogue contains only the finished answer.
        session.submit("and Spain?").unwrap();
        drive(&mut session).unwrap();
        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].len(), 3);
        assert_eq!(calls[1][1].content, "Paris.");
    }

    #[test]
    fn test_no_model_loaded() {
        let mut session = ChatSession::default();
        assert_eq!(session.submit("hello"), Err(ChatError::NoModelLoaded));
        assert!(!session.is_generating());
        assert_eq!(session.status(), "Please select a model.");
        // The user's message is still recorded.
        assert_eq!(session.store().active_thread().unwrap().len(), 1);
    }

    #[test]
    fn test_blank_input_ignored() {
        let mut session = ChatSession::default();
        assert_eq!(session.submit("   "), Ok(SubmitOutcome::Ignored));
        assert!(session.store().active_thread().unwrap().is_empty());
    }

    #[test]
    fn test_second_submit_cancels() {
        let mut script = vec![Fragment::think_start()];
        script.extend((0..200).map(|i| Fragment::thinking(format!("{} ", i))));
        let model = ScriptedModel::new("slow", script).with_delay(Duration::from_millis(2));

        let mut session = ChatSession::default();
        session.load_model(Arc::new(model));
        session.submit("go").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(session.submit("ignored"), Ok(SubmitOutcome::CancelRequested));
        assert_eq!(drive(&mut session), Ok(true));

        let thread = session.store().active_thread().unwrap();
        assert_eq!(thread.len(), 2);
        assert!(thread[1].text.starts_with(CANCELLED_BANNER));
        assert_eq!(thread[1].role, Role::Assistant);
    }

    #[test]
    fn test_stream_failure_keeps_partial_output() {
        let model = ScriptedModel::from_text("flaky", &["half ", "an ", "answer"]).failing_after(2);
        let mut session = ChatSession::default();
        session.load_model(Arc::new(model));
        session.submit("q").unwrap();

        let res = drive(&mut session);
        assert!(matches!(res, Err(ChatError::StreamFailure(_))));
        assert!(session.status().starts_with("Error:"));

        let thread = session.store().active_thread().unwrap();
        assert_eq!(thread[1].text, "half an ");
        assert!(session.store().current_message().is_placeholder());
    }

    #[test]
    fn test_thread_ops_refused_while_streaming() {
        let model = ScriptedModel::from_text("slow", &["a"; 50]).with_delay(Duration::from_millis(5));
        let mut session = ChatSession::default();
        session.load_model(Arc::new(model));
        session.submit("q").unwrap();

        assert_eq!(session.new_thread(), Err(ChatError::Busy));
        assert_eq!(session.switch_thread(0), Err(ChatError::Busy));
        assert_eq!(session.delete_thread(0), Err(ChatError::Busy));

        session.cancel();
        drive(&mut session).unwrap();
        assert!(session.new_thread().is_ok());
    }

    #[test]
    fn test_delete_last_thread_opens_new_one() {
        let mut session = ChatSession::default();
        session.delete_thread(0).unwrap();
        assert_eq!(session.store().thread_count(), 1);
        assert!(session.store().active_thread().unwrap().is_empty());
        assert!(matches!(
            session.switch_thread(4),
            Err(ChatError::InvalidIndex { index: 4, .. })
        ));
    }

    #[test]
    fn test_unload_before_worker_reads_slot() {
        let mut session = ChatSession::default();
        session.load_model(Arc::new(ScriptedModel::from_text("m", &["x"])));
        session.unload_model();
        assert_eq!(session.submit("q"), Err(ChatError::NoModelLoaded));
    }

    #[test]
    fn test_sliders_update_params() {
        let mut session = ChatSession::default();
        session.set_token_length(1.0);
        session.set_creativity(100.0);
        assert_eq!(session.params().max_len, 16384);
        assert!((session.params().top_p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_transcript_shows_streaming_message() {
        let mut session = ChatSession::default();
        session.load_model(Arc::new(ScriptedModel::from_text("m", &["hello"])));
        session.submit("hi").unwrap();
        drive(&mut session).unwrap();
        let blocks = session.transcript();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].body, "hello");
        assert!(!blocks[1].streaming);
    }
}
