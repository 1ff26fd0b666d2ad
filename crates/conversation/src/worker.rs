//! Background inference loop.
//!
//! The worker only reads the model handle and forwards fragments; every
//! state change happens on the UI side when it drains the channel.

use shared::agent_api::ChatMessage;
use shared::events::StreamEvent;
use shared::{CancelToken, GenerationParams};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

use crate::model_slot::ModelSlot;

/// Spawn the streaming loop on its own thread.
pub fn spawn_inference(
    slot: Arc<ModelSlot>,
    dialogue: Vec<ChatMessage>,
    params: GenerationParams,
    cancel: CancelToken,
    tx: Sender<StreamEvent>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("inference".into())
        .spawn(move || {
            let tx_panic = tx.clone();
            let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run_inference(&slot, &dialogue, &params, &cancel, &tx);
            }));
            if res.is_err() {
                error!("inference worker panicked");
                let _ = tx_panic.send(StreamEvent::Failed {
                    error: "Something went wrong while generating a response.".to_string(),
                });
            }
        })
}

/// Drive one stream to completion. Always ends with exactly one terminal
/// event unless the receiver is gone.
pub fn run_inference(
    slot: &ModelSlot,
    dialogue: &[ChatMessage],
    params: &GenerationParams,
    cancel: &CancelToken,
    tx: &Sender<StreamEvent>,
) {
    // Short lock: clone the handle, then stream without holding it.
    let Some(model) = slot.current() else {
        let _ = tx.send(StreamEvent::ModelMissing);
        return;
    };

    let stream = match model.stream(dialogue, params, cancel.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(model = model.name(), error = %e, "model refused to start");
            let _ = tx.send(StreamEvent::Failed {
                error: e.to_string(),
            });
            return;
        }
    };

    let mut forwarded = 0usize;
    for item in stream {
        if cancel.is_cancelled() {
            debug!(forwarded, "cancellation observed");
            let _ = tx.send(StreamEvent::Finished { cancelled: true });
            return;
        }
        match item {
            Ok(fragment) => {
                if tx.send(StreamEvent::Fragment(fragment)).is_err() {
                    debug!("UI side hung up, abandoning stream");
                    return;
                }
                forwarded += 1;
            }
            Err(e) => {
                warn!(model = model.name(), forwarded, error = %e, "stream failed");
                let _ = tx.send(StreamEvent::Failed {
                    error: e.to_string(),
                });
                return;
            }
        }
    }

    debug!(forwarded, "stream complete");
    let _ = tx.send(StreamEvent::Finished {
        cancelled: cancel.is_cancelled(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::scripted::ScriptedModel;
    use shared::Fragment;
    use std::sync::mpsc::channel;

    fn collect(slot: &ModelSlot, cancel: &CancelToken) -> Vec<StreamEvent> {
        let (tx, rx) = channel();
        run_inference(
            slot,
            &[ChatMessage::new("user", "hi")],
            &GenerationParams::default(),
            cancel,
            &tx,
        );
        drop(tx);
        rx.into_iter().collect()
    }

    #[test]
    fn test_forwards_fragments_then_finishes() {
        let slot = ModelSlot::new();
        slot.swap_in(Arc::new(ScriptedModel::from_text("m", &["a", "b"])));
        let events = collect(&slot, &CancelToken::new());
        assert_eq!(
            events,
            vec![
                StreamEvent::Fragment(Fragment::text("a")),
                StreamEvent::Fragment(Fragment::text("b")),
                StreamEvent::Finished { cancelled: false },
            ]
        );
    }

    #[test]
    fn test_empty_slot() {
        let events = collect(&ModelSlot::new(), &CancelToken::new());
        assert_eq!(events, vec![StreamEvent::ModelMissing]);
    }

    #[test]
    fn test_cancel_before_first_fragment() {
        let slot = ModelSlot::new();
        slot.swap_in(Arc::new(ScriptedModel::from_text("m", &["a", "b"])));
        let cancel = CancelToken::new();
        cancel.cancel();
        let events = collect(&slot, &cancel);
        assert_eq!(events, vec![StreamEvent::Finished { cancelled: true }]);
    }

    #[test]
    fn test_mid_stream_error() {
        let slot = ModelSlot::new();
        slot.swap_in(Arc::new(
            ScriptedModel::from_text("m", &["a", "b", "c"]).failing_after(2),
        ));
        let events = collect(&slot, &CancelToken::new());
        assert_eq!(events.len(), 3);
        assert!(matches!(events[2], StreamEvent::Failed { .. }));
    }

    #[test]
    fn test_refused_start() {
        let slot = ModelSlot::new();
        slot.swap_in(Arc::new(ScriptedModel::from_text("m", &["a"]).failing_on_start()));
        let events = collect(&slot, &CancelToken::new());
        assert!(matches!(events.as_slice(), [StreamEvent::Failed { .. }]));
    }
}
