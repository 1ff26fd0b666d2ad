//! Swappable home of the loaded model.
//!
//! Readers take a cheap `Arc` clone under the lock and release it before
//! streaming, so a long generation never holds the lock and a swap never
//! exposes a half-replaced model.

use parking_lot::Mutex;
use providers::ChatModel;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct ModelSlot {
    inner: Mutex<Option<Arc<dyn ChatModel>>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded model, returning the previous one.
    pub fn swap_in(&self, model: Arc<dyn ChatModel>) -> Option<Arc<dyn ChatModel>> {
        info!(model = model.name(), "loading model");
        self.inner.lock().replace(model)
    }

    /// Unload the current model, if any.
    pub fn swap_out(&self) -> Option<Arc<dyn ChatModel>> {
        let old = self.inner.lock().take();
        if let Some(model) = &old {
            info!(model = model.name(), "model unloaded");
        }
        old
    }

    pub fn current(&self) -> Option<Arc<dyn ChatModel>> {
        self.inner.lock().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::scripted::ScriptedModel;

    #[test]
    fn test_swap_in_and_out() {
        let slot = ModelSlot::new();
        assert!(!slot.is_loaded());

        assert!(slot.swap_in(Arc::new(ScriptedModel::from_text("a", &[]))).is_none());
        let old = slot.swap_in(Arc::new(ScriptedModel::from_text("b", &[])));
        assert_eq!(old.map(|m| m.name().to_string()), Some("a".to_string()));
        assert_eq!(slot.current().map(|m| m.name().to_string()).as_deref(), Some("b"));

        // A handle taken before the swap keeps working afterwards.
        let held = slot.current().unwrap();
        slot.swap_out();
        assert!(!slot.is_loaded());
        assert_eq!(held.name(), "b");
    }
}
