//! Application state for the Ember window.
//!
//! Everything here runs on the UI thread. Streaming and transfers happen on
//! worker threads; `poll` drains their channels once per frame.

use conversation::{ChatSession, SubmitOutcome, ThreadSummary, TranscriptBlock};
use providers::ollama::OllamaClient;
use providers::ChatModel;
use services::memory::{available_gb, describe_available};
use services::ollama::{ensure_ollama_running, ollama_binary, OllamaStatus};
use services::{ModelCatalog, ModelDetails, ModelTransfer};
use shared::events::TransferEvent;
use shared::settings::AppSettings;
use shared::{ChatError, GenerationParams};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::utils::save_settings_to;

/// Progress of the model transfer in flight.
pub struct TransferState {
    pub transfer: ModelTransfer,
    pub short_name: String,
    pub percent: u8,
    pub status: String,
}

pub struct AppState {
    pub settings: AppSettings,
    /// None keeps settings in memory only
    settings_path: Option<PathBuf>,
    pub session: ChatSession,
    /// What the transcript panel paints. Rebuilt only when the stream asks
    /// for a refresh, a turn ends, or the active thread changes.
    pub transcript: Vec<TranscriptBlock>,
    pub catalog: Option<ModelCatalog>,
    pub selected_model: Option<String>,
    pub input_text: String,
    pub thread_limit: usize,
    pub available_gb: f64,
    pub transfer: Option<TransferState>,
}

impl AppState {
    pub fn new(settings: AppSettings, settings_path: Option<PathBuf>, model_dir: PathBuf) -> Self {
        let params = GenerationParams::from_sliders(settings.creativity, settings.token_length);
        let catalog = match ModelCatalog::load(&model_dir) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                error!(error = %e, dir = %model_dir.display(), "failed to load model catalog");
                None
            }
        };
        let selected_model = settings
            .last_model
            .clone()
            .filter(|name| catalog.as_ref().is_some_and(|c| c.get(name).is_some()))
            .or_else(|| {
                catalog
                    .as_ref()
                    .and_then(|c| c.default_model())
                    .map(|m| m.short_name.clone())
            });
        let thread_limit = settings.thread_page_size.max(1);

        let mut session = ChatSession::new(params);
        session.set_status("Please select a model.");
        let transcript = session.transcript();

        Self {
            settings,
            settings_path,
            session,
            transcript,
            catalog,
            selected_model,
            input_text: String::new(),
            thread_limit,
            available_gb: available_gb(),
            transfer: None,
        }
    }

    /// Drain worker and transfer events. Returns true when something
    /// visible changed and the view should repaint now.
    pub fn poll(&mut self) -> bool {
        let refresh = match self.session.poll() {
            Ok(refresh) => refresh,
            Err(e) => {
                log_chat_error(&e);
                true
            }
        };
        if refresh {
            self.refresh_transcript();
        }
        let transfer_changed = self.poll_transfer();
        refresh || transfer_changed
    }

    /// A turn or a transfer is still running and needs polling.
    pub fn is_busy(&self) -> bool {
        self.session.is_generating() || self.transfer.is_some()
    }

    pub fn refresh_transcript(&mut self) {
        self.transcript = self.session.transcript();
    }

    pub fn memory_line(&self) -> String {
        describe_available(self.available_gb)
    }

    pub fn selected_details(&self) -> Option<&ModelDetails> {
        let catalog = self.catalog.as_ref()?;
        catalog.get(self.selected_model.as_deref()?)
    }

    /// Models offered in the picker; empty with a status when memory is short.
    pub fn offered_models(&self) -> Result<Vec<ModelDetails>, String> {
        let Some(catalog) = self.catalog.as_ref() else {
            return Err("Model catalog unavailable.".to_string());
        };
        catalog
            .fitting(self.available_gb)
            .map(|models| models.into_iter().cloned().collect())
            .map_err(|e| e.to_string())
    }

    pub fn submit(&mut self) {
        let text = std::mem::take(&mut self.input_text);
        match self.session.submit(&text) {
            Ok(SubmitOutcome::Started) => {}
            Ok(SubmitOutcome::CancelRequested) => {
                // Keep whatever was typed for after the stop.
                self.input_text = text;
            }
            Ok(SubmitOutcome::Ignored) => self.input_text = text,
            Err(e) => log_chat_error(&e),
        }
        self.refresh_transcript();
    }

    pub fn set_creativity(&mut self, value: f64) {
        self.settings.creativity = value;
        self.session.set_creativity(value);
    }

    pub fn set_token_length(&mut self, value: f64) {
        self.settings.token_length = value;
        self.session.set_token_length(value);
    }

    pub fn persist_settings(&self) {
        let Some(path) = self.settings_path.as_ref() else {
            return;
        };
        if let Err(e) = save_settings_to(path, &self.settings) {
            warn!(error = %e, "failed to save settings");
        }
    }

    pub fn select_model(&mut self, short_name: &str) {
        self.selected_model = Some(short_name.to_string());
    }

    /// Load the selected model, transferring it first when it is not local.
    pub fn load_selected(&mut self) {
        let Some(model) = self.selected_details().cloned() else {
            self.session.set_status("Please select a model.");
            return;
        };
        if !model.is_downloaded {
            self.start_transfer(&model);
            return;
        }

        let base = self.settings.effective_base_url();
        match ensure_ollama_running(&base) {
            OllamaStatus::AlreadyRunning | OllamaStatus::Started => {}
            OllamaStatus::NotFound => {
                self.session
                    .set_status("Error: Ollama is not installed or not on PATH.");
                return;
            }
            OllamaStatus::StartFailed(msg) => {
                self.session.set_status(format!("Error: {}", msg));
                return;
            }
        }

        let client = OllamaClient::new(model.tag.clone(), base).with_thinking(model.reasoning);
        self.load_model(Arc::new(client), &model.short_name);
    }

    pub fn load_model(&mut self, model: Arc<dyn ChatModel>, short_name: &str) {
        info!(model = short_name, "loading model");
        self.session.load_model(model);
        self.settings.last_model = Some(short_name.to_string());
        self.persist_settings();
    }

    fn start_transfer(&mut self, model: &ModelDetails) {
        if self.transfer.is_some() {
            return;
        }
        let Some(binary) = ollama_binary() else {
            self.session
                .set_status("Error: Ollama is not installed or not on PATH.");
            return;
        };
        match ModelTransfer::start(&binary, &model.tag) {
            Ok(transfer) => {
                self.session.set_status(format!("Downloading {}...", model.short_name));
                self.transfer = Some(TransferState {
                    transfer,
                    short_name: model.short_name.clone(),
                    percent: 0,
                    status: String::new(),
                });
            }
            Err(e) => {
                error!(error = %e, "failed to start model transfer");
                self.session.set_status(format!("Error: {}", e));
            }
        }
    }

    pub fn cancel_transfer(&mut self) {
        if let Some(state) = self.transfer.as_ref() {
            state.transfer.cancel();
        }
    }

    fn poll_transfer(&mut self) -> bool {
        let Some(state) = self.transfer.as_mut() else {
            return false;
        };
        let mut changed = false;
        while let Some(event) = state.transfer.try_next() {
            changed = true;
            if event.is_terminal() {
                let short_name = state.short_name.clone();
                self.transfer = None;
                self.end_transfer(event, &short_name);
                return true;
            }
            if let TransferEvent::Progress { percent, status } = event {
                state.percent = percent;
                state.status = status;
            }
        }
        changed
    }

    fn end_transfer(&mut self, event: TransferEvent, short_name: &str) {
        match event {
            TransferEvent::Finished => self.finish_transfer(short_name),
            TransferEvent::Failed { error } => self.session.set_status(format!("Error: {}", error)),
            TransferEvent::Cancelled => self.session.set_status("Download cancelled."),
            TransferEvent::Progress { .. } => {}
        }
    }

    fn finish_transfer(&mut self, short_name: &str) {
        let Some(catalog) = self.catalog.as_mut() else {
            return;
        };
        if let Err(e) = catalog.mark_downloaded(short_name) {
            error!(error = %e, "failed to record downloaded model");
            self.session.set_status(format!("Error: {}", e));
            return;
        }
        self.selected_model = Some(short_name.to_string());
        self.load_selected();
    }

    /// Threads newest first, limited to the current page.
    pub fn visible_threads(&self) -> Vec<ThreadSummary> {
        let mut threads = self.session.thread_summaries(self.thread_limit);
        threads.reverse();
        threads
    }

    pub fn has_more_threads(&self) -> bool {
        self.session.store().thread_count() > self.thread_limit
    }

    pub fn see_more(&mut self) {
        self.thread_limit += self.settings.thread_page_size.max(1);
    }

    pub fn new_thread(&mut self) {
        match self.session.new_thread() {
            Ok(_) => self.refresh_transcript(),
            Err(e) => log_chat_error(&e),
        }
    }

    pub fn switch_thread(&mut self, index: usize) {
        match self.session.switch_thread(index) {
            Ok(()) => self.refresh_transcript(),
            Err(e) => log_chat_error(&e),
        }
    }

    pub fn delete_thread(&mut self, index: usize) {
        match self.session.delete_thread(index) {
            Ok(()) => self.refresh_transcript(),
            Err(e) => log_chat_error(&e),
        }
    }
}

fn log_chat_error(e: &ChatError) {
    if e.is_user_facing() {
        info!(%e, "chat request refused");
    } else {
        error!(%e, "chat state defect");
    }
}
