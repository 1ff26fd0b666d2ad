//! Model asset transfer through `ollama pull`.
//!
//! The pull runs on a background thread; progress comes back as
//! [`TransferEvent`]s over a channel the UI drains each frame. Cancelling
//! kills the child process.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use regex::Regex;
use shared::events::TransferEvent;
use shared::CancelToken;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ansi regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})%").expect("valid percent regex"));

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Parse one line of `ollama pull` output into `(percent, status)`.
///
/// Lines without a percentage still carry a status ("pulling manifest",
/// "verifying sha256 digest"); those report `None` for the percentage.
pub fn parse_progress(line: &str) -> Option<(Option<u8>, String)> {
    let clean = ANSI_RE.replace_all(line, "");
    let status = clean.trim();
    if status.is_empty() {
        return None;
    }
    let percent = PERCENT_RE
        .captures_iter(status)
        .last()
        .and_then(|cap| cap[1].parse::<u8>().ok())
        .map(|p| p.min(100));
    Some((percent, status.to_string()))
}

pub struct ModelTransfer {
    tag: String,
    cancel: CancelToken,
    events: Receiver<TransferEvent>,
}

impl ModelTransfer {
    /// Start pulling `tag` with the given ollama binary.
    pub fn start(binary: &str, tag: &str) -> Result<Self> {
        let mut command = Command::new(binary);
        command.args(["pull", tag]);
        Self::start_command(command, tag)
    }

    /// Run an arbitrary pull-like command. Progress is read from stderr.
    pub fn start_command(mut command: Command, tag: &str) -> Result<Self> {
        let mut child = command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start transfer of {}", tag))?;

        let (tx, rx) = channel();
        let cancel = CancelToken::new();
        let last_status = Arc::new(Mutex::new(String::new()));

        let reader = child.stderr.take().map(|stderr| {
            let tx = tx.clone();
            let last_status = Arc::clone(&last_status);
            std::thread::spawn(move || read_progress(stderr, tx, last_status))
        });

        let watch_cancel = cancel.clone();
        let watch_tag = tag.to_string();
        std::thread::Builder::new()
            .name("model-transfer".into())
            .spawn(move || {
                let event = match watch_child(&mut child, &watch_cancel) {
                    Outcome::Cancelled => TransferEvent::Cancelled,
                    Outcome::Error(error) => TransferEvent::Failed { error },
                    Outcome::Exited(status) => {
                        // Let the reader drain stderr so the last line is known.
                        if let Some(reader) = reader {
                            let _ = reader.join();
                        }
                        if status.success() {
                            TransferEvent::Finished
                        } else {
                            let last = last_status.lock().clone();
                            let error = if last.is_empty() {
                                format!("transfer exited with {}", status)
                            } else {
                                last
                            };
                            TransferEvent::Failed { error }
                        }
                    }
                };
                info!(tag = %watch_tag, ?event, "transfer ended");
                let _ = tx.send(event);
            })
            .context("failed to spawn transfer watcher")?;

        info!(tag, "transfer started");
        Ok(Self {
            tag: tag.to_string(),
            cancel,
            events: rx,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next pending event, without blocking.
    pub fn try_next(&self) -> Option<TransferEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block for the next event, up to `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<TransferEvent> {
        self.events.recv_timeout(timeout).ok()
    }
}

enum Outcome {
    Exited(ExitStatus),
    Cancelled,
    Error(String),
}

fn watch_child(child: &mut Child, cancel: &CancelToken) -> Outcome {
    loop {
        if cancel.is_cancelled() {
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to kill transfer process");
            }
            let _ = child.wait();
            return Outcome::Cancelled;
        }
        match child.try_wait() {
            Ok(Some(status)) => return Outcome::Exited(status),
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => return Outcome::Error(e.to_string()),
        }
    }
}

/// Forward progress lines. `ollama pull` redraws with carriage returns,
/// so both `\r` and `\n` end a line. Bytes are buffered until a line is
/// complete so the bar glyphs survive a split read.
fn read_progress(mut stderr: impl Read, tx: Sender<TransferEvent>, last_status: Arc<Mutex<String>>) {
    let mut chunk = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();
    let mut last_percent = 0u8;

    loop {
        let n = match stderr.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        pending.extend_from_slice(&chunk[..n]);

        while let Some(pos) = pending.iter().position(|b| *b == b'\r' || *b == b'\n') {
            let raw: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]);

            if let Some((percent, status)) = parse_progress(&line) {
                if let Some(p) = percent {
                    last_percent = p;
                }
                *last_status.lock() = status.clone();
                debug!(percent = last_percent, %status, "transfer progress");
                if tx
                    .send(TransferEvent::Progress {
                        percent: last_percent,
                        status,
                    })
                    .is_err()
                {
                    return;
                }
            }
        }
    }

    if let Some((_, status)) = parse_progress(&String::from_utf8_lossy(&pending)) {
        *last_status.lock() = status;
    }
}
