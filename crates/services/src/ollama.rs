//! Ollama server lifecycle: find the binary, check the server answers,
//! start `ollama serve` when it doesn't.

use std::net::{TcpStream, ToSocketAddrs};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Result of trying to ensure Ollama is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OllamaStatus {
    /// Already running (system service or started earlier).
    AlreadyRunning,
    /// We started `ollama serve` ourselves.
    Started,
    /// The binary was found but the server never came up.
    StartFailed(String),
    /// No Ollama binary found anywhere.
    NotFound,
}

/// Binary name or path to run `ollama` commands with.
///
/// `OLLAMA_BIN` wins; otherwise the binary must be on `PATH`.
pub fn ollama_binary() -> Option<String> {
    if let Ok(path) = std::env::var("OLLAMA_BIN") {
        if !path.trim().is_empty() {
            return Some(path);
        }
    }
    let name = if cfg!(windows) { "ollama.exe" } else { "ollama" };
    if Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
    {
        Some(name.to_string())
    } else {
        None
    }
}

/// Check whether something is listening at the server's address.
pub fn ollama_reachable(base_url: &str) -> bool {
    let Ok(url) = Url::parse(base_url) else {
        warn!(base_url, "invalid ollama base url");
        return false;
    };
    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        return false;
    };
    let Ok(mut addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs.any(|addr| TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok())
}

/// Make sure Ollama is serving, starting it if necessary.
pub fn ensure_ollama_running(base_url: &str) -> OllamaStatus {
    if ollama_reachable(base_url) {
        return OllamaStatus::AlreadyRunning;
    }

    let Some(binary) = ollama_binary() else {
        return OllamaStatus::NotFound;
    };

    if let Err(e) = Command::new(&binary)
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        return OllamaStatus::StartFailed(format!("Failed to start Ollama: {}", e));
    }

    if wait_for_ollama(base_url, 8) {
        info!("started ollama serve");
        OllamaStatus::Started
    } else {
        OllamaStatus::StartFailed("Ollama started but didn't become reachable within 8 seconds".into())
    }
}

/// Poll until Ollama is reachable or timeout (in seconds).
fn wait_for_ollama(base_url: &str, timeout_secs: u32) -> bool {
    for _ in 0..(timeout_secs * 4) {
        if ollama_reachable(base_url) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    false
}
