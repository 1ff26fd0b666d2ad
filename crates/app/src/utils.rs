//! Settings persistence and path helpers for the Ember app.

use anyhow::Context;
use shared::settings::AppSettings;
use std::path::{Path, PathBuf};
use tracing::warn;

const APP_DIR: &str = "ember";

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push(APP_DIR);
        p.push("settings.json");
        p
    })
}

/// Read settings from `path`, falling back to defaults when the file is
/// missing or unreadable. The flag is true on a fresh install.
pub fn load_settings_from(path: &Path) -> (AppSettings, bool) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return (AppSettings::default(), true),
    };
    match serde_json::from_slice::<AppSettings>(&bytes) {
        Ok(settings) => (settings, false),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unparsable settings");
            (AppSettings::default(), false)
        }
    }
}

pub fn load_settings_or_default() -> (AppSettings, bool) {
    match config_path() {
        Some(path) => load_settings_from(&path),
        None => (AppSettings::default(), true),
    }
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(settings)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Where per-model marker files live: the settings override, else the
/// platform data directory.
pub fn model_dir(settings: &AppSettings) -> PathBuf {
    if let Some(dir) = settings.model_dir.as_deref().filter(|d| !d.trim().is_empty()) {
        return expand_user_path(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("models")
}

pub fn expand_user_path(path_str: &str) -> PathBuf {
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = AppSettings::default();
        settings.creativity = 80.0;
        settings.last_model = Some("gpt-oss-20b".into());
        save_settings_to(&path, &settings).unwrap();

        let (loaded, fresh) = load_settings_from(&path);
        assert!(!fresh);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_or_broken_settings_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let (settings, fresh) = load_settings_from(&path);
        assert!(fresh);
        assert_eq!(settings, AppSettings::default());

        std::fs::write(&path, b"{ not json").unwrap();
        let (settings, fresh) = load_settings_from(&path);
        assert!(!fresh);
        assert_eq!(settings.thread_page_size, 32);
    }

    #[test]
    fn test_model_dir_override() {
        let mut settings = AppSettings::default();
        settings.model_dir = Some("/srv/models".into());
        assert_eq!(model_dir(&settings), PathBuf::from("/srv/models"));

        settings.model_dir = Some("  ".into());
        assert!(model_dir(&settings).ends_with("ember/models"));
    }
}
