//! Built-in model catalog and local-presence detection.
//!
//! A model counts as present once its marker file exists under
//! `<model_dir>/default/<subdir>/details.json`. The marker is written after
//! a successful transfer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MARKER_FILE: &str = "details.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDetails {
    /// Display name, e.g. "💾 20B: gpt-oss-20b"
    pub name: String,
    pub short_name: String,
    /// Size label shown before the short name
    pub label: String,
    /// Tag passed to the inference server
    pub tag: String,
    /// Memory required before the model is offered at all. Kept at 0 so
    /// users may try anything; the notice states the recommendation.
    pub required_memory_gb: f64,
    pub recommended_memory_gb: f64,
    /// Whether the server should be asked for a separate reasoning channel
    pub reasoning: bool,
    pub save_path: PathBuf,
    pub details_path: PathBuf,
    pub is_downloaded: bool,
    pub notice: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MarkerPayload {
    model_name: String,
}

struct CatalogEntry {
    label: &'static str,
    short_name: &'static str,
    tag: &'static str,
    subdir: &'static str,
    recommended_gb: f64,
    reasoning: bool,
    description: &'static str,
    url: &'static str,
}

// Smallest first; the first entry is the default.
const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        label: "3B",
        short_name: "SmolLM3-3B",
        tag: "hf.co/ggml-org/SmolLM3-3B-GGUF:Q4_K_M",
        subdir: "smollm3_3b",
        recommended_gb: 5.0,
        reasoning: false,
        description: "A quantized build of HuggingFaceTB/SmolLM3-3B",
        url: "https://huggingface.co/HuggingFaceTB/SmolLM3-3B",
    },
    CatalogEntry {
        label: "20B",
        short_name: "gpt-oss-20b",
        tag: "gpt-oss:20b",
        subdir: "gpt_oss_20b",
        recommended_gb: 14.0,
        reasoning: true,
        description: "A quantized build of openai/gpt-oss-20b",
        url: "https://huggingface.co/openai/gpt-oss-20b",
    },
    CatalogEntry {
        label: "120B",
        short_name: "gpt-oss-120b",
        tag: "gpt-oss:120b",
        subdir: "gpt_oss_120b",
        recommended_gb: 60.0,
        reasoning: true,
        description: "A quantized build of openai/gpt-oss-120b",
        url: "https://huggingface.co/openai/gpt-oss-120b",
    },
];

fn notice(entry: &CatalogEntry) -> String {
    format!(
        "Recommended memory: ~{} GB\n\nDescription: {} ({})\n\nLicense: Apache 2.0",
        entry.recommended_gb, entry.description, entry.url
    )
}

fn display_name(entry: &CatalogEntry, present: bool) -> String {
    let prefix = if present { "💾" } else { "🔗" };
    format!("{} {}: {}", prefix, entry.label, entry.short_name)
}

/// Nothing in the catalog fits in the available memory.
#[derive(Debug, Clone, PartialEq)]
pub struct NotEnoughMemory {
    pub available_gb: f64,
    pub required_gb: f64,
}

impl std::fmt::Display for NotEnoughMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Not enough memory. Only {:.2} GB are available. {} GB are required.",
            self.available_gb, self.required_gb
        )
    }
}

pub struct ModelCatalog {
    model_dir: PathBuf,
    models: Vec<ModelDetails>,
}

impl ModelCatalog {
    /// Build the catalog, creating per-model directories as needed.
    pub fn load(model_dir: impl Into<PathBuf>) -> Result<Self> {
        let model_dir = model_dir.into();
        let mut catalog = Self {
            model_dir,
            models: Vec::new(),
        };
        catalog.refresh()?;
        Ok(catalog)
    }

    /// Re-check which models are present on disk.
    pub fn refresh(&mut self) -> Result<()> {
        let mut models = Vec::with_capacity(ENTRIES.len());
        for entry in ENTRIES {
            let save_path = self.model_dir.join("default").join(entry.subdir);
            fs::create_dir_all(&save_path)
                .with_context(|| format!("creating {}", save_path.display()))?;
            let details_path = save_path.join(MARKER_FILE);
            let is_downloaded = details_path.exists();

            models.push(ModelDetails {
                name: display_name(entry, is_downloaded),
                short_name: entry.short_name.to_string(),
                label: entry.label.to_string(),
                tag: entry.tag.to_string(),
                required_memory_gb: 0.0,
                recommended_memory_gb: entry.recommended_gb,
                reasoning: entry.reasoning,
                save_path,
                details_path,
                is_downloaded,
                notice: notice(entry),
            });
        }
        debug!(
            present = models.iter().filter(|m| m.is_downloaded).count(),
            "model catalog refreshed"
        );
        self.models = models;
        Ok(())
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn models(&self) -> &[ModelDetails] {
        &self.models
    }

    pub fn get(&self, short_name: &str) -> Option<&ModelDetails> {
        self.models.iter().find(|m| m.short_name == short_name)
    }

    pub fn default_model(&self) -> Option<&ModelDetails> {
        self.models.first()
    }

    /// Models whose memory requirement is below `available_gb`.
    pub fn fitting(&self, available_gb: f64) -> Result<Vec<&ModelDetails>, NotEnoughMemory> {
        let fits: Vec<&ModelDetails> = self
            .models
            .iter()
            .filter(|m| m.required_memory_gb < available_gb)
            .collect();
        if fits.is_empty() {
            let required_gb = self
                .models
                .iter()
                .map(|m| m.required_memory_gb)
                .fold(f64::INFINITY, f64::min);
            return Err(NotEnoughMemory {
                available_gb,
                required_gb,
            });
        }
        Ok(fits)
    }

    /// Record that a model's assets are now local.
    pub fn mark_downloaded(&mut self, short_name: &str) -> Result<()> {
        let model = self
            .get(short_name)
            .with_context(|| format!("unknown model {}", short_name))?;
        let payload = MarkerPayload {
            model_name: model.tag.clone(),
        };
        let json = serde_json::to_string_pretty(&payload)?;
        fs::write(&model.details_path, json)
            .with_context(|| format!("writing {}", model.details_path.display()))?;
        info!(model = short_name, "model marked as downloaded");
        self.refresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_catalog_has_nothing_downloaded() {
        let dir = TempDir::new().unwrap();
        let catalog = ModelCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.models().len(), 3);
        assert!(catalog.models().iter().all(|m| !m.is_downloaded));
        assert!(catalog.models()[0].name.starts_with("🔗"));
        assert_eq!(catalog.default_model().unwrap().label, "3B");
        assert!(dir.path().join("default/gpt_oss_20b").is_dir());
    }

    #[test]
    fn test_mark_downloaded_flips_prefix() {
        let dir = TempDir::new().unwrap();
        let mut catalog = ModelCatalog::load(dir.path()).unwrap();
        catalog.mark_downloaded("gpt-oss-20b").unwrap();

        let model = catalog.get("gpt-oss-20b").unwrap();
        assert!(model.is_downloaded);
        assert_eq!(model.name, "💾 20B: gpt-oss-20b");

        // A fresh load sees the marker too.
        let reloaded = ModelCatalog::load(dir.path()).unwrap();
        assert!(reloaded.get("gpt-oss-20b").unwrap().is_downloaded);
        assert!(!reloaded.get("gpt-oss-120b").unwrap().is_downloaded);
    }

    #[test]
    fn test_mark_unknown_model_fails() {
        let dir = TempDir::new().unwrap();
        let mut catalog = ModelCatalog::load(dir.path()).unwrap();
        assert!(catalog.mark_downloaded("nope").is_err());
    }

    #[test]
    fn test_fitting_by_memory() {
        let dir = TempDir::new().unwrap();
        let catalog = ModelCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.fitting(8.0).unwrap().len(), 3);

        let err = catalog.fitting(0.0).unwrap_err();
        assert!(err.to_string().starts_with("Not enough memory"));
    }

    #[test]
    fn test_notice_mentions_recommendation() {
        let dir = TempDir::new().unwrap();
        let catalog = ModelCatalog::load(dir.path()).unwrap();
        assert!(catalog.get("gpt-oss-120b").unwrap().notice.contains("~60 GB"));
    }
}
