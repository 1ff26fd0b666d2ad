pub mod cancel;
pub mod error;
pub mod events;
pub mod generation;
pub mod message;

pub use cancel::CancelToken;
pub use error::ChatError;
pub use generation::GenerationParams;
pub use message::{Fragment, FragmentKind, Marker, Message, Role};

pub mod settings {
    use serde::{Deserialize, Serialize};

    fn default_base_url() -> String {
        "http://127.0.0.1:11434".into()
    }

    fn default_creativity() -> f64 {
        50.0
    }

    fn default_token_length() -> f64 {
        0.5
    }

    fn default_page_size() -> usize {
        32
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct AppSettings {
        /// Where the Ollama server listens
        #[serde(default = "default_base_url")]
        pub ollama_base_url: String,
        /// Overrides the directory holding per-model marker files
        #[serde(default)]
        pub model_dir: Option<String>,
        /// Catalog short name of the model loaded last
        #[serde(default)]
        pub last_model: Option<String>,
        /// Creativity slider position, 1-100
        #[serde(default = "default_creativity")]
        pub creativity: f64,
        /// Length slider position, 0-1
        #[serde(default = "default_token_length")]
        pub token_length: f64,
        /// How many threads the sidebar lists before "See more"
        #[serde(default = "default_page_size")]
        pub thread_page_size: usize,
    }

    impl Default for AppSettings {
        fn default() -> Self {
            Self {
                ollama_base_url: default_base_url(),
                model_dir: None,
                last_model: None,
                creativity: default_creativity(),
                token_length: default_token_length(),
                thread_page_size: default_page_size(),
            }
        }
    }

    impl AppSettings {
        /// `OLLAMA_BASE_URL` wins over the stored value.
        pub fn effective_base_url(&self) -> String {
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| self.ollama_base_url.clone())
        }
    }
}

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    /// One `{role, content}` pair of the dialogue replayed to a model.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: String, // "user" | "assistant"
        pub content: String,
    }

    impl ChatMessage {
        pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
            Self {
                role: role.into(),
                content: content.into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::settings::AppSettings;

    #[test]
    fn test_settings_fill_missing_fields() {
        let parsed: AppSettings = serde_json::from_str(r#"{"creativity": 80.0}"#).unwrap();
        assert_eq!(parsed.creativity, 80.0);
        assert_eq!(parsed.token_length, 0.5);
        assert_eq!(parsed.thread_page_size, 32);
        assert_eq!(parsed.ollama_base_url, "http://127.0.0.1:11434");
    }
}
