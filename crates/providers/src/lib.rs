//! Model-call capability: anything that turns a dialogue into a lazy
//! stream of tagged fragments.

pub mod ollama;
pub mod scripted;
pub mod think_tags;

use anyhow::Result;
use shared::agent_api::ChatMessage;
use shared::{CancelToken, Fragment, GenerationParams};

/// Finite, non-restartable fragment sequence. Dropping it part-way is the
/// supported way to abandon a generation.
pub type FragmentStream = Box<dyn Iterator<Item = Result<Fragment>> + Send>;

pub trait ChatModel: Send + Sync {
    /// Name shown in the UI and in logs.
    fn name(&self) -> &str;

    /// Start generating a reply to `dialogue`.
    ///
    /// A backend may refuse to start by returning `Err`; anything that goes
    /// wrong once generation is under way arrives as an `Err` item.
    fn stream(
        &self,
        dialogue: &[ChatMessage],
        params: &GenerationParams,
        cancel: CancelToken,
    ) -> Result<FragmentStream>;
}
