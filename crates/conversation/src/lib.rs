//! Conversation core: streaming segmentation, thread storage and the
//! controller that runs one turn at a time on a background worker.

pub mod model_slot;
pub mod rate;
pub mod render;
pub mod segmenter;
pub mod session;
pub mod store;
pub mod worker;

pub use model_slot::ModelSlot;
pub use rate::RateTracker;
pub use render::{render_transcript, TranscriptBlock};
pub use segmenter::StreamSegmenter;
pub use session::{ChatSession, SubmitOutcome};
pub use store::{ConversationStore, ThreadSummary};
