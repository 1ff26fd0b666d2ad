//! Local services around the chat core: the model catalog, memory probing,
//! the Ollama server lifecycle and model transfers.

pub mod catalog;
pub mod memory;
pub mod ollama;
pub mod transfer;

pub use catalog::{ModelCatalog, ModelDetails, NotEnoughMemory};
pub use transfer::ModelTransfer;
