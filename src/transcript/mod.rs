//! Audio track: transcript and name extraction.

pub mod coordinator;
pub mod llm;
pub mod prompt;
pub mod types;

pub use coordinator::TranscriptCoordinator;
#[cfg(feature = "remote")]
pub use llm::GeminiClient;
pub use llm::{LanguageModel, MockLanguageModel};
pub use types::{ConversationTurn, TranscriptResult};
