//! Two-track processing of one video.
//!
//! The visual track (scan → match → optional enroll) and the audio track
//! (transcribe → extract name) run concurrently and meet at a per-request
//! completion signal.

pub mod orchestrator;
pub mod signal;
pub mod types;

pub use orchestrator::PipelineOrchestrator;
pub use signal::{CompletionSender, CompletionWaiter, WaitOutcome, completion_signal};
pub use types::{FaceStatus, FinalResult, VisualOutcome};
