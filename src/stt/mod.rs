//! Speech-to-text.

pub mod transcriber;
pub mod whisper;

pub use transcriber::{MockTranscriber, Segment, Transcriber};
pub use whisper::{WhisperConfig, WhisperTranscriber};
