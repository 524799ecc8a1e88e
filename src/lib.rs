//! facetrail - Identify people in videos by face and conversation
//!
//! One video in, one merged result out: the best face in the footage is
//! matched against a gallery of known people while the audio is transcribed
//! and mined for the other person's name. Unknown faces are enrolled under
//! that name, and every conversation is appended to the person's history.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod exec;
pub mod history;
pub mod identity;
pub mod pipeline;
pub mod storage;
pub mod stt;
pub mod transcript;
pub mod vision;

// Composition root - needs the network adapters
#[cfg(feature = "remote")]
pub mod app;

// Capabilities
pub use exec::{CommandExecutor, SystemCommandExecutor};
pub use identity::FaceComparer;
pub use storage::KeyValueStore;
pub use stt::Transcriber;
pub use transcript::LanguageModel;
pub use vision::{FaceDetector, VideoDecoder};

// Pipeline
pub use pipeline::{FaceStatus, FinalResult, PipelineOrchestrator};

// Error handling
pub use error::{FacetrailError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_short_hash_when_built_from_git() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
