//! Default configuration constants for facetrail.
//!
//! Shared by the config layer and the components that fall back to them when
//! constructed without a config file.

/// Seconds of video between two sampled frames.
pub const FRAME_INTERVAL_SECS: f64 = 2.0;

/// Minimum number of sampled frames with at least one face before a scan
/// is trusted.
pub const MIN_VALID_FRAMES: usize = 3;

/// Frame rate assumed when the container reports none.
pub const FALLBACK_FPS: u32 = 25;

/// Margin added around a face box on every side, as a fraction of the box size.
pub const CROP_MARGIN: f64 = 0.5;

/// Contrast gain applied to a crop (`out = alpha * in + beta`).
pub const BRIGHTNESS_ALPHA: f32 = 1.5;

/// Brightness offset applied to a crop.
pub const BRIGHTNESS_BETA: f32 = 40.0;

/// Weight of the area ratio in the composite frame score.
pub const AREA_WEIGHT: f64 = 0.7;

/// Weight of the centeredness in the composite frame score.
pub const CENTER_WEIGHT: f64 = 0.3;

/// Similarity (0-100) at or above which a candidate matches a gallery entry.
pub const MATCH_THRESHOLD: f64 = 80.0;

/// Seconds before a similarity service request is abandoned.
pub const MATCH_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Best similarity reported when no comparison produced a value.
pub const NO_SIMILARITY: f64 = -1.0;

/// How long an unmatched face waits for the transcript to name it.
pub const NAME_WAIT_SECS: u64 = 180;

/// Name used when nobody could be identified.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Label for the person who recorded the video.
pub const SELF_SPEAKER: &str = "Me";

/// Default Whisper model file.
pub const WHISPER_MODEL: &str = "models/ggml-small.bin";

/// Default transcription language.
pub const LANGUAGE: &str = "en";

/// Default language model used for name extraction.
pub const LLM_MODEL: &str = "gemini-2.0-flash-lite";

/// Default language model API root.
pub const LLM_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Seconds before a language model request is abandoned.
pub const LLM_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default face detection command (from the `face_recognition` package).
pub const DETECTION_COMMAND: &str = "face_detection";

/// Name of the enrollment index file.
pub const INDEX_FILE: &str = "index.json";

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_weights_sum_to_one() {
        assert!((AREA_WEIGHT + CENTER_WEIGHT - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_similarity_is_below_any_real_score() {
        assert!(NO_SIMILARITY < 0.0);
        assert!(NO_SIMILARITY < MATCH_THRESHOLD);
    }

    #[test]
    fn gpu_backend_matches_compiled_feature() {
        let expected = if cfg!(feature = "cuda") {
            "CUDA"
        } else if cfg!(feature = "vulkan") {
            "Vulkan"
        } else if cfg!(feature = "hipblas") {
            "HipBLAS"
        } else if cfg!(feature = "openblas") {
            "OpenBLAS"
        } else {
            "CPU"
        };
        assert_eq!(gpu_backend(), expected);
    }
}
