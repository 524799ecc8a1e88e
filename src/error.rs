//! Error types for facetrail.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacetrailError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Visual track errors
    #[error("Cannot open video {path}: {message}")]
    VideoUnreadable { path: String, message: String },

    #[error("No usable face found ({valid_frames} valid frames)")]
    NoFaceFound { valid_frames: usize },

    #[error("Cannot read image {path}: {message}")]
    ImageUnreadable { path: String, message: String },

    #[error("Face detection failed: {message}")]
    Detection { message: String },

    #[error("Face comparison failed: {message}")]
    Comparison { message: String },

    #[error("Enrollment of {name} failed: {message}")]
    Enrollment { name: String, message: String },

    // Audio track errors
    #[error("Transcription error: {message}")]
    Transcription { message: String },

    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Language model request failed: {message}")]
    LanguageModel { message: String },

    #[error("Could not parse language model output: {message}")]
    ResponseParse { message: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    // External tool errors
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FacetrailError>;
