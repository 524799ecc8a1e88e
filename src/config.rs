use crate::defaults;
use crate::error::{FacetrailError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub scan: ScanConfig,
    pub matching: MatchingConfig,
    pub detection: DetectionConfig,
    pub transcript: TranscriptConfig,
    pub pipeline: PipelineSettings,
}

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Frame sampling and crop post-processing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    pub interval_secs: f64,
    pub min_valid_frames: usize,
    pub fallback_fps: u32,
    pub crop_margin: f64,
    pub brightness_alpha: f32,
    pub brightness_beta: f32,
}

/// Gallery matching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    pub threshold: f64,
    pub service_url: Option<String>,
    pub similarity_scale: SimilarityScale,
    pub request_timeout_secs: u64,
}

/// Scale the similarity service reports on.
///
/// Converted once, at the service boundary, onto the canonical 0-100 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityScale {
    /// 0-100, used as is.
    #[default]
    Percent,
    /// 0-1 (e.g. cosine similarity), multiplied by 100.
    Unit,
}

impl MatchingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SimilarityScale {
    /// Convert a raw service value to the canonical 0-100 scale.
    pub fn to_percent(self, raw: f64) -> f64 {
        match self {
            SimilarityScale::Percent => raw,
            SimilarityScale::Unit => raw * 100.0,
        }
    }
}

/// External face detection command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub command: String,
    pub args: Vec<String>,
}

/// Speech-to-text and name extraction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptConfig {
    pub whisper_model: PathBuf,
    pub language: String,
    pub threads: Option<usize>,
    pub llm_model: String,
    pub llm_endpoint: String,
    pub request_timeout_secs: u64,
}

/// Two-track coordination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub name_wait_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .map(|d| d.join("facetrail"))
                .unwrap_or_else(|| PathBuf::from("facetrail-data")),
        }
    }
}

impl StorageConfig {
    /// Directory holding enrolled reference images.
    pub fn faces_dir(&self) -> PathBuf {
        self.data_dir.join("faces")
    }

    /// Directory holding per-person conversation histories.
    pub fn conversations_dir(&self) -> PathBuf {
        self.data_dir.join("conversations")
    }

    /// Scratch directory for candidate crops.
    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join("temp_crops")
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::FRAME_INTERVAL_SECS,
            min_valid_frames: defaults::MIN_VALID_FRAMES,
            fallback_fps: defaults::FALLBACK_FPS,
            crop_margin: defaults::CROP_MARGIN,
            brightness_alpha: defaults::BRIGHTNESS_ALPHA,
            brightness_beta: defaults::BRIGHTNESS_BETA,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::MATCH_THRESHOLD,
            service_url: None,
            similarity_scale: SimilarityScale::Percent,
            request_timeout_secs: defaults::MATCH_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            command: defaults::DETECTION_COMMAND.to_string(),
            args: vec!["--model".to_string(), "hog".to_string()],
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            whisper_model: PathBuf::from(defaults::WHISPER_MODEL),
            language: defaults::LANGUAGE.to_string(),
            threads: None,
            llm_model: defaults::LLM_MODEL.to_string(),
            llm_endpoint: defaults::LLM_ENDPOINT.to_string(),
            request_timeout_secs: defaults::LLM_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl TranscriptConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            name_wait_secs: defaults::NAME_WAIT_SECS,
        }
    }
}

impl PipelineSettings {
    pub fn name_wait(&self) -> Duration {
        Duration::from_secs(self.name_wait_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FacetrailError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                FacetrailError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only when the file is missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(FacetrailError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scan.interval_secs.is_nan() || self.scan.interval_secs <= 0.0 {
            return Err(FacetrailError::ConfigInvalidValue {
                key: "scan.interval_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.scan.crop_margin < 0.0 {
            return Err(FacetrailError::ConfigInvalidValue {
                key: "scan.crop_margin".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.matching.threshold) {
            return Err(FacetrailError::ConfigInvalidValue {
                key: "matching.threshold".to_string(),
                message: "must be within 0-100".to_string(),
            });
        }
        for (key, secs) in [
            ("matching.request_timeout_secs", self.matching.request_timeout_secs),
            ("transcript.request_timeout_secs", self.transcript.request_timeout_secs),
        ] {
            if secs == 0 {
                return Err(FacetrailError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "must be at least one second".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - FACETRAIL_DATA_DIR → storage.data_dir
    /// - FACETRAIL_WHISPER_MODEL → transcript.whisper_model
    /// - FACETRAIL_LLM_MODEL → transcript.llm_model
    /// - FACETRAIL_MATCH_SERVICE_URL → matching.service_url
    /// - FACETRAIL_NAME_WAIT_SECS → pipeline.name_wait_secs
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("FACETRAIL_DATA_DIR")
            && !dir.is_empty()
        {
            self.storage.data_dir = PathBuf::from(dir);
        }

        if let Ok(model) = std::env::var("FACETRAIL_WHISPER_MODEL")
            && !model.is_empty()
        {
            self.transcript.whisper_model = PathBuf::from(model);
        }

        if let Ok(model) = std::env::var("FACETRAIL_LLM_MODEL")
            && !model.is_empty()
        {
            self.transcript.llm_model = model;
        }

        if let Ok(url) = std::env::var("FACETRAIL_MATCH_SERVICE_URL")
            && !url.is_empty()
        {
            self.matching.service_url = Some(url);
        }

        if let Ok(secs) = std::env::var("FACETRAIL_NAME_WAIT_SECS")
            && let Ok(secs) = secs.parse::<u64>()
        {
            self.pipeline.name_wait_secs = secs;
        }

        self
    }

    /// Language model API key, read from the environment only.
    pub fn llm_api_key() -> Option<String> {
        ["FACETRAIL_LLM_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.is_empty())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/facetrail/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("facetrail")
            .join("config.toml")
    }
}
