//! Whisper-based speech-to-text transcription.
//!
//! The audio track is pulled out of the media file with `ffmpeg` as 16 kHz
//! mono PCM and handed to whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::config::TranscriptConfig;
use crate::error::{FacetrailError, Result};
use crate::exec::spawn_error;
use crate::stt::transcriber::{Segment, Transcriber};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Sample rate Whisper expects.
pub const SAMPLE_RATE: u32 = 16_000;

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es", "fr"), "auto" to detect
    pub language: String,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl From<&TranscriptConfig> for WhisperConfig {
    fn from(config: &TranscriptConfig) -> Self {
        Self {
            model_path: config.whisper_model.clone(),
            language: config.language.clone(),
            threads: config.threads,
        }
    }
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self::from(&TranscriptConfig::default())
    }
}

/// Decode the audio track of `media` to 16 kHz mono samples in [-1.0, 1.0].
pub fn extract_audio(media: &Path) -> Result<Vec<f32>> {
    if !media.is_file() {
        return Err(FacetrailError::Transcription {
            message: format!("no such file: {}", media.display()),
        });
    }

    let rate = SAMPLE_RATE.to_string();
    let output = Command::new("ffmpeg")
        .arg("-v")
        .arg("error")
        .arg("-i")
        .arg(media)
        .args(["-vn", "-ac", "1", "-ar", rate.as_str(), "-f", "s16le", "-"])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error("ffmpeg", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FacetrailError::Transcription {
            message: format!("audio extraction failed: {}", stderr.trim()),
        });
    }

    Ok(samples_from_s16le(&output.stdout))
}

/// Convert little-endian 16-bit PCM to f32 normalized to [-1.0, 1.0].
///
/// A trailing odd byte is ignored.
pub fn samples_from_s16le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}

fn model_name_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Whisper-based transcriber implementation.
///
/// The WhisperContext is wrapped in a Mutex to ensure thread safety.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper-based transcriber placeholder (without whisper feature).
///
/// Fails every transcription. Enable the `whisper` feature to use real
/// transcription.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Load the model at `config.model_path`.
    ///
    /// # Errors
    /// Returns `FacetrailError::TranscriptionModelNotFound` if the model file doesn't exist
    /// Returns `FacetrailError::Transcription` if model loading fails
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(FacetrailError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_of(&config.model_path);

        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| FacetrailError::Transcription {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| FacetrailError::Transcription {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        tracing::info!(model = %model_name, "whisper model loaded");
        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    fn run(&self, audio: &[f32]) -> Result<Vec<Segment>> {
        let context = self
            .context
            .lock()
            .map_err(|e| FacetrailError::Transcription {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| FacetrailError::Transcription {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.config.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, audio)
            .map_err(|e| FacetrailError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        // Timestamps come back in centiseconds
        Ok(state
            .as_iter()
            .map(|segment| Segment {
                start: segment.start_timestamp() as f64 / 100.0,
                end: segment.end_timestamp() as f64 / 100.0,
                text: segment.to_string().trim().to_string(),
            })
            .filter(|segment| !segment.text.is_empty())
            .collect())
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Create a new Whisper transcriber (stub implementation).
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(FacetrailError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }
        let model_name = model_name_of(&config.model_path);
        Ok(Self { config, model_name })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, media: &Path) -> Result<Vec<Segment>> {
        let started = std::time::Instant::now();
        let audio = extract_audio(media)?;
        let segments = self.run(&audio)?;
        tracing::info!(
            media = %media.display(),
            segments = segments.len(),
            audio_secs = audio.len() as f64 / f64::from(SAMPLE_RATE),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transcription complete"
        );
        Ok(segments)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, _media: &Path) -> Result<Vec<Segment>> {
        Err(FacetrailError::Transcription {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}
