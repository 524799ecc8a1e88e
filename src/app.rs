//! Composition root.
//!
//! Wires the production capabilities (ffmpeg, the detection command, the
//! similarity service, whisper, Gemini, on-disk stores) into the library's
//! components according to a [`Config`].

use crate::config::Config;
use crate::defaults;
use crate::error::{FacetrailError, Result};
use crate::history::ConversationLog;
use crate::identity::{EnrollmentStore, HttpFaceComparer, IdentityMatcher};
use crate::pipeline::PipelineOrchestrator;
use crate::storage::FsStore;
use crate::stt::{Transcriber, WhisperConfig, WhisperTranscriber};
use crate::transcript::{GeminiClient, TranscriptCoordinator};
use crate::vision::{CommandFaceDetector, CropPostProcessor, FfmpegDecoder, FrameScanner};
use std::sync::Arc;

/// Persistent state shared by every command.
pub struct Stores {
    pub enrollments: Arc<EnrollmentStore>,
    pub log: Arc<ConversationLog>,
}

/// Open the gallery and history stores under `config.storage.data_dir`.
pub fn open_stores(config: &Config) -> Result<Stores> {
    let storage = &config.storage;
    let index = Arc::new(FsStore::open(&storage.data_dir)?);
    let images = Arc::new(FsStore::open(storage.faces_dir())?);
    let conversations = Arc::new(FsStore::open(storage.conversations_dir())?);
    let detector = Arc::new(CommandFaceDetector::system(&config.detection));

    Ok(Stores {
        enrollments: Arc::new(EnrollmentStore::new(index, images, detector)),
        log: Arc::new(ConversationLog::new(conversations)),
    })
}

/// Build the full pipeline.
///
/// Fails fast on anything that would make every request degrade: a missing
/// similarity service URL, a missing language model key, or a missing
/// whisper model.
pub async fn build_pipeline(config: &Config, stores: &Stores) -> Result<PipelineOrchestrator> {
    let comparer = HttpFaceComparer::from_config(&config.matching)?.ok_or_else(|| {
        FacetrailError::ConfigInvalidValue {
            key: "matching.service_url".to_string(),
            message: "required to process videos (or set FACETRAIL_MATCH_SERVICE_URL)"
                .to_string(),
        }
    })?;

    let api_key = Config::llm_api_key().ok_or_else(|| FacetrailError::LanguageModel {
        message: "no API key (set GEMINI_API_KEY or FACETRAIL_LLM_API_KEY)".to_string(),
    })?;
    let model = GeminiClient::from_config(&config.transcript, &api_key)?;

    let whisper = WhisperConfig::from(&config.transcript);
    tracing::info!(
        model = %whisper.model_path.display(),
        backend = defaults::gpu_backend(),
        "loading transcription model"
    );
    let transcriber = tokio::task::spawn_blocking(move || WhisperTranscriber::new(whisper))
        .await
        .map_err(|e| FacetrailError::Other(format!("model loading task failed: {e}")))??;
    tracing::info!(model = transcriber.model_name(), "transcription model ready");

    let detector = Arc::new(CommandFaceDetector::system(&config.detection));
    let crops = CropPostProcessor::new(config.storage.scratch_dir(), &config.scan);
    let scanner = FrameScanner::new(
        Arc::new(FfmpegDecoder::system()),
        detector,
        crops,
        &config.scan,
    );
    let matcher = IdentityMatcher::new(
        stores.enrollments.clone(),
        Arc::new(comparer),
        config.matching.threshold,
    );
    let transcripts = TranscriptCoordinator::new(Arc::new(transcriber), Arc::new(model));

    Ok(PipelineOrchestrator::new(
        Arc::new(scanner),
        Arc::new(matcher),
        Arc::new(transcripts),
        stores.log.clone(),
        &config.pipeline,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn open_stores_creates_layout() {
        let dir = TempDir::new().unwrap();
        let stores = open_stores(&config_in(&dir)).unwrap();

        assert!(dir.path().join("faces").is_dir());
        assert!(dir.path().join("conversations").is_dir());
        assert!(stores.enrollments.list().is_empty());
        assert_eq!(stores.log.history("Anyone").unwrap(), None);
    }

    #[tokio::test]
    async fn build_pipeline_requires_service_url() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.matching.service_url = None;
        let stores = open_stores(&config).unwrap();

        match build_pipeline(&config, &stores).await {
            Err(FacetrailError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "matching.service_url")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
