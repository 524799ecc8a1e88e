//! Audio track: transcribe, then ask the language model who is being
//! spoken to.

use crate::stt::Transcriber;
use crate::transcript::llm::LanguageModel;
use crate::transcript::prompt::{build_prompt, format_transcript, parse_extraction};
use crate::transcript::types::TranscriptResult;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub struct TranscriptCoordinator {
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn LanguageModel>,
}

impl TranscriptCoordinator {
    pub fn new(transcriber: Arc<dyn Transcriber>, model: Arc<dyn LanguageModel>) -> Self {
        Self { transcriber, model }
    }

    /// Produce the transcript result for `video`.
    ///
    /// Never fails: transcription or model errors come back as a degraded
    /// result with `error` set, and unparseable model output is kept in
    /// `model_output`.
    pub async fn transcribe(&self, video: &Path) -> TranscriptResult {
        let started = Instant::now();

        let transcriber = self.transcriber.clone();
        let media = video.to_path_buf();
        let segments = match tokio::task::spawn_blocking(move || transcriber.transcribe(&media)).await
        {
            Ok(Ok(segments)) => segments,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "transcription failed");
                return TranscriptResult::failed("", e.to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription task failed");
                return TranscriptResult::failed("", format!("transcription task failed: {e}"));
            }
        };
        tracing::info!(
            segments = segments.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transcription complete"
        );

        let raw_text = format_transcript(&segments);
        if segments.is_empty() {
            tracing::info!("no speech found, skipping name extraction");
            return TranscriptResult::default();
        }

        let output = match self.model.generate(&build_prompt(&raw_text)).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(model = self.model.model_name(), error = %e, "name extraction failed");
                return TranscriptResult::failed(raw_text, e.to_string());
            }
        };
        tracing::info!(
            model = self.model.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "language model replied"
        );

        match parse_extraction(&output) {
            Ok((guessed_name, conversation)) => {
                tracing::info!(guessed_name = ?guessed_name, turns = conversation.len(), "transcript analysed");
                TranscriptResult {
                    guessed_name,
                    conversation,
                    raw_text,
                    error: None,
                    model_output: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "language model output was not valid JSON");
                TranscriptResult {
                    model_output: Some(output),
                    ..TranscriptResult::failed(raw_text, e.to_string())
                }
            }
        }
    }
}
