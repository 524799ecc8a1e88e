//! Runs the visual and audio tracks of one video side by side and merges
//! them.
//!
//! Every `process` call creates its own completion signal, so concurrent
//! requests never see each other's transcripts. The visual track only waits
//! on the audio track when its face is not in the gallery, and only for the
//! configured bound. The audio track is never cancelled; `process` returns
//! after both tracks have finished.

use crate::config::PipelineSettings;
use crate::error::{FacetrailError, Result};
use crate::history::ConversationLog;
use crate::identity::{IdentityMatcher, MatchResult};
use crate::pipeline::signal::{CompletionWaiter, WaitOutcome, completion_signal};
use crate::pipeline::types::{FinalResult, VisualOutcome};
use crate::transcript::{TranscriptCoordinator, TranscriptResult};
use crate::vision::FrameScanner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct PipelineOrchestrator {
    scanner: Arc<FrameScanner>,
    matcher: Arc<IdentityMatcher>,
    transcripts: Arc<TranscriptCoordinator>,
    log: Arc<ConversationLog>,
    name_wait: Duration,
}

impl PipelineOrchestrator {
    pub fn new(
        scanner: Arc<FrameScanner>,
        matcher: Arc<IdentityMatcher>,
        transcripts: Arc<TranscriptCoordinator>,
        log: Arc<ConversationLog>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            scanner,
            matcher,
            transcripts,
            log,
            name_wait: settings.name_wait(),
        }
    }

    /// Override how long an unmatched face waits for a name.
    pub fn with_name_wait(mut self, name_wait: Duration) -> Self {
        self.name_wait = name_wait;
        self
    }

    /// Identify the person in `video` and record the conversation.
    ///
    /// # Errors
    /// Only `VideoUnreadable`, and only after both tracks have finished.
    /// Every other failure is reported in the returned [`FinalResult`].
    pub async fn process(&self, video: &Path) -> Result<FinalResult> {
        let started = Instant::now();
        tracing::info!(video = %video.display(), "processing video");

        let (done, waiter) = completion_signal::<TranscriptResult>();

        let audio = {
            let transcripts = self.transcripts.clone();
            let video = video.to_path_buf();
            tokio::spawn(async move {
                let started = Instant::now();
                let result = transcripts.transcribe(&video).await;
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "audio track finished"
                );
                done.fire(result.clone());
                result
            })
        };

        let visual = {
            let scanner = self.scanner.clone();
            let matcher = self.matcher.clone();
            let video = video.to_path_buf();
            let name_wait = self.name_wait;
            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = visual_track(scanner, matcher, waiter, name_wait, video).await;
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "visual track finished"
                );
                outcome
            })
        };

        let (audio, visual) = tokio::join!(audio, visual);

        let transcript = audio.unwrap_or_else(|e| {
            tracing::error!(error = %e, "audio task failed");
            TranscriptResult::failed("", format!("audio task failed: {e}"))
        });
        let visual = match visual {
            Ok(outcome) => outcome?,
            Err(e) => {
                tracing::error!(error = %e, "visual task failed");
                VisualOutcome::failed(format!("visual task failed: {e}"))
            }
        };

        let result = FinalResult::merge(video.to_path_buf(), visual, transcript);
        self.record(&result).await;

        tracing::info!(
            face_status = ?result.face_status,
            face_name = ?result.face_name,
            guessed_name = ?result.guessed_name,
            auto_enrolled = result.auto_enrolled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "video processed"
        );
        Ok(result)
    }

    async fn record(&self, result: &FinalResult) {
        let log = self.log.clone();
        let person = result.person_key().to_string();
        let conversation = result.conversation.clone();
        match tokio::task::spawn_blocking(move || log.append(&person, &conversation)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "could not save conversation history"),
            Err(e) => tracing::warn!(error = %e, "history task failed"),
        }
    }
}

/// Scanning → matching → (unmatched) waiting for a name → enrolling.
async fn visual_track(
    scanner: Arc<FrameScanner>,
    matcher: Arc<IdentityMatcher>,
    transcript: CompletionWaiter<TranscriptResult>,
    name_wait: Duration,
    video: PathBuf,
) -> Result<VisualOutcome> {
    let scan = tokio::task::spawn_blocking(move || scanner.scan(&video)).await;
    let candidate = match scan {
        Ok(Ok(candidate)) => candidate,
        Ok(Err(FacetrailError::NoFaceFound { valid_frames })) => {
            tracing::info!(valid_frames, "no usable face");
            return Ok(VisualOutcome::no_face());
        }
        Ok(Err(e @ FacetrailError::VideoUnreadable { .. })) => return Err(e),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "frame scan failed");
            return Ok(VisualOutcome::failed(e.to_string()));
        }
        Err(e) => return Ok(VisualOutcome::failed(format!("scan task failed: {e}"))),
    };

    let (candidate_path, best_similarity) = match matcher.match_face(&candidate.image_path).await {
        Ok(MatchResult::Matched { name, similarity }) => {
            return Ok(VisualOutcome::matched(name, similarity));
        }
        Ok(MatchResult::Unmatched {
            candidate_image_path,
            best_similarity,
        }) => (candidate_image_path, best_similarity),
        Err(e) => {
            tracing::warn!(error = %e, "matching failed");
            return Ok(VisualOutcome::failed(e.to_string()));
        }
    };

    tracing::info!(wait_secs = name_wait.as_secs_f64(), "new face, waiting for a name");
    let name = match transcript.wait(name_wait).await {
        WaitOutcome::Ready(result) => result.usable_name().map(str::to_string),
        WaitOutcome::TimedOut => {
            tracing::warn!("no transcript in time, leaving face unnamed");
            None
        }
        WaitOutcome::Abandoned => {
            tracing::warn!("audio track ended without a transcript");
            None
        }
    };

    let Some(name) = name else {
        tracing::info!("no usable name, skipping enrollment");
        return Ok(VisualOutcome::unmatched(None, false, best_similarity));
    };

    let store = matcher.store().clone();
    let enroll_name = name.clone();
    let enrolled = match tokio::task::spawn_blocking(move || store.enroll(&enroll_name, &candidate_path)).await {
        Ok(Ok(_)) => {
            tracing::info!(%name, "auto-enrolled new person");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(%name, error = %e, "auto-enrollment failed");
            false
        }
        Err(e) => {
            tracing::warn!(%name, error = %e, "enrollment task failed");
            false
        }
    };
    Ok(VisualOutcome::unmatched(Some(name), enrolled, best_similarity))
}
