use crate::error::{FacetrailError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A stretch of recognized speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Trait for speech-to-text transcription.
///
/// Implementations block; async callers run them on the blocking pool.
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio track of an audio or video file.
    ///
    /// # Returns
    /// Time-ordered segments, possibly empty for silent media.
    fn transcribe(&self, media: &Path) -> Result<Vec<Segment>>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement Transcriber for Arc<T> to allow sharing across requests.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, media: &Path) -> Result<Vec<Segment>> {
        (**self).transcribe(media)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    segments: Vec<Segment>,
    should_fail: bool,
    delay: Duration,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            segments: vec![Segment::new(0.0, 1.0, "mock transcription")],
            should_fail: false,
            delay: Duration::ZERO,
        }
    }

    /// Configure the mock to return a single segment with `text`
    pub fn with_response(mut self, text: &str) -> Self {
        self.segments = vec![Segment::new(0.0, 1.0, text)];
        self
    }

    /// Configure the mock to return specific segments
    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Block for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _media: &Path) -> Result<Vec<Segment>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.should_fail {
            Err(FacetrailError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.segments.clone())
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
