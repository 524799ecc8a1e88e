//! Face detection capability.

use crate::config::DetectionConfig;
use crate::error::{FacetrailError, Result};
use crate::exec::{CommandExecutor, SystemCommandExecutor};
use crate::vision::types::FaceBox;
use image::{ImageFormat, RgbImage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Finds face regions in an image.
///
/// Returns an empty list when there is no face. Boxes may extend past the
/// image edges; callers clamp.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>>;
}

/// Detector backed by an external command.
///
/// The default is `face_detection` from the `face_recognition` package,
/// which prints one `file,top,right,bottom,left` line per face.
pub struct CommandFaceDetector<E: CommandExecutor> {
    executor: E,
    command: String,
    args: Vec<String>,
}

impl<E: CommandExecutor> CommandFaceDetector<E> {
    pub fn new(executor: E, config: &DetectionConfig) -> Self {
        Self {
            executor,
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl CommandFaceDetector<SystemCommandExecutor> {
    pub fn system(config: &DetectionConfig) -> Self {
        Self::new(SystemCommandExecutor::new(), config)
    }
}

impl<E: CommandExecutor> FaceDetector for CommandFaceDetector<E> {
    fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>> {
        let frame_file = tempfile::Builder::new()
            .prefix("facetrail-frame-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(frame_file.path(), ImageFormat::Png)?;

        let frame_path = frame_file.path().to_string_lossy().into_owned();
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        args.push(&frame_path);

        let stdout = self.executor.execute(&self.command, &args)?;
        Ok(parse_detection_output(&stdout))
    }
}

/// Parse `file,top,right,bottom,left` lines, ignoring anything else.
pub fn parse_detection_output(stdout: &str) -> Vec<FaceBox> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.trim().rsplitn(5, ',');
            let left = fields.next()?.trim().parse::<i64>().ok()?;
            let bottom = fields.next()?.trim().parse::<i64>().ok()?;
            let right = fields.next()?.trim().parse::<i64>().ok()?;
            let top = fields.next()?.trim().parse::<i64>().ok()?;
            fields.next()?;
            Some(FaceBox::new(
                clamp_coord(top),
                clamp_coord(right),
                clamp_coord(bottom),
                clamp_coord(left),
            ))
        })
        .collect()
}

fn clamp_coord(v: i64) -> u32 {
    v.clamp(0, i64::from(u32::MAX)) as u32
}

/// Mock detector for testing.
///
/// Returns scripted results in call order, then a fixed fallback.
#[derive(Debug, Default)]
pub struct MockFaceDetector {
    script: Mutex<VecDeque<Result<Vec<FaceBox>>>>,
    fallback: Vec<FaceBox>,
    calls: AtomicUsize,
}

impl MockFaceDetector {
    /// A detector that never finds a face.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A detector that finds the same boxes in every image.
    pub fn always(boxes: Vec<FaceBox>) -> Self {
        Self {
            fallback: boxes,
            ..Self::default()
        }
    }

    /// Queue the result of the next unscripted call.
    pub fn then(self, boxes: Vec<FaceBox>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(boxes));
        }
        self
    }

    /// Queue a failure for the next unscripted call.
    pub fn then_fail(self, message: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(FacetrailError::Detection {
                message: message.to_string(),
            }));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceDetector for MockFaceDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<FaceBox>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .script
            .lock()
            .map_err(|e| FacetrailError::Detection {
                message: e.to_string(),
            })?
            .pop_front();
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
