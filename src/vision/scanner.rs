//! Finds the single best face crop in a video.
//!
//! Every `frame_rate x interval_secs` frames one frame is sampled and run
//! through the detector. Each box is scored on its own; a box whose score
//! strictly beats the best so far is cropped and becomes the candidate, so
//! the earliest of equally scored boxes wins.

use crate::config::ScanConfig;
use crate::error::{FacetrailError, Result};
use crate::vision::crop::CropPostProcessor;
use crate::vision::detector::FaceDetector;
use crate::vision::score::composite_score;
use crate::vision::types::CandidateCrop;
use crate::vision::video::VideoDecoder;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub struct FrameScanner {
    decoder: Arc<dyn VideoDecoder>,
    detector: Arc<dyn FaceDetector>,
    crops: CropPostProcessor,
    interval_secs: f64,
    min_valid_frames: usize,
    fallback_fps: u32,
}

impl FrameScanner {
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        detector: Arc<dyn FaceDetector>,
        crops: CropPostProcessor,
        scan: &ScanConfig,
    ) -> Self {
        Self {
            decoder,
            detector,
            crops,
            interval_secs: scan.interval_secs,
            min_valid_frames: scan.min_valid_frames,
            fallback_fps: scan.fallback_fps,
        }
    }

    /// Number of frames between two samples for a given container frame rate.
    pub fn frame_step(&self, frame_rate: f64) -> usize {
        let fps = if frame_rate.is_finite() && frame_rate >= 1.0 {
            frame_rate.trunc()
        } else {
            f64::from(self.fallback_fps)
        };
        ((fps * self.interval_secs).trunc() as usize).max(1)
    }

    /// Scan `video` and return the best candidate crop.
    ///
    /// # Errors
    /// `VideoUnreadable` if the video cannot be opened, `NoFaceFound` if fewer
    /// than the configured minimum of sampled frames contained a face.
    /// Detector failures on a single frame skip that frame, except a missing
    /// detector tool, which aborts the scan.
    pub fn scan(&self, video: &Path) -> Result<CandidateCrop> {
        let started = Instant::now();
        let mut stream = self.decoder.open(video)?;
        let step = self.frame_step(stream.frame_rate());

        let mut best: Option<CandidateCrop> = None;
        let mut frame_index = 0usize;
        let mut sampled = 0usize;
        let mut valid_frames = 0usize;

        while let Some(frame) = stream.next_frame()? {
            sampled += 1;
            let (width, height) = frame.dimensions();

            let boxes = match self.detector.detect(&frame) {
                Ok(boxes) => boxes,
                Err(e @ FacetrailError::ToolNotFound { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(frame_index, error = %e, "face detection failed, skipping frame");
                    Vec::new()
                }
            };

            if !boxes.is_empty() {
                valid_frames += 1;
                for face in boxes {
                    let face = face.clamped(width, height);
                    if face.is_empty() {
                        continue;
                    }
                    let score = composite_score(&face, width, height);
                    if best.as_ref().is_none_or(|b| score > b.score) {
                        let image_path = self.crops.process(&frame, &face)?;
                        tracing::debug!(frame_index, score, path = %image_path.display(), "new best face");
                        best = Some(CandidateCrop {
                            image_path,
                            score,
                            source_frame_index: frame_index,
                        });
                    }
                }
            }

            let to_skip = step - 1;
            if stream.skip_frames(to_skip)? < to_skip {
                break;
            }
            frame_index += step;
        }

        tracing::info!(
            video = %video.display(),
            sampled,
            valid_frames,
            step,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "frame scan finished"
        );

        match best {
            Some(candidate) if valid_frames >= self.min_valid_frames => {
                tracing::info!(
                    score = candidate.score,
                    frame = candidate.source_frame_index,
                    path = %candidate.image_path.display(),
                    "best face selected"
                );
                Ok(candidate)
            }
            _ => Err(FacetrailError::NoFaceFound { valid_frames }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::detector::MockFaceDetector;
    use crate::vision::types::FaceBox;
    use crate::vision::video::MemoryVideoDecoder;
    use image::RgbImage;
    use tempfile::TempDir;

    fn scanner(
        dir: &TempDir,
        frames: usize,
        fps: f64,
        detector: MockFaceDetector,
    ) -> (FrameScanner, Arc<MockFaceDetector>) {
        let detector = Arc::new(detector);
        let config = ScanConfig::default();
        let scanner = FrameScanner::new(
            Arc::new(MemoryVideoDecoder::new(vec![RgbImage::new(64, 48); frames], fps)),
            detector.clone(),
            CropPostProcessor::new(dir.path(), &config),
            &config,
        );
        (scanner, detector)
    }

    fn crop_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn frame_step_follows_rate_and_interval() {
        let dir = TempDir::new().unwrap();
        let (scanner, _) = scanner(&dir, 0, 0.0, MockFaceDetector::empty());
        assert_eq!(scanner.frame_step(30.0), 60);
        assert_eq!(scanner.frame_step(29.97), 58);
        assert_eq!(scanner.frame_step(0.0), 50);
        assert_eq!(scanner.frame_step(0.25), 50);
    }

    #[test]
    fn frame_step_is_at_least_one() {
        let dir = TempDir::new().unwrap();
        let config = ScanConfig {
            interval_secs: 0.01,
            ..ScanConfig::default()
        };
        let scanner = FrameScanner::new(
            Arc::new(MemoryVideoDecoder::new(vec![], 30.0)),
            Arc::new(MockFaceDetector::empty()),
            CropPostProcessor::new(dir.path(), &config),
            &config,
        );
        assert_eq!(scanner.frame_step(30.0), 1);
    }

    #[test]
    fn samples_every_step_frames() {
        let dir = TempDir::new().unwrap();
        // 1 fps, 2s interval → frames 0, 2, 4, 6, 8
        let (scanner, detector) = scanner(&dir, 9, 1.0, MockFaceDetector::empty());
        assert!(scanner.scan(Path::new("v.mp4")).is_err());
        assert_eq!(detector.calls(), 5);
    }

    #[test]
    fn no_faces_anywhere_is_no_face_found() {
        let dir = TempDir::new().unwrap();
        let (scanner, _) = scanner(&dir, 10, 1.0, MockFaceDetector::empty());
        match scanner.scan(Path::new("v.mp4")) {
            Err(FacetrailError::NoFaceFound { valid_frames }) => assert_eq!(valid_frames, 0),
            other => panic!("Expected NoFaceFound, got {other:?}"),
        }
        assert_eq!(crop_count(&dir), 0);
    }

    #[test]
    fn too_few_valid_frames_is_no_face_found() {
        let dir = TempDir::new().unwrap();
        let face = FaceBox::new(10, 40, 40, 10);
        // Two frames with a face, the rest empty
        let detector = MockFaceDetector::empty().then(vec![face]).then(vec![face]);
        let (scanner, _) = scanner(&dir, 10, 1.0, detector);
        match scanner.scan(Path::new("v.mp4")) {
            Err(FacetrailError::NoFaceFound { valid_frames }) => assert_eq!(valid_frames, 2),
            other => panic!("Expected NoFaceFound, got {other:?}"),
        }
    }

    #[test]
    fn valid_frames_count_once_per_frame_not_per_box() {
        let dir = TempDir::new().unwrap();
        let a = FaceBox::new(0, 10, 10, 0);
        let b = FaceBox::new(30, 50, 45, 35);
        let detector = MockFaceDetector::empty().then(vec![a, b, a]).then(vec![a]);
        let (scanner, _) = scanner(&dir, 4, 1.0, detector);
        match scanner.scan(Path::new("v.mp4")) {
            Err(FacetrailError::NoFaceFound { valid_frames }) => assert_eq!(valid_frames, 2),
            other => panic!("Expected NoFaceFound, got {other:?}"),
        }
    }

    #[test]
    fn picks_highest_scoring_box_across_frames() {
        let dir = TempDir::new().unwrap();
        let small = FaceBox::new(20, 36, 28, 28);
        let big_centered = FaceBox::new(8, 48, 40, 16);
        let detector = MockFaceDetector::empty()
            .then(vec![small])
            .then(vec![small, big_centered])
            .then(vec![small]);
        let (scanner, _) = scanner(&dir, 6, 1.0, detector);

        let candidate = scanner.scan(Path::new("v.mp4")).unwrap();
        assert_eq!(candidate.source_frame_index, 2);
        assert!((candidate.score - composite_score(&big_centered, 64, 48)).abs() < 1e-12);
        assert!(candidate.image_path.exists());
    }

    #[test]
    fn ties_keep_the_earliest_candidate() {
        let dir = TempDir::new().unwrap();
        let face = FaceBox::new(8, 48, 40, 16);
        let (scanner, _) = scanner(&dir, 6, 1.0, MockFaceDetector::always(vec![face]));

        let candidate = scanner.scan(Path::new("v.mp4")).unwrap();
        assert_eq!(candidate.source_frame_index, 0);
        // Only the first box ever produced a crop
        assert_eq!(crop_count(&dir), 1);
    }

    #[test]
    fn superseded_crops_stay_on_disk() {
        let dir = TempDir::new().unwrap();
        let detector = MockFaceDetector::empty()
            .then(vec![FaceBox::new(0, 8, 8, 0)])
            .then(vec![FaceBox::new(16, 40, 32, 24)])
            .then(vec![FaceBox::new(4, 60, 44, 4)]);
        let (scanner, _) = scanner(&dir, 6, 1.0, detector);

        let candidate = scanner.scan(Path::new("v.mp4")).unwrap();
        assert_eq!(candidate.source_frame_index, 4);
        assert_eq!(crop_count(&dir), 3);
    }

    #[test]
    fn failed_frame_detection_is_skipped() {
        let dir = TempDir::new().unwrap();
        let face = FaceBox::new(8, 48, 40, 16);
        let detector = MockFaceDetector::always(vec![face]).then_fail("flaky");
        let (scanner, _) = scanner(&dir, 8, 1.0, detector);

        let candidate = scanner.scan(Path::new("v.mp4")).unwrap();
        assert_eq!(candidate.source_frame_index, 2);
    }

    #[test]
    fn unreadable_video_propagates() {
        let dir = TempDir::new().unwrap();
        let config = ScanConfig::default();
        let scanner = FrameScanner::new(
            Arc::new(MemoryVideoDecoder::unreadable()),
            Arc::new(MockFaceDetector::empty()),
            CropPostProcessor::new(dir.path(), &config),
            &config,
        );
        assert!(matches!(
            scanner.scan(Path::new("broken.mp4")),
            Err(FacetrailError::VideoUnreadable { .. })
        ));
    }
}
