//! Visual track: find the best face crop in a video.
//!
//! decode → sample → detect → score → crop

pub mod crop;
pub mod detector;
pub mod scanner;
pub mod score;
pub mod types;
pub mod video;

pub use crop::{CropPostProcessor, prune_scratch};
pub use detector::{CommandFaceDetector, FaceDetector, MockFaceDetector};
pub use scanner::FrameScanner;
pub use score::composite_score;
pub use types::{CandidateCrop, FaceBox};
pub use video::{FfmpegDecoder, FrameStream, MemoryVideoDecoder, VideoDecoder};
