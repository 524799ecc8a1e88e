//! Video decoding into RGB frames.
//!
//! [`FfmpegDecoder`] probes the stream with `ffprobe` and reads raw `rgb24`
//! frames from an `ffmpeg` child process. [`MemoryVideoDecoder`] serves
//! in-memory frames for tests.

use crate::error::{FacetrailError, Result};
use crate::exec::{CommandExecutor, SystemCommandExecutor, spawn_error};
use image::RgbImage;
use serde::Deserialize;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;

/// Opens videos for sequential frame access.
pub trait VideoDecoder: Send + Sync {
    /// Fails with `VideoUnreadable` when the file cannot be opened as a video.
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>>;
}

/// Sequential access to the frames of one video.
pub trait FrameStream: Send {
    /// Frames per second as reported by the container (0 when unknown).
    fn frame_rate(&self) -> f64;

    /// Decode the next frame, `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Advance past up to `count` frames. Returns how many were skipped.
    fn skip_frames(&mut self, count: usize) -> Result<usize> {
        for skipped in 0..count {
            if self.next_frame()?.is_none() {
                return Ok(skipped);
            }
        }
        Ok(count)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    #[serde(default)]
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    #[serde(default)]
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees. The display matrix wins over the legacy
    /// `rotate` tag.
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .map(|degrees: f64| degrees.round() as i64)
            .unwrap_or(0)
    }

    /// Size of the frames ffmpeg emits, which applies the rotation.
    fn display_size(&self) -> (u32, u32) {
        if self.rotation().rem_euclid(180) == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Parse an ffprobe rational such as `30000/1001` (or a plain number).
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    rate.is_finite().then_some(rate)
}

/// Decoder that shells out to ffprobe/ffmpeg.
pub struct FfmpegDecoder<E: CommandExecutor> {
    executor: E,
    ffprobe: String,
    ffmpeg: String,
}

impl FfmpegDecoder<SystemCommandExecutor> {
    pub fn system() -> Self {
        Self::new(SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> FfmpegDecoder<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            ffprobe: "ffprobe".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }

    /// Displayed width, height and frame rate of the first video stream.
    fn probe(&self, path: &Path) -> Result<(u32, u32, f64)> {
        let path_str = path.to_string_lossy().into_owned();
        let stdout = self
            .executor
            .execute(
                &self.ffprobe,
                &[
                    "-v",
                    "error",
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=width,height,r_frame_rate:stream_tags=rotate:stream_side_data=rotation",
                    "-of",
                    "json",
                    path_str.as_str(),
                ],
            )
            .map_err(|e| match e {
                FacetrailError::ToolFailed { message, .. } => FacetrailError::VideoUnreadable {
                    path: path.display().to_string(),
                    message,
                },
                other => other,
            })?;

        let probe: ProbeOutput =
            serde_json::from_str(&stdout).map_err(|e| FacetrailError::VideoUnreadable {
                path: path.display().to_string(),
                message: format!("unexpected ffprobe output: {e}"),
            })?;

        let stream = probe
            .streams
            .into_iter()
            .find(|s| s.width > 0 && s.height > 0)
            .ok_or_else(|| FacetrailError::VideoUnreadable {
                path: path.display().to_string(),
                message: "no video stream".to_string(),
            })?;

        let fps = stream
            .r_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .unwrap_or(0.0);
        let (width, height) = stream.display_size();
        Ok((width, height, fps))
    }
}

impl<E: CommandExecutor> VideoDecoder for FfmpegDecoder<E> {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>> {
        if !path.is_file() {
            return Err(FacetrailError::VideoUnreadable {
                path: path.display().to_string(),
                message: "no such file".to_string(),
            });
        }

        let (width, height, fps) = self.probe(path)?;

        let mut child = Command::new(&self.ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(&self.ffmpeg, e))?;

        let stdout = child.stdout.take().ok_or_else(|| FacetrailError::ToolFailed {
            tool: self.ffmpeg.clone(),
            message: "stdout not captured".to_string(),
        })?;

        tracing::debug!(path = %path.display(), width, height, fps, "opened video");
        Ok(Box::new(FfmpegFrameStream {
            child,
            reader: BufReader::new(stdout),
            width,
            height,
            fps,
        }))
    }
}

struct FfmpegFrameStream {
    child: Child,
    reader: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
}

impl FfmpegFrameStream {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl FrameStream for FfmpegFrameStream {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let mut buf = vec![0u8; self.frame_len()];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => Ok(RgbImage::from_raw(self.width, self.height, buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn skip_frames(&mut self, count: usize) -> Result<usize> {
        let frame_len = self.frame_len() as u64;
        for skipped in 0..count {
            let copied = io::copy(&mut (&mut self.reader).take(frame_len), &mut io::sink())?;
            if copied < frame_len {
                return Ok(skipped);
            }
        }
        Ok(count)
    }
}

impl Drop for FfmpegFrameStream {
    fn drop(&mut self) {
        // Stop decoding early if the scan ended before the stream did.
        if let Err(e) = self.child.kill()
            && e.kind() != io::ErrorKind::InvalidInput
        {
            tracing::debug!(error = %e, "ffmpeg kill failed");
        }
        if let Err(e) = self.child.wait() {
            tracing::debug!(error = %e, "ffmpeg wait failed");
        }
    }
}

/// Serves a fixed list of frames, for tests and benchmarks.
#[derive(Debug, Clone)]
pub struct MemoryVideoDecoder {
    frames: Option<Arc<Vec<RgbImage>>>,
    fps: f64,
}

impl MemoryVideoDecoder {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self {
            frames: Some(Arc::new(frames)),
            fps,
        }
    }

    /// A decoder for which every video fails to open.
    pub fn unreadable() -> Self {
        Self {
            frames: None,
            fps: 0.0,
        }
    }
}

impl VideoDecoder for MemoryVideoDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>> {
        let frames = self
            .frames
            .clone()
            .ok_or_else(|| FacetrailError::VideoUnreadable {
                path: path.display().to_string(),
                message: "cannot open".to_string(),
            })?;
        Ok(Box::new(MemoryFrameStream {
            frames,
            next: 0,
            fps: self.fps,
        }))
    }
}

struct MemoryFrameStream {
    frames: Arc<Vec<RgbImage>>,
    next: usize,
    fps: f64,
}

impl FrameStream for MemoryFrameStream {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = self.frames.get(self.next).cloned();
        if frame.is_some() {
            self.next += 1;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::MockCommandExecutor;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_rational_and_plain_frame_rates() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn probe_reads_first_video_stream() {
        let executor = MockCommandExecutor::new().with_response(
            r#"{"streams":[{"width":1280,"height":720,"r_frame_rate":"30/1"}]}"#,
        );
        let decoder = FfmpegDecoder::new(executor);
        let (w, h, fps) = decoder.probe(Path::new("clip.mp4")).unwrap();
        assert_eq!((w, h, fps), (1280, 720, 30.0));
    }

    #[test]
    fn probe_swaps_size_for_portrait_rotation() {
        let executor = MockCommandExecutor::new().with_response(
            r#"{"streams":[{"width":1920,"height":1080,"r_frame_rate":"30/1",
                "side_data_list":[{"side_data_type":"Display Matrix","rotation":-90}]}]}"#,
        );
        let decoder = FfmpegDecoder::new(executor);
        let (w, h, _) = decoder.probe(Path::new("phone.mp4")).unwrap();
        assert_eq!((w, h), (1080, 1920));
    }

    #[test]
    fn probe_honours_legacy_rotate_tag() {
        let executor = MockCommandExecutor::new().with_response(
            r#"{"streams":[{"width":1920,"height":1080,"r_frame_rate":"30/1",
                "tags":{"rotate":"270"}}]}"#,
        );
        let decoder = FfmpegDecoder::new(executor);
        let (w, h, _) = decoder.probe(Path::new("old_phone.mov")).unwrap();
        assert_eq!((w, h), (1080, 1920));
    }

    #[test]
    fn probe_keeps_size_for_upside_down_video() {
        let executor = MockCommandExecutor::new().with_response(
            r#"{"streams":[{"width":1280,"height":720,"r_frame_rate":"25/1",
                "side_data_list":[{"rotation":180}]}]}"#,
        );
        let decoder = FfmpegDecoder::new(executor);
        let (w, h, _) = decoder.probe(Path::new("flipped.mp4")).unwrap();
        assert_eq!((w, h), (1280, 720));
    }

    #[test]
    fn probe_without_video_stream_is_unreadable() {
        let executor = MockCommandExecutor::new().with_response(r#"{"streams":[]}"#);
        let decoder = FfmpegDecoder::new(executor);
        assert!(matches!(
            decoder.probe(Path::new("audio.m4a")),
            Err(FacetrailError::VideoUnreadable { .. })
        ));
    }

    #[test]
    fn probe_failure_maps_to_unreadable() {
        let executor = MockCommandExecutor::new().with_error(FacetrailError::ToolFailed {
            tool: "ffprobe".to_string(),
            message: "Invalid data found when processing input".to_string(),
        });
        let decoder = FfmpegDecoder::new(executor);
        match decoder.probe(Path::new("notes.txt")) {
            Err(FacetrailError::VideoUnreadable { message, .. }) => {
                assert!(message.contains("Invalid data"))
            }
            other => panic!("Expected VideoUnreadable, got {other:?}"),
        }
    }

    #[test]
    fn open_missing_file_is_unreadable() {
        let decoder = FfmpegDecoder::new(MockCommandExecutor::new());
        let err = decoder.open(Path::new("/nonexistent/video.mp4")).err();
        assert!(matches!(err, Some(FacetrailError::VideoUnreadable { .. })));
    }

    #[test]
    fn open_garbage_probe_output_is_unreadable() {
        let file = NamedTempFile::new().unwrap();
        let decoder = FfmpegDecoder::new(MockCommandExecutor::new().with_response("garbage"));
        let err = decoder.open(file.path()).err();
        assert!(matches!(err, Some(FacetrailError::VideoUnreadable { .. })));
    }

    #[test]
    fn memory_stream_yields_frames_then_none() {
        let decoder = MemoryVideoDecoder::new(vec![RgbImage::new(2, 2); 3], 10.0);
        let mut stream = decoder.open(Path::new("mem")).unwrap();
        assert_eq!(stream.frame_rate(), 10.0);
        assert!(stream.next_frame().unwrap().is_some());
        assert_eq!(stream.skip_frames(5).unwrap(), 2);
        assert!(stream.next_frame().unwrap().is_none());
    }

    #[test]
    fn unreadable_memory_decoder_fails_to_open() {
        let err = MemoryVideoDecoder::unreadable().open(Path::new("x")).err();
        assert!(matches!(err, Some(FacetrailError::VideoUnreadable { .. })));
    }
}
