//! Turns a detected face region into a normalized crop on disk.
//!
//! Crop with margin → brightness/contrast → edge-preserving smoothing →
//! JPEG under a random name in the scratch directory.

use crate::config::ScanConfig;
use crate::error::Result;
use crate::vision::types::FaceBox;
use image::{Rgb, RgbImage, imageops};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Bilateral filter neighborhood diameter.
const SMOOTH_DIAMETER: u32 = 5;
const SMOOTH_SIGMA_COLOR: f32 = 75.0;
const SMOOTH_SIGMA_SPACE: f32 = 75.0;

#[derive(Debug, Clone)]
pub struct CropPostProcessor {
    scratch_dir: PathBuf,
    margin: f64,
    alpha: f32,
    beta: f32,
}

impl CropPostProcessor {
    pub fn new(scratch_dir: impl Into<PathBuf>, scan: &ScanConfig) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            margin: scan.crop_margin,
            alpha: scan.brightness_alpha,
            beta: scan.brightness_beta,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Cut `face` out of `frame`, post-process it, and persist it.
    ///
    /// Returns the path of the new crop. Earlier crops are left in place.
    pub fn process(&self, frame: &RgbImage, face: &FaceBox) -> Result<PathBuf> {
        let crop = self.crop_with_margin(frame, face);
        let adjusted = adjust_brightness(&crop, self.alpha, self.beta);
        let smoothed = bilateral_smooth(&adjusted);

        fs::create_dir_all(&self.scratch_dir)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = self.scratch_dir.join(format!("{}.jpg", &id[..8]));
        smoothed.save(&path)?;
        Ok(path)
    }

    /// Symmetric margin of `margin` x box size, clipped to the frame.
    pub fn crop_with_margin(&self, frame: &RgbImage, face: &FaceBox) -> RgbImage {
        let (w, h) = frame.dimensions();
        let face = face.clamped(w, h);
        let pad_y = (f64::from(face.height()) * self.margin) as u32;
        let pad_x = (f64::from(face.width()) * self.margin) as u32;

        let top = face.top.saturating_sub(pad_y);
        let bottom = face.bottom.saturating_add(pad_y).min(h);
        let left = face.left.saturating_sub(pad_x);
        let right = face.right.saturating_add(pad_x).min(w);

        imageops::crop_imm(frame, left, top, right - left, bottom - top).to_image()
    }
}

/// `out = |alpha * in + beta|`, saturated to 0..=255.
pub fn adjust_brightness(image: &RgbImage, alpha: f32, beta: f32) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let v = (alpha * f32::from(*channel) + beta).abs().round();
            *channel = v.clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Edge-preserving noise smoothing over a circular 5-pixel neighborhood.
pub fn bilateral_smooth(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let radius = (SMOOTH_DIAMETER / 2) as i64;
    let space_coeff = -0.5 / (SMOOTH_SIGMA_SPACE * SMOOTH_SIGMA_SPACE);
    let color_coeff = -0.5 / (SMOOTH_SIGMA_COLOR * SMOOTH_SIGMA_COLOR);

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2 <= (radius * radius) as f32 {
                offsets.push((dx, dy, (r2 * space_coeff).exp()));
            }
        }
    }

    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let center = image.get_pixel(x, y);
            let mut sum = [0f32; 3];
            let mut weight_sum = 0f32;

            for &(dx, dy, space_weight) in &offsets {
                let nx = i64::from(x) + dx;
                let ny = i64::from(y) + dy;
                if nx < 0 || ny < 0 || nx >= i64::from(w) || ny >= i64::from(h) {
                    continue;
                }
                let neighbor = image.get_pixel(nx as u32, ny as u32);
                let color_dist: f32 = center
                    .0
                    .iter()
                    .zip(neighbor.0.iter())
                    .map(|(a, b)| (f32::from(*a) - f32::from(*b)).abs())
                    .sum();
                let weight = space_weight * (color_dist * color_dist * color_coeff).exp();
                for (acc, channel) in sum.iter_mut().zip(neighbor.0.iter()) {
                    *acc += weight * f32::from(*channel);
                }
                weight_sum += weight;
            }

            let px = sum.map(|v| (v / weight_sum).round().clamp(0.0, 255.0) as u8);
            out.put_pixel(x, y, Rgb(px));
        }
    }
    out
}

/// Delete scratch crops older than `max_age`. Returns how many were removed.
pub fn prune_scratch(dir: &Path, max_age: Duration) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let age = now
            .duration_since(meta.modified()?)
            .unwrap_or(Duration::ZERO);
        if age >= max_age {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    tracing::info!(dir = %dir.display(), removed, "pruned scratch crops");
    Ok(removed)
}
