//! Composite frame score: how large and how centered a face is.

use crate::defaults::{AREA_WEIGHT, CENTER_WEIGHT};
use crate::vision::types::FaceBox;

/// Fraction of the frame covered by the box.
pub fn area_score(face: &FaceBox, frame_width: u32, frame_height: u32) -> f64 {
    let frame_area = f64::from(frame_width) * f64::from(frame_height);
    if frame_area == 0.0 {
        return 0.0;
    }
    face.area() as f64 / frame_area
}

/// 1 at the exact frame center, 0 at a corner.
pub fn center_score(face: &FaceBox, frame_width: u32, frame_height: u32) -> f64 {
    let half_w = f64::from(frame_width) / 2.0;
    let half_h = f64::from(frame_height) / 2.0;
    let max_dist = half_w.hypot(half_h);
    if max_dist == 0.0 {
        return 0.0;
    }
    let (cx, cy) = face.center();
    let dist = (cx - half_w).hypot(cy - half_h);
    1.0 - dist / max_dist
}

/// Weighted combination of the two partial scores.
pub fn combine(area: f64, center: f64) -> f64 {
    AREA_WEIGHT * area + CENTER_WEIGHT * center
}

pub fn composite_score(face: &FaceBox, frame_width: u32, frame_height: u32) -> f64 {
    combine(
        area_score(face, frame_width, frame_height),
        center_score(face, frame_width, frame_height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_full_frame_scores_one() {
        let face = FaceBox::new(0, 640, 480, 0);
        assert!((composite_score(&face, 640, 480) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn corner_pixel_scores_near_zero() {
        let face = FaceBox::new(0, 1, 1, 0);
        let score = composite_score(&face, 640, 480);
        assert!(score < 0.01, "score was {score}");
    }

    #[test]
    fn larger_box_at_same_center_scores_higher() {
        let small = FaceBox::new(220, 340, 260, 300);
        let large = FaceBox::new(180, 380, 300, 260);
        assert_eq!(small.center(), large.center());
        assert!(composite_score(&large, 640, 480) > composite_score(&small, 640, 480));
    }

    #[test]
    fn centered_box_beats_same_size_off_center() {
        let centered = FaceBox::new(200, 360, 280, 280);
        let off = FaceBox::new(0, 80, 80, 0);
        assert_eq!(centered.area(), off.area());
        assert!(composite_score(&centered, 640, 480) > composite_score(&off, 640, 480));
    }

    #[test]
    fn combine_is_monotonic_in_each_argument() {
        let steps: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
        for &fixed in &steps {
            for pair in steps.windows(2) {
                assert!(combine(pair[1], fixed) >= combine(pair[0], fixed));
                assert!(combine(fixed, pair[1]) >= combine(fixed, pair[0]));
            }
        }
    }

    #[test]
    fn zero_sized_frame_does_not_divide_by_zero() {
        let face = FaceBox::new(0, 0, 0, 0);
        assert_eq!(composite_score(&face, 0, 0), 0.0);
    }
}
