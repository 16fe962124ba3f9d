//! Per-frame alignment corrections derived from the reference anchor.

use crate::anchor::ReferenceAnchor;
use crate::landmarks::{FaceCandidate, PixelPoint};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    /// Both eye landmarks collapse onto the same pixel; the scale correction
    /// would be infinite.
    #[error("invalid anchor geometry: inter-eye distance is zero")]
    DegenerateEyes,
}

/// The three affine corrections that align one frame to the anchor.
///
/// Applied in fixed order by the compositor: shrink by `scale` about
/// `pivot`, translate by `translation`, rotate by `rotation_degrees` about
/// the translated pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignTransform {
    /// Uniform shrink factor in (0, 1]; exactly 1.0 for the anchor frame.
    /// Not clamped: an extreme distance outlier passes through unchanged.
    pub scale: f32,
    /// Shrink pivot: the frame's detected left-eye position.
    pub pivot: PixelPoint,
    /// Pixel shift moving the left eye onto the anchor position.
    pub translation: (f32, f32),
    /// Rotation leveling the eye line, in the convention of
    /// [`rotation_matrix`](crate::compositor::rotation_matrix) (positive =
    /// counter-clockwise about the pivot).
    pub rotation_degrees: f32,
}

/// Build the transform aligning one frame's selected face to the anchor.
pub fn build_transform(
    face: &FaceCandidate,
    anchor: &ReferenceAnchor,
) -> Result<AlignTransform, TransformError> {
    let eye_distance = face.eye_distance();
    if eye_distance <= 0.0 {
        return Err(TransformError::DegenerateEyes);
    }

    Ok(AlignTransform {
        scale: anchor.min_eye_distance / eye_distance,
        pivot: face.left_eye,
        translation: (
            anchor.left_eye.x - face.left_eye.x,
            anchor.left_eye.y - face.left_eye.y,
        ),
        rotation_degrees: leveling_angle(&face.left_eye, &face.right_eye),
    })
}

/// Degrees of rotation that bring the eye line to horizontal when the image
/// is rotated about the left eye.
pub fn leveling_angle(left_eye: &PixelPoint, right_eye: &PixelPoint) -> f32 {
    let dx = left_eye.x - right_eye.x;
    let dy = left_eye.y - right_eye.y;
    -dx.atan2(dy).to_degrees() - 90.0
}
