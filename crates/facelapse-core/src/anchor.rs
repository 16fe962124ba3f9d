//! Reference anchor — the sequence-wide scale reference, folded over every
//! frame's selection result.

use crate::landmarks::{FaceCandidate, PixelPoint};

/// Sequence-wide alignment reference: the smallest inter-eye distance seen
/// across all selected faces, plus the left-eye position of the frame that
/// produced it.
///
/// Because `min_eye_distance` is a global minimum, every frame's scale
/// correction `min_eye_distance / eye_distance` lies in (0, 1]: frames are
/// only ever shrunk, so the scale step never pushes content off the fixed
/// canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceAnchor {
    pub min_eye_distance: f32,
    pub left_eye: PixelPoint,
}

/// Fold per-frame selections into a reference anchor.
///
/// Frames without a selected face do not take part in the fold. Only a
/// strictly smaller eye distance replaces the running minimum, so the
/// earliest frame wins ties. Returns `None` when no frame in the sequence
/// produced a selected face — the caller must treat that as fatal before
/// any frame is aligned.
pub fn reference_anchor<'a, I>(selections: I) -> Option<ReferenceAnchor>
where
    I: IntoIterator<Item = Option<&'a FaceCandidate>>,
{
    selections
        .into_iter()
        .flatten()
        .fold(None, |best: Option<ReferenceAnchor>, face| {
            let eye_distance = face.eye_distance();
            match best {
                Some(current) if current.min_eye_distance <= eye_distance => Some(current),
                _ => Some(ReferenceAnchor {
                    min_eye_distance: eye_distance,
                    left_eye: face.left_eye,
                }),
            }
        })
}
