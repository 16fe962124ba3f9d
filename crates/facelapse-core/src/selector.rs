//! Subject-face selection — central-region eligibility plus closest-to-center choice.

use crate::landmarks::{FaceCandidate, LandmarkSet, LandmarkTopology, PixelPoint};

/// Whether a point lies in the central region of a frame: the middle
/// third-to-two-thirds rectangle of width and height.
pub fn central_region_contains(p: &PixelPoint, width: u32, height: u32) -> bool {
    let w = width as f32;
    let h = height as f32;
    (w / 3.0..=w * 2.0 / 3.0).contains(&p.x) && (h / 3.0..=h * 2.0 / 3.0).contains(&p.y)
}

/// Pick the subject face for one frame.
///
/// Denormalizes every landmark set, drops candidates whose nose falls
/// outside the central region, and among the survivors keeps the one whose
/// nose is closest to the frame center. Strict less-than comparison, so the
/// first candidate seen wins ties. Absence of a face is a normal outcome,
/// not an error.
pub fn select_face(
    sets: &[LandmarkSet],
    topology: &LandmarkTopology,
    width: u32,
    height: u32,
) -> Option<FaceCandidate> {
    let center = PixelPoint::new(width as f32 / 2.0, height as f32 / 2.0);

    let mut best: Option<(f32, FaceCandidate)> = None;
    for set in sets {
        let Some(candidate) = set.to_candidate(topology, width, height) else {
            continue;
        };
        if !central_region_contains(&candidate.nose, width, height) {
            continue;
        }

        let distance = candidate.nose.distance(&center);
        let improves = match &best {
            Some((min_distance, _)) => distance < *min_distance,
            None => true,
        };
        if improves {
            best = Some((distance, candidate));
        }
    }

    best.map(|(_, candidate)| candidate)
}
