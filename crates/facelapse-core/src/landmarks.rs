//! Landmark coordinate mapping — normalized detector output to pixel space.

use serde::{Deserialize, Serialize};

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &PixelPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Normalized landmarks for one detected face, in detector output order.
///
/// Coordinates are in [0, 1] per axis, relative to the frame resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub points: Vec<(f32, f32)>,
}

/// Which indices of a [`LandmarkSet`] carry the points this engine consumes.
///
/// Isolates the pipeline from a specific detector's landmark layout: the
/// same selection and alignment code runs against a 468-point face mesh or
/// a 5-point detector output.
#[derive(Debug, Clone, Copy)]
pub struct LandmarkTopology {
    /// Number of points a conforming set carries.
    pub len: usize,
    pub nose_tip: usize,
    pub left_eye_inner: usize,
    pub right_eye_inner: usize,
}

/// MediaPipe Face Mesh layout (468 points).
pub const FACE_MESH_TOPOLOGY: LandmarkTopology = LandmarkTopology {
    len: 468,
    nose_tip: 4,
    left_eye_inner: 133,
    right_eye_inner: 362,
};

/// Five-point layout emitted by SCRFD-family detectors:
/// [left_eye, right_eye, nose, left_mouth, right_mouth].
pub const FIVE_POINT_TOPOLOGY: LandmarkTopology = LandmarkTopology {
    len: 5,
    nose_tip: 2,
    left_eye_inner: 0,
    right_eye_inner: 1,
};

/// Pixel-space face geometry for one frame: nose tip plus inner eye corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCandidate {
    pub nose: PixelPoint,
    pub left_eye: PixelPoint,
    pub right_eye: PixelPoint,
}

impl FaceCandidate {
    /// Inter-eye pixel distance.
    pub fn eye_distance(&self) -> f32 {
        self.left_eye.distance(&self.right_eye)
    }
}

impl LandmarkSet {
    /// Denormalize the consumed points against a frame resolution.
    ///
    /// Returns `None` when the set is too short for the topology.
    pub fn to_candidate(
        &self,
        topology: &LandmarkTopology,
        width: u32,
        height: u32,
    ) -> Option<FaceCandidate> {
        let denorm = |idx: usize| -> Option<PixelPoint> {
            let &(nx, ny) = self.points.get(idx)?;
            Some(PixelPoint::new(nx * width as f32, ny * height as f32))
        };

        Some(FaceCandidate {
            nose: denorm(topology.nose_tip)?,
            left_eye: denorm(topology.left_eye_inner)?,
            right_eye: denorm(topology.right_eye_inner)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_point_set(nose: (f32, f32), left: (f32, f32), right: (f32, f32)) -> LandmarkSet {
        LandmarkSet {
            points: vec![left, right, nose, (0.4, 0.8), (0.6, 0.8)],
        }
    }

    #[test]
    fn test_pixel_distance() {
        let a = PixelPoint::new(0.0, 0.0);
        let b = PixelPoint::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_denormalize_five_point() {
        let set = five_point_set((0.5, 0.5), (0.25, 0.4), (0.75, 0.4));
        let candidate = set.to_candidate(&FIVE_POINT_TOPOLOGY, 640, 480).unwrap();

        assert!((candidate.nose.x - 320.0).abs() < 1e-4);
        assert!((candidate.nose.y - 240.0).abs() < 1e-4);
        assert!((candidate.left_eye.x - 160.0).abs() < 1e-4);
        assert!((candidate.right_eye.x - 480.0).abs() < 1e-4);
        assert!((candidate.left_eye.y - 192.0).abs() < 1e-4);
    }

    #[test]
    fn test_short_set_yields_no_candidate() {
        let set = LandmarkSet {
            points: vec![(0.5, 0.5), (0.6, 0.5)],
        };
        assert!(set.to_candidate(&FIVE_POINT_TOPOLOGY, 640, 480).is_none());
        assert!(set.to_candidate(&FACE_MESH_TOPOLOGY, 640, 480).is_none());
    }

    #[test]
    fn test_face_mesh_topology_indices() {
        // A 468-point set with recognizable coordinates at the consumed indices.
        let mut points = vec![(0.0, 0.0); 468];
        points[4] = (0.5, 0.55);
        points[133] = (0.45, 0.5);
        points[362] = (0.55, 0.5);
        let set = LandmarkSet { points };

        let candidate = set.to_candidate(&FACE_MESH_TOPOLOGY, 1000, 1000).unwrap();
        assert!((candidate.nose.x - 500.0).abs() < 1e-3);
        assert!((candidate.left_eye.x - 450.0).abs() < 1e-3);
        assert!((candidate.right_eye.x - 550.0).abs() < 1e-3);
    }

    #[test]
    fn test_eye_distance() {
        let candidate = FaceCandidate {
            nose: PixelPoint::new(0.0, 0.0),
            left_eye: PixelPoint::new(100.0, 100.0),
            right_eye: PixelPoint::new(160.0, 180.0),
        };
        assert!((candidate.eye_distance() - 100.0).abs() < 1e-4);
    }
}
