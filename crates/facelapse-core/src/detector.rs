//! SCRFD face landmarker via ONNX Runtime.
//!
//! Runs the anchor-free SCRFD detection model and decodes its per-stride
//! outputs into five-point landmark sets, normalized to the frame so the
//! rest of the pipeline stays resolution-agnostic. Pair with
//! [`FIVE_POINT_TOPOLOGY`](crate::landmarks::FIVE_POINT_TOPOLOGY).

use crate::landmarks::LandmarkSet;
use crate::pipeline::{BoxError, LandmarkDetector};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: u32 = 640;
const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;
const LANDMARK_POINTS: usize = 5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download an SCRFD detection model and point --model at it")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Letterbox geometry used to map detections back to frame coordinates.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// One decoded face before normalization: box for NMS plus landmark pixels
/// in frame coordinates.
#[derive(Debug, Clone)]
struct RawFace {
    bbox: [f32; 4], // x1, y1, x2, y2
    score: f32,
    points: [(f32, f32); LANDMARK_POINTS],
}

/// SCRFD-based face landmarker.
pub struct FaceLandmarker {
    session: Session,
    output_names: Vec<String>,
}

impl FaceLandmarker {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides x score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        Ok(Self {
            session,
            output_names,
        })
    }

    /// Detect faces in an RGB frame, returning normalized five-point
    /// landmark sets in confidence-descending order.
    pub fn landmarks(&mut self, image: &RgbImage) -> Result<Vec<LandmarkSet>, DetectorError> {
        let (width, height) = image.dimensions();
        let (input, letterbox) = preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut faces = Vec::new();
        for (position, &stride) in STRIDES.iter().enumerate() {
            let extract = |idx: usize, what: &str| -> Result<Vec<f32>, DetectorError> {
                let (_, data) = outputs[idx].try_extract_tensor::<f32>().map_err(|e| {
                    DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}"))
                })?;
                Ok(data.to_vec())
            };

            let scores = extract(output_index(&self.output_names, "score", stride, position), "scores")?;
            let bboxes = extract(output_index(&self.output_names, "bbox", stride, 3 + position), "bboxes")?;
            let kps = extract(output_index(&self.output_names, "kps", stride, 6 + position), "kps")?;

            faces.extend(decode_stride(&scores, &bboxes, &kps, stride, &letterbox));
        }

        let mut kept = nms(faces, NMS_IOU_THRESHOLD);
        kept.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(kept
            .into_iter()
            .map(|face| normalize_landmarks(&face, width, height))
            .collect())
    }
}

impl LandmarkDetector for FaceLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<LandmarkSet>, BoxError> {
        Ok(self.landmarks(image)?)
    }
}

/// Resolve an output tensor index by name.
///
/// SCRFD exports either name their tensors ("score_8", "bbox_16", "kps_32")
/// or carry generic numeric names; fall back to the conventional positional
/// layout ([0-2]=scores, [3-5]=bboxes, [6-8]=kps) when the name is absent.
fn output_index(names: &[String], prefix: &str, stride: usize, fallback: usize) -> usize {
    let target = format!("{prefix}_{stride}");
    names.iter().position(|n| n == &target).unwrap_or(fallback)
}

/// Letterbox an RGB frame into the 640x640 NCHW float input.
///
/// SCRFD expects BGR channel order normalized with mean 127.5 / std 128;
/// the padding value normalizes to 0.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    let pad_x = (INPUT_SIZE - new_w.min(INPUT_SIZE)) / 2;
    let pad_y = (INPUT_SIZE - new_h.min(INPUT_SIZE)) / 2;

    let resized = image::imageops::resize(image, new_w, new_h, image::imageops::FilterType::Triangle);

    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + pad_x) as usize;
        let ty = (y + pad_y) as usize;
        // RGB -> BGR
        tensor[[0, 0, ty, tx]] = (pixel[2] as f32 - INPUT_MEAN) / INPUT_STD;
        tensor[[0, 1, ty, tx]] = (pixel[1] as f32 - INPUT_MEAN) / INPUT_STD;
        tensor[[0, 2, ty, tx]] = (pixel[0] as f32 - INPUT_MEAN) / INPUT_STD;
    }

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    };
    (tensor, letterbox)
}

/// Decode one stride level into faces in frame coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
) -> Vec<RawFace> {
    let grid = INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * ANCHORS_PER_CELL;

    let unmap = |x: f32, y: f32| -> (f32, f32) {
        (
            (x - letterbox.pad_x) / letterbox.scale,
            (y - letterbox.pad_y) / letterbox.scale,
        )
    };

    let mut faces = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = ((cell % grid) * stride) as f32;
        let anchor_cy = ((cell / grid) * stride) as f32;

        let b = idx * 4;
        if b + 3 >= bboxes.len() {
            continue;
        }
        let (x1, y1) = unmap(
            anchor_cx - bboxes[b] * stride as f32,
            anchor_cy - bboxes[b + 1] * stride as f32,
        );
        let (x2, y2) = unmap(
            anchor_cx + bboxes[b + 2] * stride as f32,
            anchor_cy + bboxes[b + 3] * stride as f32,
        );

        let k = idx * 2 * LANDMARK_POINTS;
        if k + 2 * LANDMARK_POINTS > kps.len() {
            continue;
        }
        let mut points = [(0.0f32, 0.0f32); LANDMARK_POINTS];
        for (i, point) in points.iter_mut().enumerate() {
            *point = unmap(
                anchor_cx + kps[k + i * 2] * stride as f32,
                anchor_cy + kps[k + i * 2 + 1] * stride as f32,
            );
        }

        faces.push(RawFace {
            bbox: [x1, y1, x2, y2],
            score,
            points,
        });
    }

    faces
}

/// Normalize a face's landmarks to [0, 1] against the frame resolution.
fn normalize_landmarks(face: &RawFace, width: u32, height: u32) -> LandmarkSet {
    LandmarkSet {
        points: face
            .points
            .iter()
            .map(|&(x, y)| {
                (
                    (x / width as f32).clamp(0.0, 1.0),
                    (y / height as f32).clamp(0.0, 1.0),
                )
            })
            .collect(),
    }
}

/// Non-maximum suppression over decoded faces.
fn nms(mut faces: Vec<RawFace>, iou_threshold: f32) -> Vec<RawFace> {
    faces.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawFace> = Vec::new();
    for face in faces {
        if keep.iter().all(|k| iou(&k.bbox, &face.bbox) <= iou_threshold) {
            keep.push(face);
        }
    }
    keep
}

/// Intersection-over-union of two corner-form boxes.
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
