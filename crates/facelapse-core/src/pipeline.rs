//! Pipeline orchestration — one detection pass, then the scan and align
//! phases consuming the cached per-frame selections.

use crate::anchor::{self, ReferenceAnchor};
use crate::compositor;
use crate::landmarks::{FaceCandidate, LandmarkSet, LandmarkTopology};
use crate::selector;
use crate::transform::{self, TransformError};
use image::RgbImage;
use thiserror::Error;

/// Boxed error for pluggable source / detector / sink implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One decoded frame at the sequence-wide resolution, with its ordinal
/// position in the chronological sequence.
pub struct Frame {
    pub image: RgbImage,
    pub index: usize,
}

/// Ordered, chronologically sorted frame access.
///
/// Frames may be requested more than once (the pipeline makes two passes);
/// implementations decide whether to cache or reload. Every frame must
/// already be resized to the sequence resolution.
pub trait FrameSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn frame(&mut self, index: usize) -> Result<Frame, BoxError>;
}

/// Face landmark detection: zero or more normalized landmark sets per frame.
pub trait LandmarkDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<LandmarkSet>, BoxError>;
}

/// Ordered video output. Frames arrive at the fixed sequence resolution,
/// strictly in frame order, from a single writer.
pub trait VideoSink {
    fn append_frame(&mut self, image: &RgbImage) -> Result<(), BoxError>;

    /// Flush and close the container. Called exactly once, after the last
    /// frame.
    fn finalize(&mut self) -> Result<(), BoxError>;
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("frame source is empty")]
    EmptySequence,
    #[error("no frame in the sequence produced a selectable face; cannot derive a reference anchor")]
    NoFaceInSequence,
    #[error("frame {frame}: {source}")]
    Transform {
        frame: usize,
        source: TransformError,
    },
    #[error("frame source failed at frame {frame}: {source}")]
    Source { frame: usize, source: BoxError },
    #[error("detector failed at frame {frame}: {source}")]
    Detector { frame: usize, source: BoxError },
    #[error("video sink: {0}")]
    Sink(#[source] BoxError),
}

/// Final report of a completed run.
#[derive(Debug)]
pub struct PipelineReport {
    pub frames_total: usize,
    pub frames_written: usize,
    /// Frames excluded from the output because no subject face was selected.
    pub frames_skipped: usize,
    pub anchor: ReferenceAnchor,
}

/// Two-phase alignment pipeline.
pub struct Pipeline<D> {
    detector: D,
    topology: LandmarkTopology,
}

impl<D: LandmarkDetector> Pipeline<D> {
    pub fn new(detector: D, topology: LandmarkTopology) -> Self {
        Self { detector, topology }
    }

    /// Run the pipeline over the whole sequence.
    ///
    /// Detection runs once per frame and the resulting selection is cached
    /// by frame position, so the scan and align phases consume identical
    /// results even when the detector is not deterministic across calls.
    /// The scan phase folds the cached selections into the reference
    /// anchor; the align phase warps each frame with a selected face and
    /// appends it to the sink in order, counting the rest as skipped.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<PipelineReport, PipelineError>
    where
        S: FrameSource + ?Sized,
        K: VideoSink + ?Sized,
    {
        let frames_total = source.len();
        if frames_total == 0 {
            return Err(PipelineError::EmptySequence);
        }

        // Detection pass: one detector call per frame, cached by position.
        let mut selections: Vec<Option<FaceCandidate>> = Vec::with_capacity(frames_total);
        for index in 0..frames_total {
            let frame = source
                .frame(index)
                .map_err(|source| PipelineError::Source { frame: index, source })?;
            let sets = self
                .detector
                .detect(&frame.image)
                .map_err(|source| PipelineError::Detector { frame: index, source })?;

            let selected = selector::select_face(
                &sets,
                &self.topology,
                frame.image.width(),
                frame.image.height(),
            );
            match &selected {
                Some(face) => tracing::debug!(
                    frame = index,
                    faces = sets.len(),
                    eye_distance = face.eye_distance(),
                    "subject face selected"
                ),
                None => tracing::debug!(frame = index, faces = sets.len(), "no subject face"),
            }
            selections.push(selected);
        }

        // Phase SCAN: fold the selections into the reference anchor.
        let anchor = anchor::reference_anchor(selections.iter().map(Option::as_ref))
            .ok_or(PipelineError::NoFaceInSequence)?;
        tracing::info!(
            min_eye_distance = anchor.min_eye_distance,
            left_eye_x = anchor.left_eye.x,
            left_eye_y = anchor.left_eye.y,
            "reference anchor computed"
        );

        // Phase ALIGN: warp and emit in order; frames without a selection
        // are counted, never treated as errors.
        let mut frames_written = 0usize;
        let mut frames_skipped = 0usize;
        for (index, selected) in selections.iter().enumerate() {
            let Some(face) = selected else {
                frames_skipped += 1;
                tracing::debug!(frame = index, "skipped: no subject face");
                continue;
            };

            let frame = source
                .frame(index)
                .map_err(|source| PipelineError::Source { frame: index, source })?;
            let correction = transform::build_transform(face, &anchor)
                .map_err(|source| PipelineError::Transform { frame: index, source })?;
            let aligned = compositor::align_frame(&frame.image, &correction);

            sink.append_frame(&aligned).map_err(PipelineError::Sink)?;
            frames_written += 1;
        }

        sink.finalize().map_err(PipelineError::Sink)?;
        tracing::info!(frames_written, frames_skipped, "alignment complete");

        Ok(PipelineReport {
            frames_total,
            frames_written,
            frames_skipped,
            anchor,
        })
    }
}
