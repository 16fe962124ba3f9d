//! facelapse-core — face-alignment engine for stabilized timelapses.
//!
//! Selects the subject face in every frame, derives a sequence-wide
//! reference anchor from the smallest inter-eye distance, and aligns each
//! frame to it with per-frame similarity corrections (scale, translation,
//! rotation).

pub mod anchor;
pub mod compositor;
pub mod detector;
pub mod landmarks;
pub mod pipeline;
pub mod selector;
pub mod transform;

pub use anchor::ReferenceAnchor;
pub use landmarks::{FaceCandidate, LandmarkSet, LandmarkTopology, PixelPoint};
pub use pipeline::{Frame, Pipeline, PipelineError, PipelineReport};
pub use transform::AlignTransform;
