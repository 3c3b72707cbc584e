//! Road-asset survey linking
//!
//! This crate places annotated road assets on the map. It joins two inputs
//! recorded over the same drive:
//!
//! 1. **Track**: a GPX route log, one `trkpt` per GPS fix.
//! 2. **Annotations**: a Label Studio style export of bounding boxes tracked
//!    across the survey video, each tagged with a class and a condition.
//!
//! Every keyframe becomes a `Detection`, which is assigned the track point at
//! the same proportional position through the video, then counted into a
//! `Summary` for reporting.
//!
//! # Failure model
//!
//! Nothing in the pipeline is fatal. An unreadable track or annotation file is
//! an empty input, a malformed record is skipped, and a zero video duration
//! maps every detection to the first track point. Only configuration loading
//! returns errors.
//!
//! # Module Structure
//!
//! - `model`: value types (TrackPoint, Detection, Summary)
//! - `track`: GPX parsing and track loading
//! - `annotations`: annotation export parsing and detection extraction
//! - `link`: proportional track-index assignment
//! - `summary`: count aggregation
//! - `pipeline`: per-video runs combining the above
//! - `source`: local path / HTTP payload access
//! - `frame_cache`: bounded LRU cache for video frames
//! - `config`: file + environment configuration

pub mod annotations;
pub mod config;
pub mod frame_cache;
pub mod link;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod summary;
pub mod track;

pub use annotations::{
    extract_detections, load_annotations, parse_tasks, resolve_condition, video_key_from_path,
    AnnotationTask, ConfidenceSource, DetectionExtractor, RandomConfidence,
};
pub use config::SurveyConfig;
pub use frame_cache::{FrameCache, FrameKey};
pub use link::{link_detections, track_index_for};
pub use model::{BoundingBox, ClassBreakdown, Condition, ConditionCounts, Detection, Summary, TrackPoint};
pub use pipeline::{SurveyPipeline, SurveyRun};
pub use source::SourceLocation;
pub use summary::summarize;
pub use track::{load_track, parse_track, track_location};
