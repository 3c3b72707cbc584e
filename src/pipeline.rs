//! One linking run per video.
//!
//! A run loads the video's track (best-effort), extracts its detections from
//! the annotation tasks, links them to the track and summarises the result.
//! Runs share nothing mutable; callers may execute several at once.

use serde::Serialize;

use crate::annotations::{AnnotationTask, DetectionExtractor, RandomConfidence};
use crate::config::SurveyConfig;
use crate::frame_cache::{frame_location, FrameCache, FrameKey};
use crate::link::link_detections;
use crate::model::{Detection, Summary, TrackPoint};
use crate::summary::summarize;
use crate::track::{load_track, track_location};

/// Result of one run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRun {
    pub video_key: String,
    pub video_duration_s: f64,
    pub track_points: usize,
    pub detections: Vec<Detection>,
    pub summary: Summary,
}

impl SurveyRun {
    pub fn located_count(&self) -> usize {
        self.detections.iter().filter(|d| d.is_located()).count()
    }
}

pub struct SurveyPipeline {
    config: SurveyConfig,
    extractor: DetectionExtractor,
}

impl SurveyPipeline {
    pub fn new(config: SurveyConfig) -> Self {
        let extractor = DetectionExtractor::new(config.video.frame_rate);
        Self { config, extractor }
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    /// Run for `video_key`, loading its track from the configured directory.
    pub fn run(&self, video_key: &str, tasks: &[AnnotationTask]) -> SurveyRun {
        let track = load_track(&track_location(&self.config.track_dir, video_key));
        self.run_with_track(video_key, tasks, &track)
    }

    /// Run against an already loaded track.
    pub fn run_with_track(
        &self,
        video_key: &str,
        tasks: &[AnnotationTask],
        track: &[TrackPoint],
    ) -> SurveyRun {
        let mut confidence = RandomConfidence::new(self.config.confidence_seed);
        let detections =
            self.extractor
                .extract(tasks, &self.config.category, video_key, &mut confidence);
        let video_duration_s = self.config.video.duration_for(video_key);
        let detections = link_detections(detections, track, video_duration_s);
        let summary = summarize(&detections);

        let run = SurveyRun {
            video_key: video_key.to_string(),
            video_duration_s,
            track_points: track.len(),
            detections,
            summary,
        };
        log::info!(
            "pipeline: video {}: {} detections, {} located, {} track points",
            run.video_key,
            run.detections.len(),
            run.located_count(),
            run.track_points
        );
        run
    }

    /// Load the frame of every detection in `run` through `cache`.
    ///
    /// Returns how many distinct frames are available. Missing frames are
    /// logged and skipped. Does nothing when no frame directory is configured.
    pub fn prefetch_frames(&self, run: &SurveyRun, cache: &mut FrameCache) -> usize {
        let Some(frame_dir) = &self.config.frames.dir else {
            return 0;
        };
        let mut keys: Vec<FrameKey> = run
            .detections
            .iter()
            .map(|d| FrameKey::new(run.video_key.as_str(), d.frame_index))
            .collect();
        keys.sort_by_key(|k| k.frame_index);
        keys.dedup();

        let mut available = 0;
        for key in &keys {
            let location = frame_location(frame_dir, key);
            match cache.get_or_fetch(key, || location.fetch_bytes()) {
                Ok(_) => available += 1,
                Err(err) => log::warn!("frames: {} unavailable ({:#})", location, err),
            }
        }
        available
    }
}
