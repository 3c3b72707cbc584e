use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::annotations::DEFAULT_FRAME_RATE;
use crate::frame_cache::{DEFAULT_MAX_BYTES, DEFAULT_MAX_ENTRIES};
use crate::source::SourceLocation;

const DEFAULT_ANNOTATIONS: &str = "annotations.json";
const DEFAULT_TRACK_DIR: &str = "gpx";
const DEFAULT_CATEGORY: &str = "road-asset";
const DEFAULT_VIDEO_DURATION_S: f64 = 60.0;

#[derive(Debug, Deserialize, Default)]
struct SurveyConfigFile {
    annotations: Option<String>,
    track_dir: Option<String>,
    category: Option<String>,
    confidence_seed: Option<u64>,
    video: Option<VideoConfigFile>,
    frames: Option<FrameConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    default_duration_s: Option<f64>,
    frame_rate: Option<f64>,
    durations: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize, Default)]
struct FrameConfigFile {
    dir: Option<String>,
    max_entries: Option<usize>,
    max_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// Annotation export (path or URL).
    pub annotations: SourceLocation,
    /// Directory holding `<video_key>.gpx` tracks (path or URL).
    pub track_dir: SourceLocation,
    /// Category attached to every extracted detection.
    pub category: String,
    /// Seed for placeholder confidences; unseeded when `None`.
    pub confidence_seed: Option<u64>,
    pub video: VideoSettings,
    pub frames: FrameSettings,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub default_duration_s: f64,
    pub frame_rate: f64,
    /// Per-video nominal durations, keyed by video key.
    pub durations: BTreeMap<String, f64>,
}

impl VideoSettings {
    pub fn duration_for(&self, video_key: &str) -> f64 {
        self.durations
            .get(video_key)
            .copied()
            .unwrap_or(self.default_duration_s)
    }
}

#[derive(Debug, Clone)]
pub struct FrameSettings {
    /// Root of extracted frames; frame prefetch is off when `None`.
    pub dir: Option<SourceLocation>,
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            annotations: SourceLocation::File(PathBuf::from(DEFAULT_ANNOTATIONS)),
            track_dir: SourceLocation::File(PathBuf::from(DEFAULT_TRACK_DIR)),
            category: DEFAULT_CATEGORY.to_string(),
            confidence_seed: None,
            video: VideoSettings {
                default_duration_s: DEFAULT_VIDEO_DURATION_S,
                frame_rate: DEFAULT_FRAME_RATE,
                durations: BTreeMap::new(),
            },
            frames: FrameSettings {
                dir: None,
                max_entries: DEFAULT_MAX_ENTRIES,
                max_bytes: DEFAULT_MAX_BYTES,
            },
        }
    }
}

impl SurveyConfig {
    /// Load from `SURVEY_CONFIG` (if set), then apply `SURVEY_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SURVEY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SurveyConfigFile) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(annotations) = file.annotations {
            cfg.annotations = SourceLocation::parse(&annotations)?;
        }
        if let Some(track_dir) = file.track_dir {
            cfg.track_dir = SourceLocation::parse(&track_dir)?;
        }
        if let Some(category) = file.category {
            cfg.category = category;
        }
        cfg.confidence_seed = file.confidence_seed;

        if let Some(video) = file.video {
            if let Some(duration) = video.default_duration_s {
                cfg.video.default_duration_s = duration;
            }
            if let Some(frame_rate) = video.frame_rate {
                cfg.video.frame_rate = frame_rate;
            }
            if let Some(durations) = video.durations {
                cfg.video.durations = durations;
            }
        }

        if let Some(frames) = file.frames {
            cfg.frames.dir = frames
                .dir
                .as_deref()
                .map(SourceLocation::parse)
                .transpose()?;
            if let Some(max_entries) = frames.max_entries {
                cfg.frames.max_entries = max_entries;
            }
            if let Some(max_bytes) = frames.max_bytes {
                cfg.frames.max_bytes = max_bytes;
            }
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(annotations) = non_empty_env("SURVEY_ANNOTATIONS") {
            self.annotations = SourceLocation::parse(&annotations)?;
        }
        if let Some(track_dir) = non_empty_env("SURVEY_TRACK_DIR") {
            self.track_dir = SourceLocation::parse(&track_dir)?;
        }
        if let Some(category) = non_empty_env("SURVEY_CATEGORY") {
            self.category = category;
        }
        if let Some(frame_dir) = non_empty_env("SURVEY_FRAME_DIR") {
            self.frames.dir = Some(SourceLocation::parse(&frame_dir)?);
        }
        if let Some(duration) = non_empty_env("SURVEY_VIDEO_DURATION_S") {
            self.video.default_duration_s = duration
                .trim()
                .parse()
                .map_err(|_| anyhow!("SURVEY_VIDEO_DURATION_S must be a number of seconds"))?;
        }
        if let Some(frame_rate) = non_empty_env("SURVEY_FRAME_RATE") {
            self.video.frame_rate = frame_rate
                .trim()
                .parse()
                .map_err(|_| anyhow!("SURVEY_FRAME_RATE must be a number of frames per second"))?;
        }
        if let Some(seed) = non_empty_env("SURVEY_CONFIDENCE_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("SURVEY_CONFIDENCE_SEED must be an unsigned integer"))?;
            self.confidence_seed = Some(seed);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.category = self.category.trim().to_string();
        if self.category.is_empty() {
            return Err(anyhow!("category must not be empty"));
        }
        if !self.video.frame_rate.is_finite() || self.video.frame_rate <= 0.0 {
            return Err(anyhow!("video frame rate must be greater than zero"));
        }
        check_duration("default video duration", self.video.default_duration_s)?;
        for (video_key, duration) in &self.video.durations {
            check_duration(&format!("duration for video {}", video_key), *duration)?;
        }
        if self.frames.max_entries == 0 || self.frames.max_bytes == 0 {
            return Err(anyhow!("frame cache bounds must be greater than zero"));
        }
        Ok(())
    }
}

fn check_duration(what: &str, seconds: f64) -> Result<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(anyhow!("{} must be a non-negative number of seconds", what));
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<SurveyConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
