//! Annotation export parsing and detection extraction.
//!
//! Input is a Label Studio style export: a list of tasks, each pointing at a
//! source video and carrying one or more annotations. An annotation's `result`
//! is a flat list of records; `videorectangle` records hold a keyframe
//! sequence plus class labels, `choices` records hold condition tags. Records
//! sharing an `id` describe the same tracked object.
//!
//! Extraction flattens that into one `Detection` per keyframe per label for a
//! single video. Bad records are skipped, never fatal.

mod confidence;

pub use confidence::{ConfidenceSource, RandomConfidence, MAX_CONFIDENCE, MIN_CONFIDENCE};

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::model::{BoundingBox, Condition, Detection};
use crate::source::SourceLocation;

/// Frame rate assumed when a keyframe has no explicit time.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

const BOX_RECORD: &str = "videorectangle";
const CHOICE_RECORD: &str = "choices";

/// One task from an annotation export.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationTask {
    #[serde(default)]
    pub id: Option<TaskId>,
    #[serde(default)]
    pub data: TaskData,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl AnnotationTask {
    /// Video key of the task's source video, if it names one.
    pub fn video_key(&self) -> Option<String> {
        self.data.video.as_deref().and_then(video_key_from_path)
    }
}

/// Task identifiers are integers in Label Studio but strings in some exports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Number(n) => write!(f, "{}", n),
            TaskId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskData {
    #[serde(default, alias = "video_url")]
    pub video: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Annotation {
    /// Kept untyped so one malformed record does not reject the whole task.
    #[serde(default)]
    pub result: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResultRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: ResultValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResultValue {
    /// Untyped so a malformed keyframe drops only itself.
    #[serde(default)]
    sequence: Vec<serde_json::Value>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    choices: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Keyframe {
    #[serde(default)]
    frame: Option<u32>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    time: Option<f64>,
}

fn enabled_by_default() -> bool {
    true
}

/// Records of one annotation that share an id.
#[derive(Default)]
struct RecordGroup {
    region_id: String,
    boxes: Vec<ResultRecord>,
    choices: Vec<String>,
}

fn upload_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{8}-").unwrap())
}

/// Derive the video key from a task's source video path.
///
/// `/data/upload/3/1a2b3c4d-survey_0412.mp4?d=1` becomes `survey_0412`: last
/// path segment, without query, extension, or the upload hash prefix Label
/// Studio adds to imported files.
pub fn video_key_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let key = upload_prefix_re().replace(stem, "");
    if key.is_empty() {
        None
    } else {
        Some(key.into_owned())
    }
}

/// Map one condition tag such as `Guardrail-AssetCondition-Fair` to a condition.
///
/// Only the last hyphen-delimited segment is considered; matching is
/// case-sensitive.
pub fn condition_from_tag(tag: &str) -> Option<Condition> {
    match tag.rsplit('-').next()? {
        "Good" => Some(Condition::Good),
        "Fair" => Some(Condition::Fair),
        "Poor" | "Damaged" | "Missing" => Some(Condition::Poor),
        _ => None,
    }
}

/// First recognised tag wins; no recognised tag means `Good`.
pub fn resolve_condition<'a, I>(tags: I) -> Condition
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter()
        .find_map(condition_from_tag)
        .unwrap_or_default()
}

/// Parse an annotation export. Accepts a task array or a single task object.
///
/// Malformed JSON yields no tasks; a malformed task is skipped on its own.
pub fn parse_tasks(text: &str) -> Vec<AnnotationTask> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("annotations: invalid json ({}); no tasks loaded", err);
            return Vec::new();
        }
    };
    let items = match value {
        serde_json::Value::Array(items) => items,
        object @ serde_json::Value::Object(_) => vec![object],
        _ => {
            log::warn!("annotations: expected a task array or object");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(task) => Some(task),
            Err(err) => {
                log::debug!("annotations: skipping malformed task #{}: {}", index, err);
                None
            }
        })
        .collect()
}

/// Fetch and parse an annotation export. Any failure yields no tasks.
pub fn load_annotations(location: &SourceLocation) -> Vec<AnnotationTask> {
    match location.fetch_text() {
        Ok(text) => {
            let tasks = parse_tasks(&text);
            log::info!("annotations: {} tasks from {}", tasks.len(), location);
            tasks
        }
        Err(err) => {
            log::warn!("annotations: unavailable ({:#})", err);
            Vec::new()
        }
    }
}

/// Flattens annotation tasks into detections for one video.
#[derive(Clone, Copy, Debug)]
pub struct DetectionExtractor {
    frame_rate: f64,
}

impl Default for DetectionExtractor {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl DetectionExtractor {
    /// Non-positive or non-finite frame rates fall back to the default.
    pub fn new(frame_rate: f64) -> Self {
        if frame_rate.is_finite() && frame_rate > 0.0 {
            Self { frame_rate }
        } else {
            Self::default()
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Extract detections for tasks whose video key equals `video_key` exactly.
    /// Every detection is tagged with `category`.
    pub fn extract(
        &self,
        tasks: &[AnnotationTask],
        category: &str,
        video_key: &str,
        confidence: &mut dyn ConfidenceSource,
    ) -> Vec<Detection> {
        let mut detections = Vec::new();

        for (task_index, task) in tasks.iter().enumerate() {
            if task.video_key().as_deref() != Some(video_key) {
                continue;
            }
            let task_id = task
                .id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| task_index.to_string());

            for annotation in &task.annotations {
                for group in group_records(&annotation.result) {
                    let condition = resolve_condition(group.choices.iter().map(String::as_str));
                    for record in &group.boxes {
                        self.emit_keyframes(
                            &task_id,
                            &group.region_id,
                            record,
                            condition,
                            category,
                            confidence,
                            &mut detections,
                        );
                    }
                }
            }
        }

        log::debug!(
            "annotations: {} detections for video {}",
            detections.len(),
            video_key
        );
        detections
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_keyframes(
        &self,
        task_id: &str,
        region_id: &str,
        record: &ResultRecord,
        condition: Condition,
        category: &str,
        confidence: &mut dyn ConfidenceSource,
        out: &mut Vec<Detection>,
    ) {
        let sequence = &record.value.sequence;
        // A lone keyframe is kept even when disabled.
        let skip_disabled = sequence.len() > 1;

        for raw in sequence {
            let keyframe = match Keyframe::deserialize(raw) {
                Ok(keyframe) => keyframe,
                Err(err) => {
                    log::debug!(
                        "annotations: skipping malformed keyframe in region {}: {}",
                        region_id,
                        err
                    );
                    continue;
                }
            };
            if skip_disabled && !keyframe.enabled {
                continue;
            }
            let Some((frame_index, timestamp_seconds)) = self.frame_and_time(&keyframe) else {
                log::debug!("annotations: keyframe in region {} has no frame or time", region_id);
                continue;
            };
            let bounding_box = BoundingBox {
                x: keyframe.x,
                y: keyframe.y,
                width: keyframe.width,
                height: keyframe.height,
            };
            for (label_index, label) in record.value.labels.iter().enumerate() {
                out.push(Detection {
                    id: format!("{}:{}:{}:{}", task_id, region_id, frame_index, label_index),
                    class_name: label.clone(),
                    condition,
                    confidence: confidence.next_confidence(),
                    frame_index,
                    timestamp_seconds,
                    bounding_box,
                    category: category.to_string(),
                    latitude: None,
                    longitude: None,
                });
            }
        }
    }

    fn frame_and_time(&self, keyframe: &Keyframe) -> Option<(u32, f64)> {
        let time = keyframe.time.filter(|t| t.is_finite());
        match (keyframe.frame, time) {
            (Some(frame), Some(time)) => Some((frame, time.max(0.0))),
            (Some(frame), None) => Some((frame, frame as f64 / self.frame_rate)),
            (None, Some(time)) => {
                let time = time.max(0.0);
                Some(((time * self.frame_rate).round() as u32, time))
            }
            (None, None) => None,
        }
    }
}

/// Extract with the default frame rate.
pub fn extract_detections(
    tasks: &[AnnotationTask],
    category: &str,
    video_key: &str,
    confidence: &mut dyn ConfidenceSource,
) -> Vec<Detection> {
    DetectionExtractor::default().extract(tasks, category, video_key, confidence)
}

/// Group result records by id, in order of first appearance. Records without
/// an id stand alone. Groups without a bounding box are dropped.
fn group_records(records: &[serde_json::Value]) -> Vec<RecordGroup> {
    let mut groups: Vec<RecordGroup> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for raw in records {
        let record = match ResultRecord::deserialize(raw) {
            Ok(record) => record,
            Err(err) => {
                log::debug!("annotations: skipping malformed result record: {}", err);
                continue;
            }
        };

        let slot = match record.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => *by_id.entry(id.to_string()).or_insert_with(|| {
                groups.push(RecordGroup {
                    region_id: id.to_string(),
                    ..RecordGroup::default()
                });
                groups.len() - 1
            }),
            None => {
                groups.push(RecordGroup {
                    region_id: format!("_{}", groups.len()),
                    ..RecordGroup::default()
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[slot];
        if record.kind == BOX_RECORD {
            group.boxes.push(record);
        } else if record.kind == CHOICE_RECORD {
            group.choices.extend(record.value.choices);
        }
    }

    groups.retain(|group| !group.boxes.is_empty());
    groups
}
