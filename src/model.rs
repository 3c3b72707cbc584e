//! Value types shared by every pipeline stage.
//!
//! Everything here is plain data: stages take these by reference and hand back
//! fresh values. Field names serialize in camelCase so the output matches what
//! the dashboard's reporting views already consume.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One GPS fix from a recorded route log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Timestamp exactly as written in the track file, if any.
    pub recorded_at: Option<String>,
    /// Speed as recorded (m/s for standard GPX extensions).
    pub speed: Option<f64>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            recorded_at: None,
            speed: None,
        }
    }
}

/// Region of a frame. Units follow the annotation payload (percentages for
/// Label Studio exports).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Qualitative asset health tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    Good,
    Fair,
    Poor,
}

/// One identified asset instance on a specific frame.
///
/// `latitude`/`longitude` stay `None` until the linker assigns a track point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub id: String,
    pub class_name: String,
    pub condition: Condition,
    pub confidence: f64,
    pub frame_index: u32,
    pub timestamp_seconds: f64,
    pub bounding_box: BoundingBox,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Detection {
    pub fn is_located(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Per-condition counters. All three buckets always exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCounts {
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

impl ConditionCounts {
    pub fn increment(&mut self, condition: Condition) {
        match condition {
            Condition::Good => self.good += 1,
            Condition::Fair => self.fair += 1,
            Condition::Poor => self.poor += 1,
        }
    }

    pub fn get(&self, condition: Condition) -> usize {
        match condition {
            Condition::Good => self.good,
            Condition::Fair => self.fair,
            Condition::Poor => self.poor,
        }
    }

    pub fn total(&self) -> usize {
        self.good + self.fair + self.poor
    }
}

/// Per-class totals. Serializes flat as `{count, good, fair, poor}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBreakdown {
    pub count: usize,
    #[serde(flatten)]
    pub conditions: ConditionCounts,
}

impl ClassBreakdown {
    pub fn increment(&mut self, condition: Condition) {
        self.count += 1;
        self.conditions.increment(condition);
    }
}

/// Descriptive counts over a set of detections.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_condition: ConditionCounts,
    pub by_class: BTreeMap<String, ClassBreakdown>,
}
