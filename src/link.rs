//! Detection geolocation.
//!
//! Each detection takes the coordinates of the track point at the same
//! proportional position through the recording:
//! `index = floor(t / duration * n)`, clamped to `[0, n - 1]`.
//! There is no interpolation between points; every assigned coordinate is a
//! recorded fix.

use crate::model::{Detection, TrackPoint};

/// Index of the track point for a detection at `timestamp_seconds`.
///
/// Returns `None` only for an empty track. A non-positive or non-finite
/// duration maps everything to the first point.
pub fn track_index_for(timestamp_seconds: f64, video_duration_s: f64, track_len: usize) -> Option<usize> {
    if track_len == 0 {
        return None;
    }
    let progress = if video_duration_s.is_finite() && video_duration_s > 0.0 {
        timestamp_seconds / video_duration_s
    } else {
        0.0
    };
    let scaled = (progress * track_len as f64).floor();
    let last = track_len - 1;
    let index = if scaled.is_nan() || scaled <= 0.0 {
        0
    } else if scaled >= last as f64 {
        last
    } else {
        scaled as usize
    };
    Some(index)
}

/// Assign coordinates to every detection. With an empty track the detections
/// come back unchanged.
pub fn link_detections(
    detections: Vec<Detection>,
    track: &[TrackPoint],
    video_duration_s: f64,
) -> Vec<Detection> {
    if track.is_empty() {
        log::debug!("link: no track points; {} detections left unlocated", detections.len());
        return detections;
    }

    detections
        .into_iter()
        .map(|mut detection| {
            if let Some(index) =
                track_index_for(detection.timestamp_seconds, video_duration_s, track.len())
            {
                let point = &track[index];
                detection.latitude = Some(point.latitude);
                detection.longitude = Some(point.longitude);
            }
            detection
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Condition};

    fn detection_at(t: f64) -> Detection {
        Detection {
            id: format!("d@{}", t),
            class_name: "Sign".to_string(),
            condition: Condition::Good,
            confidence: 0.9,
            frame_index: (t * 30.0) as u32,
            timestamp_seconds: t,
            bounding_box: BoundingBox::default(),
            category: "signage".to_string(),
            latitude: None,
            longitude: None,
        }
    }

    fn track(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(-33.0 - i as f64 * 0.001, 151.0 + i as f64 * 0.001))
            .collect()
    }

    #[test]
    fn midpoint_maps_to_proportional_index() {
        let track = track(10);
        let linked = link_detections(vec![detection_at(50.0)], &track, 100.0);
        assert_eq!(linked[0].latitude, Some(track[5].latitude));
        assert_eq!(linked[0].longitude, Some(track[5].longitude));
    }

    #[test]
    fn start_and_overrun_clamp_to_ends() {
        let track = track(10);
        let linked = link_detections(
            vec![detection_at(0.0), detection_at(-3.0), detection_at(100.0), detection_at(250.0)],
            &track,
            100.0,
        );
        assert_eq!(linked[0].latitude, Some(track[0].latitude));
        assert_eq!(linked[1].latitude, Some(track[0].latitude));
        assert_eq!(linked[2].latitude, Some(track[9].latitude));
        assert_eq!(linked[3].latitude, Some(track[9].latitude));
    }

    #[test]
    fn empty_track_leaves_detections_unlocated() {
        let linked = link_detections(vec![detection_at(10.0)], &[], 100.0);
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].latitude, None);
        assert_eq!(linked[0].longitude, None);
    }

    #[test]
    fn zero_duration_uses_first_point() {
        assert_eq!(track_index_for(42.0, 0.0, 5), Some(0));
        assert_eq!(track_index_for(42.0, f64::NAN, 5), Some(0));
        assert_eq!(track_index_for(f64::NAN, 10.0, 5), Some(0));
        assert_eq!(track_index_for(1.0, 10.0, 0), None);
    }

    #[test]
    fn assigned_coordinates_always_come_from_track() {
        let track = track(7);
        let detections: Vec<Detection> = (0..40).map(|i| detection_at(i as f64 * 0.37)).collect();
        for linked in link_detections(detections, &track, 12.0) {
            assert!(track.iter().any(|p| Some(p.latitude) == linked.latitude
                && Some(p.longitude) == linked.longitude));
        }
    }
}
