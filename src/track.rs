//! GPX track parsing.
//!
//! Only `trkpt` elements are read, matched by local name so namespace-prefixed
//! documents work. Coordinates come from the `lat`/`lon` attributes; the
//! timestamp and speed may be either attributes or child elements (namespaced
//! extension elements such as `<gpxtpx:speed>` count).
//!
//! Parsing is lenient per record: a point with a missing, non-numeric or
//! out-of-range coordinate is skipped and the rest of the file is still read.
//! A document that is not well-formed XML is an empty track, as is an
//! unreadable file.

use roxmltree::{Document, Node, ParsingOptions};

use crate::model::TrackPoint;
use crate::source::SourceLocation;

/// Parse track points from GPX text, in document order.
pub fn parse_track(text: &str) -> Vec<TrackPoint> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let document = match Document::parse_with_options(text, options) {
        Ok(document) => document,
        Err(err) => {
            log::warn!("track: not a well-formed gpx document ({})", err);
            return Vec::new();
        }
    };

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for node in document
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "trkpt")
    {
        match parse_record(node) {
            Some(point) => points.push(point),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::debug!("track: skipped {} trkpt records with invalid coordinates", skipped);
    }
    points
}

fn parse_record(node: Node<'_, '_>) -> Option<TrackPoint> {
    let mut recorded_at = node
        .attribute("time")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let mut speed = node.attribute("speed").and_then(parse_speed);

    for child in node.descendants().filter(|child| child.is_element()) {
        let value = child.text().map(str::trim).unwrap_or("");
        match child.tag_name().name() {
            "time" if recorded_at.is_none() && !value.is_empty() => {
                recorded_at = Some(value.to_string())
            }
            "speed" if speed.is_none() => speed = parse_speed(value),
            _ => {}
        }
    }

    let latitude = parse_coordinate(node.attribute("lat")?, 90.0)?;
    let longitude = parse_coordinate(node.attribute("lon")?, 180.0)?;
    Some(TrackPoint {
        latitude,
        longitude,
        recorded_at,
        speed,
    })
}

fn parse_speed(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|s| s.is_finite())
}

fn parse_coordinate(raw: &str, limit: f64) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.abs() <= limit)
}

/// Location of the track recorded alongside a video: `<track_dir>/<video_key>.gpx`.
pub fn track_location(track_dir: &SourceLocation, video_key: &str) -> SourceLocation {
    track_dir.join(&format!("{}.gpx", video_key))
}

/// Fetch and parse a track. Any failure yields an empty track.
pub fn load_track(location: &SourceLocation) -> Vec<TrackPoint> {
    match location.fetch_text() {
        Ok(text) => {
            let points = parse_track(&text);
            log::info!("track: {} points from {}", points.len(), location);
            points
        }
        Err(err) => {
            log::warn!("track: unavailable ({:#}); continuing without gps", err);
            Vec::new()
        }
    }
}
