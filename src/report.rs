//! Dashboard summary of a replayed detection log.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::integration::{EventRecord, Replay, ReplayedFrame};
use crate::tracker::UniqueCounts;

pub const CRITICAL_STATUS: &str = "CRITICAL";
pub const SAFE_STATUS: &str = "SAFE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Most recent timeline points kept
    pub timeline_capacity: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timeline_capacity: 50,
        }
    }
}

/// Raw per-label detection statistics, duplicates across frames included.
///
/// Detections without a confidence score count towards `detections` but not
/// towards the mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelStats {
    pub detections: u64,
    pub mean_confidence: Option<f32>,
    #[serde(skip)]
    confidence: Mean,
}

impl LabelStats {
    fn add(&mut self, confidence: Option<f32>) {
        self.detections += 1;
        if let Some(confidence) = confidence {
            self.confidence.add(confidence);
            self.mean_confidence = self.confidence.value();
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn add(&mut self, value: f32) {
        self.sum += value as f64;
        self.count += 1;
    }

    fn value(&self) -> Option<f32> {
        (self.count > 0).then(|| (self.sum / self.count as f64) as f32)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CameraStats {
    /// Sum of the reported `people_count` over all frames
    pub people: u64,
    pub frames: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
    pub people_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub people_count: u64,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub unique_people: u64,
    pub unique_objects: u64,
    pub unique_per_label: BTreeMap<String, u64>,
    pub unique_per_source: BTreeMap<String, BTreeMap<String, u64>>,
    pub frames: u64,
    pub label_stats: BTreeMap<String, LabelStats>,
    pub cameras: BTreeMap<String, CameraStats>,
    pub timeline: Vec<TimelinePoint>,
    pub peak: Option<Peak>,
    pub average_confidence: Option<f32>,
    pub total_people_reported: u64,
    pub safe_frames: u64,
    pub events: Vec<EventRecord>,
    pub critical_events: u64,
    pub dropped_records: usize,
}

impl Summary {
    pub fn from_replay(replay: &Replay, config: &ReportConfig) -> Summary {
        let mut builder = SummaryBuilder::new(config.clone());
        for frame in &replay.frames {
            builder.observe_frame(frame);
        }
        for event in &replay.events {
            builder.observe_event(event);
        }
        builder.finish(&replay.counts, replay.dropped.len())
    }
}

/// Incremental form of [`Summary::from_replay`] for callers that stream
/// frames.
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    config: ReportConfig,
    label_stats: BTreeMap<String, LabelStats>,
    cameras: BTreeMap<String, CameraStats>,
    timeline: VecDeque<TimelinePoint>,
    peak: Option<Peak>,
    confidence: Mean,
    total_people: u64,
    safe_frames: u64,
    events: Vec<EventRecord>,
    critical_events: u64,
}

impl SummaryBuilder {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            label_stats: BTreeMap::new(),
            cameras: BTreeMap::new(),
            timeline: VecDeque::new(),
            peak: None,
            confidence: Mean::default(),
            total_people: 0,
            safe_frames: 0,
            events: Vec::new(),
            critical_events: 0,
        }
    }

    pub fn observe_frame(&mut self, frame: &ReplayedFrame) {
        let update = &frame.update;
        for tracked in &update.detections {
            let det = &tracked.detection;
            self.label_stats
                .entry(det.label.clone())
                .or_default()
                .add(det.confidence);
            if let Some(confidence) = det.confidence {
                self.confidence.add(confidence);
            }
        }

        let camera = self.cameras.entry(update.source_id.clone()).or_default();
        camera.people += frame.people_count;
        camera.frames += 1;
        self.total_people += frame.people_count;

        if frame.status.as_deref() == Some(SAFE_STATUS) {
            self.safe_frames += 1;
        }

        // Strictly greater, so the first frame reaching the maximum wins.
        if self
            .peak
            .as_ref()
            .is_none_or(|peak| frame.people_count > peak.people_count)
            && frame.people_count > 0
        {
            self.peak = Some(Peak {
                people_count: frame.people_count,
                source_id: update.source_id.clone(),
                timestamp: update.timestamp,
            });
        }

        if self.config.timeline_capacity > 0 {
            if self.timeline.len() == self.config.timeline_capacity {
                self.timeline.pop_front();
            }
            self.timeline.push_back(TimelinePoint {
                timestamp: update.timestamp,
                source_id: update.source_id.clone(),
                people_count: frame.people_count,
            });
        }
    }

    pub fn observe_event(&mut self, event: &EventRecord) {
        if event.status() == Some(CRITICAL_STATUS) {
            self.critical_events += 1;
        }
        self.events.push(event.clone());
    }

    pub fn finish(self, counts: &UniqueCounts, dropped_records: usize) -> Summary {
        Summary {
            unique_people: counts.unique_people(),
            unique_objects: counts.unique_objects(),
            unique_per_label: counts.per_label().clone(),
            unique_per_source: counts.per_source().clone(),
            frames: counts.frames_processed(),
            label_stats: self.label_stats,
            cameras: self.cameras,
            timeline: self.timeline.into(),
            peak: self.peak,
            average_confidence: self.confidence.value(),
            total_people_reported: self.total_people,
            safe_frames: self.safe_frames,
            events: self.events,
            critical_events: self.critical_events,
            dropped_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::replay;
    use crate::tracker::TrackerConfig;
    use serde_json::{Value, json};

    fn metric(ts: &str, cam: &str, status: &str, people: u64, dets: Value) -> Value {
        json!({
            "type": "METRIC",
            "meta": { "ts": ts, "cam_id": cam, "site": "HEAD_OFFICE", "status": status },
            "data": { "people_count": people, "detections": dets }
        })
    }

    fn sample_log() -> Vec<Value> {
        vec![
            metric(
                "2025-01-10T09:00:00Z",
                "EMPLOYEE_AREA",
                "SAFE",
                2,
                json!([
                    { "label": "person", "confidence": 0.9, "bbox": { "top": 81, "left": 309, "width": 69, "height": 250 } },
                    { "label": "person", "confidence": 0.7, "bbox": { "top": 83, "left": 100, "width": 56, "height": 110 } },
                    { "label": "chair", "confidence": 0.8, "bbox": { "top": 217, "left": 30, "width": 100, "height": 140 } }
                ]),
            ),
            metric(
                "2025-01-10T09:00:05Z",
                "EMPLOYEE_AREA",
                "SAFE",
                1,
                json!([
                    { "label": "person", "confidence": 0.6, "bbox": { "top": 85, "left": 310, "width": 68, "height": 245 } }
                ]),
            ),
            metric("2025-01-10T09:00:03Z", "CAFETERIA", "WARNING", 2, json!([])),
            json!({
                "type": "EVENT",
                "meta": { "ts": "2025-01-10T09:00:04Z", "cam_id": "BOSS_CABIN", "status": "CRITICAL" },
                "event": { "triggers": ["RESTRICTED_ACCESS"], "people_count": 1 }
            }),
            json!({ "type": "METRIC", "meta": { "cam_id": "CAFETERIA" } }),
        ]
    }

    #[test]
    fn test_summary_from_replay() {
        let replay = replay(sample_log(), TrackerConfig::default()).unwrap();
        let summary = Summary::from_replay(&replay, &ReportConfig::default());

        assert_eq!(summary.unique_people, 2);
        assert_eq!(summary.unique_objects, 1);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.dropped_records, 1);

        let person = &summary.label_stats["person"];
        assert_eq!(person.detections, 3);
        assert!((person.mean_confidence.unwrap() - (0.9 + 0.7 + 0.6) / 3.0).abs() < 1e-6);
        assert!((summary.average_confidence.unwrap() - 3.0 / 4.0).abs() < 1e-6);

        assert_eq!(
            summary.cameras["EMPLOYEE_AREA"],
            CameraStats {
                people: 3,
                frames: 2
            }
        );
        assert_eq!(summary.total_people_reported, 5);
        assert_eq!(summary.safe_frames, 2);

        let peak = summary.peak.unwrap();
        assert_eq!(peak.people_count, 2);
        assert_eq!(peak.source_id, "EMPLOYEE_AREA");

        let timeline: Vec<&str> = summary.timeline.iter().map(|p| p.source_id.as_str()).collect();
        assert_eq!(timeline, vec!["EMPLOYEE_AREA", "CAFETERIA", "EMPLOYEE_AREA"]);

        assert_eq!(summary.events.len(), 1);
        assert_eq!(summary.critical_events, 1);
    }

    #[test]
    fn test_timeline_keeps_most_recent() {
        let replay = replay(sample_log(), TrackerConfig::default()).unwrap();
        let summary = Summary::from_replay(&replay, &ReportConfig {
            timeline_capacity: 2,
        });
        let people: Vec<u64> = summary.timeline.iter().map(|p| p.people_count).collect();
        assert_eq!(people, vec![2, 1]);

        let none = Summary::from_replay(&replay, &ReportConfig {
            timeline_capacity: 0,
        });
        assert!(none.timeline.is_empty());
    }

    #[test]
    fn test_unscored_detections_skip_confidence_averages() {
        let log = vec![metric(
            "2025-01-10T09:00:00Z",
            "CAFETERIA",
            "SAFE",
            2,
            json!([
                { "label": "person", "bbox": { "top": 0, "left": 0, "width": 10, "height": 10 } },
                { "label": "person", "confidence": 0.5,
                  "bbox": { "top": 0, "left": 100, "width": 10, "height": 10 } },
                { "label": "tv", "bbox": { "top": 50, "left": 50, "width": 20, "height": 10 } }
            ]),
        )];
        let replay = replay(log, TrackerConfig::default()).unwrap();
        let summary = Summary::from_replay(&replay, &ReportConfig::default());

        assert_eq!(summary.unique_people, 2);
        assert_eq!(summary.unique_objects, 1);
        assert_eq!(summary.label_stats["person"].detections, 2);
        assert_eq!(summary.label_stats["person"].mean_confidence, Some(0.5));
        assert_eq!(summary.label_stats["tv"].detections, 1);
        assert_eq!(summary.label_stats["tv"].mean_confidence, None);
        assert_eq!(summary.average_confidence, Some(0.5));
    }

    #[test]
    fn test_empty_summary() {
        let replay = replay(Vec::new(), TrackerConfig::default()).unwrap();
        let summary = Summary::from_replay(&replay, &ReportConfig::default());
        assert_eq!(summary.unique_people, 0);
        assert!(summary.peak.is_none());
        assert!(summary.average_confidence.is_none());
        assert!(serde_json::to_value(&summary).is_ok());
    }
}
