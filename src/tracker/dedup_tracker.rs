//! Multi-source deduplication tracker.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OutOfOrderFrame, TrackError};
use crate::tracker::counts::{DEFAULT_PERSON_LABEL, UniqueCounts};
use crate::tracker::detection::{Rejection, TrackedDetection};
use crate::tracker::frame::Frame;
use crate::tracker::matching::MatchPolicy;
use crate::tracker::source_state::SourceState;
use crate::tracker::track::TrackCreated;

/// Configuration for the DedupTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU (inclusive) for a detection to continue a track
    pub iou_threshold: f32,
    pub policy: MatchPolicy,
    /// Number of previous frames searched for candidates
    pub lookback_frames: usize,
    /// Label counted by `UniqueCounts::unique_people`
    pub person_label: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            policy: MatchPolicy::FirstMatch,
            lookback_frames: 1,
            person_label: DEFAULT_PERSON_LABEL.to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(TrackError::InvalidConfig(format!(
                "iou_threshold must be in (0, 1], got {}",
                self.iou_threshold
            )));
        }
        if self.lookback_frames == 0 {
            return Err(TrackError::InvalidConfig(
                "lookback_frames must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of feeding one frame to the tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameUpdate {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    /// Valid detections of the frame, in frame order, with their track ids
    pub detections: Vec<TrackedDetection>,
    pub rejected: Vec<Rejection>,
    /// Tracks started by this frame
    pub created: Vec<TrackCreated>,
}

pub struct DedupTracker {
    sources: BTreeMap<String, SourceState>,
    counts: UniqueCounts,
    config: TrackerConfig,
}

impl DedupTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, TrackError> {
        config.validate()?;
        Ok(Self {
            sources: BTreeMap::new(),
            counts: UniqueCounts::new(config.person_label.clone()),
            config,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Mutable state for `source_id`, created empty on first use.
    pub fn source_state_mut(&mut self, source_id: &str) -> &mut SourceState {
        if !self.sources.contains_key(source_id) {
            log::debug!("tracking new source {source_id}");
        }
        self.sources
            .entry(source_id.to_string())
            .or_insert_with(|| SourceState::new(source_id))
    }

    pub fn source_state(&self, source_id: &str) -> Option<&SourceState> {
        self.sources.get(source_id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn counts(&self) -> &UniqueCounts {
        &self.counts
    }

    /// Match one frame against its source's previous frame and fold the
    /// resulting track creations into the counters.
    ///
    /// A frame older than the source's last processed frame is refused and
    /// leaves both the source state and the counters untouched.
    pub fn update(&mut self, frame: &Frame) -> Result<FrameUpdate, OutOfOrderFrame> {
        let config = &self.config;
        let state = self
            .sources
            .entry(frame.source_id.clone())
            .or_insert_with(|| {
                log::debug!("tracking new source {}", frame.source_id);
                SourceState::new(frame.source_id.as_str())
            });
        let update = state.advance(frame, config)?;

        for event in &update.created {
            self.counts.apply(event);
        }
        self.counts.record_frame();
        Ok(update)
    }

    /// Consume the tracker, keeping only its counters.
    pub fn into_counts(self) -> UniqueCounts {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::detection::Detection;
    use crate::tracker::rect::Rect;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());
        for bad in [0.0, -0.1, 1.5, f32::NAN] {
            let config = TrackerConfig {
                iou_threshold: bad,
                ..TrackerConfig::default()
            };
            assert!(DedupTracker::new(config).is_err(), "{bad}");
        }
        let config = TrackerConfig {
            lookback_frames: 0,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            DedupTracker::new(config),
            Err(TrackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_from_json_keeps_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"policy": "best_match", "lookback_frames": 3}"#).unwrap();
        assert_eq!(config.policy, MatchPolicy::BestMatch);
        assert_eq!(config.lookback_frames, 3);
        assert_eq!(config.iou_threshold, 0.3);
        assert_eq!(config.person_label, "person");
    }

    #[test]
    fn test_source_state_created_on_demand() {
        let mut tracker = DedupTracker::new(TrackerConfig::default()).unwrap();
        assert!(tracker.source_state("CAM9").is_none());
        assert_eq!(tracker.source_state_mut("CAM9").frames_processed(), 0);
        assert_eq!(tracker.sources().collect::<Vec<_>>(), vec!["CAM9"]);
    }

    #[test]
    fn test_update_feeds_counts() {
        let mut tracker = DedupTracker::new(TrackerConfig::default()).unwrap();
        let bbox = Rect::new(0.0, 0.0, 10.0, 10.0);
        tracker
            .update(&Frame::from_detections(
                "A",
                at(0),
                [Detection::new("person", 0.9, bbox), Detection::new("tv", 0.6, bbox)],
            ))
            .unwrap();
        tracker
            .update(&Frame::from_detections("A", at(1), [Detection::new("person", 0.9, bbox)]))
            .unwrap();

        let counts = tracker.counts();
        assert_eq!(counts.unique_people(), 1);
        assert_eq!(counts.unique_objects(), 1);
        assert_eq!(counts.frames_processed(), 2);
    }

    #[test]
    fn test_out_of_order_is_not_counted() {
        let mut tracker = DedupTracker::new(TrackerConfig::default()).unwrap();
        tracker.update(&Frame::from_detections("A", at(5), Vec::new())).unwrap();
        let err = tracker.update(&Frame::from_detections("A", at(1), Vec::new())).unwrap_err();
        assert_eq!(err.source_id, "A");
        assert_eq!(err.timestamp, at(1));
        assert_eq!(err.last_seen, at(5));
        assert_eq!(tracker.counts().frames_processed(), 1);
    }
}
