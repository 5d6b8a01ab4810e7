//! Frame-to-frame deduplication of object detections across multiple cameras.
//!
//! Detections of consecutive frames from the same source are linked by
//! bounding-box IoU into tracks, and every new track bumps the unique-entity
//! counters for its label and source.
//!
//! ```
//! use framedup::{DedupTracker, Detection, Frame, Rect, TrackerConfig};
//! use chrono::{TimeZone, Utc};
//!
//! let mut tracker = DedupTracker::new(TrackerConfig::default()).unwrap();
//! let t0 = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
//! let person = |left| Detection::new("person", 0.9, Rect::new(left, 100.0, 50.0, 150.0));
//!
//! let first = tracker.update(&Frame::from_detections("CAM1", t0, [person(100.0)])).unwrap();
//! let second = tracker
//!     .update(&Frame::from_detections("CAM1", t0 + chrono::Duration::seconds(1), [person(105.0)]))
//!     .unwrap();
//!
//! assert_eq!(first.detections[0].track_id, second.detections[0].track_id);
//! assert_eq!(tracker.counts().unique_people(), 1);
//! ```

pub mod error;
pub mod integration;
pub mod report;
pub mod tracker;

pub use error::{
    IngestError, LiveError, OutOfOrderFrame, RecordError, RejectReason, TrackError,
};
pub use integration::{LiveTracker, Replay, replay, replay_str};
pub use report::{ReportConfig, Summary};
pub use tracker::{
    DedupTracker, Detection, Frame, FrameUpdate, MatchPolicy, Observation, Rect, TrackId,
    TrackedDetection, TrackerConfig, UniqueCounts,
};
