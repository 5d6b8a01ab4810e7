//! Integration module for connecting detection log producers with the tracker.
//!
//! This module validates raw log records, replays them in timestamp order
//! through a [`DedupTracker`](crate::tracker::DedupTracker), and offers a live
//! variant with one worker per source.

mod builder;
mod concurrent;
mod detector;
mod pipeline;
mod record;

pub use builder::DetectionBuilder;
pub use concurrent::{LiveReport, LiveTracker, SourceOutcome};
pub use detector::{RecordSource, StaticRecords};
pub use pipeline::{
    DropReason, DroppedRecord, Replay, ReplayedFrame, Replayer, TrackerPipeline, replay,
    replay_str,
};
pub use record::{EventRecord, METRIC_TYPE, MetricRecord, Record, parse_timestamp, rejections};
