use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a single detection inside an otherwise valid frame was set aside.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("detection has no label")]
    MissingLabel,
    #[error("detection has no bbox")]
    MissingBbox,
    #[error("bbox is malformed: {0}")]
    MalformedBbox(String),
    #[error("bbox has a non-finite coordinate")]
    NonFiniteBbox,
    #[error("bbox has negative size {width}x{height}")]
    NegativeSize { width: f32, height: f32 },
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f32),
    #[error("detection is not an object")]
    NotAnObject,
}

/// Why a whole record was dropped at ingestion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no meta object")]
    MissingMeta,
    #[error("record has no meta.cam_id")]
    MissingSource,
    #[error("record has no meta.ts")]
    MissingTimestamp,
    #[error("meta.ts {0:?} is not an ISO-8601 timestamp")]
    BadTimestamp(String),
    #[error("record data is malformed: {0}")]
    BadData(String),
}

/// A frame older than one already processed for the same source.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "frame for source {source_id} at {timestamp} is older than the last processed frame at {last_seen}"
)]
pub struct OutOfOrderFrame {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Tracker construction failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("invalid tracker config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("detection log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("detection log must be a JSON array of records")]
    NotAnArray,
    #[error(transparent)]
    Track(#[from] TrackError),
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("worker for source {0} panicked")]
    WorkerPanicked(String),
    #[error("aggregator thread panicked")]
    AggregatorPanicked,
    #[error("worker for source {0} has already stopped")]
    WorkerStopped(String),
    #[error(transparent)]
    Track(#[from] TrackError),
}
