//! Batch replay of the detection log through the tracker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{IngestError, OutOfOrderFrame, RecordError, TrackError};
use crate::integration::detector::RecordSource;
use crate::integration::record::{EventRecord, MetricRecord, Record};
use crate::tracker::{DedupTracker, FrameUpdate, TrackerConfig, UniqueCounts};

/// A record that did not make it into the tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRecord {
    /// Position of the record in ingestion order, across batches
    pub index: usize,
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    Malformed {
        #[serde(serialize_with = "serialize_display")]
        error: RecordError,
    },
    /// Older than a frame already processed for the same source
    OutOfOrder {
        source_id: String,
        timestamp: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    },
}

fn serialize_display<S: serde::Serializer>(
    error: &RecordError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// One processed metric frame with the producer fields the report needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayedFrame {
    #[serde(flatten)]
    pub update: FrameUpdate,
    pub people_count: u64,
    pub site: Option<String>,
    pub status: Option<String>,
}

/// Everything a full pass over the log produced.
#[derive(Debug, Clone, Serialize)]
pub struct Replay {
    /// Processed frames, in processing (timestamp) order
    pub frames: Vec<ReplayedFrame>,
    pub events: Vec<EventRecord>,
    pub dropped: Vec<DroppedRecord>,
    pub counts: UniqueCounts,
}

impl Replay {
    /// Annotated frames of one source, oldest first.
    pub fn frames_for<'a>(&'a self, source_id: &'a str) -> impl Iterator<Item = &'a ReplayedFrame> {
        self.frames
            .iter()
            .filter(move |f| f.update.source_id == source_id)
    }
}

/// Feeds record batches through a [`DedupTracker`], keeping what the report
/// needs.
pub struct Replayer {
    tracker: DedupTracker,
    frames: Vec<ReplayedFrame>,
    events: Vec<EventRecord>,
    dropped: Vec<DroppedRecord>,
    next_index: usize,
}

impl Replayer {
    pub fn new(config: TrackerConfig) -> Result<Self, TrackError> {
        Ok(Self {
            tracker: DedupTracker::new(config)?,
            frames: Vec::new(),
            events: Vec::new(),
            dropped: Vec::new(),
            next_index: 0,
        })
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    pub fn frames(&self) -> &[ReplayedFrame] {
        &self.frames
    }

    pub fn dropped(&self) -> &[DroppedRecord] {
        &self.dropped
    }

    /// Validate a batch, sort its metric frames by timestamp and run them
    /// through the tracker. Returns the frames processed from this batch.
    ///
    /// The sort is stable, so frames with equal timestamps keep their log
    /// order.
    pub fn feed(&mut self, records: impl IntoIterator<Item = Value>) -> &[ReplayedFrame] {
        let mut metrics: Vec<(usize, MetricRecord)> = Vec::new();
        for value in records {
            let index = self.next_index;
            self.next_index += 1;
            match Record::from_value(value) {
                Ok(Record::Metric(metric)) => metrics.push((index, metric)),
                Ok(Record::Event(event)) => self.events.push(event),
                Err(error) => {
                    log::warn!("dropping record {index}: {error}");
                    self.dropped.push(DroppedRecord {
                        index,
                        reason: DropReason::Malformed { error },
                    });
                }
            }
        }
        metrics.sort_by_key(|(_, metric)| metric.frame.timestamp);

        let start = self.frames.len();
        for (index, metric) in metrics {
            match self.tracker.update(&metric.frame) {
                Ok(update) => self.frames.push(ReplayedFrame {
                    update,
                    people_count: metric.people_count,
                    site: metric.site,
                    status: metric.status,
                }),
                Err(OutOfOrderFrame {
                    source_id,
                    timestamp,
                    last_seen,
                }) => {
                    log::warn!(
                        "dropping record {index}: {source_id} frame at {timestamp} precedes {last_seen}"
                    );
                    self.dropped.push(DroppedRecord {
                        index,
                        reason: DropReason::OutOfOrder {
                            source_id,
                            timestamp,
                            last_seen,
                        },
                    });
                }
            }
        }
        &self.frames[start..]
    }

    pub fn finish(self) -> Replay {
        log::debug!(
            "replayed {} frames, {} events, {} dropped",
            self.frames.len(),
            self.events.len(),
            self.dropped.len()
        );
        Replay {
            frames: self.frames,
            events: self.events,
            dropped: self.dropped,
            counts: self.tracker.into_counts(),
        }
    }
}

/// Run a whole log through a fresh tracker in one forward pass.
pub fn replay(
    records: impl IntoIterator<Item = Value>,
    config: TrackerConfig,
) -> Result<Replay, TrackError> {
    let mut replayer = Replayer::new(config)?;
    replayer.feed(records);
    Ok(replayer.finish())
}

/// Parse a detection log (a JSON array of records) and replay it.
pub fn replay_str(log: &str, config: TrackerConfig) -> Result<Replay, IngestError> {
    let value: Value = serde_json::from_str(log)?;
    let Value::Array(records) = value else {
        return Err(IngestError::NotAnArray);
    };
    Ok(replay(records, config)?)
}

/// A replayer that pulls its records from a [`RecordSource`].
pub struct TrackerPipeline<S: RecordSource> {
    source: S,
    replayer: Replayer,
}

impl<S: RecordSource> TrackerPipeline<S> {
    pub fn new(source: S, config: TrackerConfig) -> Result<Self, TrackError> {
        Ok(Self {
            source,
            replayer: Replayer::new(config)?,
        })
    }

    /// Fetch one batch from the source and process it.
    pub fn poll(&mut self) -> Result<&[ReplayedFrame], S::Error> {
        let records = self.source.fetch()?;
        Ok(self.replayer.feed(records))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn replayer(&self) -> &Replayer {
        &self.replayer
    }

    pub fn finish(self) -> Replay {
        self.replayer.finish()
    }
}
