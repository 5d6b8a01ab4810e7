//! Persistent identities for objects seen by one source.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Track identifier, unique within `(source_id, label)`.
///
/// Equality and ordering use the `(source_id, label, seq)` parts, so ids of
/// different sources or labels never collide even when the rendered forms
/// would. Rendered as `{source}_{label}_{seq}` where `seq` counts from 1 per
/// label within a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId {
    source_id: String,
    label: String,
    seq: u64,
}

impl TrackId {
    pub(crate) fn new(source_id: &str, label: &str, seq: u64) -> Self {
        Self {
            source_id: source_id.to_string(),
            label: label.to_string(),
            seq,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.source_id, self.label, self.seq)
    }
}

impl Serialize for TrackId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compares the rendered form.
impl PartialEq<&str> for TrackId {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// One physical object as observed by one source over consecutive frames.
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub track_id: TrackId,
    pub label: String,
    pub state: TrackState,
    /// Bounding box of the most recent matched detection
    pub last_bbox: Rect,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Number of frames this track has been observed in
    pub hits: u32,
}

impl Track {
    pub(crate) fn new(
        track_id: TrackId,
        label: &str,
        bbox: Rect,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            track_id,
            label: label.to_string(),
            state: TrackState::Tracked,
            last_bbox: bbox,
            first_seen: timestamp,
            last_seen: timestamp,
            hits: 1,
        }
    }

    pub(crate) fn update(&mut self, bbox: Rect, timestamp: DateTime<Utc>) {
        self.last_bbox = bbox;
        self.last_seen = timestamp;
        self.hits += 1;
        self.state = TrackState::Tracked;
    }

    pub(crate) fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }
}

/// Counter delta emitted whenever a detection starts a new track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackCreated {
    pub source_id: String,
    pub label: String,
    pub track_id: TrackId,
    pub timestamp: DateTime<Utc>,
}
