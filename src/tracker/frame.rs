use chrono::{DateTime, Utc};

use crate::tracker::detection::{Detection, Observation};

/// A timestamped batch of observations from exactly one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub observations: Vec<Observation>,
}

impl Frame {
    pub fn new(
        source_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        observations: Vec<Observation>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp,
            observations,
        }
    }

    /// Build a frame from detections, validating each one.
    pub fn from_detections(
        source_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        detections: impl IntoIterator<Item = Detection>,
    ) -> Self {
        Self::new(
            source_id,
            timestamp,
            detections.into_iter().map(Observation::checked).collect(),
        )
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Valid detections, in frame order.
    #[inline]
    pub fn detections(&self) -> impl Iterator<Item = &Detection> {
        self.observations.iter().filter_map(Observation::as_valid)
    }
}
