//! Unique-entity counters fed by track-creation events.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::tracker::track::TrackCreated;

pub const DEFAULT_PERSON_LABEL: &str = "person";

/// Distinct tracks ever created, per label and per `(source, label)`.
///
/// Counters only grow. They change on [`UniqueCounts::apply`] and the frame
/// counter on [`UniqueCounts::record_frame`]; every accessor is a pure read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueCounts {
    #[serde(skip)]
    person_label: String,
    per_label: BTreeMap<String, u64>,
    per_source: BTreeMap<String, BTreeMap<String, u64>>,
    frames: u64,
}

impl Default for UniqueCounts {
    fn default() -> Self {
        Self::new(DEFAULT_PERSON_LABEL)
    }
}

impl UniqueCounts {
    pub fn new(person_label: impl Into<String>) -> Self {
        Self {
            person_label: person_label.into(),
            per_label: BTreeMap::new(),
            per_source: BTreeMap::new(),
            frames: 0,
        }
    }

    pub fn apply(&mut self, event: &TrackCreated) {
        *self.per_label.entry(event.label.clone()).or_default() += 1;
        *self
            .per_source
            .entry(event.source_id.clone())
            .or_default()
            .entry(event.label.clone())
            .or_default() += 1;
    }

    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Unique tracks carrying the person label.
    pub fn unique_people(&self) -> u64 {
        self.unique(&self.person_label)
    }

    /// Unique tracks of every other label.
    pub fn unique_objects(&self) -> u64 {
        self.per_label
            .iter()
            .filter(|(label, _)| **label != self.person_label)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn unique(&self, label: &str) -> u64 {
        self.per_label.get(label).copied().unwrap_or(0)
    }

    pub fn unique_for(&self, source_id: &str, label: &str) -> u64 {
        self.per_source
            .get(source_id)
            .and_then(|labels| labels.get(label))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.per_label.values().sum()
    }

    pub fn per_label(&self) -> &BTreeMap<String, u64> {
        &self.per_label
    }

    pub fn per_source(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.per_source
    }

    pub fn for_source(&self, source_id: &str) -> Option<&BTreeMap<String, u64>> {
        self.per_source.get(source_id)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }
}
