//! Matching state owned by a single source.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::error::OutOfOrderFrame;
use crate::tracker::dedup_tracker::{FrameUpdate, TrackerConfig};
use crate::tracker::detection::{Observation, Rejection, TrackedDetection};
use crate::tracker::frame::Frame;
use crate::tracker::matching;
use crate::tracker::track::{Track, TrackCreated, TrackId};

/// Previous-detection buffer, label sequence counters and track table of one
/// source. Nothing here is shared with other sources.
#[derive(Debug, Clone)]
pub struct SourceState {
    source_id: String,
    /// Most recent frame at the back
    previous: VecDeque<Vec<TrackedDetection>>,
    next_seq: HashMap<String, u64>,
    tracks: HashMap<TrackId, Track>,
    last_timestamp: Option<DateTime<Utc>>,
    frames: u64,
}

impl SourceState {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            previous: VecDeque::new(),
            next_seq: HashMap::new(),
            tracks: HashMap::new(),
            last_timestamp: None,
            frames: 0,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Timestamp of the last frame processed for this source.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Detections of the most recently processed frame.
    pub fn previous_detections(&self) -> &[TrackedDetection] {
        self.previous.back().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn track(&self, track_id: &TrackId) -> Option<&Track> {
        self.tracks.get(track_id)
    }

    /// Every track ever created for this source, ordered by id.
    pub fn tracks(&self) -> Vec<&Track> {
        let mut tracks: Vec<&Track> = self.tracks.values().collect();
        tracks.sort_by(|a, b| a.track_id.cmp(&b.track_id));
        tracks
    }

    /// Match candidates: most recent frame first, each track offered once.
    fn candidates(&self) -> Vec<&TrackedDetection> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for frame in self.previous.iter().rev() {
            for det in frame {
                if seen.insert(&det.track_id) {
                    out.push(det);
                }
            }
        }
        out
    }

    fn next_track_id(&mut self, label: &str) -> TrackId {
        let seq = self.next_seq.entry(label.to_string()).or_insert(1);
        let id = TrackId::new(&self.source_id, label, *seq);
        *seq += 1;
        id
    }

    /// Process one frame of this source.
    ///
    /// Frames must arrive in non-decreasing timestamp order; an older frame is
    /// refused and leaves the state untouched.
    pub fn advance(
        &mut self,
        frame: &Frame,
        config: &TrackerConfig,
    ) -> Result<FrameUpdate, OutOfOrderFrame> {
        if let Some(last_seen) = self.last_timestamp {
            if frame.timestamp < last_seen {
                return Err(OutOfOrderFrame {
                    source_id: self.source_id.clone(),
                    timestamp: frame.timestamp,
                    last_seen,
                });
            }
        }

        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        for (index, observation) in frame.observations.iter().enumerate() {
            match observation {
                Observation::Valid(det) => valid.push(det),
                Observation::Rejected(reason) => rejected.push(Rejection {
                    index,
                    reason: reason.clone(),
                }),
            }
        }

        let (candidate_ids, assigned) = {
            let candidates = self.candidates();
            let ious = matching::label_iou(&candidates, &valid);
            let assignment = matching::assign(config.policy, &ious, config.iou_threshold);
            let assigned: Vec<Option<TrackId>> = assignment
                .by_detection(valid.len())
                .into_iter()
                .map(|row| row.map(|i| candidates[i].track_id.clone()))
                .collect();
            let ids: Vec<TrackId> = candidates.iter().map(|c| c.track_id.clone()).collect();
            (ids, assigned)
        };

        let mut detections = Vec::with_capacity(valid.len());
        let mut created = Vec::new();
        for (det, matched) in valid.into_iter().zip(assigned) {
            let track_id = match matched.and_then(|id| self.tracks.get_mut(&id)) {
                Some(track) => {
                    log::trace!(
                        "{}: {} continues at {:?}",
                        self.source_id,
                        track.track_id,
                        det.bbox
                    );
                    track.update(det.bbox, frame.timestamp);
                    track.track_id.clone()
                }
                None => {
                    let track_id = self.next_track_id(&det.label);
                    log::debug!("{}: new track {track_id}", self.source_id);
                    self.tracks.insert(
                        track_id.clone(),
                        Track::new(track_id.clone(), &det.label, det.bbox, frame.timestamp),
                    );
                    created.push(TrackCreated {
                        source_id: self.source_id.clone(),
                        label: det.label.clone(),
                        track_id: track_id.clone(),
                        timestamp: frame.timestamp,
                    });
                    track_id
                }
            };
            detections.push(TrackedDetection {
                detection: det.clone(),
                track_id,
            });
        }

        let continued: HashSet<&TrackId> = detections.iter().map(|d| &d.track_id).collect();
        for id in candidate_ids.iter().filter(|id| !continued.contains(id)) {
            if let Some(track) = self.tracks.get_mut(id) {
                track.mark_lost();
            }
        }

        self.previous.push_back(detections.clone());
        while self.previous.len() > config.lookback_frames {
            self.previous.pop_front();
        }
        self.last_timestamp = Some(frame.timestamp);
        self.frames += 1;

        Ok(FrameUpdate {
            source_id: self.source_id.clone(),
            timestamp: frame.timestamp,
            detections,
            rejected,
            created,
        })
    }
}
