//! Detection types flowing through the tracker.

use serde::Serialize;

use crate::error::RejectReason;
use crate::tracker::matching::Matchable;
use crate::tracker::rect::Rect;
use crate::tracker::track::TrackId;

/// One observed object instance in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Category, e.g. "person" or "chair"
    pub label: String,
    /// Detection confidence score in [0, 1], absent when the producer omits it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Bounding box in TLWH format
    pub bbox: Rect,
    /// Model class id, when the producer reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<i64>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: Rect) -> Self {
        Self {
            label: label.into(),
            confidence: Some(confidence),
            bbox,
            class_id: None,
        }
    }

    /// A detection reported without a confidence score.
    pub fn unscored(label: impl Into<String>, bbox: Rect) -> Self {
        Self {
            label: label.into(),
            confidence: None,
            bbox,
            class_id: None,
        }
    }

    /// Check the invariants a matchable detection must hold.
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.label.is_empty() {
            return Err(RejectReason::MissingLabel);
        }
        if !self.bbox.is_finite() {
            return Err(RejectReason::NonFiniteBbox);
        }
        if self.bbox.width < 0.0 || self.bbox.height < 0.0 {
            return Err(RejectReason::NegativeSize {
                width: self.bbox.width,
                height: self.bbox.height,
            });
        }
        if let Some(confidence) = self.confidence.filter(|c| !(0.0..=1.0).contains(c)) {
            return Err(RejectReason::ConfidenceOutOfRange(confidence));
        }
        Ok(())
    }
}

/// A detection that could not be used, with its position in the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub index: usize,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: RejectReason,
}

fn serialize_reason<S: serde::Serializer>(
    reason: &RejectReason,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}

/// Entry of a frame after ingestion-time validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Valid(Detection),
    Rejected(RejectReason),
}

impl Observation {
    /// Wrap a detection, rejecting it if it breaks an invariant.
    pub fn checked(detection: Detection) -> Self {
        match detection.validate() {
            Ok(()) => Observation::Valid(detection),
            Err(reason) => Observation::Rejected(reason),
        }
    }

    pub fn as_valid(&self) -> Option<&Detection> {
        match self {
            Observation::Valid(det) => Some(det),
            Observation::Rejected(_) => None,
        }
    }
}

impl From<Detection> for Observation {
    fn from(detection: Detection) -> Self {
        Observation::checked(detection)
    }
}

/// A detection annotated with the track it was assigned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    pub track_id: TrackId,
}

impl Matchable for Detection {
    fn label(&self) -> &str {
        &self.label
    }

    fn bbox(&self) -> Rect {
        self.bbox
    }
}

impl Matchable for TrackedDetection {
    fn label(&self) -> &str {
        &self.detection.label
    }

    fn bbox(&self) -> Rect {
        self.detection.bbox
    }
}

impl<T: Matchable + ?Sized> Matchable for &T {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn bbox(&self) -> Rect {
        (**self).bbox()
    }
}
