//! Builder for creating Observations from loosely-typed detection input.

use serde::Deserialize;
use serde_json::Value;

use crate::error::RejectReason;
use crate::tracker::{Detection, Observation, Rect};

/// Builder for creating an [`Observation`] from partially known fields.
///
/// A missing label or bbox turns into a rejection when the observation is
/// built, so a malformed detection never reaches the matcher. The confidence
/// and class id are optional.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    label: Option<String>,
    confidence: Option<f32>,
    bbox: Option<Result<Rect, String>>,
    class_id: Option<i64>,
}

impl DetectionBuilder {
    /// Create a new detection builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the confidence score.
    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, left: f32, top: f32, width: f32, height: f32) -> Self {
        self.bbox = Some(Ok(Rect::new(left, top, width, height)));
        self
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Some(Ok(Rect::from_tlbr(x1, y1, x2, y2)));
        self
    }

    pub fn class_id(mut self, class_id: i64) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Read a detection object of the detection log.
    ///
    /// Missing or mistyped fields are left unset; `build` reports them.
    pub fn from_json(value: &Value) -> Result<Self, RejectReason> {
        let obj = value.as_object().ok_or(RejectReason::NotAnObject)?;
        let mut builder = Self::new();

        if let Some(label) = obj.get("label").and_then(Value::as_str) {
            builder = builder.label(label);
        }
        if let Some(confidence) = obj.get("confidence").and_then(Value::as_f64) {
            builder = builder.confidence(confidence as f32);
        }
        if let Some(class_id) = obj.get("class_id").and_then(Value::as_i64) {
            builder = builder.class_id(class_id);
        }
        match obj.get("bbox") {
            None | Some(Value::Null) => {}
            Some(bbox) => {
                builder.bbox = Some(parse_bbox(bbox));
            }
        }
        Ok(builder)
    }

    /// Build the final `Observation`.
    pub fn build(self) -> Observation {
        let Some(label) = self.label.filter(|l| !l.is_empty()) else {
            return Observation::Rejected(RejectReason::MissingLabel);
        };
        let bbox = match self.bbox {
            None => return Observation::Rejected(RejectReason::MissingBbox),
            Some(Err(msg)) => return Observation::Rejected(RejectReason::MalformedBbox(msg)),
            Some(Ok(bbox)) => bbox,
        };
        Observation::checked(Detection {
            label,
            confidence: self.confidence,
            bbox,
            class_id: self.class_id,
        })
    }
}

fn parse_bbox(value: &Value) -> Result<Rect, String> {
    Rect::deserialize(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detection_builder() {
        let obs = DetectionBuilder::new()
            .label("person")
            .tlbr(10.0, 20.0, 50.0, 80.0)
            .confidence(0.95)
            .build();

        let det = obs.as_valid().unwrap();
        assert_eq!(det.confidence, Some(0.95));
        assert_eq!(det.bbox, Rect::new(10.0, 20.0, 40.0, 60.0));

        let tlwh = DetectionBuilder::new()
            .label("person")
            .tlwh(10.0, 20.0, 40.0, 60.0)
            .class_id(0)
            .build();
        let det = tlwh.as_valid().unwrap();
        assert_eq!(det.bbox, Rect::new(10.0, 20.0, 40.0, 60.0));
        assert_eq!(det.class_id, Some(0));
        assert_eq!(det.confidence, None);
    }

    #[test]
    fn test_from_json() {
        let value = json!({
            "class_id": 56, "label": "chair", "confidence": 0.80,
            "bbox": { "top": 217, "left": 30, "width": 100, "height": 140 }
        });
        let obs = DetectionBuilder::from_json(&value).unwrap().build();
        let det = obs.as_valid().unwrap();
        assert_eq!(det.label, "chair");
        assert_eq!(det.class_id, Some(56));
        assert_eq!(det.bbox, Rect::new(30.0, 217.0, 100.0, 140.0));
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let cases = [
            (
                json!({"confidence": 0.5, "bbox": {"top": 0, "left": 0, "width": 1, "height": 1}}),
                RejectReason::MissingLabel,
            ),
            (json!({"label": "person", "confidence": 0.5}), RejectReason::MissingBbox),
            (
                json!({"label": "person", "confidence": 0.5, "bbox": null}),
                RejectReason::MissingBbox,
            ),
        ];
        for (value, reason) in cases {
            let obs = DetectionBuilder::from_json(&value).unwrap().build();
            assert_eq!(obs, Observation::Rejected(reason), "{value}");
        }
    }

    #[test]
    fn test_missing_confidence_is_accepted() {
        let value = json!({
            "label": "person",
            "bbox": { "top": 0, "left": 0, "width": 10, "height": 10 }
        });
        let obs = DetectionBuilder::from_json(&value).unwrap().build();
        let det = obs.as_valid().unwrap();
        assert_eq!(det.confidence, None);
        assert_eq!(det.bbox, Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_malformed_bbox() {
        let value = json!({"label": "person", "confidence": 0.5, "bbox": {"top": 0, "left": 0}});
        let obs = DetectionBuilder::from_json(&value).unwrap().build();
        assert!(matches!(obs, Observation::Rejected(RejectReason::MalformedBbox(_))));
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(
            DetectionBuilder::from_json(&json!("person")).unwrap_err(),
            RejectReason::NotAnObject
        );
    }
}
