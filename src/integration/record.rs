//! Typed view of the detection log records.
//!
//! Every record is validated once here. Metric records become a [`Frame`] plus
//! the occupancy fields the report uses; anything else is kept as-is.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{RecordError, RejectReason};
use crate::integration::builder::DetectionBuilder;
use crate::tracker::{Frame, Observation};

pub const METRIC_TYPE: &str = "METRIC";

/// A `METRIC` record: one frame of detections from one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub frame: Frame,
    /// Occupancy as reported by the producer
    pub people_count: u64,
    pub site: Option<String>,
    pub status: Option<String>,
}

/// Any non-metric record, surfaced unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventRecord {
    pub raw: Value,
}

impl EventRecord {
    fn meta_str(&self, key: &str) -> Option<&str> {
        self.raw.get("meta")?.get(key)?.as_str()
    }

    pub fn source_id(&self) -> Option<&str> {
        self.meta_str("cam_id")
    }

    pub fn status(&self) -> Option<&str> {
        self.meta_str("status")
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.meta_str("ts").and_then(|ts| parse_timestamp(ts).ok())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Metric(MetricRecord),
    Event(EventRecord),
}

impl Record {
    pub fn from_value(value: Value) -> Result<Record, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;
        if obj.get("type").and_then(Value::as_str) != Some(METRIC_TYPE) {
            return Ok(Record::Event(EventRecord { raw: value }));
        }
        parse_metric(obj).map(Record::Metric)
    }
}

fn parse_metric(obj: &Map<String, Value>) -> Result<MetricRecord, RecordError> {
    let meta = obj
        .get("meta")
        .and_then(Value::as_object)
        .ok_or(RecordError::MissingMeta)?;
    let source_id = meta
        .get("cam_id")
        .and_then(Value::as_str)
        .ok_or(RecordError::MissingSource)?;
    let ts = meta
        .get("ts")
        .and_then(Value::as_str)
        .ok_or(RecordError::MissingTimestamp)?;
    let timestamp = parse_timestamp(ts)?;

    let (people_count, observations) = match obj.get("data") {
        None | Some(Value::Null) => (0, Vec::new()),
        Some(Value::Object(data)) => parse_data(data)?,
        Some(other) => {
            return Err(RecordError::BadData(format!("expected an object, got {other}")));
        }
    };

    Ok(MetricRecord {
        frame: Frame::new(source_id, timestamp, observations),
        people_count,
        site: meta.get("site").and_then(Value::as_str).map(str::to_string),
        status: meta.get("status").and_then(Value::as_str).map(str::to_string),
    })
}

fn parse_data(data: &Map<String, Value>) -> Result<(u64, Vec<Observation>), RecordError> {
    let people_count = data.get("people_count").and_then(Value::as_u64).unwrap_or(0);
    let observations = match data.get("detections") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(parse_detection).collect(),
        Some(_) => {
            return Err(RecordError::BadData("detections is not an array".to_string()));
        }
    };
    Ok((people_count, observations))
}

fn parse_detection(value: &Value) -> Observation {
    match DetectionBuilder::from_json(value) {
        Ok(builder) => builder.build(),
        Err(reason) => Observation::Rejected(reason),
    }
}

/// Parse an ISO-8601 timestamp. Strings without an offset are taken as UTC.
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>, RecordError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RecordError::BadTimestamp(ts.to_string()))
}

/// Rejection reasons of the record's observations, in frame order.
pub fn rejections(record: &MetricRecord) -> impl Iterator<Item = &RejectReason> {
    record.frame.observations.iter().filter_map(|obs| match obs {
        Observation::Rejected(reason) => Some(reason),
        Observation::Valid(_) => None,
    })
}
