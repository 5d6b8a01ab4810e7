//! Trait for detection log providers.

use serde_json::Value;

/// Trait for whatever delivers detection log records to the tracker.
///
/// Fetching (HTTP, file, fixture) and its retry policy belong to the
/// implementor; the pipeline only consumes the records.
///
/// # Example
///
/// ```ignore
/// use framedup::integration::RecordSource;
///
/// struct LogFile(std::path::PathBuf);
///
/// impl RecordSource for LogFile {
///     type Error = std::io::Error;
///
///     fn fetch(&mut self) -> Result<Vec<serde_json::Value>, Self::Error> {
///         let text = std::fs::read_to_string(&self.0)?;
///         Ok(serde_json::from_str(&text)?)
///     }
/// }
/// ```
pub trait RecordSource {
    /// Error type for fetch failures.
    type Error;

    /// Return the next batch of raw records. An empty batch means nothing new.
    fn fetch(&mut self) -> Result<Vec<Value>, Self::Error>;
}

/// Hands out a fixed set of records once, then empty batches.
#[derive(Debug, Clone, Default)]
pub struct StaticRecords {
    records: Option<Vec<Value>>,
}

impl StaticRecords {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records: Some(records),
        }
    }
}

impl RecordSource for StaticRecords {
    type Error = std::convert::Infallible;

    fn fetch(&mut self) -> Result<Vec<Value>, Self::Error> {
        Ok(self.records.take().unwrap_or_default())
    }
}
