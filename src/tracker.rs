mod counts;
mod dedup_tracker;
mod detection;
mod frame;
pub mod matching;
mod rect;
mod source_state;
mod track;
mod track_state;

pub use counts::{DEFAULT_PERSON_LABEL, UniqueCounts};
pub use dedup_tracker::{DedupTracker, FrameUpdate, TrackerConfig};
pub use detection::{Detection, Observation, Rejection, TrackedDetection};
pub use frame::Frame;
pub use matching::MatchPolicy;
pub use rect::{Rect, iou_batch};
pub use source_state::SourceState;
pub use track::{Track, TrackCreated, TrackId};
pub use track_state::TrackState;
