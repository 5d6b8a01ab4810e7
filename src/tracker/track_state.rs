/// Visibility of a track in its source's most recent frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum TrackState {
    /// Matched or created in the latest frame of its source
    #[default]
    Tracked,
    /// Present in an earlier frame but not continued by the latest one
    Lost,
}
