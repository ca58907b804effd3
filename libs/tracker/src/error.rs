use thiserror::Error;

/// Errors surfaced by the public tracker handle.
///
/// Index-cache misses are deliberately not represented here: a missing
/// cache entry means "absent", which is meaningful classifier input, not a
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrackError {
    /// The tracker was disposed; no operation will ever succeed again.
    #[error("tracker has been disposed")]
    Disposed,

    /// `subscribe` was called before any entity source was attached.
    #[error("no entity source attached")]
    NotConfigured,
}

impl TrackError {
    /// Whether retrying after corrective action can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TrackError::NotConfigured)
    }
}
