//! Local media handle supplied by the session bootstrap.
//!
//! The bootstrap (camera setup, permission checks) acquires the device and
//! keeps ownership of it; the negotiation session only holds shared
//! references to the tracks and never releases the underlying resource.

use std::sync::Arc;

use webrtc::track::track_local::TrackLocal;

use crate::error::SessionError;

/// Shared reference to the caller's local media tracks.
#[derive(Clone)]
pub struct LocalMedia {
    tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl LocalMedia {
    /// Wraps the caller's tracks. An empty track set is a resource error:
    /// without local media the negotiation flow must not start.
    pub fn new(tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>) -> Result<Self, SessionError> {
        if tracks.is_empty() {
            return Err(SessionError::NoLocalMedia);
        }
        Ok(Self { tracks })
    }

    pub fn tracks(&self) -> &[Arc<dyn TrackLocal + Send + Sync>] {
        &self.tracks
    }
}

impl std::fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMedia")
            .field("tracks", &self.tracks.len())
            .finish()
    }
}
