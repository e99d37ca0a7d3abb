//! Playback failure taxonomy.
//!
//! Engines report failures with these variants; the scheduler owns every
//! retry decision, so none of them carry a retry policy.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The locator could not be opened or decoded.
    #[error("failed to load {locator}: {reason}")]
    Load { locator: String, reason: String },

    /// The engine errored after the clip became ready.
    #[error("playback failed: {reason}")]
    Playback { reason: String },

    /// The catalog delivered no playable videos.
    #[error("catalog has no playable videos")]
    EmptyCatalog,
}

impl PlaybackError {
    pub fn load(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        PlaybackError::Load {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub fn playback(reason: impl Into<String>) -> Self {
        PlaybackError::Playback {
            reason: reason.into(),
        }
    }
}
