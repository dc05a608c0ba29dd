use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::backend::AudioSettings;
use crate::storage::MediaStorage;

/// Default cap on streamed frames awaiting acknowledgement.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 4;

/// Tunables for a capture engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Root folder for captured media.
    pub storage_root: PathBuf,
    /// Streamed frames allowed in flight before new ones are dropped.
    pub max_pending_frames: usize,
    /// Audio track settings for recordings.
    pub audio: AudioSettings,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            storage_root: MediaStorage::default_root(),
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            audio: AudioSettings::default(),
        }
    }
}

impl CaptureConfig {
    /// Defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write captures under `root`.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Allow `count` streamed frames in flight.
    #[must_use]
    pub fn with_max_pending_frames(mut self, count: usize) -> Self {
        self.max_pending_frames = count;
        self
    }

    /// Record audio with `settings`.
    #[must_use]
    pub fn with_audio(mut self, settings: AudioSettings) -> Self {
        self.audio = settings;
        self
    }

    pub(crate) fn storage(&self) -> MediaStorage {
        MediaStorage::new(self.storage_root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{"maxPendingFrames": 2}"#).unwrap();
        assert_eq!(config.max_pending_frames, 2);
        assert_eq!(config.audio, AudioSettings::default());
        assert!(config.storage_root.ends_with("camera"));
    }
}
