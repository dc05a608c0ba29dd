use lenskit_camera::CaptureConfig;
use serde::{Deserialize, Serialize};

/// Channel receiving the host's commands.
pub const METHOD_CHANNEL: &str = "plugins.flutter.io/camera";
/// Channel carrying device orientation events.
pub const DEVICE_CHANNEL: &str = "flutter.io/cameraPlugin/device";
/// Event channel carrying streamed frames.
pub const IMAGE_STREAM_CHANNEL: &str = "plugins.flutter.io/camera/imageStream";

/// Name of the per-camera event channel for `camera_id`.
#[must_use]
pub fn camera_channel(camera_id: i64) -> String {
    format!("flutter.io/cameraPlugin/camera{camera_id}")
}

/// Settings for a [`CameraPlugin`](crate::CameraPlugin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginConfig {
    /// Settings passed to every capture engine.
    #[serde(flatten)]
    pub capture: CaptureConfig,
    /// Sensor orientation reported for every camera, in degrees.
    pub sensor_orientation: i64,
    /// Name of the serialization queue thread.
    pub queue_label: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            sensor_orientation: 90,
            queue_label: "lenskit.camera.captureSessionQueue".to_owned(),
        }
    }
}

impl PluginConfig {
    /// Defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `capture` for every engine.
    #[must_use]
    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    /// Report `degrees` as every camera's sensor orientation.
    #[must_use]
    pub const fn with_sensor_orientation(mut self, degrees: i64) -> Self {
        self.sensor_orientation = degrees;
        self
    }

    /// Name the serialization queue `label`.
    #[must_use]
    pub fn with_queue_label(mut self, label: impl Into<String>) -> Self {
        self.queue_label = label.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_capture_settings() {
        let config: PluginConfig =
            serde_json::from_str(r#"{"maxPendingFrames": 2, "sensorOrientation": 270}"#).unwrap();

        assert_eq!(config.capture.max_pending_frames, 2);
        assert_eq!(config.sensor_orientation, 270);
        assert_eq!(config.queue_label, "lenskit.camera.captureSessionQueue");
    }

    #[test]
    fn camera_channel_names() {
        assert_eq!(camera_channel(3), "flutter.io/cameraPlugin/camera3");
    }
}
