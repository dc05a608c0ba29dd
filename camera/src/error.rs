use serde_json::Value;

use crate::backend::BackendError;

/// Errors that can occur with camera operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// The session could not be configured for the requested preset.
    #[error("{0}")]
    Configuration(String),
    /// No capture device matches the requested name.
    #[error("camera not found: {0}")]
    DeviceNotFound(String),
    /// The backend refused to create an input for the device.
    #[error("failed to create capture input: {0}")]
    InputCreation(BackendError),
    /// A command argument could not be parsed.
    #[error("invalid {kind}: {value}")]
    InvalidArgument {
        /// What was being parsed.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
    /// The device lacks a capability the command needs.
    #[error("{message}")]
    Capability {
        /// Stable error code reported to the host.
        code: &'static str,
        /// Human readable description.
        message: String,
    },
    /// Requested zoom factor lies outside the device's range.
    #[error("Zoom level out of bounds (zoom level should be between {min} and {max}).")]
    ZoomOutOfRange {
        /// Minimum supported zoom factor.
        min: f64,
        /// Maximum supported zoom factor.
        max: f64,
        /// The rejected zoom factor.
        requested: f64,
    },
    /// A recording is already in progress.
    #[error("Video is already recording")]
    AlreadyRecording,
    /// No recording is in progress.
    #[error("Video is not recording!")]
    NotRecording,
    /// Image streaming is already on.
    #[error("Images from camera are already streaming!")]
    AlreadyStreaming,
    /// Image streaming is off.
    #[error("Images from camera are not streaming!")]
    NotStreaming,
    /// The asset writer could not be set up or finalized.
    #[error("{0}")]
    Recording(String),
    /// Filesystem error while preparing or writing a capture file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Error reported by the capture backend.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CameraError {
    pub(crate) fn capability(code: &'static str, message: impl Into<String>) -> Self {
        Self::Capability {
            code,
            message: message.into(),
        }
    }

    /// Stable error code reported to the host.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::Configuration(_) => "CameraConfigurationError".into(),
            Self::DeviceNotFound(_) => "CameraNotFound".into(),
            Self::InputCreation(_) => "CameraInputError".into(),
            Self::InvalidArgument { .. } => "InvalidArgument".into(),
            Self::Capability { code, .. } => (*code).into(),
            Self::ZoomOutOfRange { .. } => "ZOOM_ERROR".into(),
            Self::AlreadyRecording | Self::NotRecording | Self::AlreadyStreaming | Self::NotStreaming => "Error".into(),
            Self::Recording(_) | Self::Io(_) => "IOError".into(),
            Self::Backend(error) => format!("Error {}", error.code),
        }
    }

    /// Extra detail reported alongside the code and message.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            Self::Backend(error) | Self::InputCreation(error) => Value::String(error.domain.clone()),
            _ => Value::Null,
        }
    }
}
