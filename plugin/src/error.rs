use lenskit_camera::CameraError;
use lenskit_camera::host::MethodError;
use lenskit_permission::AccessError;
use serde_json::Value;

/// Errors answered to the host by the plugin.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Camera or microphone access was refused.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// The engine rejected the command.
    #[error(transparent)]
    Camera(#[from] CameraError),
    /// The command's arguments did not have the expected shape.
    #[error("invalid arguments for {method}: {source}")]
    Arguments {
        /// The command being parsed.
        method: String,
        /// What serde complained about.
        source: serde_json::Error,
    },
    /// The command needs a camera and none is open.
    #[error("No camera is open")]
    NoCamera,
    /// The camera was replaced or disposed before it finished opening.
    #[error("Camera was disposed before it finished opening")]
    Disposed,
}

impl PluginError {
    /// Stable error code reported to the host.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::Access(error) => error.code().to_owned(),
            Self::Camera(error) => error.code(),
            Self::Arguments { .. } => "InvalidArgument".to_owned(),
            Self::NoCamera | Self::Disposed => "CameraNotFound".to_owned(),
        }
    }
}

impl From<&PluginError> for MethodError {
    fn from(error: &PluginError) -> Self {
        match error {
            PluginError::Camera(error) => Self::from(error),
            other => Self {
                code: other.code(),
                message: Some(other.to_string()),
                details: Value::Null,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use lenskit_permission::Permission;

    use super::*;

    #[test]
    fn access_errors_keep_permission_codes() {
        let error = PluginError::from(AccessError::Restricted(Permission::Camera));
        let reply = MethodError::from(&error);

        assert_eq!(reply.code, "CameraAccessRestricted");
        assert_eq!(reply.message.as_deref(), Some("Camera access is restricted."));
    }

    #[test]
    fn camera_errors_pass_through() {
        let reply = MethodError::from(&PluginError::from(CameraError::NotRecording));

        assert_eq!(reply, MethodError::new("Error", "Video is not recording!"));
    }
}
