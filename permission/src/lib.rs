//! Camera and microphone authorization.
//!
//! This crate normalizes the authorization states reported by the host
//! platform into a uniform granted / denied / restricted outcome. The
//! platform itself is reached through the [`PermissionService`] trait so
//! that hosts can plug in their native prompt and tests can script answers.

#![warn(missing_docs)]

mod gate;
mod service;

pub use gate::{AccessError, authorize};
pub use service::{PermissionService, PresetPermissions};

/// Types of permissions that can be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Permission {
    /// Access to device camera.
    Camera,
    /// Access to device microphone.
    Microphone,
}

impl Permission {
    /// Lowercase noun used in user facing messages.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Microphone => "audio",
        }
    }

    /// Capitalized noun used at the start of user facing messages.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::Microphone => "Audio",
        }
    }
}

/// The current status of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
    /// Permission is restricted (e.g., parental controls on iOS).
    Restricted,
    /// Permission has not been requested yet.
    NotDetermined,
}

/// Errors that can occur when requesting permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The permission type is not supported on this platform.
    NotSupported,
    /// An unknown error occurred.
    Unknown(String),
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSupported => write!(f, "permission not supported on this platform"),
            Self::Unknown(msg) => write!(f, "unknown error: {msg}"),
        }
    }
}

impl std::error::Error for PermissionError {}

/// Check the current status of a permission without requesting it.
pub async fn check(service: &dyn PermissionService, permission: Permission) -> PermissionStatus {
    service.authorization_status(permission)
}

/// Request a permission from the user.
///
/// If the permission has already been granted or denied, this returns
/// the current status without showing a prompt.
///
/// # Errors
/// Returns a `PermissionError` if:
/// - The permission type is not supported by the service.
/// - An underlying platform error occurs while prompting.
pub async fn request(
    service: &dyn PermissionService,
    permission: Permission,
) -> Result<PermissionStatus, PermissionError> {
    match service.authorization_status(permission) {
        PermissionStatus::NotDetermined => {
            let granted = service.request_access(permission).await?;
            Ok(if granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            })
        }
        status => Ok(status),
    }
}
