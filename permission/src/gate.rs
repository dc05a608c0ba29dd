use std::fmt;

use log::debug;
use thiserror::Error;

use crate::{Permission, PermissionError, PermissionService, PermissionStatus, check, request};

/// Why access to a capture device was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The user declined the prompt that was just shown.
    Denied(Permission),
    /// The user declined an earlier prompt, so no prompt was shown.
    DeniedWithoutPrompt(Permission),
    /// Access is blocked by policy, e.g. parental controls.
    Restricted(Permission),
    /// The platform could not answer the request.
    Unavailable(Permission, PermissionError),
}

impl AccessError {
    /// Stable error code reported to the host.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Denied(Permission::Camera) => "CameraAccessDenied",
            Self::Denied(Permission::Microphone) => "AudioAccessDenied",
            Self::DeniedWithoutPrompt(Permission::Camera) => "CameraAccessDeniedWithoutPrompt",
            Self::DeniedWithoutPrompt(Permission::Microphone) => "AudioAccessDeniedWithoutPrompt",
            Self::Restricted(Permission::Camera) => "CameraAccessRestricted",
            Self::Restricted(Permission::Microphone) => "AudioAccessRestricted",
            Self::Unavailable(..) => "PermissionUnavailable",
        }
    }

    /// The permission that was refused.
    #[must_use]
    pub const fn permission(&self) -> Permission {
        match self {
            Self::Denied(permission)
            | Self::DeniedWithoutPrompt(permission)
            | Self::Restricted(permission)
            | Self::Unavailable(permission, _) => *permission,
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied(permission) => {
                write!(f, "User denied the {} access request.", permission.noun())
            }
            Self::DeniedWithoutPrompt(permission) => write!(
                f,
                "User has previously denied the {noun} access request. Go to Settings to enable {noun} access.",
                noun = permission.noun()
            ),
            Self::Restricted(permission) => write!(f, "{} access is restricted.", permission.title()),
            Self::Unavailable(permission, error) => {
                write!(f, "{} access could not be determined: {error}", permission.title())
            }
        }
    }
}

/// Make sure `permission` is granted, prompting the user if it was never asked.
///
/// # Errors
/// Returns an [`AccessError`] describing which of the refusal paths was taken.
pub async fn authorize(service: &dyn PermissionService, permission: Permission) -> Result<(), AccessError> {
    let prompted = check(service, permission).await == PermissionStatus::NotDetermined;
    if prompted {
        debug!("prompting for {} access", permission.noun());
    }
    let status = request(service, permission)
        .await
        .map_err(|error| AccessError::Unavailable(permission, error))?;
    match status {
        PermissionStatus::Granted => Ok(()),
        PermissionStatus::Restricted => Err(AccessError::Restricted(permission)),
        PermissionStatus::Denied if !prompted => Err(AccessError::DeniedWithoutPrompt(permission)),
        PermissionStatus::Denied | PermissionStatus::NotDetermined => Err(AccessError::Denied(permission)),
    }
}
