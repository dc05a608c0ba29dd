use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::{BoxFuture, FutureExt};

use crate::{Permission, PermissionError, PermissionStatus};

/// Host platform access to the authorization database.
///
/// `request_access` is only called while the status is
/// [`PermissionStatus::NotDetermined`]; implementations show the system
/// prompt and resolve with the user's answer.
pub trait PermissionService: Send + Sync {
    /// Current authorization status for `permission`.
    fn authorization_status(&self, permission: Permission) -> PermissionStatus;

    /// Prompt the user and resolve to `true` when access was granted.
    fn request_access(&self, permission: Permission) -> BoxFuture<'static, Result<bool, PermissionError>>;
}

/// A [`PermissionService`] whose statuses and prompt answers are fixed up front.
///
/// Useful on hosts without a system prompt, and in tests.
#[derive(Debug, Default)]
pub struct PresetPermissions {
    statuses: Mutex<HashMap<Permission, PermissionStatus>>,
    answers: HashMap<Permission, bool>,
    prompts: AtomicUsize,
}

impl PresetPermissions {
    /// Every permission starts out not determined and prompts are declined.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera and microphone are both already granted.
    #[must_use]
    pub fn granted() -> Self {
        Self::new()
            .with_status(Permission::Camera, PermissionStatus::Granted)
            .with_status(Permission::Microphone, PermissionStatus::Granted)
    }

    /// Set the status reported for `permission`.
    #[must_use]
    pub fn with_status(mut self, permission: Permission, status: PermissionStatus) -> Self {
        self.statuses
            .get_mut()
            .expect("poisoned permission mutex")
            .insert(permission, status);
        self
    }

    /// Set the answer given when the user is prompted for `permission`.
    #[must_use]
    pub fn answering(mut self, permission: Permission, grant: bool) -> Self {
        self.answers.insert(permission, grant);
        self
    }

    /// Number of prompts shown so far.
    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl PermissionService for PresetPermissions {
    fn authorization_status(&self, permission: Permission) -> PermissionStatus {
        self.statuses
            .lock()
            .expect("poisoned permission mutex")
            .get(&permission)
            .copied()
            .unwrap_or(PermissionStatus::NotDetermined)
    }

    fn request_access(&self, permission: Permission) -> BoxFuture<'static, Result<bool, PermissionError>> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let grant = self.answers.get(&permission).copied().unwrap_or(false);
        let status = if grant {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        self.statuses
            .lock()
            .expect("poisoned permission mutex")
            .insert(permission, status);
        futures::future::ready(Ok(grant)).boxed()
    }
}
