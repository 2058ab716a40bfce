//! Host permission backend
//!
//! Answers authorization queries for the current OS. Notification grants are
//! owned by the notification service, which this crate does not link, so
//! that query reports `Unsupported` and the probe records `Unknown`.

use super::permissions::{PermissionBackend, PermissionState, ProbeError};
use async_trait::async_trait;

/// Permission backend for the running platform
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPermissions;

#[async_trait]
impl PermissionBackend for SystemPermissions {
    async fn screen_recording(&self) -> Result<PermissionState, ProbeError> {
        #[cfg(target_os = "macos")]
        {
            tokio::task::spawn_blocking(super::macos::permissions::screen_recording_state)
                .await
                .map_err(|e| ProbeError::backend(format!("preflight task failed: {}", e)))
        }

        #[cfg(not(target_os = "macos"))]
        {
            // No capture gate on Windows or X11
            Ok(PermissionState::Authorized)
        }
    }

    async fn notifications(&self) -> Result<PermissionState, ProbeError> {
        Err(ProbeError::unsupported(
            "notification authorization is managed by the notification service",
        ))
    }
}
