//! Capture authorization probing
//!
//! Tracks the OS grant status of the two capabilities the app cares about:
//! screen recording (required) and user notifications (nice to have).
//! The probe only ever reads OS state; it never requests or changes it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// An OS-gated permission class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ScreenRecording,
    Notifications,
}

/// Grant status of one capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    /// Not queried yet, or the query failed
    #[default]
    Unknown,
    Authorized,
    Denied,
    NotDetermined,
    Provisional,
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Authorized | PermissionState::Provisional)
    }
}

/// Why a probe query failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeErrorKind {
    /// The host refused because the app is not authorized
    Authorization,
    /// No way to query this capability on this platform
    Unsupported,
    TimedOut,
    Backend,
}

/// Structured probe failure, classified once by the backend
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{detail}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub detail: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn authorization(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Authorization, detail)
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Unsupported, detail)
    }

    pub fn backend(detail: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Backend, detail)
    }

    pub fn is_authorization(&self) -> bool {
        self.kind == ProbeErrorKind::Authorization
    }
}

/// OS boundary for authorization queries
#[async_trait]
pub trait PermissionBackend: Send + Sync {
    async fn screen_recording(&self) -> Result<PermissionState, ProbeError>;

    async fn notifications(&self) -> Result<PermissionState, ProbeError>;
}

/// Result of one probe round
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub screen_recording: PermissionState,
    pub notifications: PermissionState,
    pub screen_error: Option<ProbeError>,
    pub notification_error: Option<ProbeError>,
    /// None until the first probe completes
    pub checked_at: Option<DateTime<Utc>>,
}

impl PermissionSnapshot {
    pub fn state(&self, capability: Capability) -> PermissionState {
        match capability {
            Capability::ScreenRecording => self.screen_recording,
            Capability::Notifications => self.notifications,
        }
    }

    pub fn can_capture(&self) -> bool {
        self.screen_recording.is_granted()
    }

    /// Whether the confirmation notification should be attempted
    pub fn can_notify(&self) -> bool {
        self.notifications != PermissionState::Denied
    }
}

/// OS settings pane that unblocks a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemediationTarget {
    ScreenRecording,
    Notifications,
}

impl RemediationTarget {
    pub fn capability(&self) -> Capability {
        match self {
            RemediationTarget::ScreenRecording => Capability::ScreenRecording,
            RemediationTarget::Notifications => Capability::Notifications,
        }
    }

    /// Deep link the UI layer can open. The core never opens it itself.
    pub fn settings_url(&self) -> Option<&'static str> {
        if cfg!(target_os = "macos") {
            Some(match self {
                RemediationTarget::ScreenRecording => {
                    "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture"
                }
                RemediationTarget::Notifications => {
                    "x-apple.systempreferences:com.apple.preference.notifications"
                }
            })
        } else if cfg!(target_os = "windows") {
            match self {
                RemediationTarget::ScreenRecording => None,
                RemediationTarget::Notifications => Some("ms-settings:notifications"),
            }
        } else {
            None
        }
    }
}

struct CachedSnapshot {
    snapshot: PermissionSnapshot,
    probed_at: Instant,
    invalidated: bool,
}

/// Owns the authorization state of both capabilities
pub struct PermissionProbe {
    backend: Arc<dyn PermissionBackend>,
    timeout: Duration,
    max_age: Duration,
    cache: RwLock<Option<CachedSnapshot>>,
}

impl PermissionProbe {
    pub fn new(backend: Arc<dyn PermissionBackend>, timeout: Duration, max_age: Duration) -> Self {
        Self {
            backend,
            timeout,
            max_age,
            cache: RwLock::new(None),
        }
    }

    /// Last known snapshot; everything `Unknown` before the first probe
    pub fn current(&self) -> PermissionSnapshot {
        self.cache
            .read()
            .as_ref()
            .map(|c| c.snapshot.clone())
            .unwrap_or_default()
    }

    pub fn is_stale(&self) -> bool {
        match self.cache.read().as_ref() {
            None => true,
            Some(cached) => {
                cached.invalidated
                    || !cached.snapshot.can_capture()
                    || cached.probed_at.elapsed() > self.max_age
            }
        }
    }

    /// Force the next `ensure_fresh` to query the OS again
    pub fn invalidate(&self) {
        if let Some(cached) = self.cache.write().as_mut() {
            cached.invalidated = true;
        }
    }

    /// Query both capabilities, concurrently and independently
    pub async fn refresh(&self) -> PermissionSnapshot {
        tracing::debug!("Probing capture permissions");

        let (screen, notifications) = tokio::join!(
            self.query(self.backend.screen_recording()),
            self.query(self.backend.notifications()),
        );

        let mut snapshot = PermissionSnapshot {
            checked_at: Some(Utc::now()),
            ..Default::default()
        };

        match screen {
            Ok(state) => snapshot.screen_recording = state,
            Err(e) => {
                tracing::warn!("Screen recording probe failed ({:?}): {}", e.kind, e.detail);
                snapshot.screen_recording = PermissionState::Denied;
                snapshot.screen_error = Some(e);
            }
        }

        match notifications {
            Ok(state) => snapshot.notifications = state,
            Err(e) => {
                tracing::debug!("Notification probe failed ({:?}): {}", e.kind, e.detail);
                snapshot.notifications = PermissionState::Unknown;
                snapshot.notification_error = Some(e);
            }
        }

        tracing::info!(
            "Permissions: screen recording {:?}, notifications {:?}",
            snapshot.screen_recording,
            snapshot.notifications
        );

        *self.cache.write() = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            probed_at: Instant::now(),
            invalidated: false,
        });

        snapshot
    }

    /// Cached snapshot, refreshed first when stale
    pub async fn ensure_fresh(&self) -> PermissionSnapshot {
        if self.is_stale() {
            self.refresh().await
        } else {
            self.current()
        }
    }

    async fn query<F>(&self, fut: F) -> Result<PermissionState, ProbeError>
    where
        F: std::future::Future<Output = Result<PermissionState, ProbeError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::new(
                ProbeErrorKind::TimedOut,
                format!("no answer from the OS within {}ms", self.timeout.as_millis()),
            )),
        }
    }
}
