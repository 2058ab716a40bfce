//! Capture state management
//!
//! Defines the capture state machine, per-request results and the status
//! snapshot rendered by UI layers.

use crate::capture::permissions::{PermissionSnapshot, RemediationTarget};
use crate::utils::error::{CaptureError, ErrorKind, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which displays one request captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    /// The first display the OS reports
    #[default]
    Primary,
    /// Every display, one file each
    AllDisplays,
}

/// Current state of the capture pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum CaptureState {
    /// Waiting for a request
    #[default]
    Idle,
    /// Checking capture authorization
    Probing,
    /// Authorized, about to capture
    Ready,
    /// Authorization missing; the UI should offer remediation
    Blocked(RemediationTarget),
    Capturing,
    Saving,
    /// Request finished; moves to `Idle` right after
    Done(CaptureResult),
}

impl CaptureState {
    /// Whether a new request may start from this state
    pub fn accepts_request(&self) -> bool {
        matches!(self, CaptureState::Idle | CaptureState::Done(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Probing => "probing",
            CaptureState::Ready => "ready",
            CaptureState::Blocked(_) => "blocked",
            CaptureState::Capturing => "capturing",
            CaptureState::Saving => "saving",
            CaptureState::Done(_) => "done",
        }
    }
}

/// Outcome of one capture request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CaptureResult {
    /// Saved files; one per captured display
    Success { paths: Vec<PathBuf> },
    Cancelled,
    Failed {
        stage: Stage,
        kind: ErrorKind,
        detail: String,
    },
}

impl CaptureResult {
    pub fn failed(stage: Stage, error: &CaptureError) -> Self {
        match error {
            CaptureError::Cancelled => CaptureResult::Cancelled,
            _ => CaptureResult::Failed {
                stage,
                kind: error.kind(),
                detail: error.detail(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaptureResult::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CaptureResult::Failed { kind, .. } => Some(*kind),
            CaptureResult::Cancelled => Some(ErrorKind::Cancelled),
            CaptureResult::Success { .. } => None,
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        match self {
            CaptureResult::Success { paths } => paths,
            _ => &[],
        }
    }

    /// Path of the first (or only) saved file
    pub fn primary_path(&self) -> Option<&Path> {
        self.paths().first().map(PathBuf::as_path)
    }
}

/// Settings pane the UI should point the user to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remediation {
    pub target: RemediationTarget,
    /// Blocking remediations stop captures; the rest only degrade them
    pub blocking: bool,
}

/// Per-call overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureRequest {
    pub preferred_dir: Option<PathBuf>,
    pub mode: Option<CaptureMode>,
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub mode: CaptureMode,
    pub preferred_dir: Option<PathBuf>,
    pub probe_timeout: Duration,
    /// Bounds display enumeration and each display capture
    pub capture_timeout: Duration,
    pub save_timeout: Duration,
    pub permission_max_age: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Primary,
            preferred_dir: None,
            probe_timeout: Duration::from_secs(5),
            capture_timeout: Duration::from_secs(10),
            save_timeout: Duration::from_secs(10),
            permission_max_age: Duration::from_secs(30),
        }
    }
}

/// Read-only view for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: CaptureState,
    pub permissions: PermissionSnapshot,
    pub last_result: Option<CaptureResult>,
    pub remediation: Option<Remediation>,
    /// Successful captures since startup
    pub capture_count: u64,
    pub last_capture_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Remediation that stops captures; advisory ones are filtered out
    pub fn blocking_remediation(&self) -> Option<Remediation> {
        self.remediation.filter(|r| r.blocking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_idle_and_done_accept_requests() {
        assert!(CaptureState::Idle.accepts_request());
        assert!(CaptureState::Done(CaptureResult::Cancelled).accepts_request());

        for busy in [
            CaptureState::Probing,
            CaptureState::Ready,
            CaptureState::Blocked(RemediationTarget::ScreenRecording),
            CaptureState::Capturing,
            CaptureState::Saving,
        ] {
            assert!(!busy.accepts_request(), "{} should reject", busy.name());
        }
    }

    #[test]
    fn test_cancelled_error_maps_to_cancelled_result() {
        let result = CaptureResult::failed(Stage::Enumerate, &CaptureError::Cancelled);
        assert_eq!(result, CaptureResult::Cancelled);
    }

    #[test]
    fn test_failed_result_keeps_stage_and_kind() {
        let result = CaptureResult::failed(Stage::Save, &CaptureError::WriteFailed("disk full".into()));
        assert_eq!(result.error_kind(), Some(ErrorKind::WriteFailed));
        assert!(result.paths().is_empty());
        match result {
            CaptureResult::Failed { stage, detail, .. } => {
                assert_eq!(stage, Stage::Save);
                assert_eq!(detail, "disk full");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_blocking_remediation_ignores_advisory() {
        let mut status = StatusSnapshot {
            state: CaptureState::Idle,
            permissions: PermissionSnapshot::default(),
            last_result: None,
            remediation: Some(Remediation {
                target: RemediationTarget::Notifications,
                blocking: false,
            }),
            capture_count: 0,
            last_capture_at: None,
        };
        assert_eq!(status.blocking_remediation(), None);

        status.remediation = Some(Remediation {
            target: RemediationTarget::ScreenRecording,
            blocking: true,
        });
        assert_eq!(
            status.blocking_remediation().map(|r| r.target),
            Some(RemediationTarget::ScreenRecording)
        );
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(CaptureState::Blocked(RemediationTarget::ScreenRecording)).unwrap();
        assert_eq!(json["state"], "blocked");
        assert_eq!(json["detail"], "screenRecording");
    }
}
