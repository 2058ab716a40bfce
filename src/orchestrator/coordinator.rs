//! Capture coordinator
//!
//! Runs one screenshot request at a time through probe, enumerate, capture
//! and save, publishing every state change on a broadcast channel. The state
//! lock is never held across an await.

use super::state::{
    CaptureMode, CaptureOptions, CaptureRequest, CaptureResult, CaptureState, Remediation,
    StatusSnapshot,
};
use crate::capture::permissions::{
    PermissionBackend, PermissionProbe, PermissionSnapshot, PermissionState, RemediationTarget,
};
use crate::capture::traits::{DisplayInfo, DisplaySource, RawImage, ScreenCapturer};
use crate::notify::{self, Notification, Notifier};
use crate::storage::naming;
use crate::storage::FileSink;
use crate::utils::error::{CaptureError, ErrorKind, Stage};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Events emitted by the coordinator
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Pipeline moved to a new state
    StateChanged(CaptureState),
    /// A probe round finished
    PermissionsChanged(PermissionSnapshot),
}

/// OS-facing collaborators
#[derive(Clone)]
pub struct CaptureBackends {
    pub permissions: Arc<dyn PermissionBackend>,
    pub displays: Arc<dyn DisplaySource>,
    pub capturer: Arc<dyn ScreenCapturer>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Default)]
struct Inner {
    state: CaptureState,
    last_result: Option<CaptureResult>,
    remediation: Option<Remediation>,
    capture_count: u64,
    last_capture_at: Option<DateTime<Utc>>,
}

/// Owns the capture lifecycle
pub struct CaptureCoordinator {
    probe: PermissionProbe,
    displays: Arc<dyn DisplaySource>,
    capturer: Arc<dyn ScreenCapturer>,
    notifier: Arc<dyn Notifier>,
    sink: Arc<FileSink>,
    options: CaptureOptions,
    inner: Mutex<Inner>,
    cancel_requested: AtomicBool,
    pending_notifications: Mutex<Vec<JoinHandle<()>>>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureCoordinator {
    pub fn new(backends: CaptureBackends, sink: FileSink, options: CaptureOptions) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let probe = PermissionProbe::new(
            backends.permissions,
            options.probe_timeout,
            options.permission_max_age,
        );

        Self {
            probe,
            displays: backends.displays,
            capturer: backends.capturer,
            notifier: backends.notifier,
            sink: Arc::new(sink),
            options,
            inner: Mutex::new(Inner::default()),
            cancel_requested: AtomicBool::new(false),
            pending_notifications: Mutex::new(Vec::new()),
            event_tx,
        }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn state(&self) -> CaptureState {
        self.inner.lock().state.clone()
    }

    pub fn permissions(&self) -> PermissionSnapshot {
        self.probe.current()
    }

    /// Subscribe to state and permission events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> StatusSnapshot {
        let permissions = self.probe.current();
        let inner = self.inner.lock();
        StatusSnapshot {
            state: inner.state.clone(),
            permissions,
            last_result: inner.last_result.clone(),
            remediation: inner.remediation,
            capture_count: inner.capture_count,
            last_capture_at: inner.last_capture_at,
        }
    }

    /// Take a screenshot with the configured defaults
    pub async fn capture(&self) -> CaptureResult {
        self.capture_with(CaptureRequest::default()).await
    }

    pub async fn capture_with(&self, request: CaptureRequest) -> CaptureResult {
        if let Err(e) = self.begin() {
            return CaptureResult::failed(Stage::Request, &e);
        }

        let result = self.run(&request).await;
        self.finish(result)
    }

    /// Re-probe authorization without capturing (e.g. after the user
    /// returns from the settings pane)
    pub async fn recheck(&self) -> Result<PermissionSnapshot, CaptureError> {
        self.begin()?;

        self.probe.invalidate();
        let snapshot = self.probe.refresh().await;
        let _ = self.event_tx.send(CaptureEvent::PermissionsChanged(snapshot.clone()));
        let _ = self.apply_permissions(&snapshot);

        self.set_state(CaptureState::Idle);
        Ok(snapshot)
    }

    /// Wait for notifications dispatched so far. Short-lived hosts (the CLI)
    /// call this before the runtime shuts down.
    pub async fn flush_notifications(&self) {
        let pending: Vec<JoinHandle<()>> = self.pending_notifications.lock().drain(..).collect();
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::warn!("Notification task failed: {}", e);
            }
        }
    }

    /// Ask the in-flight request to stop. Only honored before the capture
    /// call is issued; returns whether a request was in flight.
    pub fn cancel(&self) -> bool {
        let inner = self.inner.lock();
        if inner.state.accepts_request() {
            return false;
        }
        tracing::info!("Cancellation requested while {}", inner.state.name());
        self.cancel_requested.store(true, Ordering::SeqCst);
        true
    }

    fn begin(&self) -> Result<(), CaptureError> {
        {
            let mut inner = self.inner.lock();
            if !inner.state.accepts_request() {
                tracing::warn!("Rejecting request while {}", inner.state.name());
                return Err(CaptureError::Busy);
            }
            inner.state = CaptureState::Probing;
            self.cancel_requested.store(false, Ordering::SeqCst);
        }

        let _ = self.event_tx.send(CaptureEvent::StateChanged(CaptureState::Probing));
        Ok(())
    }

    async fn run(&self, request: &CaptureRequest) -> CaptureResult {
        let permissions = self.probe.ensure_fresh().await;
        let _ = self.event_tx.send(CaptureEvent::PermissionsChanged(permissions.clone()));
        if let Some(blocked) = self.apply_permissions(&permissions) {
            return blocked;
        }
        if self.cancelled() {
            return CaptureResult::Cancelled;
        }

        let displays = match self.list_displays().await {
            Ok(displays) => displays,
            Err(e) => return self.fail(Stage::Enumerate, e),
        };
        let targets: Vec<DisplayInfo> = match request.mode.unwrap_or(self.options.mode) {
            CaptureMode::Primary => displays.into_iter().take(1).collect(),
            CaptureMode::AllDisplays => displays,
        };

        // Last exit: the capture call below always runs to completion
        if self.cancelled() {
            return CaptureResult::Cancelled;
        }

        self.set_state(CaptureState::Capturing);
        let mut images = Vec::with_capacity(targets.len());
        for display in &targets {
            match self.capture_display(display).await {
                Ok(image) => images.push(image),
                Err(e) => return self.fail(Stage::Capture, e),
            }
        }

        self.set_state(CaptureState::Saving);
        let preferred = request
            .preferred_dir
            .clone()
            .or_else(|| self.options.preferred_dir.clone());
        match self.save_all(images, preferred).await {
            Ok(paths) => CaptureResult::Success { paths },
            Err(e) => {
                let stage = if e.kind() == ErrorKind::EncodeFailed {
                    Stage::Encode
                } else {
                    Stage::Save
                };
                self.fail(stage, e)
            }
        }
    }

    /// Publish `Ready` or `Blocked`; returns the failure when blocked
    fn apply_permissions(&self, permissions: &PermissionSnapshot) -> Option<CaptureResult> {
        if !permissions.can_capture() {
            let detail = permissions
                .screen_error
                .as_ref()
                .map(|e| e.detail.clone())
                .unwrap_or_else(|| format!("screen recording is {:?}", permissions.screen_recording));
            tracing::warn!("Capture blocked: {}", detail);

            self.inner.lock().remediation = Some(Remediation {
                target: RemediationTarget::ScreenRecording,
                blocking: true,
            });
            self.set_state(CaptureState::Blocked(RemediationTarget::ScreenRecording));
            return Some(CaptureResult::failed(
                Stage::Probe,
                &CaptureError::PermissionDenied(detail),
            ));
        }

        self.inner.lock().remediation = if permissions.notifications == PermissionState::Denied {
            Some(Remediation {
                target: RemediationTarget::Notifications,
                blocking: false,
            })
        } else {
            None
        };
        self.set_state(CaptureState::Ready);
        None
    }

    async fn list_displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        let timeout = self.options.capture_timeout;
        let displays = tokio::time::timeout(timeout, self.displays.list())
            .await
            .map_err(|_| {
                CaptureError::CaptureFailed(format!(
                    "display enumeration did not finish within {}ms",
                    timeout.as_millis()
                ))
            })??;

        if displays.is_empty() {
            return Err(CaptureError::NoDisplay);
        }
        tracing::debug!("{} display(s) available", displays.len());
        Ok(displays)
    }

    async fn capture_display(&self, target: &DisplayInfo) -> Result<RawImage, CaptureError> {
        tracing::info!(
            "Capturing display {} ({}x{})",
            target.id,
            target.width,
            target.height
        );

        let timeout = self.options.capture_timeout;
        let image = tokio::time::timeout(timeout, self.capturer.capture(target))
            .await
            .map_err(|_| {
                CaptureError::CaptureFailed(format!(
                    "display {} did not respond within {}ms",
                    target.id,
                    timeout.as_millis()
                ))
            })??;

        if !image.matches(target) {
            return Err(CaptureError::CaptureFailed(format!(
                "expected a {}x{} image from display {}, got {}x{} ({} bytes)",
                target.width,
                target.height,
                target.id,
                image.width,
                image.height,
                image.rgba.len()
            )));
        }
        Ok(image)
    }

    /// Encode and write every image on the blocking pool. Files already
    /// written are removed if a later one fails.
    ///
    /// The blocking job cannot be cancelled, so a timeout marks it abandoned
    /// and waits for it: nothing it wrote survives and no writer outlives
    /// the request.
    async fn save_all(
        &self,
        images: Vec<RawImage>,
        preferred: Option<PathBuf>,
    ) -> Result<Vec<PathBuf>, CaptureError> {
        let sink = self.sink.clone();
        let abandoned = Arc::new(AtomicBool::new(false));
        let flag = abandoned.clone();

        let mut job = tokio::task::spawn_blocking(move || {
            let base = sink.options().prefix.clone();
            let several = images.len() > 1;
            let mut saved: Vec<PathBuf> = Vec::with_capacity(images.len());

            for (index, image) in images.iter().enumerate() {
                let prefix = if several {
                    naming::display_prefix(&base, index)
                } else {
                    base.clone()
                };

                match sink.save_with_prefix(image, &prefix, preferred.as_deref()) {
                    Ok(target) => saved.push(target.path()),
                    Err(e) => {
                        remove_saved(&saved);
                        return Err(e);
                    }
                }

                if flag.load(Ordering::SeqCst) {
                    remove_saved(&saved);
                    return Err(CaptureError::WriteFailed("save abandoned".to_string()));
                }
            }
            Ok(saved)
        });

        let timeout = self.options.save_timeout;
        match tokio::time::timeout(timeout, &mut job).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(CaptureError::WriteFailed(format!("save task failed: {}", e))),
            Err(_) => {
                abandoned.store(true, Ordering::SeqCst);
                tracing::warn!(
                    "Save exceeded {}ms; waiting for the writer to roll back",
                    timeout.as_millis()
                );

                // The job may have finished between the deadline and the flag
                if let Ok(Ok(paths)) = job.await {
                    remove_saved(&paths);
                }
                Err(CaptureError::WriteFailed(format!(
                    "save did not finish within {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    fn fail(&self, stage: Stage, error: CaptureError) -> CaptureResult {
        if error.is_authorization() {
            // Grant was revoked after the probe said yes
            self.probe.invalidate();
            self.inner.lock().remediation = Some(Remediation {
                target: RemediationTarget::ScreenRecording,
                blocking: true,
            });
        }
        CaptureResult::failed(stage, &error)
    }

    fn finish(&self, result: CaptureResult) -> CaptureResult {
        {
            let mut inner = self.inner.lock();
            if result.is_success() {
                inner.capture_count += 1;
                inner.last_capture_at = Some(Utc::now());
            }
            inner.last_result = Some(result.clone());
        }
        self.set_state(CaptureState::Done(result.clone()));

        match &result {
            CaptureResult::Success { paths } => {
                tracing::info!("Capture complete: {} file(s)", paths.len());
            }
            CaptureResult::Cancelled => tracing::info!("Capture cancelled"),
            CaptureResult::Failed { stage, kind, detail } => {
                tracing::error!("Capture failed at {:?} ({}): {}", stage, kind.code(), detail);
            }
        }

        self.notify_outcome(&result);
        self.set_state(CaptureState::Idle);
        result
    }

    fn notify_outcome(&self, result: &CaptureResult) {
        if !self.probe.current().can_notify() {
            tracing::debug!("Notifications denied; skipping");
            return;
        }

        let notification = match result {
            CaptureResult::Success { paths } => {
                let names: Vec<String> = paths
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                if names.len() == 1 {
                    Notification::new("Screenshot saved", format!("Saved {}", names[0]))
                } else {
                    Notification::new(
                        "Screenshots saved",
                        format!("Saved {} screenshots: {}", names.len(), names.join(", ")),
                    )
                }
            }
            CaptureResult::Cancelled => return,
            CaptureResult::Failed { kind: ErrorKind::PermissionDenied, .. } => Notification::new(
                "Screenshot failed",
                "Screen recording permission is required. Allow it in System Settings and try again.",
            ),
            CaptureResult::Failed { detail, .. } => Notification::new("Screenshot failed", detail.clone()),
        };

        let handle = notify::dispatch(self.notifier.clone(), notification);
        let mut pending = self.pending_notifications.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn cancelled(&self) -> bool {
        self.cancel_requested.swap(false, Ordering::SeqCst)
    }

    fn set_state(&self, state: CaptureState) {
        tracing::debug!("Capture state -> {}", state.name());
        self.inner.lock().state = state.clone();
        let _ = self.event_tx.send(CaptureEvent::StateChanged(state));
    }
}

fn remove_saved(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to roll back {}: {}", path.display(), e);
        }
    }
}
