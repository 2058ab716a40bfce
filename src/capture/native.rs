//! Native display enumeration and still capture using the `xcap` crate.
//!
//! xcap calls block, so both operations run on the blocking pool. Monitors
//! are re-resolved by ID at capture time instead of being held across calls.
//! Without the `native-capture` feature every call fails with a
//! `CaptureFailed` explaining that the backend was not compiled in.

use super::traits::{DisplayInfo, DisplaySource, RawImage, ScreenCapturer};
use crate::utils::error::CaptureError;
use async_trait::async_trait;

/// OS screen backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeScreen;

#[async_trait]
impl DisplaySource for NativeScreen {
    async fn list(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        tokio::task::spawn_blocking(list_monitors)
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("display enumeration task failed: {}", e)))?
    }
}

#[async_trait]
impl ScreenCapturer for NativeScreen {
    async fn capture(&self, display: &DisplayInfo) -> Result<RawImage, CaptureError> {
        let display = display.clone();
        tokio::task::spawn_blocking(move || capture_monitor(&display))
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("capture task failed: {}", e)))?
    }
}

#[cfg(feature = "native-capture")]
fn list_monitors() -> Result<Vec<DisplayInfo>, CaptureError> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| classify(format!("failed to enumerate monitors: {}", e)))?;

    let mut displays = Vec::with_capacity(monitors.len());
    for (index, monitor) in monitors.iter().enumerate() {
        let id = monitor.id().map_err(|e| classify(e.to_string()))?;
        let width = monitor.width().map_err(|e| classify(e.to_string()))?;
        let height = monitor.height().map_err(|e| classify(e.to_string()))?;
        let scale = monitor.scale_factor().unwrap_or(1.0);
        let is_primary = monitor.is_primary().unwrap_or(false);

        let name = if is_primary {
            "Main Display".to_string()
        } else {
            monitor
                .name()
                .unwrap_or_else(|_| format!("Display {}", index + 1))
        };

        displays.push(DisplayInfo {
            id,
            name,
            width: native_pixels(width, scale),
            height: native_pixels(height, scale),
            is_primary,
        });
    }

    tracing::debug!("Enumerated {} display(s)", displays.len());
    Ok(displays)
}

#[cfg(feature = "native-capture")]
fn capture_monitor(display: &DisplayInfo) -> Result<RawImage, CaptureError> {
    let monitor = xcap::Monitor::all()
        .map_err(|e| classify(format!("failed to enumerate monitors: {}", e)))?
        .into_iter()
        .find(|m| m.id().map(|id| id == display.id).unwrap_or(false))
        .ok_or_else(|| {
            CaptureError::CaptureFailed(format!("display {} is no longer connected", display.id))
        })?;

    let image = monitor.capture_image().map_err(|e| classify(e.to_string()))?;
    let (width, height) = image.dimensions();

    Ok(RawImage::new(width, height, image.into_raw()))
}

/// macOS reports monitor bounds in points; captures come back in pixels.
#[cfg(feature = "native-capture")]
fn native_pixels(logical: u32, scale: f32) -> u32 {
    if cfg!(target_os = "macos") {
        (logical as f32 * scale).round() as u32
    } else {
        logical
    }
}

/// Tell a revoked grant apart from any other OS failure
#[cfg(feature = "native-capture")]
fn classify(detail: String) -> CaptureError {
    #[cfg(target_os = "macos")]
    {
        if !super::macos::has_screen_recording_permission() {
            return CaptureError::PermissionDenied(detail);
        }
    }

    CaptureError::CaptureFailed(detail)
}

#[cfg(not(feature = "native-capture"))]
fn unavailable() -> CaptureError {
    CaptureError::CaptureFailed(
        "quicksnap was built without the `native-capture` feature".to_string(),
    )
}

#[cfg(not(feature = "native-capture"))]
fn list_monitors() -> Result<Vec<DisplayInfo>, CaptureError> {
    Err(unavailable())
}

#[cfg(not(feature = "native-capture"))]
fn capture_monitor(_display: &DisplayInfo) -> Result<RawImage, CaptureError> {
    Err(unavailable())
}
