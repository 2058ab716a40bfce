//! macOS permission handling
//!
//! Reads the Screen Recording (TCC) grant. Preflight never shows a prompt.

use crate::capture::permissions::PermissionState;
use core_graphics::access::ScreenCaptureAccess;

/// Check if screen recording permission is granted
pub fn has_screen_recording_permission() -> bool {
    ScreenCaptureAccess.preflight()
}

/// Screen recording grant as a probe state.
///
/// TCC preflight can't tell "never asked" from "refused", so both come back
/// as `Denied`; either way the user has to visit System Settings.
pub fn screen_recording_state() -> PermissionState {
    if has_screen_recording_permission() {
        PermissionState::Authorized
    } else {
        PermissionState::Denied
    }
}
