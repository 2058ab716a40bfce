//! Screen capture and capture authorization
//!
//! Traits for display enumeration and still capture, the permission probe,
//! and the native backends behind them.

pub mod native;
pub mod permissions;
pub mod platform;
pub mod traits;

#[cfg(target_os = "macos")]
pub mod macos;

pub use native::NativeScreen;
pub use permissions::{
    Capability, PermissionBackend, PermissionProbe, PermissionSnapshot, PermissionState,
    ProbeError, ProbeErrorKind, RemediationTarget,
};
pub use platform::SystemPermissions;
pub use traits::{DisplayInfo, DisplaySource, RawImage, ScreenCapturer};
