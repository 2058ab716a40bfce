//! Capture trait definitions
//!
//! Platform-agnostic seams for display enumeration and still capture.

use crate::utils::error::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Information about a display/screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// Unique display ID
    pub id: u32,

    /// Display name
    pub name: String,

    /// Width in native pixels
    pub width: u32,

    /// Height in native pixels
    pub height: u32,

    /// Whether the OS reports this as the primary display
    pub is_primary: bool,
}

impl DisplayInfo {
    pub fn new(id: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            name: format!("Display {}", id),
            width,
            height,
            is_primary: false,
        }
    }
}

/// A captured frame, tightly packed RGBA8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    /// Image of the given size filled with one color
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut rgba = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            rgba.extend_from_slice(&color);
        }
        Self { width, height, rgba }
    }

    /// Byte length a well-formed buffer of this size must have
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn matches(&self, display: &DisplayInfo) -> bool {
        self.width == display.width && self.height == display.height
    }
}

/// Lists capturable displays at call time.
///
/// Results are never cached by callers: displays may come and go between a
/// permission probe and a capture.
#[async_trait]
pub trait DisplaySource: Send + Sync {
    /// Displays in OS order. The first entry is the single-display target.
    async fn list(&self) -> Result<Vec<DisplayInfo>, CaptureError>;
}

/// Acquires one still image of a display.
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    /// Capture `display`; the image must be exactly `width x height`.
    ///
    /// Authorization revoked since the last probe should surface as
    /// `CaptureError::PermissionDenied` when the backend can tell.
    async fn capture(&self, display: &DisplayInfo) -> Result<RawImage, CaptureError>;
}
