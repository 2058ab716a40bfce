//! macOS capture support
//!
//! Screen capture authorization goes through CoreGraphics' TCC preflight.

pub mod permissions;

pub use permissions::*;
