//! Capture orchestration
//!
//! - `CaptureCoordinator` drives a request from probe to saved file
//! - `state` holds the state machine and the snapshot types UIs render

pub mod coordinator;
pub mod state;

pub use coordinator::{CaptureBackends, CaptureCoordinator, CaptureEvent};
pub use state::{
    CaptureMode, CaptureOptions, CaptureRequest, CaptureResult, CaptureState, Remediation,
    StatusSnapshot,
};
