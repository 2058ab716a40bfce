//! QuickSnap - hotkey-triggered full-screen captures, saved as timestamped PNGs.
//!
//! This is the core library: permission probing, display capture, atomic
//! file output and the coordinator that sequences them. Hotkey registration
//! and notification delivery live in the host application and plug in
//! through the `Notifier` trait.

pub mod capture;
pub mod config;
pub mod notify;
pub mod orchestrator;
pub mod storage;
pub mod utils;

use capture::{NativeScreen, SystemPermissions};
use config::AppConfig;
use notify::{LogNotifier, Notifier};
use orchestrator::{CaptureBackends, CaptureCoordinator};
use std::sync::Arc;
use storage::FileSink;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// OS backends for the running platform, with notifications going to the log
pub fn native_backends() -> CaptureBackends {
    native_backends_with(Arc::new(LogNotifier))
}

pub fn native_backends_with(notifier: Arc<dyn Notifier>) -> CaptureBackends {
    let screen = Arc::new(NativeScreen);
    CaptureBackends {
        permissions: Arc::new(SystemPermissions),
        displays: screen.clone(),
        capturer: screen,
        notifier,
    }
}

/// Wire a coordinator from configuration
pub fn build_coordinator(config: &AppConfig) -> CaptureCoordinator {
    build_coordinator_with(config, native_backends())
}

pub fn build_coordinator_with(config: &AppConfig, backends: CaptureBackends) -> CaptureCoordinator {
    tracing::info!("Starting QuickSnap v{}", env!("CARGO_PKG_VERSION"));
    CaptureCoordinator::new(
        backends,
        FileSink::new(config.sink_options()),
        config.capture_options(),
    )
}
