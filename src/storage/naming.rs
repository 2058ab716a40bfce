//! Screenshot file naming
//!
//! Names are `<prefix>_<YYYYMMDD>_<HHMMSS>.png` (local time) or
//! `<prefix>_<epoch seconds>.png`. Second granularity means two captures in
//! the same second share a name; the sink resolves that.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Screenshot file extension
pub const EXTENSION: &str = "png";

/// Source of the timestamp embedded in filenames
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Timestamp format used in filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimestampStyle {
    /// `20240309_140507`
    #[default]
    DateTime,
    /// `1709993107`
    Epoch,
}

pub fn timestamped_filename(prefix: &str, at: &DateTime<Local>, style: TimestampStyle) -> String {
    let stamp = match style {
        TimestampStyle::DateTime => at.format("%Y%m%d_%H%M%S").to_string(),
        TimestampStyle::Epoch => at.timestamp().to_string(),
    };
    format!("{}_{}.{}", prefix, stamp, EXTENSION)
}

/// `shot_1.png` for `shot.png` and `n = 1`
pub fn suffixed(filename: &str, n: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}_{}", filename, n),
    }
}

/// Prefix for one display when several are captured at once (1-based)
pub fn display_prefix(prefix: &str, index: usize) -> String {
    format!("{}_display{}", prefix, index + 1)
}
