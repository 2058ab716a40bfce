//! Screenshot storage
//!
//! Directory resolution, collision-free naming and atomic PNG writes.

pub mod naming;
pub mod sink;

pub use naming::{Clock, SystemClock, TimestampStyle};
pub use sink::{default_fallback_root, encode_png, CollisionPolicy, FileSink, SaveTarget, SinkOptions};
