//! HTTP capture
//!
//! - [`capture_middleware`]: measures each exchange and builds a [`crate::CaptureEvent`]
//! - [`Recorder`]: non-blocking handoff of events to a background writer

pub mod middleware;
pub mod recorder;

pub use middleware::{capture_middleware, CaptureState};
pub use recorder::{Recorder, RecorderHandle, RecorderStats};
