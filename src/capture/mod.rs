//! Capture lifecycle: reducer, driver and output paths.

mod paths;
mod session;
pub mod state_machine;

pub use paths::OutputPaths;
pub use session::{CaptureSession, StopOutcome};
pub use state_machine::{ActiveCapture, CaptureStatus};
