//! LandmarkDetector trait - detection library boundary
//!
//! Detectors run asynchronously: a frame is submitted with a timestamp and the
//! result arrives later through the registered callback, possibly on another
//! thread.

use std::sync::Arc;

use crate::{ContractError, DetectionResult, DetectorKind, Frame};

/// Completion callback; invoked once per finished detection
pub type DetectionCallback = Arc<dyn Fn(DetectionResult) + Send + Sync>;

/// Asynchronous landmark detector
pub trait LandmarkDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    /// Register the completion callback (replaces any previous one)
    fn listen(&self, callback: DetectionCallback);

    /// Submit a frame for detection; must not block on the detection itself
    ///
    /// # Errors
    /// Returns an error if the detector can no longer accept work.
    fn submit_frame(&self, frame: &Frame, timestamp: u64) -> Result<(), ContractError>;

    /// Release detector resources
    fn stop(&self);
}
