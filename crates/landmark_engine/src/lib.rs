//! # Landmark Engine
//!
//! Turns detector output into sink-ready landmark coordinates.
//!
//! Responsibilities:
//! - One-euro smoothing, one channel per (entity, point, axis)
//! - Camera-relative reconstruction through a PnP solver
//! - Per-kind detector state: submission guard, result slot, refresh
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use landmark_engine::{DetectorState, MockDetector, OneEuroParams, ReconstructOptions, Reconstructor, TranslationPnp};
//! use contracts::DetectorKind;
//!
//! let detector = Arc::new(MockDetector::with_defaults(DetectorKind::Hands));
//! let reconstructor = Reconstructor::new(Arc::new(TranslationPnp), ReconstructOptions::default());
//! let mut state = DetectorState::new(detector, Some(reconstructor), OneEuroParams::default());
//!
//! state.submit(&frame, 1)?;
//! // Sink 0 asks for smoothing at strength 60
//! if let Some(landmarks) = state.landmarks_for(0, true, 60.0) {
//!     // Send landmarks
//! }
//! ```

mod detector_state;
mod filter_bank;
mod mock;
mod one_euro;
mod pnp;
mod reconstruct;

// Re-exports
pub use detector_state::{DetectorState, ResultSlot};
pub use filter_bank::{Axis, ChannelKey, FilterBank};
pub use mock::{default_script, entity_name, points_per_entity, synthetic_entities, MockDetector};
pub use one_euro::{change_range, smoothing_beta, smoothing_factor, OneEuroParams, OneEuroState};
pub use pnp::{project, TranslationPnp};
pub use reconstruct::{ReconstructOptions, Reconstructor};

use contracts::DetectorKind;

/// Whether `kind` output goes through the reconstructor by default
///
/// Hands are placed in camera space; body and face keep detector model
/// coordinates.
pub fn reconstructs_by_default(kind: DetectorKind) -> bool {
    matches!(kind, DetectorKind::Hands)
}
