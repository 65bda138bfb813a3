//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Detection timestamps are logical tick counters (`u64`), strictly increasing per detector kind
//! - Frame `seq` numbers are assigned by the acquisition thread and only used for diagnostics

mod detector;
mod error;
mod frame;
mod landmarks;
mod pnp;
mod sink;
mod snapshot;
mod source;
mod tick;
mod transport;

pub use detector::{DetectionCallback, LandmarkDetector};
pub use error::*;
pub use frame::{decode_jpeg, encode_jpeg, Frame, JPEG_QUALITY};
pub use landmarks::*;
pub use pnp::{CameraIntrinsics, PnpSolver, Pose};
pub use sink::*;
pub use snapshot::*;
pub use source::*;
pub use tick::TickReport;
pub use transport::{DatagramTransport, LocalDatagramTransport};
