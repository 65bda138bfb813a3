//! PnpSolver trait - geometry library boundary

use crate::{ContractError, Point2, Point3};

/// Pinhole camera intrinsics (no distortion)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Approximate intrinsics from output resolution:
    /// focal length 0.75 × width, principal point at the centre.
    pub fn from_resolution(width: u32, height: u32) -> Self {
        let focal = 0.75 * width as f64;
        Self {
            fx: focal,
            fy: focal,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }

    /// Row-major 3×3 camera matrix
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }
}

/// Camera-relative pose estimate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Axis-angle rotation (radians)
    pub rotation: [f64; 3],

    /// Translation in model units
    pub translation: [f64; 3],
}

/// Perspective-n-point solver
pub trait PnpSolver: Send + Sync {
    /// Recover the pose mapping `model` points onto pixel `image` points
    ///
    /// # Errors
    /// `ContractError::PnpSolve` if the correspondences are insufficient or
    /// the solve does not converge.
    fn solve(
        &self,
        model: &[Point3],
        image: &[Point2],
        intrinsics: &CameraIntrinsics,
    ) -> Result<Pose, ContractError>;
}
