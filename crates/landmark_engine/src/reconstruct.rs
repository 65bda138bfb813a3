//! Coordinate Reconstructor
//!
//! Converts one detected entity into camera-relative metric coordinates:
//! normalised image points are scaled to pixels, model points are mirrored
//! through the origin, the PnP solver estimates the pose, and the inverse of
//! the resulting rigid transform is applied to the model points.

use std::sync::Arc;

use contracts::{CameraIntrinsics, ContractError, DetectedEntity, PnpSolver, Point2, Point3, Pose};
use nalgebra::{Isometry3, Point3 as NPoint3, Vector3};

/// Reconstructor options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Ignore the solved rotation and only undo the translation
    pub translation_only: bool,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            translation_only: true,
        }
    }
}

#[derive(Clone)]
pub struct Reconstructor {
    solver: Arc<dyn PnpSolver>,
    options: ReconstructOptions,
}

impl std::fmt::Debug for Reconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Reconstructor {
    pub fn new(solver: Arc<dyn PnpSolver>, options: ReconstructOptions) -> Self {
        Self { solver, options }
    }

    /// World-space points for `entity` observed at `resolution`
    ///
    /// # Errors
    /// `PnpSolve` if the solver fails or the entity has mismatched point lists.
    pub fn reconstruct(
        &self,
        entity: &DetectedEntity,
        resolution: (u32, u32),
    ) -> Result<Vec<Point3>, ContractError> {
        if entity.image_points.len() != entity.model_points.len() {
            return Err(ContractError::pnp_solve(format!(
                "{} image points vs {} model points",
                entity.image_points.len(),
                entity.model_points.len()
            )));
        }

        let (width, height) = (resolution.0 as f64, resolution.1 as f64);
        let intrinsics = CameraIntrinsics::from_resolution(resolution.0, resolution.1);
        let model: Vec<Point3> = entity
            .model_points
            .iter()
            .map(|p| Point3::new(-p.x, -p.y, -p.z))
            .collect();
        let image: Vec<Point2> = entity
            .image_points
            .iter()
            .map(|p| Point2 {
                x: p.x * width,
                y: p.y * height,
            })
            .collect();

        let pose = self.solver.solve(&model, &image, &intrinsics)?;
        let transform = self.transform(&pose);

        Ok(model
            .iter()
            .map(|p| {
                let world = transform.inverse_transform_point(&NPoint3::new(p.x, p.y, p.z));
                Point3::new(world.x, world.y, world.z)
            })
            .collect())
    }

    fn transform(&self, pose: &Pose) -> Isometry3<f64> {
        let translation = Vector3::from(pose.translation);
        let rotation = if self.options.translation_only {
            Vector3::zeros()
        } else {
            Vector3::from(pose.rotation)
        };
        Isometry3::new(translation, rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pnp::{project, TranslationPnp};

    struct FixedPose(Pose);

    impl PnpSolver for FixedPose {
        fn solve(&self, _: &[Point3], _: &[Point2], _: &CameraIntrinsics) -> Result<Pose, ContractError> {
            Ok(self.0)
        }
    }

    struct Failing;

    impl PnpSolver for Failing {
        fn solve(&self, _: &[Point3], _: &[Point2], _: &CameraIntrinsics) -> Result<Pose, ContractError> {
            Err(ContractError::pnp_solve("no convergence"))
        }
    }

    fn assert_close(a: Point3, b: Point3) {
        for (x, y) in a.to_array().iter().zip(b.to_array()) {
            assert!((x - y).abs() < 1e-12, "{a:?} != {b:?}");
        }
    }

    fn entity(points: usize) -> DetectedEntity {
        DetectedEntity {
            image_points: vec![Point2 { x: 0.5, y: 0.5 }; points],
            model_points: (0..points).map(|i| Point3::new(i as f64, 1.0, 2.0)).collect(),
        }
    }

    #[test]
    fn test_translation_only_subtracts_translation_from_mirrored_model() {
        let pose = Pose {
            rotation: [0.3, 0.0, 0.0],
            translation: [1.0, 2.0, 3.0],
        };
        let r = Reconstructor::new(Arc::new(FixedPose(pose)), ReconstructOptions::default());
        let out = r.reconstruct(&entity(2), (320, 240)).unwrap();
        assert_close(out[0], Point3::new(-1.0, -3.0, -5.0));
        assert_close(out[1], Point3::new(-2.0, -3.0, -5.0));
    }

    #[test]
    fn test_full_pose_undoes_rotation() {
        let pose = Pose {
            rotation: [0.0, 0.0, std::f64::consts::FRAC_PI_2],
            translation: [0.0, 0.0, 0.0],
        };
        let r = Reconstructor::new(
            Arc::new(FixedPose(pose)),
            ReconstructOptions {
                translation_only: false,
            },
        );
        let e = DetectedEntity {
            image_points: vec![Point2::default()],
            model_points: vec![Point3::new(-1.0, 0.0, 0.0)],
        };
        // Mirrored to (1, 0, 0), then rotated back by -90° about z
        let out = r.reconstruct(&e, (100, 100)).unwrap();
        assert!((out[0].x - 0.0).abs() < 1e-12);
        assert!((out[0].y + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_solver_failure_propagates() {
        let r = Reconstructor::new(Arc::new(Failing), ReconstructOptions::default());
        let err = r.reconstruct(&entity(3), (320, 240)).unwrap_err();
        assert!(matches!(err, ContractError::PnpSolve { .. }));
    }

    #[test]
    fn test_mismatched_entity_is_rejected() {
        let r = Reconstructor::new(Arc::new(TranslationPnp), ReconstructOptions::default());
        let mut e = entity(3);
        e.image_points.pop();
        assert!(r.reconstruct(&e, (320, 240)).is_err());
    }

    #[test]
    fn test_round_trip_with_translation_solver() {
        let (w, h) = (640u32, 480u32);
        let k = CameraIntrinsics::from_resolution(w, h);
        let truth = [0.02, 0.01, 0.5];
        let native: Vec<Point3> = (0..21)
            .map(|i| {
                let f = i as f64;
                Point3::new(0.01 * (f % 4.0), 0.01 * (f / 4.0).floor(), 0.003 * (f % 2.0))
            })
            .collect();
        let image = native
            .iter()
            .map(|p| {
                let px = project(&Point3::new(-p.x, -p.y, -p.z), truth, &k);
                Point2 {
                    x: px.x / w as f64,
                    y: px.y / h as f64,
                }
            })
            .collect();
        let e = DetectedEntity {
            image_points: image,
            model_points: native.clone(),
        };

        let r = Reconstructor::new(Arc::new(TranslationPnp), ReconstructOptions::default());
        let out = r.reconstruct(&e, (w, h)).unwrap();
        for (got, p) in out.iter().zip(&native) {
            assert!((got.x - (-p.x - truth[0])).abs() < 1e-6);
            assert!((got.y - (-p.y - truth[1])).abs() < 1e-6);
            assert!((got.z - (-p.z - truth[2])).abs() < 1e-6);
        }
    }
}
