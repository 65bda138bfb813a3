//! Translation-only perspective-n-point solver.
//!
//! Assumes identity rotation and solves the pinhole projection for the
//! translation by linear least squares. Each correspondence contributes two
//! rows:
//!
//! fx·tx − (u − cx)·tz = (u − cx)·Z − fx·X
//! fy·ty − (v − cy)·tz = (v − cy)·Z − fy·Y

use contracts::{CameraIntrinsics, ContractError, PnpSolver, Point2, Point3, Pose};
use nalgebra::{DMatrix, DVector};

const RANK_EPS: f64 = 1e-9;

/// Linear least-squares translation solver (rotation fixed to identity)
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationPnp;

impl PnpSolver for TranslationPnp {
    fn solve(
        &self,
        model: &[Point3],
        image: &[Point2],
        intrinsics: &CameraIntrinsics,
    ) -> Result<Pose, ContractError> {
        if model.len() != image.len() {
            return Err(ContractError::pnp_solve(format!(
                "correspondence mismatch: {} model vs {} image points",
                model.len(),
                image.len()
            )));
        }
        if model.len() < 2 {
            return Err(ContractError::pnp_solve(format!(
                "need at least 2 correspondences, got {}",
                model.len()
            )));
        }

        let rows = model.len() * 2;
        let mut a = DMatrix::<f64>::zeros(rows, 3);
        let mut b = DVector::<f64>::zeros(rows);
        for (i, (m, p)) in model.iter().zip(image).enumerate() {
            let du = p.x - intrinsics.cx;
            let dv = p.y - intrinsics.cy;

            a[(2 * i, 0)] = intrinsics.fx;
            a[(2 * i, 2)] = -du;
            b[2 * i] = du * m.z - intrinsics.fx * m.x;

            a[(2 * i + 1, 1)] = intrinsics.fy;
            a[(2 * i + 1, 2)] = -dv;
            b[2 * i + 1] = dv * m.z - intrinsics.fy * m.y;
        }

        let svd = a.svd(true, true);
        if svd.rank(RANK_EPS) < 3 {
            return Err(ContractError::pnp_solve("degenerate correspondences"));
        }
        let t = svd
            .solve(&b, RANK_EPS)
            .map_err(|e| ContractError::pnp_solve(e.to_string()))?;

        if t.iter().any(|v| !v.is_finite()) {
            return Err(ContractError::pnp_solve("non-finite translation"));
        }

        Ok(Pose {
            rotation: [0.0; 3],
            translation: [t[0], t[1], t[2]],
        })
    }
}

/// Pinhole projection of `point` after translating by `translation`
pub fn project(point: &Point3, translation: [f64; 3], intrinsics: &CameraIntrinsics) -> Point2 {
    let x = point.x + translation[0];
    let y = point.y + translation[1];
    let z = point.z + translation[2];
    Point2 {
        x: intrinsics.fx * x / z + intrinsics.cx,
        y: intrinsics.fy * y / z + intrinsics.cy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_like() -> Vec<Point3> {
        (0..21)
            .map(|i| {
                let f = i as f64;
                Point3::new(0.01 * (f % 5.0) - 0.02, 0.008 * (f / 5.0).floor() - 0.03, 0.004 * (f % 3.0))
            })
            .collect()
    }

    #[test]
    fn test_recovers_known_translation() {
        let k = CameraIntrinsics::from_resolution(640, 480);
        let truth = [0.05, -0.02, 0.6];
        let model = hand_like();
        let image: Vec<_> = model.iter().map(|m| project(m, truth, &k)).collect();

        let pose = TranslationPnp.solve(&model, &image, &k).unwrap();
        for (got, want) in pose.translation.iter().zip(truth) {
            assert!((got - want).abs() < 1e-6, "got {got} want {want}");
        }
        assert_eq!(pose.rotation, [0.0; 3]);
    }

    #[test]
    fn test_rejects_too_few_points() {
        let k = CameraIntrinsics::from_resolution(320, 240);
        let err = TranslationPnp
            .solve(&[Point3::default()], &[Point2::default()], &k)
            .unwrap_err();
        assert!(matches!(err, ContractError::PnpSolve { .. }));
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let k = CameraIntrinsics::from_resolution(320, 240);
        let model = hand_like();
        assert!(TranslationPnp.solve(&model, &[Point2::default()], &k).is_err());
    }

    #[test]
    fn test_rejects_degenerate_points() {
        // Every correspondence at the principal point: tz is unconstrained
        let k = CameraIntrinsics::from_resolution(320, 240);
        let model = vec![Point3::default(); 4];
        let image = vec![Point2 { x: 160.0, y: 120.0 }; 4];
        assert!(TranslationPnp.solve(&model, &image, &k).is_err());
    }
}
