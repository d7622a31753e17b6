//! Pinhole camera parameters with Brown-Conrady distortion.

use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

/// Fixed-point iterations used when inverting the distortion model.
const UNDISTORT_MAX_ITERS: usize = 20;
const UNDISTORT_EPS: f64 = 1e-12;

/// Camera intrinsics and distortion coefficients.
///
/// `distortion` follows the OpenCV order `k1, k2, p1, p2, k3, ...`. Only the
/// first five coefficients take part in projection here; any further entries
/// are carried through untouched for the solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    pub matrix: Matrix3<f64>,
    pub distortion: Vec<f64>,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            matrix: Matrix3::identity(),
            distortion: vec![0.0; 5],
        }
    }
}

impl CameraParams {
    pub fn new(matrix: Matrix3<f64>, distortion: Vec<f64>) -> Self {
        Self { matrix, distortion }
    }

    /// Row-major 3x3 matrix plus coefficients, as laid out in foreign buffers.
    pub fn from_row_major(matrix: &[f64; 9], distortion: &[f64]) -> Self {
        Self {
            matrix: Matrix3::from_row_slice(matrix),
            distortion: distortion.to_vec(),
        }
    }

    pub fn matrix_row_major(&self) -> [f64; 9] {
        let m = &self.matrix;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.matrix[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.matrix[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.matrix[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.matrix[(1, 2)]
    }

    #[inline]
    fn coeff(&self, k: usize) -> f64 {
        self.distortion.get(k).copied().unwrap_or(0.0)
    }

    /// True when the matrix is usable for normalisation (finite, non-zero focal).
    pub fn has_valid_focal(&self) -> bool {
        let (fx, fy) = (self.fx(), self.fy());
        fx.is_finite() && fy.is_finite() && fx.abs() > f64::EPSILON && fy.abs() > f64::EPSILON
    }

    /// Apply radial-tangential distortion to normalised coordinates.
    pub fn distort_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        let (k1, k2, p1, p2, k3) = (
            self.coeff(0),
            self.coeff(1),
            self.coeff(2),
            self.coeff(3),
            self.coeff(4),
        );
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r4 * r2;
        let x_tan = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_tan = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        Point2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Self::distort_normalized`] by fixed-point iteration.
    pub fn undistort_normalized(&self, distorted: Point2<f64>) -> Point2<f64> {
        let mut p = distorted;
        for _ in 0..UNDISTORT_MAX_ITERS {
            let d = self.distort_normalized(p);
            let next = Point2::new(p.x + distorted.x - d.x, p.y + distorted.y - d.y);
            if !next.x.is_finite() || !next.y.is_finite() {
                return p;
            }
            let step = (next - p).norm();
            p = next;
            if step < UNDISTORT_EPS {
                break;
            }
        }
        p
    }

    /// Pixel -> undistorted normalised image coordinates.
    pub fn pixel_to_normalized(&self, px: Point2<f32>) -> Point2<f64> {
        let d = Point2::new(
            (px.x as f64 - self.cx()) / self.fx(),
            (px.y as f64 - self.cy()) / self.fy(),
        );
        self.undistort_normalized(d)
    }

    /// Undistorted normalised coordinates -> distorted pixel.
    pub fn normalized_to_pixel(&self, n: Point2<f64>) -> Point2<f32> {
        let d = self.distort_normalized(n);
        Point2::new(
            (self.fx() * d.x + self.cx()) as f32,
            (self.fy() * d.y + self.cy()) as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> CameraParams {
        CameraParams::new(
            Matrix3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0),
            vec![-0.12, 0.03, 0.001, -0.0005, 0.0],
        )
    }

    #[test]
    fn undistort_inverts_distort() {
        let cam = camera();
        let p = Point2::new(0.21, -0.17);
        let back = cam.undistort_normalized(cam.distort_normalized(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn pixel_round_trip() {
        let cam = camera();
        let px = Point2::new(500.0_f32, 100.0);
        let back = cam.normalized_to_pixel(cam.pixel_to_normalized(px));
        assert_relative_eq!(back.x, px.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, px.y, epsilon = 1e-3);
    }

    #[test]
    fn row_major_layout_round_trips() {
        let cam = camera();
        let rm = cam.matrix_row_major();
        assert_eq!(rm[2], 320.0);
        assert_eq!(rm[5], 240.0);
        assert_eq!(CameraParams::from_row_major(&rm, &cam.distortion), cam);
    }

    #[test]
    fn missing_coefficients_mean_no_distortion() {
        let cam = CameraParams::new(Matrix3::identity(), Vec::new());
        let p = Point2::new(0.4, 0.2);
        assert_eq!(cam.distort_normalized(p), p);
        assert!(cam.has_valid_focal());
        assert!(!CameraParams::new(Matrix3::zeros(), Vec::new()).has_valid_focal());
    }
}
