//! Planar homography estimation (normalised DLT).

use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

/// Projective map `dst ~ H * src` between two planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Estimate H from `src.len() >= 4` correspondences.
    ///
    /// Exactly four points are solved directly; more are solved in the
    /// least-squares sense via SVD. Returns `None` for mismatched inputs or a
    /// degenerate configuration.
    pub fn estimate(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Self> {
        if src.len() != dst.len() || src.len() < 4 {
            return None;
        }
        if src.len() == 4 {
            return from_4pt(src, dst);
        }

        let (s, ts) = normalize_points(src);
        let (d, td) = normalize_points(dst);

        let n = src.len();
        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for k in 0..n {
            let (x, y) = (s[k].x, s[k].y);
            let (u, v) = (d[k].x, d[k].y);

            a[(2 * k, 0)] = -x;
            a[(2 * k, 1)] = -y;
            a[(2 * k, 2)] = -1.0;
            a[(2 * k, 6)] = u * x;
            a[(2 * k, 7)] = u * y;
            a[(2 * k, 8)] = u;

            a[(2 * k + 1, 3)] = -x;
            a[(2 * k + 1, 4)] = -y;
            a[(2 * k + 1, 5)] = -1.0;
            a[(2 * k + 1, 6)] = v * x;
            a[(2 * k + 1, 7)] = v * y;
            a[(2 * k + 1, 8)] = v;
        }

        // Null vector of A: last row of V^T.
        let svd = a.svd(false, true);
        let vt = svd.v_t?;
        let last = vt.nrows().checked_sub(1)?;
        let h = vt.row(last);
        let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

        denormalize(hn, ts, td).map(Self::new)
    }
}

fn from_4pt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    // Unknowns h11..h32 with h33 = 1.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        let (x, y) = (s[k].x, s[k].y);
        let (u, v) = (d[k].x, d[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = r0 + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    denormalize(hn, ts, td).map(Homography::new)
}

/// Hartley normalisation: centroid to origin, mean distance sqrt(2).
fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let (mut cx, mut cy) = (0.0, 0.0);
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let out = pts
        .iter()
        .map(|p| Point2::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    (out, t)
}

fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let h = t_dst.try_inverse()? * hn * t_src;
    let w = h[(2, 2)];
    if w.abs() < 1e-12 || !w.is_finite() {
        return None;
    }
    Some(h / w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ground_truth() -> Homography {
        Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ))
    }

    fn assert_maps_like(a: &Homography, b: &Homography, probes: &[Point2<f64>]) {
        for &p in probes {
            let (qa, qb) = (a.apply(p), b.apply(p));
            assert_relative_eq!(qa.x, qb.x, epsilon = 1e-6);
            assert_relative_eq!(qa.y, qb.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn four_points_recover_h() {
        let gt = ground_truth();
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(180.0, 130.0),
            Point2::new(0.0, 130.0),
        ];
        let dst: Vec<_> = src.iter().map(|&p| gt.apply(p)).collect();
        let h = Homography::estimate(&src, &dst).expect("estimate");
        assert_maps_like(&h, &gt, &[Point2::new(60.0, 40.0), Point2::new(150.0, 120.0)]);
    }

    #[test]
    fn overdetermined_grid_recovers_h() {
        let gt = ground_truth();
        let src: Vec<Point2<f64>> = (0..3)
            .flat_map(|y| (0..4).map(move |x| Point2::new(x as f64 * 40.0, y as f64 * 50.0)))
            .collect();
        let dst: Vec<_> = src.iter().map(|&p| gt.apply(p)).collect();
        let h = Homography::estimate(&src, &dst).expect("estimate");
        assert_maps_like(&h, &gt, &[Point2::new(10.0, 90.0), Point2::new(75.0, 20.0)]);
    }

    #[test]
    fn inverse_round_trips() {
        let gt = ground_truth();
        let inv = gt.inverse().expect("invertible");
        let p = Point2::new(50.0, -20.0);
        let back = inv.apply(gt.apply(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-6);
    }

    #[test]
    fn rejects_mismatched_or_short_input() {
        let pts = [Point2::new(0.0, 0.0); 4];
        assert!(Homography::estimate(&pts, &pts[..3]).is_none());
        assert!(Homography::estimate(&pts[..3], &pts[..3]).is_none());
    }
}
