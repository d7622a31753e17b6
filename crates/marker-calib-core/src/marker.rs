use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four marker corners in image pixels.
///
/// Order is fixed: top-left, top-right, bottom-right, bottom-left in the
/// marker's own frame, matching the board layout and pose solver convention.
pub type Quad = [Point2<f32>; 4];

/// One decoded marker in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub id: i32,
    pub corners: Quad,
}

impl MarkerObservation {
    pub fn new(id: i32, corners: Quad) -> Self {
        Self { id, corners }
    }

    /// Signed-area magnitude of the quad in square pixels (shoelace formula).
    pub fn area(&self) -> f32 {
        let c = &self.corners;
        let mut acc = 0.0_f32;
        for k in 0..4 {
            let p = c[k];
            let q = c[(k + 1) % 4];
            acc += p.x * q.y - q.x * p.y;
        }
        0.5 * acc.abs()
    }
}

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build from the `(rows, cols)` order used by row-major image buffers.
    pub fn from_rows_cols(rows: u32, cols: u32) -> Self {
        Self {
            width: cols,
            height: rows,
        }
    }

    #[inline]
    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.width as f32 && p.y < self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_of_axis_aligned_square() {
        let m = MarkerObservation::new(
            3,
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
        );
        assert_eq!(m.area(), 100.0);
    }

    #[test]
    fn rows_cols_map_to_height_width() {
        let s = ImageSize::from_rows_cols(480, 640);
        assert_eq!(s, ImageSize::new(640, 480));
        assert!(s.contains(Point2::new(639.5, 0.0)));
        assert!(!s.contains(Point2::new(640.0, 10.0)));
    }
}
