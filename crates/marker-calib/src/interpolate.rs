//! Homography-based chessboard-corner interpolation for hybrid boards.

use crate::backend::{ChessboardCorners, CornerInterpolator};
use crate::board::HybridBoard;
use marker_calib_core::{CameraParams, FrameImage, Homography, MarkerObservation};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn default_min_markers() -> usize {
    1
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterpolatorParams {
    /// Board markers required before a homography is fitted.
    #[serde(default = "default_min_markers")]
    pub min_markers: usize,
    /// Projected corners closer than this to the image border are dropped.
    #[serde(default)]
    pub border_px: f32,
}

impl Default for InterpolatorParams {
    fn default() -> Self {
        Self {
            min_markers: default_min_markers(),
            border_px: 0.0,
        }
    }
}

/// Predict inner chessboard corners from the detected markers of a frame.
///
/// Marker corners are undistorted with the current intrinsics, a single
/// board-plane to image homography is fitted from all markers that belong to
/// the board, and every inner corner touching a detected marker is projected
/// and redistorted. When the intrinsics have no usable focal length the fit
/// runs directly in pixel space.
#[derive(Clone, Copy, Debug, Default)]
pub struct HomographyInterpolator {
    pub params: InterpolatorParams,
}

impl HomographyInterpolator {
    pub fn new(params: InterpolatorParams) -> Self {
        Self { params }
    }
}

impl CornerInterpolator for HomographyInterpolator {
    fn interpolate(
        &self,
        markers: &[MarkerObservation],
        image: &FrameImage,
        board: &HybridBoard,
        camera: &CameraParams,
    ) -> ChessboardCorners {
        let normalize = camera.has_valid_focal();
        let to_plane = |p: Point2<f32>| {
            if normalize {
                camera.pixel_to_normalized(p)
            } else {
                Point2::new(p.x as f64, p.y as f64)
            }
        };
        let to_pixel = |p: Point2<f64>| {
            if normalize {
                camera.normalized_to_pixel(p)
            } else {
                Point2::new(p.x as f32, p.y as f32)
            }
        };

        let mut board_pts = Vec::with_capacity(markers.len() * 4);
        let mut image_pts = Vec::with_capacity(markers.len() * 4);
        let mut touched = BTreeSet::new();
        let mut used = 0usize;
        for marker in markers {
            let Some(object) = board.marker_object_corners(marker.id) else {
                continue;
            };
            used += 1;
            for (obj, px) in object.iter().zip(marker.corners.iter()) {
                board_pts.push(Point2::new(obj.x as f64, obj.y as f64));
                image_pts.push(to_plane(*px));
            }
            touched.extend(board.marker_adjacent_corners(marker.id));
        }
        if used == 0 || used < self.params.min_markers {
            return ChessboardCorners::default();
        }

        let Some(h) = Homography::estimate(&board_pts, &image_pts) else {
            log::debug!("homography fit failed for {used} markers");
            return ChessboardCorners::default();
        };

        let size = image.size();
        let border = self.params.border_px.max(0.0);
        let inside = |p: Point2<f32>| {
            p.x.is_finite()
                && p.y.is_finite()
                && p.x >= border
                && p.y >= border
                && p.x < size.width as f32 - border
                && p.y < size.height as f32 - border
        };

        let mut out = ChessboardCorners::default();
        for id in touched {
            let Some(xy) = board.corner_object_xy(id) else {
                continue;
            };
            let p = to_pixel(h.apply(Point2::new(xy.x as f64, xy.y as f64)));
            if inside(p) {
                out.corners.push(p);
                out.ids.push(id);
            }
        }
        out
    }
}
