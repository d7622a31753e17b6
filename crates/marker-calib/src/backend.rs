//! Collaborator seams: marker detection, pose estimation, bulk solves and
//! chessboard-corner interpolation are consumed through these traits.

use crate::board::{BoardGeometry, HybridBoard, PredefinedDictionary};
use crate::flatten::FlattenedObservations;
use marker_calib_core::{
    CameraParams, FrameImage, FrameImageView, ImageSize, MarkerObservation, Quad,
};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Failure reported by a solver collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("solver failed: {message}")]
pub struct SolverError {
    pub message: String,
}

impl SolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Marker pose in the camera frame: Rodrigues rotation and translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

/// Interpolated chessboard corners of one frame, parallel arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChessboardCorners {
    pub corners: Vec<Point2<f32>>,
    pub ids: Vec<u32>,
}

impl ChessboardCorners {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub trait MarkerDetector {
    /// Detect markers of `dictionary` in `image`.
    fn detect(
        &self,
        image: FrameImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Vec<MarkerObservation>;
}

pub trait PoseEstimator {
    /// One pose per quad, index-aligned with `corners`.
    fn estimate_poses(
        &self,
        corners: &[Quad],
        marker_length_m: f64,
        camera: &CameraParams,
    ) -> Vec<MarkerPose>;
}

/// Bulk least-squares intrinsic solves.
///
/// Both methods read `camera` as the initial guess and overwrite it with the
/// solved intrinsics. The returned RMS reprojection error is passed to the
/// caller unchanged.
pub trait CalibrationSolver {
    fn calibrate_markers(
        &self,
        observations: &FlattenedObservations,
        board: &BoardGeometry,
        image_size: ImageSize,
        camera: &mut CameraParams,
    ) -> Result<f64, SolverError>;

    fn calibrate_chessboard(
        &self,
        frames: &[ChessboardCorners],
        board: &HybridBoard,
        image_size: ImageSize,
        camera: &mut CameraParams,
    ) -> Result<f64, SolverError>;
}

pub trait CornerInterpolator {
    /// Chessboard corners of `board` visible in one frame, given its markers.
    fn interpolate(
        &self,
        markers: &[MarkerObservation],
        image: &FrameImage,
        board: &HybridBoard,
        camera: &CameraParams,
    ) -> ChessboardCorners;
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for &T {
    fn detect(
        &self,
        image: FrameImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Vec<MarkerObservation> {
        (**self).detect(image, dictionary)
    }
}

impl<T: PoseEstimator + ?Sized> PoseEstimator for &T {
    fn estimate_poses(
        &self,
        corners: &[Quad],
        marker_length_m: f64,
        camera: &CameraParams,
    ) -> Vec<MarkerPose> {
        (**self).estimate_poses(corners, marker_length_m, camera)
    }
}
