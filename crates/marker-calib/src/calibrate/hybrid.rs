use super::CalibrateError;
use crate::backend::{CalibrationSolver, ChessboardCorners, CornerInterpolator};
use crate::board::{BoardGeometry, HybridBoard};
use crate::flatten::flatten;
use crate::session::CalibrationSession;
use marker_calib_core::{CameraParams, ImageSize};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Frames with interpolated corners needed before refinement is attempted.
pub const MIN_INTERPOLATED_FRAMES: usize = 4;

fn default_min_frames() -> usize {
    MIN_INTERPOLATED_FRAMES
}

fn default_seed() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridCalibrationParams {
    /// Minimum number of frames that must yield interpolated corners.
    #[serde(default = "default_min_frames")]
    pub min_frames: usize,
    /// Interpolate with the bootstrap intrinsics instead of the caller's
    /// initial guess.
    #[serde(default = "default_seed")]
    pub seed_interpolation_with_bootstrap: bool,
}

impl Default for HybridCalibrationParams {
    fn default() -> Self {
        Self {
            min_frames: MIN_INTERPOLATED_FRAMES,
            seed_interpolation_with_bootstrap: true,
        }
    }
}

/// Two-stage calibration for chessboard boards with embedded markers.
///
/// 1. Bootstrap: one marker-based bulk solve over the flattened session.
/// 2. Interpolate chessboard corners per frame; frames with no image or no
///    corners are dropped.
/// 3. Refine: one chessboard-corner solve over the surviving frames.
///
/// `camera` is written only when the refinement succeeds. Fewer than
/// `params.min_frames` surviving frames yields
/// [`CalibrateError::InsufficientFrames`] and the refinement is never
/// invoked.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(frames = session.len()))
)]
pub fn calibrate_hybrid<S, I>(
    session: &CalibrationSession,
    board: &HybridBoard,
    image_size: ImageSize,
    solver: &S,
    interpolator: &I,
    params: &HybridCalibrationParams,
    camera: &mut CameraParams,
) -> Result<f64, CalibrateError>
where
    S: CalibrationSolver + ?Sized,
    I: CornerInterpolator + ?Sized,
{
    if session.is_empty() {
        log::error!("no frames collected for calibration");
        return Err(CalibrateError::EmptySession);
    }

    let observations = flatten(session);
    let geometry = BoardGeometry::Hybrid(board.clone());
    let mut working = camera.clone();
    let bootstrap_err =
        solver.calibrate_markers(&observations, &geometry, image_size, &mut working)?;
    log::info!("bootstrap reprojection error = {bootstrap_err}");
    if !params.seed_interpolation_with_bootstrap {
        working = camera.clone();
    }

    let frames = interpolate_frames(session, board, interpolator, &working);
    if frames.len() < params.min_frames {
        log::error!(
            "not enough interpolated corners for calibration: {} of {} frames usable, need {}",
            frames.len(),
            session.len(),
            params.min_frames
        );
        return Err(CalibrateError::InsufficientFrames {
            usable: frames.len(),
            required: params.min_frames,
        });
    }

    let err = solver.calibrate_chessboard(&frames, board, image_size, &mut working)?;
    *camera = working;
    log::info!("reprojection error = {err}");
    Ok(err)
}

fn interpolate_frames<I>(
    session: &CalibrationSession,
    board: &HybridBoard,
    interpolator: &I,
    camera: &CameraParams,
) -> Vec<ChessboardCorners>
where
    I: CornerInterpolator + ?Sized,
{
    let mut out = Vec::with_capacity(session.len());
    for (index, frame) in session.frames().iter().enumerate() {
        let Some(image) = frame.image() else {
            log::warn!("frame {index} carries no image; skipped for interpolation");
            continue;
        };
        let corners = interpolator.interpolate(frame.markers(), image, board, camera);
        if corners.is_empty() {
            log::debug!("frame {index}: no chessboard corners interpolated");
            continue;
        }
        log::debug!("frame {index}: {} chessboard corners", corners.len());
        out.push(corners);
    }
    out
}
