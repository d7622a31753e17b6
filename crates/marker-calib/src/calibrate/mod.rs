//! Intrinsic calibration from an accumulated session.
//!
//! Two strategies share one data-preparation path ([`crate::flatten`]):
//! - [`calibrate_planar_grid`]: a single bulk solve over every marker quad,
//! - [`calibrate_hybrid`]: a marker-based bootstrap followed by a refinement
//!   over interpolated chessboard corners.
//!
//! [`calibrate`] dispatches on the board kind.

mod error;
mod grid;
mod hybrid;

pub use error::{reprojection_error_or_zero, CalibrateError};
pub use grid::calibrate_planar_grid;
pub use hybrid::{calibrate_hybrid, HybridCalibrationParams, MIN_INTERPOLATED_FRAMES};

use crate::backend::{CalibrationSolver, CornerInterpolator};
use crate::board::BoardGeometry;
use crate::session::CalibrationSession;
use marker_calib_core::{CameraParams, ImageSize};

/// Run the strategy matching `board`.
pub fn calibrate<S, I>(
    session: &CalibrationSession,
    board: &BoardGeometry,
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
    match board {
        BoardGeometry::Grid(_) => calibrate_planar_grid(session, board, image_size, solver, camera),
        BoardGeometry::Hybrid(hybrid) => calibrate_hybrid(
            session,
            hybrid,
            image_size,
            solver,
            interpolator,
            params,
            camera,
        ),
    }
}
