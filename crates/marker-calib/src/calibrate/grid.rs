use super::CalibrateError;
use crate::backend::CalibrationSolver;
use crate::board::BoardGeometry;
use crate::flatten::flatten;
use crate::session::CalibrationSession;
use marker_calib_core::{CameraParams, ImageSize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Single bulk solve over every marker quad of the session.
///
/// `camera` is the initial guess and receives the solved intrinsics. An
/// empty session returns [`CalibrateError::EmptySession`] without calling the
/// solver or touching `camera`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(frames = session.len()))
)]
pub fn calibrate_planar_grid<S>(
    session: &CalibrationSession,
    board: &BoardGeometry,
    image_size: ImageSize,
    solver: &S,
    camera: &mut CameraParams,
) -> Result<f64, CalibrateError>
where
    S: CalibrationSolver + ?Sized,
{
    if board.as_grid().is_none() {
        return Err(CalibrateError::BoardMismatch {
            calibrator: "planar-grid",
            expected: "grid",
        });
    }
    if session.is_empty() {
        log::error!("no frames collected for calibration");
        return Err(CalibrateError::EmptySession);
    }

    let observations = flatten(session);
    log::debug!(
        "grid solve over {} markers in {} frames",
        observations.marker_count(),
        observations.frame_count()
    );
    let err = solver.calibrate_markers(&observations, board, image_size, camera)?;
    log::info!("reprojection error = {err}");
    Ok(err)
}
