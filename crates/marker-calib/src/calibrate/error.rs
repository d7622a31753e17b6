use crate::backend::SolverError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrateError {
    #[error("calibration session is empty")]
    EmptySession,
    #[error("only {usable} frames yielded interpolated corners, need at least {required}")]
    InsufficientFrames { usable: usize, required: usize },
    #[error("{calibrator} calibration requires a {expected} board")]
    BoardMismatch {
        calibrator: &'static str,
        expected: &'static str,
    },
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Collapse a calibration result into the reprojection-error convention of
/// the C boundary: `0.0` means no calibration was performed.
///
/// Solver values, including non-finite or negative ones, pass through.
pub fn reprojection_error_or_zero(result: Result<f64, CalibrateError>) -> f64 {
    match result {
        Ok(err) => err,
        Err(e) => {
            log::error!("calibration not performed: {e}");
            0.0
        }
    }
}
