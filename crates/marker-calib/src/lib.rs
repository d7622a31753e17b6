//! Multi-frame camera calibration from fiducial-marker observations.
//!
//! Pipeline:
//! - accumulate per-frame detections in a [`CalibrationSession`],
//! - [`flatten`] them into solver-ready parallel arrays,
//! - calibrate against a planar marker grid ([`calibrate_planar_grid`]) or a
//!   chessboard with embedded markers ([`calibrate_hybrid`]).
//!
//! Marker detection, pose estimation and the bulk least-squares solves are
//! consumed through the traits in [`backend`]. A separate per-frame path,
//! [`report_pose`], reports one marker pose from a live frame.
//!
//! ```
//! use marker_calib::{flatten, CalibrationSession};
//!
//! let mut session = CalibrationSession::new();
//! session.push_flat(&[0.0; 16], &[3, 4], None).unwrap();
//! session.push_flat(&[0.0; 8], &[3], None).unwrap();
//!
//! let flat = flatten(&session);
//! assert_eq!(flat.per_frame_counts, vec![2, 1]);
//! assert_eq!(flat.ids, vec![3, 4, 3]);
//! ```

pub mod backend;
mod board;
mod calibrate;
mod detect;
mod flatten;
mod handles;
mod interpolate;
mod io;
mod pose;
mod session;

pub use backend::{
    CalibrationSolver, ChessboardCorners, CornerInterpolator, MarkerDetector, MarkerPose,
    PoseEstimator, SolverError,
};
pub use board::{
    BoardConfig, BoardError, BoardGeometry, BoardSpec, GridBoard, GridBoardSpec, HybridBoard,
    HybridBoardSpec, PredefinedDictionary, BOARD_CONFIG_VERSION,
};
pub use calibrate::{
    calibrate, calibrate_hybrid, calibrate_planar_grid, reprojection_error_or_zero,
    CalibrateError, HybridCalibrationParams, MIN_INTERPOLATED_FRAMES,
};
pub use detect::{detect_calibration_corners, write_calibration_corners, CornerOutputs};
pub use flatten::{flatten, FlattenedObservations};
pub use handles::{Handle, HandleError, HandleTable};
pub use interpolate::{HomographyInterpolator, InterpolatorParams};
pub use io::{CalibrationConfig, ConfigError};
pub use pose::{
    report_pose, write_pose, PoseReporterParams, PoseSelection, ReportedPose,
    DEFAULT_MARKER_LENGTH_M,
};
pub use session::{CalibrationSession, FrameObservation, SessionError};

pub use marker_calib_core::{
    buffer, init_with_level, CameraParams, FrameImage, FrameImageView, Homography, ImageError,
    ImageSize, MarkerObservation, Quad,
};

#[cfg(feature = "tracing")]
pub use marker_calib_core::init_tracing;
