//! C ABI for the marker-calib pipeline.
//!
//! Sessions, boards and camera parameters live in handle tables on this side
//! of the boundary; the host refers to them by opaque `u64` handles (`0` is
//! never issued). Marker detection, pose estimation and the bulk solves are
//! supplied by the host through [`McBackend`] callbacks.
//!
//! Every buffer passed in is read or written only for the duration of the
//! call. Output arrays must be sized by the caller as documented per
//! function.

mod host;
mod raw;

pub use host::{
    McBackend, McBoardDesc, McCalibrateChessboardFn, McCalibrateMarkersFn, McDetectFn,
    McEstimatePosesFn, MC_BOARD_GRID, MC_BOARD_HYBRID,
};

use marker_calib::{
    calibrate_hybrid, calibrate_planar_grid, detect_calibration_corners, report_pose,
    reprojection_error_or_zero, write_pose, BoardConfig, BoardError, BoardGeometry,
    CalibrateError, CalibrationSession, CameraParams, CornerOutputs, GridBoard, GridBoardSpec,
    Handle, HandleError, HandleTable, HomographyInterpolator, HybridBoard, HybridBoardSpec,
    HybridCalibrationParams, ImageError, ImageSize, PoseReporterParams, PredefinedDictionary,
    SessionError, DEFAULT_MARKER_LENGTH_M, MIN_INTERPOLATED_FRAMES,
};
use std::ffi::{c_char, CStr};

pub const MC_OK: i32 = 0;
pub const MC_ERR_NULL: i32 = -1;
pub const MC_ERR_HANDLE: i32 = -2;
pub const MC_ERR_INVALID: i32 = -3;
pub const MC_ERR_BACKEND: i32 = -4;

static SESSIONS: HandleTable<CalibrationSession> = HandleTable::new();
static BOARDS: HandleTable<BoardGeometry> = HandleTable::new();
static CAMERAS: HandleTable<CameraParams> = HandleTable::new();

#[derive(thiserror::Error, Debug)]
enum FfiError {
    #[error("null pointer passed for `{0}`")]
    Null(&'static str),
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error("no backend registered")]
    NoBackend,
    #[error(transparent)]
    Handle(#[from] HandleError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl FfiError {
    fn status(&self) -> i32 {
        match self {
            FfiError::Null(_) => MC_ERR_NULL,
            FfiError::Handle(_) => MC_ERR_HANDLE,
            FfiError::NoBackend => MC_ERR_BACKEND,
            FfiError::Invalid(_) | FfiError::Board(_) | FfiError::Image(_) | FfiError::Session(_) => {
                MC_ERR_INVALID
            }
        }
    }
}

fn status_of(op: &str, result: Result<(), FfiError>) -> i32 {
    match result {
        Ok(()) => MC_OK,
        Err(e) => {
            log::error!("{op}: {e}");
            e.status()
        }
    }
}

fn handle_or_null(op: &str, result: Result<Handle, FfiError>) -> u64 {
    match result {
        Ok(h) => h.raw(),
        Err(e) => {
            log::error!("{op}: {e}");
            Handle::NULL.raw()
        }
    }
}

fn dictionary(index: u32) -> Result<PredefinedDictionary, FfiError> {
    PredefinedDictionary::from_index(index)
        .ok_or_else(|| FfiError::Invalid(format!("unknown dictionary index {index}")))
}

/// Static NUL-terminated string confirming the library is loaded.
#[no_mangle]
pub extern "C" fn mc_ready_check() -> *const c_char {
    c"marker-calib ready".as_ptr()
}

/// Install the stderr logger. `level`: 0 off, 1 error, 2 warn, 3 info,
/// 4 debug, 5 trace.
#[no_mangle]
pub extern "C" fn mc_log_init(level: u32) -> i32 {
    let filter = match level {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    match marker_calib::init_with_level(filter) {
        Ok(()) => MC_OK,
        Err(_) => MC_ERR_INVALID,
    }
}

/// Register (or replace) the host callbacks. Passing null clears them.
///
/// # Safety
///
/// `backend` must be null or point to a valid [`McBackend`]; it is copied.
#[no_mangle]
pub unsafe extern "C" fn mc_backend_register(backend: *const McBackend) -> i32 {
    host::register(backend.as_ref().copied());
    MC_OK
}

/// Table position of the dictionary called `name` (e.g. `DICT_6X6_250`),
/// or `-1`.
///
/// # Safety
///
/// `name` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mc_dictionary_index(name: *const c_char) -> i32 {
    if name.is_null() {
        return -1;
    }
    CStr::from_ptr(name)
        .to_str()
        .ok()
        .and_then(PredefinedDictionary::from_name)
        .map_or(-1, |d| d.index() as i32)
}

/// Planar marker grid board. Returns `0` on invalid parameters.
#[no_mangle]
pub extern "C" fn mc_board_new_grid(
    markers_x: u32,
    markers_y: u32,
    marker_length: f32,
    marker_separation: f32,
    dictionary_index: u32,
) -> u64 {
    let result = (|| -> Result<Handle, FfiError> {
        let board = GridBoard::new(GridBoardSpec {
            markers_x,
            markers_y,
            marker_length,
            marker_separation,
            dictionary: dictionary(dictionary_index)?,
        })?;
        Ok(BOARDS.insert(board.into()))
    })();
    handle_or_null("mc_board_new_grid", result)
}

/// Chessboard-with-markers board. Returns `0` on invalid parameters.
#[no_mangle]
pub extern "C" fn mc_board_new_hybrid(
    squares_x: u32,
    squares_y: u32,
    square_length: f32,
    marker_length: f32,
    dictionary_index: u32,
) -> u64 {
    let result = (|| -> Result<Handle, FfiError> {
        let board = HybridBoard::new(HybridBoardSpec {
            squares_x,
            squares_y,
            square_length,
            marker_length,
            dictionary: dictionary(dictionary_index)?,
        })?;
        Ok(BOARDS.insert(board.into()))
    })();
    handle_or_null("mc_board_new_hybrid", result)
}

/// Board from a versioned JSON board config. Returns `0` on failure.
///
/// # Safety
///
/// `json` must be null or a valid NUL-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn mc_board_from_json(json: *const c_char) -> u64 {
    let result = (|| -> Result<Handle, FfiError> {
        if json.is_null() {
            return Err(FfiError::Null("json"));
        }
        let raw = CStr::from_ptr(json)
            .to_str()
            .map_err(|e| FfiError::Invalid(e.to_string()))?;
        let config: BoardConfig =
            serde_json::from_str(raw).map_err(|e| FfiError::Invalid(e.to_string()))?;
        Ok(BOARDS.insert(config.build()?))
    })();
    handle_or_null("mc_board_from_json", result)
}

/// Kind of the board behind `board` ([`MC_BOARD_GRID`] or
/// [`MC_BOARD_HYBRID`]), or [`MC_ERR_HANDLE`].
#[no_mangle]
pub extern "C" fn mc_board_kind(board: u64) -> i32 {
    BOARDS
        .with(Handle::from_raw(board), |b| match b {
            BoardGeometry::Grid(_) => MC_BOARD_GRID as i32,
            BoardGeometry::Hybrid(_) => MC_BOARD_HYBRID as i32,
        })
        .unwrap_or(MC_ERR_HANDLE)
}

#[no_mangle]
pub extern "C" fn mc_board_free(board: u64) -> i32 {
    let result = BOARDS.remove(Handle::from_raw(board)).map(drop);
    status_of("mc_board_free", result.map_err(FfiError::from))
}

/// Camera parameters from a row-major 3x3 matrix (9 doubles) and
/// `n_distortion` coefficients. Returns `0` on null input.
///
/// # Safety
///
/// `matrix` must point to 9 doubles; `distortion` to `n_distortion` doubles.
#[no_mangle]
pub unsafe extern "C" fn mc_camera_new(
    matrix: *const f64,
    distortion: *const f64,
    n_distortion: usize,
) -> u64 {
    let result = raw::camera_in(matrix, distortion, n_distortion)
        .map(|camera| CAMERAS.insert(camera))
        .ok_or(FfiError::Null("matrix"));
    handle_or_null("mc_camera_new", result)
}

/// Copy the current intrinsics out. At most `n_distortion` coefficients are
/// written.
///
/// # Safety
///
/// `matrix_out` must point to 9 writable doubles; `distortion_out` to
/// `n_distortion` writable doubles.
#[no_mangle]
pub unsafe extern "C" fn mc_camera_read(
    camera: u64,
    matrix_out: *mut f64,
    distortion_out: *mut f64,
    n_distortion: usize,
) -> i32 {
    let result = (|| -> Result<(), FfiError> {
        let matrix = matrix_out
            .cast::<[f64; 9]>()
            .as_mut()
            .ok_or(FfiError::Null("matrix_out"))?;
        let dist = raw::slice_out(distortion_out, n_distortion)
            .ok_or(FfiError::Null("distortion_out"))?;
        CAMERAS.with(Handle::from_raw(camera), |c| raw::camera_out(c, matrix, dist))?;
        Ok(())
    })();
    status_of("mc_camera_read", result)
}

#[no_mangle]
pub extern "C" fn mc_camera_free(camera: u64) -> i32 {
    let result = CAMERAS.remove(Handle::from_raw(camera)).map(drop);
    status_of("mc_camera_free", result.map_err(FfiError::from))
}

#[no_mangle]
pub extern "C" fn mc_session_new() -> u64 {
    SESSIONS.insert(CalibrationSession::new()).raw()
}

/// Append one frame: `n_corner_floats` floats (8 per marker) and `n_ids`
/// ids. `pixels` may be null when the frame is only used for grid
/// calibration; otherwise the image is copied (`stride == 0` for packed
/// rows).
///
/// # Safety
///
/// Every pointer must be valid for the lengths described above.
#[no_mangle]
pub unsafe extern "C" fn mc_session_push_frame(
    session: u64,
    corners: *const f32,
    n_corner_floats: usize,
    ids: *const i32,
    n_ids: usize,
    pixels: *const u8,
    width: u32,
    height: u32,
    channels: u32,
    stride: usize,
) -> i32 {
    let result = (|| -> Result<(), FfiError> {
        let corners = raw::slice_in(corners, n_corner_floats).ok_or(FfiError::Null("corners"))?;
        let ids = raw::slice_in(ids, n_ids).ok_or(FfiError::Null("ids"))?;
        if corners.len() % 8 != 0 {
            return Err(FfiError::Invalid(format!(
                "{} corner floats is not a multiple of 8",
                corners.len()
            )));
        }
        let image = raw::copy_image(pixels, width, height, channels, stride)?;
        SESSIONS.with_mut(Handle::from_raw(session), |s| s.push_flat(corners, ids, image))??;
        Ok(())
    })();
    status_of("mc_session_push_frame", result)
}

/// Number of frames in `session`, or [`MC_ERR_HANDLE`].
#[no_mangle]
pub extern "C" fn mc_session_len(session: u64) -> i64 {
    SESSIONS
        .with(Handle::from_raw(session), |s| s.len() as i64)
        .unwrap_or(MC_ERR_HANDLE as i64)
}

#[no_mangle]
pub extern "C" fn mc_session_clear(session: u64) -> i32 {
    let result = SESSIONS.with_mut(Handle::from_raw(session), CalibrationSession::clear);
    status_of("mc_session_clear", result.map_err(FfiError::from))
}

#[no_mangle]
pub extern "C" fn mc_session_free(session: u64) -> i32 {
    let result = SESSIONS.remove(Handle::from_raw(session)).map(drop);
    status_of("mc_session_free", result.map_err(FfiError::from))
}

fn calibrate_with(
    session: u64,
    board: u64,
    camera: u64,
    image_size: ImageSize,
    hybrid: Option<HybridCalibrationParams>,
) -> Result<Result<f64, CalibrateError>, FfiError> {
    let backend = host::registered().ok_or(FfiError::NoBackend)?;
    let interpolator = HomographyInterpolator::default();
    let result = SESSIONS.with(Handle::from_raw(session), |session| {
        BOARDS.with(Handle::from_raw(board), |board| {
            CAMERAS.with_mut(Handle::from_raw(camera), |camera| match hybrid {
                None => calibrate_planar_grid(session, board, image_size, &backend, camera),
                Some(params) => match board.as_hybrid() {
                    Some(hybrid) => calibrate_hybrid(
                        session,
                        hybrid,
                        image_size,
                        &backend,
                        &interpolator,
                        &params,
                        camera,
                    ),
                    None => Err(CalibrateError::BoardMismatch {
                        calibrator: "hybrid",
                        expected: "hybrid",
                    }),
                },
            })
        })
    });
    Ok(result???)
}

fn reprojection_error(op: &str, result: Result<Result<f64, CalibrateError>, FfiError>) -> f64 {
    match result {
        Ok(calibrated) => reprojection_error_or_zero(calibrated),
        Err(e) => {
            log::error!("{op}: {e}");
            0.0
        }
    }
}

/// Calibrate `camera` in place from every frame of `session` against a grid
/// board. Returns the RMS reprojection error, or `0.0` when no calibration
/// was performed (empty session, bad handle, wrong board kind, solver
/// failure).
#[no_mangle]
pub extern "C" fn mc_calibrate_grid(
    session: u64,
    board: u64,
    camera: u64,
    width: u32,
    height: u32,
) -> f64 {
    let result = calibrate_with(session, board, camera, ImageSize::new(width, height), None);
    reprojection_error("mc_calibrate_grid", result)
}

/// Two-stage calibration against a hybrid board with default parameters.
/// Returns `0.0` when fewer than four frames yield interpolated corners.
#[no_mangle]
pub extern "C" fn mc_calibrate_hybrid(
    session: u64,
    board: u64,
    camera: u64,
    width: u32,
    height: u32,
) -> f64 {
    let params = HybridCalibrationParams::default();
    let result = calibrate_with(
        session,
        board,
        camera,
        ImageSize::new(width, height),
        Some(params),
    );
    reprojection_error("mc_calibrate_hybrid", result)
}

/// [`mc_calibrate_hybrid`] with explicit parameters; `min_frames == 0`
/// selects the default of four.
#[no_mangle]
pub extern "C" fn mc_calibrate_hybrid_with(
    session: u64,
    board: u64,
    camera: u64,
    width: u32,
    height: u32,
    min_frames: u32,
    seed_with_bootstrap: bool,
) -> f64 {
    let params = HybridCalibrationParams {
        min_frames: if min_frames == 0 {
            MIN_INTERPOLATED_FRAMES
        } else {
            min_frames as usize
        },
        seed_interpolation_with_bootstrap: seed_with_bootstrap,
    };
    let result = calibrate_with(
        session,
        board,
        camera,
        ImageSize::new(width, height),
        Some(params),
    );
    reprojection_error("mc_calibrate_hybrid_with", result)
}

/// Detect markers in one live frame and write the first marker's pose into
/// `rvec_out` / `tvec_out` (3 doubles each). `marker_length <= 0` selects
/// 0.078 m.
///
/// Returns `1` when a pose was written, `0` when nothing was detected (the
/// output buffers are left untouched), or a negative status.
///
/// # Safety
///
/// `pixels` must cover the described image; `rvec_out` and `tvec_out` must
/// each point to 3 writable doubles.
#[no_mangle]
pub unsafe extern "C" fn mc_process_frame(
    camera: u64,
    pixels: *const u8,
    width: u32,
    height: u32,
    channels: u32,
    stride: usize,
    dictionary_index: u32,
    marker_length: f64,
    rvec_out: *mut f64,
    tvec_out: *mut f64,
) -> i32 {
    let result = (|| -> Result<bool, FfiError> {
        let rvec = raw::vec3_out(rvec_out).ok_or(FfiError::Null("rvec_out"))?;
        let tvec = raw::vec3_out(tvec_out).ok_or(FfiError::Null("tvec_out"))?;
        let image = raw::copy_image(pixels, width, height, channels, stride)?
            .ok_or(FfiError::Null("pixels"))?;
        let backend = host::registered().ok_or(FfiError::NoBackend)?;
        let params = PoseReporterParams {
            marker_length_m: if marker_length > 0.0 {
                marker_length
            } else {
                DEFAULT_MARKER_LENGTH_M
            },
            dictionary: dictionary(dictionary_index)?,
            ..PoseReporterParams::default()
        };
        let reported = CAMERAS.with(Handle::from_raw(camera), |camera| {
            report_pose(image.view(), camera, &backend, &backend, &params)
        })?;
        Ok(write_pose(reported.as_ref().map(|r| &r.pose), rvec, tvec))
    })();
    match result {
        Ok(written) => i32::from(written),
        Err(e) => {
            log::error!("mc_process_frame: {e}");
            e.status()
        }
    }
}

/// Detect markers for an external calibrator. Writes at most `max_markers`
/// quads into `corners_out` (8 floats each), ids into `ids_out`, and the
/// image size as `[rows, cols]` into `size_out`.
///
/// Returns the total number detected (possibly more than written), `0` with
/// all outputs untouched when nothing is found, or a negative status.
///
/// # Safety
///
/// `corners_out` must hold `8 * max_markers` floats, `ids_out`
/// `max_markers` ints and `size_out` 2 ints.
#[no_mangle]
pub unsafe extern "C" fn mc_detect_calibration_corners(
    pixels: *const u8,
    width: u32,
    height: u32,
    channels: u32,
    stride: usize,
    dictionary_index: u32,
    corners_out: *mut f32,
    ids_out: *mut i32,
    size_out: *mut i32,
    max_markers: usize,
) -> i32 {
    let result = (|| -> Result<i32, FfiError> {
        let corners = raw::slice_out(corners_out, max_markers.saturating_mul(8))
            .ok_or(FfiError::Null("corners_out"))?;
        let ids = raw::slice_out(ids_out, max_markers).ok_or(FfiError::Null("ids_out"))?;
        let size = size_out
            .cast::<[i32; 2]>()
            .as_mut()
            .ok_or(FfiError::Null("size_out"))?;
        let image = raw::copy_image(pixels, width, height, channels, stride)?
            .ok_or(FfiError::Null("pixels"))?;
        let backend = host::registered().ok_or(FfiError::NoBackend)?;
        let total = detect_calibration_corners(
            image.view(),
            dictionary(dictionary_index)?,
            &backend,
            max_markers,
            CornerOutputs { corners, ids, size },
        );
        Ok(i32::try_from(total).unwrap_or(i32::MAX))
    })();
    match result {
        Ok(total) => total,
        Err(e) => {
            log::error!("mc_detect_calibration_corners: {e}");
            e.status()
        }
    }
}
