//! Collaborators implemented by the host application through C callbacks.

use marker_calib::buffer::{extract, extract_vec3s, write_quads, QuadPack8, ScalarCopy};
use marker_calib::{
    BoardGeometry, CalibrationSolver, CameraParams, ChessboardCorners, FlattenedObservations,
    FrameImageView, HybridBoard, ImageSize, MarkerDetector, MarkerObservation, MarkerPose,
    PoseEstimator, PredefinedDictionary, Quad, SolverError,
};
use std::ffi::c_void;
use std::sync::Mutex;

pub const MC_BOARD_GRID: u32 = 0;
pub const MC_BOARD_HYBRID: u32 = 1;

/// Detection buffer capacity tried before asking the host a second time.
const INITIAL_DETECT_CAPACITY: usize = 128;

/// Upper bound on the retry capacity; no predefined dictionary has more codes.
const MAX_DETECT_CAPACITY: usize = 4096;

/// Minimum distortion length handed to solver callbacks (`k1, k2, p1, p2, k3`).
const MIN_DISTORTION_LEN: usize = 5;

/// Board description handed to solver callbacks.
///
/// Grid: `size_x` by `size_y` markers, `length` = marker side, `second_length`
/// = separation. Hybrid: `size_x` by `size_y` squares, `length` = square side,
/// `second_length` = marker side.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct McBoardDesc {
    pub kind: u32,
    pub size_x: u32,
    pub size_y: u32,
    pub length: f32,
    pub second_length: f32,
    pub dictionary: u32,
}

impl From<&BoardGeometry> for McBoardDesc {
    fn from(board: &BoardGeometry) -> Self {
        match board {
            BoardGeometry::Grid(b) => {
                let s = b.spec();
                Self {
                    kind: MC_BOARD_GRID,
                    size_x: s.markers_x,
                    size_y: s.markers_y,
                    length: s.marker_length,
                    second_length: s.marker_separation,
                    dictionary: s.dictionary.index(),
                }
            }
            BoardGeometry::Hybrid(b) => Self::from(b),
        }
    }
}

impl From<&HybridBoard> for McBoardDesc {
    fn from(board: &HybridBoard) -> Self {
        let s = board.spec();
        Self {
            kind: MC_BOARD_HYBRID,
            size_x: s.squares_x,
            size_y: s.squares_y,
            length: s.square_length,
            second_length: s.marker_length,
            dictionary: s.dictionary.index(),
        }
    }
}

/// Writes up to `max_markers` quads (8 floats each) and ids; returns the
/// total number detected, which may exceed `max_markers`.
pub type McDetectFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    pixels: *const u8,
    width: u32,
    height: u32,
    channels: u32,
    dictionary: u32,
    out_corners: *mut f32,
    out_ids: *mut i32,
    max_markers: usize,
) -> usize;

/// Writes one rvec and one tvec (3 doubles each) per input quad; returns
/// the number of poses written.
pub type McEstimatePosesFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    corners: *const f32,
    n_markers: usize,
    marker_length: f64,
    camera_matrix: *const f64,
    distortion: *const f64,
    n_distortion: usize,
    out_rvecs: *mut f64,
    out_tvecs: *mut f64,
) -> usize;

/// Marker-based bulk solve. Reads and overwrites the row-major camera
/// matrix and distortion in place; returns 0 on success.
pub type McCalibrateMarkersFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    corners: *const f32,
    ids: *const i32,
    n_markers: usize,
    per_frame_counts: *const i32,
    n_frames: usize,
    board: *const McBoardDesc,
    width: u32,
    height: u32,
    camera_matrix: *mut f64,
    distortion: *mut f64,
    n_distortion: usize,
    out_error: *mut f64,
) -> i32;

/// Chessboard-corner solve; `corners` holds 2 floats per corner.
pub type McCalibrateChessboardFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    corners: *const f32,
    ids: *const i32,
    per_frame_counts: *const i32,
    n_frames: usize,
    board: *const McBoardDesc,
    width: u32,
    height: u32,
    camera_matrix: *mut f64,
    distortion: *mut f64,
    n_distortion: usize,
    out_error: *mut f64,
) -> i32;

/// Host callbacks. `user_data` is passed back verbatim on every call.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct McBackend {
    pub user_data: *mut c_void,
    pub detect: Option<McDetectFn>,
    pub estimate_poses: Option<McEstimatePosesFn>,
    pub calibrate_markers: Option<McCalibrateMarkersFn>,
    pub calibrate_chessboard: Option<McCalibrateChessboardFn>,
}

// The host guarantees its callbacks and `user_data` may be used from any
// thread that calls into this library.
unsafe impl Send for McBackend {}
unsafe impl Sync for McBackend {}

static BACKEND: Mutex<Option<McBackend>> = Mutex::new(None);

pub(crate) fn register(backend: Option<McBackend>) {
    let mut slot = BACKEND.lock().unwrap_or_else(|p| p.into_inner());
    *slot = backend;
}

/// Snapshot of the registered callbacks; the lock is not held during calls.
pub(crate) fn registered() -> Option<HostBackend> {
    let slot = BACKEND.lock().unwrap_or_else(|p| p.into_inner());
    (*slot).map(HostBackend)
}

pub(crate) struct HostBackend(McBackend);

impl HostBackend {
    fn detect_once(
        &self,
        detect: McDetectFn,
        image: &FrameImageView<'_>,
        dictionary: PredefinedDictionary,
        capacity: usize,
    ) -> (usize, Vec<f32>, Vec<i32>) {
        let mut corners = vec![0.0_f32; capacity * 8];
        let mut ids = vec![0_i32; capacity];
        // SAFETY: the output buffers hold exactly `capacity` markers.
        let total = unsafe {
            detect(
                self.0.user_data,
                image.data.as_ptr(),
                image.width as u32,
                image.height as u32,
                image.channels as u32,
                dictionary.index(),
                corners.as_mut_ptr(),
                ids.as_mut_ptr(),
                capacity,
            )
        };
        (total, corners, ids)
    }
}

impl MarkerDetector for HostBackend {
    fn detect(
        &self,
        image: FrameImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Vec<MarkerObservation> {
        let Some(detect) = self.0.detect else {
            log::warn!("no detect callback registered");
            return Vec::new();
        };
        let mut capacity = INITIAL_DETECT_CAPACITY;
        let (mut total, mut corners, mut ids) =
            self.detect_once(detect, &image, dictionary, capacity);
        if total > capacity {
            if total > MAX_DETECT_CAPACITY {
                log::warn!(
                    "detect callback reported {total} markers, keeping the first {MAX_DETECT_CAPACITY}"
                );
            }
            capacity = total.min(MAX_DETECT_CAPACITY);
            (total, corners, ids) = self.detect_once(detect, &image, dictionary, capacity);
        }
        let n = total.min(capacity);
        let quads = extract(&corners, 0, Some(n * 8), &QuadPack8);
        let ids = extract(&ids, 0, Some(n), &ScalarCopy);
        ids.into_iter()
            .zip(quads)
            .map(|(id, corners)| MarkerObservation::new(id, corners))
            .collect()
    }
}

impl PoseEstimator for HostBackend {
    fn estimate_poses(
        &self,
        corners: &[Quad],
        marker_length_m: f64,
        camera: &CameraParams,
    ) -> Vec<MarkerPose> {
        let Some(estimate) = self.0.estimate_poses else {
            log::warn!("no estimate_poses callback registered");
            return Vec::new();
        };
        let n = corners.len();
        let mut flat = vec![0.0_f32; n * 8];
        write_quads(corners, &mut flat);
        let matrix = camera.matrix_row_major();
        let mut rvecs = vec![0.0_f64; n * 3];
        let mut tvecs = vec![0.0_f64; n * 3];
        // SAFETY: inputs hold `n` quads and the outputs `n` vectors each.
        let written = unsafe {
            estimate(
                self.0.user_data,
                flat.as_ptr(),
                n,
                marker_length_m,
                matrix.as_ptr(),
                camera.distortion.as_ptr(),
                camera.distortion.len(),
                rvecs.as_mut_ptr(),
                tvecs.as_mut_ptr(),
            )
        }
        .min(n);
        let rvecs = extract_vec3s(&rvecs, 0, Some(written));
        let tvecs = extract_vec3s(&tvecs, 0, Some(written));
        rvecs
            .into_iter()
            .zip(tvecs)
            .map(|(rvec, tvec)| MarkerPose { rvec, tvec })
            .collect()
    }
}

/// Row-major matrix and padded distortion, ready to be solved in place.
fn camera_scratch(camera: &CameraParams) -> ([f64; 9], Vec<f64>) {
    let mut dist = camera.distortion.clone();
    if dist.len() < MIN_DISTORTION_LEN {
        dist.resize(MIN_DISTORTION_LEN, 0.0);
    }
    (camera.matrix_row_major(), dist)
}

fn solver_status(name: &str, status: i32) -> Result<(), SolverError> {
    if status == 0 {
        Ok(())
    } else {
        Err(SolverError::new(format!("{name} callback returned status {status}")))
    }
}

impl CalibrationSolver for HostBackend {
    fn calibrate_markers(
        &self,
        observations: &FlattenedObservations,
        board: &BoardGeometry,
        image_size: ImageSize,
        camera: &mut CameraParams,
    ) -> Result<f64, SolverError> {
        let solve = self
            .0
            .calibrate_markers
            .ok_or_else(|| SolverError::new("no calibrate_markers callback registered"))?;
        let mut corners = vec![0.0_f32; observations.corners.len() * 8];
        write_quads(&observations.corners, &mut corners);
        let counts = observations.per_frame_counts_i32();
        let desc = McBoardDesc::from(board);
        let (mut matrix, mut dist) = camera_scratch(camera);
        let mut error = 0.0;
        // SAFETY: every pointer covers the length passed alongside it.
        let status = unsafe {
            solve(
                self.0.user_data,
                corners.as_ptr(),
                observations.ids.as_ptr(),
                observations.ids.len(),
                counts.as_ptr(),
                counts.len(),
                &desc,
                image_size.width,
                image_size.height,
                matrix.as_mut_ptr(),
                dist.as_mut_ptr(),
                dist.len(),
                &mut error,
            )
        };
        solver_status("calibrate_markers", status)?;
        *camera = CameraParams::from_row_major(&matrix, &dist);
        Ok(error)
    }

    fn calibrate_chessboard(
        &self,
        frames: &[ChessboardCorners],
        board: &HybridBoard,
        image_size: ImageSize,
        camera: &mut CameraParams,
    ) -> Result<f64, SolverError> {
        let solve = self
            .0
            .calibrate_chessboard
            .ok_or_else(|| SolverError::new("no calibrate_chessboard callback registered"))?;
        let total: usize = frames.iter().map(ChessboardCorners::len).sum();
        let mut corners = Vec::with_capacity(total * 2);
        let mut ids = Vec::with_capacity(total);
        let mut counts = Vec::with_capacity(frames.len());
        for frame in frames {
            counts.push(i32::try_from(frame.len()).unwrap_or(i32::MAX));
            for (p, id) in frame.corners.iter().zip(&frame.ids) {
                corners.extend([p.x, p.y]);
                ids.push(i32::try_from(*id).unwrap_or(i32::MAX));
            }
        }
        let desc = McBoardDesc::from(board);
        let (mut matrix, mut dist) = camera_scratch(camera);
        let mut error = 0.0;
        // SAFETY: every pointer covers the length passed alongside it.
        let status = unsafe {
            solve(
                self.0.user_data,
                corners.as_ptr(),
                ids.as_ptr(),
                counts.as_ptr(),
                counts.len(),
                &desc,
                image_size.width,
                image_size.height,
                matrix.as_mut_ptr(),
                dist.as_mut_ptr(),
                dist.len(),
                &mut error,
            )
        };
        solver_status("calibrate_chessboard", status)?;
        *camera = CameraParams::from_row_major(&matrix, &dist);
        Ok(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fills whatever capacity it is given but claims `usize::MAX` markers.
    unsafe extern "C" fn overreporting_detect(
        _user_data: *mut c_void,
        _pixels: *const u8,
        _width: u32,
        _height: u32,
        _channels: u32,
        _dictionary: u32,
        out_corners: *mut f32,
        out_ids: *mut i32,
        max_markers: usize,
    ) -> usize {
        for i in 0..max_markers {
            for k in 0..8 {
                *out_corners.add(i * 8 + k) = k as f32;
            }
            *out_ids.add(i) = i as i32;
        }
        usize::MAX
    }

    #[test]
    fn detect_retry_capacity_is_bounded() {
        let backend = HostBackend(McBackend {
            user_data: std::ptr::null_mut(),
            detect: Some(overreporting_detect),
            estimate_poses: None,
            calibrate_markers: None,
            calibrate_chessboard: None,
        });
        let pixels = [0_u8; 4];
        let image = FrameImageView {
            width: 2,
            height: 2,
            channels: 1,
            data: &pixels,
        };
        let markers = backend.detect(image, PredefinedDictionary::Dict6x6_250);
        assert_eq!(markers.len(), MAX_DETECT_CAPACITY);
        assert_eq!(markers[MAX_DETECT_CAPACITY - 1].id, MAX_DETECT_CAPACITY as i32 - 1);
    }
}
