use marker_calib_ffi::*;
use std::ffi::{c_void, CStr};
use std::ptr;

const W: u32 = 640;
const H: u32 = 480;

/// Reports `pixels[0]` markers with ids `0..n`, 10 px apart.
unsafe extern "C" fn detect(
    _user_data: *mut c_void,
    pixels: *const u8,
    _width: u32,
    _height: u32,
    _channels: u32,
    _dictionary: u32,
    out_corners: *mut f32,
    out_ids: *mut i32,
    max_markers: usize,
) -> usize {
    let n = *pixels as usize;
    for i in 0..n.min(max_markers) {
        let x = 10.0 * i as f32;
        let quad = [x, 0.0, x + 5.0, 0.0, x + 5.0, 5.0, x, 5.0];
        for (k, v) in quad.iter().enumerate() {
            *out_corners.add(i * 8 + k) = *v;
        }
        *out_ids.add(i) = i as i32;
    }
    n
}

unsafe extern "C" fn estimate_poses(
    _user_data: *mut c_void,
    _corners: *const f32,
    n_markers: usize,
    marker_length: f64,
    _camera_matrix: *const f64,
    _distortion: *const f64,
    _n_distortion: usize,
    out_rvecs: *mut f64,
    out_tvecs: *mut f64,
) -> usize {
    for i in 0..n_markers {
        *out_rvecs.add(3 * i + 2) = i as f64;
        *out_tvecs.add(3 * i) = marker_length;
        *out_tvecs.add(3 * i + 2) = (i + 1) as f64;
    }
    n_markers
}

unsafe extern "C" fn calibrate_markers(
    _user_data: *mut c_void,
    _corners: *const f32,
    _ids: *const i32,
    n_markers: usize,
    per_frame_counts: *const i32,
    n_frames: usize,
    _board: *const McBoardDesc,
    _width: u32,
    _height: u32,
    camera_matrix: *mut f64,
    _distortion: *mut f64,
    _n_distortion: usize,
    out_error: *mut f64,
) -> i32 {
    let counts = std::slice::from_raw_parts(per_frame_counts, n_frames);
    if counts.iter().sum::<i32>() as usize != n_markers {
        return -1;
    }
    *camera_matrix = 700.0;
    *out_error = 0.5;
    0
}

unsafe extern "C" fn calibrate_chessboard(
    _user_data: *mut c_void,
    _corners: *const f32,
    _ids: *const i32,
    _per_frame_counts: *const i32,
    _n_frames: usize,
    board: *const McBoardDesc,
    _width: u32,
    _height: u32,
    camera_matrix: *mut f64,
    _distortion: *mut f64,
    _n_distortion: usize,
    out_error: *mut f64,
) -> i32 {
    if (*board).kind != MC_BOARD_HYBRID {
        return -1;
    }
    *camera_matrix = 800.0;
    *out_error = 0.25;
    0
}

fn register() {
    let backend = McBackend {
        user_data: ptr::null_mut(),
        detect: Some(detect),
        estimate_poses: Some(estimate_poses),
        calibrate_markers: Some(calibrate_markers),
        calibrate_chessboard: Some(calibrate_chessboard),
    };
    assert_eq!(unsafe { mc_backend_register(&backend) }, MC_OK);
}

const MATRIX: [f64; 9] = [500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0];

fn new_camera() -> u64 {
    let dist = [0.0_f64; 5];
    let h = unsafe { mc_camera_new(MATRIX.as_ptr(), dist.as_ptr(), dist.len()) };
    assert_ne!(h, 0);
    h
}

fn read_matrix(camera: u64) -> [f64; 9] {
    let mut m = [0.0; 9];
    let mut d = [0.0; 5];
    let status = unsafe { mc_camera_read(camera, m.as_mut_ptr(), d.as_mut_ptr(), d.len()) };
    assert_eq!(status, MC_OK);
    m
}

/// Frame holding hybrid-board marker 4 (6x5 squares of 30, markers of 20)
/// seen at scale 2 with offset (40, 30).
fn push_hybrid_frame(session: u64, id: i32) {
    let (x0, y0) = (2.0 * 65.0 + 40.0, 2.0 * 35.0 + 30.0);
    let corners = [x0, y0, x0 + 40.0, y0, x0 + 40.0, y0 + 40.0, x0, y0 + 40.0];
    let pixels = vec![0_u8; (W * H) as usize];
    let status = unsafe {
        mc_session_push_frame(
            session,
            corners.as_ptr(),
            corners.len(),
            &id,
            1,
            pixels.as_ptr(),
            W,
            H,
            1,
            0,
        )
    };
    assert_eq!(status, MC_OK);
}

#[test]
fn ready_check_is_a_static_string() {
    let s = unsafe { CStr::from_ptr(mc_ready_check()) };
    assert_eq!(s.to_str().unwrap(), "marker-calib ready");
}

#[test]
fn dictionary_names_resolve_to_indices() {
    let idx = unsafe { mc_dictionary_index(c"DICT_6X6_250".as_ptr()) };
    assert_eq!(idx, 10);
    assert_eq!(unsafe { mc_dictionary_index(c"DICT_9X9_1".as_ptr()) }, -1);
    assert_eq!(mc_board_new_grid(8, 5, 500.0, 100.0, 99), 0);
}

#[test]
fn grid_calibration_updates_camera() {
    register();
    let session = mc_session_new();
    let board = mc_board_new_grid(8, 5, 500.0, 100.0, 10);
    assert_eq!(mc_board_kind(board), MC_BOARD_GRID as i32);
    let camera = new_camera();

    let corners = [0.0_f32; 16];
    let ids = [3_i32, 4];
    for _ in 0..5 {
        let status = unsafe {
            mc_session_push_frame(
                session,
                corners.as_ptr(),
                corners.len(),
                ids.as_ptr(),
                ids.len(),
                ptr::null(),
                0,
                0,
                0,
                0,
            )
        };
        assert_eq!(status, MC_OK);
    }
    assert_eq!(mc_session_len(session), 5);

    let err = mc_calibrate_grid(session, board, camera, W, H);
    assert_eq!(err, 0.5);
    assert_eq!(read_matrix(camera)[0], 700.0);

    // Hybrid entry point refuses a grid board.
    assert_eq!(mc_calibrate_hybrid(session, board, camera, W, H), 0.0);

    assert_eq!(mc_session_free(session), MC_OK);
    assert_eq!(mc_session_free(session), MC_ERR_HANDLE);
    assert_eq!(mc_board_free(board), MC_OK);
    assert_eq!(mc_camera_free(camera), MC_OK);
}

#[test]
fn empty_session_returns_zero_and_keeps_camera() {
    register();
    let session = mc_session_new();
    let board = mc_board_new_grid(8, 5, 500.0, 100.0, 10);
    let camera = new_camera();
    assert_eq!(mc_calibrate_grid(session, board, camera, W, H), 0.0);
    assert_eq!(read_matrix(camera), MATRIX);
    assert_eq!(mc_calibrate_grid(0, board, camera, W, H), 0.0);
}

#[test]
fn malformed_frames_are_rejected() {
    let session = mc_session_new();
    let corners = [0.0_f32; 12];
    let ids = [1_i32];
    let status = unsafe {
        mc_session_push_frame(
            session,
            corners.as_ptr(),
            corners.len(),
            ids.as_ptr(),
            1,
            ptr::null(),
            0,
            0,
            0,
            0,
        )
    };
    assert_eq!(status, MC_ERR_INVALID);
    let status = unsafe {
        mc_session_push_frame(
            session,
            corners.as_ptr(),
            8,
            ids.as_ptr(),
            0,
            ptr::null(),
            0,
            0,
            0,
            0,
        )
    };
    assert_eq!(status, MC_ERR_INVALID);
    assert_eq!(mc_session_len(session), 0);
}

#[test]
fn hybrid_needs_four_frames_with_corners() {
    register();
    let board = mc_board_new_hybrid(6, 5, 30.0, 20.0, 0);
    assert_eq!(mc_board_kind(board), MC_BOARD_HYBRID as i32);

    let short = mc_session_new();
    for _ in 0..3 {
        push_hybrid_frame(short, 4);
    }
    for _ in 0..3 {
        push_hybrid_frame(short, 999);
    }
    let camera = new_camera();
    assert_eq!(mc_calibrate_hybrid(short, board, camera, W, H), 0.0);
    assert_eq!(read_matrix(camera), MATRIX);

    let enough = mc_session_new();
    for _ in 0..4 {
        push_hybrid_frame(enough, 4);
    }
    for _ in 0..2 {
        push_hybrid_frame(enough, 999);
    }
    assert_eq!(mc_calibrate_hybrid(enough, board, camera, W, H), 0.25);
    assert_eq!(read_matrix(camera)[0], 800.0);
}

#[test]
fn process_frame_writes_only_on_detection() {
    register();
    let camera = new_camera();
    let mut pixels = vec![0_u8; 64];
    let mut rvec = [7.0; 3];
    let mut tvec = [7.0; 3];

    let status = unsafe {
        mc_process_frame(
            camera,
            pixels.as_ptr(),
            8,
            8,
            1,
            0,
            10,
            0.0,
            rvec.as_mut_ptr(),
            tvec.as_mut_ptr(),
        )
    };
    assert_eq!(status, 0);
    assert_eq!(rvec, [7.0; 3]);
    assert_eq!(tvec, [7.0; 3]);

    pixels[0] = 2;
    let status = unsafe {
        mc_process_frame(
            camera,
            pixels.as_ptr(),
            8,
            8,
            1,
            0,
            10,
            0.0,
            rvec.as_mut_ptr(),
            tvec.as_mut_ptr(),
        )
    };
    assert_eq!(status, 1);
    assert_eq!(rvec, [0.0, 0.0, 0.0]);
    approx::assert_relative_eq!(tvec[0], 0.078);
    assert_eq!(tvec[2], 1.0);
}

#[test]
fn detect_calibration_corners_caps_output() {
    register();
    let mut pixels = vec![0_u8; 8 * 6];
    let mut corners = [-1.0_f32; 16];
    let mut ids = [-1_i32; 2];
    let mut size = [-1_i32; 2];

    let n = unsafe {
        mc_detect_calibration_corners(
            pixels.as_ptr(),
            8,
            6,
            1,
            0,
            10,
            corners.as_mut_ptr(),
            ids.as_mut_ptr(),
            size.as_mut_ptr(),
            2,
        )
    };
    assert_eq!(n, 0);
    assert_eq!(size, [-1, -1]);

    pixels[0] = 3;
    let n = unsafe {
        mc_detect_calibration_corners(
            pixels.as_ptr(),
            8,
            6,
            1,
            0,
            10,
            corners.as_mut_ptr(),
            ids.as_mut_ptr(),
            size.as_mut_ptr(),
            2,
        )
    };
    assert_eq!(n, 3);
    assert_eq!(ids, [0, 1]);
    assert_eq!(&corners[8..10], &[10.0, 0.0]);
    assert_eq!(size, [6, 8]);
}

#[test]
fn board_from_json() {
    let json = cr#"{"version":1,"board":{"kind":"hybrid","squares_x":5,"squares_y":7,"square_length":0.04,"marker_length":0.03,"dictionary":"DICT_4X4_50"}}"#;
    let board = unsafe { mc_board_from_json(json.as_ptr()) };
    assert_ne!(board, 0);
    assert_eq!(mc_board_kind(board), MC_BOARD_HYBRID as i32);
    let stale = cr#"{"version":2,"board":{"kind":"grid","markers_x":2,"markers_y":2,"marker_length":1.0,"marker_separation":0.5}}"#;
    let bad = unsafe { mc_board_from_json(stale.as_ptr()) };
    assert_eq!(bad, 0);
}
