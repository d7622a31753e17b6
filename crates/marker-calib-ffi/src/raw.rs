//! Borrowing caller-owned memory for the duration of one call.

use marker_calib::{CameraParams, FrameImage, ImageError};
use std::slice;

/// # Safety
///
/// When `len > 0`, `ptr` must be valid for reads of `len` elements.
pub(crate) unsafe fn slice_in<'a, T>(ptr: *const T, len: usize) -> Option<&'a [T]> {
    if len == 0 {
        Some(&[])
    } else if ptr.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(ptr, len))
    }
}

/// # Safety
///
/// When `len > 0`, `ptr` must be valid for writes of `len` elements.
pub(crate) unsafe fn slice_out<'a, T>(ptr: *mut T, len: usize) -> Option<&'a mut [T]> {
    if len == 0 {
        Some(&mut [])
    } else if ptr.is_null() {
        None
    } else {
        Some(slice::from_raw_parts_mut(ptr, len))
    }
}

/// # Safety
///
/// `ptr` must be null or valid for reads and writes of 3 `f64`.
pub(crate) unsafe fn vec3_out<'a>(ptr: *mut f64) -> Option<&'a mut [f64; 3]> {
    ptr.cast::<[f64; 3]>().as_mut()
}

/// Copy a caller frame into an owned image. `stride == 0` means packed rows.
///
/// # Safety
///
/// `pixels` must be valid for reads of `stride * (height - 1) + width * channels`
/// bytes.
pub(crate) unsafe fn copy_image(
    pixels: *const u8,
    width: u32,
    height: u32,
    channels: u32,
    stride: usize,
) -> Result<Option<FrameImage>, ImageError> {
    if pixels.is_null() {
        return Ok(None);
    }
    let (w, h, c) = (width as usize, height as usize, channels as usize);
    let row = w.saturating_mul(c);
    let stride = if stride == 0 { row } else { stride };
    if stride < row {
        return Err(ImageError::InvalidStride {
            stride,
            row_bytes: row,
        });
    }
    let len = if h == 0 {
        0
    } else {
        stride.saturating_mul(h - 1).saturating_add(row)
    };
    let data = slice::from_raw_parts(pixels, len);
    FrameImage::copy_strided(w, h, c, stride, data).map(Some)
}

/// # Safety
///
/// `matrix` must be valid for reads of 9 `f64` (row-major) and `dist` for
/// reads of `n_dist` `f64` when `n_dist > 0`.
pub(crate) unsafe fn camera_in(matrix: *const f64, dist: *const f64, n_dist: usize) -> Option<CameraParams> {
    let matrix = matrix.cast::<[f64; 9]>().as_ref()?;
    let dist = slice_in(dist, n_dist)?;
    Some(CameraParams::from_row_major(matrix, dist))
}

/// Write intrinsics back into caller buffers; the distortion copy is
/// truncated to the shorter of the two lengths.
pub(crate) fn camera_out(camera: &CameraParams, matrix: &mut [f64; 9], dist: &mut [f64]) {
    *matrix = camera.matrix_row_major();
    for (slot, value) in dist.iter_mut().zip(&camera.distortion) {
        *slot = *value;
    }
}
