//! Per-frame calibration-corner detection with fixed-capacity output.

use crate::backend::MarkerDetector;
use crate::board::PredefinedDictionary;
use marker_calib_core::buffer::write_quads;
use marker_calib_core::{FrameImageView, MarkerObservation};

/// Caller-owned output buffers for [`detect_calibration_corners`].
#[derive(Debug)]
pub struct CornerOutputs<'a> {
    /// 8 floats per marker: `x0, y0, .., x3, y3`.
    pub corners: &'a mut [f32],
    pub ids: &'a mut [i32],
    /// Image size as `[rows, cols]`.
    pub size: &'a mut [i32; 2],
}

/// Copy up to `max_markers` detections into `out`.
///
/// Writes are additionally bounded by the lengths of `out.corners` and
/// `out.ids`. Returns the number of markers written.
pub fn write_calibration_corners(
    markers: &[MarkerObservation],
    rows: u32,
    cols: u32,
    max_markers: usize,
    out: CornerOutputs<'_>,
) -> usize {
    let n = markers
        .len()
        .min(max_markers)
        .min(out.ids.len())
        .min(out.corners.len() / 8);
    let quads: Vec<_> = markers[..n].iter().map(|m| m.corners).collect();
    write_quads(&quads, &mut out.corners[..n * 8]);
    for (slot, marker) in out.ids.iter_mut().zip(&markers[..n]) {
        *slot = marker.id;
    }
    *out.size = [
        i32::try_from(rows).unwrap_or(i32::MAX),
        i32::try_from(cols).unwrap_or(i32::MAX),
    ];
    n
}

/// Detect markers in `image` and export them for an external calibrator.
///
/// When nothing is detected returns `0` and leaves `out` untouched.
/// Otherwise writes at most `max_markers` entries plus the image size and
/// returns the total number detected, which may exceed the written count.
pub fn detect_calibration_corners<D>(
    image: FrameImageView<'_>,
    dictionary: PredefinedDictionary,
    detector: &D,
    max_markers: usize,
    out: CornerOutputs<'_>,
) -> usize
where
    D: MarkerDetector + ?Sized,
{
    let markers = detector.detect(image, dictionary);
    if markers.is_empty() {
        return 0;
    }
    let size = image.size();
    let written = write_calibration_corners(&markers, size.height, size.width, max_markers, out);
    log::debug!("{} markers detected, {written} exported", markers.len());
    markers.len()
}
