//! Flat, solver-ready view of a calibration session.

use crate::session::CalibrationSession;
use marker_calib_core::Quad;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Concatenated observations of every frame plus per-frame marker counts.
///
/// `corners[i]` and `ids[i]` describe the same marker. Frame `f` owns the
/// `per_frame_counts[f]` entries following those of frames `0..f`, in the
/// order they were detected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenedObservations {
    pub corners: Vec<Quad>,
    pub ids: Vec<i32>,
    pub per_frame_counts: Vec<usize>,
}

impl FlattenedObservations {
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.per_frame_counts.len()
    }

    /// Re-segment the flat arrays into `(corners, ids)` per frame.
    pub fn frames(&self) -> impl Iterator<Item = (&[Quad], &[i32])> + '_ {
        let mut start = 0;
        self.per_frame_counts.iter().map(move |&n| {
            let range = start..start + n;
            start += n;
            (&self.corners[range.clone()], &self.ids[range])
        })
    }

    /// Marker counts as `i32`, the width expected by C-side solvers.
    pub fn per_frame_counts_i32(&self) -> Vec<i32> {
        self.per_frame_counts
            .iter()
            .map(|&n| i32::try_from(n).unwrap_or(i32::MAX))
            .collect()
    }
}

/// Flatten `session` without reordering or deduplicating anything.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(session), fields(frames = session.len()))
)]
pub fn flatten(session: &CalibrationSession) -> FlattenedObservations {
    let total = session.marker_count();
    let mut out = FlattenedObservations {
        corners: Vec::with_capacity(total),
        ids: Vec::with_capacity(total),
        per_frame_counts: Vec::with_capacity(session.len()),
    };
    for frame in session.frames() {
        out.per_frame_counts.push(frame.marker_count());
        for marker in frame.markers() {
            out.corners.push(marker.corners);
            out.ids.push(marker.id);
        }
    }
    out
}
