//! Accumulation of per-frame marker observations.

use marker_calib_core::buffer::{extract, QuadPack8, ScalarCopy};
use marker_calib_core::{FrameImage, MarkerObservation, Quad};

/// Errors raised while appending a frame.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("frame has {corners} corner quads but {ids} ids")]
    LengthMismatch { corners: usize, ids: usize },
}

/// Markers detected in one captured frame.
///
/// The image is kept only when the frame is destined for hybrid-board
/// calibration, where chessboard corners are interpolated from it.
#[derive(Clone, Debug, Default)]
pub struct FrameObservation {
    markers: Vec<MarkerObservation>,
    image: Option<FrameImage>,
}

impl FrameObservation {
    pub fn new(markers: Vec<MarkerObservation>, image: Option<FrameImage>) -> Self {
        Self { markers, image }
    }

    /// Pair parallel quad and id arrays.
    pub fn from_parallel(
        corners: Vec<Quad>,
        ids: Vec<i32>,
        image: Option<FrameImage>,
    ) -> Result<Self, SessionError> {
        if corners.len() != ids.len() {
            return Err(SessionError::LengthMismatch {
                corners: corners.len(),
                ids: ids.len(),
            });
        }
        let markers = ids
            .into_iter()
            .zip(corners)
            .map(|(id, corners)| MarkerObservation::new(id, corners))
            .collect();
        Ok(Self { markers, image })
    }

    #[inline]
    pub fn markers(&self) -> &[MarkerObservation] {
        &self.markers
    }

    #[inline]
    pub fn image(&self) -> Option<&FrameImage> {
        self.image.as_ref()
    }

    #[inline]
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

/// Append-only, capture-ordered list of frames collected for one calibration.
///
/// Frames are never removed individually; call [`CalibrationSession::clear`]
/// or drop the session to start over. No bound is enforced on its length.
#[derive(Clone, Debug, Default)]
pub struct CalibrationSession {
    frames: Vec<FrameObservation>,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frames(&self) -> &[FrameObservation] {
        &self.frames
    }

    /// Total markers across all frames.
    pub fn marker_count(&self) -> usize {
        self.frames.iter().map(FrameObservation::marker_count).sum()
    }

    pub fn push_frame(&mut self, frame: FrameObservation) {
        self.frames.push(frame);
    }

    /// Append one frame given as parallel quad and id arrays.
    ///
    /// Ids are not checked for uniqueness; a marker detected twice in the
    /// same frame is passed through to the solver unchanged.
    pub fn push_detections(
        &mut self,
        corners: Vec<Quad>,
        ids: Vec<i32>,
        image: Option<FrameImage>,
    ) -> Result<(), SessionError> {
        let frame = FrameObservation::from_parallel(corners, ids, image)?;
        self.push_frame(frame);
        Ok(())
    }

    /// Append one frame from caller-owned flat buffers: 8 floats per marker
    /// quad and one id per marker. Both buffers are copied.
    ///
    /// # Panics
    ///
    /// Panics if `corners.len()` is not a multiple of 8.
    pub fn push_flat(
        &mut self,
        corners: &[f32],
        ids: &[i32],
        image: Option<FrameImage>,
    ) -> Result<(), SessionError> {
        let quads = extract(corners, 0, None, &QuadPack8);
        let ids = extract(ids, 0, None, &ScalarCopy);
        self.push_detections(quads, ids, image)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn push_flat_builds_one_frame_in_order() {
        let mut session = CalibrationSession::new();
        let flat: Vec<f32> = (0..16).map(|v| v as f32).collect();
        session.push_flat(&flat, &[5, 9], None).expect("push");

        assert_eq!(session.len(), 1);
        let frame = &session.frames()[0];
        assert_eq!(frame.marker_count(), 2);
        assert_eq!(frame.markers()[0].id, 5);
        assert_eq!(frame.markers()[1].id, 9);
        assert_eq!(frame.markers()[1].corners[0], Point2::new(8.0, 9.0));
        assert!(frame.image().is_none());
    }

    #[test]
    fn mismatched_ids_are_rejected_without_appending() {
        let mut session = CalibrationSession::new();
        let err = session.push_flat(&[0.0; 8], &[1, 2], None).unwrap_err();
        assert_eq!(err, SessionError::LengthMismatch { corners: 1, ids: 2 });
        assert!(session.is_empty());
    }

    #[test]
    fn duplicate_ids_are_kept() {
        let mut session = CalibrationSession::new();
        session.push_flat(&[0.0; 16], &[3, 3], None).expect("push");
        assert_eq!(session.marker_count(), 2);
        session.clear();
        assert!(session.is_empty());
    }
}
