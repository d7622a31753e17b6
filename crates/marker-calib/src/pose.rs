//! Single-frame marker pose reporting.

use crate::backend::{MarkerDetector, MarkerPose, PoseEstimator};
use crate::board::PredefinedDictionary;
use marker_calib_core::{CameraParams, FrameImageView, MarkerObservation};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Physical marker side length assumed by the pose reporter, in metres.
pub const DEFAULT_MARKER_LENGTH_M: f64 = 0.078;

/// Which detected marker's pose is reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseSelection {
    /// First marker in detection order.
    #[default]
    First,
    /// Smallest translation norm.
    Nearest,
    /// Largest quad area in the image.
    Largest,
    /// The marker with this id, if detected.
    Id(i32),
}

fn default_marker_length() -> f64 {
    DEFAULT_MARKER_LENGTH_M
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseReporterParams {
    #[serde(default = "default_marker_length")]
    pub marker_length_m: f64,
    #[serde(default)]
    pub selection: PoseSelection,
    #[serde(default)]
    pub dictionary: PredefinedDictionary,
}

impl Default for PoseReporterParams {
    fn default() -> Self {
        Self {
            marker_length_m: DEFAULT_MARKER_LENGTH_M,
            selection: PoseSelection::First,
            dictionary: PredefinedDictionary::default(),
        }
    }
}

/// Pose of the selected marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReportedPose {
    pub marker: MarkerObservation,
    pub pose: MarkerPose,
}

/// Detect markers in one live frame and pick one representative pose.
///
/// Returns `None` when nothing is detected or the selection matches no
/// marker. Independent of any calibration session.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(selection = ?params.selection))
)]
pub fn report_pose<D, P>(
    image: FrameImageView<'_>,
    camera: &CameraParams,
    detector: &D,
    estimator: &P,
    params: &PoseReporterParams,
) -> Option<ReportedPose>
where
    D: MarkerDetector + ?Sized,
    P: PoseEstimator + ?Sized,
{
    log::debug!("camera matrix = {:?}", camera.matrix_row_major());
    let markers = detector.detect(image, params.dictionary);
    log::debug!("{} markers detected", markers.len());
    if markers.is_empty() {
        return None;
    }

    let quads: Vec<_> = markers.iter().map(|m| m.corners).collect();
    let poses = estimator.estimate_poses(&quads, params.marker_length_m, camera);
    if poses.len() != markers.len() {
        log::warn!(
            "pose estimator returned {} poses for {} markers",
            poses.len(),
            markers.len()
        );
    }
    for (marker, pose) in markers.iter().zip(&poses) {
        log::debug!(
            "marker {}: rvec = {:?}, tvec = {:?}",
            marker.id,
            pose.rvec.as_slice(),
            pose.tvec.as_slice()
        );
    }

    select(params.selection, &markers, &poses)
}

fn select(
    selection: PoseSelection,
    markers: &[MarkerObservation],
    poses: &[MarkerPose],
) -> Option<ReportedPose> {
    let mut pairs = markers.iter().zip(poses);
    let (marker, pose) = match selection {
        PoseSelection::First => pairs.next(),
        PoseSelection::Nearest => pairs.min_by(|a, b| a.1.tvec.norm().total_cmp(&b.1.tvec.norm())),
        PoseSelection::Largest => pairs.max_by(|a, b| a.0.area().total_cmp(&b.0.area())),
        PoseSelection::Id(id) => pairs.find(|(m, _)| m.id == id),
    }?;
    Some(ReportedPose {
        marker: *marker,
        pose: *pose,
    })
}

/// Write `pose` into caller buffers. With `None` the buffers keep their
/// previous contents and `false` is returned.
pub fn write_pose(pose: Option<&MarkerPose>, rvec: &mut [f64; 3], tvec: &mut [f64; 3]) -> bool {
    let Some(pose) = pose else {
        return false;
    };
    rvec.copy_from_slice(pose.rvec.as_slice());
    tvec.copy_from_slice(pose.tvec.as_slice());
    true
}
