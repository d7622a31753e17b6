use marker_calib::{
    report_pose, write_pose, CameraParams, FrameImage, FrameImageView, MarkerDetector,
    MarkerObservation, MarkerPose, PoseEstimator, PoseReporterParams, PoseSelection,
    PredefinedDictionary, Quad,
};
use nalgebra::{Point2, Vector3};
use std::cell::Cell;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct FakeDetector(Vec<MarkerObservation>);

impl MarkerDetector for FakeDetector {
    fn detect(
        &self,
        _image: FrameImageView<'_>,
        _dictionary: PredefinedDictionary,
    ) -> Vec<MarkerObservation> {
        self.0.clone()
    }
}

/// Places marker `i` at depth `i + 1` and records the requested marker size.
#[derive(Default)]
struct DepthEstimator {
    marker_length: Cell<f64>,
}

impl PoseEstimator for DepthEstimator {
    fn estimate_poses(
        &self,
        corners: &[Quad],
        marker_length_m: f64,
        _camera: &CameraParams,
    ) -> Vec<MarkerPose> {
        self.marker_length.set(marker_length_m);
        (0..corners.len())
            .map(|i| MarkerPose {
                rvec: Vector3::new(0.0, 0.0, 0.1),
                tvec: Vector3::new(0.0, 0.0, (i + 1) as f64),
            })
            .collect()
    }
}

fn marker(id: i32) -> MarkerObservation {
    MarkerObservation::new(
        id,
        [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ],
    )
}

fn frame() -> FrameImage {
    FrameImage::from_packed(16, 16, 3, vec![0; 16 * 16 * 3]).expect("image")
}

#[test]
fn no_detection_leaves_pose_buffers_untouched() {
    init_logs();
    let image = frame();
    let estimator = DepthEstimator::default();
    let reported = report_pose(
        image.view(),
        &CameraParams::default(),
        &FakeDetector(Vec::new()),
        &estimator,
        &PoseReporterParams::default(),
    );
    assert!(reported.is_none());

    let mut rvec = [1.0, 2.0, 3.0];
    let mut tvec = [4.0, 5.0, 6.0];
    assert!(!write_pose(reported.as_ref().map(|r| &r.pose), &mut rvec, &mut tvec));
    assert_eq!(rvec, [1.0, 2.0, 3.0]);
    assert_eq!(tvec, [4.0, 5.0, 6.0]);
    assert_eq!(estimator.marker_length.get(), 0.0);
}

#[test]
fn first_marker_pose_is_written_with_default_size() {
    init_logs();
    let image = frame();
    let estimator = DepthEstimator::default();
    let reported = report_pose(
        image.view(),
        &CameraParams::default(),
        &FakeDetector(vec![marker(11), marker(4)]),
        &estimator,
        &PoseReporterParams::default(),
    )
    .expect("pose");
    assert_eq!(reported.marker.id, 11);
    assert_eq!(estimator.marker_length.get(), 0.078);

    let mut rvec = [0.0; 3];
    let mut tvec = [0.0; 3];
    assert!(write_pose(Some(&reported.pose), &mut rvec, &mut tvec));
    assert_eq!(rvec, [0.0, 0.0, 0.1]);
    assert_eq!(tvec, [0.0, 0.0, 1.0]);
}

#[test]
fn id_selection_picks_requested_marker() {
    init_logs();
    let image = frame();
    let params = PoseReporterParams {
        selection: PoseSelection::Id(4),
        ..PoseReporterParams::default()
    };
    let reported = report_pose(
        image.view(),
        &CameraParams::default(),
        &FakeDetector(vec![marker(11), marker(4)]),
        &DepthEstimator::default(),
        &params,
    )
    .expect("pose");
    assert_eq!(reported.marker.id, 4);
    assert_eq!(reported.pose.tvec.z, 2.0);
}
