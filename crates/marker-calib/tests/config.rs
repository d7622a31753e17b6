use marker_calib::{
    BoardConfig, BoardError, BoardGeometry, CalibrationConfig, ConfigError, HybridBoardSpec,
    PoseSelection, PredefinedDictionary, DEFAULT_MARKER_LENGTH_M, MIN_INTERPOLATED_FRAMES,
};

#[test]
fn defaults_reproduce_builtin_boards() {
    let cfg = CalibrationConfig::default();
    assert_eq!(cfg.pose.marker_length_m, DEFAULT_MARKER_LENGTH_M);
    assert_eq!(cfg.pose.selection, PoseSelection::First);
    assert_eq!(cfg.hybrid.min_frames, MIN_INTERPOLATED_FRAMES);
    assert!(cfg.hybrid.seed_interpolation_with_bootstrap);

    let BoardGeometry::Grid(grid) = cfg.build_board().expect("board") else {
        panic!("default board is a grid");
    };
    let spec = grid.spec();
    assert_eq!((spec.markers_x, spec.markers_y), (8, 5));
    assert_eq!((spec.marker_length, spec.marker_separation), (500.0, 100.0));
    assert_eq!(spec.dictionary, PredefinedDictionary::Dict6x6_250);
}

#[test]
fn config_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calibration.json");

    let mut cfg = CalibrationConfig {
        board: BoardConfig::hybrid(HybridBoardSpec::default()),
        ..CalibrationConfig::default()
    };
    cfg.pose.selection = PoseSelection::Id(12);
    cfg.hybrid.min_frames = 6;
    cfg.write_json(&path).expect("write");

    let loaded = CalibrationConfig::load_json(&path).expect("load");
    assert_eq!(loaded, cfg);
    assert!(loaded.build_board().expect("board").as_hybrid().is_some());
}

#[test]
fn sparse_json_fills_defaults() {
    let cfg: CalibrationConfig = serde_json::from_str(
        r#"{ "board": { "version": 1, "board": { "kind": "hybrid",
              "squares_x": 5, "squares_y": 7, "square_length": 0.04,
              "marker_length": 0.03, "dictionary": "DICT_4X4_50" } } }"#,
    )
    .expect("parse");
    let board = cfg.build_board().expect("board");
    assert_eq!(board.dictionary(), PredefinedDictionary::Dict4x4_50);
    assert_eq!(cfg.interpolator.min_markers, 1);
}

#[test]
fn unsupported_version_is_a_board_error() {
    let mut cfg = CalibrationConfig::default();
    cfg.board.version = 2;
    let err = cfg.build_board().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Board(BoardError::UnsupportedVersion { found: 2 })
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = CalibrationConfig::load_json(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
