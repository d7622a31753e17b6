//! Calibration board geometry.
//!
//! Two board families are supported:
//! - [`GridBoard`]: a planar grid of markers separated by a fixed gap,
//! - [`HybridBoard`]: a chessboard with markers inside the white squares
//!   (ChArUco-style), whose inner chessboard intersections are the refined
//!   calibration corners.
//!
//! Board coordinates have their origin at the top-left board corner, x to the
//! right, y down, z = 0 on the board plane. Lengths are in caller units.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Current [`BoardConfig`] schema version.
pub const BOARD_CONFIG_VERSION: u32 = 1;

/// Predefined marker dictionaries, named as in OpenCV.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PredefinedDictionary {
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "DICT_4X4_100")]
    Dict4x4_100,
    #[serde(rename = "DICT_4X4_250")]
    Dict4x4_250,
    #[serde(rename = "DICT_4X4_1000")]
    Dict4x4_1000,
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "DICT_5X5_250")]
    Dict5x5_250,
    #[serde(rename = "DICT_5X5_1000")]
    Dict5x5_1000,
    #[serde(rename = "DICT_6X6_50")]
    Dict6x6_50,
    #[serde(rename = "DICT_6X6_100")]
    Dict6x6_100,
    #[serde(rename = "DICT_6X6_250")]
    #[default]
    Dict6x6_250,
    #[serde(rename = "DICT_6X6_1000")]
    Dict6x6_1000,
    #[serde(rename = "DICT_7X7_50")]
    Dict7x7_50,
    #[serde(rename = "DICT_7X7_100")]
    Dict7x7_100,
    #[serde(rename = "DICT_7X7_250")]
    Dict7x7_250,
    #[serde(rename = "DICT_7X7_1000")]
    Dict7x7_1000,
}

use PredefinedDictionary as D;

const DICTIONARIES: [(PredefinedDictionary, &str, usize, u32); 16] = [
    (D::Dict4x4_50, "DICT_4X4_50", 4, 50),
    (D::Dict4x4_100, "DICT_4X4_100", 4, 100),
    (D::Dict4x4_250, "DICT_4X4_250", 4, 250),
    (D::Dict4x4_1000, "DICT_4X4_1000", 4, 1000),
    (D::Dict5x5_50, "DICT_5X5_50", 5, 50),
    (D::Dict5x5_100, "DICT_5X5_100", 5, 100),
    (D::Dict5x5_250, "DICT_5X5_250", 5, 250),
    (D::Dict5x5_1000, "DICT_5X5_1000", 5, 1000),
    (D::Dict6x6_50, "DICT_6X6_50", 6, 50),
    (D::Dict6x6_100, "DICT_6X6_100", 6, 100),
    (D::Dict6x6_250, "DICT_6X6_250", 6, 250),
    (D::Dict6x6_1000, "DICT_6X6_1000", 6, 1000),
    (D::Dict7x7_50, "DICT_7X7_50", 7, 50),
    (D::Dict7x7_100, "DICT_7X7_100", 7, 100),
    (D::Dict7x7_250, "DICT_7X7_250", 7, 250),
    (D::Dict7x7_1000, "DICT_7X7_1000", 7, 1000),
];

impl PredefinedDictionary {
    fn entry(self) -> (PredefinedDictionary, &'static str, usize, u32) {
        DICTIONARIES[self as usize]
    }

    /// OpenCV-style name, e.g. `DICT_6X6_250`.
    pub fn name(self) -> &'static str {
        self.entry().1
    }

    /// Inner bits per marker side.
    pub fn marker_bits(self) -> usize {
        self.entry().2
    }

    /// Number of distinct marker ids.
    pub fn len(self) -> u32 {
        self.entry().3
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn from_name(name: &str) -> Option<Self> {
        DICTIONARIES
            .iter()
            .find(|(_, n, _, _)| n.eq_ignore_ascii_case(name))
            .map(|(d, _, _, _)| *d)
    }

    /// Ordinal used across the C boundary (position in the table above).
    pub fn from_index(index: u32) -> Option<Self> {
        DICTIONARIES.get(index as usize).map(|e| e.0)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self as u32
    }
}

/// Board validation errors.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BoardError {
    #[error("board must have at least {min} columns and rows (got {x}x{y})")]
    InvalidSize { x: u32, y: u32, min: u32 },
    #[error("{what} must be a positive finite length (got {value})")]
    InvalidLength { what: &'static str, value: f32 },
    #[error("marker length {marker} must be smaller than square length {square}")]
    MarkerTooLarge { marker: f32, square: f32 },
    #[error("board needs {needed} markers, {dictionary} has {available}")]
    NotEnoughDictionaryCodes {
        dictionary: &'static str,
        needed: u32,
        available: u32,
    },
    #[error("unsupported board config version {found} (expected {})", BOARD_CONFIG_VERSION)]
    UnsupportedVersion { found: u32 },
}

fn check_length(what: &'static str, value: f32) -> Result<(), BoardError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BoardError::InvalidLength { what, value })
    }
}

fn check_dictionary(dictionary: PredefinedDictionary, needed: u32) -> Result<(), BoardError> {
    let available = dictionary.len();
    if needed > available {
        return Err(BoardError::NotEnoughDictionaryCodes {
            dictionary: dictionary.name(),
            needed,
            available,
        });
    }
    Ok(())
}

/// Planar marker grid: `markers_x` by `markers_y` markers, ids assigned in
/// row-major order starting at 0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridBoardSpec {
    pub markers_x: u32,
    pub markers_y: u32,
    pub marker_length: f32,
    pub marker_separation: f32,
    #[serde(default)]
    pub dictionary: PredefinedDictionary,
}

impl Default for GridBoardSpec {
    fn default() -> Self {
        Self {
            markers_x: 8,
            markers_y: 5,
            marker_length: 500.0,
            marker_separation: 100.0,
            dictionary: PredefinedDictionary::Dict6x6_250,
        }
    }
}

/// Chessboard of `squares_x` by `squares_y` squares with a marker of side
/// `marker_length` centred in every white square.
///
/// The top-left square is black; markers sit on squares with odd `x + y` and
/// are numbered in row-major order over those squares.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybridBoardSpec {
    pub squares_x: u32,
    pub squares_y: u32,
    pub square_length: f32,
    pub marker_length: f32,
    #[serde(default)]
    pub dictionary: PredefinedDictionary,
}

impl Default for HybridBoardSpec {
    fn default() -> Self {
        Self {
            squares_x: 8,
            squares_y: 5,
            square_length: 300.0,
            marker_length: 200.0,
            dictionary: PredefinedDictionary::Dict6x6_250,
        }
    }
}

/// Validated marker grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridBoard {
    spec: GridBoardSpec,
}

impl GridBoard {
    pub fn new(spec: GridBoardSpec) -> Result<Self, BoardError> {
        if spec.markers_x < 1 || spec.markers_y < 1 {
            return Err(BoardError::InvalidSize {
                x: spec.markers_x,
                y: spec.markers_y,
                min: 1,
            });
        }
        check_length("marker_length", spec.marker_length)?;
        if !spec.marker_separation.is_finite() || spec.marker_separation < 0.0 {
            return Err(BoardError::InvalidLength {
                what: "marker_separation",
                value: spec.marker_separation,
            });
        }
        check_dictionary(spec.dictionary, spec.markers_x.saturating_mul(spec.markers_y))?;
        Ok(Self { spec })
    }

    #[inline]
    pub fn spec(&self) -> GridBoardSpec {
        self.spec
    }

    #[inline]
    pub fn marker_count(&self) -> u32 {
        self.spec.markers_x * self.spec.markers_y
    }

    /// Board-plane corners (TL, TR, BR, BL) of marker `id`.
    pub fn marker_object_corners(&self, id: i32) -> Option<[Point3<f32>; 4]> {
        let id = u32::try_from(id).ok().filter(|&id| id < self.marker_count())?;
        let pitch = self.spec.marker_length + self.spec.marker_separation;
        let x0 = (id % self.spec.markers_x) as f32 * pitch;
        let y0 = (id / self.spec.markers_x) as f32 * pitch;
        Some(square_corners(x0, y0, self.spec.marker_length))
    }
}

/// Validated chessboard-marker hybrid board.
#[derive(Clone, Debug, PartialEq)]
pub struct HybridBoard {
    spec: HybridBoardSpec,
    marker_cells: Vec<[u32; 2]>,
}

impl HybridBoard {
    pub fn new(spec: HybridBoardSpec) -> Result<Self, BoardError> {
        if spec.squares_x < 2 || spec.squares_y < 2 {
            return Err(BoardError::InvalidSize {
                x: spec.squares_x,
                y: spec.squares_y,
                min: 2,
            });
        }
        check_length("square_length", spec.square_length)?;
        check_length("marker_length", spec.marker_length)?;
        if spec.marker_length >= spec.square_length {
            return Err(BoardError::MarkerTooLarge {
                marker: spec.marker_length,
                square: spec.square_length,
            });
        }

        // Odd-parity squares: floor(x * y / 2).
        let needed = u64::from(spec.squares_x) * u64::from(spec.squares_y) / 2;
        check_dictionary(spec.dictionary, u32::try_from(needed).unwrap_or(u32::MAX))?;

        let mut marker_cells = Vec::with_capacity(needed as usize);
        for y in 0..spec.squares_y {
            for x in 0..spec.squares_x {
                if (x + y) % 2 == 1 {
                    marker_cells.push([x, y]);
                }
            }
        }

        Ok(Self { spec, marker_cells })
    }

    #[inline]
    pub fn spec(&self) -> HybridBoardSpec {
        self.spec
    }

    #[inline]
    pub fn marker_count(&self) -> u32 {
        self.marker_cells.len() as u32
    }

    /// Inner chessboard intersections per row.
    #[inline]
    pub fn inner_cols(&self) -> u32 {
        self.spec.squares_x - 1
    }

    /// Inner chessboard intersections per column.
    #[inline]
    pub fn inner_rows(&self) -> u32 {
        self.spec.squares_y - 1
    }

    #[inline]
    pub fn corner_count(&self) -> u32 {
        self.inner_cols() * self.inner_rows()
    }

    /// Square `(x, y)` holding marker `id`.
    pub fn marker_cell(&self, id: i32) -> Option<[u32; 2]> {
        let id = usize::try_from(id).ok()?;
        self.marker_cells.get(id).copied()
    }

    /// Board-plane corners (TL, TR, BR, BL) of marker `id`, centred in its square.
    pub fn marker_object_corners(&self, id: i32) -> Option<[Point3<f32>; 4]> {
        let [sx, sy] = self.marker_cell(id)?;
        let sq = self.spec.square_length;
        let inset = 0.5 * (sq - self.spec.marker_length);
        Some(square_corners(
            sx as f32 * sq + inset,
            sy as f32 * sq + inset,
            self.spec.marker_length,
        ))
    }

    /// Row-major corner id of the intersection at board corner `(ix, iy)`.
    ///
    /// Only inner intersections (`1..squares`) have ids.
    pub fn corner_id(&self, ix: u32, iy: u32) -> Option<u32> {
        if ix == 0 || iy == 0 || ix >= self.spec.squares_x || iy >= self.spec.squares_y {
            return None;
        }
        Some((iy - 1) * self.inner_cols() + (ix - 1))
    }

    /// Board-plane position of chessboard corner `id`.
    pub fn corner_object_xy(&self, id: u32) -> Option<Point2<f32>> {
        if id >= self.corner_count() {
            return None;
        }
        let sq = self.spec.square_length;
        let i = (id % self.inner_cols() + 1) as f32;
        let j = (id / self.inner_cols() + 1) as f32;
        Some(Point2::new(i * sq, j * sq))
    }

    /// Inner corners on the boundary of marker `id`'s square, in TL, TR, BR,
    /// BL order. Markers on the board border have fewer than four.
    pub fn marker_adjacent_corners(&self, id: i32) -> Vec<u32> {
        let Some([sx, sy]) = self.marker_cell(id) else {
            return Vec::new();
        };
        [(sx, sy), (sx + 1, sy), (sx + 1, sy + 1), (sx, sy + 1)]
            .into_iter()
            .filter_map(|(ix, iy)| self.corner_id(ix, iy))
            .collect()
    }
}

fn square_corners(x0: f32, y0: f32, side: f32) -> [Point3<f32>; 4] {
    [
        Point3::new(x0, y0, 0.0),
        Point3::new(x0 + side, y0, 0.0),
        Point3::new(x0 + side, y0 + side, 0.0),
        Point3::new(x0, y0 + side, 0.0),
    ]
}

/// Serializable board description, tagged by `kind`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardSpec {
    Grid(GridBoardSpec),
    Hybrid(HybridBoardSpec),
}

/// Versioned board description shared by every calibration entry point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub version: u32,
    pub board: BoardSpec,
}

impl BoardConfig {
    pub fn grid(spec: GridBoardSpec) -> Self {
        Self {
            version: BOARD_CONFIG_VERSION,
            board: BoardSpec::Grid(spec),
        }
    }

    pub fn hybrid(spec: HybridBoardSpec) -> Self {
        Self {
            version: BOARD_CONFIG_VERSION,
            board: BoardSpec::Hybrid(spec),
        }
    }

    /// Validate and build the board.
    pub fn build(&self) -> Result<BoardGeometry, BoardError> {
        if self.version != BOARD_CONFIG_VERSION {
            return Err(BoardError::UnsupportedVersion {
                found: self.version,
            });
        }
        match self.board {
            BoardSpec::Grid(spec) => GridBoard::new(spec).map(BoardGeometry::Grid),
            BoardSpec::Hybrid(spec) => HybridBoard::new(spec).map(BoardGeometry::Hybrid),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::grid(GridBoardSpec::default())
    }
}

/// Board geometry chosen once per session.
#[derive(Clone, Debug, PartialEq)]
pub enum BoardGeometry {
    Grid(GridBoard),
    Hybrid(HybridBoard),
}

impl BoardGeometry {
    pub fn dictionary(&self) -> PredefinedDictionary {
        match self {
            BoardGeometry::Grid(b) => b.spec().dictionary,
            BoardGeometry::Hybrid(b) => b.spec().dictionary,
        }
    }

    pub fn marker_count(&self) -> u32 {
        match self {
            BoardGeometry::Grid(b) => b.marker_count(),
            BoardGeometry::Hybrid(b) => b.marker_count(),
        }
    }

    pub fn marker_object_corners(&self, id: i32) -> Option<[Point3<f32>; 4]> {
        match self {
            BoardGeometry::Grid(b) => b.marker_object_corners(id),
            BoardGeometry::Hybrid(b) => b.marker_object_corners(id),
        }
    }

    pub fn as_grid(&self) -> Option<&GridBoard> {
        match self {
            BoardGeometry::Grid(b) => Some(b),
            BoardGeometry::Hybrid(_) => None,
        }
    }

    pub fn as_hybrid(&self) -> Option<&HybridBoard> {
        match self {
            BoardGeometry::Hybrid(b) => Some(b),
            BoardGeometry::Grid(_) => None,
        }
    }

    pub fn to_config(&self) -> BoardConfig {
        match self {
            BoardGeometry::Grid(b) => BoardConfig::grid(b.spec()),
            BoardGeometry::Hybrid(b) => BoardConfig::hybrid(b.spec()),
        }
    }
}

impl From<GridBoard> for BoardGeometry {
    fn from(b: GridBoard) -> Self {
        BoardGeometry::Grid(b)
    }
}

impl From<HybridBoard> for BoardGeometry {
    fn from(b: HybridBoard) -> Self {
        BoardGeometry::Hybrid(b)
    }
}
