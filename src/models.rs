use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// Cells per grid axis.
pub const GRID_DIM: usize = 9;
/// Cells per grid.
pub const CELL_COUNT: usize = GRID_DIM * GRID_DIM;
/// Lattice lines per axis.
pub const LINE_COUNT: usize = GRID_DIM + 1;
/// Largest ordinal marker size.
pub const MAX_MARKER_SIZE: u8 = 5;

/// Marker colors the classifier can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarkerColor {
    Green,
    Cyan,
    Blue,
    Red,
    Yellow,
}

impl MarkerColor {
    /// Detection order. On an exact coverage tie the earlier color wins.
    pub const ALL: [MarkerColor; 5] = [
        MarkerColor::Green,
        MarkerColor::Cyan,
        MarkerColor::Blue,
        MarkerColor::Red,
        MarkerColor::Yellow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarkerColor::Green => "GREEN",
            MarkerColor::Cyan => "CYAN",
            MarkerColor::Blue => "BLUE",
            MarkerColor::Red => "RED",
            MarkerColor::Yellow => "YELLOW",
        }
    }

    /// RGB used when drawing this color on diagnostic overlays.
    pub fn display_rgb(self) -> [u8; 3] {
        match self {
            MarkerColor::Green => [0, 255, 0],
            MarkerColor::Cyan => [0, 255, 255],
            MarkerColor::Blue => [0, 0, 255],
            MarkerColor::Red => [255, 0, 0],
            MarkerColor::Yellow => [255, 255, 0],
        }
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MarkerColor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        MarkerColor::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown marker color: {s}"))
    }
}

/// Square region holding the 9x9 grid plus its lattice line coordinates.
///
/// `lines_h` are y coordinates of the horizontal lines, `lines_v` are x
/// coordinates of the vertical lines. Both are strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub lines_h: [f32; LINE_COUNT],
    pub lines_v: [f32; LINE_COUNT],
}

impl GridBounds {
    /// Evenly divide a square of side `size` anchored at `(x, y)`.
    pub fn square(x: u32, y: u32, size: u32) -> Option<Self> {
        Self::evenly_spaced(x, y, size, size)
    }

    /// Evenly divide a `width` x `height` rectangle, each axis on its own step.
    pub fn evenly_spaced(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if width < GRID_DIM as u32 || height < GRID_DIM as u32 {
            return None;
        }
        let step_v = width as f32 / GRID_DIM as f32;
        let step_h = height as f32 / GRID_DIM as f32;
        let lines_v = std::array::from_fn(|i| x as f32 + i as f32 * step_v);
        let lines_h = std::array::from_fn(|i| y as f32 + i as f32 * step_h);
        Self::from_lines(lines_h, lines_v)
    }

    /// Build bounds from explicit lattice lines.
    pub fn from_lines(lines_h: [f32; LINE_COUNT], lines_v: [f32; LINE_COUNT]) -> Option<Self> {
        if !strictly_increasing(&lines_h) || !strictly_increasing(&lines_v) {
            return None;
        }
        let span_h = lines_h[GRID_DIM] - lines_h[0];
        let span_v = lines_v[GRID_DIM] - lines_v[0];
        Some(Self {
            x: lines_v[0].round() as u32,
            y: lines_h[0].round() as u32,
            size: span_h.min(span_v).round() as u32,
            lines_h,
            lines_v,
        })
    }

    /// Mean cell edge length along both axes.
    pub fn cell_size(&self) -> (f32, f32) {
        let n = GRID_DIM as f32;
        (
            (self.lines_v[GRID_DIM] - self.lines_v[0]) / n,
            (self.lines_h[GRID_DIM] - self.lines_h[0]) / n,
        )
    }
}

fn strictly_increasing(lines: &[f32]) -> bool {
    lines.iter().all(|v| v.is_finite() && *v >= 0.0) && lines.windows(2).all(|w| w[1] > w[0])
}

/// Classification of one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReading {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub color: Option<MarkerColor>,
    pub size: Option<u8>,
    pub confidence: f32,
    pub diameter_ratio: f32,
}

impl CellReading {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            row: index / GRID_DIM,
            col: index % GRID_DIM,
            color: None,
            size: None,
            confidence: 0.0,
            diameter_ratio: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_none()
    }
}

/// Result of reading one photograph.
///
/// Always holds 81 colors and 81 sizes; `grid_size[i]` is `None` exactly
/// when `grid_color[i]` is `None`. A failed reading is all `None` with
/// `success == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGridReading")]
pub struct GridReading {
    grid_color: Vec<Option<MarkerColor>>,
    grid_size: Vec<Option<u8>>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<GridBounds>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cells: Vec<CellReading>,
}

#[derive(Deserialize)]
struct RawGridReading {
    grid_color: Vec<Option<MarkerColor>>,
    grid_size: Vec<Option<u8>>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    bounds: Option<GridBounds>,
    #[serde(default)]
    cells: Vec<CellReading>,
}

fn default_success() -> bool {
    true
}

impl TryFrom<RawGridReading> for GridReading {
    type Error = GridError;

    fn try_from(raw: RawGridReading) -> Result<Self> {
        let mut reading = if raw.success {
            GridReading::new(raw.grid_color, raw.grid_size)?
        } else {
            GridReading::failed(raw.error.clone().unwrap_or_default())
        };
        reading.error = raw.error;
        reading.bounds = raw.bounds;
        reading.cells = raw.cells;
        Ok(reading)
    }
}

impl GridReading {
    /// A successful reading from explicit per-cell colors and sizes.
    pub fn new(grid_color: Vec<Option<MarkerColor>>, grid_size: Vec<Option<u8>>) -> Result<Self> {
        check_len(grid_color.len())?;
        check_len(grid_size.len())?;
        // Sizes without a color, or colors without a size, are repaired to empty.
        let (grid_color, grid_size) = grid_color
            .into_iter()
            .zip(grid_size)
            .map(|(color, size)| match (color, size) {
                (Some(c), Some(s)) if s > 0 => (Some(c), Some(s.min(MAX_MARKER_SIZE))),
                _ => (None, None),
            })
            .unzip();
        Ok(Self {
            grid_color,
            grid_size,
            success: true,
            error: None,
            bounds: None,
            cells: Vec::new(),
        })
    }

    /// Build a successful reading from the 81 classified cells.
    pub fn from_cells(cells: Vec<CellReading>, bounds: GridBounds) -> Result<Self> {
        let colors = cells.iter().map(|c| c.color).collect();
        let sizes = cells.iter().map(|c| c.size).collect();
        let mut reading = Self::new(colors, sizes)?;
        reading.bounds = Some(bounds);
        reading.cells = cells;
        Ok(reading)
    }

    /// A reading for a photograph that could not be used.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            grid_color: vec![None; CELL_COUNT],
            grid_size: vec![None; CELL_COUNT],
            success: false,
            error: Some(reason.into()),
            bounds: None,
            cells: Vec::new(),
        }
    }

    /// Drop the per-cell diagnostics.
    pub fn without_details(mut self) -> Self {
        self.cells.clear();
        self
    }

    pub fn grid_color(&self) -> &[Option<MarkerColor>] {
        &self.grid_color
    }

    pub fn grid_size(&self) -> &[Option<u8>] {
        &self.grid_size
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn bounds(&self) -> Option<&GridBounds> {
        self.bounds.as_ref()
    }

    pub fn cells(&self) -> &[CellReading] {
        &self.cells
    }

    pub fn marker_count(&self) -> usize {
        self.grid_color.iter().filter(|c| c.is_some()).count()
    }
}

fn check_len(found: usize) -> Result<()> {
    if found != CELL_COUNT {
        return Err(GridError::InvalidGridLength {
            expected: CELL_COUNT,
            found,
        });
    }
    Ok(())
}

/// Colors and sizes of a grid ready for scoring. Size 0 means no marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMarkerGrid")]
pub struct MarkerGrid {
    grid_color: Vec<Option<MarkerColor>>,
    grid_size: Vec<u8>,
}

#[derive(Deserialize)]
struct RawMarkerGrid {
    grid_color: Vec<Option<MarkerColor>>,
    grid_size: Vec<Option<u8>>,
}

impl TryFrom<RawMarkerGrid> for MarkerGrid {
    type Error = GridError;

    fn try_from(raw: RawMarkerGrid) -> Result<Self> {
        let sizes = raw.grid_size.into_iter().map(|s| s.unwrap_or(0)).collect();
        MarkerGrid::new(raw.grid_color, sizes)
    }
}

impl MarkerGrid {
    pub fn empty() -> Self {
        Self {
            grid_color: vec![None; CELL_COUNT],
            grid_size: vec![0; CELL_COUNT],
        }
    }

    /// A cell is kept only when it has both a color and a nonzero size.
    pub fn new(grid_color: Vec<Option<MarkerColor>>, grid_size: Vec<u8>) -> Result<Self> {
        check_len(grid_color.len())?;
        check_len(grid_size.len())?;
        let (grid_color, grid_size) = grid_color
            .into_iter()
            .zip(grid_size)
            .map(|(color, size)| match color {
                Some(c) if size > 0 => (Some(c), size),
                _ => (None, 0),
            })
            .unzip();
        Ok(Self {
            grid_color,
            grid_size,
        })
    }

    pub fn grid_color(&self) -> &[Option<MarkerColor>] {
        &self.grid_color
    }

    pub fn grid_size(&self) -> &[u8] {
        &self.grid_size
    }

    pub fn color(&self, index: usize) -> Option<MarkerColor> {
        self.grid_color.get(index).copied().flatten()
    }

    pub fn size(&self, index: usize) -> u8 {
        self.grid_size.get(index).copied().unwrap_or(0)
    }

    /// Number of cells holding `color`.
    pub fn count(&self, color: MarkerColor) -> usize {
        self.grid_color.iter().filter(|c| **c == Some(color)).count()
    }
}

impl From<&GridReading> for MarkerGrid {
    fn from(reading: &GridReading) -> Self {
        Self {
            grid_color: reading.grid_color.clone(),
            grid_size: reading.grid_size.iter().map(|s| s.unwrap_or(0)).collect(),
        }
    }
}

/// The two hands an exercise sheet records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn label_zh(self) -> &'static str {
        match self {
            Hand::Left => "左手",
            Hand::Right => "右手",
        }
    }
}

/// Which marker color records which hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHandMap")]
pub struct HandMap {
    left: MarkerColor,
    right: MarkerColor,
}

#[derive(Deserialize)]
struct RawHandMap {
    left: MarkerColor,
    right: MarkerColor,
}

impl TryFrom<RawHandMap> for HandMap {
    type Error = GridError;

    fn try_from(raw: RawHandMap) -> Result<Self> {
        Self::new(raw.left, raw.right)
    }
}

impl Default for HandMap {
    fn default() -> Self {
        Self {
            left: MarkerColor::Cyan,
            right: MarkerColor::Green,
        }
    }
}

impl HandMap {
    /// Both hands must use different colors.
    pub fn new(left: MarkerColor, right: MarkerColor) -> Result<Self> {
        if left == right {
            return Err(GridError::SharedHandColor(left));
        }
        Ok(Self { left, right })
    }

    pub fn left(&self) -> MarkerColor {
        self.left
    }

    pub fn right(&self) -> MarkerColor {
        self.right
    }

    pub fn color(&self, hand: Hand) -> MarkerColor {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
        }
    }
}

/// Markers counted per hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandCounts {
    pub left: usize,
    pub right: usize,
}

impl HandCounts {
    pub fn tally(grid: &MarkerGrid, hands: &HandMap) -> Self {
        Self {
            left: grid.count(hands.left()),
            right: grid.count(hands.right()),
        }
    }

    pub fn get(&self, hand: Hand) -> usize {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
        }
    }
}
