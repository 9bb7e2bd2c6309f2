//! Static honeycomb layouts and the grid-to-pixel mapping.
//!
//! A layout is a sparse grid of cell indices. Index 0 is the base cell; the
//! remaining indices give the order in which cells grow. Columns are offset
//! hex columns: every odd column sits half a cell lower than its neighbours.

use serde::Serialize;

use crate::error::LayoutError;

pub const BASE: usize = 0;

const XX: i16 = -1;
const BS: i16 = BASE as i16;

#[rustfmt::skip]
const FULL_GRID: [[i16; 11]; 11] = [
    [XX, XX, XX, XX, 62, 61, 90, XX, XX, XX, XX],
    [XX, XX, 64, 63, 38, 37, 60, 89, 88, XX, XX],
    [66, 65, 40, 39, 20, 19, 36, 59, 58, 87, 86],
    [67, 41, 22, 21,  8,  7, 18, 35, 34, 57, 85],
    [68, 42, 23,  9,  2,  1,  6, 17, 33, 56, 84],
    [69, 43, 24, 10,  3, BS,  5, 16, 32, 55, 83],
    [70, 44, 25, 11, 12,  4, 14, 15, 31, 54, 82],
    [71, 45, 46, 26, 27, 13, 29, 30, 52, 53, 81],
    [XX, 72, 73, 47, 48, 28, 50, 51, 79, 80, XX],
    [XX, XX, XX, 74, 75, 49, 77, 78, XX, XX, XX],
    [XX, XX, XX, XX, XX, 76, XX, XX, XX, XX, XX],
];

#[rustfmt::skip]
const COMPACT_GRID: [[i16; 11]; 11] = [
    [XX, XX, XX, XX, XX, XX, XX, XX, XX, XX, XX],
    [XX, XX, XX, XX, XX, XX, XX, XX, XX, XX, XX],
    [XX, XX, XX, XX, 20, 19, 36, XX, XX, XX, XX],
    [XX, XX, 22, 21,  8,  7, 18, 35, 34, XX, XX],
    [XX, XX, 23,  9,  2,  1,  6, 17, 33, XX, XX],
    [XX, XX, 24, 10,  3, BS,  5, 16, 32, XX, XX],
    [XX, XX, 25, 11, 12,  4, 14, 15, 31, XX, XX],
    [XX, XX, XX, 26, 27, 13, 29, 30, XX, XX, XX],
    [XX, XX, XX, XX, XX, 28, XX, XX, XX, XX, XX],
    [XX, XX, XX, XX, XX, XX, XX, XX, XX, XX, XX],
    [XX, XX, XX, XX, XX, XX, XX, XX, XX, XX, XX],
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Spacing of the hex lattice on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexGeometry {
    /// Centre-to-centre distance between vertically adjacent cells.
    pub spacing: f64,
    /// Drawn size of one cell image; positions are its top-left corner.
    pub cell_size: f64,
    pub center: Point,
}

impl HexGeometry {
    pub fn horizontal_step(&self) -> f64 {
        self.spacing * 3f64.sqrt() / 2.0
    }

    pub fn vertical_step(&self) -> f64 {
        self.spacing
    }

    /// Top-left corner of the cell `row`/`col` steps away from the grid centre.
    pub fn position(&self, row: i64, col: i64) -> Point {
        let x = col as f64 * self.horizontal_step();
        let y = (row as f64 + 0.5 * col.rem_euclid(2) as f64) * self.vertical_step();
        let half = self.cell_size / 2.0;
        Point {
            x: x + self.center.x - half,
            y: y + self.center.y - half,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    grid: Vec<Vec<Option<usize>>>,
}

impl FieldLayout {
    pub fn new(grid: Vec<Vec<Option<usize>>>) -> Self {
        Self { grid }
    }

    fn from_codes<const W: usize, const H: usize>(codes: &[[i16; W]; H]) -> Self {
        let grid = codes
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&c| usize::try_from(c).ok())
                    .collect()
            })
            .collect();
        Self { grid }
    }

    pub fn full() -> Self {
        Self::from_codes(&FULL_GRID)
    }

    pub fn compact() -> Self {
        Self::from_codes(&COMPACT_GRID)
    }

    /// Highest cell index, i.e. how many cells can grow around the base.
    pub fn capacity(&self) -> usize {
        self.grid
            .iter()
            .flatten()
            .flatten()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Grid row and column of `index`.
    pub fn locate(&self, index: usize) -> Option<(usize, usize)> {
        self.grid.iter().enumerate().find_map(|(r, row)| {
            row.iter()
                .position(|&c| c == Some(index))
                .map(|c| (r, c))
        })
    }

    /// Screen positions for every cell, ordered by index (base first).
    ///
    /// Every index from the base up to [`capacity`](Self::capacity) must occur
    /// exactly once.
    pub fn positions(&self, geometry: &HexGeometry) -> Result<Vec<Point>, LayoutError> {
        let capacity = self.capacity();
        let mut seen = vec![false; capacity + 1];
        let mut any = false;
        for &index in self.grid.iter().flatten().flatten() {
            any = true;
            if std::mem::replace(&mut seen[index], true) {
                return Err(LayoutError::DuplicateCell(index));
            }
        }
        if !any {
            return Err(LayoutError::Empty);
        }

        let center_row = (self.grid.len() / 2) as i64;
        let width = self.grid.iter().map(Vec::len).max().unwrap_or(0);
        let center_col = (width / 2) as i64;

        (0..=capacity)
            .map(|index| {
                let (r, c) = self.locate(index).ok_or(if index == BASE {
                    LayoutError::NoBase
                } else {
                    LayoutError::MissingCell(index)
                })?;
                Ok(geometry.position(r as i64 - center_row, c as i64 - center_col))
            })
            .collect()
    }
}
