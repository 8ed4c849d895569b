//! The known scalar field (the map) over which the agent navigates.
//!
//! The field is a static, read-only W x H grid of scalar intensities. It is
//! loaded once at startup and never mutated; every component of the filter
//! shares it by reference. Lookups are integer-indexed and bounds-checked:
//! callers clamp or truncate their coordinates before indexing, and a lookup
//! outside the grid is rejected with [`FilterError::OutOfRangeLookup`] rather
//! than ever touching memory out of bounds.
//!
//! The grid is stored as a [`nalgebra::DMatrix`] with rows indexed by `y` and
//! columns by `x`, matching raster conventions. Fields are loaded from
//! headerless numeric CSV grids; raster image decoding is out of scope.

use std::fmt::{self, Debug, Display};
use std::path::Path;

use nalgebra::DMatrix;

use crate::FilterError;

/// Immutable 2-D grid of scalar intensities.
#[derive(Clone, PartialEq)]
pub struct ScalarField {
    data: DMatrix<f64>,
    width: usize,
    height: usize,
}

impl Debug for ScalarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarField {{ {} x {} }}", self.width, self.height)
    }
}

impl Display for ScalarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScalarField: {} x {} | value range: [{}, {}]",
            self.width,
            self.height,
            self.data.min(),
            self.data.max()
        )
    }
}

impl ScalarField {
    /// Create a field from row-major cell values.
    ///
    /// `data` holds `width * height` values, row by row (row `y`, column
    /// `x`). Fails fast with [`FilterError::InvalidField`] if either
    /// dimension is zero or the data length does not match.
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self, FilterError> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(FilterError::InvalidField { width, height });
        }
        Ok(ScalarField {
            data: DMatrix::from_row_slice(height, width, &data),
            width,
            height,
        })
    }

    /// Create a field by evaluating `f(x, y)` at every cell.
    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Result<Self, FilterError>
    where
        F: Fn(usize, usize) -> f64,
    {
        if width == 0 || height == 0 {
            return Err(FilterError::InvalidField { width, height });
        }
        Ok(ScalarField {
            data: DMatrix::from_fn(height, width, |y, x| f(x, y)),
            width,
            height,
        })
    }

    /// Create a field where every cell holds the same value.
    pub fn uniform(width: usize, height: usize, value: f64) -> Result<Self, FilterError> {
        Self::from_fn(width, height, |_, _| value)
    }

    /// Read a field from a headerless numeric CSV grid.
    ///
    /// Each CSV record is one row of the grid (one `y`), each column one `x`.
    /// All rows must have the same length.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_path(path)?;
        let mut data: Vec<f64> = Vec::new();
        let mut width = 0usize;
        let mut height = 0usize;
        for result in rdr.records() {
            let record = result?;
            if height == 0 {
                width = record.len();
            }
            for cell in record.iter() {
                let value: f64 = cell
                    .trim()
                    .parse()
                    .map_err(|e| FilterError::Parse(format!("bad field cell {cell:?}: {e}")))?;
                data.push(value);
            }
            height += 1;
        }
        Self::new(width, height, data)
    }

    /// Grid dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bounds-checked lookup of the cell value at integer coordinates.
    ///
    /// Returns [`FilterError::OutOfRangeLookup`] for any coordinate outside
    /// `[0, W) x [0, H)`. Particles may legally drift outside the grid
    /// between diffusion and the next motion clamp, so out-of-range requests
    /// are an expected, recoverable condition rather than a panic.
    pub fn value_at(&self, x: i64, y: i64) -> Result<f64, FilterError> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return Err(FilterError::OutOfRangeLookup { x, y });
        }
        Ok(self.data[(y as usize, x as usize)])
    }
}
