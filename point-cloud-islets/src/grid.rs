/// Height-field rasterisation of the vegetation cloud
use crate::cloud::VegetationCloud;
use crate::error::{IsletError, Result};
use crate::math::Point3;
use serde::Serialize;
use tracing::debug;

/// Raw grid index of a coordinate: `floor((coord - min) / cell_size) - 1`.
///
/// The `- 1` is a fixed convention shared by rasterisation and partitioning:
/// points in the first cell-width get index -1, which is why grids are
/// stored with a one-slot margin (see [`GridGeometry::slot`]).
pub fn cell_index(coord: f64, min: f64, cell_size: f64) -> i64 {
    ((coord - min) / cell_size).floor() as i64 - 1
}

/// A cell counts as filled only when its mean height is strictly positive.
///
/// A genuine z of exactly 0 (or below) is therefore indistinguishable from an
/// empty cell.
pub fn is_filled(height: f64) -> bool {
    height > 0.0
}

/// Dense 2D array addressed as `[i][j]`, `i` along x and `j` along y.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    columns: usize,
    rows: usize,
    cells: Vec<T>,
}

impl<T: Copy + Default> Grid<T> {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            cells: vec![T::default(); columns * rows],
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.columns && j < self.rows);
        i * self.rows + j
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.cells[self.offset(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        let offset = self.offset(i, j);
        self.cells[offset] = value;
    }

    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut T {
        let offset = self.offset(i, j);
        &mut self.cells[offset]
    }

    /// Cells in storage order (i outer, j inner).
    pub fn values(&self) -> &[T] {
        &self.cells
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.cells
    }
}

/// Placement of the grid in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridGeometry {
    pub min_x: f64,
    pub min_y: f64,
    pub cell_size: f64,
    /// `ceil(box width / cell_size)`.
    pub width: usize,
    /// `ceil(box height / cell_size)`.
    pub height: usize,
}

impl GridGeometry {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, cell_size: f64) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(IsletError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            min_x,
            min_y,
            cell_size,
            width: ((max_x - min_x) / cell_size).ceil() as usize,
            height: ((max_y - min_y) / cell_size).ceil() as usize,
        })
    }

    /// Stored column count: the nominal width plus the low-side margin slot.
    pub fn columns(&self) -> usize {
        self.width + 1
    }

    /// Stored row count: the nominal height plus the low-side margin slot.
    pub fn rows(&self) -> usize {
        self.height + 1
    }

    /// Storage slot of a raw index: raw + 1.
    pub fn slot(raw: i64) -> Option<usize> {
        usize::try_from(raw + 1).ok()
    }

    /// Raw `(i, j)` indices of a position, before the margin offset.
    pub fn raw_cell(&self, position: &Point3<f64>) -> (i64, i64) {
        (
            cell_index(position.x, self.min_x, self.cell_size),
            cell_index(position.y, self.min_y, self.cell_size),
        )
    }

    /// Storage cell holding a position, or `None` outside the grid.
    pub fn cell_of(&self, position: &Point3<f64>) -> Option<(usize, usize)> {
        let (raw_i, raw_j) = self.raw_cell(position);
        let i = Self::slot(raw_i)?;
        let j = Self::slot(raw_j)?;
        (i < self.columns() && j < self.rows()).then_some((i, j))
    }

    /// World position of a storage cell's vertex: `(i * cell_size + min_x, j * cell_size + min_y)`.
    pub fn cell_origin(&self, i: usize, j: usize) -> (f64, f64) {
        (
            i as f64 * self.cell_size + self.min_x,
            j as f64 * self.cell_size + self.min_y,
        )
    }
}

/// Mean height and point count per cell.
#[derive(Debug, Clone)]
pub struct HeightRaster {
    geometry: GridGeometry,
    heights: Grid<f64>,
    counts: Grid<u32>,
}

impl HeightRaster {
    /// Bin every point into its cell and average the heights.
    pub fn build(cloud: &VegetationCloud, cell_size: f64) -> Result<Self> {
        let bounds = cloud.bounds();
        let geometry = GridGeometry::new(
            bounds.min_x,
            bounds.min_y,
            bounds.max_x,
            bounds.max_y,
            cell_size,
        )?;

        let mut heights = Grid::<f64>::new(geometry.columns(), geometry.rows());
        let mut counts = Grid::<u32>::new(geometry.columns(), geometry.rows());

        for point in cloud.points() {
            // Points come from the same cloud as the bounds, so they always land inside.
            if let Some((i, j)) = geometry.cell_of(&point.position) {
                *heights.get_mut(i, j) += point.position.z;
                *counts.get_mut(i, j) += 1;
            }
        }

        for (sum, &count) in heights.values_mut().iter_mut().zip(counts.values()) {
            if count > 0 {
                *sum /= count as f64;
            }
        }

        debug!(
            "Rasterised {} points into {}x{} cells of {}",
            cloud.len(),
            geometry.width,
            geometry.height,
            cell_size
        );

        Ok(Self {
            geometry,
            heights,
            counts,
        })
    }

    /// Raster built directly from a height table, one point per filled cell.
    ///
    /// `heights[i][j]` becomes storage cell `(i, j)`; every column must have
    /// the same length.
    pub fn from_heights(heights: &[Vec<f64>], min_x: f64, min_y: f64, cell_size: f64) -> Self {
        let columns = heights.len();
        let rows = heights.first().map_or(0, Vec::len);
        let geometry = GridGeometry {
            min_x,
            min_y,
            cell_size,
            width: columns.saturating_sub(1),
            height: rows.saturating_sub(1),
        };

        let mut grid = Grid::<f64>::new(columns, rows);
        let mut counts = Grid::<u32>::new(columns, rows);
        for (i, column) in heights.iter().enumerate() {
            for (j, &h) in column.iter().enumerate() {
                grid.set(i, j, h);
                if h != 0.0 {
                    counts.set(i, j, 1);
                }
            }
        }

        Self {
            geometry,
            heights: grid,
            counts,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn heights(&self) -> &Grid<f64> {
        &self.heights
    }

    pub fn counts(&self) -> &Grid<u32> {
        &self.counts
    }

    pub fn columns(&self) -> usize {
        self.heights.columns()
    }

    pub fn rows(&self) -> usize {
        self.heights.rows()
    }

    /// Mean height of a cell (0 when empty).
    pub fn height(&self, i: usize, j: usize) -> f64 {
        self.heights.get(i, j)
    }

    pub fn is_filled(&self, i: usize, j: usize) -> bool {
        is_filled(self.heights.get(i, j))
    }
}
