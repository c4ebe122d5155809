/// 2x2 cell neighbourhoods shared by the triangulator and the labeler
use crate::grid::HeightRaster;

/// Corner of the quad anchored at `(i, j)`, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    /// `(i, j)`
    Origin,
    /// `(i + 1, j)`
    NextColumn,
    /// `(i, j + 1)`
    NextRow,
    /// `(i + 1, j + 1)`
    Opposite,
}

impl Corner {
    /// Scan order used whenever corners compete (label tie-breaking).
    pub const SCAN_ORDER: [Corner; 4] = [
        Corner::Origin,
        Corner::NextColumn,
        Corner::NextRow,
        Corner::Opposite,
    ];

    pub fn cell(self, i: usize, j: usize) -> (usize, usize) {
        match self {
            Corner::Origin => (i, j),
            Corner::NextColumn => (i + 1, j),
            Corner::NextRow => (i, j + 1),
            Corner::Opposite => (i + 1, j + 1),
        }
    }
}

/// How many and which corners of a quad are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadCase {
    /// All four corners filled: two triangles.
    Full,
    /// Exactly three filled; carries the empty corner.
    Missing(Corner),
    /// Zero, one or two filled corners (including diagonal pairs): nothing.
    Sparse,
}

impl QuadCase {
    pub fn classify(raster: &HeightRaster, i: usize, j: usize) -> Self {
        let filled = Corner::SCAN_ORDER.map(|corner| {
            let (ci, cj) = corner.cell(i, j);
            raster.is_filled(ci, cj)
        });

        match filled {
            [true, true, true, true] => QuadCase::Full,
            [true, true, true, false] => QuadCase::Missing(Corner::Opposite),
            [true, true, false, true] => QuadCase::Missing(Corner::NextRow),
            [true, false, true, true] => QuadCase::Missing(Corner::NextColumn),
            [false, true, true, true] => QuadCase::Missing(Corner::Origin),
            _ => QuadCase::Sparse,
        }
    }

    /// Triangles emitted for this case, as corner triples.
    pub fn triangles(self) -> &'static [[Corner; 3]] {
        use Corner::*;
        match self {
            QuadCase::Full => &[[Origin, NextColumn, NextRow], [NextRow, NextColumn, Opposite]],
            QuadCase::Missing(Opposite) => &[[Origin, NextColumn, NextRow]],
            QuadCase::Missing(NextRow) => &[[Origin, NextColumn, Opposite]],
            QuadCase::Missing(NextColumn) => &[[Origin, Opposite, NextRow]],
            QuadCase::Missing(Origin) => &[[NextRow, NextColumn, Opposite]],
            QuadCase::Sparse => &[],
        }
    }

    /// Filled corners in scan order; empty for sparse quads.
    pub fn filled_corners(self) -> &'static [Corner] {
        use Corner::*;
        match self {
            QuadCase::Full => &[Origin, NextColumn, NextRow, Opposite],
            QuadCase::Missing(Opposite) => &[Origin, NextColumn, NextRow],
            QuadCase::Missing(NextRow) => &[Origin, NextColumn, Opposite],
            QuadCase::Missing(NextColumn) => &[Origin, NextRow, Opposite],
            QuadCase::Missing(Origin) => &[NextColumn, NextRow, Opposite],
            QuadCase::Sparse => &[],
        }
    }
}

/// Anchors `(i, j)` of every quad, i outer and j inner.
pub fn quad_anchors(raster: &HeightRaster) -> impl Iterator<Item = (usize, usize)> {
    let columns = raster.columns().saturating_sub(1);
    let rows = raster.rows().saturating_sub(1);
    (0..columns).flat_map(move |i| (0..rows).map(move |j| (i, j)))
}
