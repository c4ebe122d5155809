/// Canopy surface triangulation of the height raster
use crate::grid::{Grid, HeightRaster};
use crate::labeling::IsletLabels;
use crate::math::Point3;
use crate::mesh::Mesh;
use crate::quad::{QuadCase, quad_anchors};
use tracing::debug;

/// Colour of canopy vertices that belong to no islet.
const UNLABELED_COLOUR: [f64; 3] = [0.5, 0.5, 0.5];

/// Triangulated canopy plus the cell -> vertex mapping used to build it.
#[derive(Debug, Clone)]
pub struct CanopySurface {
    /// 1-based vertex index per cell, 0 when the cell is empty.
    pub vertex_index: Grid<u32>,
    pub mesh: Mesh,
}

/// Build the canopy mesh: one vertex per filled cell, triangles per quad case.
///
/// Vertices are numbered in column-major scan order (i outer, j inner); a
/// vertex sits at `(i * cell_size + min_x, j * cell_size + min_y, mean height)`.
pub fn triangulate(raster: &HeightRaster) -> CanopySurface {
    let geometry = raster.geometry();
    let mut vertex_index = Grid::<u32>::new(raster.columns(), raster.rows());
    let mut mesh = Mesh::new();

    for i in 0..raster.columns() {
        for j in 0..raster.rows() {
            if raster.is_filled(i, j) {
                let (x, y) = geometry.cell_origin(i, j);
                let index = mesh.add_vertex(Point3::new(x, y, raster.height(i, j)), UNLABELED_COLOUR);
                vertex_index.set(i, j, index + 1);
            }
        }
    }

    for (i, j) in quad_anchors(raster) {
        for triangle in QuadCase::classify(raster, i, j).triangles() {
            let [a, b, c] = triangle.map(|corner| {
                let (ci, cj) = corner.cell(i, j);
                vertex_index.get(ci, cj) - 1
            });
            mesh.add_triangle(a, b, c);
        }
    }

    debug!(
        "Canopy surface: {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    );

    CanopySurface { vertex_index, mesh }
}

impl CanopySurface {
    /// Give every vertex the colour of its cell's islet label.
    pub fn colourize(&mut self, labels: &IsletLabels) {
        for i in 0..self.vertex_index.columns() {
            for j in 0..self.vertex_index.rows() {
                let index = self.vertex_index.get(i, j);
                if index > 0 {
                    self.mesh.colours[(index - 1) as usize] = label_colour(labels.label(i, j));
                }
            }
        }
    }
}

/// Deterministic pseudo-random colour for an islet label; grey for 0.
pub fn label_colour(label: u32) -> [f64; 3] {
    if label == 0 {
        return UNLABELED_COLOUR;
    }
    let bits = splitmix64(label as u64);
    [0, 1, 2].map(|channel| ((bits >> (channel * 16)) & 0xffff) as f64 / 65535.0)
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
