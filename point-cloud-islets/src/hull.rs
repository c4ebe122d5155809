/// Convex hull reconstruction of a point set
use crate::error::{GeometryError, GeometryResult, catch_panic};
use crate::math::{Point3, affine_dimension};
use crate::mesh::{Mesh, unit_colour};
use parry3d_f64::transformation;
use std::collections::HashMap;

/// Closed convex hull of the points, coloured from the input points.
///
/// Hull vertices are input points, so their colour is found by exact
/// position first; anything the hull routine moved falls back to the
/// nearest input point. Faces are oriented away from the hull centre.
pub fn convex_hull(positions: &[Point3<f64>], colours: &[[u8; 3]]) -> GeometryResult<Mesh> {
    if positions.len() < 4 {
        return Err(GeometryError::InsufficientPoints {
            needed: 4,
            found: positions.len(),
        });
    }
    let dimension = affine_dimension(positions);
    if dimension < 3 {
        return Err(GeometryError::Degenerate(format!(
            "points span only {} dimension(s)",
            dimension
        )));
    }

    let (vertices, triangles) = catch_panic(
        || Ok(transformation::convex_hull(positions)),
        GeometryError::Hull,
    )?;
    if triangles.is_empty() {
        return Err(GeometryError::Hull("hull has no faces".to_string()));
    }

    let by_position: HashMap<[u64; 3], usize> = positions
        .iter()
        .enumerate()
        .map(|(index, p)| (bits(p), index))
        .collect();

    let mut mesh = Mesh::with_capacity(vertices.len(), triangles.len());
    for vertex in vertices {
        let source = by_position
            .get(&bits(&vertex))
            .copied()
            .unwrap_or_else(|| nearest(positions, &vertex));
        let colour = colours.get(source).copied().unwrap_or([255, 255, 255]);
        mesh.add_vertex(vertex, unit_colour(colour));
    }
    mesh.triangles = triangles;
    mesh.orient_away_from_center();
    Ok(mesh)
}

fn bits(p: &Point3<f64>) -> [u64; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

fn nearest(positions: &[Point3<f64>], target: &Point3<f64>) -> usize {
    positions
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - target)
                .norm_squared()
                .total_cmp(&(*b - target).norm_squared())
        })
        .map_or(0, |(index, _)| index)
}
