/// Alpha shapes: adaptive alpha, 3D surfaces, horizontal slices and 2D extrusion
use crate::delaunay::tetrahedralize;
use crate::error::{GeometryError, GeometryResult};
use crate::math::{Point3, circumradius, circumradius_2d, orient2d, orient3d};
use crate::mesh::{Mesh, unit_colour};
use constants::reconstruction::{
    ALPHA_LOG_SLOPE, LAYER_COUNT, LAYER_OVERLAP, MIN_ALPHA, MIN_LAYER_POINTS,
};
use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const MISSING_COLOUR: [u8; 3] = [255, 255, 255];

/// `max(0.01, 1 - log10(N) * 0.18)`: larger clusters get a smaller alpha.
pub fn adaptive_alpha(point_count: usize) -> f64 {
    if point_count <= 1 {
        return 1.0;
    }
    (1.0 - (point_count as f64).log10() * ALPHA_LOG_SLOPE).max(MIN_ALPHA)
}

/// Simplices are kept while their circumradius stays below `1 / alpha`.
fn radius_limit(alpha: f64) -> f64 {
    1.0 / alpha
}

fn colour_of(colours: &[[u8; 3]], index: usize) -> [f64; 3] {
    unit_colour(colours.get(index).copied().unwrap_or(MISSING_COLOUR))
}

/// Boundary surface of the union of Delaunay tetrahedra with circumradius below `1 / alpha`.
///
/// Faces are wound away from the kept volume, holes are closed and normals
/// re-oriented away from the bounding-box centre.
pub fn alpha_shape_3d(
    positions: &[Point3<f64>],
    colours: &[[u8; 3]],
    alpha: f64,
) -> GeometryResult<Mesh> {
    let delaunay = tetrahedralize(positions)?;
    let limit = radius_limit(alpha);

    let keep: Vec<bool> = delaunay
        .tetrahedra
        .iter()
        .map(|tet| {
            let [a, b, c, d] = tet.map(|k| &positions[k]);
            circumradius(a, b, c, d) < limit
        })
        .collect();
    if !keep.contains(&true) {
        return Err(GeometryError::EmptyAlphaShape { alpha });
    }

    let mut mesh = Mesh::new();
    let mut vertex_of: HashMap<usize, u32> = HashMap::new();
    for (t, tet) in delaunay.tetrahedra.iter().enumerate() {
        if !keep[t] {
            continue;
        }
        for k in 0..4 {
            let exposed = delaunay.neighbors[t][k].is_none_or(|nb| !keep[nb]);
            if !exposed {
                continue;
            }
            let mut face = [0usize; 3];
            let mut m = 0;
            for (r, &vertex) in tet.iter().enumerate() {
                if r != k {
                    face[m] = vertex;
                    m += 1;
                }
            }
            let [a, b, c] = face.map(|v| &positions[v]);
            if orient3d(a, b, c, &positions[tet[k]]) > 0.0 {
                face.swap(1, 2);
            }

            let corners = face.map(|source| {
                *vertex_of
                    .entry(source)
                    .or_insert_with(|| mesh.add_vertex(positions[source], colour_of(colours, source)))
            });
            mesh.triangles.push(corners);
        }
    }

    mesh.fill_holes();
    mesh.orient_away_from_center();
    Ok(mesh)
}

/// One horizontal slice of an islet.
#[derive(Debug, Clone)]
pub struct Layer {
    pub index: usize,
    pub z_min: f64,
    pub z_max: f64,
    pub point_indices: Vec<usize>,
}

/// Split the z range into equal layers, each extended upward by the overlap.
pub fn layers(positions: &[Point3<f64>]) -> Vec<Layer> {
    let (z_lo, z_hi) = positions
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.z), hi.max(p.z))
        });
    let height = (z_hi - z_lo) / LAYER_COUNT as f64;

    (0..LAYER_COUNT)
        .map(|index| {
            let z_min = z_lo + index as f64 * height;
            let z_max = z_min + height + height * LAYER_OVERLAP;
            let point_indices = positions
                .iter()
                .enumerate()
                .filter(|(_, p)| p.z >= z_min && p.z <= z_max)
                .map(|(k, _)| k)
                .collect();
            Layer {
                index,
                z_min,
                z_max,
                point_indices,
            }
        })
        .collect()
}

/// One 3D alpha shape per layer, tagged with the layer index.
///
/// Sparse layers and layers whose alpha shape comes out empty are left out;
/// any other failure fails the whole slicing. At least one layer must yield
/// a mesh.
pub fn sliced_alpha_shapes(
    positions: &[Point3<f64>],
    colours: &[[u8; 3]],
    alpha: f64,
) -> GeometryResult<Vec<(usize, Mesh)>> {
    let mut meshes = Vec::new();
    for layer in layers(positions) {
        if layer.point_indices.len() < MIN_LAYER_POINTS {
            debug!(
                "Layer {} has {} points, skipped",
                layer.index,
                layer.point_indices.len()
            );
            continue;
        }
        let layer_positions: Vec<Point3<f64>> =
            layer.point_indices.iter().map(|&k| positions[k]).collect();
        let layer_colours: Vec<[u8; 3]> = layer
            .point_indices
            .iter()
            .map(|&k| colours.get(k).copied().unwrap_or(MISSING_COLOUR))
            .collect();

        match alpha_shape_3d(&layer_positions, &layer_colours, alpha) {
            Ok(mesh) => meshes.push((layer.index, mesh)),
            Err(GeometryError::EmptyAlphaShape { .. }) => {
                debug!("Layer {} alpha shape is empty", layer.index);
            }
            Err(e) => return Err(e),
        }
    }

    if meshes.is_empty() {
        return Err(GeometryError::EmptyAlphaShape { alpha });
    }
    Ok(meshes)
}

/// Projected point carrying its index in the islet.
#[derive(Debug, Clone, Copy)]
struct PlanarPoint {
    position: Point2<f64>,
    index: usize,
}

impl HasPosition for PlanarPoint {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Outer boundary of the 2D alpha shape of the projected points, counter-clockwise.
///
/// Returns point indices. When the alpha complex has several components or
/// holes, only the loop enclosing the largest area is kept.
pub fn alpha_boundary_2d(positions: &[Point3<f64>], alpha: f64) -> GeometryResult<Vec<usize>> {
    let planar: Vec<PlanarPoint> = positions
        .iter()
        .enumerate()
        .map(|(index, p)| PlanarPoint {
            position: Point2::new(p.x, p.y),
            index,
        })
        .collect();
    let triangulation = DelaunayTriangulation::<PlanarPoint>::bulk_load_stable(planar)
        .map_err(|e| GeometryError::Triangulation(format!("{:?}", e)))?;
    if triangulation.num_inner_faces() == 0 {
        return Err(GeometryError::Degenerate(
            "projected points are collinear".to_string(),
        ));
    }

    let limit = radius_limit(alpha);
    let mut directed: HashSet<(usize, usize)> = HashSet::new();
    for face in triangulation.inner_faces() {
        let [a, b, c] = face.vertices().map(|v| *v.data());
        let radius = circumradius_2d(
            [a.position.x, a.position.y],
            [b.position.x, b.position.y],
            [c.position.x, c.position.y],
        );
        if radius < limit {
            directed.extend([(a.index, b.index), (b.index, c.index), (c.index, a.index)]);
        }
    }
    if directed.is_empty() {
        return Err(GeometryError::EmptyAlphaShape { alpha });
    }

    let mut next: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(a, b) in &directed {
        if !directed.contains(&(b, a)) {
            next.entry(a).or_default().push(b);
        }
    }
    for targets in next.values_mut() {
        targets.sort_unstable();
    }

    let mut starts: Vec<usize> = next.keys().copied().collect();
    starts.sort_unstable();

    let mut best: Option<(f64, Vec<usize>)> = None;
    for start in starts {
        while let Some(ring) = follow_boundary(&mut next, start) {
            let area = ring_area(positions, &ring);
            if ring.len() >= 3 && area > 0.0 && best.as_ref().is_none_or(|(a, _)| area > *a) {
                best = Some((area, ring));
            }
        }
    }

    best.map(|(_, ring)| ring)
        .ok_or(GeometryError::EmptyAlphaShape { alpha })
}

fn follow_boundary(next: &mut HashMap<usize, Vec<usize>>, start: usize) -> Option<Vec<usize>> {
    let limit = next.len() + 1;
    let mut current = next.get_mut(&start)?.pop()?;
    let mut ring = vec![start];
    while current != start {
        if ring.len() > limit {
            return Some(Vec::new());
        }
        ring.push(current);
        current = match next.get_mut(&current).and_then(Vec::pop) {
            Some(following) => following,
            None => return Some(Vec::new()),
        };
    }
    Some(ring)
}

/// Shoelace area of a ring of projected points, positive when counter-clockwise.
fn ring_area(positions: &[Point3<f64>], ring: &[usize]) -> f64 {
    let mut twice = 0.0;
    for (k, &a) in ring.iter().enumerate() {
        let b = ring[(k + 1) % ring.len()];
        twice += positions[a].x * positions[b].y - positions[b].x * positions[a].y;
    }
    twice / 2.0
}

/// Prism over the 2D alpha boundary: a top cap at the islet's highest z and
/// side walls down to its lowest z. The bottom stays open.
pub fn extruded_alpha_shape(
    positions: &[Point3<f64>],
    colours: &[[u8; 3]],
    alpha: f64,
) -> GeometryResult<Mesh> {
    let ring = alpha_boundary_2d(positions, alpha)?;
    let (z_lo, z_hi) = positions
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.z), hi.max(p.z))
        });

    let coords: Vec<f64> = ring
        .iter()
        .flat_map(|&k| [positions[k].x, positions[k].y])
        .collect();
    let cap = earcutr::earcut(&coords, &[], 2)
        .map_err(|e| GeometryError::Triangulation(format!("{:?}", e)))?;
    if cap.len() < 3 || cap.len() % 3 != 0 {
        return Err(GeometryError::Triangulation(
            "cap triangulation produced no triangles".to_string(),
        ));
    }

    let m = ring.len();
    let mut mesh = Mesh::with_capacity(2 * m, cap.len() / 3 + 2 * m);
    for &k in &ring {
        let p = &positions[k];
        mesh.add_vertex(Point3::new(p.x, p.y, z_hi), colour_of(colours, k));
    }
    for &k in &ring {
        let p = &positions[k];
        mesh.add_vertex(Point3::new(p.x, p.y, z_lo), colour_of(colours, k));
    }

    let planar = |v: usize| [coords[2 * v], coords[2 * v + 1]];
    for triangle in cap.chunks_exact(3) {
        let (a, b, c) = (triangle[0], triangle[1], triangle[2]);
        let area = orient2d(planar(a), planar(b), planar(c));
        if area > 0.0 {
            mesh.add_triangle(a as u32, b as u32, c as u32);
        } else if area < 0.0 {
            mesh.add_triangle(a as u32, c as u32, b as u32);
        }
    }

    for k in 0..m {
        let k1 = (k + 1) % m;
        let (top, top_next) = (k as u32, k1 as u32);
        let (bottom, bottom_next) = ((m + k) as u32, (m + k1) as u32);
        mesh.add_triangle(bottom, bottom_next, top_next);
        mesh.add_triangle(bottom, top_next, top);
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic pseudo-random points in a cube of the given side.
    fn scattered(count: usize, side: f64) -> Vec<Point3<f64>> {
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64 * side
        };
        (0..count)
            .map(|_| Point3::new(next(), next(), next()))
            .collect()
    }

    fn disc(rings: usize) -> Vec<Point3<f64>> {
        let mut points = vec![Point3::new(0.0, 0.0, 3.0)];
        for r in 1..=rings {
            let count = 6 * r;
            for k in 0..count {
                let angle = k as f64 / count as f64 * std::f64::consts::TAU;
                let z = 1.0 + (k % 3) as f64;
                points.push(Point3::new(r as f64 * angle.cos(), r as f64 * angle.sin(), z));
            }
        }
        points
    }

    /// Every undirected edge is shared by an even number of faces.
    fn closed(mesh: &Mesh) -> bool {
        let mut count: HashMap<(u32, u32), usize> = HashMap::new();
        for t in &mesh.triangles {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *count.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        count.values().all(|&c| c % 2 == 0)
    }

    #[test]
    fn test_adaptive_alpha_formula() {
        assert_relative_eq!(adaptive_alpha(10), 0.82, epsilon = 1e-12);
        assert_relative_eq!(adaptive_alpha(1000), 0.46, epsilon = 1e-12);
        assert_relative_eq!(adaptive_alpha(1_000_000), MIN_ALPHA);
        assert!(adaptive_alpha(100) > adaptive_alpha(1000));
        assert_relative_eq!(adaptive_alpha(0), 1.0);
    }

    #[test]
    fn test_dense_blob_is_closed() {
        let points = scattered(80, 4.0);
        let colours = vec![[200, 100, 50]; points.len()];
        let mesh = alpha_shape_3d(&points, &colours, 0.5).unwrap();

        assert!(!mesh.is_empty());
        assert!(closed(&mesh));
        assert!(mesh.vertices.iter().all(|v| points.contains(v)));
        assert!(mesh.colours.iter().all(|c| *c == unit_colour([200, 100, 50])));
    }

    #[test]
    fn test_tiny_alpha_radius_keeps_nothing() {
        let points = scattered(30, 3.0);
        assert_eq!(
            alpha_shape_3d(&points, &[], 100.0),
            Err(GeometryError::EmptyAlphaShape { alpha: 100.0 })
        );
    }

    #[test]
    fn test_layers_overlap() {
        let points: Vec<Point3<f64>> = (0..=10).map(|k| Point3::new(0.0, 0.0, k as f64)).collect();
        let layers = layers(&points);
        assert_eq!(layers.len(), LAYER_COUNT);
        assert_relative_eq!(layers[0].z_min, 0.0);
        assert_relative_eq!(layers[0].z_max, 2.0 + 2.0 / 3.0);
        assert_eq!(layers[0].point_indices, vec![0, 1, 2]);
        assert_eq!(layers[1].point_indices, vec![2, 3, 4]);
        assert!(layers[4].point_indices.contains(&10));
    }

    #[test]
    fn test_sliced_skips_sparse_layers() {
        // A dense block plus a few stray points high above it.
        let mut points = scattered(64, 3.0);
        points.extend([
            Point3::new(0.0, 0.0, 15.0),
            Point3::new(1.0, 0.0, 15.0),
            Point3::new(0.0, 1.0, 15.2),
        ]);
        let meshes = sliced_alpha_shapes(&points, &[], 1.0).unwrap();
        assert!(!meshes.is_empty());
        assert!(meshes.iter().all(|(layer, _)| *layer < 2));
    }

    #[test]
    fn test_collinear_slices_fail() {
        let points: Vec<Point3<f64>> = (0..40)
            .map(|k| Point3::new(k as f64, k as f64, k as f64))
            .collect();
        assert!(matches!(
            sliced_alpha_shapes(&points, &[], 1.0),
            Err(GeometryError::Degenerate(_))
        ));
    }

    #[test]
    fn test_boundary_is_counter_clockwise() {
        let points = disc(4);
        let ring = alpha_boundary_2d(&points, 0.5).unwrap();
        assert_eq!(ring.len(), 24);
        assert!(ring_area(&points, &ring) > 0.0);
    }

    #[test]
    fn test_extrusion_topology() {
        let points = disc(3);
        let mesh = extruded_alpha_shape(&points, &[], 0.5).unwrap();
        let m = 18;
        assert_eq!(mesh.vertex_count(), 2 * m);
        // Cap of a simple m-gon plus two triangles per side quad.
        assert_eq!(mesh.triangle_count(), (m - 2) + 2 * m);

        for v in &mesh.vertices[..m] {
            assert_relative_eq!(v.z, 3.0);
        }
        for v in &mesh.vertices[m..] {
            assert_relative_eq!(v.z, 1.0);
        }
        // Cap faces point up, side faces point outward.
        for t in &mesh.triangles[..m - 2] {
            assert!(mesh.face_normal(t).z > 0.0);
        }
        for t in &mesh.triangles[m - 2..] {
            let n = mesh.face_normal(t);
            let c = mesh.face_centroid(t);
            assert!(n.x * c.x + n.y * c.y > 0.0);
        }
    }

    #[test]
    fn test_collinear_projection_fails() {
        let points: Vec<Point3<f64>> = (0..10)
            .map(|k| Point3::new(k as f64, 2.0 * k as f64, 1.0))
            .collect();
        assert!(extruded_alpha_shape(&points, &[], 0.5).is_err());
    }
}
