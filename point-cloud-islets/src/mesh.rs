/// In-memory triangle mesh with optional per-vertex colour
use crate::bounds::PointCloudBounds;
use crate::math::{Point3, Vector3};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Vertices, colours in `[0, 1]` and triangles (0-based indices).
///
/// `colours` is either empty or exactly as long as `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub colours: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

/// A mesh with the file stem it is exported under.
#[derive(Debug, Clone)]
pub struct NamedMesh {
    pub name: String,
    pub mesh: Mesh,
}

impl NamedMesh {
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            mesh,
        }
    }
}

/// Convert an 8-bit colour to the `[0, 1]` range.
pub fn unit_colour(colour: [u8; 3]) -> [f64; 3] {
    colour.map(|c| c as f64 / 255.0)
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            colours: Vec::with_capacity(vertices),
            triangles: Vec::with_capacity(triangles),
        }
    }

    /// Append a coloured vertex and return its index.
    pub fn add_vertex(&mut self, position: Point3<f64>, colour: [f64; 3]) -> u32 {
        self.vertices.push(position);
        self.colours.push(colour);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.triangles.push([a, b, c]);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn has_colours(&self) -> bool {
        !self.colours.is_empty() && self.colours.len() == self.vertices.len()
    }

    pub fn bounds(&self) -> PointCloudBounds {
        PointCloudBounds::from_positions(&self.vertices)
    }

    /// Unnormalised face normal `(b - a) x (c - a)`.
    pub fn face_normal(&self, triangle: &[u32; 3]) -> Vector3<f64> {
        let [a, b, c] = triangle.map(|v| &self.vertices[v as usize]);
        (b - a).cross(&(c - a))
    }

    pub fn face_centroid(&self, triangle: &[u32; 3]) -> Point3<f64> {
        let [a, b, c] = triangle.map(|v| self.vertices[v as usize].coords);
        Point3::from((a + b + c) / 3.0)
    }

    /// Make every face normal point away from the bounding-box centre.
    ///
    /// A face is flipped when `(centroid - centre) . normal < 0`. This is only
    /// exact for star-convex shapes around that centre; elsewhere it is a
    /// heuristic. Returns the number of flipped faces.
    pub fn orient_away_from_center(&mut self) -> usize {
        if self.triangles.is_empty() {
            return 0;
        }
        let center = self.bounds().center();

        let mut flipped = 0;
        for idx in 0..self.triangles.len() {
            let triangle = self.triangles[idx];
            let outward = self.face_centroid(&triangle) - center;
            if outward.dot(&self.face_normal(&triangle)) < 0.0 {
                self.triangles[idx].swap(1, 2);
                flipped += 1;
            }
        }

        if flipped > 0 {
            debug!("Flipped {} of {} faces", flipped, self.triangles.len());
        }
        flipped
    }

    /// Close boundary loops with fan triangles wound consistently with their
    /// neighbours. Returns the number of holes filled.
    pub fn fill_holes(&mut self) -> usize {
        let directed: HashSet<(u32, u32)> = self
            .triangles
            .iter()
            .flat_map(|t| [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])])
            .collect();

        // A boundary edge a->b has no twin b->a; the patch must run b->a.
        let mut hole_next: HashMap<u32, Vec<u32>> = HashMap::new();
        for &(a, b) in &directed {
            if !directed.contains(&(b, a)) {
                hole_next.entry(b).or_default().push(a);
            }
        }

        let mut starts: Vec<u32> = hole_next.keys().copied().collect();
        starts.sort_unstable();

        let mut filled = 0;
        for start in starts {
            while let Some(ring) = trace_loop(&mut hole_next, start) {
                if ring.len() < 3 {
                    continue;
                }
                for k in 1..ring.len() - 1 {
                    self.triangles.push([ring[0], ring[k], ring[k + 1]]);
                }
                filled += 1;
            }
        }

        if filled > 0 {
            debug!("Filled {} holes", filled);
        }
        filled
    }
}

/// Follow unused hole edges from `start` until the loop closes.
///
/// Returns `None` once `start` has no unused edge left. Open chains are
/// consumed and come back empty.
fn trace_loop(hole_next: &mut HashMap<u32, Vec<u32>>, start: u32) -> Option<Vec<u32>> {
    let limit = hole_next.len() + 1;
    let mut next = hole_next.get_mut(&start)?.pop()?;
    let mut ring = vec![start];

    loop {
        if next == start {
            return Some(ring);
        }
        if ring.len() > limit {
            return Some(Vec::new());
        }
        ring.push(next);
        match hole_next.get_mut(&next).and_then(Vec::pop) {
            Some(following) => next = following,
            None => return Some(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit cube, outward winding.
    fn cube() -> Mesh {
        let mut mesh = Mesh::new();
        for &(x, y, z) in &[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 1.0),
            (0.0, 1.0, 1.0),
        ] {
            mesh.add_vertex(Point3::new(x, y, z), [0.5, 0.5, 0.5]);
        }
        for t in [
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ] {
            mesh.add_triangle(t[0], t[1], t[2]);
        }
        mesh
    }

    #[test]
    fn test_outward_cube_untouched() {
        let mut mesh = cube();
        assert_eq!(mesh.orient_away_from_center(), 0);
    }

    #[test]
    fn test_inverted_faces_flipped() {
        let mut mesh = cube();
        mesh.triangles[0].swap(1, 2);
        mesh.triangles[7].swap(1, 2);
        assert_eq!(mesh.orient_away_from_center(), 2);
        assert_eq!(mesh, cube());
    }

    #[test]
    fn test_fill_removed_face() {
        let mut mesh = cube();
        // Open the top.
        mesh.triangles.remove(3);
        mesh.triangles.remove(2);
        assert_eq!(mesh.fill_holes(), 1);
        assert_eq!(mesh.triangle_count(), 12);
        // Patch normals must point up, like the faces they replace.
        for t in &mesh.triangles[10..] {
            assert!(mesh.face_normal(t).z > 0.0);
        }
        // Closed now.
        assert_eq!(mesh.fill_holes(), 0);
    }

    #[test]
    fn test_unit_colour() {
        assert_eq!(unit_colour([255, 0, 51]), [1.0, 0.0, 0.2]);
    }
}
