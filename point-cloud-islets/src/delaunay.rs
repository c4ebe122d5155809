/// Incremental 3D Delaunay tetrahedralisation (Bowyer–Watson) on exact predicates
use crate::error::{GeometryError, GeometryResult};
use crate::math::{Point3, affine_dimension, in_sphere, orient3d};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Half-extent of the enclosing tetrahedron, in normalised units.
const SUPER_EXTENT: f64 = 1.0e3;
const MORTON_BITS: u32 = 10;

/// Delaunay tetrahedra over a point set.
///
/// Vertex indices refer to the caller's slice; exact duplicates are only
/// inserted once. Every tetrahedron is positively oriented
/// (`orient3d(a, b, c, d) > 0`) and `neighbors[t][k]` is the tetrahedron
/// across the face opposite vertex `k`, or `None` on the hull.
#[derive(Debug, Clone)]
pub struct Tetrahedralization {
    pub tetrahedra: Vec<[usize; 4]>,
    pub neighbors: Vec<[Option<usize>; 4]>,
}

impl Tetrahedralization {
    pub fn len(&self) -> usize {
        self.tetrahedra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tetrahedra.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Tet {
    v: [usize; 4],
    n: [Option<usize>; 4],
    alive: bool,
}

/// Face of the cavity: tet `outer` (if any) keeps slot `outer_slot` toward it.
struct CavityFace {
    inner: usize,
    slot: usize,
    outer: Option<(usize, usize)>,
}

/// Interleave the low `MORTON_BITS` bits of three coordinates.
fn morton_encode_3d(x: u32, y: u32, z: u32) -> u32 {
    let mut result = 0;
    for i in 0..MORTON_BITS {
        result |= ((x >> i) & 1) << (3 * i);
        result |= ((y >> i) & 1) << (3 * i + 1);
        result |= ((z >> i) & 1) << (3 * i + 2);
    }
    result
}

struct Builder {
    points: Vec<Point3<f64>>,
    tets: Vec<Tet>,
    free: Vec<usize>,
    last: usize,
    walk_start: usize,
}

impl Builder {
    fn with_super_tetrahedron(mut points: Vec<Point3<f64>>) -> GeometryResult<Self> {
        let base = points.len();
        let m = SUPER_EXTENT;
        points.extend([
            Point3::new(-m, -m, -m),
            Point3::new(m, m, -m),
            Point3::new(m, -m, m),
            Point3::new(-m, m, m),
        ]);
        let mut v = [base, base + 1, base + 2, base + 3];
        if orient3d(&points[v[0]], &points[v[1]], &points[v[2]], &points[v[3]]) < 0.0 {
            v.swap(2, 3);
        }

        let mut builder = Self {
            points,
            tets: Vec::new(),
            free: Vec::new(),
            last: 0,
            walk_start: 0,
        };
        builder.last = builder.create(v, [None; 4])?;
        Ok(builder)
    }

    fn create(&mut self, v: [usize; 4], n: [Option<usize>; 4]) -> GeometryResult<usize> {
        let [a, b, c, d] = v.map(|k| &self.points[k]);
        if orient3d(a, b, c, d) <= 0.0 {
            return Err(GeometryError::Degenerate(
                "cavity produced a flat tetrahedron".to_string(),
            ));
        }

        let tet = Tet { v, n, alive: true };
        Ok(match self.free.pop() {
            Some(slot) => {
                self.tets[slot] = tet;
                slot
            }
            None => {
                self.tets.push(tet);
                self.tets.len() - 1
            }
        })
    }

    /// True when `p` lies strictly inside the circumsphere of tet `t`.
    fn in_circumsphere(&self, t: usize, p: &Point3<f64>) -> bool {
        let [a, b, c, d] = self.tets[t].v.map(|k| &self.points[k]);
        in_sphere(a, b, c, d, p) > 0.0
    }

    /// Signed side of `p` relative to face `k` of tet `t` (negative: across it).
    fn side(&self, t: usize, k: usize, p: &Point3<f64>) -> f64 {
        let mut corners = self.tets[t].v.map(|i| &self.points[i]);
        corners[k] = p;
        orient3d(corners[0], corners[1], corners[2], corners[3])
    }

    /// Tetrahedron whose circumsphere contains `p`, found by a visibility walk.
    fn locate(&mut self, p: &Point3<f64>) -> Option<usize> {
        let mut current = self.last;
        let budget = self.tets.len() + 4;
        'walk: for _ in 0..budget {
            self.walk_start = (self.walk_start + 1) % 4;
            for offset in 0..4 {
                let k = (self.walk_start + offset) % 4;
                if self.side(current, k, p) < 0.0 {
                    match self.tets[current].n[k] {
                        Some(next) => {
                            current = next;
                            continue 'walk;
                        }
                        None => break 'walk,
                    }
                }
            }
            if self.in_circumsphere(current, p) {
                return Some(current);
            }
            break;
        }

        trace!("Walk failed, scanning all tetrahedra");
        (0..self.tets.len()).find(|&t| self.tets[t].alive && self.in_circumsphere(t, p))
    }

    fn insert(&mut self, index: usize) -> GeometryResult<()> {
        let p = self.points[index];
        let seed = self.locate(&p).ok_or_else(|| {
            GeometryError::Degenerate("point outside every circumsphere".to_string())
        })?;

        let mut bad = HashSet::from([seed]);
        let mut stack = vec![seed];
        let mut faces = Vec::new();
        while let Some(t) = stack.pop() {
            for k in 0..4 {
                match self.tets[t].n[k] {
                    Some(nb) if bad.contains(&nb) => {}
                    Some(nb) if self.in_circumsphere(nb, &p) => {
                        bad.insert(nb);
                        stack.push(nb);
                    }
                    Some(nb) => {
                        let back = self.tets[nb]
                            .n
                            .iter()
                            .position(|&n| n == Some(t))
                            .ok_or_else(|| {
                                GeometryError::Degenerate("broken adjacency".to_string())
                            })?;
                        faces.push(CavityFace {
                            inner: t,
                            slot: k,
                            outer: Some((nb, back)),
                        });
                    }
                    None => faces.push(CavityFace {
                        inner: t,
                        slot: k,
                        outer: None,
                    }),
                }
            }
        }

        let new_vertices: Vec<[usize; 4]> = faces
            .iter()
            .map(|face| {
                let mut v = self.tets[face.inner].v;
                v[face.slot] = index;
                v
            })
            .collect();

        for &t in &bad {
            self.tets[t].alive = false;
            self.free.push(t);
        }

        let mut open: HashMap<[usize; 3], (usize, usize)> = HashMap::new();
        for (face, v) in faces.iter().zip(new_vertices) {
            let mut n = [None; 4];
            n[face.slot] = face.outer.map(|(outer, _)| outer);
            let created = self.create(v, n)?;
            if let Some((outer, back)) = face.outer {
                self.tets[outer].n[back] = Some(created);
            }

            for s in (0..4).filter(|&s| s != face.slot) {
                let mut key = [0usize; 3];
                let mut m = 0;
                for (r, &vertex) in v.iter().enumerate() {
                    if r != s {
                        key[m] = vertex;
                        m += 1;
                    }
                }
                key.sort_unstable();
                match open.remove(&key) {
                    Some((other, other_slot)) => {
                        self.tets[created].n[s] = Some(other);
                        self.tets[other].n[other_slot] = Some(created);
                    }
                    None => {
                        open.insert(key, (created, s));
                    }
                }
            }
            self.last = created;
        }

        if !open.is_empty() {
            return Err(GeometryError::Degenerate(
                "cavity boundary is not closed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tetrahedralise a point set.
///
/// Points are translated and scaled into the unit box, inserted in Morton
/// order, and the tetrahedra touching the enclosing tetrahedron are dropped
/// at the end. Orientation and insphere tests are exact, so centimetre
/// quantised coordinates with many co-spherical points triangulate cleanly.
pub fn tetrahedralize(points: &[Point3<f64>]) -> GeometryResult<Tetrahedralization> {
    if points.len() < 4 {
        return Err(GeometryError::InsufficientPoints {
            needed: 4,
            found: points.len(),
        });
    }
    let dimension = affine_dimension(points);
    if dimension < 3 {
        return Err(GeometryError::Degenerate(format!(
            "points span only {} dimension(s)",
            dimension
        )));
    }

    let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min = min.inf(p);
        max = max.sup(p);
    }
    // A power-of-two scale keeps the scaling exact.
    let scale = (max - min).max().log2().ceil().exp2();

    // Deduplicate after normalising, so two inputs that round together are
    // inserted once.
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut normalized = Vec::new();
    for (k, p) in points.iter().enumerate() {
        let q = Point3::from((p - min) / scale);
        if seen.insert([q.x.to_bits(), q.y.to_bits(), q.z.to_bits()]) {
            unique.push(k);
            normalized.push(q);
        }
    }
    if unique.len() < 4 {
        return Err(GeometryError::InsufficientPoints {
            needed: 4,
            found: unique.len(),
        });
    }

    let cells = ((1u32 << MORTON_BITS) - 1) as f64;
    let mut order: Vec<usize> = (0..normalized.len()).collect();
    order.sort_by_key(|&k| {
        let q = normalized[k].coords.map(|c| (c.clamp(0.0, 1.0) * cells) as u32);
        morton_encode_3d(q.x, q.y, q.z)
    });

    let real = normalized.len();
    let mut builder = Builder::with_super_tetrahedron(normalized)?;
    for &k in &order {
        builder.insert(k)?;
    }

    let mut remap = vec![None; builder.tets.len()];
    let mut tetrahedra = Vec::new();
    for (t, tet) in builder.tets.iter().enumerate() {
        if tet.alive && tet.v.iter().all(|&v| v < real) {
            remap[t] = Some(tetrahedra.len());
            tetrahedra.push(tet.v.map(|v| unique[v]));
        }
    }
    let neighbors = builder
        .tets
        .iter()
        .enumerate()
        .filter(|(t, _)| remap[*t].is_some())
        .map(|(_, tet)| tet.n.map(|n| n.and_then(|nb| remap[nb])))
        .collect();

    trace!(
        "Tetrahedralised {} points into {} tetrahedra",
        real,
        tetrahedra.len()
    );
    Ok(Tetrahedralization {
        tetrahedra,
        neighbors,
    })
}
