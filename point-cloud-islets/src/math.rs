/// Geometric predicates over nalgebra points
pub use parry3d_f64::na::{Point3, Vector3};
use robust::{Coord, Coord3D};

fn coord3(p: &Point3<f64>) -> Coord3D<f64> {
    Coord3D {
        x: p.x,
        y: p.y,
        z: p.z,
    }
}

/// Six times the signed volume of the tetrahedron `abcd`, exact in sign.
///
/// Positive when `d` lies on the side `(b - a) x (c - a)` points to.
#[inline]
pub fn orient3d(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    // robust follows Shewchuk: positive when `d` is below `abc`.
    -robust::orient3d(coord3(a), coord3(b), coord3(c), coord3(d))
}

/// Positive when `e` lies strictly inside the circumsphere of `abcd`, exact in sign.
///
/// `abcd` must be positively oriented in the [`orient3d`] sense.
#[inline]
pub fn in_sphere(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    e: &Point3<f64>,
) -> f64 {
    -robust::insphere(coord3(a), coord3(b), coord3(c), coord3(d), coord3(e))
}

/// Twice the signed area of the planar triangle `abc`, positive when counter-clockwise.
#[inline]
pub fn orient2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    robust::orient2d(
        Coord { x: a[0], y: a[1] },
        Coord { x: b[0], y: b[1] },
        Coord { x: c[0], y: c[1] },
    )
}

/// Circumradius of a tetrahedron, infinite when it is flat.
pub fn circumradius(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let (ba, ca, da) = (b - a, c - a, d - a);
    let denom = 2.0 * ba.dot(&ca.cross(&da));
    if denom.abs() < f64::MIN_POSITIVE || !denom.is_finite() {
        return f64::INFINITY;
    }
    let offset = (ca.cross(&da) * ba.norm_squared()
        + da.cross(&ba) * ca.norm_squared()
        + ba.cross(&ca) * da.norm_squared())
        / denom;
    offset.norm()
}

/// Circumradius of a planar triangle, infinite when degenerate.
pub fn circumradius_2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    let ab = (b[0] - a[0]).hypot(b[1] - a[1]);
    let bc = (c[0] - b[0]).hypot(c[1] - b[1]);
    let ca = (a[0] - c[0]).hypot(a[1] - c[1]);
    let area2 = orient2d(a, b, c).abs();
    if area2 <= f64::EPSILON * (ab * bc * ca).max(f64::MIN_POSITIVE) {
        return f64::INFINITY;
    }
    (ab * bc * ca) / (2.0 * area2)
}

/// Affine dimension of a point set: 0 (single point), 1 (collinear),
/// 2 (coplanar) or 3, with a tolerance relative to the set's extent.
pub fn affine_dimension(points: &[Point3<f64>]) -> usize {
    let Some(first) = points.first() else {
        return 0;
    };

    let farthest = |metric: &dyn Fn(&Point3<f64>) -> f64| -> (usize, f64) {
        points
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, metric(p)))
            .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best })
    };

    let (i1, d1) = farthest(&|p| (p - first).norm_squared());
    let extent = d1.sqrt();
    if extent <= f64::EPSILON {
        return 0;
    }
    let tolerance = extent * 1e-9;

    let axis: Vector3<f64> = points[i1] - first;
    let (i2, d2) = farthest(&|p| axis.cross(&(p - first)).norm() / extent);
    if d2 <= tolerance {
        return 1;
    }

    let normal = axis.cross(&(points[i2] - first)).normalize();
    let (_, d3) = farthest(&|p| normal.dot(&(p - first)).abs());
    if d3 <= tolerance { 2 } else { 3 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orient3d_sign() {
        let o = Point3::origin();
        let x = Point3::new(1.0, 0.0, 0.0);
        let y = Point3::new(0.0, 1.0, 0.0);
        assert!(orient3d(&o, &x, &y, &Point3::new(0.0, 0.0, 1.0)) > 0.0);
        assert!(orient3d(&o, &x, &y, &Point3::new(0.0, 0.0, -1.0)) < 0.0);
        assert_eq!(orient3d(&o, &x, &y, &Point3::new(3.0, -2.0, 0.0)), 0.0);
    }

    #[test]
    fn test_orient3d_exact_far_from_origin() {
        // Centimetre steps on Lambert-93 sized coordinates.
        let base = Point3::new(652_345.01, 6_862_123.02, 48.03);
        let a = base;
        let b = base + Vector3::new(0.01, 0.0, 0.0);
        let c = base + Vector3::new(0.0, 0.01, 0.0);
        let coplanar = base + Vector3::new(0.02, 0.03, 0.0);
        let above = base + Vector3::new(0.02, 0.03, 0.01);
        assert_eq!(orient3d(&a, &b, &c, &coplanar), 0.0);
        assert!(orient3d(&a, &b, &c, &above) > 0.0);
    }

    #[test]
    fn test_in_sphere_sign() {
        let a = Point3::origin();
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let d = Point3::new(0.0, 0.0, 1.0);
        assert!(orient3d(&a, &b, &c, &d) > 0.0);
        assert!(in_sphere(&a, &b, &c, &d, &Point3::new(0.25, 0.25, 0.25)) > 0.0);
        assert!(in_sphere(&a, &b, &c, &d, &Point3::new(2.0, 2.0, 2.0)) < 0.0);
        // The cube corner lies on the sphere through the other four.
        assert_eq!(in_sphere(&a, &b, &c, &d, &Point3::new(1.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_circumradius_of_corner_tetrahedron() {
        let r = circumradius(
            &Point3::origin(),
            &Point3::new(2.0, 0.0, 0.0),
            &Point3::new(0.0, 2.0, 0.0),
            &Point3::new(0.0, 0.0, 2.0),
        );
        assert_relative_eq!(r, 3f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_flat_tetrahedron_has_infinite_radius() {
        let r = circumradius(
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(1.0, 1.0, 0.0),
        );
        assert!(r.is_infinite());
    }

    #[test]
    fn test_circumradius_2d_right_triangle() {
        assert_relative_eq!(circumradius_2d([0.0, 0.0], [2.0, 0.0], [0.0, 2.0]), 2f64.sqrt());
        assert!(circumradius_2d([0.0, 0.0], [1.0, 1.0], [2.0, 2.0]).is_infinite());
    }

    #[test]
    fn test_affine_dimension() {
        let line: Vec<Point3<f64>> = (0..10)
            .map(|k| Point3::new(k as f64, 2.0 * k as f64, 1.0))
            .collect();
        assert_eq!(affine_dimension(&line), 1);

        let plane = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(1.0, 0.0, 5.0),
            Point3::new(0.0, 1.0, 5.0),
            Point3::new(1.0, 1.0, 5.0),
        ];
        assert_eq!(affine_dimension(&plane), 2);

        let mut solid = plane.clone();
        solid.push(Point3::new(0.5, 0.5, 6.0));
        assert_eq!(affine_dimension(&solid), 3);

        let twice = [Point3::new(1.0, 1.0, 1.0); 2];
        assert_eq!(affine_dimension(&twice), 0);
    }
}
