/// Per-islet mesh reconstruction with an ordered fallback chain
use crate::alpha_shape::{adaptive_alpha, alpha_shape_3d, extruded_alpha_shape, sliced_alpha_shapes};
use crate::config::MeshingConfig;
use crate::error::{GeometryError, GeometryResult, catch_panic};
use crate::hull::convex_hull;
use crate::mesh::NamedMesh;
use crate::partition::Islet;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// A way of turning an islet's points into a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ConvexHull,
    /// One 3D alpha shape per horizontal layer.
    SlicedAlpha,
    /// One 3D alpha shape over the whole islet.
    SingleAlpha,
    /// 2D alpha boundary extruded between the lowest and highest z.
    ExtrudedAlpha,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::ConvexHull => "convex hull",
            Strategy::SlicedAlpha => "sliced alpha shape",
            Strategy::SingleAlpha => "single alpha shape",
            Strategy::ExtrudedAlpha => "extruded 2D alpha shape",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal state of one islet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IsletStatus {
    /// Too few points; nothing attempted.
    Skipped,
    /// The first planned strategy worked.
    Reconstructed,
    /// A fallback strategy worked after earlier ones failed.
    Recovered,
    FailedAllStrategies,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub strategy: Strategy,
    /// `None` when the strategy produced the islet's meshes.
    pub error: Option<String>,
}

/// Audit record of one islet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsletOutcome {
    pub label: u32,
    pub span: usize,
    pub point_count: usize,
    pub status: IsletStatus,
    /// Strategy whose meshes were kept.
    pub strategy: Option<Strategy>,
    pub attempts: Vec<Attempt>,
    /// Files written for this islet, filled in by the writer.
    pub files: Vec<String>,
    pub write_error: Option<String>,
}

impl IsletOutcome {
    fn new(islet: &Islet, status: IsletStatus) -> Self {
        Self {
            label: islet.label,
            span: islet.span,
            point_count: islet.len(),
            status,
            strategy: None,
            attempts: Vec::new(),
            files: Vec::new(),
            write_error: None,
        }
    }

    /// True when at least one strategy failed before the outcome was settled.
    pub fn fallback_fired(&self) -> bool {
        self.attempts.iter().any(|a| a.error.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub outcome: IsletOutcome,
    pub meshes: Vec<NamedMesh>,
}

/// Strategies to try, in order, for an islet of this size.
///
/// Empty when the islet is too small to mesh. Hull-sized and extrusion-sized
/// islets get a single strategy; everything in between falls back from
/// sliced to single alpha shape and finally to the hull.
pub fn plan(point_count: usize, span: usize, config: &MeshingConfig) -> Vec<Strategy> {
    if point_count <= config.min_islet_points {
        Vec::new()
    } else if span < config.hull_span_limit {
        vec![Strategy::ConvexHull]
    } else if span > config.extrude_span_limit {
        vec![Strategy::ExtrudedAlpha]
    } else {
        vec![
            Strategy::SlicedAlpha,
            Strategy::SingleAlpha,
            Strategy::ConvexHull,
        ]
    }
}

fn run_strategy(strategy: Strategy, islet: &Islet, alpha: f64) -> GeometryResult<Vec<NamedMesh>> {
    let (positions, colours, label) = (&islet.positions, &islet.colours, islet.label);
    Ok(match strategy {
        Strategy::ConvexHull => vec![NamedMesh::new(
            format!("hull_{}", label),
            convex_hull(positions, colours)?,
        )],
        Strategy::SingleAlpha => vec![NamedMesh::new(
            format!("alpha_{}", label),
            alpha_shape_3d(positions, colours, alpha)?,
        )],
        Strategy::SlicedAlpha => sliced_alpha_shapes(positions, colours, alpha)?
            .into_iter()
            .map(|(layer, mesh)| NamedMesh::new(format!("alpha_{}_{}", label, layer), mesh))
            .collect(),
        Strategy::ExtrudedAlpha => vec![NamedMesh::new(
            format!("alpha_extruded_{}", label),
            extruded_alpha_shape(positions, colours, alpha)?,
        )],
    })
}

/// Mesh one islet, walking its plan until a strategy succeeds.
///
/// Never fails: every error, including a panic inside a strategy, is
/// recorded in the outcome and the next strategy is tried.
pub fn reconstruct_islet(islet: &Islet, config: &MeshingConfig) -> Reconstruction {
    let strategies = plan(islet.len(), islet.span, config);
    if strategies.is_empty() {
        info!(
            "Islet {}: {} points, skipped",
            islet.label,
            islet.len()
        );
        return Reconstruction {
            outcome: IsletOutcome::new(islet, IsletStatus::Skipped),
            meshes: Vec::new(),
        };
    }

    let alpha = adaptive_alpha(islet.len());
    let mut outcome = IsletOutcome::new(islet, IsletStatus::FailedAllStrategies);

    for (position, &strategy) in strategies.iter().enumerate() {
        let result = catch_panic(
            || run_strategy(strategy, islet, alpha),
            GeometryError::Degenerate,
        );

        match result {
            Ok(meshes) => {
                outcome.attempts.push(Attempt {
                    strategy,
                    error: None,
                });
                outcome.strategy = Some(strategy);
                if position == 0 {
                    outcome.status = IsletStatus::Reconstructed;
                    info!(
                        "Islet {} (span {}, {} points): {}",
                        islet.label, islet.span, outcome.point_count, strategy
                    );
                } else {
                    outcome.status = IsletStatus::Recovered;
                    warn!(
                        "Islet {} (span {}, {} points): recovered with {}",
                        islet.label, islet.span, outcome.point_count, strategy
                    );
                }
                return Reconstruction { outcome, meshes };
            }
            Err(e) => {
                warn!("Islet {}: {} failed: {}", islet.label, strategy, e);
                outcome.attempts.push(Attempt {
                    strategy,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    warn!(
        "Islet {} (span {}, {} points): every strategy failed, dropped",
        islet.label, islet.span, outcome.point_count
    );
    Reconstruction {
        outcome,
        meshes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point3;

    fn islet(label: u32, span: usize, positions: Vec<Point3<f64>>) -> Islet {
        let count = positions.len();
        Islet {
            label,
            span,
            colours: vec![[10, 20, 30]; count],
            source_indices: (0..count).collect(),
            positions,
        }
    }

    fn cube_with_center() -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    points.push(Point3::new(x, y, z));
                }
            }
        }
        points.push(Point3::new(0.5, 0.5, 0.5));
        points
    }

    #[test]
    fn test_plan_thresholds() {
        let config = MeshingConfig::default();
        assert!(plan(8, 49, &config).is_empty());
        assert_eq!(plan(9, 49, &config), vec![Strategy::ConvexHull]);
        assert_eq!(plan(9, 50, &config)[0], Strategy::SlicedAlpha);
        assert_eq!(
            plan(500, 10_000, &config),
            vec![
                Strategy::SlicedAlpha,
                Strategy::SingleAlpha,
                Strategy::ConvexHull
            ]
        );
        assert_eq!(plan(500, 10_001, &config), vec![Strategy::ExtrudedAlpha]);
    }

    #[test]
    fn test_eight_points_skipped() {
        let mut points = cube_with_center();
        points.pop();
        let result = reconstruct_islet(&islet(3, 49, points), &MeshingConfig::default());
        assert_eq!(result.outcome.status, IsletStatus::Skipped);
        assert!(result.outcome.attempts.is_empty());
        assert!(result.meshes.is_empty());
    }

    #[test]
    fn test_nine_points_small_span_use_hull() {
        let result =
            reconstruct_islet(&islet(4, 49, cube_with_center()), &MeshingConfig::default());
        assert_eq!(result.outcome.status, IsletStatus::Reconstructed);
        assert_eq!(result.outcome.strategy, Some(Strategy::ConvexHull));
        assert_eq!(result.meshes.len(), 1);
        assert_eq!(result.meshes[0].name, "hull_4");
        assert_eq!(result.meshes[0].mesh.triangle_count(), 12);
    }

    #[test]
    fn test_sparse_layers_recover_with_single_alpha() {
        // Every layer holds fewer than six points, so slicing yields nothing.
        let corners = [[0.0, 0.0], [0.5, 0.0], [0.0, 0.5], [0.5, 0.5]];
        let points: Vec<Point3<f64>> = (0..10)
            .map(|k| {
                let [x, y] = corners[k % 4];
                Point3::new(x + 0.01 * k as f64, y, 0.3 * k as f64)
            })
            .collect();
        let result = reconstruct_islet(&islet(7, 100, points), &MeshingConfig::default());

        assert_eq!(result.outcome.status, IsletStatus::Recovered);
        assert_eq!(result.outcome.strategy, Some(Strategy::SingleAlpha));
        assert!(result.outcome.fallback_fired());
        assert_eq!(result.outcome.attempts[0].strategy, Strategy::SlicedAlpha);
        assert_eq!(result.meshes[0].name, "alpha_7");
    }

    #[test]
    fn test_collinear_islet_fails_without_panic() {
        let points: Vec<Point3<f64>> = (0..30)
            .map(|k| Point3::new(k as f64, 0.5 * k as f64, 2.0 + k as f64))
            .collect();
        let result = reconstruct_islet(&islet(9, 60, points), &MeshingConfig::default());

        assert_eq!(result.outcome.status, IsletStatus::FailedAllStrategies);
        assert_eq!(result.outcome.strategy, None);
        assert_eq!(result.outcome.attempts.len(), 3);
        assert!(result.outcome.attempts.iter().all(|a| a.error.is_some()));
        assert!(result.meshes.is_empty());
    }

    #[test]
    fn test_sliced_meshes_are_named_by_layer() {
        let mut state = 7u64;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        let points: Vec<Point3<f64>> = (0..400)
            .map(|_| Point3::new(next() * 3.0, next() * 3.0, next() * 10.0))
            .collect();
        let result = reconstruct_islet(&islet(12, 80, points), &MeshingConfig::default());

        assert_eq!(result.outcome.status, IsletStatus::Reconstructed);
        assert_eq!(result.outcome.strategy, Some(Strategy::SlicedAlpha));
        assert!(!result.meshes.is_empty());
        assert!(result.meshes.iter().all(|m| m.name.starts_with("alpha_12_")));
    }

    #[test]
    fn test_centimetre_quantised_crown_slices_first_time() {
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        let snap = |v: f64| (v * 100.0).round() / 100.0;
        let points: Vec<Point3<f64>> = (0..3000)
            .map(|_| {
                Point3::new(
                    snap(652_000.0 + 20.0 * next()),
                    snap(6_862_000.0 + 20.0 * next()),
                    snap(40.0 + 8.0 * next()),
                )
            })
            .collect();
        let result = reconstruct_islet(&islet(21, 60, points), &MeshingConfig::default());

        assert_eq!(result.outcome.status, IsletStatus::Reconstructed);
        assert_eq!(result.outcome.strategy, Some(Strategy::SlicedAlpha));
        assert!(!result.outcome.fallback_fired());
        assert_eq!(result.meshes.len(), 5);
    }
}
