/// Bucketing of cloud points into their islets
use crate::cloud::VegetationCloud;
use crate::grid::GridGeometry;
use crate::labeling::IsletLabels;
use crate::math::Point3;
use std::collections::BTreeMap;
use tracing::debug;

/// Points of one islet, with colours and source indices kept in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct Islet {
    pub label: u32,
    /// Number of grid cells carrying the label.
    pub span: usize,
    pub positions: Vec<Point3<f64>>,
    pub colours: Vec<[u8; 3]>,
    /// Index of each point in the source cloud.
    pub source_indices: Vec<usize>,
}

impl Islet {
    fn new(label: u32, span: usize) -> Self {
        Self {
            label,
            span,
            positions: Vec::new(),
            colours: Vec::new(),
            source_indices: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Lowest and highest z of the islet's points.
    pub fn z_range(&self) -> (f64, f64) {
        self.positions
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.z), hi.max(p.z))
            })
    }
}

/// Assign every cloud point to the islet of its cell.
///
/// Cells are recomputed with the rasteriser's own [`GridGeometry::cell_of`],
/// so the `+1` storage offset is applied identically on both sides. Points in
/// unlabelled cells are dropped. Islets come back in ascending label order.
pub fn partition(
    cloud: &VegetationCloud,
    geometry: &GridGeometry,
    labels: &IsletLabels,
) -> Vec<Islet> {
    let mut islets: BTreeMap<u32, Islet> = labels
        .spans()
        .iter()
        .map(|(&label, &span)| (label, Islet::new(label, span)))
        .collect();

    let mut unassigned = 0usize;
    for (index, point) in cloud.points().iter().enumerate() {
        let label = geometry
            .cell_of(&point.position)
            .map_or(0, |(i, j)| labels.label(i, j));
        match islets.get_mut(&label) {
            Some(islet) => {
                islet.positions.push(point.position);
                islet.colours.push(point.colour);
                islet.source_indices.push(index);
            }
            None => unassigned += 1,
        }
    }

    debug!(
        "Partitioned {} points into {} islets ({} outside any islet)",
        cloud.len() - unassigned,
        islets.len(),
        unassigned
    );

    islets.into_values().collect()
}
