/// Connected-component labelling of the filled cells into islets
use crate::grid::{Grid, HeightRaster};
use crate::quad::{QuadCase, quad_anchors};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

/// Provisional labels and their merge forest.
///
/// Slot 0 is reserved for "unlabeled"; label `k` lives at index `k`.
struct LabelForest {
    parent: Vec<u32>,
}

impl LabelForest {
    fn new() -> Self {
        Self { parent: vec![0] }
    }

    /// Next unused label, starting at 1.
    fn fresh(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    fn find(&mut self, mut label: u32) -> u32 {
        while self.parent[label as usize] != label {
            let grandparent = self.parent[self.parent[label as usize] as usize];
            self.parent[label as usize] = grandparent;
            label = grandparent;
        }
        label
    }

    /// Retire the root `other` in favour of the root `canonical`.
    fn retire(&mut self, canonical: u32, other: u32) {
        self.parent[other as usize] = canonical;
    }

    fn created(&self) -> u32 {
        (self.parent.len() - 1) as u32
    }
}

/// Final islet label per cell (0 = not part of any islet).
#[derive(Debug, Clone)]
pub struct IsletLabels {
    labels: Grid<u32>,
    spans: BTreeMap<u32, usize>,
    created: u32,
}

/// Label the filled cells quad by quad.
///
/// Only quads with three or four filled corners connect cells; a pair of
/// cells touching diagonally stays apart. When a quad joins several labels,
/// the label found first in corner scan order wins and every cell carrying
/// a retired label ends up with the winner once the pass is flattened.
pub fn label_islets(raster: &HeightRaster) -> IsletLabels {
    let mut labels = Grid::<u32>::new(raster.columns(), raster.rows());
    let mut forest = LabelForest::new();
    let mut merges = 0usize;

    for (i, j) in quad_anchors(raster) {
        let corners = QuadCase::classify(raster, i, j).filled_corners();
        if corners.is_empty() {
            continue;
        }

        let mut canonical: Option<u32> = None;
        for corner in corners {
            let (ci, cj) = corner.cell(i, j);
            let existing = labels.get(ci, cj);
            if existing == 0 {
                continue;
            }
            let root = forest.find(existing);
            match canonical {
                None => canonical = Some(root),
                Some(winner) if winner != root => {
                    forest.retire(winner, root);
                    merges += 1;
                }
                Some(_) => {}
            }
        }

        let label = canonical.unwrap_or_else(|| forest.fresh());
        for corner in corners {
            let (ci, cj) = corner.cell(i, j);
            if labels.get(ci, cj) == 0 {
                labels.set(ci, cj, label);
            }
        }
    }

    let mut spans = BTreeMap::new();
    for label in labels.values_mut() {
        if *label != 0 {
            *label = forest.find(*label);
            *spans.entry(*label).or_insert(0) += 1;
        }
    }

    debug!(
        "Labelled {} islets ({} labels created, {} merges)",
        spans.len(),
        forest.created(),
        merges
    );

    IsletLabels {
        labels,
        spans,
        created: forest.created(),
    }
}

impl IsletLabels {
    pub fn label(&self, i: usize, j: usize) -> u32 {
        self.labels.get(i, j)
    }

    pub fn grid(&self) -> &Grid<u32> {
        &self.labels
    }

    /// Cell span (number of labelled cells) per surviving label.
    pub fn spans(&self) -> &BTreeMap<u32, usize> {
        &self.spans
    }

    pub fn span(&self, label: u32) -> usize {
        self.spans.get(&label).copied().unwrap_or(0)
    }

    pub fn islet_count(&self) -> usize {
        self.spans.len()
    }

    /// Labels handed out during the pass, merged ones included.
    pub fn labels_created(&self) -> u32 {
        self.created
    }

    /// Cells of every islet, in storage order.
    pub fn cells_by_label(&self) -> BTreeMap<u32, Vec<(usize, usize)>> {
        let mut cells: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
        for i in 0..self.labels.columns() {
            for j in 0..self.labels.rows() {
                let label = self.labels.get(i, j);
                if label != 0 {
                    cells.entry(label).or_default().push((i, j));
                }
            }
        }
        cells
    }

    /// Text dump of the label grid: one line per column `i`, labels for every `j`.
    pub fn dump(&self) -> String {
        let mut out = String::with_capacity(self.labels.values().len() * 2);
        for i in 0..self.labels.columns() {
            for j in 0..self.labels.rows() {
                let _ = write!(out, "{} ", self.labels.get(i, j));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Raster from rows of text: '#' filled, '.' empty; `rows[j]` char `i` is cell (i, j).
    fn raster(rows: &[&str]) -> HeightRaster {
        let width = rows[0].len();
        let heights: Vec<Vec<f64>> = (0..width)
            .map(|i| {
                rows.iter()
                    .map(|row| if row.as_bytes()[i] == b'#' { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();
        HeightRaster::from_heights(&heights, 0.0, 0.0, 1.0)
    }

    /// Reference labelling that rewrites the whole grid on every merge.
    fn eager_labels(raster: &HeightRaster) -> Grid<u32> {
        let mut labels = Grid::<u32>::new(raster.columns(), raster.rows());
        let mut next = 1;
        for (i, j) in quad_anchors(raster) {
            let corners = QuadCase::classify(raster, i, j).filled_corners();
            if corners.is_empty() {
                continue;
            }
            let present: Vec<u32> = corners
                .iter()
                .map(|c| {
                    let (ci, cj) = c.cell(i, j);
                    labels.get(ci, cj)
                })
                .filter(|&l| l != 0)
                .collect();
            let label = match present.first() {
                None => {
                    next += 1;
                    next - 1
                }
                Some(&first) => {
                    for &other in &present {
                        if other != first {
                            for value in labels.values_mut() {
                                if *value == other {
                                    *value = first;
                                }
                            }
                        }
                    }
                    first
                }
            };
            for c in corners {
                let (ci, cj) = c.cell(i, j);
                if labels.get(ci, cj) == 0 {
                    labels.set(ci, cj, label);
                }
            }
        }
        labels
    }

    fn partition(labels: &IsletLabels) -> BTreeSet<Vec<(usize, usize)>> {
        labels.cells_by_label().into_values().collect()
    }

    #[test]
    fn test_single_block_one_label() {
        let labels = label_islets(&raster(&["....", ".##.", ".##.", "...."]));
        assert_eq!(labels.islet_count(), 1);
        assert_eq!(labels.span(1), 4);
        assert_eq!(labels.label(1, 1), 1);
        assert_eq!(labels.label(0, 0), 0);
    }

    #[test]
    fn test_diagonal_blocks_stay_apart() {
        let labels = label_islets(&raster(&["##...", "##...", "..##.", "..##.", "....."]));
        assert_eq!(labels.islet_count(), 2);
        assert_ne!(labels.label(1, 1), labels.label(2, 2));
    }

    #[test]
    fn test_isolated_diagonal_cells_unlabelled() {
        let labels = label_islets(&raster(&["#..", ".#.", "..."]));
        assert_eq!(labels.islet_count(), 0);
        assert_eq!(labels.label(0, 0), 0);
        assert_eq!(labels.label(1, 1), 0);
    }

    #[test]
    fn test_u_shape_merges_into_first_label() {
        // Two arms get labels 1 and 2 before the bar at high i joins them.
        let labels = label_islets(&raster(&[
            "#####", "#####", "...##", "...##", "#####", "#####",
        ]));
        assert_eq!(labels.islet_count(), 1);
        assert_eq!(labels.labels_created(), 2);
        assert_eq!(labels.span(1), 24);
        assert!(labels.cells_by_label().contains_key(&1));
    }

    #[test]
    fn test_matches_eager_relabelling() {
        let patterns: [&[&str]; 3] = [
            &["##.##.#", "#####.#", "..#.###", "####..#", "#..####"],
            &["#.#.#.#", "#######", ".#.#.#.", "#######", "#.....#"],
            &["###....", "#.#.##.", "###.##.", "....###", "##.#..#"],
        ];
        for rows in patterns {
            let raster = raster(rows);
            let labels = label_islets(&raster);
            assert_eq!(labels.grid(), &eager_labels(&raster), "pattern {:?}", rows);
        }
    }

    #[test]
    fn test_labelling_is_idempotent() {
        let raster = raster(&["##.##.#", "#####.#", "..#.###", "####..#", "#..####"]);
        assert_eq!(
            partition(&label_islets(&raster)),
            partition(&label_islets(&raster))
        );
    }

    #[test]
    fn test_dump_layout() {
        let labels = label_islets(&raster(&["##", "##"]));
        assert_eq!(labels.dump(), "1 1 \n1 1 \n");
    }
}
