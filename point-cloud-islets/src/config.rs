/// Run configuration shared by the pipeline and echoed into the report
use crate::error::{IsletError, Result};
use constants::class::DEFAULT_VEGETATION_CLASSIFICATIONS;
use constants::raster::DEFAULT_CELL_SIZE;
use constants::reconstruction::{EXTRUDE_SPAN_LIMIT, HULL_SPAN_LIMIT, MIN_ISLET_POINTS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshingConfig {
    /// Edge length of a grid cell.
    pub cell_size: f64,
    /// Classification codes kept from the input.
    pub classes: Vec<u8>,
    /// Islets with at most this many points are skipped.
    pub min_islet_points: usize,
    /// Spans below this are meshed as a convex hull.
    pub hull_span_limit: usize,
    /// Spans above this are meshed as an extruded 2D alpha shape.
    pub extrude_span_limit: usize,
    pub write_canopy: bool,
    /// Remove existing files from the output directory before writing.
    pub clear_output: bool,
}

impl Default for MeshingConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            classes: DEFAULT_VEGETATION_CLASSIFICATIONS.to_vec(),
            min_islet_points: MIN_ISLET_POINTS,
            hull_span_limit: HULL_SPAN_LIMIT,
            extrude_span_limit: EXTRUDE_SPAN_LIMIT,
            write_canopy: true,
            clear_output: true,
        }
    }
}

impl MeshingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(IsletError::InvalidCellSize(self.cell_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MeshingConfig::default();
        assert_eq!(config.cell_size, 2.0);
        assert_eq!(config.classes, vec![5]);
        assert_eq!(config.min_islet_points, 8);
        assert_eq!(config.hull_span_limit, 50);
        assert_eq!(config.extrude_span_limit, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_cell_size() {
        for cell_size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = MeshingConfig {
                cell_size,
                ..MeshingConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(IsletError::InvalidCellSize(_))
            ));
        }
    }

    #[test]
    fn test_json_round_trip() {
        let config = MeshingConfig {
            classes: vec![3, 4, 5],
            ..MeshingConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: MeshingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
