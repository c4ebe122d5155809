/// Vegetation point cloud held in memory for the whole run
use crate::bounds::PointCloudBounds;
use crate::math::Point3;
use constants::raster::{SIXTEEN_BIT_COLOUR_DIVISOR, SIXTEEN_BIT_COLOUR_THRESHOLD};

/// One filtered LiDAR return: position plus 8-bit colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VegetationPoint {
    pub position: Point3<f64>,
    pub colour: [u8; 3],
}

impl VegetationPoint {
    pub fn new(x: f64, y: f64, z: f64, colour: [u8; 3]) -> Self {
        Self {
            position: Point3::new(x, y, z),
            colour,
        }
    }
}

/// Immutable set of vegetation points with their bounding box.
#[derive(Debug, Clone)]
pub struct VegetationCloud {
    points: Vec<VegetationPoint>,
    bounds: PointCloudBounds,
}

impl VegetationCloud {
    pub fn new(points: Vec<VegetationPoint>) -> Self {
        let bounds = PointCloudBounds::from_positions(points.iter().map(|p| &p.position));
        Self { points, bounds }
    }

    /// Build a cloud from positions and raw colour channels, applying the
    /// 16-bit colour detection to the whole set.
    pub fn from_raw(positions: Vec<Point3<f64>>, raw_colours: &[[u16; 3]]) -> Self {
        let colours = normalize_colours(raw_colours);
        let points = positions
            .into_iter()
            .zip(colours)
            .map(|(position, colour)| VegetationPoint { position, colour })
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[VegetationPoint] {
        &self.points
    }

    pub fn bounds(&self) -> &PointCloudBounds {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// True when the first sample's red channel can only come from 16-bit colour.
pub fn is_sixteen_bit(raw_colours: &[[u16; 3]]) -> bool {
    raw_colours
        .first()
        .is_some_and(|c| c[0] > SIXTEEN_BIT_COLOUR_THRESHOLD)
}

/// Bring raw colour channels to 8 bits.
///
/// The whole cloud is treated as 16-bit when the first sample says so, and
/// every channel is integer-divided by 256. Otherwise channels are clamped
/// to 255.
pub fn normalize_colours(raw_colours: &[[u16; 3]]) -> Vec<[u8; 3]> {
    let divisor = if is_sixteen_bit(raw_colours) {
        SIXTEEN_BIT_COLOUR_DIVISOR
    } else {
        1
    };

    raw_colours
        .iter()
        .map(|c| c.map(|channel| (channel / divisor).min(255) as u8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixteen_bit_detected_from_first_sample() {
        let raw = [[65535, 512, 0], [256, 256, 256]];
        assert!(is_sixteen_bit(&raw));
        assert_eq!(normalize_colours(&raw), vec![[255, 2, 0], [1, 1, 1]]);
    }

    #[test]
    fn test_threshold_is_strict() {
        // 256 is not above the threshold, so channels stay as they are (clamped).
        let raw = [[256, 10, 20], [300, 40, 50]];
        assert!(!is_sixteen_bit(&raw));
        assert_eq!(normalize_colours(&raw), vec![[255, 10, 20], [255, 40, 50]]);
    }

    #[test]
    fn test_cloud_bounds_follow_points() {
        let cloud = VegetationCloud::from_raw(
            vec![Point3::new(0.0, 0.0, 1.0), Point3::new(4.0, 2.0, 3.0)],
            &[[1, 2, 3], [4, 5, 6]],
        );
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.bounds().max_x, 4.0);
        assert_eq!(cloud.points()[1].colour, [4, 5, 6]);
    }
}
