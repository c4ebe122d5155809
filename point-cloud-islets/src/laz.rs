/// LAS/LAZ point source filtered to vegetation classes
use crate::cloud::VegetationCloud;
use crate::error::{IsletError, Result};
use crate::math::Point3;
use constants::class::{get_class_name, is_vegetation};
use indicatif::{ProgressBar, ProgressStyle};
use las::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

/// Colour used when the point format carries no RGB.
const MISSING_COLOUR: [u16; 3] = [255, 255, 255];

/// Create LAS file reader for point cloud access.
/// Handles both .las and .laz compressed formats.
pub fn create_reader(file_path: &Path) -> Result<Reader> {
    let file = File::open(file_path).map_err(|e| IsletError::io(file_path, e))?;
    let buf_reader = BufReader::new(file);
    Ok(Reader::new(buf_reader)?)
}

/// Read every point whose classification is in `classes`.
///
/// Colour depth is detected on the filtered set: a first red sample above 256
/// marks the cloud as 16-bit and all channels are downscaled.
pub fn read_vegetation(file_path: &Path, classes: &[u8]) -> Result<VegetationCloud> {
    for &class_id in classes.iter().filter(|&&c| !is_vegetation(c)) {
        warn!(
            "class {} ({}) is not a vegetation class",
            class_id,
            get_class_name(class_id)
        );
    }

    let mut reader = create_reader(file_path)?;
    log_file_info(&reader, file_path);

    let total_points = reader.header().number_of_points();
    let pb = ProgressBar::new(total_points);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} points ({percent}%) {msg}")
            .expect("static progress template")
            .progress_chars("▉▊▋▌▍▎▏ "),
    );
    pb.set_message("Filtering vegetation");

    let mut positions = Vec::new();
    let mut raw_colours = Vec::new();
    let mut class_counts: HashMap<u8, usize> = HashMap::new();

    for (idx, point_result) in reader.points().enumerate() {
        let point = point_result?;
        let classification = u8::from(point.classification);
        *class_counts.entry(classification).or_default() += 1;

        if idx % 50_000 == 0 {
            pb.set_position(idx as u64);
        }

        if !classes.contains(&classification) {
            continue;
        }

        positions.push(Point3::new(point.x, point.y, point.z));
        raw_colours.push(
            point
                .color
                .map_or(MISSING_COLOUR, |c| [c.red, c.green, c.blue]),
        );
    }
    pb.finish_with_message("Points filtered");

    let mut summary: Vec<_> = class_counts.into_iter().collect();
    summary.sort_unstable();
    for (class_id, count) in summary {
        debug!(
            "class {} ({}): {} points",
            class_id,
            get_class_name(class_id),
            count
        );
    }

    if positions.is_empty() {
        return Err(IsletError::EmptyCloud {
            classes: classes.to_vec(),
        });
    }

    let cloud = VegetationCloud::from_raw(positions, &raw_colours);
    let (width, depth, height) = cloud.bounds().dimensions();
    debug!(
        "Vegetation extent: {:.2} x {:.2} x {:.2}",
        width, depth, height
    );
    info!(
        "Kept {} of {} points (classes {:?})",
        cloud.len(),
        total_points,
        classes
    );
    Ok(cloud)
}

/// Log coordinate system and file information for debugging.
fn log_file_info(reader: &Reader, file_path: &Path) {
    let header = reader.header();
    info!("Reading {}", file_path.display());
    debug!(
        "LAS {}.{}, {} points, point format {:?}",
        header.version().major,
        header.version().minor,
        header.number_of_points(),
        header.point_format().to_u8()
    );
    let transforms = header.transforms();
    debug!(
        "Scale factors: X={}, Y={}, Z={}; offsets: X={}, Y={}, Z={}",
        transforms.x.scale,
        transforms.y.scale,
        transforms.z.scale,
        transforms.x.offset,
        transforms.y.offset,
        transforms.z.offset
    );
}
