/// End-to-end run: read, rasterise, label, partition, reconstruct, write
use crate::canopy::triangulate;
use crate::cloud::VegetationCloud;
use crate::config::MeshingConfig;
use crate::error::{IsletError, Result};
use crate::grid::HeightRaster;
use crate::labeling::label_islets;
use crate::laz::read_vegetation;
use crate::mesh::NamedMesh;
use crate::obj::save_obj;
use crate::partition::{Islet, partition};
use crate::reconstruct::{IsletOutcome, reconstruct_islet};
use crate::report::{RunReport, Summary, write_choices, write_json};
use crate::timing::PhaseTimer;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CANOPY_FILE: &str = "canopy.obj";
pub const LABELS_FILE: &str = "islet_labels.txt";
pub const CHOICES_FILE: &str = "choices.txt";
pub const REPORT_FILE: &str = "report.json";

/// Make sure `dir` exists; when `clear` is set, remove the regular files
/// already in it. Sub-directories are left alone.
pub fn prepare_output_dir(dir: &Path, clear: bool) -> Result<()> {
    if !dir.exists() {
        info!("Creating output directory {}", dir.display());
        return fs::create_dir_all(dir).map_err(|e| IsletError::io(dir, e));
    }
    if !clear {
        return Ok(());
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(|e| IsletError::io(dir, e))? {
        let path = entry.map_err(|e| IsletError::io(dir, e))?.path();
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| IsletError::io(&path, e))?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!("Removed {} files from {}", removed, dir.display());
    }
    Ok(())
}

/// Read the vegetation of `input` and run the whole pipeline on it.
pub fn run(input: &Path, output: &Path, config: &MeshingConfig) -> Result<RunReport> {
    config.validate()?;
    let mut timer = PhaseTimer::new();
    let cloud = timer.measure("read", || read_vegetation(input, &config.classes))?;
    run_on_cloud(&cloud, &input.display().to_string(), output, config, &mut timer)
}

/// Run every phase after loading on an in-memory cloud.
pub fn run_on_cloud(
    cloud: &VegetationCloud,
    input_name: &str,
    output: &Path,
    config: &MeshingConfig,
    timer: &mut PhaseTimer,
) -> Result<RunReport> {
    config.validate()?;
    if cloud.is_empty() {
        return Err(IsletError::EmptyCloud {
            classes: config.classes.clone(),
        });
    }

    timer.measure("prepare output", || {
        prepare_output_dir(output, config.clear_output)
    })?;
    let raster = timer.measure("rasterise", || HeightRaster::build(cloud, config.cell_size))?;
    let labels = timer.measure("label", || label_islets(&raster));
    info!(
        "Found {} islets on a {}x{} grid",
        labels.islet_count(),
        raster.geometry().width,
        raster.geometry().height
    );

    timer.measure("canopy", || -> Result<()> {
        let labels_path = output.join(LABELS_FILE);
        fs::write(&labels_path, labels.dump()).map_err(|e| IsletError::io(&labels_path, e))?;
        if config.write_canopy {
            let mut surface = triangulate(&raster);
            surface.colourize(&labels);
            save_obj(&surface.mesh, &output.join(CANOPY_FILE))?;
        }
        Ok(())
    })?;

    let islets = timer.measure("partition", || partition(cloud, raster.geometry(), &labels));
    let outcomes = timer.measure("reconstruct", || reconstruct_all(&islets, config, output));

    let summary = Summary::from_outcomes(&outcomes);
    info!(
        "{} islets: {} reconstructed, {} recovered, {} skipped, {} failed",
        summary.islets, summary.reconstructed, summary.recovered, summary.skipped, summary.failed
    );

    // The report records every phase up to, not including, its own writing.
    let report = RunReport {
        input: input_name.to_string(),
        point_count: cloud.len(),
        bounds: *cloud.bounds(),
        grid: *raster.geometry(),
        labels_created: labels.labels_created(),
        config: config.clone(),
        summary,
        islets: outcomes,
        phases: timer.report(),
    };
    timer.measure("report", || -> Result<()> {
        write_choices(&output.join(CHOICES_FILE), &report.islets)?;
        write_json(&output.join(REPORT_FILE), &report)
    })?;
    Ok(report)
}

/// Reconstruct every islet in parallel and write its meshes.
///
/// Outcomes keep the ascending label order of `islets`.
fn reconstruct_all(islets: &[Islet], config: &MeshingConfig, output: &Path) -> Vec<IsletOutcome> {
    let pb = ProgressBar::new(islets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {pos}/{len} islets ({percent}%) {msg}")
            .expect("static progress template")
            .progress_chars("▉▊▋▌▍▎▏ "),
    );
    pb.set_message("Reconstructing islets");

    let outcomes = islets
        .par_iter()
        .map(|islet| {
            let reconstruction = reconstruct_islet(islet, config);
            let mut outcome = reconstruction.outcome;
            write_meshes(&reconstruction.meshes, output, &mut outcome);
            pb.inc(1);
            outcome
        })
        .collect();

    pb.finish_with_message("Islets reconstructed");
    outcomes
}

fn write_meshes(meshes: &[NamedMesh], output: &Path, outcome: &mut IsletOutcome) {
    for named in meshes {
        let file_name = format!("{}.obj", named.name);
        match save_obj(&named.mesh, &output.join(&file_name)) {
            Ok(()) => outcome.files.push(file_name),
            Err(e) => {
                warn!("Islet {}: {}", outcome.label, e);
                outcome.write_error = Some(e.to_string());
                return;
            }
        }
    }
}
