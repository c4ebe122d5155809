/// Vegetation islet mesher entry point
use anyhow::{Context, Result};
use clap::Parser;
use constants::raster::{DEFAULT_CELL_SIZE, DEFAULT_INPUT_PATH, DEFAULT_OUTPUT_DIR};
use point_cloud_islets::{MeshingConfig, run};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Mesh every vegetation islet of a classified LAS/LAZ point cloud.
#[derive(Parser)]
#[command(name = "point-cloud-islets")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input LAS/LAZ file
    #[arg(short, long, default_value = DEFAULT_INPUT_PATH)]
    input: PathBuf,

    /// Output directory for the meshes and reports
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Grid cell size, in point-cloud units
    #[arg(short, long = "cellsize", default_value_t = DEFAULT_CELL_SIZE)]
    cell_size: f64,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Classification codes treated as vegetation
    #[arg(long, value_delimiter = ',', default_value = "5")]
    classes: Vec<u8>,

    /// Keep files already present in the output directory
    #[arg(long)]
    keep_output: bool,

    /// Skip the canopy surface mesh
    #[arg(long)]
    no_canopy: bool,

    /// Worker threads for islet reconstruction (0 = one per core)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = if verbose {
            "info,point_cloud_islets=debug"
        } else {
            "info"
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure the worker pool")?;
    }

    let config = MeshingConfig {
        cell_size: cli.cell_size,
        classes: cli.classes,
        write_canopy: !cli.no_canopy,
        clear_output: !cli.keep_output,
        ..MeshingConfig::default()
    };

    let report = run(&cli.input, &cli.output, &config)
        .with_context(|| format!("Failed to mesh {}", cli.input.display()))?;

    info!(
        "Wrote {} meshes for {} islets to {} ({:.2}s)",
        report.summary.files_written,
        report.summary.islets,
        cli.output.display(),
        report.phases.iter().map(|p| p.elapsed_ms).sum::<f64>() / 1000.0
    );
    Ok(())
}
