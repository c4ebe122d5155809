//! Vegetation islet meshing for classified LiDAR point clouds.
//!
//! The pipeline bins vegetation points into a height grid, separates the
//! filled cells into connected islets and rebuilds a surface mesh for each
//! islet with a size-dependent strategy (convex hull, sliced or single 3D
//! alpha shape, extruded 2D alpha shape), falling back to simpler strategies
//! when one fails. See [`pipeline::run`] for the entry point.

pub mod alpha_shape;
pub mod bounds;
pub mod canopy;
pub mod cloud;
pub mod config;
pub mod delaunay;
pub mod error;
pub mod grid;
pub mod hull;
pub mod labeling;
pub mod laz;
pub mod math;
pub mod mesh;
pub mod obj;
pub mod partition;
pub mod pipeline;
pub mod quad;
pub mod reconstruct;
pub mod report;
pub mod timing;

pub use config::MeshingConfig;
pub use error::{GeometryError, IsletError, Result};
pub use pipeline::{run, run_on_cloud};
