/// Error taxonomy for the islet meshing pipeline
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Once;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, IsletError>;

/// Failures that stop a run.
///
/// Geometry problems inside a single islet never surface here; they are
/// absorbed by the reconstruction fallback chain and reported per islet.
#[derive(Debug, Error)]
pub enum IsletError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("no point matches the classification filter {classes:?}")]
    EmptyCloud { classes: Vec<u8> },

    #[error("cell size must be a positive finite number, got {0}")]
    InvalidCellSize(f64),

    #[error("report serialisation failed: {0}")]
    Report(#[from] serde_json::Error),

    #[error("malformed OBJ file {path}: {reason}")]
    MalformedObj { path: PathBuf, reason: String },
}

impl IsletError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IsletError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reasons a single reconstruction strategy could not build a mesh.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    #[error("need at least {needed} points, got {found}")]
    InsufficientPoints { needed: usize, found: usize },

    #[error("degenerate point configuration: {0}")]
    Degenerate(String),

    #[error("alpha shape with alpha {alpha:.4} kept no simplex")]
    EmptyAlphaShape { alpha: f64 },

    #[error("convex hull failed: {0}")]
    Hull(String),

    #[error("polygon triangulation failed: {0}")]
    Triangulation(String),
}

/// Geometry result alias used by the reconstruction strategies.
pub type GeometryResult<T> = std::result::Result<T, GeometryError>;

impl GeometryError {
    /// Turn a caught panic payload from a third-party geometry routine into an error.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>, wrap: fn(String) -> Self) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic without message".to_string());
        wrap(message)
    }
}

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Run a geometry routine that may panic, turning the panic into an error.
///
/// While `f` runs, panics on this thread skip the panic hook, so nothing is
/// printed over the progress bar; the message travels in the error instead.
/// Panics on other threads still reach the previous hook.
pub fn catch_panic<T>(
    f: impl FnOnce() -> GeometryResult<T>,
    wrap: fn(String) -> GeometryError,
) -> GeometryResult<T> {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !QUIET_PANICS.with(Cell::get) {
                previous(info);
            }
        }));
    });

    let was_quiet = QUIET_PANICS.replace(true);
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    QUIET_PANICS.set(was_quiet);
    result.unwrap_or_else(|payload| Err(GeometryError::from_panic(payload, wrap)))
}
