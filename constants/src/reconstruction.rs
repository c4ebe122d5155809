/// Islets with this many points or fewer are skipped
pub const MIN_ISLET_POINTS: usize = 8;

/// Islets spanning fewer cells than this are meshed as a convex hull
pub const HULL_SPAN_LIMIT: usize = 50;

/// Islets spanning more cells than this are meshed as an extruded 2D alpha shape
pub const EXTRUDE_SPAN_LIMIT: usize = 10_000;

/// Number of horizontal layers for the sliced alpha shape
pub const LAYER_COUNT: usize = 5;

/// Extra height added above each layer, as a fraction of the layer height
pub const LAYER_OVERLAP: f64 = 1.0 / 3.0;

/// Layers with fewer points than this produce no mesh
pub const MIN_LAYER_POINTS: usize = 6;

/// Lower clamp for the adaptive alpha parameter
pub const MIN_ALPHA: f64 = 0.01;

/// Slope applied to log10(point count) when deriving alpha
pub const ALPHA_LOG_SLOPE: f64 = 1.8 / 10.0;
