/// Default edge length of a grid cell, in point-cloud units
pub const DEFAULT_CELL_SIZE: f64 = 2.0;

/// Red channel value above which the first sample marks a cloud as 16-bit colour
pub const SIXTEEN_BIT_COLOUR_THRESHOLD: u16 = 256;

/// Divisor bringing 16-bit colour channels down to 8 bits
pub const SIXTEEN_BIT_COLOUR_DIVISOR: u16 = 256;

/// Decimal places written for every float in an OBJ file
pub const OBJ_DECIMALS: usize = 8;

/// Default input shipped with the sample data set
pub const DEFAULT_INPUT_PATH: &str = "./SampleDatas/ExampleDataIsolatedTrees.las";

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "./output/";
