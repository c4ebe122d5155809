/// Constants shared by the islet meshing tools
pub mod class;
pub mod raster;
pub mod reconstruction;
