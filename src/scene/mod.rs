//! Scene state handed to nodes during `update`

mod camera;

pub use camera::*;
