//! Trial content generators
//!
//! - `path`: virtual waypoint patterns, seeded through the trial RNG
//! - `space`: built-in tracking space layouts with default start poses

pub mod path;
pub mod space;

pub use path::{PathSeed, generate_path};
pub use space::{GeneratedSpace, generate_tracking_space, regular_polygon};
