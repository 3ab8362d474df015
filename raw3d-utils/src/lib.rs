//! Small helpers shared by the raw3d crates.

pub mod debug;
pub mod text;
