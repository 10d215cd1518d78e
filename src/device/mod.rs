//! Known devices on the mesh

mod directory;

pub use directory::{DeviceDirectory, DeviceInfo};
