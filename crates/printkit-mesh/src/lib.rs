//! Bed mesh grids, persisted profiles, and scan compensation

pub mod compensator;
pub mod grid;
pub mod profile;

pub use compensator::{compensate, compensate_profile, offset_grid, CompensationMode};
pub use grid::{Bounds, MeshGrid};
pub use profile::{MeshProfile, ProfileStore, PROFILE_VERSION};
