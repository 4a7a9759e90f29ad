//! Coordinate transformations between coupled applications.
//!
//! [`CoordTransform`] describes one application's frame;
//! [`MultiAppCoordTransform`] pairs two of them for point mapping.

pub mod coord_transform;
pub mod mesh;
pub mod multiapp;

pub use coord_transform::{CoordConfig, CoordTransform, Frame, MinimalData, extrinsic_rotation_matrix};
pub use mesh::{MeshNodes, NodeUpdate, TransformHooks, update_mesh};
pub use multiapp::MultiAppCoordTransform;
