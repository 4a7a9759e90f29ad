//! Geometry primitives shared by the coordinate-transform engine and the
//! sub-app lifecycle manager.
//!
//! Points, translations and 3×3 operators are `nalgebra` types; this module
//! adds the coordinate-system vocabulary (axes, XYZ/RZ/RSPHERICAL) and a few
//! tolerance helpers.

pub mod bounding_box;
pub mod units;

pub use bounding_box::BoundingBox;
pub use units::LengthUnit;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in 3D space.
pub type Point = nalgebra::Point3<f64>;
/// A displacement in 3D space.
pub type Vector = nalgebra::Vector3<f64>;
/// A dense 3×3 operator (scale, rotation, or their composite).
pub type Tensor = nalgebra::Matrix3<f64>;

/// Absolute tolerance used by the identity predicates.
pub const IDENTITY_TOLERANCE: f64 = 1e-10;

/// Returns `true` if `a` and `b` agree within `tol`.
#[inline]
pub fn absolute_fuzzy_equal(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Returns `true` if `m` is the identity matrix within [`IDENTITY_TOLERANCE`].
pub fn is_identity_tensor(m: &Tensor) -> bool {
    (0..3).all(|i| {
        (0..3).all(|j| {
            let expected = if i == j { 1.0 } else { 0.0 };
            absolute_fuzzy_equal(m[(i, j)], expected, IDENTITY_TOLERANCE)
        })
    })
}

/// Cartesian axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index of this axis in a point.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis for a component index, if it is in range.
    pub fn from_index(i: usize) -> Option<Axis> {
        Axis::ALL.get(i).copied()
    }

    /// Unit vector along this axis.
    pub fn unit(self) -> Vector {
        let mut v = Vector::zeros();
        v[self.index()] = 1.0;
        v
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(s)
    }
}

/// Coordinate system of an application domain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CoordSystem {
    /// Cartesian.
    #[default]
    #[serde(rename = "XYZ")]
    Xyz,
    /// Axisymmetric (radius, axial).
    #[serde(rename = "RZ")]
    Rz,
    /// Spherically symmetric (radius only).
    #[serde(rename = "RSPHERICAL")]
    RSpherical,
}

impl CoordSystem {
    /// Number of independent spatial coordinates the system carries.
    pub fn dimension(self) -> usize {
        match self {
            CoordSystem::Xyz => 3,
            CoordSystem::Rz => 2,
            CoordSystem::RSpherical => 1,
        }
    }

    /// Whether the system is axisymmetric or spherically symmetric.
    #[inline]
    pub fn is_radial(self) -> bool {
        !matches!(self, CoordSystem::Xyz)
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordSystem::Xyz => "XYZ",
            CoordSystem::Rz => "RZ",
            CoordSystem::RSpherical => "RSPHERICAL",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_index_roundtrip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_index(axis.index()), Some(axis));
        }
        assert_eq!(Axis::from_index(3), None);
    }

    #[test]
    fn dimension_ordering() {
        assert!(CoordSystem::Xyz.dimension() > CoordSystem::Rz.dimension());
        assert!(CoordSystem::Rz.dimension() > CoordSystem::RSpherical.dimension());
    }

    #[test]
    fn identity_predicates() {
        assert!(is_identity_tensor(&Tensor::identity()));
        let mut m = Tensor::identity();
        m[(0, 1)] = 1e-3;
        assert!(!is_identity_tensor(&m));
    }

    #[test]
    fn coord_system_serde_names() {
        let sys: CoordSystem = serde_json::from_str("\"RSPHERICAL\"").unwrap();
        assert_eq!(sys, CoordSystem::RSpherical);
        assert_eq!(serde_json::to_string(&CoordSystem::Rz).unwrap(), "\"RZ\"");
        let axis: Axis = serde_json::from_str("\"Y\"").unwrap();
        assert_eq!(axis, Axis::Y);
    }
}
