//! Per-application coordinate description.
//!
//! A [`CoordTransform`] records how one application's mesh frame relates to
//! the shared reference frame: a uniform scale (from the mesh length unit), a
//! rotation (Euler angles or an "up direction" shortcut) and the coordinate
//! system (XYZ, RZ or RSPHERICAL) together with which Cartesian axes carry the
//! radial and axial coordinates after rotation.
//!
//! The forward map is `y = R·S·x`; the composite `RS` and its inverse are
//! cached by [`CoordTransform::compute_rs`] whenever either factor changes.
//! Because scale factors are strictly positive and rotations orthogonal, the
//! inverse is always `S⁻¹·Rᵀ`.

use super::mesh::{MeshNodes, NodeUpdate, TransformHooks, update_mesh};
use crate::coupling_error::CouplingError;
use crate::geometry::{Axis, CoordSystem, LengthUnit, Tensor, Vector, absolute_fuzzy_equal};
use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};

/// Where the radial and axial coordinates live for a coordinate system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    Xyz,
    Rz { r_axis: Axis, z_axis: Axis },
    RSpherical { r_axis: Axis },
}

impl Frame {
    /// Unrotated frame for `system`; RZ needs its symmetry axis.
    pub fn canonical(system: CoordSystem, rz_axis: Axis) -> Result<Self, CouplingError> {
        Ok(match system {
            CoordSystem::Xyz => Frame::Xyz,
            CoordSystem::Rz => match rz_axis {
                Axis::X => Frame::Rz {
                    r_axis: Axis::Y,
                    z_axis: Axis::X,
                },
                Axis::Y => Frame::Rz {
                    r_axis: Axis::X,
                    z_axis: Axis::Y,
                },
                Axis::Z => return Err(CouplingError::InvalidSymmetryAxis(Axis::Z)),
            },
            CoordSystem::RSpherical => Frame::RSpherical { r_axis: Axis::X },
        })
    }

    pub fn coord_system(&self) -> CoordSystem {
        match self {
            Frame::Xyz => CoordSystem::Xyz,
            Frame::Rz { .. } => CoordSystem::Rz,
            Frame::RSpherical { .. } => CoordSystem::RSpherical,
        }
    }

    pub fn r_axis(&self) -> Option<Axis> {
        match self {
            Frame::Xyz => None,
            Frame::Rz { r_axis, .. } | Frame::RSpherical { r_axis } => Some(*r_axis),
        }
    }

    pub fn z_axis(&self) -> Option<Axis> {
        match self {
            Frame::Rz { z_axis, .. } => Some(*z_axis),
            _ => None,
        }
    }
}

/// Rotation matrix for extrinsic z-x-z Euler angles in degrees.
///
/// `alpha` rotates about z, then `beta` about the fixed x axis, then `gamma`
/// about the fixed z axis. `(90, 0, 0)` takes x onto y; `(0, -90, 0)` takes z
/// onto y.
pub fn extrinsic_rotation_matrix(alpha: f64, beta: f64, gamma: f64) -> Tensor {
    let rz = |deg: f64| Rotation3::from_axis_angle(&Vector::z_axis(), deg.to_radians());
    let rx = |deg: f64| Rotation3::from_axis_angle(&Vector::x_axis(), deg.to_radians());
    (rz(gamma) * rx(beta) * rz(alpha)).into_inner()
}

/// Axis a unit vector lies on, with its sign, when `v` is (fuzzily) an axis
/// direction.
fn signed_axis(v: &Vector) -> Option<(Axis, f64)> {
    Axis::ALL.into_iter().find_map(|axis| {
        let c = v[axis.index()];
        absolute_fuzzy_equal(c.abs(), 1.0, 1e-8).then_some((axis, c.signum()))
    })
}

/// Re-derive the radial/axial axes of `canonical` after rotating by `rotate`.
fn rotate_frame(canonical: Frame, rotate: &Tensor, angles: [f64; 3]) -> Result<Frame, CouplingError> {
    let illegal = || CouplingError::IllegalRotation {
        coord_system: canonical.coord_system(),
        alpha: angles[0],
        beta: angles[1],
        gamma: angles[2],
    };
    let map_radial = |r: Axis| -> Result<Axis, CouplingError> {
        let (mapped, sign) = signed_axis(&(rotate * r.unit())).ok_or_else(illegal)?;
        if sign < 0.0 {
            return Err(CouplingError::NegativeRadius { r_axis: r, mapped });
        }
        Ok(mapped)
    };
    Ok(match canonical {
        Frame::Xyz => Frame::Xyz,
        Frame::Rz { r_axis, z_axis } => {
            let r = map_radial(r_axis)?;
            let (z, _) = signed_axis(&(rotate * z_axis.unit())).ok_or_else(illegal)?;
            Frame::Rz {
                r_axis: r,
                z_axis: z,
            }
        }
        Frame::RSpherical { r_axis } => Frame::RSpherical {
            r_axis: map_radial(r_axis)?,
        },
    })
}

fn check_angle(name: &str, value: f64) -> Result<f64, CouplingError> {
    if value > -180.0 && value <= 180.0 {
        Ok(value)
    } else {
        Err(CouplingError::InvalidConfig(format!(
            "{name} = {value} must lie in (-180, 180]"
        )))
    }
}

/// Coordinate options for one application, as read from its input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordConfig {
    /// One entry per subdomain; empty means XYZ everywhere.
    pub coord_type: Vec<CoordSystem>,
    /// Symmetry axis for RZ subdomains.
    pub rz_coord_axis: Axis,
    pub length_unit: Option<String>,
    pub alpha_rotation: Option<f64>,
    pub beta_rotation: Option<f64>,
    pub gamma_rotation: Option<f64>,
    /// Axis that should end up pointing along +y.
    pub up_direction: Option<Axis>,
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self {
            coord_type: Vec::new(),
            rz_coord_axis: Axis::Y,
            length_unit: None,
            alpha_rotation: None,
            beta_rotation: None,
            gamma_rotation: None,
            up_direction: None,
        }
    }
}

/// Compact, serializable description used to ship a transform between ranks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinimalData {
    pub scale_factor: Option<f64>,
    pub euler_angles: Option<[f64; 3]>,
    pub canonical: Frame,
    pub frame: Frame,
    pub has_different_coord_sys: bool,
    pub mesh_transformed: bool,
}

/// Scale/rotation/coordinate-system description of one application.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordTransform {
    canonical: Frame,
    frame: Frame,
    has_different_coord_sys: bool,
    length_unit: LengthUnit,
    euler_angles: [f64; 3],
    scale: Option<Tensor>,
    rotate: Option<Tensor>,
    rs: Option<Tensor>,
    rs_inverse: Option<Tensor>,
    mesh_transformed: bool,
}

impl Default for CoordTransform {
    fn default() -> Self {
        Self {
            canonical: Frame::Xyz,
            frame: Frame::Xyz,
            has_different_coord_sys: false,
            length_unit: LengthUnit::default(),
            euler_angles: [0.0; 3],
            scale: None,
            rotate: None,
            rs: None,
            rs_inverse: None,
            mesh_transformed: false,
        }
    }
}

impl CoordTransform {
    /// Identity transform in XYZ coordinates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration: coordinate system, then rotation, then scale.
    pub fn from_config(config: &CoordConfig) -> Result<Self, CouplingError> {
        let mut t = Self::new();
        t.set_subdomain_coord_systems(&config.coord_type, config.rz_coord_axis)?;

        let has_angles = config.alpha_rotation.is_some()
            || config.beta_rotation.is_some()
            || config.gamma_rotation.is_some();
        match (has_angles, config.up_direction) {
            (true, Some(_)) => {
                return Err(CouplingError::InvalidConfig(
                    "cannot set rotation angles and an up direction at the same time".into(),
                ));
            }
            (true, None) => {
                let alpha = check_angle("alpha_rotation", config.alpha_rotation.unwrap_or(0.0))?;
                let beta = check_angle("beta_rotation", config.beta_rotation.unwrap_or(0.0))?;
                let gamma = check_angle("gamma_rotation", config.gamma_rotation.unwrap_or(0.0))?;
                t.set_rotation(alpha, beta, gamma)?;
            }
            (false, Some(up)) => t.set_up_direction(up)?,
            (false, None) => {}
        }

        if let Some(unit) = &config.length_unit {
            t.set_length_unit(LengthUnit::parse(unit)?)?;
        }
        Ok(t)
    }

    /// Rebuild a transform shipped with [`CoordTransform::minimal_data`].
    pub fn from_minimal_data(data: &MinimalData) -> Result<Self, CouplingError> {
        let mut t = Self {
            canonical: data.canonical,
            frame: data.frame,
            has_different_coord_sys: data.has_different_coord_sys,
            mesh_transformed: data.mesh_transformed,
            ..Self::default()
        };
        if let Some(factor) = data.scale_factor {
            t.length_unit = LengthUnit::from_metres(factor)?;
            t.scale = Some(Tensor::from_diagonal_element(factor));
        }
        if let Some([alpha, beta, gamma]) = data.euler_angles {
            t.euler_angles = [alpha, beta, gamma];
            t.rotate = Some(extrinsic_rotation_matrix(alpha, beta, gamma));
        }
        t.compute_rs();
        Ok(t)
    }

    /// Compact description of this transform.
    pub fn minimal_data(&self) -> MinimalData {
        MinimalData {
            scale_factor: self.scale.map(|s| s[(0, 0)]),
            euler_angles: self.rotate.map(|_| self.euler_angles),
            canonical: self.canonical,
            frame: self.frame,
            has_different_coord_sys: self.has_different_coord_sys,
            mesh_transformed: self.mesh_transformed,
        }
    }

    fn ensure_setup(&self) -> Result<(), CouplingError> {
        if self.mesh_transformed {
            Err(CouplingError::MeshAlreadyTransformed)
        } else {
            Ok(())
        }
    }

    /// Set a single coordinate system for the whole domain.
    pub fn set_coordinate_system(
        &mut self,
        system: CoordSystem,
        rz_axis: Axis,
    ) -> Result<(), CouplingError> {
        self.ensure_setup()?;
        let canonical = Frame::canonical(system, rz_axis)?;
        let frame = match &self.rotate {
            Some(rotate) => rotate_frame(canonical, rotate, self.euler_angles)?,
            None => canonical,
        };
        self.canonical = canonical;
        self.frame = frame;
        Ok(())
    }

    /// Set the coordinate systems of every subdomain.
    ///
    /// The first entry determines the transform's system; more than one
    /// distinct entry marks the domain as mixed.
    pub fn set_subdomain_coord_systems(
        &mut self,
        systems: &[CoordSystem],
        rz_axis: Axis,
    ) -> Result<(), CouplingError> {
        let first = systems.first().copied().unwrap_or_default();
        self.set_coordinate_system(first, rz_axis)?;
        self.has_different_coord_sys = systems.iter().any(|s| *s != first);
        Ok(())
    }

    /// Rotate by extrinsic z-x-z Euler angles in degrees.
    ///
    /// RZ and RSPHERICAL systems accept only `(0, 90, 0)`, applied once.
    pub fn set_rotation(&mut self, alpha: f64, beta: f64, gamma: f64) -> Result<(), CouplingError> {
        self.ensure_setup()?;
        let system = self.canonical.coord_system();
        if system.is_radial() {
            if self.rotate.is_some() {
                return Err(CouplingError::RotationAlreadyApplied(system));
            }
            if (alpha, beta, gamma) != (0.0, 90.0, 0.0) {
                return Err(CouplingError::IllegalRotation {
                    coord_system: system,
                    alpha,
                    beta,
                    gamma,
                });
            }
        }
        self.apply_rotation([alpha, beta, gamma])
    }

    /// Rotate so that the `up` axis of the mesh lies along +y.
    pub fn set_up_direction(&mut self, up: Axis) -> Result<(), CouplingError> {
        self.ensure_setup()?;
        let system = self.canonical.coord_system();
        if system.is_radial() && self.rotate.is_some() {
            return Err(CouplingError::RotationAlreadyApplied(system));
        }
        let angles = match up {
            Axis::X => [90.0, 0.0, 0.0],
            Axis::Y => [0.0, 0.0, 0.0],
            Axis::Z => [0.0, -90.0, 0.0],
        };
        self.apply_rotation(angles)
    }

    fn apply_rotation(&mut self, angles: [f64; 3]) -> Result<(), CouplingError> {
        let rotate = extrinsic_rotation_matrix(angles[0], angles[1], angles[2]);
        let frame = rotate_frame(self.canonical, &rotate, angles)?;
        self.frame = frame;
        self.euler_angles = angles;
        self.rotate = Some(rotate);
        self.compute_rs();
        Ok(())
    }

    /// Scale the mesh by the metres one mesh unit represents.
    pub fn set_length_unit(&mut self, unit: LengthUnit) -> Result<(), CouplingError> {
        self.ensure_setup()?;
        self.scale = Some(Tensor::from_diagonal_element(unit.metres()));
        self.length_unit = unit;
        self.compute_rs();
        Ok(())
    }

    /// Recompute the cached composite `R·S` and its inverse.
    pub fn compute_rs(&mut self) {
        if self.scale.is_none() && self.rotate.is_none() {
            self.rs = None;
            self.rs_inverse = None;
            return;
        }
        let scale = self.scale.unwrap_or_else(Tensor::identity);
        let rotate = self.rotate.unwrap_or_else(Tensor::identity);
        let scale_inverse = Tensor::from_diagonal(&scale.diagonal().map(|s| 1.0 / s));
        self.rs = Some(rotate * scale);
        self.rs_inverse = Some(scale_inverse * rotate.transpose());
    }

    /// Bake scale, rotation and `translation` into the mesh node coordinates.
    ///
    /// Afterwards every mapping through this transform treats those components
    /// as identity. Baking twice is an error.
    pub fn transform_mesh<M: MeshNodes + ?Sized>(
        &mut self,
        mesh: &mut M,
        translation: Vector,
        hooks: TransformHooks<'_, M>,
    ) -> Result<(), CouplingError> {
        if self.canonical.coord_system() != CoordSystem::Xyz {
            return Err(CouplingError::UnsupportedMeshTransform(
                self.canonical.coord_system(),
            ));
        }
        self.ensure_setup()?;

        let linear = self.rs.unwrap_or_else(Tensor::identity);
        update_mesh(mesh, NodeUpdate { linear, translation }, hooks)?;
        self.mesh_transformed = true;
        log::debug!("baked transform into mesh (translation {translation:?})");
        Ok(())
    }

    pub fn coord_system(&self) -> CoordSystem {
        self.frame.coord_system()
    }

    /// Radial/axial axes in the reference frame (after rotation).
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Radial/axial axes in the unrotated mesh frame.
    pub fn canonical_frame(&self) -> Frame {
        self.canonical
    }

    pub fn r_axis(&self) -> Option<Axis> {
        self.frame.r_axis()
    }

    pub fn z_axis(&self) -> Option<Axis> {
        self.frame.z_axis()
    }

    pub fn has_different_coord_sys(&self) -> bool {
        self.has_different_coord_sys
    }

    pub fn length_unit(&self) -> &LengthUnit {
        &self.length_unit
    }

    pub fn euler_angles(&self) -> [f64; 3] {
        self.euler_angles
    }

    pub fn scale(&self) -> Option<&Tensor> {
        self.scale.as_ref()
    }

    pub fn rotation(&self) -> Option<&Tensor> {
        self.rotate.as_ref()
    }

    /// Cached `R·S`, `None` when neither factor is set.
    pub fn rs(&self) -> Option<&Tensor> {
        self.rs.as_ref()
    }

    pub fn rs_inverse(&self) -> Option<&Tensor> {
        self.rs_inverse.as_ref()
    }

    pub fn mesh_transformed(&self) -> bool {
        self.mesh_transformed
    }

    /// Whether the description itself (not just the matrix) departs from
    /// identity: a scale factor other than exactly 1 or any nonzero angle.
    pub(crate) fn has_nonunit_description(&self) -> bool {
        let scaled = self.scale.is_some_and(|s| s[(0, 0)] != 1.0);
        let rotated = self.rotate.is_some() && self.euler_angles.iter().any(|a| *a != 0.0);
        scaled || rotated
    }
}
