//! Pairwise mapping between two applications' frames.
//!
//! A [`MultiAppCoordTransform`] borrows the [`CoordTransform`] of the
//! application it belongs to plus, once set, the destination application's,
//! and maps points into the common reference frame:
//!
//! 1. apply `RS` and the application's translation (skipped once the
//!    transform has been baked into the mesh),
//! 2. collapse onto the destination's radial/axial axes when the destination
//!    is RZ or RSPHERICAL and this application has higher dimension.
//!
//! Collapsing loses information, so [`MultiAppCoordTransform::map_back`]
//! refuses to invert a collapsing transform.

use super::coord_transform::{CoordTransform, Frame};
use crate::coupling_error::CouplingError;
use crate::geometry::{CoordSystem, Point, Vector, is_identity_tensor};

#[derive(Clone, Debug)]
pub struct MultiAppCoordTransform<'a> {
    ours: &'a CoordTransform,
    destination: Option<&'a CoordTransform>,
    translation: Vector,
    skip_collapse: bool,
}

impl<'a> MultiAppCoordTransform<'a> {
    pub fn new(ours: &'a CoordTransform) -> Self {
        Self {
            ours,
            destination: None,
            translation: Vector::zeros(),
            skip_collapse: false,
        }
    }

    /// Offset of this application in the reference frame.
    pub fn set_translation(&mut self, translation: Vector) {
        self.translation = translation;
    }

    pub fn translation(&self) -> &Vector {
        &self.translation
    }

    /// Disable coordinate collapsing; only allowed before the destination is set.
    pub fn skip_coordinate_collapsing(&mut self, skip: bool) -> Result<(), CouplingError> {
        if self.destination.is_some() {
            return Err(CouplingError::CollapseSettingFrozen);
        }
        self.skip_collapse = skip;
        Ok(())
    }

    /// Record the application points are sent to. May be called once.
    pub fn set_destination_coord_transform(
        &mut self,
        destination: &'a CoordTransform,
    ) -> Result<(), CouplingError> {
        if self.destination.is_some() {
            return Err(CouplingError::DestinationAlreadySet);
        }
        let ours = self.ours;
        let mixed = || CouplingError::MixedCoordSystems {
            ours: ours.coord_system(),
            destination: destination.coord_system(),
        };
        // Only a one-dimensional source collapses the same way into every
        // destination subdomain.
        if destination.has_different_coord_sys()
            && (ours.has_different_coord_sys() || ours.coord_system() != CoordSystem::RSpherical)
        {
            return Err(mixed());
        }
        if destination.coord_system().is_radial() && ours.has_different_coord_sys() {
            return Err(mixed());
        }
        self.destination = Some(destination);
        Ok(())
    }

    pub fn our_transform(&self) -> &'a CoordTransform {
        self.ours
    }

    pub fn destination(&self) -> Result<&'a CoordTransform, CouplingError> {
        self.destination.ok_or(CouplingError::MissingDestination)
    }

    /// Whether mapping collapses coordinates.
    ///
    /// Before a destination is set no collapse is assumed.
    pub fn collapses(&self) -> bool {
        !self.skip_collapse
            && self.destination.is_some_and(|dest| {
                dest.coord_system().is_radial()
                    && self.ours.coord_system().dimension() > dest.coord_system().dimension()
            })
    }

    /// Map a point from this application's frame into the reference frame.
    pub fn map(&self, point: &Point) -> Result<Point, CouplingError> {
        let destination = self.destination()?;
        let mut out = *point;
        if !self.ours.mesh_transformed() {
            if let Some(rs) = self.ours.rs() {
                out = Point::from(rs * out.coords);
            }
            out += self.translation;
        }
        if self.collapses() {
            out = collapse(&out, destination.frame());
        }
        Ok(out)
    }

    /// Inverse of [`MultiAppCoordTransform::map`] for non-collapsing transforms.
    pub fn map_back(&self, point: &Point) -> Result<Point, CouplingError> {
        let destination = self.destination()?;
        if self.collapses() {
            return Err(CouplingError::AmbiguousInverse {
                ours: self.ours.coord_system(),
                destination: destination.coord_system(),
            });
        }
        if self.ours.mesh_transformed() {
            return Ok(*point);
        }
        let mut out = point - self.translation;
        if let Some(rs_inverse) = self.ours.rs_inverse() {
            out = Point::from(rs_inverse * out.coords);
        }
        Ok(out)
    }

    /// Whether anything beyond a translation is applied.
    pub fn has_non_translation_transformation(&self) -> bool {
        let linear = !self.ours.mesh_transformed()
            && (self.ours.has_nonunit_description()
                || self.ours.rs().is_some_and(|rs| !is_identity_tensor(rs)));
        linear || self.collapses()
    }

    /// Whether [`MultiAppCoordTransform::map`] returns its input unchanged.
    pub fn is_identity(&self) -> bool {
        let untranslated =
            self.ours.mesh_transformed() || self.translation.iter().all(|c| *c == 0.0);
        untranslated && !self.has_non_translation_transformation()
    }

    /// Whether the two applications use different coordinate systems.
    pub fn has_coordinate_system_type_change(&self) -> bool {
        self.destination
            .is_some_and(|dest| dest.coord_system() != self.ours.coord_system())
    }
}

/// Project a reference-frame point onto a radial destination frame.
fn collapse(point: &Point, frame: Frame) -> Point {
    let mut out = Point::origin();
    match frame {
        Frame::Xyz => return *point,
        Frame::Rz { r_axis, z_axis } => {
            let zi = z_axis.index();
            let r2: f64 = (0..3).filter(|i| *i != zi).map(|i| point[i] * point[i]).sum();
            out[r_axis.index()] = r2.sqrt();
            out[zi] = point[zi];
        }
        Frame::RSpherical { r_axis } => {
            out[r_axis.index()] = point.coords.norm();
        }
    }
    out
}
