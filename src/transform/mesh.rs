//! Mesh node updates for baking coordinate transforms.

use crate::coupling_error::CouplingError;
use crate::geometry::{Point, Tensor, Vector};

/// Mutable access to the node coordinates of an application mesh.
///
/// Only node positions are touched; connectivity is left alone.
pub trait MeshNodes {
    /// Number of nodes visited by [`MeshNodes::for_each_node`].
    fn num_nodes(&self) -> usize;

    /// Visit every node coordinate in a fixed order.
    fn for_each_node(
        &mut self,
        visit: &mut dyn FnMut(usize, &mut Point) -> Result<(), CouplingError>,
    ) -> Result<(), CouplingError>;
}

impl MeshNodes for Vec<Point> {
    fn num_nodes(&self) -> usize {
        self.len()
    }

    fn for_each_node(
        &mut self,
        visit: &mut dyn FnMut(usize, &mut Point) -> Result<(), CouplingError>,
    ) -> Result<(), CouplingError> {
        self.iter_mut().enumerate().try_for_each(|(i, p)| visit(i, p))
    }
}

/// Affine coordinate update `x ↦ linear·x + translation`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeUpdate {
    pub linear: Tensor,
    pub translation: Vector,
}

impl NodeUpdate {
    /// Pure shift by `translation`.
    pub fn translation(translation: Vector) -> Self {
        Self {
            linear: Tensor::identity(),
            translation,
        }
    }
}

/// Hook set for updating derived data after coordinate transforms.
pub struct TransformHooks<'a, M: ?Sized> {
    /// Invoked after coordinates are updated.
    pub after_update: Option<&'a mut dyn FnMut(&M) -> Result<(), CouplingError>>,
}

impl<M: ?Sized> TransformHooks<'_, M> {
    pub fn none() -> Self {
        Self { after_update: None }
    }
}

/// Apply `update` to every node of `mesh`.
///
/// Stops at the first node whose image is not finite; nodes visited before
/// it keep their new coordinates and the hook is not run.
pub fn update_mesh<M: MeshNodes + ?Sized>(
    mesh: &mut M,
    update: NodeUpdate,
    mut hooks: TransformHooks<'_, M>,
) -> Result<(), CouplingError> {
    let NodeUpdate {
        linear,
        translation,
    } = update;
    mesh.for_each_node(&mut |i, p| {
        let moved = Point::from(linear * p.coords + translation);
        if !moved.iter().all(|c| c.is_finite()) {
            return Err(CouplingError::MeshUpdate(format!(
                "node {i} maps to non-finite coordinates {moved:?}"
            )));
        }
        *p = moved;
        Ok(())
    })?;

    if let Some(after_update) = hooks.after_update.as_mut() {
        after_update(mesh)?;
    }

    Ok(())
}
