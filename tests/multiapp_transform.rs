mod util;

use multiapp_core::coupling_error::{CouplingError, ErrorKind};
use multiapp_core::geometry::{Axis, CoordSystem, LengthUnit, Point, Vector};
use multiapp_core::transform::{CoordTransform, MultiAppCoordTransform, TransformHooks};
use util::assert_close;

fn radial(system: CoordSystem, axis: Axis) -> CoordTransform {
    let mut t = CoordTransform::new();
    t.set_coordinate_system(system, axis).unwrap();
    t
}

#[test]
fn collapse_has_no_inverse() {
    let ours = CoordTransform::new();
    let dest = radial(CoordSystem::Rz, Axis::Y);
    let mut t = MultiAppCoordTransform::new(&ours);
    t.set_destination_coord_transform(&dest).unwrap();

    let mapped = t.map(&Point::new(0.6, 1.5, 0.8)).unwrap();
    assert_close(&mapped, &Point::new(1.0, 1.5, 0.0));

    let err = t.map_back(&mapped).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousInverse);
    let msg = err.to_string();
    assert!(msg.contains("XYZ") && msg.contains("RZ"), "{msg}");
}

#[test]
fn xyz_to_rspherical_collapse() {
    let ours = CoordTransform::new();
    let dest = radial(CoordSystem::RSpherical, Axis::Y);
    let mut t = MultiAppCoordTransform::new(&ours);
    t.set_translation(Vector::new(1.0, 2.0, 2.0));
    t.set_destination_coord_transform(&dest).unwrap();
    assert_close(&t.map(&Point::origin()).unwrap(), &Point::new(3.0, 0.0, 0.0));
    assert!(matches!(
        t.map_back(&Point::new(3.0, 0.0, 0.0)),
        Err(CouplingError::AmbiguousInverse { .. })
    ));
}

#[test]
fn collapse_follows_rotated_destination_axes() {
    // Destination RZ about y, turned so its axis points along z.
    let mut dest = radial(CoordSystem::Rz, Axis::Y);
    dest.set_up_direction(Axis::Z).unwrap();
    let ours = CoordTransform::new();
    let mut t = MultiAppCoordTransform::new(&ours);
    t.set_destination_coord_transform(&dest).unwrap();
    let mapped = t.map(&Point::new(3.0, 4.0, 7.0)).unwrap();
    assert_close(&mapped, &Point::new(5.0, 0.0, 7.0));
}

#[test]
fn baked_mesh_skips_affine_but_still_collapses() {
    let mut ours = CoordTransform::new();
    ours.set_length_unit(LengthUnit::parse("2 m").unwrap()).unwrap();
    let mut nodes = vec![Point::new(1.0, 0.0, 0.0)];
    ours.transform_mesh(&mut nodes, Vector::new(0.0, 1.0, 0.0), TransformHooks::none())
        .unwrap();
    assert_eq!(nodes[0], Point::new(2.0, 1.0, 0.0));

    let parent = CoordTransform::new();
    let mut t = MultiAppCoordTransform::new(&ours);
    t.set_translation(Vector::new(0.0, 1.0, 0.0));
    t.set_destination_coord_transform(&parent).unwrap();
    assert!(t.is_identity());
    assert_eq!(t.map(&nodes[0]).unwrap(), nodes[0]);
    assert_eq!(t.map_back(&nodes[0]).unwrap(), nodes[0]);

    let dest = radial(CoordSystem::Rz, Axis::Y);
    let mut t = MultiAppCoordTransform::new(&ours);
    t.set_destination_coord_transform(&dest).unwrap();
    assert!(!t.is_identity());
    assert_close(&t.map(&Point::new(3.0, 1.0, 4.0)).unwrap(), &Point::new(5.0, 1.0, 0.0));
    assert!(t.map_back(&Point::new(5.0, 1.0, 0.0)).is_err());
}

#[test]
fn same_system_no_type_change() {
    let a = radial(CoordSystem::Rz, Axis::Y);
    let b = radial(CoordSystem::Rz, Axis::X);
    let mut t = MultiAppCoordTransform::new(&a);
    assert!(!t.has_coordinate_system_type_change());
    t.set_destination_coord_transform(&b).unwrap();
    assert!(!t.has_coordinate_system_type_change());
    assert!(!t.collapses());
    assert!(t.is_identity());
}
