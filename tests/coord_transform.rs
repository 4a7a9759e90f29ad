mod util;

use multiapp_core::coupling_error::{CouplingError, ErrorKind};
use multiapp_core::geometry::{Axis, CoordSystem, LengthUnit, Point, Vector};
use multiapp_core::transform::{CoordConfig, CoordTransform, MultiAppCoordTransform};
use proptest::prelude::*;
use util::assert_close;

#[test]
fn rz_up_direction_swaps_axes_once() {
    let mut t = CoordTransform::new();
    t.set_coordinate_system(CoordSystem::Rz, Axis::Y).unwrap();
    assert_eq!(t.r_axis(), Some(Axis::X));
    assert_eq!(t.z_axis(), Some(Axis::Y));

    t.set_up_direction(Axis::Z).unwrap();
    assert_eq!(t.r_axis(), Some(Axis::X));
    assert_eq!(t.z_axis(), Some(Axis::Z));

    let err = t.set_up_direction(Axis::Z).unwrap_err();
    assert!(matches!(err, CouplingError::RotationAlreadyApplied(CoordSystem::Rz)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(t.r_axis(), Some(Axis::X));
    assert_eq!(t.z_axis(), Some(Axis::Z));
}

#[test]
fn rspherical_up_direction() {
    let mut t = CoordTransform::new();
    t.set_coordinate_system(CoordSystem::RSpherical, Axis::Y).unwrap();
    t.set_up_direction(Axis::Z).unwrap();
    assert_eq!(t.r_axis(), Some(Axis::X));
    assert_eq!(t.z_axis(), None);

    let mut t = CoordTransform::new();
    t.set_coordinate_system(CoordSystem::RSpherical, Axis::Y).unwrap();
    t.set_up_direction(Axis::X).unwrap();
    assert_eq!(t.r_axis(), Some(Axis::Y));
    assert!(matches!(
        t.set_rotation(0.0, 90.0, 0.0),
        Err(CouplingError::RotationAlreadyApplied(CoordSystem::RSpherical))
    ));
}

#[test]
fn xyz_rotations_replace_each_other() {
    let mut t = CoordTransform::new();
    t.set_rotation(10.0, 20.0, 30.0).unwrap();
    t.set_up_direction(Axis::Y).unwrap();
    assert_eq!(t.euler_angles(), [0.0, 0.0, 0.0]);
}

#[test]
fn single_angle_breaks_identity() {
    let parent = CoordTransform::new();
    for angles in [[1e-9, 0.0, 0.0], [0.0, 1e-9, 0.0], [0.0, 0.0, -1e-9]] {
        let mut ours = CoordTransform::new();
        ours.set_rotation(angles[0], angles[1], angles[2]).unwrap();
        let mut t = MultiAppCoordTransform::new(&ours);
        t.set_destination_coord_transform(&parent).unwrap();
        assert!(!t.is_identity(), "{angles:?}");
        assert!(t.has_non_translation_transformation(), "{angles:?}");
    }
}

#[test]
fn unit_scale_and_zero_rotation_is_identity() {
    let config = CoordConfig {
        length_unit: Some("1 m".into()),
        alpha_rotation: Some(0.0),
        ..CoordConfig::default()
    };
    let ours = CoordTransform::from_config(&config).unwrap();
    let parent = CoordTransform::new();
    let mut t = MultiAppCoordTransform::new(&ours);
    t.set_destination_coord_transform(&parent).unwrap();
    assert!(t.is_identity());
    let p = Point::new(0.1, 0.2, 0.3);
    assert_eq!(t.map(&p).unwrap(), p);
}

#[test]
fn length_unit_scales_into_metres() {
    let mut ours = CoordTransform::new();
    ours.set_length_unit(LengthUnit::parse("1 cm").unwrap()).unwrap();
    let parent = CoordTransform::new();
    let mut t = MultiAppCoordTransform::new(&ours);
    t.set_translation(Vector::new(1.0, 0.0, 0.0));
    t.set_destination_coord_transform(&parent).unwrap();
    assert_close(&t.map(&Point::new(100.0, 50.0, 0.0)).unwrap(), &Point::new(2.0, 0.5, 0.0));
}

#[test]
fn config_deserializes_from_json() {
    let config: CoordConfig = serde_json::from_str(
        r#"{"coord_type":["RZ"],"rz_coord_axis":"X","length_unit":"5inches","up_direction":"Z"}"#,
    )
    .unwrap();
    let err = CoordTransform::from_config(&config).unwrap_err();
    assert!(matches!(err, CouplingError::NegativeRadius { .. }));

    let config: CoordConfig =
        serde_json::from_str(r#"{"coord_type":["RZ"],"rz_coord_axis":"X","length_unit":"5inches"}"#)
            .unwrap();
    let t = CoordTransform::from_config(&config).unwrap();
    assert!((t.length_unit().metres() - 0.127).abs() < 1e-12);
    assert_eq!(t.r_axis(), Some(Axis::Y));
}

fn angle() -> impl Strategy<Value = f64> {
    -179.0f64..=180.0
}

proptest! {
    #[test]
    fn xyz_map_back_inverts_map(
        alpha in angle(), beta in angle(), gamma in angle(),
        metres in 0.001f64..1000.0,
        shift in prop::array::uniform3(-10.0f64..10.0),
        p in prop::array::uniform3(-5.0f64..5.0),
    ) {
        let mut ours = CoordTransform::new();
        ours.set_rotation(alpha, beta, gamma).unwrap();
        ours.set_length_unit(LengthUnit::from_metres(metres).unwrap()).unwrap();
        let parent = CoordTransform::new();
        let mut t = MultiAppCoordTransform::new(&ours);
        t.set_translation(Vector::from(shift));
        t.set_destination_coord_transform(&parent).unwrap();

        let p = Point::from(p);
        let back = t.map_back(&t.map(&p).unwrap()).unwrap();
        prop_assert!((back - p).norm() <= 1e-9 * (1.0 + p.coords.norm()));
    }
}
