#![allow(dead_code)]
use multiapp_core::algs::communicator::Communicator;
use multiapp_core::coupling_error::EngineError;
use multiapp_core::geometry::{Axis, BoundingBox, CoordSystem, Point};
use multiapp_core::multiapp::{
    AppLaunch, AppRegistry, Backup, MultiAppConfig, PhysicsEngine, PositionsConfig,
};
use multiapp_core::transfer::TransferTarget;
use multiapp_core::transform::{CoordConfig, MeshNodes};
use serde::{Deserialize, Serialize};

/// State a mock engine serializes into its backups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MockState {
    pub time: f64,
    pub counter: u64,
}

/// Physics-engine stand-in: a clock, a counter that changes every step and a
/// unit-cube mesh shifted by the rank inside its sub-communicator.
pub struct MockEngine {
    pub global_app: usize,
    pub state: MockState,
    pub nodes: Vec<Point>,
    pub coord: CoordConfig,
    pub fail_run: bool,
}

impl MockEngine {
    pub fn new(global_app: usize, start_time: f64, sub_rank: usize) -> Self {
        let dx = sub_rank as f64;
        let nodes = [0.0, 1.0]
            .iter()
            .flat_map(|&x| {
                [0.0, 1.0]
                    .iter()
                    .flat_map(move |&y| [0.0, 1.0].map(|z| Point::new(x + dx, y, z)))
            })
            .collect();
        Self {
            global_app,
            state: MockState {
                time: start_time,
                counter: global_app as u64,
            },
            nodes,
            coord: CoordConfig::default(),
            fail_run: false,
        }
    }

    /// An RZ mesh of radius 1 and height 2 about the y axis.
    pub fn rz(global_app: usize, start_time: f64) -> Self {
        let mut engine = Self::new(global_app, start_time, 0);
        engine.nodes = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 2.0, 0.0),
            Point::new(0.0, 2.0, 0.0),
        ];
        engine.coord = CoordConfig {
            coord_type: vec![CoordSystem::Rz],
            rz_coord_axis: Axis::Y,
            ..CoordConfig::default()
        };
        engine
    }
}

impl PhysicsEngine for MockEngine {
    fn run(&mut self, dt: f64, target_time: f64) -> bool {
        self.state.time = (self.state.time + dt).min(target_time);
        self.state.counter = self.state.counter.wrapping_mul(31).wrapping_add(7);
        !self.fail_run
    }

    fn time(&self) -> f64 {
        self.state.time
    }

    fn backup(&mut self) -> Result<Backup, EngineError> {
        serde_json::to_vec(&self.state)
            .map(Backup::new)
            .map_err(EngineError::new)
    }

    fn restore(&mut self, backup: &Backup) -> Result<(), EngineError> {
        self.state = serde_json::from_slice(backup.as_bytes()).map_err(EngineError::new)?;
        Ok(())
    }

    fn bounding_box(&self, _displaced: bool) -> BoundingBox {
        BoundingBox::from_points(self.nodes.iter().copied())
    }

    fn mesh_mut(&mut self) -> &mut dyn MeshNodes {
        &mut self.nodes
    }

    fn coord_config(&self) -> CoordConfig {
        self.coord.clone()
    }

    fn supports(&self, target: &TransferTarget) -> bool {
        matches!(target, TransferTarget::Field(name) if name == "u")
    }
}

/// Registry with a `mock` application type whose behaviour follows the input
/// name: `rz.i` builds an RZ engine, `broken.i` fails to start, `stall.i`
/// fails every step.
pub fn mock_registry<C: Communicator + 'static>() -> AppRegistry<C> {
    let mut registry = AppRegistry::new();
    registry.register("mock", |launch: &AppLaunch<'_, C>| {
        let engine: Box<dyn PhysicsEngine> = match launch.input {
            "broken.i" => return Err(EngineError::msg("cannot open broken.i")),
            "rz.i" => Box::new(MockEngine::rz(launch.global_app, launch.start_time)),
            "stall.i" => {
                let mut e = MockEngine::new(launch.global_app, launch.start_time, launch.comm.rank());
                e.fail_run = true;
                Box::new(e)
            }
            _ => Box::new(MockEngine::new(
                launch.global_app,
                launch.start_time,
                launch.comm.rank(),
            )),
        };
        Ok(engine)
    });
    registry
}

/// Mock multiapp with one app at each of `points`.
pub fn mock_config(points: &[[f64; 3]], input: &str) -> MultiAppConfig {
    MultiAppConfig {
        app_type: "mock".into(),
        input_files: vec![input.into()],
        positions: PositionsConfig::Explicit {
            points: points.to_vec(),
        },
        bounding_box_inflation: 0.0,
        ..MultiAppConfig::default()
    }
}

pub fn assert_close(a: &Point, b: &Point) {
    assert!((a - b).norm() < 1e-10, "{a:?} != {b:?}");
}
