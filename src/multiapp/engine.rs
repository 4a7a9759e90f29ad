//! Seams to the external physics engines driven as sub-apps.

use super::backup::Backup;
use crate::coupling_error::{CouplingError, EngineError};
use crate::geometry::{BoundingBox, Point};
use crate::transfer::TransferTarget;
use crate::transform::{CoordConfig, MeshNodes};
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

/// One running instance of an external solver.
///
/// The coupling core treats the engine's state as opaque: it asks for
/// [`Backup`]s, hands them back on restore, and queries the mesh extent.
pub trait PhysicsEngine {
    /// Advance by `dt` towards `target_time`. Returns `false` if the engine
    /// failed to converge.
    fn run(&mut self, dt: f64, target_time: f64) -> bool;

    /// Current simulation time.
    fn time(&self) -> f64;

    fn backup(&mut self) -> Result<Backup, EngineError>;

    fn restore(&mut self, backup: &Backup) -> Result<(), EngineError>;

    /// Extent of this rank's part of the mesh, in the engine's own frame.
    fn bounding_box(&self, displaced: bool) -> BoundingBox;

    fn mesh_mut(&mut self) -> &mut dyn MeshNodes;

    /// Coordinate options of the engine's mesh.
    fn coord_config(&self) -> CoordConfig {
        CoordConfig::default()
    }

    /// Whether the engine can provide or receive `target`.
    fn supports(&self, _target: &TransferTarget) -> bool {
        true
    }
}

/// Everything a factory needs to start one sub-app.
pub struct AppLaunch<'a, C> {
    pub global_app: usize,
    pub input: &'a str,
    pub position: Point,
    pub start_time: f64,
    /// Communicator shared by the ranks running this app.
    pub comm: &'a C,
}

/// Creates engines for a multiapp.
pub trait SubAppFactory<C> {
    fn create(&self, launch: &AppLaunch<'_, C>) -> Result<Box<dyn PhysicsEngine>, EngineError>;
}

type FactoryFn<C> =
    dyn Fn(&AppLaunch<'_, C>) -> Result<Box<dyn PhysicsEngine>, EngineError> + Send + Sync;

/// Factory registered under a name in an [`AppRegistry`].
pub struct RegisteredFactory<C> {
    name: String,
    create: Arc<FactoryFn<C>>,
}

impl<C> Clone for RegisteredFactory<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            create: Arc::clone(&self.create),
        }
    }
}

impl<C> RegisteredFactory<C> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C> SubAppFactory<C> for RegisteredFactory<C> {
    fn create(&self, launch: &AppLaunch<'_, C>) -> Result<Box<dyn PhysicsEngine>, EngineError> {
        (self.create)(launch)
    }
}

impl<C> fmt::Debug for RegisteredFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFactory")
            .field("name", &self.name)
            .finish()
    }
}

/// Named application factories, owned by the run context.
pub struct AppRegistry<C> {
    factories: HashMap<String, RegisteredFactory<C>>,
}

impl<C> Default for AppRegistry<C> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<C> AppRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `create` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, create: F)
    where
        F: Fn(&AppLaunch<'_, C>) -> Result<Box<dyn PhysicsEngine>, EngineError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let previous = self.factories.insert(
            name.clone(),
            RegisteredFactory {
                name: name.clone(),
                create: Arc::new(create),
            },
        );
        if previous.is_some() {
            log::warn!("application type `{name}` registered twice; keeping the latest");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Factory for application type `name`.
    pub fn factory(&self, name: &str) -> Result<RegisteredFactory<C>, CouplingError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| CouplingError::UnknownAppType(name.to_string()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
