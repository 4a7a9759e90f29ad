//! Sub-app lifecycle: creation, checkpointing, reset and placement of the
//! independent simulations run under one parent.

pub mod backup;
pub mod config;
pub mod engine;
pub mod manager;
pub mod positions;

pub use backup::{Backup, BackupHistory};
pub use config::MultiAppConfig;
pub use engine::{AppLaunch, AppRegistry, PhysicsEngine, RegisteredFactory, SubAppFactory};
pub use manager::{AppState, SubAppManager};
pub use positions::{PositionsConfig, PositionsProvider};

use crate::algs::communicator::Communicator;
use crate::coupling_error::CouplingError;

/// Top-level state threaded through a coupled run: the world communicator
/// and the application types that may be launched.
pub struct RunContext<C> {
    pub comm: C,
    pub registry: AppRegistry<C>,
}

impl<C: Communicator + 'static> RunContext<C> {
    pub fn new(comm: C) -> Self {
        Self {
            comm,
            registry: AppRegistry::new(),
        }
    }

    /// Build and initialize a multiapp from `config`.
    ///
    /// Collective over `self.comm`.
    pub fn build_multiapp(
        &self,
        name: &str,
        config: MultiAppConfig,
    ) -> Result<SubAppManager<C>, CouplingError> {
        let factory = self.registry.factory(&config.app_type)?;
        let mut manager = SubAppManager::from_config(name, config, factory)?;
        manager.init(&self.comm)?;
        Ok(manager)
    }
}
