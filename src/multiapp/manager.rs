//! Lifecycle of the sub-apps of one multiapp.
//!
//! Every rank builds the same [`SlotLayout`] from the shared configuration,
//! splits the parent communicator by slot and instantiates only the apps its
//! slot owns. Instances live in an arena indexed by local app index; state
//! and backup histories are kept per local simulation. The manager
//! exclusively owns both and the slot's sub-communicator.
//!
//! In batch mode one instance serves every simulation of the slot. Before it
//! switches to another simulation the outgoing one is parked as a snapshot,
//! and the incoming one is resumed from its own parked snapshot.
//!
//! Per-app states:
//!
//! ```text
//! Uninitialized --create--> Running --backup--> BackedUp --restore--> Running
//! Running --reset_app--> Reset (fresh instance) --run--> Running
//! ```

use super::backup::{Backup, BackupHistory};
use super::config::MultiAppConfig;
use super::engine::{AppLaunch, PhysicsEngine, RegisteredFactory, SubAppFactory};
use super::positions::PositionsProvider;
use crate::algs::communicator::{Communicator, ReduceOp};
use crate::algs::rank_config::{RankConfig, SlotLayout};
use crate::coupling_error::CouplingError;
use crate::geometry::{BoundingBox, Point};
use crate::transform::{
    CoordTransform, Frame, MultiAppCoordTransform, NodeUpdate, TransformHooks, update_mesh,
};
use std::ops::Range;

/// Lifecycle state of one sub-app instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AppState {
    Uninitialized,
    Running,
    BackedUp,
    /// Recreated by [`SubAppManager::reset_app`] and not advanced since.
    Reset,
}

struct AppSlot {
    /// Global app currently bound; changes only in batch mode.
    global_app: usize,
    engine: Option<Box<dyn PhysicsEngine>>,
    transform: Option<CoordTransform>,
}

impl AppSlot {
    fn new(global_app: usize) -> Self {
        Self {
            global_app,
            engine: None,
            transform: None,
        }
    }

    fn destroy(&mut self) {
        self.engine = None;
        self.transform = None;
    }
}

/// Per-simulation bookkeeping that outlives the instance running it.
struct SimRecord {
    state: AppState,
    backups: BackupHistory,
    /// Live state of a batch simulation whose instance was handed over.
    parked: Option<Backup>,
}

impl SimRecord {
    fn new(max_backups: usize) -> Self {
        Self {
            state: AppState::Uninitialized,
            backups: BackupHistory::new(max_backups),
            parked: None,
        }
    }
}

/// Start one engine and build its coordinate transform.
fn launch<C>(
    factory: &dyn SubAppFactory<C>,
    comm: &C,
    config: &MultiAppConfig,
    global_app: usize,
    position: Point,
    start_time: f64,
) -> Result<(Box<dyn PhysicsEngine>, CoordTransform), CouplingError> {
    let input = config.input_for(global_app);
    let request = AppLaunch {
        global_app,
        input,
        position,
        start_time,
        comm,
    };
    let mut engine = factory
        .create(&request)
        .map_err(|source| CouplingError::AppCreation {
            global_app,
            input: input.to_string(),
            source,
        })?;
    let mut transform = CoordTransform::from_config(&engine.coord_config())?;
    if config.run_in_position {
        transform.transform_mesh(engine.mesh_mut(), position.coords, TransformHooks::none())?;
    }
    log::info!("created sub-app {global_app} from `{input}` at t = {start_time}");
    Ok((engine, transform))
}

/// Creates, runs, checkpoints and repositions the sub-apps of one multiapp.
pub struct SubAppManager<C: Communicator> {
    name: String,
    config: MultiAppConfig,
    factory: Box<dyn SubAppFactory<C>>,
    positions: Vec<Point>,
    layout: Option<SlotLayout>,
    rank_config: RankConfig,
    initialized: bool,
    // Instances are dropped before the communicator they run on.
    apps: Vec<AppSlot>,
    sims: Vec<SimRecord>,
    sub_comm: Option<C>,
}

impl<C: Communicator + 'static> SubAppManager<C> {
    /// Manager for one app per position supplied by `positions`.
    pub fn new<P>(
        name: impl Into<String>,
        config: MultiAppConfig,
        factory: impl SubAppFactory<C> + 'static,
        positions: &P,
    ) -> Result<Self, CouplingError>
    where
        P: PositionsProvider + ?Sized,
    {
        let positions = positions.positions()?;
        config.validate(positions.len())?;
        Ok(Self {
            name: name.into(),
            config,
            factory: Box::new(factory),
            positions,
            layout: None,
            rank_config: RankConfig::default(),
            initialized: false,
            apps: Vec::new(),
            sims: Vec::new(),
            sub_comm: None,
        })
    }

    /// Manager whose positions come from `config.positions`.
    pub fn from_config(
        name: impl Into<String>,
        config: MultiAppConfig,
        factory: RegisteredFactory<C>,
    ) -> Result<Self, CouplingError> {
        let positions = config.positions.clone();
        Self::new(name, config, factory, &positions)
    }

    /// Partition `parent` and split off this rank's sub-communicator.
    ///
    /// Collective over `parent`.
    pub fn init(&mut self, parent: &C) -> Result<(), CouplingError> {
        if self.initialized {
            return Err(CouplingError::AlreadyInitialized);
        }
        let layout = SlotLayout::new(
            parent.size(),
            self.positions.len(),
            self.config.min_procs_per_app,
            self.config.max_procs_per_app,
        )?;
        let rank_config = layout.config_for(parent.rank(), self.config.batch_mode)?;
        self.sub_comm = parent.split(rank_config.slot, parent.rank())?;

        let max_backups = self.config.max_backups;
        self.apps = if !rank_config.has_slot() {
            Vec::new()
        } else if self.config.batch_mode {
            vec![AppSlot::new(rank_config.first_local_sim_index)]
        } else {
            rank_config.app_indices().map(AppSlot::new).collect()
        };
        self.sims = rank_config
            .sim_indices()
            .map(|_| SimRecord::new(max_backups))
            .collect();
        if rank_config.is_first_local_rank {
            log::debug!(
                "{}: slot {:?} of {} runs apps {:?}",
                self.name,
                rank_config.slot,
                layout.num_slots(),
                rank_config.sim_indices()
            );
        }
        self.layout = Some(layout);
        self.rank_config = rank_config;
        self.initialized = true;
        Ok(())
    }

    /// Instantiate every local app that does not exist yet.
    pub fn create_apps(&mut self) -> Result<(), CouplingError> {
        self.ensure_initialized()?;
        (0..self.apps.len()).try_for_each(|local| self.ensure_created(local))
    }

    fn local_sim(&self, global_app: usize) -> Result<usize, CouplingError> {
        self.global_app_to_local(global_app)?;
        Ok(global_app - self.rank_config.first_local_sim_index)
    }

    fn ensure_initialized(&self) -> Result<(), CouplingError> {
        if self.initialized {
            Ok(())
        } else {
            Err(CouplingError::NotInitialized)
        }
    }

    fn ensure_created(&mut self, local: usize) -> Result<(), CouplingError> {
        let global_app = self.apps[local].global_app;
        if self.config.batch_mode {
            return self.bind(global_app);
        }
        if self.apps[local].engine.is_some() {
            return Ok(());
        }
        self.recreate(local, global_app, self.config.start_time)?;
        self.resume(local, local)
    }

    /// Point the batch instance at `global_app`, parking the simulation it
    /// currently runs and resuming `global_app` from its parked state.
    fn bind(&mut self, global_app: usize) -> Result<(), CouplingError> {
        let slot = &self.apps[0];
        if slot.global_app == global_app && slot.engine.is_some() {
            return Ok(());
        }
        self.park_bound()?;
        self.recreate(0, global_app, self.config.start_time)?;
        let sim = self.local_sim(global_app)?;
        self.resume(0, sim)
    }

    /// Load simulation `sim`'s parked state into the fresh instance `local`.
    fn resume(&mut self, local: usize, sim: usize) -> Result<(), CouplingError> {
        let slot = &mut self.apps[local];
        let global_app = slot.global_app;
        let record = &mut self.sims[sim];
        if let Some(parked) = record.parked.take() {
            slot.engine
                .as_mut()
                .ok_or(CouplingError::AppNotRunning { global_app })?
                .restore(&parked)
                .map_err(|source| CouplingError::RestoreFailed { global_app, source })?;
        }
        if record.state == AppState::Uninitialized {
            record.state = AppState::Running;
        }
        Ok(())
    }

    /// Snapshot the simulation bound to the batch instance, if any.
    fn park_bound(&mut self) -> Result<(), CouplingError> {
        let slot = &mut self.apps[0];
        let global_app = slot.global_app;
        let Some(engine) = slot.engine.as_mut() else {
            return Ok(());
        };
        let snapshot = engine
            .backup()
            .map_err(|source| CouplingError::BackupFailed { global_app, source })?;
        let sim = global_app - self.rank_config.first_local_sim_index;
        self.sims[sim].parked = Some(snapshot);
        log::trace!("{}: parked sub-app {global_app}", self.name);
        Ok(())
    }

    /// Replace the engine of instance `local` with a fresh one for
    /// `global_app` whose clock starts at `start_time`.
    fn recreate(
        &mut self,
        local: usize,
        global_app: usize,
        start_time: f64,
    ) -> Result<(), CouplingError> {
        let comm = self.sub_comm.as_ref().ok_or(CouplingError::NotInitialized)?;
        let slot = &mut self.apps[local];
        slot.destroy();
        let (engine, transform) = launch(
            self.factory.as_ref(),
            comm,
            &self.config,
            global_app,
            self.positions[global_app],
            start_time,
        )?;
        slot.global_app = global_app;
        slot.engine = Some(engine);
        slot.transform = Some(transform);
        Ok(())
    }

    /// Advance every local app by `dt` towards `target_time`.
    ///
    /// In batch mode the slot's single instance steps each of its
    /// simulations in turn, resuming each from where it stopped. Collective
    /// over `parent`; returns whether every engine on every rank reported
    /// success.
    pub fn run_apps(&mut self, parent: &C, dt: f64, target_time: f64) -> Result<bool, CouplingError> {
        self.ensure_initialized()?;
        let mut all_ok = true;
        if self.config.batch_mode {
            if !self.apps.is_empty() {
                for (sim, global_app) in self.rank_config.sim_indices().enumerate() {
                    self.bind(global_app)?;
                    all_ok &= self.run_local(0, sim, dt, target_time);
                }
            }
        } else {
            for local in 0..self.apps.len() {
                self.ensure_created(local)?;
                all_ok &= self.run_local(local, local, dt, target_time);
            }
        }
        Ok(parent.all_and(all_ok)?)
    }

    fn run_local(&mut self, local: usize, sim: usize, dt: f64, target_time: f64) -> bool {
        let slot = &mut self.apps[local];
        let Some(engine) = slot.engine.as_mut() else {
            return false;
        };
        let ok = engine.run(dt, target_time);
        self.sims[sim].state = AppState::Running;
        if !ok {
            log::warn!(
                "{}: sub-app {} failed to reach t = {target_time}",
                self.name,
                slot.global_app
            );
        }
        ok
    }

    /// Snapshot every local simulation, creating it first if needed.
    pub fn backup(&mut self) -> Result<(), CouplingError> {
        self.ensure_initialized()?;
        for global_app in self.rank_config.sim_indices() {
            let sim = self.local_sim(global_app)?;
            let snapshot = match self.sims[sim].parked.clone() {
                // Parked states are only left behind by an unbound batch sim.
                Some(parked) => parked,
                None => {
                    let local = self.global_app_to_local(global_app)?;
                    if self.config.batch_mode {
                        self.bind(global_app)?;
                    } else {
                        self.ensure_created(local)?;
                    }
                    self.apps[local]
                        .engine
                        .as_mut()
                        .ok_or(CouplingError::AppNotRunning { global_app })?
                        .backup()
                        .map_err(|source| CouplingError::BackupFailed { global_app, source })?
                }
            };
            let record = &mut self.sims[sim];
            if record.backups.push(snapshot).is_some() {
                log::trace!("{}: evicted oldest backup of sub-app {global_app}", self.name);
            }
            record.state = AppState::BackedUp;
        }
        Ok(())
    }

    /// Replay the most recent backup of every local simulation.
    ///
    /// Simulations without a backup are skipped unless `force` is set, in
    /// which case that is an error. The backup is kept so it can be replayed
    /// again. An unbound batch simulation resumes from it the next time the
    /// instance switches to it.
    pub fn restore(&mut self, force: bool) -> Result<(), CouplingError> {
        self.ensure_initialized()?;
        for global_app in self.rank_config.sim_indices() {
            let sim = self.local_sim(global_app)?;
            let Some(snapshot) = self.sims[sim].backups.latest().cloned() else {
                if force {
                    return Err(CouplingError::NoBackup { global_app });
                }
                log::debug!("{}: nothing to restore for sub-app {global_app}", self.name);
                continue;
            };
            let local = self.global_app_to_local(global_app)?;
            let slot = &mut self.apps[local];
            match slot.engine.as_mut() {
                Some(engine) if slot.global_app == global_app => engine
                    .restore(&snapshot)
                    .map_err(|source| CouplingError::RestoreFailed { global_app, source })?,
                _ => self.sims[sim].parked = Some(snapshot),
            }
            self.sims[sim].state = AppState::Running;
        }
        Ok(())
    }

    /// Destroy and recreate `global_app` with its clock at `time`, dropping
    /// its backups.
    ///
    /// Only ranks owning the app do anything; this is not a collective.
    pub fn reset_app(&mut self, global_app: usize, time: f64) -> Result<(), CouplingError> {
        if !self.has_local_app(global_app) {
            return Ok(());
        }
        let local = self.global_app_to_local(global_app)?;
        let sim = self.local_sim(global_app)?;
        log::info!("{}: resetting sub-app {global_app} at t = {time}", self.name);
        if self.config.batch_mode && self.apps[local].global_app != global_app {
            self.park_bound()?;
        }
        self.recreate(local, global_app, time)?;
        let record = &mut self.sims[sim];
        record.backups.clear();
        record.parked = None;
        record.state = AppState::Reset;
        Ok(())
    }

    /// Record a new position for `global_app` without recreating it.
    ///
    /// An app whose mesh was baked in position is shifted along with it.
    pub fn move_app(&mut self, global_app: usize, position: Point) -> Result<(), CouplingError> {
        self.check_index(global_app)?;
        let shift = position - self.positions[global_app];
        self.positions[global_app] = position;

        if !self.has_local_app(global_app) {
            return Ok(());
        }
        let local = self.global_app_to_local(global_app)?;
        let slot = &mut self.apps[local];
        let baked = slot.transform.as_ref().is_some_and(|t| t.mesh_transformed());
        if baked && slot.global_app == global_app {
            if let Some(engine) = slot.engine.as_mut() {
                update_mesh(
                    engine.mesh_mut(),
                    NodeUpdate::translation(shift),
                    TransformHooks::none(),
                )?;
            }
        }
        log::debug!("{}: moved sub-app {global_app} to {position:?}", self.name);
        Ok(())
    }

    /// Extent of `global_app` in the parent frame.
    ///
    /// Collective over the app's sub-communicator. Without `transform` the box
    /// is shifted by the app position; with one, all eight corners are mapped
    /// through it. The result is grown by the configured inflation.
    pub fn get_bounding_box(
        &self,
        global_app: usize,
        displaced: bool,
        transform: Option<&MultiAppCoordTransform<'_>>,
    ) -> Result<BoundingBox, CouplingError> {
        let slot = self.bound_slot(global_app)?;
        let engine = slot
            .engine
            .as_deref()
            .ok_or(CouplingError::AppNotRunning { global_app })?;
        let comm = self.sub_comm.as_ref().ok_or(CouplingError::NotInitialized)?;

        let local = engine.bounding_box(displaced);
        let mut lo: Vec<f64> = local.min.iter().copied().collect();
        let mut hi: Vec<f64> = local.max.iter().copied().collect();
        comm.all_reduce(&mut lo, ReduceOp::Min)?;
        comm.all_reduce(&mut hi, ReduceOp::Max)?;
        let mut bbox = BoundingBox {
            min: Point::new(lo[0], lo[1], lo[2]),
            max: Point::new(hi[0], hi[1], hi[2]),
        };

        let app_transform = slot.transform.as_ref();
        if let Some(Frame::Rz { z_axis, r_axis }) = app_transform.map(|t| t.canonical_frame()) {
            // Cover the full body of revolution.
            let r_max = bbox.max[r_axis.index()];
            for i in (0..3).filter(|i| *i != z_axis.index()) {
                bbox.min[i] = -r_max;
                bbox.max[i] = r_max;
            }
        }

        let mut out = match transform {
            Some(t) => {
                let mut swept = BoundingBox::empty();
                for corner in bbox.corners() {
                    swept.union_point(&t.map(&corner)?);
                }
                swept
            }
            None if app_transform.is_some_and(|t| t.mesh_transformed()) => bbox,
            None => {
                let shift = self.positions[global_app].coords;
                BoundingBox {
                    min: bbox.min + shift,
                    max: bbox.max + shift,
                }
            }
        };
        out.inflate(self.config.bounding_box_inflation);
        Ok(out)
    }

    /// Pairwise transform of `global_app` with its position as translation.
    pub fn app_coord_transform(
        &self,
        global_app: usize,
    ) -> Result<MultiAppCoordTransform<'_>, CouplingError> {
        let mut t = MultiAppCoordTransform::new(self.app_transform(global_app)?);
        t.set_translation(self.positions[global_app].coords);
        Ok(t)
    }

    fn check_index(&self, global_app: usize) -> Result<(), CouplingError> {
        if global_app < self.positions.len() {
            Ok(())
        } else {
            Err(CouplingError::AppIndexOutOfRange {
                global_app,
                num_apps: self.positions.len(),
            })
        }
    }

    fn bound_slot(&self, global_app: usize) -> Result<&AppSlot, CouplingError> {
        let slot = &self.apps[self.global_app_to_local(global_app)?];
        if slot.global_app == global_app {
            Ok(slot)
        } else {
            Err(CouplingError::AppNotRunning { global_app })
        }
    }

    /// Parent ranks running `global_app`, identical on every rank.
    pub fn owner_ranks(&self, global_app: usize) -> Option<Range<usize>> {
        let layout = self.layout.as_ref()?;
        layout.slot_ranks(layout.slot_of_sim(global_app)?)
    }

    /// Whether this rank runs `global_app`.
    pub fn has_local_app(&self, global_app: usize) -> bool {
        self.initialized && self.rank_config.sim_indices().contains(&global_app)
    }

    /// Local arena index of `global_app`; an error if this rank does not own it.
    pub fn global_app_to_local(&self, global_app: usize) -> Result<usize, CouplingError> {
        self.check_index(global_app)?;
        self.ensure_initialized()?;
        if !self.has_local_app(global_app) {
            return Err(CouplingError::NotOwned {
                global_app,
                first_local: self.rank_config.first_local_sim_index,
                num_local: self.rank_config.num_local_sims,
            });
        }
        if self.config.batch_mode {
            Ok(0)
        } else {
            Ok(global_app - self.rank_config.first_local_app_index)
        }
    }

    pub fn app(&self, global_app: usize) -> Result<&dyn PhysicsEngine, CouplingError> {
        self.bound_slot(global_app)?
            .engine
            .as_deref()
            .ok_or(CouplingError::AppNotRunning { global_app })
    }

    pub fn app_mut(&mut self, global_app: usize) -> Result<&mut dyn PhysicsEngine, CouplingError> {
        let local = self.global_app_to_local(global_app)?;
        let slot = &mut self.apps[local];
        if slot.global_app != global_app {
            return Err(CouplingError::AppNotRunning { global_app });
        }
        match slot.engine.as_mut() {
            Some(engine) => Ok(engine.as_mut()),
            None => Err(CouplingError::AppNotRunning { global_app }),
        }
    }

    pub fn local_app_state(&self, global_app: usize) -> Result<AppState, CouplingError> {
        Ok(self.sims[self.local_sim(global_app)?].state)
    }

    pub fn backups(&self, global_app: usize) -> Result<&BackupHistory, CouplingError> {
        Ok(&self.sims[self.local_sim(global_app)?].backups)
    }

    pub fn backup_count(&self, global_app: usize) -> Result<usize, CouplingError> {
        Ok(self.backups(global_app)?.len())
    }

    /// Coordinate description of a created app.
    pub fn app_transform(&self, global_app: usize) -> Result<&CoordTransform, CouplingError> {
        self.bound_slot(global_app)?
            .transform
            .as_ref()
            .ok_or(CouplingError::AppNotRunning { global_app })
    }

    pub fn position(&self, global_app: usize) -> Result<Point, CouplingError> {
        self.check_index(global_app)?;
        Ok(self.positions[global_app])
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn num_global_apps(&self) -> usize {
        self.positions.len()
    }

    /// Global indices run by this rank (empty before `init`).
    pub fn local_apps(&self) -> Range<usize> {
        self.rank_config.sim_indices()
    }

    pub fn first_local_app(&self) -> usize {
        self.rank_config.first_local_app_index
    }

    /// Engine instances hosted by this rank.
    pub fn num_local_apps(&self) -> usize {
        self.apps.len()
    }

    pub fn rank_config(&self) -> &RankConfig {
        &self.rank_config
    }

    /// Whether this rank is the lowest rank of its slot.
    pub fn is_root(&self) -> bool {
        self.rank_config.is_first_local_rank
    }

    pub fn sub_communicator(&self) -> Option<&C> {
        self.sub_comm.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MultiAppConfig {
        &self.config
    }
}
