#![cfg_attr(docsrs, feature(doc_cfg))]
//! # multiapp-core
//!
//! multiapp-core couples independent, possibly parallel sub-simulations under
//! one parent run. It decides which ranks run which sub-app, manages the
//! sub-apps' lifecycles across sub-communicators, and maps points between each
//! sub-app's frame and the shared reference frame.
//!
//! ## Features
//! - Pure rank partitioning ([`algs::rank_config`]) that every rank computes
//!   identically, with batch mode for running more simulations than slots
//! - Sub-app creation, bounded backup history, restore, reset and move
//!   ([`multiapp::SubAppManager`])
//! - Per-application scale/rotation/coordinate-system transforms and pairwise
//!   mapping with lossy collapse into RZ or RSPHERICAL frames ([`transform`])
//! - Ownership and transform lookups for external field transfers ([`transfer`])
//! - A fixed-point (Picard) driver built on backup/restore
//!   ([`algs::fixed_point`])
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ## Usage
//! Add `multiapp-core` as a dependency in your `Cargo.toml` and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! multiapp-core = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! ## Errors
//! Every fallible operation returns [`CouplingError`](coupling_error::CouplingError).
//! Configuration, ownership, ambiguous-inverse and exchange-topology errors
//! are not recoverable in an SPMD run; pass them through
//! [`abort_on_error`](coupling_error::abort_on_error) to stop every rank.
//!
//! The physics engines themselves stay outside this crate: they implement
//! [`multiapp::PhysicsEngine`] and are registered by name in an
//! [`multiapp::AppRegistry`] owned by the run context.

pub mod algs;
pub mod coupling_error;
pub mod geometry;
pub mod multiapp;
pub mod transfer;
pub mod transform;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ReduceOp, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::fixed_point::{ConvergenceReason, FixedPointConfig, FixedPointSolve};
    pub use crate::algs::rank_config::{RankConfig, SlotLayout, rank_config};
    pub use crate::coupling_error::{CouplingError, EngineError, ErrorKind, abort_on_error};
    pub use crate::geometry::{Axis, BoundingBox, CoordSystem, LengthUnit, Point, Vector};
    pub use crate::multiapp::{
        AppLaunch, AppRegistry, AppState, Backup, MultiAppConfig, PhysicsEngine, PositionsConfig,
        PositionsProvider, RunContext, SubAppFactory, SubAppManager,
    };
    pub use crate::transfer::{Side, TransferCoordinator, TransferDirection, TransferTarget};
    pub use crate::transform::{
        CoordConfig, CoordTransform, MeshNodes, MultiAppCoordTransform, TransformHooks,
    };
}
