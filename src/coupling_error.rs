//! CouplingError: Unified error type for multiapp-core public APIs
//!
//! Every failure the coupling core can report is a variant of [`CouplingError`].
//! Variants are grouped into the coarse [`ErrorKind`] taxonomy so callers can
//! decide how to terminate the distributed run without matching every variant.

use crate::algs::communicator::CommError;
use crate::geometry::{Axis, CoordSystem};
use thiserror::Error;

/// Error raised by an external physics-engine collaborator.
///
/// The coupling core never inspects solver internals, so the payload is an
/// opaque boxed error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl EngineError {
    /// Wrap any error (or message) reported by an engine.
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }

    /// Wrap a plain message as an engine error.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(message)
    }
}

/// Coarse classification of [`CouplingError`] variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad partition bounds, illegal rotations, ambiguous coordinate setups.
    Configuration,
    /// Query on a global app index this rank does not own.
    Ownership,
    /// Inverse mapping requested after a lossy coordinate collapse.
    AmbiguousInverse,
    /// BETWEEN_MULTIAPP exchange with inconsistent rank ownership.
    ExchangeTopology,
    /// Failure reported by a physics engine (create/backup/restore).
    Engine,
    /// Failure in the communicator layer.
    Communication,
}

/// Unified error type for coupling operations.
#[derive(Debug, Error)]
pub enum CouplingError {
    /// Partition bounds cannot be satisfied.
    #[error("Invalid rank partition: {0}")]
    InvalidPartition(String),
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Length unit string could not be parsed.
    #[error("Unrecognized length unit `{0}`")]
    InvalidLengthUnit(String),
    /// Rotation not allowed for a non-Cartesian coordinate system.
    #[error(
        "Unsupported rotation (alpha, beta, gamma) = ({alpha}, {beta}, {gamma}) for {coord_system} \
         coordinates; only (0, 90, 0) or an up-direction swap is supported"
    )]
    IllegalRotation {
        coord_system: CoordSystem,
        alpha: f64,
        beta: f64,
        gamma: f64,
    },
    /// A second rotation was requested on an already rotated non-Cartesian system.
    #[error("{0} coordinate system has already been rotated; axis swaps are only defined from the unrotated frame")]
    RotationAlreadyApplied(CoordSystem),
    /// The rotation maps the radial axis onto a negative Cartesian direction.
    #[error("Rotation yields negative radial values (radial axis {r_axis} maps onto -{mapped})")]
    NegativeRadius { r_axis: Axis, mapped: Axis },
    /// RZ coordinate systems require an explicit symmetry axis.
    #[error("RZ coordinate system requires an X or Y symmetry axis, got {0}")]
    InvalidSymmetryAxis(Axis),
    /// Collapsing would be needed but the domain mixes coordinate systems.
    #[error(
        "Ambiguous coordinate collapse from {ours} to {destination}: a domain with mixed \
         coordinate systems cannot be collapsed from a point alone"
    )]
    MixedCoordSystems {
        ours: CoordSystem,
        destination: CoordSystem,
    },
    /// `transform_mesh` was invoked a second time.
    #[error("Application mesh has already been transformed")]
    MeshAlreadyTransformed,
    /// Baking coordinates is only meaningful for Cartesian meshes.
    #[error("Transforming a mesh in place is only supported for XYZ coordinates, not {0}")]
    UnsupportedMeshTransform(CoordSystem),
    /// Mesh nodes reported an inconsistent update.
    #[error("Mesh update failed: {0}")]
    MeshUpdate(String),
    /// Mapping requested before the destination transform was set.
    #[error("Destination coordinate transform has not been set")]
    MissingDestination,
    /// The destination transform may only be set once.
    #[error("Destination coordinate transform has already been set")]
    DestinationAlreadySet,
    /// Collapse setting is fixed once the destination is set.
    #[error("Coordinate collapsing can only be configured before the destination transform is set")]
    CollapseSettingFrozen,
    /// Inverse mapping through a lossy collapse.
    #[error(
        "Coordinate collapsing from {ours} to {destination} occurred in the forward map; \
         there is no unique return mapping"
    )]
    AmbiguousInverse {
        ours: CoordSystem,
        destination: CoordSystem,
    },
    /// Global app index is out of range.
    #[error("Global app index {global_app} out of range (total apps {num_apps})")]
    AppIndexOutOfRange { global_app: usize, num_apps: usize },
    /// Global app index is not owned by this rank.
    #[error(
        "Global app {global_app} is not owned by this rank (local range {first_local}..{})",
        .first_local + .num_local
    )]
    NotOwned {
        global_app: usize,
        first_local: usize,
        num_local: usize,
    },
    /// `init` has not been called before using the manager.
    #[error("Sub-app manager has not been initialized")]
    NotInitialized,
    /// `init` was called twice.
    #[error("Sub-app manager is already initialized")]
    AlreadyInitialized,
    /// The positions provider did not supply one point per global app.
    #[error("Positions provider supplied {found} positions for {expected} apps")]
    PositionCountMismatch { expected: usize, found: usize },
    /// Sub-app creation failed.
    #[error("Failed to create sub-app {global_app} from `{input}`: {source}")]
    AppCreation {
        global_app: usize,
        input: String,
        #[source]
        source: EngineError,
    },
    /// No factory registered under the requested application type.
    #[error("No application type `{0}` registered")]
    UnknownAppType(String),
    /// Operation requires a running sub-app.
    #[error("Sub-app {global_app} is not running")]
    AppNotRunning { global_app: usize },
    /// Snapshot request failed.
    #[error("Backup of sub-app {global_app} failed: {source}")]
    BackupFailed {
        global_app: usize,
        #[source]
        source: EngineError,
    },
    /// Restore request failed.
    #[error("Restore of sub-app {global_app} failed: {source}")]
    RestoreFailed {
        global_app: usize,
        #[source]
        source: EngineError,
    },
    /// Forced restore without any recorded backup.
    #[error("No backup available to restore sub-app {global_app}")]
    NoBackup { global_app: usize },
    /// A transfer direction needs a multiapp that was not supplied.
    #[error("Transfer direction {0} is missing its {1} multiapp")]
    MissingMultiApp(&'static str, &'static str),
    /// BETWEEN_MULTIAPP with inconsistent ownership of a global index.
    #[error(
        "Inconsistent ownership of global app {global_app} for a between-multiapp transfer \
         (source local: {from_local}, destination local: {to_local})"
    )]
    ExchangeTopology {
        global_app: usize,
        from_local: bool,
        to_local: bool,
    },
    /// BETWEEN_MULTIAPP between multiapps of different sizes.
    #[error("Between-multiapp transfer requires equal app counts, got {from} and {to}")]
    AppCountMismatch { from: usize, to: usize },
    /// The locally owned engine cannot serve the requested transfer target.
    #[error("Sub-app {global_app} does not provide transfer target {target}")]
    UnsupportedTarget { global_app: usize, target: String },
    /// Communicator failure.
    #[error(transparent)]
    Comm(#[from] CommError),
}

impl CouplingError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use CouplingError::*;
        match self {
            InvalidPartition(_)
            | InvalidConfig(_)
            | InvalidLengthUnit(_)
            | IllegalRotation { .. }
            | RotationAlreadyApplied(_)
            | NegativeRadius { .. }
            | InvalidSymmetryAxis(_)
            | MixedCoordSystems { .. }
            | MeshAlreadyTransformed
            | UnsupportedMeshTransform(_)
            | MeshUpdate(_)
            | MissingDestination
            | DestinationAlreadySet
            | CollapseSettingFrozen
            | NotInitialized
            | AlreadyInitialized
            | PositionCountMismatch { .. }
            | UnknownAppType(_)
            | UnsupportedTarget { .. }
            | MissingMultiApp(..) => ErrorKind::Configuration,
            AppIndexOutOfRange { .. } | NotOwned { .. } | AppNotRunning { .. } => {
                ErrorKind::Ownership
            }
            AmbiguousInverse { .. } => ErrorKind::AmbiguousInverse,
            ExchangeTopology { .. } | AppCountMismatch { .. } => ErrorKind::ExchangeTopology,
            AppCreation { .. } | BackupFailed { .. } | RestoreFailed { .. } | NoBackup { .. } => {
                ErrorKind::Engine
            }
            Comm(_) => ErrorKind::Communication,
        }
    }

    /// Process exit code used when this error aborts the run.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Ownership => 3,
            ErrorKind::AmbiguousInverse => 4,
            ErrorKind::ExchangeTopology => 5,
            ErrorKind::Engine => 6,
            ErrorKind::Communication => 7,
        }
    }
}

/// Log `result`'s error and abort every rank of `comm`, or return the value.
///
/// Configuration-time failures cannot be recovered in an SPMD program because
/// ranks may already disagree on shape.
pub fn abort_on_error<T, C>(comm: &C, result: Result<T, CouplingError>) -> T
where
    C: crate::algs::communicator::Communicator,
{
    match result {
        Ok(value) => value,
        Err(err) => {
            log::error!("rank {}: fatal coupling error: {err}", comm.rank());
            comm.abort(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            CouplingError::InvalidPartition("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            CouplingError::NotOwned {
                global_app: 3,
                first_local: 0,
                num_local: 1
            }
            .kind(),
            ErrorKind::Ownership
        );
        assert_eq!(
            CouplingError::AmbiguousInverse {
                ours: CoordSystem::Xyz,
                destination: CoordSystem::Rz
            }
            .kind(),
            ErrorKind::AmbiguousInverse
        );
        assert_eq!(
            CouplingError::ExchangeTopology {
                global_app: 0,
                from_local: true,
                to_local: false
            }
            .kind(),
            ErrorKind::ExchangeTopology
        );
    }

    #[test]
    fn ambiguous_inverse_names_systems() {
        let msg = CouplingError::AmbiguousInverse {
            ours: CoordSystem::Xyz,
            destination: CoordSystem::RSpherical,
        }
        .to_string();
        assert!(msg.contains("XYZ") && msg.contains("RSPHERICAL"), "{msg}");
    }

    #[test]
    fn engine_error_wraps_message() {
        let err = CouplingError::BackupFailed {
            global_app: 1,
            source: EngineError::msg("disk full"),
        };
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.kind(), ErrorKind::Engine);
    }
}
