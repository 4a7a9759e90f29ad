//! Ownership and geometry lookups for data exchanges between applications.
//!
//! The coordinator never moves data itself. It tells an external transfer,
//! per global app index, whether this rank owns the source and destination,
//! hands out the owning engines and builds the [`MultiAppCoordTransform`]
//! that maps points between the two sides.

use crate::algs::communicator::Communicator;
use crate::coupling_error::CouplingError;
use crate::geometry::{Point, Vector};
use crate::multiapp::{PhysicsEngine, SubAppManager};
use crate::transform::{CoordTransform, MultiAppCoordTransform};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way data flows relative to the parent application.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferDirection {
    /// Parent to sub-apps.
    ToMultiApp,
    /// Sub-apps to parent.
    FromMultiApp,
    /// Sub-app `i` of one multiapp to sub-app `i` of another.
    BetweenMultiApp,
}

impl TransferDirection {
    fn as_str(self) -> &'static str {
        match self {
            TransferDirection::ToMultiApp => "TO_MULTIAPP",
            TransferDirection::FromMultiApp => "FROM_MULTIAPP",
            TransferDirection::BetweenMultiApp => "BETWEEN_MULTIAPP",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is exchanged on the destination side.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TransferTarget {
    Field(String),
    Function(String),
    UserObject(String),
}

impl fmt::Display for TransferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferTarget::Field(n) => write!(f, "field `{n}`"),
            TransferTarget::Function(n) => write!(f, "function `{n}`"),
            TransferTarget::UserObject(n) => write!(f, "user object `{n}`"),
        }
    }
}

/// End of an exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    fn opposite(self) -> Side {
        match self {
            Side::Source => Side::Destination,
            Side::Destination => Side::Source,
        }
    }
}

/// Lookup surface for one transfer between the parent and its multiapps.
pub struct TransferCoordinator<'a, C: Communicator> {
    direction: TransferDirection,
    parent: &'a CoordTransform,
    from: Option<&'a SubAppManager<C>>,
    to: Option<&'a SubAppManager<C>>,
    target: TransferTarget,
}

impl<'a, C: Communicator + 'static> TransferCoordinator<'a, C> {
    /// Check the direction's multiapps and resolve `target` on every locally
    /// owned destination engine.
    ///
    /// For [`TransferDirection::BetweenMultiApp`] both multiapps must have the
    /// same number of apps and own each index on the same ranks.
    pub fn new(
        direction: TransferDirection,
        parent: &'a CoordTransform,
        from: Option<&'a SubAppManager<C>>,
        to: Option<&'a SubAppManager<C>>,
        target: TransferTarget,
    ) -> Result<Self, CouplingError> {
        let missing = |which| CouplingError::MissingMultiApp(direction.as_str(), which);
        match direction {
            TransferDirection::ToMultiApp if to.is_none() => return Err(missing("destination")),
            TransferDirection::FromMultiApp if from.is_none() => return Err(missing("source")),
            TransferDirection::BetweenMultiApp => {
                let from = from.ok_or_else(|| missing("source"))?;
                let to = to.ok_or_else(|| missing("destination"))?;
                validate_between(from, to)?;
            }
            _ => {}
        }

        let coordinator = Self {
            direction,
            parent,
            from,
            to,
            target,
        };
        coordinator.resolve_target()?;
        log::debug!(
            "{direction} transfer of {} over {} apps",
            coordinator.target,
            coordinator.num_apps()
        );
        Ok(coordinator)
    }

    fn resolve_target(&self) -> Result<(), CouplingError> {
        let Some(dest) = self.multiapp(Side::Destination) else {
            return Ok(());
        };
        for global_app in dest.local_apps() {
            let Ok(engine) = dest.app(global_app) else {
                continue;
            };
            if !engine.supports(&self.target) {
                return Err(CouplingError::UnsupportedTarget {
                    global_app,
                    target: self.target.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn target(&self) -> &TransferTarget {
        &self.target
    }

    /// Multiapp on `side`, `None` when that side is the parent.
    pub fn multiapp(&self, side: Side) -> Option<&'a SubAppManager<C>> {
        match (self.direction, side) {
            (TransferDirection::ToMultiApp, Side::Source) => None,
            (TransferDirection::ToMultiApp, Side::Destination) => self.to,
            (TransferDirection::FromMultiApp, Side::Source) => self.from,
            (TransferDirection::FromMultiApp, Side::Destination) => None,
            (TransferDirection::BetweenMultiApp, Side::Source) => self.from,
            (TransferDirection::BetweenMultiApp, Side::Destination) => self.to,
        }
    }

    /// Number of global app indices the exchange iterates over.
    pub fn num_apps(&self) -> usize {
        self.multiapp(Side::Destination)
            .or_else(|| self.multiapp(Side::Source))
            .map_or(0, |m| m.num_global_apps())
    }

    /// Whether this rank holds `side` of exchange `global_app`. The parent
    /// side is held everywhere.
    pub fn has_local_app(&self, side: Side, global_app: usize) -> bool {
        self.multiapp(side)
            .is_none_or(|m| m.has_local_app(global_app))
    }

    /// Owning engine of `side` for `global_app`.
    pub fn app(&self, side: Side, global_app: usize) -> Result<&'a dyn PhysicsEngine, CouplingError> {
        let multiapp = self
            .multiapp(side)
            .ok_or(CouplingError::MissingMultiApp(self.direction.as_str(), side_name(side)))?;
        multiapp.app(global_app)
    }

    /// Position of the sub-app on `side`; the parent sits at the origin.
    pub fn position(&self, side: Side, global_app: usize) -> Result<Point, CouplingError> {
        match self.multiapp(side) {
            Some(m) => m.position(global_app),
            None => Ok(Point::origin()),
        }
    }

    fn coord_transform(&self, side: Side, global_app: usize) -> Result<&'a CoordTransform, CouplingError> {
        match self.multiapp(side) {
            Some(m) => m.app_transform(global_app),
            None => Ok(self.parent),
        }
    }

    /// Transform mapping `side` of exchange `global_app` into the reference
    /// frame, with the opposite side as destination.
    ///
    /// Both sides must be available on this rank.
    pub fn transform(
        &self,
        side: Side,
        global_app: usize,
    ) -> Result<MultiAppCoordTransform<'a>, CouplingError> {
        let mut t = MultiAppCoordTransform::new(self.coord_transform(side, global_app)?);
        let translation: Vector = self.position(side, global_app)?.coords;
        t.set_translation(translation);
        t.set_destination_coord_transform(self.coord_transform(side.opposite(), global_app)?)?;
        Ok(t)
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::Source => "source",
        Side::Destination => "destination",
    }
}

/// Both multiapps must own every global index on the same ranks.
///
/// Compares the global layouts, so every rank reaches the same verdict.
fn validate_between<C: Communicator + 'static>(
    from: &SubAppManager<C>,
    to: &SubAppManager<C>,
) -> Result<(), CouplingError> {
    if from.num_global_apps() != to.num_global_apps() {
        return Err(CouplingError::AppCountMismatch {
            from: from.num_global_apps(),
            to: to.num_global_apps(),
        });
    }
    for global_app in 0..from.num_global_apps() {
        if from.owner_ranks(global_app) != to.owner_ranks(global_app) {
            let from_local = from.has_local_app(global_app);
            let to_local = to.has_local_app(global_app);
            return Err(CouplingError::ExchangeTopology {
                global_app,
                from_local,
                to_local,
            });
        }
    }
    Ok(())
}
