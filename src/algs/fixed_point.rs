//! Fixed-point (Picard) iteration between a parent step and its sub-apps.
//!
//! The sub-apps are backed up once before the first iteration and restored
//! before every later one, so each iteration re-solves the same time step
//! from the same starting state.

use crate::algs::communicator::Communicator;
use crate::coupling_error::CouplingError;
use crate::multiapp::SubAppManager;
use serde::{Deserialize, Serialize};

/// Iteration limits and tolerances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPointConfig {
    pub min_its: usize,
    pub max_its: usize,
    pub abs_tol: f64,
    pub rel_tol: f64,
    /// Treat hitting `max_its` as success.
    pub accept_on_max: bool,
}

impl Default for FixedPointConfig {
    fn default() -> Self {
        Self {
            min_its: 1,
            max_its: 1,
            abs_tol: 1e-50,
            rel_tol: 1e-8,
            accept_on_max: true,
        }
    }
}

impl FixedPointConfig {
    pub fn validate(&self) -> Result<(), CouplingError> {
        if self.max_its == 0 {
            return Err(CouplingError::InvalidConfig("max_its must be at least 1".into()));
        }
        if self.min_its > self.max_its {
            return Err(CouplingError::InvalidConfig(format!(
                "min_its ({}) exceeds max_its ({})",
                self.min_its, self.max_its
            )));
        }
        if !(self.abs_tol >= 0.0 && self.rel_tol >= 0.0) {
            return Err(CouplingError::InvalidConfig(
                "tolerances must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Why a fixed-point solve stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConvergenceReason {
    ConvergedAbs,
    ConvergedRel,
    /// `max_its` reached with `accept_on_max` set.
    ReachedMaxIts,
    DivergedMaxIts,
    /// The step reported a failure.
    DivergedStep,
}

impl ConvergenceReason {
    pub fn converged(self) -> bool {
        matches!(
            self,
            ConvergenceReason::ConvergedAbs
                | ConvergenceReason::ConvergedRel
                | ConvergenceReason::ReachedMaxIts
        )
    }
}

/// Driver for one coupled time step.
#[derive(Clone, Debug)]
pub struct FixedPointSolve {
    config: FixedPointConfig,
    residuals: Vec<f64>,
}

impl FixedPointSolve {
    pub fn new(config: FixedPointConfig) -> Result<Self, CouplingError> {
        config.validate()?;
        Ok(Self {
            config,
            residuals: Vec::new(),
        })
    }

    /// Iterate `step` until convergence.
    ///
    /// `step(iteration, apps)` performs one coupled iteration and returns its
    /// residual norm, or `None` if it failed.
    pub fn solve<C, F>(
        &mut self,
        apps: &mut SubAppManager<C>,
        mut step: F,
    ) -> Result<ConvergenceReason, CouplingError>
    where
        C: Communicator + 'static,
        F: FnMut(usize, &mut SubAppManager<C>) -> Result<Option<f64>, CouplingError>,
    {
        self.residuals.clear();
        apps.backup()?;

        for it in 0..self.config.max_its {
            if it > 0 {
                apps.restore(false)?;
            }
            let Some(norm) = step(it, apps)? else {
                log::warn!("fixed-point iteration {it} failed");
                return Ok(ConvergenceReason::DivergedStep);
            };
            self.residuals.push(norm);
            log::debug!("fixed-point iteration {it}: residual {norm:e}");

            if it + 1 < self.config.min_its {
                continue;
            }
            if norm <= self.config.abs_tol {
                return Ok(ConvergenceReason::ConvergedAbs);
            }
            let initial = self.residuals[0];
            if initial > 0.0 && norm <= self.config.rel_tol * initial && it > 0 {
                return Ok(ConvergenceReason::ConvergedRel);
            }
        }

        if self.config.accept_on_max {
            Ok(ConvergenceReason::ReachedMaxIts)
        } else {
            log::warn!(
                "fixed-point iteration did not converge in {} iterations",
                self.config.max_its
            );
            Ok(ConvergenceReason::DivergedMaxIts)
        }
    }

    /// Residual norm of every iteration of the last solve.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn config(&self) -> &FixedPointConfig {
        &self.config
    }
}
