//! Sources of sub-app positions in the parent frame.

use crate::coupling_error::CouplingError;
use crate::geometry::Point;
use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// Supplies one position per global app.
pub trait PositionsProvider {
    fn positions(&self) -> Result<Vec<Point>, CouplingError>;
}

impl PositionsProvider for [Point] {
    fn positions(&self) -> Result<Vec<Point>, CouplingError> {
        Ok(self.to_vec())
    }
}

impl PositionsProvider for Vec<Point> {
    fn positions(&self) -> Result<Vec<Point>, CouplingError> {
        Ok(self.clone())
    }
}

/// Positions as written in a multiapp configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PositionsConfig {
    /// One point per app.
    Explicit { points: Vec<[f64; 3]> },
    /// Regular grid; x varies fastest.
    Lattice {
        origin: [f64; 3],
        spacing: [f64; 3],
        counts: [usize; 3],
    },
}

impl Default for PositionsConfig {
    fn default() -> Self {
        PositionsConfig::Explicit {
            points: vec![[0.0; 3]],
        }
    }
}

impl PositionsProvider for PositionsConfig {
    fn positions(&self) -> Result<Vec<Point>, CouplingError> {
        let out: Vec<Point> = match self {
            PositionsConfig::Explicit { points } => {
                points.iter().map(|p| Point::from(*p)).collect()
            }
            PositionsConfig::Lattice {
                origin,
                spacing,
                counts,
            } => iproduct!(0..counts[2], 0..counts[1], 0..counts[0])
                .map(|(k, j, i)| {
                    Point::new(
                        origin[0] + i as f64 * spacing[0],
                        origin[1] + j as f64 * spacing[1],
                        origin[2] + k as f64 * spacing[2],
                    )
                })
                .collect(),
        };
        if let Some(bad) = out.iter().find(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(CouplingError::InvalidConfig(format!(
                "non-finite position {bad:?}"
            )));
        }
        Ok(out)
    }
}
