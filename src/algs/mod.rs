//! Re-export public algorithms.

pub mod communicator;
pub mod fixed_point;
pub mod rank_config;

pub use fixed_point::{ConvergenceReason, FixedPointConfig, FixedPointSolve};
pub use rank_config::{RankConfig, SlotLayout, rank_config};
