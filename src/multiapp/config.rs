//! Multiapp configuration.

use super::positions::PositionsConfig;
use crate::coupling_error::CouplingError;
use serde::{Deserialize, Serialize};

/// Options for one multiapp.
///
/// Missing fields deserialize to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiAppConfig {
    /// Registered application type launched for every sub-app.
    pub app_type: String,
    pub min_procs_per_app: usize,
    pub max_procs_per_app: usize,
    /// Run a slot's apps one after another on a single engine instance.
    pub batch_mode: bool,
    /// Backups retained per sub-app.
    pub max_backups: usize,
    /// Relative growth applied to reported bounding boxes.
    pub bounding_box_inflation: f64,
    /// One input for every app, or one per app.
    pub input_files: Vec<String>,
    /// Bake each app's transform and position into its mesh at creation.
    pub run_in_position: bool,
    pub start_time: f64,
    pub positions: PositionsConfig,
}

impl Default for MultiAppConfig {
    fn default() -> Self {
        Self {
            app_type: String::new(),
            min_procs_per_app: 1,
            max_procs_per_app: usize::MAX,
            batch_mode: false,
            max_backups: 1,
            bounding_box_inflation: 0.01,
            input_files: Vec::new(),
            run_in_position: false,
            start_time: 0.0,
            positions: PositionsConfig::default(),
        }
    }
}

impl MultiAppConfig {
    /// Check the options against `num_apps` global apps.
    pub fn validate(&self, num_apps: usize) -> Result<(), CouplingError> {
        let bad = |msg: String| Err(CouplingError::InvalidConfig(msg));
        if self.min_procs_per_app == 0 {
            return bad("min_procs_per_app must be at least 1".into());
        }
        if self.max_procs_per_app < self.min_procs_per_app {
            return bad(format!(
                "max_procs_per_app ({}) < min_procs_per_app ({})",
                self.max_procs_per_app, self.min_procs_per_app
            ));
        }
        if self.max_backups == 0 {
            return bad("max_backups must be at least 1".into());
        }
        if !(self.bounding_box_inflation.is_finite() && self.bounding_box_inflation >= 0.0) {
            return bad(format!(
                "bounding_box_inflation must be a non-negative number, got {}",
                self.bounding_box_inflation
            ));
        }
        if !self.start_time.is_finite() {
            return bad("start_time must be finite".into());
        }
        match self.input_files.len() {
            0 => bad("at least one input file is required".into()),
            1 => Ok(()),
            n if n == num_apps => Ok(()),
            n => bad(format!(
                "{n} input files supplied for {num_apps} apps; give one or one per app"
            )),
        }
    }

    /// Input for global app `global_app`; assumes a validated config.
    pub fn input_for(&self, global_app: usize) -> &str {
        match self.input_files.as_slice() {
            [single] => single,
            many => many.get(global_app).map_or("", String::as_str),
        }
    }
}
