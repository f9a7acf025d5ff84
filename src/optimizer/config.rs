//! Operator-tunable optimiser knobs (`spec.md` §6), validated at load time.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::pool::WorkerCount;
use crate::simulator::KeepMarginParams;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    #[validate(range(min = 0.0))]
    pub best_soc_keep: f64,
    #[validate(range(min = 0.0))]
    pub best_soc_min: f64,
    #[validate(range(min = 0.1))]
    pub best_soc_step: f64,
    #[validate(range(min = 0.0))]
    pub best_soc_keep_weight: f64,
    #[validate(range(min = 0.0))]
    pub metric_min_improvement: f64,
    #[validate(range(min = 0.0))]
    pub metric_min_improvement_discharge: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub rate_low_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub rate_high_threshold: f64,
    pub combine_charge_slots: bool,
    pub combine_discharge_slots: bool,
    pub calculate_discharge_first: bool,
    pub rate_low_match_export: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    pub pv_metric10_weight: f64,
    #[validate(range(min = 0.0))]
    pub metric_battery_cycle: f64,
    #[validate(range(min = 1, max = 96))]
    pub max_windows: usize,
    pub run_boundary_pass: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            best_soc_keep: 0.0,
            best_soc_min: 0.0,
            best_soc_step: 5.0,
            best_soc_keep_weight: 1.0,
            metric_min_improvement: 0.001,
            metric_min_improvement_discharge: 0.001,
            rate_low_threshold: 0.9,
            rate_high_threshold: 1.1,
            combine_charge_slots: true,
            combine_discharge_slots: true,
            calculate_discharge_first: false,
            rate_low_match_export: false,
            pv_metric10_weight: 0.0,
            metric_battery_cycle: 0.0,
            max_windows: 16,
            run_boundary_pass: true,
        }
    }
}

impl OptimizerConfig {
    pub fn keep_margin(&self, soc_max_kwh: f64) -> KeepMarginParams {
        KeepMarginParams {
            best_soc_keep_kwh: self.best_soc_keep.min(soc_max_kwh),
            best_soc_keep_weight: self.best_soc_keep_weight,
        }
    }
}

/// Worker-count knob, kept distinct from `OptimizerConfig` because it
/// governs C4 rather than C6 (`spec.md` §6 lists it alongside the
/// optimiser knobs, but it is dispatch policy, not search policy).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerCountConfig {
    Off,
    Auto,
    Fixed(usize),
}

impl From<WorkerCountConfig> for WorkerCount {
    fn from(value: WorkerCountConfig) -> Self {
        match value {
            WorkerCountConfig::Off => WorkerCount::Off,
            WorkerCountConfig::Auto => WorkerCount::Auto,
            WorkerCountConfig::Fixed(n) => WorkerCount::Fixed(n),
        }
    }
}
