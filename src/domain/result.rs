//! `SimResult`: the value a single simulator call returns (`spec.md` §3).

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Which PV vector a simulator call should use (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Scenario {
    Central,
    P10,
}

/// Per-car final state returned alongside the aggregate result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarResult {
    pub final_soc_kwh: f64,
}

/// Output of one `simulate()` call (`spec.md` §3 "SimResult").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimResult {
    /// Total currency cost including cycle cost and keep-margin penalty,
    /// over the scoring horizon (`minute < end_record`).
    pub final_metric: f64,
    pub import_kwh_battery: f64,
    pub import_kwh_house: f64,
    pub export_kwh: f64,
    pub soc_min_kwh: f64,
    pub soc_min_minute: u32,
    pub final_soc_kwh: f64,
    pub battery_cycle_kwh: f64,
    /// Keep-margin penalty component of `final_metric`.
    pub metric_keep: f64,
    pub iboost_kwh: f64,
    pub carbon_g: f64,
    /// Minute-resolution SOC trace over the *full* horizon (not clipped to
    /// `end_record`).
    pub predict_soc: Vec<f64>,
    pub cars: Vec<CarResult>,
    /// Set once forced export has run; disables the four-hour keep-margin
    /// ramp for the remainder of the horizon (`spec.md` §4.2 step 9, §9).
    pub forced_export_triggered: bool,
    /// Energy clipped by the inverter/export limit, diagnostic only
    /// (`spec.md` §4.2 step 6).
    pub clipped_today_kwh: f64,
}

impl SimResult {
    pub fn soc_bounds_respected(&self, reserve_min_kwh: f64, soc_max_kwh: f64) -> bool {
        self.predict_soc
            .iter()
            .all(|&soc| soc >= reserve_min_kwh - 1e-6 && soc <= soc_max_kwh + 1e-6)
    }
}
