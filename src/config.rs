//! Planner configuration (C8, `spec.md` §4.7): layered (bundled default +
//! optional file + environment), validated at load time.
//!
//! Grounded on the teacher's `AppConfig::load_with_env` layering of
//! `figment::providers::{Toml, Env}` followed by `validator::Validate`,
//! generalised from the teacher's many service-level sub-configs down to
//! the battery/optimiser/worker knobs this crate actually owns.

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::optimizer::config::WorkerCountConfig;
use crate::optimizer::OptimizerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BatteryConfig {
    #[validate(range(min = 0.1))]
    pub soc_max_kwh: f64,
    #[validate(range(min = 0.0))]
    pub reserve_min_kwh: f64,
    #[validate(range(min = 0.0))]
    pub battery_rate_max_charge_kw: f64,
    #[validate(range(min = 0.0))]
    pub battery_rate_max_discharge_kw: f64,
    #[validate(range(min = 0.0))]
    pub battery_rate_min_kw: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub battery_loss: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub battery_loss_discharge: f64,
    pub hybrid: bool,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            soc_max_kwh: 10.0,
            reserve_min_kwh: 1.0,
            battery_rate_max_charge_kw: 3.0,
            battery_rate_max_discharge_kw: 3.0,
            battery_rate_min_kw: 0.0,
            battery_loss: 0.95,
            battery_loss_discharge: 0.95,
            hybrid: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    pub count: WorkerCountConfig,
    #[validate(range(min = 1))]
    pub plan_deadline_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { count: WorkerCountConfig::Auto, plan_deadline_secs: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct InverterConfig {
    #[validate(range(min = 0.0))]
    pub inverter_ac_limit_kw: f64,
    #[validate(range(min = 0.0))]
    pub export_limit_kw: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub inverter_loss_factor: f64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            inverter_ac_limit_kw: 5.0,
            export_limit_kw: 5.0,
            inverter_loss_factor: 0.97,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[validate(range(min = 30))]
    pub replan_interval_secs: u64,
    /// IANA timezone the plan's minute grid is anchored to (`spec.md` §3
    /// "local midnight grid"): minute 0 of a cycle is local midnight in
    /// this zone, not UTC midnight.
    #[validate(custom(function = "validate_timezone"))]
    pub timezone: String,
}

fn validate_timezone(tz: &str) -> Result<(), validator::ValidationError> {
    tz.parse::<chrono_tz::Tz>()
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("unknown IANA timezone"))
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { replan_interval_secs: 300, timezone: "UTC".to_string() }
    }
}

impl SchedulerConfig {
    /// Parses the configured zone, already validated at load time.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().expect("timezone validated at config load")
    }
}

/// Top-level planner configuration (`spec.md` §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlannerConfig {
    #[validate(nested)]
    pub battery: BatteryConfig,
    #[validate(nested)]
    pub inverter: InverterConfig,
    #[validate(nested)]
    pub optimizer: OptimizerConfig,
    #[validate(nested)]
    pub worker: WorkerConfig,
    #[validate(nested)]
    pub scheduler: SchedulerConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            battery: BatteryConfig::default(),
            inverter: InverterConfig::default(),
            optimizer: OptimizerConfig::default(),
            worker: WorkerConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Loads the bundled default, then an optional `WATTPLAN_CONFIG` file,
    /// then `WATTPLAN_*` environment variables (`spec.md` §9 "unknown keys
    /// rejected").
    pub fn load() -> Result<Self> {
        Self::load_with_override(None)
    }

    pub fn load_with_override(config_file: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config/default.toml"));

        if let Some(path) = config_file.map(str::to_owned).or_else(|| std::env::var("WATTPLAN_CONFIG").ok()) {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("WATTPLAN_").split("__"));

        let config: PlannerConfig = figment.extract().context("failed to parse planner configuration")?;
        config.validate().context("planner configuration failed validation")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn battery_loss_out_of_range_fails_validation() {
        let mut config = PlannerConfig::default();
        config.battery.battery_loss = 1.5;
        assert!(config.validate().is_err());
    }
}
