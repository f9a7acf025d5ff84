//! Measurement provider (`spec.md` §6): cumulative today totals, current
//! SOC/temperature, configured per-inverter scalars.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeasurementSnapshot {
    pub cumulative_import_kwh_today: f64,
    pub cumulative_export_kwh_today: f64,
    pub cumulative_load_kwh_today: f64,
    pub cumulative_pv_kwh_today: f64,
    pub soc_now_kwh: f64,
    pub battery_temperature_c: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeasurementProvider: Send + Sync {
    async fn snapshot(&self) -> Result<MeasurementSnapshot>;
}

pub struct FixedMeasurementProvider {
    pub snapshot: MeasurementSnapshot,
}

#[async_trait]
impl MeasurementProvider for FixedMeasurementProvider {
    async fn snapshot(&self) -> Result<MeasurementSnapshot> {
        Ok(self.snapshot)
    }
}
