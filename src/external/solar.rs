//! Solar forecast provider (`spec.md` §6): emits the two per-minute PV
//! vectors (central + p10) aligned to the local midnight grid.
//!
//! Grounded on the teacher's `forecast::engine::ForecastEngine` aggregation
//! style — the trait shape, not an HTTP client, since forecast retrieval
//! stays out of the core (`spec.md` §1).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolarForecast {
    pub pv_central_kwh: Vec<f64>,
    pub pv_p10_kwh: Vec<f64>,
}

#[async_trait]
pub trait SolarForecastProvider: Send + Sync {
    async fn forecast(&self, at: DateTime<Utc>, horizon_minutes: u32) -> Result<SolarForecast>;
}

/// Deterministic in-memory double used by the crate's own tests and the
/// CLI's fixture demo mode.
pub struct FixedSolarForecastProvider {
    pub forecast: SolarForecast,
}

#[async_trait]
impl SolarForecastProvider for FixedSolarForecastProvider {
    async fn forecast(&self, _at: DateTime<Utc>, _horizon_minutes: u32) -> Result<SolarForecast> {
        Ok(self.forecast.clone())
    }
}
