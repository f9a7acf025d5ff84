//! Load forecast provider: emits the per-minute house-load vector
//! (`spec.md` §3 `load[i]`). Not named as its own collaborator in `spec.md`
//! §6's "Consumed" list — the measurement provider there only carries
//! *cumulative* today's load — but the data model requires a forward-
//! looking `load[i]` vector the simulator reads every tick, so it needs a
//! source the same way solar and tariff do.
//!
//! Grounded on the teacher's `forecast::engine::ForecastEngine` aggregation
//! style, same as [`crate::external::solar`] — the trait shape, not an ML
//! pipeline, since load forecasting itself stays out of the core
//! (`spec.md` §1).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadForecast {
    /// House load, kWh per `STEP_MINUTES` slot.
    pub load_kwh: Vec<f64>,
}

#[async_trait]
pub trait LoadForecastProvider: Send + Sync {
    async fn forecast(&self, at: DateTime<Utc>, horizon_minutes: u32) -> Result<LoadForecast>;
}

/// Deterministic in-memory double used by the crate's own tests and the
/// CLI's fixture demo mode.
pub struct FixedLoadForecastProvider {
    pub forecast: LoadForecast,
}

#[async_trait]
impl LoadForecastProvider for FixedLoadForecastProvider {
    async fn forecast(&self, _at: DateTime<Utc>, _horizon_minutes: u32) -> Result<LoadForecast> {
        Ok(self.forecast.clone())
    }
}

/// Repeats a fixed per-day load profile (one entry per `STEP_MINUTES` slot
/// in a day) across the whole horizon — the simplest realistic stand-in for
/// a historical-average load forecaster.
pub struct DailyProfileLoadForecastProvider {
    pub daily_profile_kwh: Vec<f64>,
}

#[async_trait]
impl LoadForecastProvider for DailyProfileLoadForecastProvider {
    async fn forecast(&self, _at: DateTime<Utc>, horizon_minutes: u32) -> Result<LoadForecast> {
        let slots = (horizon_minutes / crate::constants::STEP_MINUTES) as usize;
        let profile_len = self.daily_profile_kwh.len().max(1);
        let load_kwh = (0..slots)
            .map(|i| self.daily_profile_kwh[i % profile_len])
            .collect();
        Ok(LoadForecast { load_kwh })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn daily_profile_repeats_across_horizon() {
        let provider = DailyProfileLoadForecastProvider { daily_profile_kwh: vec![0.1, 0.2, 0.3] };
        let forecast = provider.forecast(Utc::now(), 15).await.unwrap();
        assert_eq!(forecast.load_kwh.len(), 3);
    }
}
