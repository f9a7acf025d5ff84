//! Tariff provider (`spec.md` §6): per-minute import/export rate vectors
//! plus a standing charge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffForecast {
    pub rate_import: Vec<f64>,
    pub rate_export: Vec<f64>,
    pub standing_charge: f64,
}

#[async_trait]
pub trait TariffProvider: Send + Sync {
    async fn forecast(&self, at: DateTime<Utc>, horizon_minutes: u32) -> Result<TariffForecast>;
}

pub struct FixedTariffProvider {
    pub forecast: TariffForecast,
}

#[async_trait]
impl TariffProvider for FixedTariffProvider {
    async fn forecast(&self, _at: DateTime<Utc>, _horizon_minutes: u32) -> Result<TariffForecast> {
        Ok(self.forecast.clone())
    }
}
