//! Plan driver (C9, `spec.md` §4.8): binds C1–C7 into one planning cycle
//! and produces the `Plan`/`Status` value objects of `spec.md` §6.
//!
//! Grounded on the teacher's `controller::AppState` composition pattern —
//! a struct owning the config plus `Arc`-wrapped collaborators, with one
//! `async fn` entry point building inputs, running the core, and returning
//! a value object — adapted from a continuous real-time control loop to a
//! single discrete re-plan cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::domain::input::InputBundle;
use crate::domain::result::SimResult;
use crate::domain::schedule::Schedule;
use crate::error::Result;
use crate::external::{
    InverterControlProvider, LoadForecastProvider, MeasurementProvider, ScheduleDelta,
    SolarForecastProvider, TariffProvider,
};
use crate::optimizer::passes::run_optimizer;
use crate::pool::WorkerPool;

/// Plan output (`spec.md` §6 "Produced"): the accepted schedule plus its
/// `SimResult` trace, suitable for serialisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Identifies one plan cycle's output, distinct from any other cycle's
    /// even if the accepted schedule happens to be identical.
    pub id: Uuid,
    pub schedule: Schedule,
    pub trace: SimResult,
    pub generated_at: DateTime<Utc>,
    /// Set when the optimiser accepted a schedule that cannot keep SOC
    /// above reserve across the horizon (`spec.md` §7 `Infeasible`).
    pub soc_min_below_reserve: bool,
    /// Number of optimiser passes actually run before the deadline
    /// (`spec.md` §7 `DeadlineExceeded`).
    pub passes_completed: usize,
}

/// `spec.md` §6 "Status": textual state, progress counter, last-plan
/// duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub state: String,
    pub progress: u8,
    pub last_duration: Duration,
}

pub struct Planner {
    config: PlannerConfig,
    solar: Arc<dyn SolarForecastProvider>,
    tariff: Arc<dyn TariffProvider>,
    load: Arc<dyn LoadForecastProvider>,
    measurement: Arc<dyn MeasurementProvider>,
    inverter: Arc<dyn InverterControlProvider>,
}

impl Planner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PlannerConfig,
        solar: Arc<dyn SolarForecastProvider>,
        tariff: Arc<dyn TariffProvider>,
        load: Arc<dyn LoadForecastProvider>,
        measurement: Arc<dyn MeasurementProvider>,
        inverter: Arc<dyn InverterControlProvider>,
    ) -> Self {
        Self { config, solar, tariff, load, measurement, inverter }
    }

    /// Builds the `InputBundle` from the external providers, runs the
    /// optimiser, applies the resulting schedule, and returns the `Plan`.
    pub async fn run_cycle(&self, now: DateTime<Utc>, forecast_minutes: u32) -> Result<Plan> {
        let started = Instant::now();
        let input = self.build_input_bundle(now, forecast_minutes).await?;

        if let Err(e) = input.validate() {
            warn!(error = %e, "bad plan input, aborting cycle");
            return Err(e);
        }

        let input = Arc::new(input);
        let pool = WorkerPool::new(Arc::clone(&input), self.config.worker.count.into());
        let deadline = started + Duration::from_secs(self.config.worker.plan_deadline_secs);

        let (schedule, trace, passes_completed) =
            run_optimizer(&pool, &input, &self.config.optimizer, deadline).await?;
        if passes_completed < 3 {
            warn!(passes_completed, "plan deadline reached before all passes completed");
        }

        let soc_min_below_reserve = trace.soc_min_kwh < input.reserve_min_kwh - 1e-6;
        if soc_min_below_reserve {
            warn!(soc_min = trace.soc_min_kwh, reserve = input.reserve_min_kwh, "no feasible schedule keeps SOC above reserve");
        }

        self.inverter.apply(ScheduleDelta::Replace(schedule.clone())).await?;

        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            passes_completed,
            final_metric = crate::constants::round_metric(trace.final_metric),
            "plan cycle complete"
        );

        Ok(Plan {
            id: Uuid::new_v4(),
            schedule,
            trace,
            generated_at: now,
            soc_min_below_reserve,
            passes_completed,
        })
    }

    async fn build_input_bundle(&self, now: DateTime<Utc>, forecast_minutes: u32) -> Result<InputBundle> {
        let (solar, tariff, load, measurement) = tokio::join!(
            self.solar.forecast(now, forecast_minutes),
            self.tariff.forecast(now, forecast_minutes),
            self.load.forecast(now, forecast_minutes),
            self.measurement.snapshot(),
        );
        let solar = solar?;
        let tariff = tariff?;
        let load = load?;
        let measurement = measurement?;

        let local_now = now.with_timezone(&self.config.scheduler.tz());
        let minutes_since_local_midnight =
            (local_now.hour() * 60 + local_now.minute()) / crate::constants::STEP_MINUTES
                * crate::constants::STEP_MINUTES;

        let slot_count = solar.pv_central_kwh.len();
        Ok(InputBundle {
            soc_now_kwh: measurement.soc_now_kwh,
            soc_max_kwh: self.config.battery.soc_max_kwh,
            reserve_min_kwh: self.config.battery.reserve_min_kwh,
            battery_rate_max_charge_kw: self.config.battery.battery_rate_max_charge_kw,
            battery_rate_max_discharge_kw: self.config.battery.battery_rate_max_discharge_kw,
            battery_rate_min_kw: self.config.battery.battery_rate_min_kw,
            inverter_ac_limit_kw: self.config.inverter.inverter_ac_limit_kw,
            export_limit_kw: self.config.inverter.export_limit_kw,
            inverter_loss_factor: self.config.inverter.inverter_loss_factor,
            hybrid: self.config.battery.hybrid,
            battery_loss: self.config.battery.battery_loss,
            battery_loss_discharge: self.config.battery.battery_loss_discharge,
            cumulative_import_kwh_today: measurement.cumulative_import_kwh_today,
            cumulative_export_kwh_today: measurement.cumulative_export_kwh_today,
            cumulative_load_kwh_today: measurement.cumulative_load_kwh_today,
            cumulative_pv_kwh_today: measurement.cumulative_pv_kwh_today,
            temperature_now_c: measurement.battery_temperature_c,
            rate_import: tariff.rate_import,
            rate_export: tariff.rate_export,
            pv_central: solar.pv_central_kwh,
            pv_p10: solar.pv_p10_kwh,
            load: load.load_kwh,
            carbon_intensity: vec![0.0; slot_count],
            battery_temperature: vec![measurement.battery_temperature_c; slot_count],
            alert_keep: vec![0.0; slot_count],
            charge_power_curve: crate::domain::input::PowerCurve::flat(),
            discharge_power_curve: crate::domain::input::PowerCurve::flat(),
            temp_charge_curve: crate::domain::input::TemperatureCurve::unbounded(),
            temp_discharge_curve: crate::domain::input::TemperatureCurve::unbounded(),
            cars: vec![],
            toggles: crate::domain::input::Toggles::default(),
            minutes_now: minutes_since_local_midnight,
            forecast_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::inverter::RecordingInverterControlProvider;
    use crate::external::load::{FixedLoadForecastProvider, LoadForecast};
    use crate::external::measurement::{MeasurementSnapshot, MockMeasurementProvider};
    use crate::external::solar::{FixedSolarForecastProvider, SolarForecast};
    use crate::external::tariff::{FixedTariffProvider, TariffForecast};

    #[tokio::test]
    async fn run_cycle_applies_schedule_via_inverter_provider() {
        const SLOTS: usize = 288;
        let solar = Arc::new(FixedSolarForecastProvider {
            forecast: SolarForecast { pv_central_kwh: vec![0.0; SLOTS], pv_p10_kwh: vec![0.0; SLOTS] },
        });
        let tariff = Arc::new(FixedTariffProvider {
            forecast: TariffForecast {
                rate_import: vec![0.30; SLOTS],
                rate_export: vec![0.10; SLOTS],
                standing_charge: 0.0,
            },
        });

        let load = Arc::new(FixedLoadForecastProvider {
            forecast: LoadForecast { load_kwh: vec![0.2; SLOTS] },
        });

        let mut measurement = MockMeasurementProvider::new();
        measurement.expect_snapshot().returning(|| {
            Ok(MeasurementSnapshot {
                cumulative_import_kwh_today: 0.0,
                cumulative_export_kwh_today: 0.0,
                cumulative_load_kwh_today: 0.0,
                cumulative_pv_kwh_today: 0.0,
                soc_now_kwh: 5.0,
                battery_temperature_c: 20.0,
            })
        });

        let inverter = Arc::new(RecordingInverterControlProvider::default());
        let planner = Planner::new(
            PlannerConfig::default(),
            solar,
            tariff,
            load,
            Arc::new(measurement),
            Arc::clone(&inverter) as Arc<dyn InverterControlProvider>,
        );

        let plan = planner.run_cycle(Utc::now(), 1440).await.unwrap();
        assert!(plan.passes_completed >= 1);
        assert!(inverter.last_applied.lock().is_some());
    }
}
