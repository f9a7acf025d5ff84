//! Thin CLI wrapper: owns process wiring (config, tracing, the periodic
//! re-plan loop) and none of the core algorithm (`SPEC_FULL.md` §1).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use wattplan::config::PlannerConfig;
use wattplan::external::inverter::RecordingInverterControlProvider;
use wattplan::external::load::{FixedLoadForecastProvider, LoadForecast};
use wattplan::external::measurement::{FixedMeasurementProvider, MeasurementSnapshot};
use wattplan::external::solar::{FixedSolarForecastProvider, SolarForecast};
use wattplan::external::tariff::{FixedTariffProvider, TariffForecast};
use wattplan::plan::Planner;
use wattplan::schedule_loop::ScheduleLoop;
use wattplan::telemetry::{init_tracing, shutdown_signal};

const FORECAST_MINUTES: u32 = 1440;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = PlannerConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default configuration");
        PlannerConfig::default()
    });

    let slots = (FORECAST_MINUTES / wattplan::constants::STEP_MINUTES) as usize;
    let solar = Arc::new(FixedSolarForecastProvider {
        forecast: SolarForecast { pv_central_kwh: vec![0.0; slots], pv_p10_kwh: vec![0.0; slots] },
    });
    let tariff = Arc::new(FixedTariffProvider {
        forecast: TariffForecast {
            rate_import: vec![0.30; slots],
            rate_export: vec![0.10; slots],
            standing_charge: 0.0,
        },
    });
    let load = Arc::new(FixedLoadForecastProvider {
        forecast: LoadForecast { load_kwh: vec![0.2; slots] },
    });
    let measurement = Arc::new(FixedMeasurementProvider {
        snapshot: MeasurementSnapshot {
            cumulative_import_kwh_today: 0.0,
            cumulative_export_kwh_today: 0.0,
            cumulative_load_kwh_today: 0.0,
            cumulative_pv_kwh_today: 0.0,
            soc_now_kwh: config.battery.soc_max_kwh * 0.5,
            battery_temperature_c: 20.0,
        },
    });
    let inverter = Arc::new(RecordingInverterControlProvider::default());

    let replan_interval = Duration::from_secs(config.scheduler.replan_interval_secs);
    let planner = Arc::new(Planner::new(config, solar, tariff, load, measurement, inverter));
    let schedule_loop = Arc::new(ScheduleLoop::new(planner, replan_interval, FORECAST_MINUTES));

    info!("running one planning cycle");
    schedule_loop.run_once().await;
    if let Some(plan) = schedule_loop.latest_plan().await {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }

    let loop_handle = tokio::spawn({
        let schedule_loop = Arc::clone(&schedule_loop);
        async move { schedule_loop.run().await }
    });

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = loop_handle => {}
    }

    Ok(())
}
