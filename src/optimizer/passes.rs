//! The four ordered hill-climbing passes (`spec.md` §4.5).

use std::sync::Arc;

use crate::constants::{LOW_POWER_CHARGE_MARGIN_MINUTES, STEP_MINUTES};
use crate::domain::input::InputBundle;
use crate::domain::result::{Scenario, SimResult};
use crate::domain::schedule::{Schedule, Window};
use crate::error::Result;
use crate::optimizer::config::OptimizerConfig;
use crate::pool::{SimJob, WorkerPool};
use crate::scoring::{self, ScoringParams, TieBreakKey};
use crate::simulator::RateSelection;

/// A scored candidate produced during the search.
pub struct Scored {
    pub schedule: Schedule,
    pub score: f64,
    pub result: SimResult,
}

/// Runs all four passes in order and returns the best schedule found plus
/// its trace, honouring a soft deadline between passes (`spec.md` §5, §7
/// `DeadlineExceeded`).
pub async fn run_optimizer(
    pool: &WorkerPool,
    input: &Arc<InputBundle>,
    config: &OptimizerConfig,
    deadline: std::time::Instant,
) -> Result<(Schedule, SimResult, usize)> {
    let scoring_params = ScoringParams {
        metric_battery_cycle: config.metric_battery_cycle,
        pv_metric10_weight: config.pv_metric10_weight,
    };

    let mut schedule = window_discovery(input, config);
    let mut passes_completed = 0usize;

    if std::time::Instant::now() >= deadline {
        let result =
            score_schedule(pool, input, &schedule, config, 15, RateSelection::TargetDirect).await?;
        return Ok((schedule, result.result, passes_completed));
    }
    schedule = level_sweep(pool, input, schedule, config, &scoring_params).await?;
    passes_completed += 1;

    if std::time::Instant::now() < deadline {
        schedule = detailed_pass(pool, input, schedule, config, &scoring_params).await?;
        passes_completed += 1;
    }

    if config.run_boundary_pass && std::time::Instant::now() < deadline {
        schedule = boundary_pass(pool, input, schedule, config, &scoring_params).await?;
        passes_completed += 1;
    }

    // The rate-selection distinction only matters for the schedule actually
    // handed back to the caller (`spec.md` §4.2 step 4 "Charging": pick via
    // `find_charge_rate` only for the final accepted schedule) — every pass
    // above explores with `TargetDirect` so exploratory sims stay cheap.
    let final_rate_selection = if input.toggles.set_charge_low_power {
        RateSelection::FindChargeRate { margin_minutes: LOW_POWER_CHARGE_MARGIN_MINUTES }
    } else {
        RateSelection::TargetDirect
    };
    let best =
        score_schedule(pool, input, &schedule, config, STEP_MINUTES, final_rate_selection).await?;
    Ok((schedule, best.result, passes_completed))
}

/// Pass 1: window discovery (`spec.md` §4.5.1). Picks contiguous runs of
/// `rate_import` below `mean · rate_low_threshold` as candidate charge
/// windows, and runs of `rate_export` above `mean · rate_high_threshold` as
/// candidate export windows, capped at `max_windows`.
pub fn window_discovery(input: &InputBundle, config: &OptimizerConfig) -> Schedule {
    let mean_import = mean(&input.rate_import);
    let mean_export = mean(&input.rate_export);

    let mut charge_windows = contiguous_runs(&input.rate_import, |rate| {
        rate <= mean_import * config.rate_low_threshold
    });
    charge_windows.truncate(config.max_windows);

    let mut export_windows = contiguous_runs(&input.rate_export, |rate| {
        rate >= mean_export * config.rate_high_threshold
    });

    if config.rate_low_match_export {
        charge_windows.retain(|charge| {
            export_windows.iter().any(|export| export.start_min >= charge.end_min)
        });
    }
    export_windows.truncate(config.max_windows);

    let charge_limits = vec![input.soc_max_kwh; charge_windows.len()];
    let export_limits = vec![0.0; export_windows.len()];

    let mut schedule = Schedule {
        charge_windows,
        charge_limits,
        export_windows,
        export_limits,
    };
    schedule.remove_overlap();
    schedule
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn contiguous_runs(values: &[f64], predicate: impl Fn(f64) -> bool) -> Vec<Window> {
    let mut windows = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if predicate(v) {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            windows.push(Window::new((start as u32) * STEP_MINUTES, (i as u32) * STEP_MINUTES));
        }
    }
    if let Some(start) = run_start {
        windows.push(Window::new(
            (start as u32) * STEP_MINUTES,
            (values.len() as u32) * STEP_MINUTES,
        ));
    }
    windows
}

/// Pass 2: coarse level sweep (`spec.md` §4.5.2). For each window in time
/// order, sweeps candidate limits and keeps the best, using a coarser
/// `step` than the final pass to trade accuracy for throughput.
async fn level_sweep(
    pool: &WorkerPool,
    input: &Arc<InputBundle>,
    mut schedule: Schedule,
    config: &OptimizerConfig,
    scoring_params: &ScoringParams,
) -> Result<Schedule> {
    const COARSE_STEP_MINUTES: u32 = 15;

    let sweep_charge = |schedule: &mut Schedule, index: usize| {
        let mut levels = Vec::new();
        let mut level = config.best_soc_min.max(input.reserve_min_kwh);
        while level <= input.soc_max_kwh {
            levels.push(level);
            level += config.best_soc_step;
        }
        levels
    };
    let sweep_export = |_schedule: &mut Schedule, _index: usize| -> Vec<f64> {
        let mut levels: Vec<f64> = (0..=19).map(|i| i as f64 * 5.0).collect();
        levels.push(99.0);
        levels.push(100.0);
        levels
    };

    let (charge_first, export_first) = if config.calculate_discharge_first {
        (false, true)
    } else {
        (true, false)
    };

    if charge_first {
        sweep_list(
            pool,
            input,
            &mut schedule,
            config,
            scoring_params,
            COARSE_STEP_MINUTES,
            true,
            sweep_charge,
        )
        .await?;
    }
    sweep_list(
        pool,
        input,
        &mut schedule,
        config,
        scoring_params,
        COARSE_STEP_MINUTES,
        false,
        sweep_export,
    )
    .await?;
    if export_first {
        sweep_list(
            pool,
            input,
            &mut schedule,
            config,
            scoring_params,
            COARSE_STEP_MINUTES,
            true,
            sweep_charge,
        )
        .await?;
    }

    Ok(schedule)
}

/// Pass 3: detailed fine-tune (`spec.md` §4.5.3): re-visit each window at
/// `STEP_MINUTES`, try neighbouring limits (± `best_soc_step`) plus freeze
/// variants, accept only on a strict improvement beyond the configured
/// threshold.
async fn detailed_pass(
    pool: &WorkerPool,
    input: &Arc<InputBundle>,
    mut schedule: Schedule,
    config: &OptimizerConfig,
    scoring_params: &ScoringParams,
) -> Result<Schedule> {
    for index in 0..schedule.charge_windows.len() {
        let current = schedule.charge_limits[index];
        let floor_kwh = config.best_soc_min.max(input.reserve_min_kwh);
        let candidates = [
            current,
            (current - config.best_soc_step).max(floor_kwh),
            (current + config.best_soc_step).min(input.soc_max_kwh),
            floor_kwh, // freeze variant
        ];
        let mut best_result = score_schedule(pool, input, &schedule, config, STEP_MINUTES, RateSelection::TargetDirect).await?;
        for &candidate in &candidates {
            if candidate == current {
                continue;
            }
            let mut trial = schedule.clone();
            trial.charge_limits[index] = candidate;
            let trial_result = score_schedule(pool, input, &trial, config, STEP_MINUTES, RateSelection::TargetDirect).await?;
            if scoring::accepts(
                trial_result.score,
                best_result.score,
                config.metric_min_improvement,
                &TieBreakKey::from_result(&trial_result.result, &trial.charge_limits),
                &TieBreakKey::from_result(&best_result.result, &schedule.charge_limits),
            ) {
                schedule.charge_limits[index] = candidate;
                best_result = trial_result;
            }
        }
        let _ = scoring_params;
    }

    for index in 0..schedule.export_windows.len() {
        let current = schedule.export_limits[index];
        let candidates = [
            current,
            (current - 5.0).max(0.0),
            (current + 5.0).min(100.0),
            99.0, // freeze variant
        ];
        let mut best_result = score_schedule(pool, input, &schedule, config, STEP_MINUTES, RateSelection::TargetDirect).await?;
        for &candidate in &candidates {
            if candidate == current {
                continue;
            }
            let mut trial = schedule.clone();
            trial.export_limits[index] = candidate;
            let trial_result = score_schedule(pool, input, &trial, config, STEP_MINUTES, RateSelection::TargetDirect).await?;
            if scoring::accepts(
                trial_result.score,
                best_result.score,
                config.metric_min_improvement_discharge,
                &TieBreakKey::from_result(&trial_result.result, &trial.export_limits),
                &TieBreakKey::from_result(&best_result.result, &schedule.export_limits),
            ) {
                schedule.export_limits[index] = candidate;
                best_result = trial_result;
            }
        }
    }

    if config.combine_charge_slots {
        schedule.combine_charge();
    }
    if config.combine_discharge_slots {
        schedule.combine_export();
    }
    Ok(schedule)
}

/// Pass 4: boundary pass (`spec.md` §4.5.4, optional): nudges window
/// start/end by ±`STEP_MINUTES` to catch rate-transition edge cases.
async fn boundary_pass(
    pool: &WorkerPool,
    input: &Arc<InputBundle>,
    mut schedule: Schedule,
    config: &OptimizerConfig,
    _scoring_params: &ScoringParams,
) -> Result<Schedule> {
    for index in 0..schedule.charge_windows.len() {
        let window = schedule.charge_windows[index];
        let best_result = score_schedule(pool, input, &schedule, config, STEP_MINUTES, RateSelection::TargetDirect).await?;
        let mut best_score = best_result.score;

        for delta in [-(STEP_MINUTES as i64), STEP_MINUTES as i64] {
            let new_start = (window.start_min as i64 + delta).max(0) as u32;
            if new_start >= window.end_min {
                continue;
            }
            let mut trial = schedule.clone();
            trial.charge_windows[index] = Window::new(new_start, window.end_min);
            let trial_result = score_schedule(pool, input, &trial, config, STEP_MINUTES, RateSelection::TargetDirect).await?;
            if trial_result.score < best_score - config.metric_min_improvement {
                schedule = trial;
                best_score = trial_result.score;
            }
        }
    }
    schedule.remove_overlap();
    Ok(schedule)
}

async fn sweep_list(
    pool: &WorkerPool,
    input: &Arc<InputBundle>,
    schedule: &mut Schedule,
    config: &OptimizerConfig,
    scoring_params: &ScoringParams,
    step_minutes: u32,
    is_charge: bool,
    levels_for: impl Fn(&mut Schedule, usize) -> Vec<f64>,
) -> Result<()> {
    let count = if is_charge {
        schedule.charge_windows.len()
    } else {
        schedule.export_windows.len()
    };
    for index in 0..count {
        let levels = levels_for(schedule, index);
        let mut best_level = if is_charge {
            schedule.charge_limits[index]
        } else {
            schedule.export_limits[index]
        };
        let mut best_score = score_schedule(pool, input, schedule, config, step_minutes, RateSelection::TargetDirect)
            .await?
            .score;
        for level in levels {
            let mut trial = schedule.clone();
            if is_charge {
                trial.charge_limits[index] = level;
            } else {
                trial.export_limits[index] = level;
            }
            let trial_scored = score_schedule(pool, input, &trial, config, step_minutes, RateSelection::TargetDirect).await?;
            if trial_scored.score < best_score {
                best_score = trial_scored.score;
                best_level = level;
            }
        }
        if is_charge {
            schedule.charge_limits[index] = best_level;
        } else {
            schedule.export_limits[index] = best_level;
        }
    }
    let _ = scoring_params;
    Ok(())
}

async fn score_schedule(
    pool: &WorkerPool,
    input: &Arc<InputBundle>,
    schedule: &Schedule,
    config: &OptimizerConfig,
    step_minutes: u32,
    rate_selection: RateSelection,
) -> Result<Scored> {
    let job = SimJob {
        schedule: schedule.clone(),
        scenario: Scenario::Central,
        end_record_minute: input.forecast_minutes,
        step_minutes,
        keep_margin: config.keep_margin(input.soc_max_kwh),
        rate_selection,
    };
    tracing::trace!(scenario = %job.scenario, step_minutes, "scoring candidate schedule");
    let handle = pool.dispatch(job.clone());
    let result = pool.await_job(handle, Some(job)).await?;
    let scoring_params = ScoringParams {
        metric_battery_cycle: config.metric_battery_cycle,
        pv_metric10_weight: config.pv_metric10_weight,
    };
    let score = if config.pv_metric10_weight > 0.0 {
        let p10_job = SimJob {
            schedule: schedule.clone(),
            scenario: Scenario::P10,
            end_record_minute: input.forecast_minutes,
            step_minutes,
            keep_margin: config.keep_margin(input.soc_max_kwh),
            rate_selection,
        };
        let p10_handle = pool.dispatch(p10_job.clone());
        let p10_result = pool.await_job(p10_handle, Some(p10_job)).await?;
        scoring::blended_score(&result, &p10_result, &scoring_params)
    } else {
        scoring::score(&result, &scoring_params)
    };
    Ok(Scored { schedule: schedule.clone(), score, result })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::input::{PowerCurve, TemperatureCurve, Toggles};
    use crate::pool::WorkerCount;

    fn bundle_with_cheap_night() -> InputBundle {
        let slots = 288;
        let mut rate_import = vec![0.30; slots];
        // Cheap from 00:30 to 04:30 (slots 6..54).
        for slot in 6..54 {
            rate_import[slot] = 0.07;
        }
        InputBundle {
            soc_now_kwh: 1.0,
            soc_max_kwh: 10.0,
            reserve_min_kwh: 1.0,
            battery_rate_max_charge_kw: 3.0,
            battery_rate_max_discharge_kw: 3.0,
            battery_rate_min_kw: 0.0,
            inverter_ac_limit_kw: 5.0,
            export_limit_kw: 5.0,
            inverter_loss_factor: 0.97,
            hybrid: true,
            battery_loss: 0.95,
            battery_loss_discharge: 0.95,
            cumulative_import_kwh_today: 0.0,
            cumulative_export_kwh_today: 0.0,
            cumulative_load_kwh_today: 0.0,
            cumulative_pv_kwh_today: 0.0,
            temperature_now_c: 20.0,
            rate_import,
            rate_export: vec![0.0; slots],
            pv_central: vec![0.0; slots],
            pv_p10: vec![0.0; slots],
            load: vec![0.2; slots],
            carbon_intensity: vec![0.0; slots],
            battery_temperature: vec![20.0; slots],
            alert_keep: vec![0.0; slots],
            charge_power_curve: PowerCurve::flat(),
            discharge_power_curve: PowerCurve::flat(),
            temp_charge_curve: TemperatureCurve::unbounded(),
            temp_discharge_curve: TemperatureCurve::unbounded(),
            cars: vec![],
            toggles: Toggles::default(),
            minutes_now: 0,
            forecast_minutes: 1440,
        }
    }

    #[tokio::test]
    async fn window_discovery_finds_cheap_night_run() {
        let input = bundle_with_cheap_night();
        let config = OptimizerConfig::default();
        let schedule = window_discovery(&input, &config);
        assert!(!schedule.charge_windows.is_empty());
        let window = schedule.charge_windows[0];
        assert_eq!(window.start_min, 30);
        assert_eq!(window.end_min, 270);
    }

    #[tokio::test]
    async fn optimizer_produces_disjoint_schedule() {
        let input = Arc::new(bundle_with_cheap_night());
        let pool = WorkerPool::new(Arc::clone(&input), WorkerCount::Auto);
        let config = OptimizerConfig::default();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let (schedule, _result, passes) = run_optimizer(&pool, &input, &config, deadline).await.unwrap();
        assert!(schedule.validate(input.reserve_min_kwh, input.soc_max_kwh).is_ok());
        assert!(passes >= 1);
    }
}
