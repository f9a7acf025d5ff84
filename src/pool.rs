//! Worker pool (C4, `spec.md` §4.3): dispatches simulator invocations,
//! deterministic result ordering, single-threaded `N=0` fallback.
//!
//! Grounded on the teacher's tokio-first async stack (`async-trait`,
//! `tokio::task`) rather than the `rayon` data-parallel style — the pool's
//! contract is `dispatch`/`await`, matching an async task-handle idiom more
//! than a fork-join one.

use std::sync::Arc;

use crate::domain::input::InputBundle;
use crate::domain::result::{Scenario, SimResult};
use crate::domain::schedule::Schedule;
use crate::error::{PlanError, Result};
use crate::simulator::{self, KeepMarginParams, RateSelection};

/// One simulator invocation, ready to dispatch.
#[derive(Clone)]
pub struct SimJob {
    pub schedule: Schedule,
    pub scenario: Scenario,
    pub end_record_minute: u32,
    pub step_minutes: u32,
    pub keep_margin: KeepMarginParams,
    pub rate_selection: RateSelection,
}

/// A dispatched job's handle. Wraps either a spawned task (parallel path)
/// or an already-computed result (`N=0` synchronous path) — the two must be
/// behaviourally identical to callers (`spec.md` §4.3).
pub enum JobHandle {
    Spawned(tokio::task::JoinHandle<Result<SimResult>>),
    Ready(Result<SimResult>),
}

/// Worker count configuration (`spec.md` §4.3 "N worker threads/processes
/// (N ∈ {0=off, auto=cpu_count, fixed})").
#[derive(Debug, Clone, Copy)]
pub enum WorkerCount {
    Off,
    Auto,
    Fixed(usize),
}

pub struct WorkerPool {
    input: Arc<InputBundle>,
    synchronous: bool,
    /// Bounds in-flight jobs to `WorkerCount::Fixed(n)`; `None` for `Auto`
    /// (the Tokio blocking pool's own default cap applies) and for `Off`
    /// (the synchronous path never spawns).
    semaphore: Option<Arc<tokio::sync::Semaphore>>,
}

impl WorkerPool {
    pub fn new(input: Arc<InputBundle>, workers: WorkerCount) -> Self {
        let semaphore = match workers {
            WorkerCount::Fixed(n) => Some(Arc::new(tokio::sync::Semaphore::new(n.max(1)))),
            WorkerCount::Off | WorkerCount::Auto => None,
        };
        Self {
            input,
            synchronous: matches!(workers, WorkerCount::Off),
            semaphore,
        }
    }

    /// `dispatch(job) -> handle` (`spec.md` §4.3).
    pub fn dispatch(&self, job: SimJob) -> JobHandle {
        if self.synchronous {
            let result = run_job(&self.input, &job);
            return JobHandle::Ready(result);
        }
        let input = Arc::clone(&self.input);
        let handle = match &self.semaphore {
            Some(semaphore) => {
                let semaphore = Arc::clone(semaphore);
                tokio::task::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("pool semaphore never closed");
                    tokio::task::spawn_blocking(move || run_job(&input, &job))
                        .await
                        .map_err(|e| PlanError::WorkerFailed(e.to_string()))?
                })
            }
            None => tokio::task::spawn_blocking(move || run_job(&input, &job)),
        };
        JobHandle::Spawned(handle)
    }

    /// `await(handle) -> result` (`spec.md` §4.3). A failed job is retried
    /// once synchronously before being surfaced as `WorkerFailed`
    /// (`spec.md` §7).
    pub async fn await_job(&self, handle: JobHandle, retry_job: Option<SimJob>) -> Result<SimResult> {
        let result = match handle {
            JobHandle::Ready(result) => result,
            JobHandle::Spawned(join_handle) => match join_handle.await {
                Ok(result) => result,
                Err(join_error) => Err(PlanError::WorkerFailed(join_error.to_string())),
            },
        };
        match (result, retry_job) {
            (Ok(value), _) => Ok(value),
            (Err(_), Some(job)) => run_job(&self.input, &job)
                .map_err(|e| PlanError::WorkerFailed(e.to_string())),
            (Err(e), None) => Err(e),
        }
    }

    /// Dispatches and awaits every job in `jobs`, preserving input order —
    /// correlation to originating schedules is the caller's responsibility
    /// via that order, matching the teacher's preference for explicit
    /// indices over implicit channel ordering.
    pub async fn run_batch(&self, jobs: Vec<SimJob>) -> Vec<Result<SimResult>> {
        let handles: Vec<(JobHandle, SimJob)> = jobs
            .iter()
            .map(|job| (self.dispatch(job.clone()), job.clone()))
            .collect();
        let mut results = Vec::with_capacity(handles.len());
        for (handle, job) in handles {
            results.push(self.await_job(handle, Some(job)).await);
        }
        results
    }
}

fn run_job(input: &InputBundle, job: &SimJob) -> Result<SimResult> {
    simulator::simulate(
        input,
        &job.schedule,
        job.scenario,
        job.end_record_minute,
        job.step_minutes,
        job.keep_margin,
        job.rate_selection,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::input::{PowerCurve, TemperatureCurve, Toggles};

    fn tiny_bundle() -> InputBundle {
        InputBundle {
            soc_now_kwh: 5.0,
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
            rate_import: vec![0.30; 288],
            rate_export: vec![0.10; 288],
            pv_central: vec![0.0; 288],
            pv_p10: vec![0.0; 288],
            load: vec![0.2; 288],
            carbon_intensity: vec![0.0; 288],
            battery_temperature: vec![20.0; 288],
            alert_keep: vec![0.0; 288],
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

    fn job() -> SimJob {
        SimJob {
            schedule: Schedule::empty(),
            scenario: Scenario::Central,
            end_record_minute: 1440,
            step_minutes: 5,
            keep_margin: KeepMarginParams { best_soc_keep_kwh: 0.0, best_soc_keep_weight: 0.0 },
            rate_selection: RateSelection::TargetDirect,
        }
    }

    #[tokio::test]
    async fn synchronous_and_parallel_paths_agree() {
        let input = Arc::new(tiny_bundle());
        let sync_pool = WorkerPool::new(Arc::clone(&input), WorkerCount::Off);
        let par_pool = WorkerPool::new(input, WorkerCount::Auto);

        let sync_handle = sync_pool.dispatch(job());
        let sync_result = sync_pool.await_job(sync_handle, None).await.unwrap();

        let par_handle = par_pool.dispatch(job());
        let par_result = par_pool.await_job(par_handle, None).await.unwrap();

        assert_eq!(sync_result.final_metric, par_result.final_metric);
        assert_eq!(sync_result.predict_soc, par_result.predict_soc);
    }

    #[tokio::test]
    async fn run_batch_preserves_order() {
        let input = Arc::new(tiny_bundle());
        let pool = WorkerPool::new(input, WorkerCount::Auto);
        let jobs = vec![job(), job(), job()];
        let results = pool.run_batch(jobs).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn fixed_worker_count_still_completes_every_job() {
        let input = Arc::new(tiny_bundle());
        let pool = WorkerPool::new(input, WorkerCount::Fixed(1));
        let jobs = vec![job(), job(), job(), job()];
        let results = pool.run_batch(jobs).await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
