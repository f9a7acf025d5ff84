//! Periodic re-plan driver (`spec.md` §4.8, §1 "re-plans on a coarse
//! cadence ≈5 min"). Grounded on the teacher's `controller::scheduler::
//! TaskScheduler`/`PeriodicTaskConfig`/`TaskStatus` shape, narrowed from
//! five independent periodic tasks (reoptimize/forecast/cleanup/health/ml)
//! down to the one task this crate owns: re-running `Planner::run_cycle`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::plan::{Plan, Planner, Status};

#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_duration: Duration,
}

pub struct ScheduleLoop {
    planner: Arc<Planner>,
    replan_interval: Duration,
    forecast_minutes: u32,
    status: Arc<RwLock<TaskStatus>>,
    latest_plan: Arc<RwLock<Option<Plan>>>,
}

impl ScheduleLoop {
    pub fn new(planner: Arc<Planner>, replan_interval: Duration, forecast_minutes: u32) -> Self {
        Self {
            planner,
            replan_interval,
            forecast_minutes,
            status: Arc::new(RwLock::new(TaskStatus::default())),
            latest_plan: Arc::new(RwLock::new(None)),
        }
    }

    /// Runs the re-plan cycle on a fixed interval until the returned task
    /// is aborted. Each tick's failure is logged and recorded in `status`
    /// without stopping the loop — the core is restartable (`spec.md` §7).
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.replan_interval);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    pub async fn run_once(&self) {
        let started = Utc::now();
        let mut status = self.status.write().await;
        status.run_count += 1;
        status.last_run = Some(started);
        drop(status);

        match self.planner.run_cycle(started, self.forecast_minutes).await {
            Ok(plan) => {
                info!(
                    final_metric = crate::constants::round_metric(plan.trace.final_metric),
                    "re-plan cycle succeeded"
                );
                let mut status = self.status.write().await;
                status.last_success = Some(Utc::now());
                status.success_count += 1;
                status.last_duration = (Utc::now() - started).to_std().unwrap_or_default();
                drop(status);
                *self.latest_plan.write().await = Some(plan);
            }
            Err(e) => {
                error!(error = %e, "re-plan cycle failed, retaining previous plan");
                let mut status = self.status.write().await;
                status.last_error = Some(e.to_string());
                status.error_count += 1;
            }
        }
    }

    pub async fn status(&self) -> Status {
        let status = self.status.read().await;
        let state = if status.last_error.is_some() && status.last_success.is_none() {
            "failed".to_string()
        } else if status.run_count == 0 {
            "idle".to_string()
        } else {
            "ok".to_string()
        };
        Status {
            state,
            progress: 100,
            last_duration: status.last_duration,
        }
    }

    pub async fn latest_plan(&self) -> Option<Plan> {
        self.latest_plan.read().await.clone()
    }
}
