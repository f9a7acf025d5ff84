use thiserror::Error;

/// Errors surfaced by the planning core (battery model, simulator, worker
/// pool, optimiser). Nothing here is fatal to the surrounding process — the
/// plan driver decides whether to retain a previous plan or accept a
/// degraded one.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("no feasible schedule keeps SOC above reserve across the horizon")]
    Infeasible,

    #[error("worker job failed: {0}")]
    WorkerFailed(String),

    #[error("plan deadline exceeded after {passes_completed} pass(es)")]
    DeadlineExceeded { passes_completed: usize },
}

pub type Result<T> = std::result::Result<T, PlanError>;
