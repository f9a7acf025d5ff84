//! Inverter control provider (`spec.md` §6): given a finalised schedule,
//! the core emits a schedule delta — added/changed/cleared windows — and
//! leaves register-level compatibility to the provider.
//!
//! Grounded on the teacher's `domain::inverter::Inverter` trait shape
//! (`set_mode`/`set_export_limit`/`emergency_shutdown`), narrowed to the
//! one operation the core actually needs: applying a schedule delta.
//! Register I/O itself stays out of the core (`spec.md` §1).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::schedule::Schedule;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScheduleDelta {
    Replace(Schedule),
    Clear,
}

#[async_trait]
pub trait InverterControlProvider: Send + Sync {
    async fn apply(&self, delta: ScheduleDelta) -> Result<()>;
}

/// Records the most recently applied delta instead of touching hardware —
/// used by tests and the CLI's fixture demo mode.
pub struct RecordingInverterControlProvider {
    pub last_applied: parking_lot::Mutex<Option<ScheduleDelta>>,
}

impl Default for RecordingInverterControlProvider {
    fn default() -> Self {
        Self { last_applied: parking_lot::Mutex::new(None) }
    }
}

#[async_trait]
impl InverterControlProvider for RecordingInverterControlProvider {
    async fn apply(&self, delta: ScheduleDelta) -> Result<()> {
        *self.last_applied.lock() = Some(delta);
        Ok(())
    }
}
