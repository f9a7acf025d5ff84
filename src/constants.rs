//! Process-wide constants, initialised once and never mutated.
//!
//! Mirrors `spec.md` §5's "process-wide registry of global constants
//! (PREDICT_STEP, rounding precision), initialised once before the first
//! plan and never mutated thereafter."

use once_cell::sync::Lazy;

/// Sampling resolution of every per-minute series (`spec.md` §3).
pub const STEP_MINUTES: u32 = 5;

/// Decimal places SOC is stored at (`spec.md` §8 rounding rule).
pub const SOC_ROUNDING_DECIMALS: u32 = 6;

/// Decimal places metrics are displayed at (`spec.md` §8 rounding rule).
pub const METRIC_DISPLAY_DECIMALS: u32 = 2;

/// Minute offset at which the four-hour keep-margin ramp reaches full
/// weight (`spec.md` §4.2 step 9: "ramps linearly from 0 at minute=0 to
/// `best_soc_keep_weight` at minute=256").
pub const KEEP_MARGIN_RAMP_END_MINUTE: f64 = 256.0;

/// Lower bound of the temperature curve index range (`spec.md` §3).
pub const TEMP_CURVE_MIN: i32 = -20;

/// Upper bound of the temperature curve index range (`spec.md` §3).
pub const TEMP_CURVE_MAX: i32 = 19;

/// Step, in watts, used when sweeping candidate charge rates downward in
/// `find_charge_rate` (`spec.md` §4.1).
pub const CHARGE_RATE_SWEEP_STEP_W: f64 = 100.0;

/// Margin before a charge window's end that `find_charge_rate` must finish
/// by when `set_charge_low_power` is enabled (`spec.md` §4.1, scenario 5:
/// "completes just before `end − margin`").
pub const LOW_POWER_CHARGE_MARGIN_MINUTES: u32 = 30;

/// Process-wide registry of derived, never-mutated constants. Constructed
/// lazily on first access, exactly once for the process lifetime.
pub static REGISTRY: Lazy<ConstantRegistry> = Lazy::new(ConstantRegistry::default);

#[derive(Debug, Clone, Copy)]
pub struct ConstantRegistry {
    pub step_minutes: u32,
    pub soc_rounding_decimals: u32,
    pub metric_display_decimals: u32,
}

impl Default for ConstantRegistry {
    fn default() -> Self {
        Self {
            step_minutes: STEP_MINUTES,
            soc_rounding_decimals: SOC_ROUNDING_DECIMALS,
            metric_display_decimals: METRIC_DISPLAY_DECIMALS,
        }
    }
}

/// Round to `SOC_ROUNDING_DECIMALS` places, per the §8 rounding convention.
pub fn round_soc(value: f64) -> f64 {
    let scale = 10f64.powi(SOC_ROUNDING_DECIMALS as i32);
    (value * scale).round() / scale
}

/// Round to `METRIC_DISPLAY_DECIMALS` places for display, per §8.
pub fn round_metric(value: f64) -> f64 {
    let scale = 10f64.powi(METRIC_DISPLAY_DECIMALS as i32);
    (value * scale).round() / scale
}
