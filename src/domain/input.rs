//! `InputBundle`: the immutable, per-plan frozen view of rates, forecasts
//! and battery characteristics that C3 (the simulator) reads but never
//! mutates (`spec.md` §3).

use serde::{Deserialize, Serialize};

use crate::constants::{STEP_MINUTES, TEMP_CURVE_MAX, TEMP_CURVE_MIN};
use crate::error::{PlanError, Result};

/// A planned per-minute charge vector and target state for one car
/// (`spec.md` §3 "Car state").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarState {
    pub soc_now_kwh: f64,
    pub target_limit_kwh: f64,
    pub battery_size_kwh: f64,
    /// Planned charge power, kW, one entry per minute of the horizon.
    pub planned_charge_kw: Vec<f64>,
}

/// Operator toggles that change simulator behaviour without changing the
/// numeric inputs (`spec.md` §3 "Toggles").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Toggles {
    pub set_charge_window: bool,
    pub set_export_window: bool,
    pub set_charge_freeze: bool,
    pub set_export_freeze: bool,
    pub set_export_freeze_only: bool,
    pub set_reserve_enable: bool,
    pub set_discharge_during_charge: bool,
    pub set_charge_low_power: bool,
    pub inverter_can_charge_during_export: bool,
    pub iboost_enable: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            set_charge_window: true,
            set_export_window: true,
            set_charge_freeze: false,
            set_export_freeze: false,
            set_export_freeze_only: false,
            set_reserve_enable: false,
            set_discharge_during_charge: false,
            set_charge_low_power: false,
            inverter_can_charge_during_export: false,
            iboost_enable: false,
        }
    }
}

/// Charge/discharge power fraction curves indexed by integer SOC%
/// (`spec.md` §3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerCurve {
    /// Fraction of max rate achievable at SOC% `0..=99`.
    pub fraction: [f64; 100],
}

impl PowerCurve {
    pub fn flat() -> Self {
        Self { fraction: [1.0; 100] }
    }

    pub fn at(&self, soc_pct: f64) -> f64 {
        let idx = crate::domain::units::Percentage::pct(soc_pct).curve_index();
        self.fraction[idx]
    }
}

/// A kWh-per-minute cap indexed by integer Celsius over `[-20, 19]`
/// (`spec.md` §3, §4.1). Index 0 corresponds to -20°C.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureCurve {
    pub cap_kwh_per_min: [f64; 40],
}

impl TemperatureCurve {
    pub fn unbounded() -> Self {
        Self {
            cap_kwh_per_min: [f64::INFINITY; 40],
        }
    }

    /// `temperature_cap(T, curve)` from `spec.md` §4.1: pick the cell for
    /// `clamp(floor(T), -20, 19)`; if it is zero, search outward to the
    /// nearest non-zero cell, extrapolating with the extremum when the
    /// search runs off either end.
    pub fn cap_at(&self, temperature_c: f64) -> f64 {
        let idx = (temperature_c.floor() as i32).clamp(TEMP_CURVE_MIN, TEMP_CURVE_MAX);
        let base = (idx - TEMP_CURVE_MIN) as usize;
        if self.cap_kwh_per_min[base] != 0.0 {
            return self.cap_kwh_per_min[base];
        }
        for offset in 1..=((TEMP_CURVE_MAX - TEMP_CURVE_MIN) as usize) {
            let hi = base.checked_add(offset);
            let lo = base.checked_sub(offset);
            if let Some(hi) = hi {
                if hi < self.cap_kwh_per_min.len() && self.cap_kwh_per_min[hi] != 0.0 {
                    return self.cap_kwh_per_min[hi];
                }
            }
            if let Some(lo) = lo {
                if self.cap_kwh_per_min[lo] != 0.0 {
                    return self.cap_kwh_per_min[lo];
                }
            }
        }
        // Every cell is zero: fall back to the extremum (zero).
        self.cap_kwh_per_min[base]
    }
}

/// Immutable, per-plan view of rates, forecasts and battery constants
/// (`spec.md` §3 "InputBundle").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBundle {
    // --- Scalars ---
    pub soc_now_kwh: f64,
    pub soc_max_kwh: f64,
    pub reserve_min_kwh: f64,
    pub battery_rate_max_charge_kw: f64,
    pub battery_rate_max_discharge_kw: f64,
    pub battery_rate_min_kw: f64,
    pub inverter_ac_limit_kw: f64,
    pub export_limit_kw: f64,
    pub inverter_loss_factor: f64,
    pub hybrid: bool,
    pub battery_loss: f64,
    pub battery_loss_discharge: f64,
    pub cumulative_import_kwh_today: f64,
    pub cumulative_export_kwh_today: f64,
    pub cumulative_load_kwh_today: f64,
    pub cumulative_pv_kwh_today: f64,
    pub temperature_now_c: f64,

    // --- Per-minute vectors (one entry per STEP_MINUTES slot) ---
    pub rate_import: Vec<f64>,
    pub rate_export: Vec<f64>,
    pub pv_central: Vec<f64>,
    pub pv_p10: Vec<f64>,
    pub load: Vec<f64>,
    pub carbon_intensity: Vec<f64>,
    pub battery_temperature: Vec<f64>,
    pub alert_keep: Vec<f64>,

    // --- Curves ---
    pub charge_power_curve: PowerCurve,
    pub discharge_power_curve: PowerCurve,
    pub temp_charge_curve: TemperatureCurve,
    pub temp_discharge_curve: TemperatureCurve,

    // --- Car state ---
    pub cars: Vec<CarState>,

    // --- Toggles ---
    pub toggles: Toggles,

    // --- Time grid ---
    pub minutes_now: u32,
    pub forecast_minutes: u32,
}

impl InputBundle {
    /// Number of `STEP_MINUTES` slots spanned by the per-minute vectors.
    pub fn slot_count(&self) -> usize {
        ((self.minutes_now + self.forecast_minutes) / STEP_MINUTES) as usize
    }

    /// Pre-flight validation run once per bundle (`spec.md` §7 `BadInput`):
    /// missing/NaN vector entries, non-monotonic time, non-positive
    /// `soc_max`, negative rates.
    pub fn validate(&self) -> Result<()> {
        if self.soc_max_kwh <= 0.0 {
            return Err(PlanError::BadInput("soc_max must be > 0".into()));
        }
        if self.reserve_min_kwh < 0.0 || self.reserve_min_kwh > self.soc_max_kwh {
            return Err(PlanError::BadInput(
                "reserve_min must be within [0, soc_max]".into(),
            ));
        }
        if self.battery_loss <= 0.0
            || self.battery_loss > 1.0
            || self.battery_loss_discharge <= 0.0
            || self.battery_loss_discharge > 1.0
        {
            return Err(PlanError::BadInput(
                "battery_loss factors must be in (0, 1]".into(),
            ));
        }
        if self.inverter_loss_factor <= 0.0 || self.inverter_loss_factor > 1.0 {
            return Err(PlanError::BadInput(
                "inverter_loss_factor must be in (0, 1]".into(),
            ));
        }

        let expected_len = self.slot_count();
        let vectors: [(&str, &Vec<f64>); 7] = [
            ("rate_import", &self.rate_import),
            ("rate_export", &self.rate_export),
            ("pv_central", &self.pv_central),
            ("pv_p10", &self.pv_p10),
            ("load", &self.load),
            ("carbon_intensity", &self.carbon_intensity),
            ("battery_temperature", &self.battery_temperature),
        ];
        for (name, vector) in vectors {
            if vector.len() != expected_len {
                return Err(PlanError::BadInput(format!(
                    "{name} has length {} but expected {expected_len}",
                    vector.len()
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(PlanError::BadInput(format!("{name} contains NaN/infinite values")));
            }
        }
        if self.rate_import.iter().any(|&v| v < 0.0) || self.rate_export.iter().any(|&v| v < 0.0) {
            return Err(PlanError::BadInput("rate vectors must be non-negative".into()));
        }
        if self.load.iter().any(|&v| v < 0.0) {
            return Err(PlanError::BadInput("load must be non-negative".into()));
        }
        if self.minutes_now % STEP_MINUTES != 0 || self.forecast_minutes % STEP_MINUTES != 0 {
            return Err(PlanError::BadInput(
                "minutes_now and forecast_minutes must be multiples of STEP_MINUTES".into(),
            ));
        }
        if self.forecast_minutes < 1440 {
            return Err(PlanError::BadInput(
                "forecast_minutes must cover at least one day".into(),
            ));
        }
        Ok(())
    }
}
