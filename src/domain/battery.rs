//! Battery model (C2, `spec.md` §4.1): the three pure rate functions plus
//! the low-power charge-rate search.
//!
//! Grounded on the teacher's `Battery`/`SimulatedBattery` efficiency-aware
//! AC↔DC conversion and degradation modelling, reshaped into pure
//! functions over curve data rather than an async device abstraction —
//! register-level battery control stays out of the core (`spec.md` §1).

use crate::constants::CHARGE_RATE_SWEEP_STEP_W;
use crate::domain::input::{PowerCurve, TemperatureCurve};

/// `charge_rate_at(soc, setting)` (`spec.md` §4.1): clamp `setting` by the
/// SOC-indexed charge curve, then by the temperature cap, then floor by
/// `battery_rate_min`.
pub fn charge_rate_at(
    soc_pct: f64,
    setting_kw: f64,
    max_rate_kw: f64,
    curve: &PowerCurve,
    temperature_c: f64,
    temp_curve: &TemperatureCurve,
    battery_rate_min_kw: f64,
) -> f64 {
    let curve_capped = setting_kw.min(max_rate_kw * curve.at(soc_pct));
    let temp_cap_kwh_per_min = temp_curve.cap_at(temperature_c);
    let temp_cap_kw = if temp_cap_kwh_per_min.is_finite() {
        temp_cap_kwh_per_min * 60.0
    } else {
        f64::INFINITY
    };
    curve_capped.min(temp_cap_kw).max(battery_rate_min_kw)
}

/// `discharge_rate_at(soc, setting)` (`spec.md` §4.1): symmetric with
/// `charge_rate_at` using the discharge curve.
pub fn discharge_rate_at(
    soc_pct: f64,
    setting_kw: f64,
    max_rate_kw: f64,
    curve: &PowerCurve,
    temperature_c: f64,
    temp_curve: &TemperatureCurve,
    battery_rate_min_kw: f64,
) -> f64 {
    charge_rate_at(
        soc_pct,
        setting_kw,
        max_rate_kw,
        curve,
        temperature_c,
        temp_curve,
        battery_rate_min_kw,
    )
}

/// Outcome of `find_charge_rate` (`spec.md` §4.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeRatePlan {
    pub rate_kw: f64,
    /// Whether the window can actually reach the target before the margin
    /// deadline at the returned rate.
    pub reaches_target: bool,
}

/// Low-power charge-rate search (`spec.md` §4.1 `find_charge_rate`): given a
/// window `[now, end]`, a target SOC and the current SOC, pick the smallest
/// rate that still reaches the target by `end - margin`.
///
/// Algorithm, per spec: if the window cannot hit the target at max rate, or
/// the battery is already at/beyond target, return max. Otherwise sweep
/// candidate rates downward from max in `CHARGE_RATE_SWEEP_STEP_W` steps;
/// simulate forward in `step_minutes` slices applying the curve and
/// `battery_loss`; accept the rate that reaches the target before the
/// margin deadline with the lowest peak applied rate. Hysteresis: if
/// `current_rate_kw` is already ≤ the highest achievable rate encountered,
/// retain it to avoid chatter.
#[allow(clippy::too_many_arguments)]
pub fn find_charge_rate(
    soc_now_kwh: f64,
    target_soc_kwh: f64,
    soc_max_kwh: f64,
    window_minutes: u32,
    margin_minutes: u32,
    step_minutes: u32,
    max_rate_kw: f64,
    battery_loss: f64,
    curve: &PowerCurve,
    temperature_c: f64,
    temp_curve: &TemperatureCurve,
    current_rate_kw: Option<f64>,
) -> ChargeRatePlan {
    if soc_now_kwh >= target_soc_kwh {
        return ChargeRatePlan { rate_kw: max_rate_kw, reaches_target: true };
    }
    let deadline_minutes = window_minutes.saturating_sub(margin_minutes);
    if deadline_minutes == 0 {
        return ChargeRatePlan { rate_kw: max_rate_kw, reaches_target: false };
    }

    let reaches = |rate_kw: f64| -> bool {
        let mut soc = soc_now_kwh;
        let mut minute = 0u32;
        while minute < deadline_minutes && soc < target_soc_kwh {
            let soc_pct = soc / soc_max_kwh * 100.0;
            let applied = charge_rate_at(soc_pct, rate_kw, max_rate_kw, curve, temperature_c, temp_curve, 0.0);
            let energy_kwh = applied * step_minutes as f64 / 60.0 * battery_loss;
            soc += energy_kwh;
            minute += step_minutes;
        }
        soc >= target_soc_kwh
    };

    if !reaches(max_rate_kw) {
        return ChargeRatePlan { rate_kw: max_rate_kw, reaches_target: false };
    }

    let mut best_rate_kw = max_rate_kw;
    let step_kw = CHARGE_RATE_SWEEP_STEP_W / 1000.0;
    let mut candidate = max_rate_kw - step_kw;
    while candidate > 0.0 {
        if reaches(candidate) {
            best_rate_kw = candidate;
            candidate -= step_kw;
        } else {
            break;
        }
    }

    if let Some(current) = current_rate_kw {
        if current <= best_rate_kw {
            return ChargeRatePlan { rate_kw: current, reaches_target: true };
        }
    }
    ChargeRatePlan { rate_kw: best_rate_kw, reaches_target: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_curve() -> PowerCurve {
        PowerCurve::flat()
    }

    fn unbounded_temp() -> TemperatureCurve {
        TemperatureCurve::unbounded()
    }

    #[test]
    fn charge_rate_clamped_by_curve() {
        let mut curve = flat_curve();
        curve.fraction[90] = 0.2;
        let rate = charge_rate_at(90.5, 5.0, 5.0, &curve, 20.0, &unbounded_temp(), 0.0);
        assert!((rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn charge_rate_floored_by_min() {
        let curve = flat_curve();
        let rate = charge_rate_at(50.0, 0.05, 5.0, &curve, 20.0, &unbounded_temp(), 0.2);
        assert_eq!(rate, 0.2);
    }

    #[test]
    fn find_charge_rate_returns_max_when_already_at_target() {
        let plan = find_charge_rate(
            10.0, 10.0, 10.0, 480, 30, 5, 3.0, 0.95, &flat_curve(), 20.0, &unbounded_temp(), None,
        );
        assert_eq!(plan.rate_kw, 3.0);
        assert!(plan.reaches_target);
    }

    #[test]
    fn find_charge_rate_returns_max_when_infeasible() {
        let plan = find_charge_rate(
            0.0, 10.0, 10.0, 10, 5, 5, 0.1, 0.95, &flat_curve(), 20.0, &unbounded_temp(), None,
        );
        assert_eq!(plan.rate_kw, 0.1);
        assert!(!plan.reaches_target);
    }

    #[test]
    fn find_charge_rate_picks_lower_rate_for_long_window() {
        // 2 hours to deliver 2kWh at max 3kW needs only ~1kW sustained.
        let plan = find_charge_rate(
            0.0, 2.0, 10.0, 120, 0, 5, 3.0, 1.0, &flat_curve(), 20.0, &unbounded_temp(), None,
        );
        assert!(plan.rate_kw < 3.0);
        assert!(plan.reaches_target);
    }

    #[test]
    fn find_charge_rate_hysteresis_keeps_current_rate() {
        let plan = find_charge_rate(
            0.0, 2.0, 10.0, 120, 0, 5, 3.0, 1.0, &flat_curve(), 20.0, &unbounded_temp(), Some(1.5),
        );
        assert_eq!(plan.rate_kw, 1.5);
    }
}
