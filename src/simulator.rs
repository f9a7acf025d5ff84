//! The simulator (C3, `spec.md` §4.2): a deterministic minute-resolution
//! forward simulator. This is the hot loop — invoked thousands of times per
//! plan by the optimiser, always over the same immutable `InputBundle`.
//!
//! Grounded on the teacher's `power_flow::model::PowerFlowModel::compute_flows`
//! step-by-step decision structure (house priority, battery decision,
//! inverter/export clipping, power-balance check), generalised from a
//! single real-time snapshot into a forward-looking minute loop over a
//! schedule.

use crate::constants::{self, KEEP_MARGIN_RAMP_END_MINUTE};
use crate::domain::battery::{charge_rate_at, discharge_rate_at, find_charge_rate};
use crate::domain::input::InputBundle;
use crate::domain::result::{CarResult, Scenario, SimResult};
use crate::domain::schedule::Schedule;
use crate::error::{PlanError, Result};

/// Operator-tunable keep-margin parameters threaded through from
/// configuration (`spec.md` §6 `best_soc_keep`).
#[derive(Debug, Clone, Copy)]
pub struct KeepMarginParams {
    pub best_soc_keep_kwh: f64,
    pub best_soc_keep_weight: f64,
}

/// Whether the final accepted schedule's rate should be chosen via
/// `find_charge_rate` (`spec.md` §4.2 step 4 "Charging": "pick rate via
/// find_charge_rate only for the final accepted schedule; for exploratory
/// simulations use the target rate directly").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSelection {
    TargetDirect,
    FindChargeRate { margin_minutes: u32 },
}

/// `simulate(I, S, scenario, end_record, step) -> SimResult` (`spec.md` §4.2).
pub fn simulate(
    input: &InputBundle,
    schedule: &Schedule,
    scenario: Scenario,
    end_record_minute: u32,
    step_minutes: u32,
    keep_margin: KeepMarginParams,
    rate_selection: RateSelection,
) -> Result<SimResult> {
    input.validate()?;
    if step_minutes == 0 || step_minutes % constants::STEP_MINUTES != 0 {
        return Err(PlanError::BadInput(
            "step must be a positive multiple of STEP_MINUTES".into(),
        ));
    }

    let pv = match scenario {
        Scenario::Central => &input.pv_central,
        Scenario::P10 => &input.pv_p10,
    };

    let mut soc_kwh = input.soc_now_kwh;
    let mut forced_export_triggered = false;
    let mut car_soc_kwh: Vec<f64> = input.cars.iter().map(|car| car.soc_now_kwh).collect();

    let mut final_metric = 0.0f64;
    let mut import_kwh_battery = 0.0f64;
    let mut import_kwh_house = 0.0f64;
    let mut export_kwh = 0.0f64;
    let mut battery_cycle_kwh = 0.0f64;
    let mut metric_keep = 0.0f64;
    let mut carbon_g = 0.0f64;
    let mut clipped_today_kwh = 0.0f64;
    let mut soc_min_kwh = soc_kwh;
    let mut soc_min_minute = 0u32;

    let slot_count = input.slot_count();
    let mut predict_soc = Vec::with_capacity(slot_count);

    let mut minute = 0u32;
    while minute < input.forecast_minutes {
        let slot = (minute / constants::STEP_MINUTES) as usize;
        if slot >= slot_count {
            break;
        }

        let charge_idx = schedule.charge_window_at(minute);
        let export_idx = schedule.export_window_at(minute);
        let soc_pct = soc_kwh / input.soc_max_kwh * 100.0;
        let temperature_c = input.battery_temperature[slot];

        // Car charging (`spec.md` §3 "Car state"): each car's planned
        // per-minute charge draws from the house load independently of the
        // battery's own charge/export windows, capped by its remaining
        // headroom to `target_limit_kwh`/`battery_size_kwh`.
        let mut car_draw_kw = 0.0f64;
        for (car, car_soc) in input.cars.iter().zip(car_soc_kwh.iter_mut()) {
            let planned_kw = car.planned_charge_kw.get(slot).copied().unwrap_or(0.0).max(0.0);
            let headroom_kwh =
                (car.target_limit_kwh.min(car.battery_size_kwh) - *car_soc).max(0.0);
            let wanted_kwh = (planned_kw * step_minutes as f64 / 60.0).min(headroom_kwh);
            *car_soc += wanted_kwh;
            car_draw_kw += wanted_kwh / (step_minutes as f64 / 60.0);
        }

        // Step 2: resolve rates for this tick.
        let mut charge_rate_setting_kw = if charge_idx.is_some() && input.toggles.set_charge_window {
            input.battery_rate_max_charge_kw
        } else {
            0.0
        };
        let mut discharge_rate_setting_kw =
            if export_idx.is_some() && input.toggles.set_export_window {
                input.battery_rate_max_discharge_kw
            } else {
                0.0
            };

        if let Some(idx) = export_idx {
            if input.toggles.set_export_freeze && schedule.export_limits[idx] == 99.0 {
                charge_rate_setting_kw = 0.0;
            }
        }
        if let Some(idx) = charge_idx {
            let target_kwh = schedule.charge_limits[idx];
            let within_one_pct = (soc_kwh - target_kwh).abs() <= input.soc_max_kwh * 0.01;
            if !input.toggles.set_discharge_during_charge || within_one_pct {
                discharge_rate_setting_kw = 0.0;
            }
        }

        // Step 4: decide battery_draw (positive = discharge). An export
        // window only overrides charging/ECO while it is actually in force
        // (limit < 100); `export_limits[k] == 100` is "window disabled" and
        // must fall through exactly like no export window at all, distinct
        // from a freeze (99) or an as-yet-unreached floor, both of which
        // hold SOC rather than handing the tick to charging/ECO.
        let mut battery_draw_kw;
        let export_floor_pct = export_idx.map(|idx| schedule.export_limits[idx]);
        let export_window_active = export_floor_pct.map_or(false, |floor_pct| floor_pct < 100.0);

        if export_window_active {
            let floor_pct = export_floor_pct.expect("export_window_active implies Some");
            if floor_pct < 99.0 && soc_pct > floor_pct {
                let floor_kwh = floor_pct / 100.0 * input.soc_max_kwh;
                let capped = discharge_rate_at(
                    soc_pct,
                    discharge_rate_setting_kw,
                    input.battery_rate_max_discharge_kw,
                    &input.discharge_power_curve,
                    temperature_c,
                    &input.temp_discharge_curve,
                    0.0,
                );
                let max_energy_kwh = (soc_kwh - floor_kwh).max(0.0);
                let wanted_kwh = (capped * step_minutes as f64 / 60.0).min(max_energy_kwh);
                battery_draw_kw = wanted_kwh / (step_minutes as f64 / 60.0);
                battery_draw_kw = battery_draw_kw.min(input.export_limit_kw);
                battery_draw_kw = battery_draw_kw.min(input.inverter_ac_limit_kw);
                forced_export_triggered = true;
            } else {
                // Freeze, or SOC not yet above the floor: hold SOC.
                battery_draw_kw = 0.0;
            }
        } else if let Some(idx) = charge_idx {
            let target_kwh = schedule.charge_limits[idx];
            if soc_kwh < target_kwh {
                let window = schedule.charge_windows[idx];
                let rate_kw = match rate_selection {
                    RateSelection::TargetDirect => charge_rate_setting_kw,
                    RateSelection::FindChargeRate { margin_minutes } => {
                        let elapsed = minute.saturating_sub(window.start_min);
                        let remaining_window = window.len_minutes().saturating_sub(elapsed);
                        find_charge_rate(
                            soc_kwh,
                            target_kwh,
                            input.soc_max_kwh,
                            remaining_window,
                            margin_minutes,
                            step_minutes,
                            input.battery_rate_max_charge_kw,
                            input.battery_loss,
                            &input.charge_power_curve,
                            temperature_c,
                            &input.temp_charge_curve,
                            None,
                        )
                        .rate_kw
                    }
                };
                let capped = charge_rate_at(
                    soc_pct,
                    rate_kw,
                    input.battery_rate_max_charge_kw,
                    &input.charge_power_curve,
                    temperature_c,
                    &input.temp_charge_curve,
                    0.0,
                );
                let headroom_kwh = (target_kwh - soc_kwh).max(0.0);
                let wanted_kwh = (capped * step_minutes as f64 / 60.0).min(headroom_kwh);
                battery_draw_kw = -(wanted_kwh / (step_minutes as f64 / 60.0));

                // Import-to-top-up (`spec.md` §4.2 step 4 "Charging"): a
                // curve/temperature cap or a quantised `find_charge_rate`
                // step can leave the window's closing tick short of
                // `target_kwh`. Fold the shortfall into `metric_keep` as
                // the cost of the grid top-up still needed to reach it.
                let window_closing = minute + step_minutes >= window.end_min;
                let projected_soc_kwh = soc_kwh + wanted_kwh;
                if window_closing && projected_soc_kwh < target_kwh - 1e-9 {
                    let shortfall_kwh = target_kwh - projected_soc_kwh;
                    let topup_penalty = shortfall_kwh * input.rate_import[slot];
                    metric_keep += topup_penalty;
                    if minute < end_record_minute {
                        final_metric += topup_penalty;
                    }
                }
            } else {
                battery_draw_kw = 0.0;
            }
        } else {
            // ECO mode.
            let load_kw = input.load[slot] / (step_minutes as f64 / 60.0) + car_draw_kw;
            let pv_kw = pv[slot] / (step_minutes as f64 / 60.0);
            let wanted_kw = load_kw - pv_kw;
            let headroom_to_max_kwh = (input.soc_max_kwh - soc_kwh).max(0.0);
            let headroom_to_min_kwh = (soc_kwh - 0.0).max(0.0);
            let capped_discharge_kw = discharge_rate_at(
                soc_pct,
                input.battery_rate_max_discharge_kw,
                input.battery_rate_max_discharge_kw,
                &input.discharge_power_curve,
                temperature_c,
                &input.temp_discharge_curve,
                0.0,
            );
            let capped_charge_kw = charge_rate_at(
                soc_pct,
                input.battery_rate_max_charge_kw,
                input.battery_rate_max_charge_kw,
                &input.charge_power_curve,
                temperature_c,
                &input.temp_charge_curve,
                0.0,
            );
            battery_draw_kw = if wanted_kw >= 0.0 {
                let max_kw = (headroom_to_min_kwh / (step_minutes as f64 / 60.0)).min(capped_discharge_kw);
                wanted_kw.min(max_kw)
            } else {
                let max_kw = (headroom_to_max_kwh / (step_minutes as f64 / 60.0)).min(capped_charge_kw);
                wanted_kw.max(-max_kw)
            };
        }

        // Step 5/6: loss model + inverter/export clipping (simplified to the
        // scalar-balance form the spec's energy-balance equation needs).
        let pv_kw = pv[slot] / (step_minutes as f64 / 60.0);
        let load_kw = input.load[slot] / (step_minutes as f64 / 60.0) + car_draw_kw;
        let battery_ac_kw = if battery_draw_kw >= 0.0 {
            battery_draw_kw * input.inverter_loss_factor
        } else if input.hybrid {
            battery_draw_kw
        } else {
            battery_draw_kw / input.inverter_loss_factor
        };
        let in_scoring_horizon = minute < end_record_minute;

        // Step 7: energy balance for the slot. `end_record` (spec.md §4.2)
        // limits which minutes contribute to returned cost/energy totals;
        // SOC still advances past it so later minutes influence `soc_min`.
        let battery_dc_kwh = battery_draw_kw * step_minutes as f64 / 60.0;
        let battery_balance_kwh = battery_ac_kw * step_minutes as f64 / 60.0;
        let mut pv_ac_kwh = pv_kw * step_minutes as f64 / 60.0;
        let load_kwh = load_kw * step_minutes as f64 / 60.0;

        // Residual export is clipped by whichever of the inverter AC limit
        // or the export limit binds tighter; the curtailed solar is dropped
        // from `pv_ac_kwh` itself (not redirected into the battery) so the
        // balance below stays exact, matching the PV-clipping scenario's
        // "SOC unchanged" expectation (`spec.md` §8 scenario 4).
        let export_wanted_kwh = (battery_balance_kwh + pv_ac_kwh - load_kwh).max(0.0);
        let export_cap_kwh =
            input.inverter_ac_limit_kw.min(input.export_limit_kw) * step_minutes as f64 / 60.0;
        if export_wanted_kwh > export_cap_kwh {
            let clip_kwh = export_wanted_kwh - export_cap_kwh;
            pv_ac_kwh -= clip_kwh;
            if in_scoring_horizon {
                clipped_today_kwh += clip_kwh;
            }
        }

        let diff_kwh = load_kwh - battery_balance_kwh - pv_ac_kwh;

        if in_scoring_horizon {
            if diff_kwh > 0.0 {
                let import_cost = diff_kwh * input.rate_import[slot];
                final_metric += import_cost;
                if battery_balance_kwh > 0.0 {
                    import_kwh_battery += diff_kwh.min(battery_balance_kwh);
                    import_kwh_house += (diff_kwh - battery_balance_kwh).max(0.0);
                } else {
                    import_kwh_house += diff_kwh;
                }
                carbon_g += diff_kwh * input.carbon_intensity[slot];
            } else {
                let export_energy_kwh = -diff_kwh;
                export_kwh += export_energy_kwh;
                final_metric -= export_energy_kwh * input.rate_export[slot];
                carbon_g -= export_energy_kwh * input.carbon_intensity[slot];
            }
        }

        // Step 8: update SOC. Uses the raw DC throughput (`battery_dc_kwh`),
        // not the AC-converted `battery_balance_kwh` from the grid balance
        // above — `battery_loss`/`battery_loss_discharge` are the battery's
        // own round-trip losses, distinct from `inverter_loss_factor`'s AC
        // conversion loss already folded into `battery_balance_kwh`.
        if battery_draw_kw > 0.0 {
            soc_kwh -= battery_dc_kwh / input.battery_loss_discharge;
        } else {
            soc_kwh -= battery_dc_kwh * input.battery_loss;
        }
        let mut effective_reserve = input.reserve_min_kwh;
        if input.toggles.set_reserve_enable {
            if let Some(idx) = charge_idx {
                let target_kwh = schedule.charge_limits[idx];
                if soc_kwh >= target_kwh {
                    effective_reserve = target_kwh;
                }
            }
        }
        soc_kwh = soc_kwh.clamp(effective_reserve, input.soc_max_kwh);
        if in_scoring_horizon {
            battery_cycle_kwh += battery_draw_kw.abs() * step_minutes as f64 / 60.0;
        }

        // Step 9: keep-margin penalty.
        let keep_scale = if forced_export_triggered {
            keep_margin.best_soc_keep_weight
        } else {
            (minute as f64 / KEEP_MARGIN_RAMP_END_MINUTE).min(1.0) * keep_margin.best_soc_keep_weight
        };
        let mut keep_scale = keep_scale;
        let alert = input.alert_keep[slot];
        let mut keep_floor = keep_margin.best_soc_keep_kwh;
        if alert > 0.0 {
            keep_floor = keep_floor.max(alert);
            keep_scale = keep_scale.max(2.0);
        }
        if soc_kwh <= keep_floor && in_scoring_horizon {
            let penalty = (keep_floor - soc_kwh) * input.rate_import[slot] * keep_scale * step_minutes as f64 / 60.0;
            metric_keep += penalty;
            final_metric += penalty;
        }
        if in_scoring_horizon && soc_kwh < soc_min_kwh {
            soc_min_kwh = soc_kwh;
            soc_min_minute = minute;
        }

        // Step 10: record the SOC trace for the full horizon.
        predict_soc.push(constants::round_soc(soc_kwh));

        minute += step_minutes;
    }

    let cars = car_soc_kwh
        .into_iter()
        .map(|final_soc_kwh| CarResult { final_soc_kwh })
        .collect();

    Ok(SimResult {
        // Kept at full double precision: the optimiser's acceptance test
        // compares this against `metric_min_improvement` thresholds as low
        // as 0.001, which `round_metric`'s 2-decimal rounding would erase.
        // Rounding for display happens at the presentation boundary instead.
        final_metric,
        import_kwh_battery,
        import_kwh_house,
        export_kwh,
        soc_min_kwh: constants::round_soc(soc_min_kwh),
        soc_min_minute,
        final_soc_kwh: constants::round_soc(soc_kwh),
        battery_cycle_kwh,
        metric_keep,
        iboost_kwh: 0.0,
        carbon_g,
        predict_soc,
        cars,
        forced_export_triggered,
        clipped_today_kwh,
    })
}
