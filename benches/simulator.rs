//! Benchmarks the simulator hot loop (`spec.md` §4.2), since it runs
//! thousands of times per plan under the optimiser's passes (§4.5) and its
//! per-call cost sets the realistic bound on how many candidates a plan
//! deadline can afford.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use wattplan::domain::input::{InputBundle, PowerCurve, TemperatureCurve, Toggles};
use wattplan::domain::result::Scenario;
use wattplan::domain::schedule::{Schedule, Window};
use wattplan::simulator::{simulate, KeepMarginParams, RateSelection};

fn bundle(slots: usize) -> InputBundle {
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
        rate_import: vec![0.30; slots],
        rate_export: vec![0.10; slots],
        pv_central: vec![0.5; slots],
        pv_p10: vec![0.2; slots],
        load: vec![0.2; slots],
        carbon_intensity: vec![100.0; slots],
        battery_temperature: vec![20.0; slots],
        alert_keep: vec![0.0; slots],
        charge_power_curve: PowerCurve::flat(),
        discharge_power_curve: PowerCurve::flat(),
        temp_charge_curve: TemperatureCurve::unbounded(),
        temp_discharge_curve: TemperatureCurve::unbounded(),
        cars: vec![],
        toggles: Toggles::default(),
        minutes_now: 0,
        forecast_minutes: (slots as u32) * 5,
    }
}

fn schedule_with_windows(n: usize) -> Schedule {
    let mut schedule = Schedule::empty();
    let span = 1440 / (n as u32 + 1);
    for i in 0..n {
        let start = span * (i as u32);
        let end = start + span / 2;
        schedule.charge_windows.push(Window::new(start, end));
        schedule.charge_limits.push(8.0);
    }
    schedule
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate_one_day");
    for window_count in [0usize, 1, 4, 16] {
        let input = bundle(288);
        let schedule = schedule_with_windows(window_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(window_count),
            &window_count,
            |b, _| {
                b.iter(|| {
                    simulate(
                        black_box(&input),
                        black_box(&schedule),
                        Scenario::Central,
                        1440,
                        5,
                        KeepMarginParams { best_soc_keep_kwh: 0.0, best_soc_keep_weight: 0.0 },
                        RateSelection::TargetDirect,
                    )
                    .unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_find_charge_rate_step(c: &mut Criterion) {
    let input = bundle(288);
    let schedule = schedule_with_windows(1);
    c.bench_function("simulate_with_find_charge_rate", |b| {
        b.iter(|| {
            simulate(
                black_box(&input),
                black_box(&schedule),
                Scenario::Central,
                1440,
                5,
                KeepMarginParams { best_soc_keep_kwh: 0.0, best_soc_keep_weight: 0.0 },
                RateSelection::FindChargeRate { margin_minutes: 15 },
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_simulate, bench_find_charge_rate_step);
criterion_main!(benches);
