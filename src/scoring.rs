//! Scoring (C7, `spec.md` §4.6): the composite metric the optimiser
//! compares candidate schedules by, plus the optional p10-scenario blend
//! and the tie-break rules used by the hill-climbing passes (`spec.md`
//! §4.5).

use ordered_float::OrderedFloat;

use crate::domain::result::SimResult;

#[derive(Debug, Clone, Copy)]
pub struct ScoringParams {
    pub metric_battery_cycle: f64,
    pub pv_metric10_weight: f64,
}

/// `score = final_metric − export_revenue + metric_keep + cycle_penalty`
/// (`spec.md` §4.6). `final_metric` already folds in cost vs revenue and
/// `metric_keep`, so only the cycle penalty is added here; export revenue
/// has already been subtracted inside `final_metric` by the simulator.
pub fn score(result: &SimResult, params: &ScoringParams) -> f64 {
    result.final_metric + result.battery_cycle_kwh * params.metric_battery_cycle
}

/// Blends the central-scenario score with the p10-scenario score
/// (`spec.md` §4.6 "10%-scenario blend"): discourages plans that rely on
/// optimistic solar.
pub fn blended_score(central: &SimResult, p10: &SimResult, params: &ScoringParams) -> f64 {
    let score_central = score(central, params);
    let score_p10 = score(p10, params);
    let w = params.pv_metric10_weight;
    (1.0 - w) * score_central + w * score_p10
}

/// Tie-break key for the hill-climber (`spec.md` §4.5): lower
/// `battery_cycle_kwh`, then higher `soc_min`, then lexicographic limits.
/// Lower keys win — wrap schedule limits as `OrderedFloat` to keep the
/// comparison total despite NaN-free f64 data.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct TieBreakKey {
    pub battery_cycle_kwh: OrderedFloat<f64>,
    pub neg_soc_min_kwh: OrderedFloat<f64>,
    pub limits: Vec<OrderedFloat<f64>>,
}

impl TieBreakKey {
    pub fn from_result(result: &SimResult, limits: &[f64]) -> Self {
        Self {
            battery_cycle_kwh: OrderedFloat(result.battery_cycle_kwh),
            neg_soc_min_kwh: OrderedFloat(-result.soc_min_kwh),
            limits: limits.iter().copied().map(OrderedFloat).collect(),
        }
    }
}

/// Decides whether `candidate` should replace `current` under a hill-climb
/// step: accept strictly better scores, and on a (near-)tie defer to the
/// tie-break key (`spec.md` §4.5).
pub fn accepts(
    candidate_score: f64,
    current_score: f64,
    min_improvement: f64,
    candidate_tie_break: &TieBreakKey,
    current_tie_break: &TieBreakKey,
) -> bool {
    if current_score - candidate_score > min_improvement {
        true
    } else if (current_score - candidate_score).abs() <= min_improvement {
        candidate_tie_break
            .partial_cmp(current_tie_break)
            .map(|ord| ord.is_lt())
            .unwrap_or(false)
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::CarResult;

    fn result(final_metric: f64, cycle: f64, soc_min: f64) -> SimResult {
        SimResult {
            final_metric,
            import_kwh_battery: 0.0,
            import_kwh_house: 0.0,
            export_kwh: 0.0,
            soc_min_kwh: soc_min,
            soc_min_minute: 0,
            final_soc_kwh: 0.0,
            battery_cycle_kwh: cycle,
            metric_keep: 0.0,
            iboost_kwh: 0.0,
            carbon_g: 0.0,
            predict_soc: vec![],
            cars: Vec::<CarResult>::new(),
            forced_export_triggered: false,
            clipped_today_kwh: 0.0,
        }
    }

    #[test]
    fn score_adds_cycle_penalty() {
        let r = result(10.0, 2.0, 5.0);
        let params = ScoringParams { metric_battery_cycle: 0.5, pv_metric10_weight: 0.0 };
        assert_eq!(score(&r, &params), 11.0);
    }

    #[test]
    fn blended_score_weights_p10() {
        let central = result(10.0, 0.0, 5.0);
        let p10 = result(20.0, 0.0, 5.0);
        let params = ScoringParams { metric_battery_cycle: 0.0, pv_metric10_weight: 0.25 };
        assert_eq!(blended_score(&central, &p10, &params), 12.5);
    }

    #[test]
    fn accepts_strictly_better_score() {
        let current = TieBreakKey::from_result(&result(0.0, 1.0, 2.0), &[1.0]);
        let candidate = TieBreakKey::from_result(&result(0.0, 1.0, 2.0), &[1.0]);
        assert!(accepts(5.0, 10.0, 0.1, &candidate, &current));
    }

    #[test]
    fn rejects_worse_score() {
        let current = TieBreakKey::from_result(&result(0.0, 1.0, 2.0), &[1.0]);
        let candidate = TieBreakKey::from_result(&result(0.0, 1.0, 2.0), &[1.0]);
        assert!(!accepts(11.0, 10.0, 0.1, &candidate, &current));
    }

    #[test]
    fn tie_break_prefers_lower_cycle_kwh() {
        let current = TieBreakKey::from_result(&result(0.0, 3.0, 2.0), &[1.0]);
        let candidate = TieBreakKey::from_result(&result(0.0, 1.0, 2.0), &[1.0]);
        assert!(accepts(10.0, 10.0, 0.1, &candidate, &current));
    }
}
