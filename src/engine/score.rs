//! Weighted score aggregation.
//!
//! The score is re-normalized over the stages that actually executed, so a
//! stage that never ran neither adds to nor dilutes the result.

use crate::engine::result::StageResult;
use crate::engine::stage::StageSpec;

/// Share of passing outcomes in a stage, 0.0..=100.0. A stage without
/// outcomes scores 0, never 100.
pub fn stage_percentage(result: &StageResult) -> f64 {
    let total = result.outcomes.len();
    if total == 0 {
        return 0.0;
    }
    result.passed_count() as f64 / total as f64 * 100.0
}

/// Aggregate executed stage results into a 0..=100 score.
///
/// Results whose stage id has no spec are ignored.
pub fn aggregate(results: &[StageResult], specs: &[StageSpec]) -> u8 {
    let weighted: Vec<(f64, u32)> = results
        .iter()
        .filter_map(|result| {
            specs
                .iter()
                .find(|spec| spec.id == result.stage_id)
                .map(|spec| (stage_percentage(result), spec.weight))
        })
        .collect();

    let executed_weight: u64 = weighted.iter().map(|(_, w)| u64::from(*w)).sum();
    if executed_weight == 0 {
        return 0;
    }

    let total: f64 = weighted
        .iter()
        .map(|(pct, weight)| pct * f64::from(*weight) / executed_weight as f64)
        .sum();

    total.round().clamp(0.0, 100.0) as u8
}
