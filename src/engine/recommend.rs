//! Recommendation synthesis.

use crate::engine::result::{StageResult, ALL_CHECKS_PASSED};
use crate::engine::stage::StageSpec;

fn stage_message(spec: Option<&StageSpec>, stage_id: &str) -> String {
    match spec {
        Some(spec) if !spec.recommendation.trim().is_empty() => spec.recommendation.clone(),
        _ => format!("Stage '{}' failed: review the document and resubmit", stage_id),
    }
}

/// Derive remediation guidance from executed stage results.
///
/// One message per failing stage, in pipeline order, without duplicates.
/// A failed gating stage yields only its own message.
pub fn synthesize(results: &[StageResult], specs: &[StageSpec]) -> Vec<String> {
    let spec_for = |id: &str| specs.iter().find(|spec| spec.id == id);

    if let Some(gated) = results
        .iter()
        .find(|r| !r.passed && spec_for(&r.stage_id).is_some_and(|s| s.gating))
    {
        return vec![stage_message(spec_for(&gated.stage_id), &gated.stage_id)];
    }

    let mut messages: Vec<String> = Vec::new();
    for result in results.iter().filter(|r| !r.passed) {
        let message = stage_message(spec_for(&result.stage_id), &result.stage_id);
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    if messages.is_empty() {
        messages.push(ALL_CHECKS_PASSED.to_string());
    }
    messages
}
