//! Judgment aggregation
//!
//! Pure and deterministic: no I/O, no clock reads. Everything time-related
//! arrives through [`AggregationMeta`].
//!
//! Weights are renormalised over the slots that actually succeeded, so the
//! aggregate is always a weighted average of available evidence. Judgments
//! are summed in slot order, never arrival order, which keeps the floating
//! point result identical however the concurrent calls finished.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::VerifyError;
use crate::types::{
    Judgment, JudgmentOutcome, ModelSlot, Provider, ResultMetadata, VerdictLabel,
    VerificationResult,
};

/// Aggregate confidence at or above this is `supported`.
pub const SUPPORTED_THRESHOLD: f64 = 0.66;

/// Aggregate confidence at or below this is `refuted`.
pub const REFUTED_THRESHOLD: f64 = 0.33;

/// Confidence cap when any successful judgment flags a contradiction.
pub const CONTRADICTION_CEILING: f64 = 0.5;

/// Tolerance for the effective weights summing to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Verdict label for a confidence, absent a contradiction.
pub fn label_for_confidence(confidence: f64) -> VerdictLabel {
    if confidence >= SUPPORTED_THRESHOLD {
        VerdictLabel::Supported
    } else if confidence <= REFUTED_THRESHOLD {
        VerdictLabel::Refuted
    } else {
        VerdictLabel::Uncertain
    }
}

/// Request identity and timing carried into the result.
#[derive(Debug, Clone)]
pub struct AggregationMeta {
    pub request_id: Uuid,
    pub claim: String,
    pub preset: String,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// Configured weight for a judgment: the originating slot's, falling back
/// to the weight recorded on the judgment itself.
fn slot_weight(judgment: &Judgment, slots: &[ModelSlot]) -> f64 {
    slots
        .get(judgment.slot_index)
        .map(|s| s.weight)
        .unwrap_or(judgment.slot.weight)
}

/// Effective weights for the successful judgments, as
/// `(slot_index, weight)` pairs in slot order. Empty when nothing succeeded.
pub fn effective_weights(judgments: &[Judgment], slots: &[ModelSlot]) -> Vec<(usize, f64)> {
    let mut succeeded: Vec<(usize, f64)> = judgments
        .iter()
        .filter(|j| j.outcome.is_success())
        .map(|j| (j.slot_index, slot_weight(j, slots)))
        .collect();
    succeeded.sort_by_key(|(index, _)| *index);

    // Scale by the largest weight first so the sum stays finite.
    let max = succeeded.iter().map(|(_, w)| *w).fold(0.0, f64::max);
    if max <= 0.0 || !max.is_finite() {
        return Vec::new();
    }
    let total: f64 = succeeded.iter().map(|(_, w)| w / max).sum();
    succeeded
        .into_iter()
        .map(|(index, w)| (index, w / max / total))
        .collect()
}

/// Combine per-slot judgments into one verdict.
///
/// Fails with [`VerifyError::AllModelsUnavailable`] when no judgment
/// succeeded; a verdict is never synthesised from no evidence.
pub fn combine(
    meta: AggregationMeta,
    mut judgments: Vec<Judgment>,
    slots: &[ModelSlot],
) -> Result<VerificationResult, VerifyError> {
    judgments.sort_by_key(|j| j.slot_index);

    let weights = effective_weights(&judgments, slots);
    if weights.is_empty() {
        return Err(VerifyError::AllModelsUnavailable {
            preset: meta.preset,
            attempted: judgments.len(),
        });
    }

    let succeeded: Vec<&Judgment> = judgments.iter().filter(|j| j.outcome.is_success()).collect();
    let base: f64 = succeeded
        .iter()
        .zip(&weights)
        .filter_map(|(j, (_, w))| j.outcome.assessment().map(|a| w * a.confidence))
        .sum();
    let base = base.clamp(0.0, 1.0);

    let contradiction = succeeded
        .iter()
        .filter_map(|j| j.outcome.assessment())
        .any(|a| a.contradiction);

    let (confidence, verdict) = if contradiction {
        (base.min(CONTRADICTION_CEILING), VerdictLabel::Uncertain)
    } else {
        (base, label_for_confidence(base))
    };

    let mut metadata = ResultMetadata {
        models_succeeded: 0,
        models_failed: 0,
        models_timed_out: 0,
        providers_used: Vec::new(),
        elapsed_ms: meta.elapsed_ms,
    };
    for judgment in &judgments {
        match &judgment.outcome {
            JudgmentOutcome::Success(_) => {
                metadata.models_succeeded += 1;
                metadata.providers_used.push(judgment.slot.provider);
            }
            JudgmentOutcome::Failed { .. } => metadata.models_failed += 1,
            JudgmentOutcome::TimedOut { .. } => metadata.models_timed_out += 1,
        }
    }
    metadata.providers_used.sort();
    metadata.providers_used.dedup();

    let degraded = metadata.models_failed + metadata.models_timed_out > 0;

    Ok(VerificationResult {
        request_id: meta.request_id,
        claim: meta.claim,
        preset: meta.preset,
        judgments,
        confidence,
        verdict,
        degraded,
        contradiction,
        metadata,
        completed_at: meta.completed_at,
    })
}

/// Distinct providers among the given slots, sorted.
pub fn providers_of(slots: &[ModelSlot]) -> Vec<Provider> {
    let mut providers: Vec<Provider> = slots.iter().map(|s| s.provider).collect();
    providers.sort();
    providers.dedup();
    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Assessment, Role};
    use proptest::prelude::*;

    fn meta() -> AggregationMeta {
        AggregationMeta {
            request_id: Uuid::nil(),
            claim: "The Eiffel Tower is in Paris.".to_string(),
            preset: "standard".to_string(),
            elapsed_ms: 42,
            completed_at: Utc::now(),
        }
    }

    fn standard_slots() -> Vec<ModelSlot> {
        vec![
            ModelSlot::new(Provider::Perplexity, "sonar", Role::FactCheck, 0.35),
            ModelSlot::new(
                Provider::Anthropic,
                "claude-sonnet-4-20250514",
                Role::TrustChain,
                0.25,
            ),
            ModelSlot::new(Provider::Openai, "gpt-4o", Role::Reasoning, 0.20),
        ]
    }

    fn judgment(index: usize, slots: &[ModelSlot], outcome: JudgmentOutcome) -> Judgment {
        Judgment {
            slot_index: index,
            slot: slots[index].clone(),
            outcome,
            latency_ms: 10,
            attempts: 1,
        }
    }

    fn success(confidence: f64) -> JudgmentOutcome {
        JudgmentOutcome::Success(Assessment::new(confidence, label_for_confidence(confidence)))
    }

    fn timed_out() -> JudgmentOutcome {
        JudgmentOutcome::TimedOut {
            error: "deadline".to_string(),
        }
    }

    fn failed() -> JudgmentOutcome {
        JudgmentOutcome::Failed {
            error: "401".to_string(),
        }
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(label_for_confidence(0.66), VerdictLabel::Supported);
        assert_eq!(label_for_confidence(0.33), VerdictLabel::Refuted);
        assert_eq!(label_for_confidence(0.5), VerdictLabel::Uncertain);
        assert_eq!(label_for_confidence(0.6599), VerdictLabel::Uncertain);
        assert_eq!(label_for_confidence(0.3301), VerdictLabel::Uncertain);
    }

    #[test]
    fn test_both_succeed_weighted_average() {
        let slots = &standard_slots()[..2];
        let judgments = vec![
            judgment(0, slots, success(0.9)),
            judgment(1, slots, success(0.8)),
        ];
        let weights = effective_weights(&judgments, slots);
        assert!((weights[0].1 - 0.35 / 0.6).abs() < 1e-12);
        assert!((weights[1].1 - 0.25 / 0.6).abs() < 1e-12);

        let result = combine(meta(), judgments, slots).unwrap();
        assert!((result.confidence - 0.858_333_333).abs() < 1e-6);
        assert_eq!(result.verdict, VerdictLabel::Supported);
        assert!(!result.degraded);
        assert!(!result.contradiction);
        assert_eq!(result.metadata.models_succeeded, 2);
        assert_eq!(
            result.metadata.providers_used,
            vec![Provider::Anthropic, Provider::Perplexity]
        );
    }

    #[test]
    fn test_huge_weights_still_normalise() {
        let slots = vec![
            ModelSlot::new(Provider::Perplexity, "sonar", Role::FactCheck, f64::MAX),
            ModelSlot::new(Provider::Openai, "gpt-4o", Role::Reasoning, f64::MAX),
        ];
        let judgments = vec![
            judgment(0, &slots, success(0.9)),
            judgment(1, &slots, success(0.9)),
        ];
        let weights = effective_weights(&judgments, &slots);
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((weights[0].1 - 0.5).abs() < 1e-12);

        let result = combine(meta(), judgments, &slots).unwrap();
        assert!((result.confidence - 0.9).abs() < 1e-9);
        assert_eq!(result.verdict, VerdictLabel::Supported);
    }

    #[test]
    fn test_timeout_renormalises_and_degrades() {
        let slots = &standard_slots()[..2];
        let judgments = vec![
            judgment(0, slots, success(0.9)),
            judgment(1, slots, timed_out()),
        ];
        let result = combine(meta(), judgments, slots).unwrap();
        assert!((result.confidence - 0.9).abs() < 1e-12);
        assert_eq!(result.verdict, VerdictLabel::Supported);
        assert!(result.degraded);
        assert_eq!(result.metadata.models_timed_out, 1);
        assert_eq!(result.judgments.len(), 2);
    }

    #[test]
    fn test_contradiction_caps_and_forces_uncertain() {
        let slots = standard_slots();
        let flagged = JudgmentOutcome::Success(
            Assessment::new(0.95, VerdictLabel::Supported).with_contradiction(),
        );
        let judgments = vec![
            judgment(0, &slots, success(0.9)),
            judgment(1, &slots, success(0.92)),
            judgment(2, &slots, flagged),
        ];
        let result = combine(meta(), judgments, &slots).unwrap();
        assert!(result.confidence <= CONTRADICTION_CEILING);
        assert_eq!(result.verdict, VerdictLabel::Uncertain);
        assert!(result.contradiction);
        assert!(!result.degraded);
    }

    #[test]
    fn test_contradiction_keeps_lower_confidence() {
        let slots = standard_slots();
        let flagged =
            JudgmentOutcome::Success(Assessment::new(0.1, VerdictLabel::Refuted).with_contradiction());
        let judgments = vec![
            judgment(0, &slots, success(0.2)),
            judgment(2, &slots, flagged),
        ];
        let result = combine(meta(), judgments, &slots).unwrap();
        assert!(result.confidence < 0.2);
        assert_eq!(result.verdict, VerdictLabel::Uncertain);
    }

    #[test]
    fn test_nothing_succeeded_is_error() {
        let slots = &standard_slots()[..2];
        let judgments = vec![judgment(0, slots, failed()), judgment(1, slots, timed_out())];
        let err = combine(meta(), judgments, slots).unwrap_err();
        assert_eq!(
            err,
            VerifyError::AllModelsUnavailable {
                preset: "standard".to_string(),
                attempted: 2,
            }
        );
    }

    #[test]
    fn test_low_confidence_not_degraded() {
        let slots = &standard_slots()[..2];
        let judgments = vec![
            judgment(0, slots, success(0.1)),
            judgment(1, slots, success(0.2)),
        ];
        let result = combine(meta(), judgments, slots).unwrap();
        assert_eq!(result.verdict, VerdictLabel::Refuted);
        assert!(!result.degraded);
    }

    #[test]
    fn test_judgments_returned_in_slot_order() {
        let slots = standard_slots();
        let judgments = vec![
            judgment(2, &slots, failed()),
            judgment(0, &slots, success(0.7)),
            judgment(1, &slots, success(0.7)),
        ];
        let result = combine(meta(), judgments, &slots).unwrap();
        let order: Vec<usize> = result.judgments.iter().map(|j| j.slot_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(result.metadata.models_failed, 1);
    }

    #[test]
    fn test_providers_of_dedups() {
        let mut slots = standard_slots();
        slots.push(ModelSlot::new(Provider::Openai, "gpt-4o-mini", Role::FactCheck, 0.1));
        assert_eq!(
            providers_of(&slots),
            vec![Provider::Openai, Provider::Anthropic, Provider::Perplexity]
        );
    }

    fn arb_outcome() -> impl Strategy<Value = JudgmentOutcome> {
        prop_oneof![
            3 => (0.0f64..=1.0, any::<bool>()).prop_map(|(c, flag)| {
                let mut a = Assessment::new(c, label_for_confidence(c));
                a.contradiction = flag;
                JudgmentOutcome::Success(a)
            }),
            1 => Just(failed()),
            1 => Just(timed_out()),
        ]
    }

    fn arb_case() -> impl Strategy<Value = (Vec<ModelSlot>, Vec<JudgmentOutcome>)> {
        prop::collection::vec((0.01f64..10.0, arb_outcome()), 1..8).prop_map(|pairs| {
            let slots = pairs
                .iter()
                .map(|(w, _)| ModelSlot::new(Provider::Openai, "gpt-4o", Role::Reasoning, *w))
                .collect();
            let outcomes = pairs.into_iter().map(|(_, o)| o).collect();
            (slots, outcomes)
        })
    }

    fn build(slots: &[ModelSlot], outcomes: &[JudgmentOutcome]) -> Vec<Judgment> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| judgment(i, slots, o.clone()))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_effective_weights_sum_to_one((slots, outcomes) in arb_case()) {
            let judgments = build(&slots, &outcomes);
            let weights = effective_weights(&judgments, &slots);
            if outcomes.iter().any(|o| o.is_success()) {
                let total: f64 = weights.iter().map(|(_, w)| w).sum();
                prop_assert!((total - 1.0).abs() < WEIGHT_TOLERANCE);
            } else {
                prop_assert!(weights.is_empty());
            }
        }

        #[test]
        fn prop_contradiction_ceiling_holds((slots, outcomes) in arb_case()) {
            let judgments = build(&slots, &outcomes);
            let flagged = outcomes
                .iter()
                .filter_map(|o| o.assessment())
                .any(|a| a.contradiction);
            if let Ok(result) = combine(meta(), judgments, &slots) {
                prop_assert!((0.0..=1.0).contains(&result.confidence));
                if flagged {
                    prop_assert!(result.confidence <= CONTRADICTION_CEILING);
                    prop_assert_eq!(result.verdict, VerdictLabel::Uncertain);
                }
                let any_unsuccessful = outcomes.iter().any(|o| !o.is_success());
                prop_assert_eq!(result.degraded, any_unsuccessful);
            }
        }

        #[test]
        fn prop_arrival_order_is_irrelevant(
            (slots, outcomes) in arb_case(),
            seed in any::<u64>(),
        ) {
            let judgments = build(&slots, &outcomes);
            let mut shuffled = judgments.clone();
            // Deterministic rotation plus reversal stands in for arrival order.
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }

            let a = combine(meta(), judgments, &slots);
            let b = combine(meta(), shuffled, &slots);
            match (a, b) {
                (Ok(a), Ok(b)) => {
                    prop_assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());
                    prop_assert_eq!(a.verdict, b.verdict);
                    prop_assert_eq!(a.degraded, b.degraded);
                    prop_assert_eq!(a.judgments, b.judgments);
                }
                (Err(a), Err(b)) => prop_assert_eq!(a, b),
                _ => prop_assert!(false, "outcome differs with arrival order"),
            }
        }
    }
}
