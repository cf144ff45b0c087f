//! Verification orchestrator
//!
//! One `verify` call runs a single-shot pipeline:
//!
//! ```text
//! Resolving -> Dispatching -> Awaiting -> Aggregating -> Done | Failed
//! ```
//!
//! Every slot of the resolved preset is spawned as its own task on a
//! [`JoinSet`]. The orchestrator waits for all of them or for the global
//! deadline, whichever comes first. Slots still running at the deadline are
//! cancelled through the shared [`InvocationContext`], aborted, and recorded
//! as timed out. No state survives the call; the catalog is only read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::aggregator::{self, AggregationMeta};
use crate::catalog::{validate_slots, PresetCatalog};
use crate::config::OrchestratorConfig;
use crate::error::VerifyResult;
use crate::invoker::{Invocation, InvocationContext, ModelInvoker};
use crate::types::{
    duration_ms, Judgment, JudgmentOutcome, ModelSlot, ProviderStrategy, VerificationResult,
};

/// Fans a claim out to every slot of a preset and aggregates the answers.
///
/// Cheap to share: hold it in an `Arc` and call `verify` from as many tasks
/// as needed.
pub struct Orchestrator {
    catalog: Arc<PresetCatalog>,
    invoker: Arc<dyn ModelInvoker>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(catalog: Arc<PresetCatalog>, invoker: Arc<dyn ModelInvoker>) -> Self {
        Self {
            catalog,
            invoker,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Verify `claim` with the named preset within `deadline`.
    ///
    /// Fails with `UnknownPreset` before any dispatch, and with
    /// `AllModelsUnavailable` when no slot succeeded.
    pub async fn verify(
        &self,
        claim: &str,
        preset: &str,
        deadline: Duration,
    ) -> VerifyResult<VerificationResult> {
        self.verify_with(claim, preset, ProviderStrategy::Mixed, deadline)
            .await
    }

    /// [`Orchestrator::verify`] with the configured default deadline.
    pub async fn verify_default(
        &self,
        claim: &str,
        preset: &str,
    ) -> VerifyResult<VerificationResult> {
        self.verify(claim, preset, self.config.default_deadline).await
    }

    /// Verify with a provider strategy applied to the preset's slots.
    pub async fn verify_with(
        &self,
        claim: &str,
        preset: &str,
        strategy: ProviderStrategy,
        deadline: Duration,
    ) -> VerifyResult<VerificationResult> {
        let slots = self.catalog.resolve_with(preset, strategy)?;
        self.run(claim, preset, slots, deadline).await
    }

    /// Verify against an ad-hoc slot set instead of a catalog preset.
    ///
    /// The slots are held to the same rules as catalog presets.
    pub async fn verify_slots(
        &self,
        claim: &str,
        label: &str,
        slots: Vec<ModelSlot>,
        deadline: Duration,
    ) -> VerifyResult<VerificationResult> {
        validate_slots(label, &slots)?;
        self.run(claim, label, slots, deadline).await
    }

    async fn run(
        &self,
        claim: &str,
        preset: &str,
        slots: Vec<ModelSlot>,
        deadline: Duration,
    ) -> VerifyResult<VerificationResult> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "verify",
            %request_id,
            preset,
            slots = slots.len(),
            deadline_ms = duration_ms(deadline)
        );
        self.dispatch(request_id, claim, preset, slots, deadline)
            .instrument(span)
            .await
    }

    async fn dispatch(
        &self,
        request_id: Uuid,
        claim: &str,
        preset: &str,
        slots: Vec<ModelSlot>,
        deadline: Duration,
    ) -> VerifyResult<VerificationResult> {
        let started = Instant::now();
        let (cancel, ctx) = InvocationContext::with_budget(deadline);
        let shared_claim: Arc<str> = Arc::from(claim);

        info!(
            providers = ?aggregator::providers_of(&slots),
            "Dispatching claim to {} model(s)",
            slots.len()
        );

        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(slots.len());
        for (index, slot) in slots.iter().cloned().enumerate() {
            let invoker = Arc::clone(&self.invoker);
            let ctx = ctx.clone();
            let claim = Arc::clone(&shared_claim);
            let handle = tasks.spawn(async move {
                let call_started = Instant::now();
                let invocation = invoker.invoke(&ctx, &claim, &slot).await;
                (index, invocation, call_started.elapsed())
            });
            task_slots.insert(handle.id(), index);
        }

        let mut settled: Vec<Option<(Invocation, Duration)>> = vec![None; slots.len()];
        let mut deadline_hit = false;
        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((_, (index, invocation, elapsed)))) => {
                        debug!(index, attempts = invocation.attempts, "Slot settled");
                        settled[index] = Some((invocation, elapsed));
                    }
                    Some(Err(e)) => {
                        warn!("Invocation task ended abnormally: {}", e);
                        if let Some(&index) = task_slots.get(&e.id()) {
                            settled[index] = Some((
                                Invocation::failed(format!("invocation task failed: {}", e), 0),
                                started.elapsed(),
                            ));
                        }
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(ctx.deadline()) => {
                    warn!(outstanding = tasks.len(), "Global deadline reached");
                    deadline_hit = true;
                    break;
                }
            }
        }
        cancel.cancel();
        tasks.abort_all();

        let judgments: Vec<Judgment> = slots
            .iter()
            .cloned()
            .zip(settled)
            .enumerate()
            .map(|(slot_index, (slot, settled))| {
                let (outcome, attempts, latency) = match settled {
                    Some((invocation, elapsed)) => {
                        (invocation.outcome, invocation.attempts, elapsed)
                    }
                    None if deadline_hit => (
                        JudgmentOutcome::TimedOut {
                            error: "global deadline reached".to_string(),
                        },
                        0,
                        started.elapsed(),
                    ),
                    None => (
                        JudgmentOutcome::Failed {
                            error: "invocation task aborted".to_string(),
                        },
                        0,
                        started.elapsed(),
                    ),
                };
                Judgment {
                    slot_index,
                    slot,
                    outcome,
                    latency_ms: duration_ms(latency),
                    attempts,
                }
            })
            .collect();

        for judgment in &judgments {
            match &judgment.outcome {
                JudgmentOutcome::Success(_) => {}
                JudgmentOutcome::Failed { error } => {
                    warn!(slot = %judgment.slot, index = judgment.slot_index, "Model failed: {}", error)
                }
                JudgmentOutcome::TimedOut { error } => {
                    warn!(slot = %judgment.slot, index = judgment.slot_index, "Model timed out: {}", error)
                }
            }
        }

        let meta = AggregationMeta {
            request_id,
            claim: claim.to_string(),
            preset: preset.to_string(),
            elapsed_ms: duration_ms(started.elapsed()),
            completed_at: Utc::now(),
        };

        match aggregator::combine(meta, judgments, &slots) {
            Ok(result) => {
                if result.degraded {
                    warn!(
                        succeeded = result.metadata.models_succeeded,
                        failed = result.metadata.models_failed,
                        timed_out = result.metadata.models_timed_out,
                        "Verification degraded"
                    );
                }
                info!(
                    verdict = %result.verdict,
                    confidence = result.confidence,
                    contradiction = result.contradiction,
                    elapsed_ms = result.metadata.elapsed_ms,
                    "Verification complete"
                );
                Ok(result)
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }
}
