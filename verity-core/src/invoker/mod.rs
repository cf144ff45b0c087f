//! Model invocation
//!
//! [`ModelInvoker`] is the single capability the orchestrator depends on:
//! run one slot against one claim and report a [`JudgmentOutcome`]. The
//! production implementation is [`ProviderRouter`], which selects a concrete
//! [`ProviderClient`] by the slot's provider tag and owns the per-call
//! timeout and retry policy.
//!
//! ## Cancellation
//!
//! Every call receives an [`InvocationContext`] carrying the request-wide
//! deadline and a cancel signal (a `watch` channel, the same shutdown idiom
//! the background workers use). Implementations must return promptly once
//! [`InvocationContext::cancelled`] resolves.

pub mod parse;
pub mod prompt;
pub mod providers;
pub mod router;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::types::{Assessment, JudgmentOutcome, ModelSlot};

/// Stand-in deadline for budgets too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub use providers::{CompletionRequest, ProviderClient};
pub use router::ProviderRouter;

/// Capability: judge one claim with one slot.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, ctx: &InvocationContext, claim: &str, slot: &ModelSlot) -> Invocation;
}

/// What an invoker reports for one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub outcome: JudgmentOutcome,
    /// Provider round-trips attempted, including retries.
    pub attempts: u32,
}

impl Invocation {
    pub fn success(assessment: Assessment, attempts: u32) -> Self {
        Self {
            outcome: JudgmentOutcome::Success(assessment),
            attempts,
        }
    }

    pub fn failed(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            outcome: JudgmentOutcome::Failed {
                error: error.into(),
            },
            attempts,
        }
    }

    pub fn timed_out(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            outcome: JudgmentOutcome::TimedOut {
                error: error.into(),
            },
            attempts,
        }
    }
}

// ─── Context ──────────────────────────────────────────────────

/// Deadline plus cancel signal shared by all slots of one request.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    deadline: Instant,
    cancel_rx: watch::Receiver<bool>,
}

/// Owning side of an [`InvocationContext`]; held by the orchestrator.
#[derive(Debug)]
pub struct CancelHandle {
    cancel_tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal every context derived from this handle.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }
}

impl InvocationContext {
    pub fn new(deadline: Instant) -> (CancelHandle, Self) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        (
            CancelHandle { cancel_tx },
            Self {
                deadline,
                cancel_rx,
            },
        )
    }

    /// Context expiring `budget` from now. Budgets past the representable
    /// range are capped at roughly thirty years.
    pub fn with_budget(budget: Duration) -> (CancelHandle, Self) {
        let now = Instant::now();
        let deadline = now
            .checked_add(budget)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self::new(deadline)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow() || Instant::now() >= self.deadline
    }

    /// Resolves when the request is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        let signalled = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Handle dropped without cancelling; only the deadline remains.
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = signalled => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }
}
