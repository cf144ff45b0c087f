//! Weighted multi-model claim verification
//!
//! A claim is sent concurrently to every model slot of a named preset. Each
//! slot plays a role (fact-check, trust-chain, reasoning) and carries a
//! weight. The answers that arrive before the deadline are combined into one
//! confidence and verdict, with weights renormalised over the slots that
//! actually succeeded.
//!
//! ## Architecture
//!
//! ```text
//! PresetCatalog ─resolve─▶ Orchestrator ─spawn per slot─▶ ModelInvoker
//!                               │                          (ProviderRouter
//!                               │                           → ProviderClient)
//!                               ▼
//!                          Aggregator ─▶ VerificationResult
//! ```
//!
//! ## Failure model
//!
//! Per-slot failures and timeouts are recorded in the result and set
//! `degraded`. Only two conditions fail a request: an unknown preset, and
//! every slot failing.

// Data model
pub mod error;
pub mod types;

// Presets and configuration
pub mod catalog;
pub mod config;

// Dispatch and aggregation
pub mod aggregator;
pub mod invoker;
pub mod orchestrator;

// Re-exports for convenience
pub use aggregator::{
    label_for_confidence, CONTRADICTION_CEILING, REFUTED_THRESHOLD, SUPPORTED_THRESHOLD,
};
pub use catalog::PresetCatalog;
pub use config::{load_catalog, OrchestratorConfig, PresetTable, ProviderSettings};
pub use error::{CatalogError, InvokeError, VerifyError, VerifyResult};
pub use invoker::{
    CancelHandle, Invocation, InvocationContext, ModelInvoker, ProviderClient, ProviderRouter,
};
pub use orchestrator::Orchestrator;
pub use types::{
    Assessment, CostTier, Judgment, JudgmentOutcome, ModelSlot, PresetSummary, Provider,
    ProviderStrategy, ResultMetadata, Role, VerdictLabel, VerificationPreset, VerificationResult,
};
