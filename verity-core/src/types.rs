use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ─── Slot identity ────────────────────────────────────────────

/// AI provider a slot is dispatched to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Openai,
    Anthropic,
    Perplexity,
    Google,
    Xai,
    Deepseek,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::Openai,
        Provider::Anthropic,
        Provider::Perplexity,
        Provider::Google,
        Provider::Xai,
        Provider::Deepseek,
    ];

    /// Model used when a slot is re-pointed at this provider without an
    /// explicit model (single-provider strategy).
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Openai => "gpt-4o",
            Provider::Anthropic => "claude-sonnet-4-20250514",
            Provider::Perplexity => "sonar",
            Provider::Google => "gemini-2.0-flash-exp",
            Provider::Xai => "grok-beta",
            Provider::Deepseek => "deepseek-chat",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Perplexity => "perplexity",
            Provider::Google => "google",
            Provider::Xai => "xai",
            Provider::Deepseek => "deepseek",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analytical function a slot performs. Closed set: an unknown role in a
/// preset table fails deserialisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    FactCheck,
    TrustChain,
    Reasoning,
}

impl Role {
    /// Whether this role may raise a contradiction flag against the
    /// fact-check majority.
    pub fn can_flag_contradiction(&self) -> bool {
        !matches!(self, Role::FactCheck)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::FactCheck => "fact_check",
            Role::TrustChain => "trust_chain",
            Role::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured model participant in a preset.
///
/// Weights are relative: they need not sum to 1 across a preset, since
/// normalisation happens over the successful slots at aggregation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSlot {
    pub provider: Provider,
    pub model: String,
    pub role: Role,
    pub weight: f64,
}

impl ModelSlot {
    pub fn new(provider: Provider, model: impl Into<String>, role: Role, weight: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            role,
            weight,
        }
    }
}

impl fmt::Display for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.provider, self.model, self.role)
    }
}

// ─── Presets ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Low,
    Medium,
    High,
}

/// A named, ordered collection of slots with declared cost/latency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationPreset {
    pub name: String,
    #[serde(default = "default_preset_version")]
    pub version: u32,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "costTier")]
    pub cost_tier: CostTier,
    /// Human-readable latency expectation, e.g. "~2-4s".
    #[serde(alias = "latencyEstimate")]
    pub latency_estimate: String,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub slots: Vec<ModelSlot>,
}

fn default_preset_version() -> u32 {
    1
}

impl VerificationPreset {
    pub fn summary(&self) -> PresetSummary {
        PresetSummary {
            name: self.name.clone(),
            version: self.version,
            description: self.description.clone(),
            cost_tier: self.cost_tier,
            latency_estimate: self.latency_estimate.clone(),
            recommendation: self.recommendation.clone(),
            warnings: self.warnings.clone(),
            roles: self.slots.iter().map(|s| s.role).collect(),
            slot_count: self.slots.len(),
        }
    }
}

/// Discovery view of a preset (no slot internals).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetSummary {
    pub name: String,
    pub version: u32,
    pub description: String,
    pub cost_tier: CostTier,
    pub latency_estimate: String,
    pub recommendation: Option<String>,
    pub warnings: Vec<String>,
    pub roles: Vec<Role>,
    pub slot_count: usize,
}

/// How slot providers are chosen when resolving a preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy", content = "provider")]
pub enum ProviderStrategy {
    /// Use each slot's configured provider.
    #[default]
    Mixed,
    /// Route every slot to one provider, using its default model.
    Single(Provider),
}

// ─── Judgments ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictLabel {
    Supported,
    Refuted,
    Uncertain,
}

impl fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictLabel::Supported => write!(f, "supported"),
            VerdictLabel::Refuted => write!(f, "refuted"),
            VerdictLabel::Uncertain => write!(f, "uncertain"),
        }
    }
}

/// A successful model's view of the claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub label: VerdictLabel,
    #[serde(default)]
    pub contradiction: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Assessment {
    pub fn new(confidence: f64, label: VerdictLabel) -> Self {
        Self {
            confidence,
            label,
            contradiction: false,
            rationale: None,
        }
    }

    pub fn with_contradiction(mut self) -> Self {
        self.contradiction = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JudgmentOutcome {
    Success(Assessment),
    Failed { error: String },
    TimedOut { error: String },
}

impl JudgmentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JudgmentOutcome::Success(_))
    }

    pub fn assessment(&self) -> Option<&Assessment> {
        match self {
            JudgmentOutcome::Success(a) => Some(a),
            _ => None,
        }
    }
}

/// One slot's outcome for one request, attributed by slot index rather than
/// arrival order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Position of the slot within the resolved preset.
    pub slot_index: usize,
    pub slot: ModelSlot,
    pub outcome: JudgmentOutcome,
    pub latency_ms: u64,
    /// Provider round-trips made, including retries. Zero when the slot
    /// never reached a provider or was abandoned at the global deadline.
    pub attempts: u32,
}

// ─── Result ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub models_succeeded: usize,
    pub models_failed: usize,
    pub models_timed_out: usize,
    /// Providers that produced a successful judgment, sorted.
    pub providers_used: Vec<Provider>,
    pub elapsed_ms: u64,
}

/// Final verdict for one claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub request_id: Uuid,
    pub claim: String,
    pub preset: String,
    /// Every slot's judgment, failures included, in slot order.
    pub judgments: Vec<Judgment>,
    pub confidence: f64,
    pub verdict: VerdictLabel,
    /// True iff at least one slot failed or timed out.
    pub degraded: bool,
    /// True iff the contradiction ceiling was applied.
    pub contradiction: bool,
    pub metadata: ResultMetadata,
    pub completed_at: DateTime<Utc>,
}
