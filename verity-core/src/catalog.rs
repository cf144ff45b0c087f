//! Preset catalog
//!
//! Named collections of model slots. A catalog is validated once at
//! construction and never mutated afterwards, so it can be shared behind an
//! `Arc` and read from any number of concurrent requests without locking.

use crate::error::{CatalogError, VerifyError};
use crate::types::{
    CostTier, ModelSlot, PresetSummary, Provider, ProviderStrategy, Role, VerificationPreset,
};
use std::collections::HashMap;

/// Version tag of the built-in preset table.
pub const BUILTIN_CATALOG_VERSION: &str = "2025.1";

/// Immutable, validated set of verification presets.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    version: String,
    presets: Vec<VerificationPreset>,
    by_name: HashMap<String, usize>,
}

impl PresetCatalog {
    /// Build a catalog from preset definitions, rejecting invalid ones.
    ///
    /// Definition order is preserved for [`PresetCatalog::list`].
    pub fn from_presets(
        version: impl Into<String>,
        presets: Vec<VerificationPreset>,
    ) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(presets.len());
        for (i, preset) in presets.iter().enumerate() {
            if preset.name.trim().is_empty() {
                return Err(CatalogError::EmptyName);
            }
            validate_slots(&preset.name, &preset.slots)?;
            if by_name.insert(preset.name.clone(), i).is_some() {
                return Err(CatalogError::DuplicatePreset {
                    name: preset.name.clone(),
                });
            }
        }

        Ok(Self {
            version: version.into(),
            presets,
            by_name,
        })
    }

    /// The built-in `simple` / `standard` / `comprehensive` presets.
    pub fn builtin() -> Self {
        let presets = builtin_presets();
        let by_name = presets
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        Self {
            version: BUILTIN_CATALOG_VERSION.to_string(),
            presets,
            by_name,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, name: &str) -> Option<&VerificationPreset> {
        self.by_name.get(name).map(|&i| &self.presets[i])
    }

    /// Ordered slots of the named preset.
    pub fn resolve(&self, name: &str) -> Result<&[ModelSlot], VerifyError> {
        self.get(name)
            .map(|p| p.slots.as_slice())
            .ok_or_else(|| VerifyError::UnknownPreset {
                name: name.to_string(),
            })
    }

    /// Resolve a preset and apply a provider strategy.
    ///
    /// `Single(provider)` keeps roles and weights but routes every slot to
    /// `provider` with its default model.
    pub fn resolve_with(
        &self,
        name: &str,
        strategy: ProviderStrategy,
    ) -> Result<Vec<ModelSlot>, VerifyError> {
        let slots = self.resolve(name)?;
        Ok(apply_strategy(slots, strategy))
    }

    /// Discovery metadata for every preset, in definition order.
    pub fn list(&self) -> Vec<PresetSummary> {
        self.presets.iter().map(|p| p.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Check a slot list against the rules every preset must satisfy.
pub fn validate_slots(preset: &str, slots: &[ModelSlot]) -> Result<(), CatalogError> {
    if slots.is_empty() {
        return Err(CatalogError::EmptyPreset {
            preset: preset.to_string(),
        });
    }
    for (index, slot) in slots.iter().enumerate() {
        if !slot.weight.is_finite() || slot.weight <= 0.0 {
            return Err(CatalogError::InvalidWeight {
                preset: preset.to_string(),
                index,
                weight: slot.weight,
            });
        }
        if slot.model.trim().is_empty() {
            return Err(CatalogError::EmptyModel {
                preset: preset.to_string(),
                index,
            });
        }
    }
    if !slots.iter().map(|s| s.weight).sum::<f64>().is_finite() {
        return Err(CatalogError::WeightTotalOverflow {
            preset: preset.to_string(),
        });
    }
    Ok(())
}

pub fn apply_strategy(slots: &[ModelSlot], strategy: ProviderStrategy) -> Vec<ModelSlot> {
    match strategy {
        ProviderStrategy::Mixed => slots.to_vec(),
        ProviderStrategy::Single(provider) => slots
            .iter()
            .map(|s| ModelSlot {
                provider,
                model: provider.default_model().to_string(),
                role: s.role,
                weight: s.weight,
            })
            .collect(),
    }
}

fn builtin_presets() -> Vec<VerificationPreset> {
    let fact_check = ModelSlot::new(Provider::Perplexity, "sonar", Role::FactCheck, 0.35);
    let trust_chain = ModelSlot::new(
        Provider::Anthropic,
        "claude-sonnet-4-20250514",
        Role::TrustChain,
        0.25,
    );
    let reasoning = ModelSlot::new(Provider::Openai, "gpt-4o", Role::Reasoning, 0.20);

    vec![
        VerificationPreset {
            name: "simple".to_string(),
            version: 1,
            description: "Single model fact-checking for quick verification".to_string(),
            cost_tier: CostTier::Low,
            latency_estimate: "~1-2s".to_string(),
            recommendation: Some(
                "Use for routine fact-checks and low-stakes claims".to_string(),
            ),
            warnings: vec![],
            slots: vec![ModelSlot {
                weight: 1.0,
                ..fact_check.clone()
            }],
        },
        VerificationPreset {
            name: "standard".to_string(),
            version: 1,
            description: "Balanced accuracy with trust chain analysis using two models"
                .to_string(),
            cost_tier: CostTier::Medium,
            latency_estimate: "~2-4s".to_string(),
            recommendation: Some("Recommended for most fact-checking scenarios".to_string()),
            warnings: vec![],
            slots: vec![fact_check.clone(), trust_chain.clone()],
        },
        VerificationPreset {
            name: "comprehensive".to_string(),
            version: 1,
            description: "Maximum accuracy with full analysis using three specialized models"
                .to_string(),
            cost_tier: CostTier::High,
            latency_estimate: "~3-6s".to_string(),
            recommendation: Some(
                "Use for critical claims requiring maximum verification".to_string(),
            ),
            warnings: vec![
                "Higher cost due to multiple model calls".to_string(),
                "Longer processing time".to_string(),
                "May be overkill for simple claims".to_string(),
            ],
            slots: vec![fact_check, trust_chain, reasoning],
        },
    ]
}
