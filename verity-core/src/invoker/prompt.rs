//! Role prompts
//!
//! Every role asks for the same JSON reply so one parser handles all
//! providers; roles differ only in what the model is told to examine.

use super::CompletionRequest;
use crate::types::{ModelSlot, Role};

/// Low temperature for factual work.
pub const TEMPERATURE: f32 = 0.3;

const RESPONSE_CONTRACT: &str = r#"Respond ONLY with valid JSON, no markdown:
{
  "verdict": "supported" | "refuted" | "uncertain",
  "confidence": <number between 0 and 1>,
  "contradiction": <true if your analysis conflicts with what a straightforward fact-check would conclude, else false>,
  "rationale": "<one or two sentences>"
}"#;

pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::FactCheck => {
            "You are an expert fact-checker. Provide accurate fact-checking with evidence and sources."
        }
        Role::TrustChain => {
            "You are a source credibility analyst. Analyze the trust chain and evaluate the reliability of sources and information pathways."
        }
        Role::Reasoning => {
            "You are a logical reasoning specialist. Apply Socratic questioning to evaluate claims for logical consistency and sound reasoning."
        }
    }
}

pub fn max_tokens(role: Role) -> u32 {
    match role {
        Role::FactCheck => 4000,
        Role::TrustChain => 2500,
        Role::Reasoning => 4000,
    }
}

fn role_instructions(role: Role) -> &'static str {
    match role {
        Role::FactCheck => {
            "Provide a thorough fact-check:
- Decide whether the claim is supported, refuted, or uncertain
- Weigh the key evidence found
- Give your confidence that the claim is true (0-1)"
        }
        Role::TrustChain => {
            "Analyze the trust chain and source credibility:
- Trace the origin of the claim
- Assess the reliability of sources
- Identify potential bias or conflicts of interest
- Give your confidence that the claim is true given source reliability (0-1)
- Set contradiction=true if credible sources conflict with the claim's apparent support"
        }
        Role::Reasoning => {
            "Apply Socratic reasoning to evaluate the claim:
- Question the assumptions underlying the claim
- Examine logical consistency and identify fallacies
- Give your confidence that the claim is true on logical grounds (0-1)
- Set contradiction=true if the claim is internally inconsistent or its reasoning undermines the evidence"
        }
    }
}

pub fn user_prompt(claim: &str, role: Role) -> String {
    format!(
        "Fact-check the following claim: \"{}\"\n\n{}\n\n{}",
        claim.trim(),
        role_instructions(role),
        RESPONSE_CONTRACT
    )
}

/// Completion request for one slot.
pub fn build_request(claim: &str, slot: &ModelSlot) -> CompletionRequest {
    CompletionRequest {
        model: slot.model.clone(),
        system_prompt: system_prompt(slot.role).to_string(),
        user_prompt: user_prompt(claim, slot.role),
        max_tokens: max_tokens(slot.role),
        temperature: TEMPERATURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;

    #[test]
    fn test_build_request_uses_slot_model_and_role_budget() {
        let slot = ModelSlot::new(Provider::Anthropic, "claude-x", Role::TrustChain, 0.25);
        let request = build_request("  Water boils at 100C at sea level. ", &slot);
        assert_eq!(request.model, "claude-x");
        assert_eq!(request.max_tokens, 2500);
        assert!(request.system_prompt.contains("credibility"));
        assert!(request
            .user_prompt
            .contains("\"Water boils at 100C at sea level.\""));
        assert!(request.user_prompt.contains("\"contradiction\""));
    }

    #[test]
    fn test_every_role_requests_json() {
        for role in [Role::FactCheck, Role::TrustChain, Role::Reasoning] {
            assert!(user_prompt("x", role).contains("Respond ONLY with valid JSON"));
        }
    }
}
