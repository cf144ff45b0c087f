//! Response parsing
//!
//! Turns raw model text into an [`Assessment`]. Structured JSON (the format
//! the role prompts ask for) is tried first, including JSON wrapped in
//! markdown fences or surrounding prose. Free text falls back to pattern
//! extraction of an explicit confidence and a status keyword.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::aggregator::label_for_confidence;
use crate::error::InvokeError;
use crate::types::{Assessment, Role, VerdictLabel};

static CONFIDENCE_OUT_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence[^0-9\n]{0,20}?(\d+(?:\.\d+)?)\s*(?:out\s*of|/)\s*(\d+)")
        .expect("valid regex")
});

static CONFIDENCE_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence(?:\s+(?:level|score))?\s*[:=\s]\s*(\d*\.\d+|\d+)\s*(%)?")
        .expect("valid regex")
});

static CONFIDENCE_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d*\.\d+|\d+)\s*(%)?\s*confidence").expect("valid regex")
});

static REFUSAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:i'm sorry|i am sorry|i can(?:'|’)?t|i cannot|i won(?:'|’)?t|i will not)\b[^.\n]*\b(?:help|assist|comply)",
    )
    .expect("valid regex")
});

static CONTRADICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bcontradiction"?\s*(?:[:=]\s*)?"?(?:true|yes|detected|found)\b"#)
        .expect("valid regex")
});

/// Status keywords, most specific first. Score is used when the model
/// gives a status but no number.
static STATUS_PATTERNS: LazyLock<Vec<(Regex, VerdictLabel, f64)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(?:likely|probably|appears)[\s_-]+false\b",
            VerdictLabel::Refuted,
            0.3,
        ),
        (
            r"(?i)\b(?:likely|probably|appears)[\s_-]+true\b",
            VerdictLabel::Supported,
            0.7,
        ),
        (
            r"(?i)\b(?:uncertain|unclear|unverified|cannot\s+verify|insufficient\s+evidence)\b",
            VerdictLabel::Uncertain,
            0.5,
        ),
        (
            r"(?i)\b(?:refuted|false|incorrect|inaccurate|contradicted|debunked)\b",
            VerdictLabel::Refuted,
            0.1,
        ),
        (
            r"(?i)\b(?:supported|verified|true|accurate|confirmed|correct)\b",
            VerdictLabel::Supported,
            0.9,
        ),
    ]
    .into_iter()
    .map(|(p, label, score)| (Regex::new(p).expect("valid regex"), label, score))
    .collect()
});

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default, alias = "label", alias = "status", alias = "verification_status")]
    verdict: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
    #[serde(default)]
    contradiction: Option<serde_json::Value>,
    #[serde(default, alias = "explanation", alias = "summary")]
    rationale: Option<String>,
}

/// Parse a model reply for a slot with the given role.
///
/// Contradiction flags are only honoured for roles allowed to raise them.
pub fn parse_assessment(text: &str, role: Role) -> Result<Assessment, InvokeError> {
    let mut assessment = match parse_structured(text) {
        Some(a) => a,
        None => {
            if REFUSAL.is_match(text) {
                return Err(InvokeError::Refused(first_line(text).to_string()));
            }
            parse_free_text(text).ok_or_else(|| {
                InvokeError::MalformedResponse(
                    "no verdict or confidence found in response".to_string(),
                )
            })?
        }
    };

    if !role.can_flag_contradiction() {
        assessment.contradiction = false;
    }
    Ok(assessment)
}

fn parse_structured(text: &str) -> Option<Assessment> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let raw: RawVerdict = serde_json::from_str(&text[start..=end]).ok()?;

    let status = raw.verdict.as_deref().and_then(status_from_word);
    let confidence = raw.confidence.as_ref().and_then(confidence_from_json);

    let (label, confidence) = match (status, confidence) {
        (Some((label, _)), Some(c)) => (label, orient(label, c)),
        (Some((label, score)), None) => (label, score),
        (None, Some(c)) => (label_for_confidence(c), c),
        (None, None) => return None,
    };

    Some(Assessment {
        confidence,
        label,
        contradiction: raw.contradiction.as_ref().is_some_and(truthy),
        rationale: raw.rationale.filter(|r| !r.trim().is_empty()),
    })
}

fn parse_free_text(text: &str) -> Option<Assessment> {
    let confidence = extract_confidence(text);
    let status = STATUS_PATTERNS
        .iter()
        .find(|(re, _, _)| re.is_match(text))
        .map(|(_, label, score)| (*label, *score));

    let (label, confidence) = match (status, confidence) {
        (Some((label, _)), Some(c)) => (label, orient(label, c)),
        (Some((label, score)), None) => (label, score),
        (None, Some(c)) => (label_for_confidence(c), c),
        (None, None) => return None,
    };

    Some(Assessment {
        confidence,
        label,
        contradiction: CONTRADICTION.is_match(text),
        rationale: None,
    })
}

/// Confidence is the probability that the claim is true. Models often
/// report certainty in their own verdict instead ("refuted, 0.95"), so a
/// number pointing the other way from the stated label is mirrored.
fn orient(label: VerdictLabel, confidence: f64) -> f64 {
    match label {
        VerdictLabel::Supported if confidence < 0.5 => 1.0 - confidence,
        VerdictLabel::Refuted if confidence > 0.5 => 1.0 - confidence,
        _ => confidence,
    }
}

/// Explicit confidence in free text, normalised to [0, 1].
fn extract_confidence(text: &str) -> Option<f64> {
    if let Some(caps) = CONFIDENCE_OUT_OF.captures(text) {
        let value: f64 = caps[1].parse().ok()?;
        let scale: f64 = caps[2].parse().ok()?;
        if scale > 0.0 {
            return Some((value / scale).clamp(0.0, 1.0));
        }
    }
    for re in [&*CONFIDENCE_AFTER, &*CONFIDENCE_BEFORE] {
        if let Some(caps) = re.captures(text) {
            let value: f64 = caps[1].parse().ok()?;
            let percent = caps.get(2).is_some();
            return normalise(value, percent);
        }
    }
    None
}

fn confidence_from_json(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => normalise(n.as_f64()?, false),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            let percent = trimmed.ends_with('%');
            let number: f64 = trimmed.trim_end_matches('%').trim().parse().ok()?;
            normalise(number, percent)
        }
        _ => None,
    }
}

/// Map a raw number onto [0, 1]: percentages, 0-10 and 0-100 scales.
fn normalise(value: f64, percent: bool) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let scaled = if percent {
        value / 100.0
    } else if value <= 1.0 {
        value
    } else if value <= 10.0 {
        value / 10.0
    } else {
        value / 100.0
    };
    Some(scaled.clamp(0.0, 1.0))
}

fn status_from_word(word: &str) -> Option<(VerdictLabel, f64)> {
    let normalised = word.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalised.as_str() {
        "supported" | "verified" | "true" | "confirmed" | "accurate" | "correct" => {
            Some((VerdictLabel::Supported, 0.9))
        }
        "likely_true" | "probably_true" | "mostly_true" => Some((VerdictLabel::Supported, 0.7)),
        "uncertain" | "unverified" | "unclear" | "mixed" | "unknown" | "insufficient_evidence" => {
            Some((VerdictLabel::Uncertain, 0.5))
        }
        "likely_false" | "probably_false" | "mostly_false" => Some((VerdictLabel::Refuted, 0.3)),
        "refuted" | "false" | "incorrect" | "inaccurate" | "contradicted" | "debunked" => {
            Some((VerdictLabel::Refuted, 0.1))
        }
        _ => None,
    }
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes")
        }
        _ => false,
    }
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_json() {
        let text = r#"{"verdict":"supported","confidence":0.92,"contradiction":false,"rationale":"Matches records."}"#;
        let a = parse_assessment(text, Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Supported);
        assert_eq!(a.confidence, 0.92);
        assert!(!a.contradiction);
        assert_eq!(a.rationale.as_deref(), Some("Matches records."));
    }

    #[test]
    fn test_json_in_markdown_fence() {
        let text = "Here is my analysis:\n```json\n{\"verdict\": \"refuted\", \"confidence\": \"15%\"}\n```";
        let a = parse_assessment(text, Role::Reasoning).unwrap();
        assert_eq!(a.label, VerdictLabel::Refuted);
        assert!((a.confidence - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_json_without_verdict_derives_label() {
        let a = parse_assessment(r#"{"confidence": 0.2}"#, Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Refuted);
    }

    #[test]
    fn test_json_label_only_uses_status_score() {
        let a = parse_assessment(r#"{"status":"LIKELY_TRUE"}"#, Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Supported);
        assert_eq!(a.confidence, 0.7);
    }

    #[test]
    fn test_refuted_with_high_certainty_reads_as_false() {
        let text = r#"{"verdict":"refuted","confidence":0.95}"#;
        let a = parse_assessment(text, Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Refuted);
        assert!((a.confidence - 0.05).abs() < 1e-12);
        assert_eq!(label_for_confidence(a.confidence), VerdictLabel::Refuted);
    }

    #[test]
    fn test_supported_with_low_number_reads_as_true() {
        let text = r#"{"verdict":"supported","confidence":0.2}"#;
        let a = parse_assessment(text, Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Supported);
        assert!((a.confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_uncertain_confidence_not_mirrored() {
        let a = parse_assessment(r#"{"verdict":"uncertain","confidence":0.9}"#, Role::FactCheck)
            .unwrap();
        assert_eq!(a.label, VerdictLabel::Uncertain);
        assert_eq!(a.confidence, 0.9);
    }

    #[test]
    fn test_contradiction_kept_for_reasoning() {
        let text = r#"{"verdict":"supported","confidence":0.95,"contradiction":true}"#;
        assert!(parse_assessment(text, Role::Reasoning).unwrap().contradiction);
        assert!(parse_assessment(text, Role::TrustChain).unwrap().contradiction);
    }

    #[test]
    fn test_contradiction_dropped_for_fact_check() {
        let text = r#"{"verdict":"supported","confidence":0.95,"contradiction":true}"#;
        assert!(!parse_assessment(text, Role::FactCheck).unwrap().contradiction);
    }

    #[test]
    fn test_free_text_confidence_decimal() {
        let text = "Verification status: VERIFIED\nConfidence: 0.85\nSources: ...";
        let a = parse_assessment(text, Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Supported);
        assert!((a.confidence - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_free_text_confidence_percent() {
        let a = parse_assessment("I have 40% confidence; the claim is unclear.", Role::FactCheck)
            .unwrap();
        assert_eq!(a.label, VerdictLabel::Uncertain);
        assert!((a.confidence - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_free_text_out_of_ten() {
        let a = parse_assessment("Confidence: 8 out of 10. Likely true.", Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Supported);
        assert!((a.confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_free_text_false_with_high_certainty() {
        let a = parse_assessment("False. Confidence: 0.9", Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Refuted);
        assert!((a.confidence - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_free_text_status_only() {
        let a = parse_assessment("This claim is likely false.", Role::FactCheck).unwrap();
        assert_eq!(a.label, VerdictLabel::Refuted);
        assert_eq!(a.confidence, 0.3);
    }

    #[test]
    fn test_free_text_contradiction_marker() {
        let text = "Reasoning is circular. Contradiction: yes. Confidence: 0.6";
        let a = parse_assessment(text, Role::Reasoning).unwrap();
        assert!(a.contradiction);
    }

    #[test]
    fn test_refusal() {
        let err = parse_assessment("I'm sorry, but I can't help with that request.", Role::FactCheck)
            .unwrap_err();
        assert!(matches!(err, InvokeError::Refused(_)));
    }

    #[test]
    fn test_gibberish_is_malformed() {
        let err = parse_assessment("lorem ipsum dolor sit amet", Role::FactCheck).unwrap_err();
        assert!(matches!(err, InvokeError::MalformedResponse(_)));
    }

    #[test]
    fn test_normalise_scales() {
        assert_eq!(normalise(0.5, false), Some(0.5));
        assert_eq!(normalise(7.0, false), Some(0.7));
        assert_eq!(normalise(85.0, false), Some(0.85));
        assert_eq!(normalise(85.0, true), Some(0.85));
        assert_eq!(normalise(500.0, false), Some(1.0));
        assert_eq!(normalise(-1.0, false), None);
        assert_eq!(normalise(f64::NAN, false), None);
    }
}
