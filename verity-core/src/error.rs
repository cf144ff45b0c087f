//! Error types for claim verification
//!
//! Callers only see [`VerifyError`]. Per-slot
//! problems are classified as [`InvokeError`] inside the invoker layer and
//! absorbed into the audit trail rather than propagated.

use thiserror::Error;

/// Request-level failures returned by the orchestrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("Unknown verification preset '{name}'")]
    UnknownPreset { name: String },

    #[error("All {attempted} model(s) for preset '{preset}' failed or timed out")]
    AllModelsUnavailable { preset: String, attempted: usize },

    #[error("Invalid slot set: {0}")]
    InvalidSlots(#[from] CatalogError),
}

/// Preset definition and loading errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Preset '{preset}' has no slots")]
    EmptyPreset { preset: String },

    #[error("Preset '{preset}' slot {index}: weight must be positive and finite, got {weight}")]
    InvalidWeight {
        preset: String,
        index: usize,
        weight: f64,
    },

    #[error("Preset '{preset}': total slot weight is not finite")]
    WeightTotalOverflow { preset: String },

    #[error("Preset '{preset}' slot {index}: model identifier is empty")]
    EmptyModel { preset: String, index: usize },

    #[error("Preset name must not be empty")]
    EmptyName,

    #[error("Duplicate preset name '{name}'")]
    DuplicatePreset { name: String },

    #[error("Failed to parse preset table: {message}")]
    Parse { message: String },
}

/// Classified failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    #[error("Provider {provider} not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    #[error("Authentication rejected by {provider}")]
    Unauthorized { provider: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Provider API error {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Model refused the request: {0}")]
    Refused(String),
}

impl InvokeError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            InvokeError::Network(_) | InvokeError::Timeout { .. } => true,
            InvokeError::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, InvokeError::Timeout { .. })
    }
}

impl From<reqwest::Error> for InvokeError {
    fn from(e: reqwest::Error) -> Self {
        // Some providers carry the key in the query string.
        let e = e.without_url();
        if e.is_decode() {
            InvokeError::MalformedResponse(e.to_string())
        } else if let Some(status) = e.status() {
            InvokeError::Provider {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            InvokeError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for InvokeError {
    fn from(e: serde_json::Error) -> Self {
        InvokeError::MalformedResponse(e.to_string())
    }
}

pub type VerifyResult<T> = std::result::Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(InvokeError::Network("reset".into()).is_transient());
        assert!(InvokeError::Timeout { elapsed_ms: 10 }.is_transient());
        assert!(InvokeError::Provider {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(InvokeError::Provider {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!InvokeError::Provider {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!InvokeError::Unauthorized {
            provider: "openai".into()
        }
        .is_transient());
        assert!(!InvokeError::Refused("no".into()).is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = VerifyError::UnknownPreset {
            name: "turbo".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown verification preset 'turbo'");

        let err = VerifyError::AllModelsUnavailable {
            preset: "comprehensive".to_string(),
            attempted: 3,
        };
        assert!(err.to_string().contains("All 3 model(s)"));
    }
}
