use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cleaning-relevant observation reported by the AI provider.
///
/// `reason` is optional on the wire and defaults to "N/A" when the
/// provider supplies none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessTask {
    pub mess: String,
    #[serde(default = "default_reason")]
    pub reason: String,
}

pub fn default_reason() -> String {
    "N/A".to_string()
}

impl MessTask {
    pub fn new(mess: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            mess: mess.into(),
            reason: reason.into(),
        }
    }

    /// A task without a provider-supplied justification.
    pub fn without_reason(mess: impl Into<String>) -> Self {
        Self {
            mess: mess.into(),
            reason: default_reason(),
        }
    }
}

/// The outcome of one successful room analysis. Immutable once created;
/// task order is preserved as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub tasks: Vec<MessTask>,
    pub cleanliness_score: u8,
}

/// Health of a single AI provider, as reported by its health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProviderHealth {
    pub fn ok(provider: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            provider: provider.into(),
            detail: None,
        }
    }

    pub fn error(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            provider: provider.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
