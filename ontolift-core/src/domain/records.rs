// ontolift-core/src/domain/records.rs

// Persisted lifecycle records. Versions are immutable once written; run
// rows only ever move to a terminal status; drift events only transition
// OPEN -> RESOLVED / IGNORED.

use serde::{Deserialize, Serialize};

use crate::domain::diff::DiffReport;
use crate::domain::drift::DriftEventType;
use crate::domain::gates::EvalOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ontology {
    pub workspace: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: String,
}

/// An immutable snapshot of an ontology. `payload` is the canonical ODL
/// serialization; `content_hash` is the hash of exactly those bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyVersion {
    pub workspace: String,
    pub ontology: String,
    pub version_number: u32,
    pub payload: String,
    pub content_hash: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
}

/// A computed diff between two versions, keyed by the pair. Immutable once
/// written; diff determinism makes re-computation byte-identical anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyDiffRecord {
    pub workspace: String,
    pub ontology: String,
    pub old_version: u32,
    pub new_version: u32,
    pub report: DiffReport,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileRun {
    pub id: String,
    pub workspace: String,
    pub ontology: String,
    pub version_number: u32,
    /// Fully-qualified target view
    pub target: String,
    pub options: serde_json::Value,
    pub status: RunStatus,
    /// Content address of the produced bundle (SUCCESS only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_hash: Option<String>,
    /// Warning-level flag: no pre-deploy YAML could be captured
    #[serde(default)]
    pub rollback_unavailable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRun {
    pub id: String,
    pub workspace: String,
    pub ontology: String,
    pub version_number: u32,
    pub profile: String,
    pub passed: bool,
    pub outcome: EvalOutcome,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftStatus {
    Open,
    Resolved,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub id: String,
    pub workspace: String,
    pub ontology: String,
    pub event_type: DriftEventType,
    pub details: serde_json::Value,
    /// Coalescing key over {ontology, event_type, details}
    pub dedup_key: String,
    pub status: DriftStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionRun {
    pub id: String,
    pub workspace: String,
    pub ontology: String,
    pub version_number: u32,
    pub view_fqn: String,
    pub question_count: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    pub overall_pass: bool,
    pub total_latency_ms: u64,
    /// Per-question result blob
    pub results: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junit_path: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// The live-view record written after a successful deploy. Drift scans and
/// regression runs key off this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedView {
    pub workspace: String,
    pub ontology: String,
    pub version_number: u32,
    pub view_fqn: String,
    pub deployed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_strings() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Pending).unwrap_or_default(),
            "\"PENDING\""
        );
        assert!(RunStatus::Success.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_drift_status_strings() {
        assert_eq!(
            serde_json::to_string(&DriftStatus::Open).unwrap_or_default(),
            "\"OPEN\""
        );
        assert_eq!(
            serde_json::to_string(&DriftStatus::Ignored).unwrap_or_default(),
            "\"IGNORED\""
        );
    }
}
