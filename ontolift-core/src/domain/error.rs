// ontolift-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

/// Stable error-code surface. These strings are part of the public contract:
/// they are persisted in run records and matched on by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidStructure,
    InvalidReference,
    DuplicateContent,
    GateFailed,
    CompileFailed,
    VerifyFailed,
    DeployFailed,
    RollbackUnavailable,
    DriftDetected,
    RegressionFailed,
    Timeout,
    Canceled,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidStructure => "INVALID_STRUCTURE",
            Self::InvalidReference => "INVALID_REFERENCE",
            Self::DuplicateContent => "DUPLICATE_CONTENT",
            Self::GateFailed => "GATE_FAILED",
            Self::CompileFailed => "COMPILE_FAILED",
            Self::VerifyFailed => "VERIFY_FAILED",
            Self::DeployFailed => "DEPLOY_FAILED",
            Self::RollbackUnavailable => "ROLLBACK_UNAVAILABLE",
            Self::DriftDetected => "DRIFT_DETECTED",
            Self::RegressionFailed => "REGRESSION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Canceled => "CANCELED",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation finding, pointing at the offending ODL location.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    /// JSON-pointer style location (ex: `/objects/0/properties/2/type`)
    pub location: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("INVALID_STRUCTURE: {}", join_issues(.0))]
    #[diagnostic(
        code(ontolift::domain::structure),
        help("Check required fields, name patterns and enum values in the ODL document.")
    )]
    InvalidStructure(Vec<ValidationIssue>),

    #[error("INVALID_REFERENCE: {}", join_issues(.0))]
    #[diagnostic(
        code(ontolift::domain::reference),
        help("Every relationship, dimension, grain and table mapping must point at a declared object/property.")
    )]
    InvalidReference(Vec<ValidationIssue>),

    #[error("Duplicate content for ontology '{ontology}' (hash {hash})")]
    #[diagnostic(
        code(ontolift::domain::duplicate_content),
        help("An identical normalized payload is already stored. Submit a payload that actually changes something.")
    )]
    DuplicateContent { ontology: String, hash: String },

    #[error("Gate '{gate_id}' failed: {message}")]
    #[diagnostic(code(ontolift::domain::gate))]
    GateFailed { gate_id: String, message: String },

    #[error("Compilation failed: {0}")]
    #[diagnostic(code(ontolift::domain::compile))]
    CompileFailed(String),

    #[error("Ontology '{0}' not found (or inactive)")]
    #[diagnostic(code(ontolift::domain::ontology_not_found))]
    OntologyNotFound(String),

    #[error("Version {number} of ontology '{ontology}' not found")]
    #[diagnostic(code(ontolift::domain::version_not_found))]
    VersionNotFound { ontology: String, number: u32 },

    #[error("Ontology '{0}' has no deployed view")]
    #[diagnostic(
        code(ontolift::domain::not_deployed),
        help("Deploy a version first; regression runs are refused against non-deployed views.")
    )]
    NotDeployed(String),
}

impl DomainError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidStructure(_) => ErrorCode::InvalidStructure,
            Self::InvalidReference(_) => ErrorCode::InvalidReference,
            Self::DuplicateContent { .. } => ErrorCode::DuplicateContent,
            Self::GateFailed { .. } => ErrorCode::GateFailed,
            Self::CompileFailed(_) => ErrorCode::CompileFailed,
            Self::OntologyNotFound(_) | Self::VersionNotFound { .. } | Self::NotDeployed(_) => {
                ErrorCode::NotFound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable_strings() {
        assert_eq!(ErrorCode::InvalidStructure.to_string(), "INVALID_STRUCTURE");
        assert_eq!(ErrorCode::DuplicateContent.to_string(), "DUPLICATE_CONTENT");
        assert_eq!(ErrorCode::RollbackUnavailable.to_string(), "ROLLBACK_UNAVAILABLE");
        assert_eq!(ErrorCode::Canceled.to_string(), "CANCELED");
    }

    #[test]
    fn test_invalid_reference_lists_locations() {
        let err = DomainError::InvalidReference(vec![ValidationIssue {
            location: "/dimensions/0/sourceProperty".into(),
            message: "unknown property 'Order.nonexistent'".into(),
        }]);
        let rendered = err.to_string();
        assert!(rendered.contains("INVALID_REFERENCE"));
        assert!(rendered.contains("/dimensions/0/sourceProperty"));
    }
}
