// ontolift-core/src/error.rs

use crate::domain::error::{DomainError, ErrorCode};
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OntoliftError {
    // --- ERREURS DU DOMAINE (ODL, Diff, Gates, Compile) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS D'INFRASTRUCTURE (IO, Parsing, Transport) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- ERREURS DE STAGE (terminal pour le run, jamais re-essayées) ---
    #[error("Verification rejected the semantic model: {}", .0.join("; "))]
    VerifyFailed(Vec<String>),

    #[error("Deployment rejected by the warehouse: {}", .0.join("; "))]
    DeployFailed(Vec<String>),

    #[error("Stage '{stage}' timed out after {seconds}s")]
    Timeout { stage: String, seconds: u64 },

    #[error("Task was canceled at a checkpoint")]
    Canceled,

    // --- ERREURS GÉNÉRIQUES / APPLICATIVES ---
    #[error("Internal Error: {0}")]
    InternalError(String),

    #[error("Unsafe path traversal detected: {0}")]
    UnsafePath(String),
}

impl OntoliftError {
    /// The stable code string persisted in run records and surfaced to callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Domain(e) => e.code(),
            Self::Infrastructure(_) => ErrorCode::Internal,
            Self::VerifyFailed(_) => ErrorCode::VerifyFailed,
            Self::DeployFailed(_) => ErrorCode::DeployFailed,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Canceled => ErrorCode::Canceled,
            Self::InternalError(_) | Self::UnsafePath(_) => ErrorCode::Internal,
        }
    }

    /// Whether a caller may reasonably resubmit the same task.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Infrastructure(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for OntoliftError {
    fn from(err: std::io::Error) -> Self {
        OntoliftError::Infrastructure(InfrastructureError::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ValidationIssue;

    #[test]
    fn test_code_mapping() {
        let err = OntoliftError::Domain(DomainError::InvalidStructure(vec![ValidationIssue {
            location: "/objects/0/name".into(),
            message: "bad name".into(),
        }]));
        assert_eq!(err.code().as_str(), "INVALID_STRUCTURE");
        assert!(!err.is_retryable());

        let timeout = OntoliftError::Timeout {
            stage: "verify".into(),
            seconds: 30,
        };
        assert_eq!(timeout.code().as_str(), "TIMEOUT");
        assert!(timeout.is_retryable());
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let err = OntoliftError::Infrastructure(InfrastructureError::Warehouse(
            "connection reset".into(),
        ));
        assert!(err.is_retryable());
        let verify = OntoliftError::VerifyFailed(vec!["bad join".into()]);
        assert!(!verify.is_retryable());
        assert_eq!(verify.code().as_str(), "VERIFY_FAILED");
    }
}
