// ontolift-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(ontolift::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(ontolift::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON Parsing Error: {0}")]
    #[diagnostic(code(ontolift::infra::json))]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(ontolift::infra::config_missing))]
    ConfigNotFound(String),

    // --- VERSION STORE ---
    #[error("Store Error: {0}")]
    #[diagnostic(
        code(ontolift::infra::store),
        help("The store state file may be corrupted or locked by another process.")
    )]
    Store(String),

    // --- WAREHOUSE TRANSPORT ---
    // Transport-level failures (network, session). These are the only
    // retryable errors; semantic verify/deploy failures come back as data.
    #[error("Warehouse Transport Error: {0}")]
    #[diagnostic(code(ontolift::infra::warehouse))]
    Warehouse(String),
}

impl InfrastructureError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Warehouse(_))
    }
}
