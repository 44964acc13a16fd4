// ontolift-core/src/ports/warehouse.rs

// This file defines what the pipeline needs from a warehouse, without
// knowing how it's reached. Semantic rejections (a verify that says "no")
// come back as data; transport failures come back as errors, and only those
// are retryable.

use async_trait::async_trait;

use crate::domain::drift::CatalogSnapshot;
use crate::error::OntoliftError;

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    pub ok: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportResult {
    Found(String),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AskOutcome {
    pub sql: String,
    pub answer: String,
    pub latency_ms: u64,
}

#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Verify-only path: checks the YAML against `database.schema` without
    /// creating anything.
    async fn verify(
        &self,
        yaml: &str,
        database: &str,
        schema: &str,
    ) -> Result<VerifyOutcome, OntoliftError>;

    /// Create-or-replace path.
    async fn deploy(
        &self,
        yaml: &str,
        database: &str,
        schema: &str,
        view_name: &str,
    ) -> Result<DeployOutcome, OntoliftError>;

    /// Export the YAML of an existing semantic view (rollback capture).
    async fn export_existing(&self, view_fqn: &str) -> Result<ExportResult, OntoliftError>;

    /// Live catalog: table -> column -> raw type.
    async fn list_catalog(
        &self,
        database: &str,
        schema: &str,
    ) -> Result<CatalogSnapshot, OntoliftError>;

    /// Natural-language analytics endpoint over a deployed view.
    async fn ask(&self, view_fqn: &str, question: &str) -> Result<AskOutcome, OntoliftError>;
}
