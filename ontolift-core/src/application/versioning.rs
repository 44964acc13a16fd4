// ontolift-core/src/application/versioning.rs

// Version lifecycle use cases: every save goes validate -> normalize ->
// hash -> insert, so whatever sits in the store is canonical by
// construction.

use tracing::info;

use crate::domain::diff::{DiffEngine, DiffReport};
use crate::domain::error::DomainError;
use crate::domain::normalize::Normalizer;
use crate::domain::odl::{OdlDocument, OdlValidator, OntologyIr};
use crate::domain::records::{OntologyDiffRecord, OntologyVersion};
use crate::error::OntoliftError;
use crate::ports::store::VersionStore;

/// Validate, normalize and persist an ODL payload as the next version of
/// the ontology. Input errors surface before anything is written.
pub fn create_version(
    store: &dyn VersionStore,
    workspace: &str,
    ontology: &str,
    payload: &str,
    author: &str,
    notes: Option<String>,
) -> Result<(OntologyVersion, OntologyIr), OntoliftError> {
    let doc = OdlDocument::from_json(payload)?;
    let ir = Normalizer::normalize(&OdlValidator::validate(&doc)?);

    let canonical = Normalizer::canonical_json(&ir)
        .map_err(|e| OntoliftError::InternalError(format!("canonical serialization: {}", e)))?;
    let content_hash = Normalizer::content_hash(&canonical);

    store.ensure_ontology(workspace, ontology)?;
    let version = store.insert_version(
        workspace,
        ontology,
        canonical,
        content_hash,
        author.to_string(),
        notes,
    )?;

    info!(
        ontology,
        version = version.version_number,
        hash = %version.content_hash,
        "Version created"
    );
    Ok((version, ir))
}

/// Load a stored version and rebuild its IR. Stored payloads are canonical,
/// so re-validation cannot fail unless the store was tampered with.
pub fn load_version_ir(
    store: &dyn VersionStore,
    workspace: &str,
    ontology: &str,
    number: u32,
) -> Result<(OntologyVersion, OntologyIr), OntoliftError> {
    let version = store
        .get_version(workspace, ontology, number)?
        .ok_or_else(|| DomainError::VersionNotFound {
            ontology: ontology.to_string(),
            number,
        })?;
    let doc = OdlDocument::from_json(&version.payload)?;
    let ir = Normalizer::normalize(&OdlValidator::validate(&doc)?);
    Ok((version, ir))
}

/// Structural diff between two stored versions. Computed diffs persist as
/// immutable records keyed by the version pair; later calls are served from
/// the store.
pub fn diff_versions(
    store: &dyn VersionStore,
    workspace: &str,
    ontology: &str,
    from: u32,
    to: u32,
) -> Result<DiffReport, OntoliftError> {
    if let Some(record) = store.get_diff(workspace, ontology, from, to)? {
        return Ok(record.report);
    }

    let (_, old_ir) = load_version_ir(store, workspace, ontology, from)?;
    let (_, new_ir) = load_version_ir(store, workspace, ontology, to)?;
    let report = DiffEngine::diff(&old_ir, &new_ir);

    store.record_diff(&OntologyDiffRecord {
        workspace: workspace.to_string(),
        ontology: ontology.to_string(),
        old_version: from,
        new_version: to,
        report: report.clone(),
        created_at: chrono::Utc::now().to_rfc3339(),
    })?;
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::infrastructure::store::{FileStore, StoreOptions};
    use tempfile::tempdir;

    const ODL_V1: &str = r#"{
        "version": "1.0",
        "name": "retail",
        "objects": [
            { "name": "Customer", "identifiers": ["customer_id"],
              "properties": [
                { "name": "customer_id", "type": "string", "nullable": false, "required": true },
                { "name": "email", "type": "string" }
              ] }
        ],
        "targetMapping": { "database": "RETAIL_DB", "schema": "PUBLIC",
                           "tableMappings": { "Customer": "customers" } }
    }"#;

    const ODL_V2: &str = r#"{
        "version": "1.0",
        "name": "retail",
        "objects": [
            { "name": "Customer", "identifiers": ["customer_id"],
              "properties": [
                { "name": "customer_id", "type": "string", "nullable": false, "required": true },
                { "name": "email", "type": "string" },
                { "name": "phone", "type": "string" }
              ] }
        ],
        "targetMapping": { "database": "RETAIL_DB", "schema": "PUBLIC",
                           "tableMappings": { "Customer": "customers" } }
    }"#;

    fn store(dir: &std::path::Path) -> FileStore {
        let s = FileStore::open(dir, StoreOptions::default()).unwrap();
        s.ensure_workspace("ws1", "Workspace One").unwrap();
        s
    }

    #[test]
    fn test_create_version_normalizes_and_hashes() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());

        let (version, _) = create_version(&s, "ws1", "retail", ODL_V1, "dev", None).unwrap();
        assert_eq!(version.version_number, 1);
        assert_eq!(version.content_hash.len(), 64);
        // The stored payload is the canonical serialization of its own IR
        let (_, ir) = load_version_ir(&s, "ws1", "retail", 1).unwrap();
        let recanonical = Normalizer::canonical_json(&ir).unwrap();
        assert_eq!(version.payload, recanonical);
        assert_eq!(version.content_hash, Normalizer::content_hash(&recanonical));
    }

    #[test]
    fn test_same_payload_is_duplicate_content() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        create_version(&s, "ws1", "retail", ODL_V1, "dev", None).unwrap();

        // Different whitespace, same normalized content
        let reformatted = ODL_V1.replace("\n", " ");
        let err = create_version(&s, "ws1", "retail", &reformatted, "dev", None).unwrap_err();
        assert_eq!(err.code().as_str(), "DUPLICATE_CONTENT");
    }

    #[test]
    fn test_invalid_payload_writes_nothing() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let bad = r#"{ "objects": [ { "name": "Customer", "identifiers": [], "properties": [] } ],
                       "dimensions": [ { "name": "d", "sourceProperty": "Order.nonexistent" } ] }"#;
        let err = create_version(&s, "ws1", "retail", bad, "dev", None).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_STRUCTURE");
        // No ontology/version record was created on the input-error path
        assert!(s.get_ontology("ws1", "retail").unwrap().is_none());
    }

    #[test]
    fn test_diff_versions_evolution() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        create_version(&s, "ws1", "retail", ODL_V1, "dev", None).unwrap();
        create_version(&s, "ws1", "retail", ODL_V2, "dev", None).unwrap();

        let report = diff_versions(&s, "ws1", "retail", 1, 2).unwrap();
        assert_eq!(report.changes.len(), 1);
        assert!(!report.summary.has_breaking);

        // The computed diff persisted as an immutable record for the pair,
        // and re-diffing serves the same bytes
        let record = s.get_diff("ws1", "retail", 1, 2).unwrap().expect("diff record");
        assert_eq!(record.report, report);
        assert_eq!(diff_versions(&s, "ws1", "retail", 1, 2).unwrap(), report);

        // Self-diff is empty
        let same = diff_versions(&s, "ws1", "retail", 2, 2).unwrap();
        assert!(same.is_empty());
    }
}
