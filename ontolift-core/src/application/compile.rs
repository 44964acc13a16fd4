// ontolift-core/src/application/compile.rs

// Compile use case: gate check, CompileRun lifecycle, bundle emission.
// Compilation itself is CPU-bound and synchronous; the async runner wraps
// this call when it needs to be non-blocking.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::application::evaluate::ensure_gates;
use crate::application::versioning::load_version_ir;
use crate::domain::compiler::{ArtifactBundle, CompileMeta, CompileOptions, Compiler, EnvironmentTarget};
use crate::domain::gates::ThresholdProfile;
use crate::domain::records::{CompileRun, RunStatus};
use crate::error::OntoliftError;
use crate::infrastructure::fs::write_bundle;
use crate::ports::store::VersionStore;

#[derive(Debug)]
pub struct CompileOutput {
    pub run: CompileRun,
    pub bundle: ArtifactBundle,
    pub bundle_dir: PathBuf,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Compile a stored version into a content-addressed artifact bundle under
/// `target_dir/bundles/<hash>/`.
pub fn compile_version(
    store: &dyn VersionStore,
    workspace: &str,
    ontology: &str,
    version_number: u32,
    profile: ThresholdProfile,
    environments: Vec<EnvironmentTarget>,
    target_dir: &Path,
) -> Result<CompileOutput, OntoliftError> {
    let (version, ir) = load_version_ir(store, workspace, ontology, version_number)?;

    // Input errors (gates included) surface before any RUNNING row exists.
    ensure_gates(&ir, profile)?;

    let meta = CompileMeta {
        ontology: ontology.to_string(),
        version_number,
        content_hash: version.content_hash.clone(),
        created_at: now(),
    };
    let default_target = Compiler::default_target(&ir, &meta)?;
    let options = CompileOptions { environments };

    let mut run = CompileRun {
        id: store.next_id("compile")?,
        workspace: workspace.to_string(),
        ontology: ontology.to_string(),
        version_number,
        target: default_target.view_fqn(),
        options: serde_json::json!({
            "profile": profile.as_str(),
            "environments": options.environments.iter()
                .filter_map(|e| e.name.clone())
                .collect::<Vec<_>>(),
        }),
        status: RunStatus::Running,
        bundle_hash: None,
        rollback_unavailable: false,
        error: None,
        started_at: now(),
        completed_at: None,
    };
    store.record_compile_run(&run)?;

    let bundle = match Compiler::compile(&ir, &meta, &options) {
        Ok(bundle) => bundle,
        Err(e) => {
            run.status = RunStatus::Failed;
            run.error = Some(e.to_string());
            run.completed_at = Some(now());
            store.record_compile_run(&run)?;
            return Err(e.into());
        }
    };

    let bundle_dir = target_dir.join("bundles").join(&bundle.content_hash);
    if let Err(e) = write_bundle(&bundle_dir, &bundle) {
        run.status = RunStatus::Failed;
        run.error = Some(e.to_string());
        run.completed_at = Some(now());
        store.record_compile_run(&run)?;
        return Err(e.into());
    }

    run.status = RunStatus::Success;
    run.bundle_hash = Some(bundle.content_hash.clone());
    run.completed_at = Some(now());
    store.record_compile_run(&run)?;

    info!(
        ontology,
        version = version_number,
        bundle = %bundle.content_hash,
        "Bundle compiled"
    );
    Ok(CompileOutput {
        run,
        bundle,
        bundle_dir,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::versioning::create_version;
    use crate::infrastructure::store::{FileStore, StoreOptions};
    use tempfile::tempdir;

    const ODL: &str = r#"{
        "version": "1.0",
        "name": "retail",
        "objects": [
            { "name": "Customer", "identifiers": ["customer_id"],
              "properties": [
                { "name": "customer_id", "type": "string", "nullable": false, "required": true },
                { "name": "email", "type": "string" }
              ] },
            { "name": "Order", "identifiers": ["order_id"],
              "properties": [
                { "name": "order_id", "type": "string", "nullable": false, "required": true },
                { "name": "customer_id", "type": "string" },
                { "name": "amount", "type": "decimal" }
              ] }
        ],
        "relationships": [
            { "name": "placed_by", "from": "Order", "to": "Customer",
              "joinKeys": [["customer_id", "customer_id"]], "cardinality": "many_to_one" }
        ],
        "metrics": [
            { "name": "TotalRevenue", "expression": "SUM(amount)", "grain": ["Order"], "type": "sum" }
        ],
        "targetMapping": { "database": "RETAIL_DB", "schema": "PUBLIC",
                           "warehouse": "ANALYTICS_WH",
                           "tableMappings": { "Customer": "customers", "Order": "orders" } }
    }"#;

    fn seeded_store(dir: &Path) -> FileStore {
        let store = FileStore::open(&dir.join("store"), StoreOptions::default()).unwrap();
        store.ensure_workspace("ws1", "ws").unwrap();
        create_version(&store, "ws1", "retail", ODL, "dev", None).unwrap();
        store
    }

    #[test]
    fn test_compile_writes_bundle_and_run() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());

        let output = compile_version(
            &store,
            "ws1",
            "retail",
            1,
            ThresholdProfile::Standard,
            vec![],
            &dir.path().join("target"),
        )
        .unwrap();

        assert_eq!(output.run.status, RunStatus::Success);
        assert_eq!(
            output.run.bundle_hash.as_deref(),
            Some(output.bundle.content_hash.as_str())
        );
        assert_eq!(output.run.target, "RETAIL_DB.PUBLIC.retail_view");
        assert!(output.bundle_dir.join("semantic_model.yaml").exists());
        assert!(output.bundle_dir.join("verify.sql").exists());
        assert!(output.bundle_dir.join("metadata.json").exists());

        let stored = store.get_compile_run(&output.run.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Success);
    }

    #[test]
    fn test_gate_failure_creates_no_run() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());

        // Break deployability by removing one table mapping
        let mut payload: serde_json::Value = serde_json::from_str(ODL).unwrap();
        payload["targetMapping"]["tableMappings"]
            .as_object_mut()
            .unwrap()
            .remove("Order");
        create_version(&store, "ws1", "retail", &payload.to_string(), "dev", None).unwrap();

        let err = compile_version(
            &store,
            "ws1",
            "retail",
            2,
            ThresholdProfile::Standard,
            vec![],
            &dir.path().join("target"),
        )
        .unwrap_err();
        assert_eq!(err.code().as_str(), "GATE_FAILED");
        // The gate rejection happened before any run row was allocated
        assert!(store.get_compile_run("compile-1").unwrap().is_none());
    }

    #[test]
    fn test_compile_same_version_twice_is_content_addressed() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let target = dir.path().join("target");

        let first = compile_version(
            &store,
            "ws1",
            "retail",
            1,
            ThresholdProfile::Standard,
            vec![],
            &target,
        )
        .unwrap();
        let second = compile_version(
            &store,
            "ws1",
            "retail",
            1,
            ThresholdProfile::Standard,
            vec![],
            &target,
        )
        .unwrap();

        assert_eq!(first.bundle.content_hash, second.bundle.content_hash);
        assert_eq!(first.bundle_dir, second.bundle_dir);
    }
}
