// ontolift-core/src/application/deploy.rs

// Two-phase deployment: capture the live view for rollback, verify-only,
// then the real create-or-replace. Verification retries transport errors
// with exponential backoff; deploy itself is never auto-retried. Any
// failure leaves the live view untouched.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::application::evaluate::ensure_gates;
use crate::application::runner::CancelFlag;
use crate::application::versioning::load_version_ir;
use crate::domain::compiler::{
    CompileMeta, CompileOptions, Compiler, EnvironmentTarget, ScriptBuilder,
};
use crate::domain::gates::ThresholdProfile;
use crate::domain::records::{CompileRun, DeployedView, RunStatus};
use crate::error::OntoliftError;
use crate::infrastructure::config::Limits;
use crate::infrastructure::fs::write_bundle;
use crate::ports::store::VersionStore;
use crate::ports::warehouse::{ExportResult, VerifyOutcome, WarehouseClient};

/// Backoff schedule for transport-level verify failures (milliseconds).
const VERIFY_BACKOFF_MS: [u64; 3] = [100, 400, 1600];

#[derive(Debug)]
pub struct DeployOutput {
    pub run: CompileRun,
    pub deployed: DeployedView,
    pub bundle_dir: PathBuf,
    pub rollback_captured: bool,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

#[allow(clippy::too_many_arguments)]
pub async fn deploy_version(
    store: &dyn VersionStore,
    warehouse: &dyn WarehouseClient,
    workspace: &str,
    ontology: &str,
    version_number: u32,
    profile: ThresholdProfile,
    target_dir: &Path,
    limits: &Limits,
    cancel: &CancelFlag,
) -> Result<DeployOutput, OntoliftError> {
    let (version, ir) = load_version_ir(store, workspace, ontology, version_number)?;
    ensure_gates(&ir, profile)?;

    let meta = CompileMeta {
        ontology: ontology.to_string(),
        version_number,
        content_hash: version.content_hash.clone(),
        created_at: now(),
    };
    let env = Compiler::default_target(&ir, &meta)?;

    let mut run = CompileRun {
        id: store.next_id("deploy")?,
        workspace: workspace.to_string(),
        ontology: ontology.to_string(),
        version_number,
        target: env.view_fqn(),
        options: serde_json::json!({ "profile": profile.as_str(), "deploy": true }),
        status: RunStatus::Running,
        bundle_hash: None,
        rollback_unavailable: false,
        error: None,
        started_at: now(),
        completed_at: None,
    };
    store.record_compile_run(&run)?;

    match deploy_inner(store, warehouse, &ir, &meta, &env, limits, cancel, &mut run, target_dir)
        .await
    {
        Ok(output) => {
            run.status = RunStatus::Success;
            run.completed_at = Some(now());
            store.record_compile_run(&run)?;
            Ok(DeployOutput {
                run: run.clone(),
                deployed: output.0,
                bundle_dir: output.1,
                rollback_captured: output.2,
            })
        }
        Err(e) => {
            run.status = RunStatus::Failed;
            run.error = Some(e.to_string());
            run.completed_at = Some(now());
            store.record_compile_run(&run)?;
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn deploy_inner(
    store: &dyn VersionStore,
    warehouse: &dyn WarehouseClient,
    ir: &crate::domain::odl::OntologyIr,
    meta: &CompileMeta,
    env: &EnvironmentTarget,
    limits: &Limits,
    cancel: &CancelFlag,
    run: &mut CompileRun,
    target_dir: &Path,
) -> Result<(DeployedView, PathBuf, bool), OntoliftError> {
    let mut bundle = Compiler::compile(ir, meta, &CompileOptions::default())?;
    run.bundle_hash = Some(bundle.content_hash.clone());
    let yaml = bundle
        .file("semantic_model.yaml")
        .map(str::to_string)
        .ok_or_else(|| OntoliftError::InternalError("bundle lost its YAML".into()))?;

    cancel.checkpoint()?;

    // 1. Rollback capture, before anything touches the warehouse
    let rollback_captured = match warehouse.export_existing(&env.view_fqn()).await? {
        ExportResult::Found(previous_yaml) => {
            bundle.upsert("rollback_semantic_model.yaml", previous_yaml.clone());
            bundle.upsert(
                "rollback.sql",
                ScriptBuilder::rollback_script(env, Some(&previous_yaml)),
            );
            true
        }
        ExportResult::NotFound => {
            // Warning-level: the generated rollback stays drop-only
            warn!(view = %env.view_fqn(), "No existing view to capture, rollback unavailable");
            run.rollback_unavailable = true;
            false
        }
    };

    cancel.checkpoint()?;

    // 2. Verify-only, with stage-internal retries on transport errors
    let verify_timeout = Duration::from_secs(limits.verify_timeout_secs);
    let outcome = verify_with_retry(warehouse, &yaml, env, verify_timeout).await?;
    if !outcome.ok {
        return Err(OntoliftError::VerifyFailed(outcome.errors));
    }

    cancel.checkpoint()?;

    // 3. The real deploy. Never auto-retried.
    let deploy_timeout = Duration::from_secs(limits.deploy_timeout_secs);
    let deployed = tokio::time::timeout(
        deploy_timeout,
        warehouse.deploy(&yaml, &env.database, &env.schema, &env.view_name),
    )
    .await
    .map_err(|_| OntoliftError::Timeout {
        stage: "deploy".into(),
        seconds: limits.deploy_timeout_secs,
    })??;
    if !deployed.ok {
        return Err(OntoliftError::DeployFailed(deployed.errors));
    }

    // 4. Materialize the bundle (rollback capture included) and register
    // the live view
    let bundle_dir = target_dir.join("bundles").join(&bundle.content_hash);
    write_bundle(&bundle_dir, &bundle)?;

    let view = DeployedView {
        workspace: run.workspace.clone(),
        ontology: run.ontology.clone(),
        version_number: meta.version_number,
        view_fqn: env.view_fqn(),
        deployed_at: now(),
    };
    store.set_deployed_view(&view)?;

    info!(view = %view.view_fqn, version = view.version_number, "Deployed");
    Ok((view, bundle_dir, rollback_captured))
}

async fn verify_with_retry(
    warehouse: &dyn WarehouseClient,
    yaml: &str,
    env: &EnvironmentTarget,
    timeout: Duration,
) -> Result<VerifyOutcome, OntoliftError> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(
            timeout,
            warehouse.verify(yaml, &env.database, &env.schema),
        )
        .await
        {
            Err(_) => Err(OntoliftError::Timeout {
                stage: "verify".into(),
                seconds: timeout.as_secs(),
            }),
            Ok(inner) => inner,
        };

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() && attempt < VERIFY_BACKOFF_MS.len() => {
                warn!(attempt, error = %e, "Transient verify failure, backing off");
                tokio::time::sleep(Duration::from_millis(VERIFY_BACKOFF_MS[attempt])).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::versioning::create_version;
    use crate::infrastructure::adapters::ScriptedWarehouse;
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
              ] }
        ],
        "targetMapping": { "database": "RETAIL_DB", "schema": "PUBLIC",
                           "warehouse": "ANALYTICS_WH",
                           "tableMappings": { "Customer": "customers" } }
    }"#;

    const FQN: &str = "RETAIL_DB.PUBLIC.retail_view";

    fn seeded_store(dir: &Path) -> FileStore {
        let store = FileStore::open(&dir.join("store"), StoreOptions::default()).unwrap();
        store.ensure_workspace("ws1", "ws").unwrap();
        create_version(&store, "ws1", "retail", ODL, "dev", None).unwrap();
        store
    }

    async fn deploy(
        store: &FileStore,
        warehouse: &ScriptedWarehouse,
        dir: &Path,
    ) -> Result<DeployOutput, OntoliftError> {
        deploy_version(
            store,
            warehouse,
            "ws1",
            "retail",
            1,
            ThresholdProfile::Standard,
            &dir.join("target"),
            &Limits::default(),
            &CancelFlag::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_first_deploy_has_no_rollback_capture() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let warehouse = ScriptedWarehouse::new();

        let output = deploy(&store, &warehouse, dir.path()).await.unwrap();
        assert!(!output.rollback_captured);
        assert!(output.run.rollback_unavailable);
        assert_eq!(output.run.status, RunStatus::Success);

        // Drop-only rollback script, no captured YAML in the bundle dir
        let rollback =
            std::fs::read_to_string(output.bundle_dir.join("rollback.sql")).unwrap();
        assert!(rollback.contains("DROP SEMANTIC VIEW IF EXISTS"));
        assert!(!rollback.contains("CALL"));
        assert!(!output
            .bundle_dir
            .join("rollback_semantic_model.yaml")
            .exists());

        // Live view registered
        let view = store.deployed_view("ws1", "retail").unwrap().unwrap();
        assert_eq!(view.view_fqn, FQN);
        assert!(warehouse.live_yaml(FQN).is_some());
    }

    #[tokio::test]
    async fn test_redeploy_captures_previous_yaml() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let warehouse = ScriptedWarehouse::new();
        warehouse.put_view(FQN, "name: retail_old\ntables: []\n");

        let output = deploy(&store, &warehouse, dir.path()).await.unwrap();
        assert!(output.rollback_captured);
        assert!(!output.run.rollback_unavailable);

        // The captured YAML is exactly the pre-deploy export
        let captured = std::fs::read_to_string(
            output.bundle_dir.join("rollback_semantic_model.yaml"),
        )
        .unwrap();
        assert_eq!(captured, "name: retail_old\ntables: []\n");

        // rollback.sql now re-creates from the capture
        let rollback =
            std::fs::read_to_string(output.bundle_dir.join("rollback.sql")).unwrap();
        assert!(rollback.contains("DROP SEMANTIC VIEW IF EXISTS"));
        assert!(rollback.contains("name: retail_old"));

        // And the live view was replaced with the new definition
        assert!(warehouse.live_yaml(FQN).unwrap().contains("# ontology: retail"));
    }

    #[tokio::test]
    async fn test_verify_rejection_leaves_live_view_untouched() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let warehouse = ScriptedWarehouse::new();
        warehouse.put_view(FQN, "name: retail_old\n");
        warehouse.script_verify_errors(vec!["unknown column 'ghost'".into()]);

        let err = deploy(&store, &warehouse, dir.path()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "VERIFY_FAILED");

        // No deploy call ever happened, the old YAML is still live
        assert!(!warehouse.calls().iter().any(|c| c.starts_with("deploy")));
        assert_eq!(warehouse.live_yaml(FQN).unwrap(), "name: retail_old\n");
        assert!(store.deployed_view("ws1", "retail").unwrap().is_none());

        // The run row is terminal FAILED with the error text
        let run = store.get_compile_run("deploy-1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("ghost")));
    }

    #[tokio::test]
    async fn test_transient_verify_errors_are_retried() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let warehouse = ScriptedWarehouse::new();
        warehouse.script_transport_failures(2);

        let output = deploy(&store, &warehouse, dir.path()).await.unwrap();
        assert_eq!(output.run.status, RunStatus::Success);

        let verify_calls = warehouse
            .calls()
            .iter()
            .filter(|c| c.starts_with("verify"))
            .count();
        assert_eq!(verify_calls, 3); // two transport failures, then success
    }

    #[tokio::test]
    async fn test_deploy_rejection_is_terminal() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let warehouse = ScriptedWarehouse::new();
        warehouse.script_deploy_errors(vec!["insufficient privileges".into()]);

        let err = deploy(&store, &warehouse, dir.path()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "DEPLOY_FAILED");
        assert!(!err.is_retryable());
        assert!(store.deployed_view("ws1", "retail").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_canceled_before_verify() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let warehouse = ScriptedWarehouse::new();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = deploy_version(
            &store,
            &warehouse,
            "ws1",
            "retail",
            1,
            ThresholdProfile::Standard,
            &dir.path().join("target"),
            &Limits::default(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code().as_str(), "CANCELED");
        // The checkpoint fired before any warehouse call
        assert!(warehouse.calls().is_empty());
    }
}
