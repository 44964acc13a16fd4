// ontolift-core/src/application/evaluate.rs

use chrono::Utc;
use tracing::info;

use crate::application::versioning::{diff_versions, load_version_ir};
use crate::domain::error::DomainError;
use crate::domain::gates::{EvalOutcome, Evaluator, ThresholdProfile};
use crate::domain::odl::OntologyIr;
use crate::domain::records::EvalRun;
use crate::error::OntoliftError;
use crate::ports::store::VersionStore;

/// Evaluate a stored version against a threshold profile and persist the
/// EvalRun record. When a predecessor version exists its diff feeds the
/// breaking-changes gate.
pub fn evaluate_version(
    store: &dyn VersionStore,
    workspace: &str,
    ontology: &str,
    version_number: u32,
    profile: ThresholdProfile,
) -> Result<EvalRun, OntoliftError> {
    let (_, ir) = load_version_ir(store, workspace, ontology, version_number)?;

    let diff = if version_number > 1
        && store
            .get_version(workspace, ontology, version_number - 1)?
            .is_some()
    {
        Some(diff_versions(
            store,
            workspace,
            ontology,
            version_number - 1,
            version_number,
        )?)
    } else {
        None
    };
    let outcome = Evaluator::evaluate_with_diff(&ir, diff.as_ref(), profile);

    let now = Utc::now().to_rfc3339();
    let run = EvalRun {
        id: store.next_id("eval")?,
        workspace: workspace.to_string(),
        ontology: ontology.to_string(),
        version_number,
        profile: profile.as_str().to_string(),
        passed: outcome.passed,
        outcome,
        created_at: now.clone(),
        completed_at: Some(now),
    };
    store.record_eval_run(&run)?;

    info!(
        ontology,
        version = version_number,
        profile = %profile,
        passed = run.passed,
        "Evaluation recorded"
    );
    Ok(run)
}

/// Gate check used by compile/deploy: a version that does not pass the
/// chosen profile never reaches the compiler.
pub fn ensure_gates(ir: &OntologyIr, profile: ThresholdProfile) -> Result<EvalOutcome, OntoliftError> {
    let outcome = Evaluator::evaluate(ir, profile);
    if !outcome.passed {
        let gate_id = outcome
            .first_failure
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        return Err(DomainError::GateFailed {
            message: format!("profile '{}' rejected gate '{}'", profile, gate_id),
            gate_id,
        }
        .into());
    }
    Ok(outcome)
}
