// ontolift-core/src/application/drift.rs

// Drift scan: compare the declared ontology against the live warehouse
// (catalog probe), and the expected compiled YAML against the live view
// (view probe). Findings persist as OPEN events; identical open events
// coalesce.

use chrono::Utc;
use tracing::info;

use crate::application::runner::CancelFlag;
use crate::application::versioning::load_version_ir;
use crate::domain::compiler::{CompileMeta, CompileOptions, Compiler};
use crate::domain::drift::{DriftEventType, DriftFinding, MappingDriftProbe, ViewDriftProbe};
use crate::domain::error::DomainError;
use crate::domain::records::{DriftEvent, DriftStatus};
use crate::error::OntoliftError;
use crate::ports::store::VersionStore;
use crate::ports::warehouse::{ExportResult, WarehouseClient};

#[derive(Debug)]
pub struct DriftScanReport {
    pub version_number: u32,
    pub findings: Vec<DriftFinding>,
    pub new_events: usize,
    pub coalesced: usize,
}

pub async fn run_drift_scan(
    store: &dyn VersionStore,
    warehouse: &dyn WarehouseClient,
    workspace: &str,
    ontology: &str,
    cancel: &CancelFlag,
) -> Result<DriftScanReport, OntoliftError> {
    // Drift events only ever reference active ontologies.
    match store.get_ontology(workspace, ontology)? {
        Some(o) if o.is_active => {}
        _ => return Err(DomainError::OntologyNotFound(ontology.to_string()).into()),
    }

    // Scan the deployed version when there is one, the latest otherwise.
    let deployed = store.deployed_view(workspace, ontology)?;
    let version_number = match &deployed {
        Some(view) => view.version_number,
        None => store
            .latest_version(workspace, ontology)?
            .map(|v| v.version_number)
            .ok_or_else(|| DomainError::VersionNotFound {
                ontology: ontology.to_string(),
                number: 0,
            })?,
    };
    let (version, ir) = load_version_ir(store, workspace, ontology, version_number)?;

    let meta = CompileMeta {
        ontology: ontology.to_string(),
        version_number,
        content_hash: version.content_hash.clone(),
        created_at: Utc::now().to_rfc3339(),
    };
    let target = Compiler::default_target(&ir, &meta)?;

    // --- MAPPING DRIFT ---
    cancel.checkpoint()?;
    let catalog = warehouse
        .list_catalog(&target.database, &target.schema)
        .await?;
    let mut findings = MappingDriftProbe::probe(&ir, &catalog);

    // --- VIEW DRIFT (only meaningful once something is deployed) ---
    if let Some(view) = &deployed {
        cancel.checkpoint()?;
        let bundle = Compiler::compile(&ir, &meta, &CompileOptions::default())?;
        let expected = bundle
            .file("semantic_model.yaml")
            .ok_or_else(|| OntoliftError::InternalError("bundle lost its YAML".into()))?;

        match warehouse.export_existing(&view.view_fqn).await? {
            ExportResult::Found(live) => {
                if let Some(finding) = ViewDriftProbe::compare(ontology, expected, &live) {
                    findings.push(finding);
                }
            }
            ExportResult::NotFound => findings.push(DriftFinding {
                event_type: DriftEventType::YamlDiverged,
                details: serde_json::json!({
                    "ontology": ontology,
                    "reason": format!("deployed view '{}' no longer exists", view.view_fqn),
                }),
            }),
        }
    }

    // --- PERSIST (dedup inside the store transaction) ---
    let mut new_events = 0;
    let mut coalesced = 0;
    for finding in &findings {
        let event = DriftEvent {
            id: store.next_id("drift")?,
            workspace: workspace.to_string(),
            ontology: ontology.to_string(),
            event_type: finding.event_type,
            details: finding.details.clone(),
            dedup_key: finding.dedup_key(ontology),
            status: DriftStatus::Open,
            created_at: Utc::now().to_rfc3339(),
            updated_at: None,
        };
        if store.record_drift_event(&event)? {
            new_events += 1;
        } else {
            coalesced += 1;
        }
    }

    info!(
        ontology,
        version = version_number,
        findings = findings.len(),
        new_events,
        coalesced,
        "Drift scan finished"
    );
    Ok(DriftScanReport {
        version_number,
        findings,
        new_events,
        coalesced,
    })
}
