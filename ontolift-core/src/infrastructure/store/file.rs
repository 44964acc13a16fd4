// ontolift-core/src/infrastructure/store/file.rs

// File-backed version store: the whole state lives in one JSON document
// persisted with the atomic write pattern after every mutation. The store
// lock linearizes version numbering and drift deduplication.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::domain::error::DomainError;
use crate::domain::records::{
    CompileRun, DeployedView, DriftEvent, DriftStatus, EvalRun, Ontology, OntologyDiffRecord,
    OntologyVersion, RegressionRun, Workspace,
};
use crate::error::OntoliftError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;
use crate::ports::store::VersionStore;

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub reject_duplicate_content: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            reject_duplicate_content: true,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    workspaces: BTreeMap<String, Workspace>,
    /// key: "workspace/ontology"
    ontologies: BTreeMap<String, Ontology>,
    /// key: "workspace/ontology", ascending by version number
    versions: BTreeMap<String, Vec<OntologyVersion>>,
    /// key: "workspace/ontology/old->new"
    diffs: BTreeMap<String, OntologyDiffRecord>,
    compile_runs: BTreeMap<String, CompileRun>,
    eval_runs: BTreeMap<String, EvalRun>,
    regression_runs: BTreeMap<String, RegressionRun>,
    drift_events: BTreeMap<String, DriftEvent>,
    /// key: "workspace/ontology"
    deployed_views: BTreeMap<String, DeployedView>,
    id_counter: u64,
}

pub struct FileStore {
    state_path: PathBuf,
    options: StoreOptions,
    state: Mutex<StoreState>,
}

fn scope_key(workspace: &str, ontology: &str) -> String {
    format!("{}/{}", workspace, ontology)
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl FileStore {
    pub fn open(root: &Path, options: StoreOptions) -> Result<Self, InfrastructureError> {
        fs::create_dir_all(root).map_err(InfrastructureError::Io)?;
        let state_path = root.join("state.json");

        let state = if state_path.exists() {
            let content = fs::read_to_string(&state_path).map_err(InfrastructureError::Io)?;
            serde_json::from_str(&content).map_err(|e| {
                InfrastructureError::Store(format!(
                    "corrupted state file {:?}: {}",
                    state_path, e
                ))
            })?
        } else {
            info!(path = ?state_path, "Initializing empty store");
            StoreState::default()
        };

        Ok(Self {
            state_path,
            options,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, OntoliftError> {
        self.state.lock().map_err(|_| {
            OntoliftError::Infrastructure(InfrastructureError::Store(
                "store lock poisoned".into(),
            ))
        })
    }

    /// Persist the full state atomically. Called under the lock, so
    /// concurrent mutations serialize.
    fn persist(&self, state: &StoreState) -> Result<(), OntoliftError> {
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| InfrastructureError::Store(format!("state serialization: {}", e)))?;
        atomic_write(&self.state_path, content).map_err(OntoliftError::Infrastructure)
    }
}

impl VersionStore for FileStore {
    fn ensure_workspace(&self, id: &str, name: &str) -> Result<Workspace, OntoliftError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.workspaces.get(id) {
            return Ok(existing.clone());
        }
        let workspace = Workspace {
            id: id.to_string(),
            name: name.to_string(),
            created_at: now(),
        };
        state.workspaces.insert(id.to_string(), workspace.clone());
        self.persist(&state)?;
        Ok(workspace)
    }

    fn ensure_ontology(&self, workspace: &str, name: &str) -> Result<Ontology, OntoliftError> {
        let mut state = self.lock()?;
        let key = scope_key(workspace, name);
        if let Some(existing) = state.ontologies.get(&key) {
            return Ok(existing.clone());
        }
        let ontology = Ontology {
            workspace: workspace.to_string(),
            name: name.to_string(),
            is_active: true,
            created_at: now(),
        };
        state.ontologies.insert(key, ontology.clone());
        self.persist(&state)?;
        Ok(ontology)
    }

    fn get_ontology(&self, workspace: &str, name: &str) -> Result<Option<Ontology>, OntoliftError> {
        let state = self.lock()?;
        Ok(state.ontologies.get(&scope_key(workspace, name)).cloned())
    }

    fn deactivate_ontology(&self, workspace: &str, name: &str) -> Result<(), OntoliftError> {
        let mut state = self.lock()?;
        let key = scope_key(workspace, name);
        let Some(ontology) = state.ontologies.get_mut(&key) else {
            return Err(DomainError::OntologyNotFound(key).into());
        };
        ontology.is_active = false;
        self.persist(&state)
    }

    fn insert_version(
        &self,
        workspace: &str,
        ontology: &str,
        payload: String,
        content_hash: String,
        author: String,
        notes: Option<String>,
    ) -> Result<OntologyVersion, OntoliftError> {
        let mut state = self.lock()?;
        let key = scope_key(workspace, ontology);

        match state.ontologies.get(&key) {
            Some(o) if o.is_active => {}
            _ => return Err(DomainError::OntologyNotFound(key).into()),
        }

        let versions = state.versions.entry(key).or_default();
        if self.options.reject_duplicate_content
            && versions.iter().any(|v| v.content_hash == content_hash)
        {
            return Err(DomainError::DuplicateContent {
                ontology: ontology.to_string(),
                hash: content_hash,
            }
            .into());
        }

        let version_number = versions.last().map_or(1, |v| v.version_number + 1);
        let version = OntologyVersion {
            workspace: workspace.to_string(),
            ontology: ontology.to_string(),
            version_number,
            payload,
            content_hash,
            author,
            notes,
            created_at: now(),
        };
        versions.push(version.clone());
        self.persist(&state)?;
        Ok(version)
    }

    fn get_version(
        &self,
        workspace: &str,
        ontology: &str,
        number: u32,
    ) -> Result<Option<OntologyVersion>, OntoliftError> {
        let state = self.lock()?;
        Ok(state
            .versions
            .get(&scope_key(workspace, ontology))
            .and_then(|v| v.iter().find(|x| x.version_number == number))
            .cloned())
    }

    fn list_versions(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Vec<OntologyVersion>, OntoliftError> {
        let state = self.lock()?;
        let mut versions = state
            .versions
            .get(&scope_key(workspace, ontology))
            .cloned()
            .unwrap_or_default();
        versions.reverse(); // latest first
        Ok(versions)
    }

    fn latest_version(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Option<OntologyVersion>, OntoliftError> {
        let state = self.lock()?;
        Ok(state
            .versions
            .get(&scope_key(workspace, ontology))
            .and_then(|v| v.last())
            .cloned())
    }

    fn record_diff(&self, diff: &OntologyDiffRecord) -> Result<(), OntoliftError> {
        let mut state = self.lock()?;
        let key = format!(
            "{}/{}/{}->{}",
            diff.workspace, diff.ontology, diff.old_version, diff.new_version
        );
        // First write wins: the pair is immutable once computed.
        if state.diffs.contains_key(&key) {
            return Ok(());
        }
        state.diffs.insert(key, diff.clone());
        self.persist(&state)
    }

    fn get_diff(
        &self,
        workspace: &str,
        ontology: &str,
        old_version: u32,
        new_version: u32,
    ) -> Result<Option<OntologyDiffRecord>, OntoliftError> {
        let state = self.lock()?;
        let key = format!("{}/{}/{}->{}", workspace, ontology, old_version, new_version);
        Ok(state.diffs.get(&key).cloned())
    }

    fn next_id(&self, prefix: &str) -> Result<String, OntoliftError> {
        let mut state = self.lock()?;
        state.id_counter += 1;
        let id = format!("{}-{}", prefix, state.id_counter);
        self.persist(&state)?;
        Ok(id)
    }

    fn record_compile_run(&self, run: &CompileRun) -> Result<(), OntoliftError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.compile_runs.get(&run.id) {
            if existing.status.is_terminal() {
                return Err(InfrastructureError::Store(format!(
                    "compile run '{}' is terminal and immutable",
                    run.id
                ))
                .into());
            }
        }
        state.compile_runs.insert(run.id.clone(), run.clone());
        self.persist(&state)
    }

    fn get_compile_run(&self, id: &str) -> Result<Option<CompileRun>, OntoliftError> {
        let state = self.lock()?;
        Ok(state.compile_runs.get(id).cloned())
    }

    fn record_eval_run(&self, run: &EvalRun) -> Result<(), OntoliftError> {
        let mut state = self.lock()?;
        state.eval_runs.insert(run.id.clone(), run.clone());
        self.persist(&state)
    }

    fn record_regression_run(&self, run: &RegressionRun) -> Result<(), OntoliftError> {
        let mut state = self.lock()?;
        state.regression_runs.insert(run.id.clone(), run.clone());
        self.persist(&state)
    }

    fn record_drift_event(&self, event: &DriftEvent) -> Result<bool, OntoliftError> {
        let mut state = self.lock()?;

        // Coalesce: an identical open event already covers this finding.
        let duplicate = state.drift_events.values().any(|e| {
            e.status == DriftStatus::Open
                && e.workspace == event.workspace
                && e.ontology == event.ontology
                && e.dedup_key == event.dedup_key
        });
        if duplicate {
            return Ok(false);
        }

        state.drift_events.insert(event.id.clone(), event.clone());
        self.persist(&state)?;
        Ok(true)
    }

    fn open_drift_events(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Vec<DriftEvent>, OntoliftError> {
        let state = self.lock()?;
        Ok(state
            .drift_events
            .values()
            .filter(|e| {
                e.status == DriftStatus::Open
                    && e.workspace == workspace
                    && e.ontology == ontology
            })
            .cloned()
            .collect())
    }

    fn set_drift_status(&self, id: &str, status: DriftStatus) -> Result<(), OntoliftError> {
        let mut state = self.lock()?;
        let Some(event) = state.drift_events.get_mut(id) else {
            return Err(InfrastructureError::Store(format!("unknown drift event '{}'", id)).into());
        };
        if event.status != DriftStatus::Open || status == DriftStatus::Open {
            return Err(InfrastructureError::Store(format!(
                "drift event '{}': only OPEN -> RESOLVED/IGNORED transitions are allowed",
                id
            ))
            .into());
        }
        event.status = status;
        event.updated_at = Some(now());
        self.persist(&state)
    }

    fn set_deployed_view(&self, view: &DeployedView) -> Result<(), OntoliftError> {
        let mut state = self.lock()?;
        state
            .deployed_views
            .insert(scope_key(&view.workspace, &view.ontology), view.clone());
        self.persist(&state)
    }

    fn deployed_view(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Option<DeployedView>, OntoliftError> {
        let state = self.lock()?;
        Ok(state
            .deployed_views
            .get(&scope_key(workspace, ontology))
            .cloned())
    }
}
