// ontolift-core/src/ports/store.rs

// The version store is the only mutator of persisted records. Every
// component takes a handle to this trait and goes through its operations;
// implementations must linearize version numbering per ontology.

use crate::domain::records::{
    CompileRun, DeployedView, DriftEvent, DriftStatus, EvalRun, Ontology, OntologyDiffRecord,
    OntologyVersion, RegressionRun, Workspace,
};
use crate::error::OntoliftError;

pub trait VersionStore: Send + Sync {
    // --- WORKSPACES / ONTOLOGIES ---

    fn ensure_workspace(&self, id: &str, name: &str) -> Result<Workspace, OntoliftError>;

    fn ensure_ontology(&self, workspace: &str, name: &str) -> Result<Ontology, OntoliftError>;

    fn get_ontology(&self, workspace: &str, name: &str) -> Result<Option<Ontology>, OntoliftError>;

    /// Soft delete: the ontology keeps its versions but stops accepting new
    /// ones and is skipped by drift scans.
    fn deactivate_ontology(&self, workspace: &str, name: &str) -> Result<(), OntoliftError>;

    // --- VERSIONS ---

    /// Insert a new immutable version. The store allocates the next monotone
    /// version number for the ontology; concurrent calls serialize.
    fn insert_version(
        &self,
        workspace: &str,
        ontology: &str,
        payload: String,
        content_hash: String,
        author: String,
        notes: Option<String>,
    ) -> Result<OntologyVersion, OntoliftError>;

    fn get_version(
        &self,
        workspace: &str,
        ontology: &str,
        number: u32,
    ) -> Result<Option<OntologyVersion>, OntoliftError>;

    /// Descending by creation (latest first).
    fn list_versions(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Vec<OntologyVersion>, OntoliftError>;

    fn latest_version(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Option<OntologyVersion>, OntoliftError>;

    // --- DIFFS ---

    /// Persist a computed diff for the (old, new) pair. First write wins;
    /// later writes for the same pair are ignored (the record is immutable).
    fn record_diff(&self, diff: &OntologyDiffRecord) -> Result<(), OntoliftError>;

    fn get_diff(
        &self,
        workspace: &str,
        ontology: &str,
        old_version: u32,
        new_version: u32,
    ) -> Result<Option<OntologyDiffRecord>, OntoliftError>;

    // --- RUN RECORDS ---

    /// Allocate a store-unique record id with the given prefix.
    fn next_id(&self, prefix: &str) -> Result<String, OntoliftError>;

    /// Insert or update by id. Terminal rows refuse further updates.
    fn record_compile_run(&self, run: &CompileRun) -> Result<(), OntoliftError>;

    fn get_compile_run(&self, id: &str) -> Result<Option<CompileRun>, OntoliftError>;

    fn record_eval_run(&self, run: &EvalRun) -> Result<(), OntoliftError>;

    fn record_regression_run(&self, run: &RegressionRun) -> Result<(), OntoliftError>;

    // --- DRIFT EVENTS ---

    /// Insert an OPEN drift event unless an identical open event already
    /// exists (coalescing on the dedup key). Returns false when coalesced.
    fn record_drift_event(&self, event: &DriftEvent) -> Result<bool, OntoliftError>;

    fn open_drift_events(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Vec<DriftEvent>, OntoliftError>;

    /// OPEN -> RESOLVED / IGNORED only.
    fn set_drift_status(&self, id: &str, status: DriftStatus) -> Result<(), OntoliftError>;

    // --- LIVE VIEW ---

    fn set_deployed_view(&self, view: &DeployedView) -> Result<(), OntoliftError>;

    fn deployed_view(
        &self,
        workspace: &str,
        ontology: &str,
    ) -> Result<Option<DeployedView>, OntoliftError>;
}
