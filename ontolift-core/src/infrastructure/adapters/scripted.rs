// ontolift-core/src/infrastructure/adapters/scripted.rs

// In-process warehouse double. It plays back a configured catalog, view
// inventory and answer script, and records every call, so the whole
// lifecycle (verify, deploy, rollback capture, drift, regression) runs
// offline. Deployments mutate the simulated inventory like the real
// warehouse would.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::drift::CatalogSnapshot;
use crate::error::OntoliftError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::warehouse::{
    AskOutcome, DeployOutcome, ExportResult, VerifyOutcome, WarehouseClient,
};

#[derive(Debug, Default)]
struct Inner {
    catalog: CatalogSnapshot,
    /// view fqn -> live YAML
    views: BTreeMap<String, String>,
    /// Semantic verify rejections to report (consumed per call batch)
    verify_errors: Vec<String>,
    deploy_errors: Vec<String>,
    /// Fail the next N calls with a transport error (retry testing)
    transport_failures_left: u32,
    /// question substring -> scripted outcome
    answers: Vec<(String, AskOutcome)>,
    calls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ScriptedWarehouse {
    inner: Mutex<Inner>,
}

impl ScriptedWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, OntoliftError> {
        self.inner.lock().map_err(|_| {
            OntoliftError::Infrastructure(InfrastructureError::Warehouse(
                "warehouse mutex poisoned".into(),
            ))
        })
    }

    pub fn set_catalog(&self, catalog: CatalogSnapshot) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.catalog = catalog;
        }
    }

    pub fn put_view(&self, fqn: &str, yaml: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.views.insert(fqn.to_string(), yaml.to_string());
        }
    }

    pub fn script_verify_errors(&self, errors: Vec<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.verify_errors = errors;
        }
    }

    pub fn script_deploy_errors(&self, errors: Vec<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.deploy_errors = errors;
        }
    }

    pub fn script_transport_failures(&self, count: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.transport_failures_left = count;
        }
    }

    pub fn script_answer(&self, question_contains: &str, outcome: AskOutcome) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .answers
                .push((question_contains.to_string(), outcome));
        }
    }

    /// Call log, for assertions (`verify`, `deploy RETAIL_DB...`, ...)
    pub fn calls(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.calls.clone())
            .unwrap_or_default()
    }

    pub fn live_yaml(&self, fqn: &str) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.views.get(fqn).cloned())
    }

    fn take_transport_failure(inner: &mut Inner) -> bool {
        if inner.transport_failures_left > 0 {
            inner.transport_failures_left -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl WarehouseClient for ScriptedWarehouse {
    async fn verify(
        &self,
        _yaml: &str,
        database: &str,
        schema: &str,
    ) -> Result<VerifyOutcome, OntoliftError> {
        let mut inner = self.lock()?;
        inner.calls.push(format!("verify {}.{}", database, schema));
        if Self::take_transport_failure(&mut inner) {
            return Err(InfrastructureError::Warehouse("connection reset".into()).into());
        }
        if inner.verify_errors.is_empty() {
            Ok(VerifyOutcome {
                ok: true,
                errors: vec![],
                warnings: vec![],
            })
        } else {
            Ok(VerifyOutcome {
                ok: false,
                errors: inner.verify_errors.clone(),
                warnings: vec![],
            })
        }
    }

    async fn deploy(
        &self,
        yaml: &str,
        database: &str,
        schema: &str,
        view_name: &str,
    ) -> Result<DeployOutcome, OntoliftError> {
        let mut inner = self.lock()?;
        let fqn = format!("{}.{}.{}", database, schema, view_name);
        inner.calls.push(format!("deploy {}", fqn));
        if Self::take_transport_failure(&mut inner) {
            return Err(InfrastructureError::Warehouse("connection reset".into()).into());
        }
        if !inner.deploy_errors.is_empty() {
            return Ok(DeployOutcome {
                ok: false,
                errors: inner.deploy_errors.clone(),
            });
        }
        inner.views.insert(fqn, yaml.to_string());
        Ok(DeployOutcome {
            ok: true,
            errors: vec![],
        })
    }

    async fn export_existing(&self, view_fqn: &str) -> Result<ExportResult, OntoliftError> {
        let mut inner = self.lock()?;
        inner.calls.push(format!("export {}", view_fqn));
        Ok(match inner.views.get(view_fqn) {
            Some(yaml) => ExportResult::Found(yaml.clone()),
            None => ExportResult::NotFound,
        })
    }

    async fn list_catalog(
        &self,
        database: &str,
        schema: &str,
    ) -> Result<CatalogSnapshot, OntoliftError> {
        let mut inner = self.lock()?;
        inner
            .calls
            .push(format!("list_catalog {}.{}", database, schema));
        Ok(inner.catalog.clone())
    }

    async fn ask(&self, view_fqn: &str, question: &str) -> Result<AskOutcome, OntoliftError> {
        let mut inner = self.lock()?;
        inner.calls.push(format!("ask {}", view_fqn));
        let scripted = inner
            .answers
            .iter()
            .find(|(needle, _)| question.contains(needle.as_str()))
            .map(|(_, outcome)| outcome.clone());
        Ok(scripted.unwrap_or_else(|| AskOutcome {
            sql: format!("SELECT 1 FROM {}", view_fqn),
            answer: "no scripted answer".to_string(),
            latency_ms: 5,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deploy_updates_inventory_and_export() {
        let warehouse = ScriptedWarehouse::new();
        assert_eq!(
            warehouse.export_existing("DB.S.view").await.unwrap(),
            ExportResult::NotFound
        );

        warehouse
            .deploy("name: retail\n", "DB", "S", "view")
            .await
            .unwrap();
        assert_eq!(
            warehouse.export_existing("DB.S.view").await.unwrap(),
            ExportResult::Found("name: retail\n".into())
        );
    }

    #[tokio::test]
    async fn test_transport_failures_then_recovery() {
        let warehouse = ScriptedWarehouse::new();
        warehouse.script_transport_failures(2);

        assert!(warehouse.verify("y", "DB", "S").await.is_err());
        assert!(warehouse.verify("y", "DB", "S").await.is_err());
        let outcome = warehouse.verify("y", "DB", "S").await.unwrap();
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn test_scripted_answers_match_on_substring() {
        let warehouse = ScriptedWarehouse::new();
        warehouse.script_answer(
            "revenue",
            AskOutcome {
                sql: "SELECT SUM(amount) FROM orders".into(),
                answer: "Total revenue is 42".into(),
                latency_ms: 12,
            },
        );

        let hit = warehouse
            .ask("DB.S.view", "what is the total revenue?")
            .await
            .unwrap();
        assert_eq!(hit.latency_ms, 12);
        assert!(hit.sql.contains("orders"));

        let miss = warehouse.ask("DB.S.view", "unrelated").await.unwrap();
        assert_eq!(miss.answer, "no scripted answer");
    }
}
