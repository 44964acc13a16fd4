// ontolift-core/src/application/regression.rs

// Regression runner: a question set against the deployed view's natural-
// language endpoint. Each question is judged against its declared
// expectations; the aggregate lands in a RegressionRun record plus a
// JUnit-style XML report.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::application::runner::CancelFlag;
use crate::domain::error::DomainError;
use crate::domain::records::RegressionRun;
use crate::error::OntoliftError;
use crate::infrastructure::config::Limits;
use crate::infrastructure::fs::atomic_write;
use crate::ports::store::VersionStore;
use crate::ports::warehouse::{AskOutcome, WarehouseClient};

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSet {
    #[serde(default)]
    pub name: Option<String>,
    pub questions: Vec<QuestionSpec>,
}

impl QuestionSet {
    pub fn from_yaml(content: &str) -> Result<Self, OntoliftError> {
        serde_yaml::from_str(content)
            .map_err(|e| crate::infrastructure::error::InfrastructureError::Yaml(e).into())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSpec {
    pub question: String,
    #[serde(default)]
    pub expected_tables: Vec<String>,
    #[serde(default)]
    pub expected_sql_patterns: Vec<String>,
    #[serde(default)]
    pub expected_answer_snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question: String,
    pub passed: bool,
    pub failures: Vec<String>,
    pub sql: String,
    pub answer: String,
    pub latency_ms: u64,
}

/// A question passes iff every declared expectation holds.
pub fn judge_question(spec: &QuestionSpec, outcome: &AskOutcome) -> Vec<String> {
    let mut failures = Vec::new();
    let sql_lower = outcome.sql.to_lowercase();

    for table in &spec.expected_tables {
        if !sql_lower.contains(&table.to_lowercase()) {
            failures.push(format!("expected table '{}' not in SQL", table));
        }
    }
    for pattern in &spec.expected_sql_patterns {
        if !outcome.sql.contains(pattern.as_str()) {
            failures.push(format!("expected SQL pattern '{}' not found", pattern));
        }
    }
    if let Some(snippet) = &spec.expected_answer_snippet {
        if !outcome.answer.contains(snippet.as_str()) {
            failures.push(format!("expected answer snippet '{}' not found", snippet));
        }
    }
    failures
}

pub async fn run_regression(
    store: &dyn VersionStore,
    warehouse: &dyn WarehouseClient,
    workspace: &str,
    ontology: &str,
    set: &QuestionSet,
    limits: &Limits,
    cancel: &CancelFlag,
    report_dir: &Path,
) -> Result<RegressionRun, OntoliftError> {
    // Regression runs are refused against a non-deployed view.
    let view = store
        .deployed_view(workspace, ontology)?
        .ok_or_else(|| DomainError::NotDeployed(ontology.to_string()))?;

    let question_timeout = Duration::from_secs(limits.question_timeout_secs);
    let started_at = Utc::now().to_rfc3339();
    let mut results = Vec::with_capacity(set.questions.len());
    let mut total_latency_ms = 0u64;

    for spec in &set.questions {
        cancel.checkpoint()?;

        let outcome = tokio::time::timeout(
            question_timeout,
            warehouse.ask(&view.view_fqn, &spec.question),
        )
        .await
        .map_err(|_| OntoliftError::Timeout {
            stage: "regression_question".into(),
            seconds: limits.question_timeout_secs,
        })??;

        total_latency_ms += outcome.latency_ms;
        let failures = judge_question(spec, &outcome);
        results.push(QuestionResult {
            question: spec.question.clone(),
            passed: failures.is_empty(),
            failures,
            sql: outcome.sql,
            answer: outcome.answer,
            latency_ms: outcome.latency_ms,
        });
    }

    let passed_count = results.iter().filter(|r| r.passed).count();
    let failed_count = results.len() - passed_count;
    let run_id = store.next_id("regression")?;

    // JUnit-style summary next to the run record
    let junit = render_junit(set.name.as_deref().unwrap_or(ontology), &results);
    let junit_path = report_dir.join(format!("{}.xml", run_id));
    std::fs::create_dir_all(report_dir)
        .map_err(crate::infrastructure::error::InfrastructureError::Io)?;
    atomic_write(&junit_path, junit)?;

    let run = RegressionRun {
        id: run_id,
        workspace: workspace.to_string(),
        ontology: ontology.to_string(),
        version_number: view.version_number,
        view_fqn: view.view_fqn.clone(),
        question_count: results.len(),
        passed_count,
        failed_count,
        overall_pass: failed_count == 0,
        total_latency_ms,
        results: serde_json::to_value(&results)
            .map_err(|e| OntoliftError::InternalError(format!("result blob: {}", e)))?,
        junit_path: Some(junit_path.to_string_lossy().to_string()),
        created_at: started_at,
        completed_at: Some(Utc::now().to_rfc3339()),
    };
    store.record_regression_run(&run)?;

    info!(
        ontology,
        questions = run.question_count,
        passed = passed_count,
        failed = failed_count,
        "Regression run recorded"
    );
    Ok(run)
}

fn render_junit(suite_name: &str, results: &[QuestionResult]) -> String {
    let failures = results.iter().filter(|r| !r.passed).count();
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\">\n",
        xml_escape(suite_name),
        results.len(),
        failures
    ));
    for result in results {
        let time = result.latency_ms as f64 / 1000.0;
        if result.passed {
            xml.push_str(&format!(
                "  <testcase name=\"{}\" time=\"{:.3}\"/>\n",
                xml_escape(&result.question),
                time
            ));
        } else {
            xml.push_str(&format!(
                "  <testcase name=\"{}\" time=\"{:.3}\">\n    <failure message=\"{}\"/>\n  </testcase>\n",
                xml_escape(&result.question),
                time,
                xml_escape(&result.failures.join("; "))
            ));
        }
    }
    xml.push_str("</testsuite>\n");
    xml
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::records::DeployedView;
    use crate::infrastructure::adapters::ScriptedWarehouse;
    use crate::infrastructure::store::{FileStore, StoreOptions};
    use tempfile::tempdir;

    const FQN: &str = "RETAIL_DB.PUBLIC.retail_view";

    fn outcome(sql: &str, answer: &str) -> AskOutcome {
        AskOutcome {
            sql: sql.to_string(),
            answer: answer.to_string(),
            latency_ms: 10,
        }
    }

    #[test]
    fn test_judge_tables_case_insensitive() {
        let spec = QuestionSpec {
            question: "revenue?".into(),
            expected_tables: vec!["ORDERS".into()],
            expected_sql_patterns: vec![],
            expected_answer_snippet: None,
        };
        assert!(judge_question(&spec, &outcome("SELECT * FROM orders", "x")).is_empty());
        assert_eq!(
            judge_question(&spec, &outcome("SELECT * FROM customers", "x")).len(),
            1
        );
    }

    #[test]
    fn test_judge_patterns_are_literal() {
        let spec = QuestionSpec {
            question: "q".into(),
            expected_tables: vec![],
            expected_sql_patterns: vec!["SUM(amount)".into()],
            expected_answer_snippet: Some("42".into()),
        };
        let good = outcome("SELECT SUM(amount) FROM orders", "the total is 42");
        assert!(judge_question(&spec, &good).is_empty());

        let bad = outcome("SELECT sum(amount) FROM orders", "the total is 41");
        let failures = judge_question(&spec, &bad);
        assert_eq!(failures.len(), 2); // pattern is case-sensitive, snippet missing
    }

    fn deployed_store(dir: &std::path::Path) -> FileStore {
        let store = FileStore::open(&dir.join("store"), StoreOptions::default()).unwrap();
        store.ensure_workspace("ws1", "ws").unwrap();
        store.ensure_ontology("ws1", "retail").unwrap();
        store
            .set_deployed_view(&DeployedView {
                workspace: "ws1".into(),
                ontology: "retail".into(),
                version_number: 1,
                view_fqn: FQN.into(),
                deployed_at: Utc::now().to_rfc3339(),
            })
            .unwrap();
        store
    }

    fn question_set() -> QuestionSet {
        QuestionSet {
            name: Some("retail smoke".into()),
            questions: vec![
                QuestionSpec {
                    question: "what is the total revenue?".into(),
                    expected_tables: vec!["orders".into()],
                    expected_sql_patterns: vec!["SUM".into()],
                    expected_answer_snippet: Some("revenue".into()),
                },
                QuestionSpec {
                    question: "how many customers signed up?".into(),
                    expected_tables: vec!["customers".into()],
                    expected_sql_patterns: vec![],
                    expected_answer_snippet: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_regression_requires_deployment() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("store"), StoreOptions::default()).unwrap();
        store.ensure_workspace("ws1", "ws").unwrap();
        store.ensure_ontology("ws1", "retail").unwrap();
        let warehouse = ScriptedWarehouse::new();

        let err = run_regression(
            &store,
            &warehouse,
            "ws1",
            "retail",
            &question_set(),
            &Limits::default(),
            &CancelFlag::new(),
            &dir.path().join("reports"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code().as_str(), "NOT_FOUND");
        assert!(warehouse.calls().is_empty());
    }

    #[tokio::test]
    async fn test_regression_pass_and_junit() {
        let dir = tempdir().unwrap();
        let store = deployed_store(dir.path());
        let warehouse = ScriptedWarehouse::new();
        warehouse.script_answer(
            "revenue",
            outcome("SELECT SUM(amount) FROM orders", "total revenue is 42"),
        );
        warehouse.script_answer(
            "customers",
            outcome("SELECT COUNT(*) FROM customers", "1200 signups"),
        );

        let run = run_regression(
            &store,
            &warehouse,
            "ws1",
            "retail",
            &question_set(),
            &Limits::default(),
            &CancelFlag::new(),
            &dir.path().join("reports"),
        )
        .await
        .unwrap();

        assert!(run.overall_pass);
        assert_eq!(run.question_count, 2);
        assert_eq!(run.passed_count, 2);
        assert_eq!(run.total_latency_ms, 20);

        let junit = std::fs::read_to_string(run.junit_path.unwrap()).unwrap();
        assert!(junit.contains("tests=\"2\" failures=\"0\""));
        assert!(junit.contains("what is the total revenue?"));
    }

    #[tokio::test]
    async fn test_regression_failure_is_an_outcome_not_an_error() {
        let dir = tempdir().unwrap();
        let store = deployed_store(dir.path());
        let warehouse = ScriptedWarehouse::new();
        // Unscripted questions fall back to a default answer that matches
        // none of the expectations.

        let run = run_regression(
            &store,
            &warehouse,
            "ws1",
            "retail",
            &question_set(),
            &Limits::default(),
            &CancelFlag::new(),
            &dir.path().join("reports"),
        )
        .await
        .unwrap();

        assert!(!run.overall_pass);
        assert_eq!(run.failed_count, 2);
        let junit = std::fs::read_to_string(run.junit_path.unwrap()).unwrap();
        assert!(junit.contains("<failure"));
    }

    #[test]
    fn test_question_set_from_yaml() {
        let yaml = r#"
name: retail smoke
questions:
  - question: what is the total revenue?
    expected_tables: [orders]
    expected_sql_patterns: ["SUM"]
    expected_answer_snippet: revenue
  - question: how many customers?
"#;
        let set = QuestionSet::from_yaml(yaml).unwrap();
        assert_eq!(set.questions.len(), 2);
        assert_eq!(set.questions[0].expected_tables, vec!["orders"]);
        assert!(set.questions[1].expected_tables.is_empty());
    }
}
