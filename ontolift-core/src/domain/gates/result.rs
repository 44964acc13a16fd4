// ontolift-core/src/domain/gates/result.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::gates::profile::ThresholdProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCategory {
    Structural,
    Semantic,
    Deployability,
}

impl GateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Semantic => "semantic",
            Self::Deployability => "deployability",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub category: GateCategory,
    pub status: GateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GateResult {
    pub fn pass(gate_id: &str, category: GateCategory) -> Self {
        Self {
            gate_id: gate_id.to_string(),
            category,
            status: GateStatus::Pass,
            message: None,
        }
    }

    pub fn warning(gate_id: &str, category: GateCategory, message: impl Into<String>) -> Self {
        Self {
            gate_id: gate_id.to_string(),
            category,
            status: GateStatus::Warning,
            message: Some(message.into()),
        }
    }

    pub fn error(gate_id: &str, category: GateCategory, message: impl Into<String>) -> Self {
        Self {
            gate_id: gate_id.to_string(),
            category,
            status: GateStatus::Error,
            message: Some(message.into()),
        }
    }
}

/// Per-gate blob persisted in EvalRun records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateMetric {
    pub status: GateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub passed: bool,
    pub profile: ThresholdProfile,
    /// category -> gate -> result
    pub metrics: BTreeMap<String, BTreeMap<String, GateMetric>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<String>,
}

impl EvalOutcome {
    pub fn from_results(results: Vec<GateResult>, profile: ThresholdProfile) -> Self {
        let mut metrics: BTreeMap<String, BTreeMap<String, GateMetric>> = BTreeMap::new();
        let mut first_failure = None;

        for result in &results {
            if first_failure.is_none() && profile.rejects(result) {
                first_failure = Some(result.gate_id.clone());
            }
            metrics
                .entry(result.category.as_str().to_string())
                .or_default()
                .insert(
                    result.gate_id.clone(),
                    GateMetric {
                        status: result.status,
                        message: result.message.clone(),
                    },
                );
        }

        Self {
            passed: first_failure.is_none(),
            profile,
            metrics,
            first_failure,
        }
    }
}
