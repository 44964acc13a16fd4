// ontolift-core/src/domain/diff/change.rs

// The change taxonomy. Kind strings are stable: they are persisted in diff
// records and matched on by promotion tooling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "object.added")]
    ObjectAdded,
    #[serde(rename = "object.removed")]
    ObjectRemoved,
    #[serde(rename = "object.renamed")]
    ObjectRenamed,
    #[serde(rename = "property.added")]
    PropertyAdded,
    #[serde(rename = "property.removed")]
    PropertyRemoved,
    #[serde(rename = "property.type_changed")]
    PropertyTypeChanged,
    #[serde(rename = "property.nullable_changed")]
    PropertyNullableChanged,
    #[serde(rename = "property.required_changed")]
    PropertyRequiredChanged,
    #[serde(rename = "identifier.changed")]
    IdentifierChanged,
    #[serde(rename = "relationship.added")]
    RelationshipAdded,
    #[serde(rename = "relationship.removed")]
    RelationshipRemoved,
    #[serde(rename = "relationship.joinkeys_changed")]
    RelationshipJoinKeysChanged,
    #[serde(rename = "relationship.cardinality_changed")]
    RelationshipCardinalityChanged,
    #[serde(rename = "metric.added")]
    MetricAdded,
    #[serde(rename = "metric.removed")]
    MetricRemoved,
    #[serde(rename = "metric.expression_changed")]
    MetricExpressionChanged,
    #[serde(rename = "metric.grain_changed")]
    MetricGrainChanged,
    #[serde(rename = "dimension.added")]
    DimensionAdded,
    #[serde(rename = "dimension.removed")]
    DimensionRemoved,
    #[serde(rename = "dimension.source_changed")]
    DimensionSourceChanged,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectAdded => "object.added",
            Self::ObjectRemoved => "object.removed",
            Self::ObjectRenamed => "object.renamed",
            Self::PropertyAdded => "property.added",
            Self::PropertyRemoved => "property.removed",
            Self::PropertyTypeChanged => "property.type_changed",
            Self::PropertyNullableChanged => "property.nullable_changed",
            Self::PropertyRequiredChanged => "property.required_changed",
            Self::IdentifierChanged => "identifier.changed",
            Self::RelationshipAdded => "relationship.added",
            Self::RelationshipRemoved => "relationship.removed",
            Self::RelationshipJoinKeysChanged => "relationship.joinkeys_changed",
            Self::RelationshipCardinalityChanged => "relationship.cardinality_changed",
            Self::MetricAdded => "metric.added",
            Self::MetricRemoved => "metric.removed",
            Self::MetricExpressionChanged => "metric.expression_changed",
            Self::MetricGrainChanged => "metric.grain_changed",
            Self::DimensionAdded => "dimension.added",
            Self::DimensionRemoved => "dimension.removed",
            Self::DimensionSourceChanged => "dimension.source_changed",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Breaking,
    NonBreaking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Name-based attribution path (ex: `objects/Customer/properties/email`)
    pub path: String,
    pub kind: ChangeKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Count per kind string (ex: `property.added` -> 2)
    pub counts: BTreeMap<String, usize>,
    pub breaking: usize,
    pub non_breaking: usize,
    pub has_breaking: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    pub changes: Vec<ChangeRecord>,
    pub summary: DiffSummary,
}

impl DiffReport {
    pub fn from_changes(mut changes: Vec<ChangeRecord>) -> Self {
        // Deterministic output ordering: path, then kind.
        changes.sort_by(|a, b| a.path.cmp(&b.path).then(a.kind.cmp(&b.kind)));

        let mut summary = DiffSummary::default();
        for change in &changes {
            *summary.counts.entry(change.kind.to_string()).or_insert(0) += 1;
            match change.severity {
                Severity::Breaking => summary.breaking += 1,
                Severity::NonBreaking => summary.non_breaking += 1,
            }
        }
        summary.has_breaking = summary.breaking > 0;

        Self { changes, summary }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(ChangeKind::ObjectRenamed.to_string(), "object.renamed");
        assert_eq!(
            ChangeKind::RelationshipJoinKeysChanged.to_string(),
            "relationship.joinkeys_changed"
        );
    }

    #[test]
    fn test_summary_counts() {
        let report = DiffReport::from_changes(vec![
            ChangeRecord {
                path: "objects/Customer/properties/phone".into(),
                kind: ChangeKind::PropertyAdded,
                severity: Severity::NonBreaking,
                detail: None,
            },
            ChangeRecord {
                path: "objects/Customer/properties/email".into(),
                kind: ChangeKind::PropertyRemoved,
                severity: Severity::Breaking,
                detail: None,
            },
        ]);
        assert_eq!(report.summary.breaking, 1);
        assert_eq!(report.summary.non_breaking, 1);
        assert!(report.summary.has_breaking);
        assert_eq!(report.summary.counts["property.added"], 1);
        // Sorted by path: email before phone
        assert_eq!(report.changes[0].kind, ChangeKind::PropertyRemoved);
    }
}
