// ontolift-core/src/domain/drift.rs

// Pure drift classification. The probes get fed a declared IR plus whatever
// the warehouse reported (catalog snapshot, exported YAML) and return
// findings; persistence and deduplication happen in the application layer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::odl::ir::{OntologyIr, PropertyType};

/// Maximum edit distance for the column-rename inference.
const RENAME_MAX_DISTANCE: usize = 2;

/// table -> column -> raw catalog type, as reported by the warehouse.
pub type CatalogSnapshot = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftEventType {
    #[serde(rename = "COLUMN_RENAMED")]
    ColumnRenamed,
    #[serde(rename = "COLUMN_ADDED")]
    ColumnAdded,
    #[serde(rename = "COLUMN_DROPPED")]
    ColumnDropped,
    #[serde(rename = "COLUMN_TYPE_CHANGED")]
    ColumnTypeChanged,
    #[serde(rename = "TABLE_MISSING")]
    TableMissing,
    #[serde(rename = "YAML_DIVERGED")]
    YamlDiverged,
}

impl DriftEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ColumnRenamed => "COLUMN_RENAMED",
            Self::ColumnAdded => "COLUMN_ADDED",
            Self::ColumnDropped => "COLUMN_DROPPED",
            Self::ColumnTypeChanged => "COLUMN_TYPE_CHANGED",
            Self::TableMissing => "TABLE_MISSING",
            Self::YamlDiverged => "YAML_DIVERGED",
        }
    }
}

impl std::fmt::Display for DriftEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftFinding {
    pub event_type: DriftEventType,
    pub details: serde_json::Value,
}

impl DriftFinding {
    /// Deduplication key: identical open events coalesce on
    /// {ontology, event_type, details-hash}.
    pub fn dedup_key(&self, ontology: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(ontology.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.event_type.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.details.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// --- COARSE TYPE EQUIVALENCE ---

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoarseType {
    Text,
    Numeric,
    Boolean,
    Temporal,
    Other(String),
}

impl CoarseType {
    pub fn from_catalog(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        // Strip precision suffixes: NUMBER(38,0) -> number
        let base = lowered.split('(').next().unwrap_or(&lowered).trim();
        match base {
            "varchar" | "char" | "text" | "string" => Self::Text,
            "number" | "decimal" | "numeric" | "integer" | "int" | "bigint" | "float"
            | "double" => Self::Numeric,
            "boolean" | "bool" => Self::Boolean,
            "date" | "datetime" | "time" | "timestamp" | "timestamp_ntz" | "timestamp_tz"
            | "timestamp_ltz" => Self::Temporal,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn from_property(prop_type: PropertyType) -> Self {
        match prop_type {
            PropertyType::String => Self::Text,
            PropertyType::Number | PropertyType::Integer | PropertyType::Decimal => Self::Numeric,
            PropertyType::Boolean => Self::Boolean,
            PropertyType::Date | PropertyType::Timestamp | PropertyType::Time => Self::Temporal,
            PropertyType::Array => Self::Other("array".into()),
            PropertyType::Object => Self::Other("object".into()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::Other(s) => s.as_str(),
        }
    }
}

// --- MAPPING DRIFT ---

pub struct MappingDriftProbe;

impl MappingDriftProbe {
    pub fn probe(ir: &OntologyIr, catalog: &CatalogSnapshot) -> Vec<DriftFinding> {
        let mut findings = Vec::new();

        // Case-insensitive table lookup: warehouse catalogs tend to shout.
        let tables_lower: BTreeMap<String, &BTreeMap<String, String>> = catalog
            .iter()
            .map(|(t, cols)| (t.to_lowercase(), cols))
            .collect();

        for obj in &ir.objects {
            let table = obj
                .mapping
                .as_ref()
                .and_then(|m| m.table.clone())
                .or_else(|| ir.target_mapping.table_mappings.get(&obj.name).cloned())
                .unwrap_or_else(|| crate::domain::compiler::snake_case(&obj.name));

            let Some(live_columns) = tables_lower.get(&table.to_lowercase()) else {
                findings.push(DriftFinding {
                    event_type: DriftEventType::TableMissing,
                    details: serde_json::json!({ "object": obj.name, "table": table }),
                });
                continue;
            };

            let live_lower: BTreeMap<String, &String> = live_columns
                .iter()
                .map(|(c, t)| (c.to_lowercase(), t))
                .collect();
            let declared_lower: BTreeMap<String, PropertyType> = obj
                .properties
                .iter()
                .map(|p| (p.name.to_lowercase(), p.prop_type))
                .collect();

            let mut dropped: Vec<(&String, CoarseType)> = declared_lower
                .iter()
                .filter(|(name, _)| !live_lower.contains_key(*name))
                .map(|(name, t)| (name, CoarseType::from_property(*t)))
                .collect();
            let mut added: Vec<(&String, CoarseType)> = live_lower
                .iter()
                .filter(|(name, _)| !declared_lower.contains_key(*name))
                .map(|(name, t)| (name, CoarseType::from_catalog(t)))
                .collect();

            // Rename inference: a dropped/added pair with a small edit
            // distance and the same coarse type is one rename, not two events.
            let mut consumed_added: BTreeSet<String> = BTreeSet::new();
            let mut consumed_dropped: BTreeSet<String> = BTreeSet::new();
            for (old_name, old_type) in &dropped {
                let best = added
                    .iter()
                    .filter(|(name, t)| !consumed_added.contains(name.as_str()) && t == old_type)
                    .map(|(name, _)| (levenshtein(old_name, name), name))
                    .filter(|(distance, _)| *distance <= RENAME_MAX_DISTANCE)
                    .min();
                if let Some((_, new_name)) = best {
                    consumed_added.insert((*new_name).clone());
                    consumed_dropped.insert((*old_name).clone());
                    findings.push(DriftFinding {
                        event_type: DriftEventType::ColumnRenamed,
                        details: serde_json::json!({
                            "object": obj.name, "table": table,
                            "from": old_name, "to": new_name,
                        }),
                    });
                }
            }
            dropped.retain(|(name, _)| !consumed_dropped.contains(name.as_str()));
            added.retain(|(name, _)| !consumed_added.contains(name.as_str()));

            for (name, _) in dropped {
                findings.push(DriftFinding {
                    event_type: DriftEventType::ColumnDropped,
                    details: serde_json::json!({
                        "object": obj.name, "table": table, "column": name,
                    }),
                });
            }
            for (name, _) in added {
                findings.push(DriftFinding {
                    event_type: DriftEventType::ColumnAdded,
                    details: serde_json::json!({
                        "object": obj.name, "table": table, "column": name,
                    }),
                });
            }

            // Shared columns: coarse type comparison
            for (name, declared_type) in &declared_lower {
                if let Some(raw) = live_lower.get(name) {
                    let live_type = CoarseType::from_catalog(raw);
                    let expected = CoarseType::from_property(*declared_type);
                    if live_type != expected {
                        findings.push(DriftFinding {
                            event_type: DriftEventType::ColumnTypeChanged,
                            details: serde_json::json!({
                                "object": obj.name, "table": table, "column": name,
                                "declared": expected.label(), "live": live_type.label(),
                            }),
                        });
                    }
                }
            }
        }

        findings
    }
}

// --- VIEW DRIFT ---

pub struct ViewDriftProbe;

impl ViewDriftProbe {
    /// Compare the YAML the compiler would emit today against the exported
    /// live definition. Comparison happens on parsed values, so comments and
    /// formatting differences do not count as drift.
    pub fn compare(ontology: &str, expected_yaml: &str, live_yaml: &str) -> Option<DriftFinding> {
        let expected: Result<serde_yaml::Value, _> = serde_yaml::from_str(expected_yaml);
        let live: Result<serde_yaml::Value, _> = serde_yaml::from_str(live_yaml);

        let diverged = match (&expected, &live) {
            (Ok(a), Ok(b)) => a != b,
            // An unparseable side is always a divergence
            _ => true,
        };
        if !diverged {
            return None;
        }

        Some(DriftFinding {
            event_type: DriftEventType::YamlDiverged,
            details: serde_json::json!({
                "ontology": ontology,
                "diff": first_line_differences(expected_yaml, live_yaml, 10),
            }),
        })
    }
}

fn first_line_differences(expected: &str, live: &str, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let expected_lines: Vec<&str> = expected.lines().collect();
    let live_lines: Vec<&str> = live.lines().collect();
    for i in 0..expected_lines.len().max(live_lines.len()) {
        let a = expected_lines.get(i).copied().unwrap_or("");
        let b = live_lines.get(i).copied().unwrap_or("");
        if a != b {
            out.push(format!("line {}: expected '{}', live '{}'", i + 1, a, b));
            if out.len() >= cap {
                break;
            }
        }
    }
    out
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::odl::ir::{ObjectDef, PropertyDef, TargetMapping};

    fn prop(name: &str, prop_type: PropertyType) -> PropertyDef {
        PropertyDef {
            name: name.to_string(),
            prop_type,
            description: None,
            nullable: true,
            required: false,
        }
    }

    fn customer_ir() -> OntologyIr {
        OntologyIr {
            version: "1.0".into(),
            name: Some("retail".into()),
            description: None,
            objects: vec![ObjectDef {
                name: "Customer".into(),
                description: None,
                identifiers: vec!["customer_id".into()],
                properties: vec![
                    prop("customer_id", PropertyType::String),
                    prop("email", PropertyType::String),
                    prop("signup_date", PropertyType::Date),
                ],
                mapping: None,
            }],
            relationships: vec![],
            metrics: vec![],
            dimensions: vec![],
            target_mapping: TargetMapping {
                database: Some("RETAIL_DB".into()),
                schema: Some("PUBLIC".into()),
                warehouse: None,
                table_mappings: [("Customer".to_string(), "customers".to_string())]
                    .into_iter()
                    .collect(),
            },
        }
    }

    fn catalog(columns: &[(&str, &str)]) -> CatalogSnapshot {
        let cols: BTreeMap<String, String> = columns
            .iter()
            .map(|(c, t)| (c.to_string(), t.to_string()))
            .collect();
        [("CUSTOMERS".to_string(), cols)].into_iter().collect()
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("email", "email"), 0);
        assert_eq!(levenshtein("email", "emails"), 1);
        assert_eq!(levenshtein("email", "e_mail"), 1);
        assert_eq!(levenshtein("email", "contact_email"), 8);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_in_sync_catalog_has_no_findings() {
        let findings = MappingDriftProbe::probe(
            &customer_ir(),
            &catalog(&[
                ("CUSTOMER_ID", "VARCHAR"),
                ("EMAIL", "VARCHAR"),
                ("SIGNUP_DATE", "DATE"),
            ]),
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_dropped_column() {
        // The warehouse dropped customers.email
        let findings = MappingDriftProbe::probe(
            &customer_ir(),
            &catalog(&[("CUSTOMER_ID", "VARCHAR"), ("SIGNUP_DATE", "DATE")]),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].event_type, DriftEventType::ColumnDropped);
        assert_eq!(findings[0].details["column"], "email");
    }

    #[test]
    fn test_rename_inference_within_distance() {
        // email -> emails: distance 1, same coarse type => one rename event
        let findings = MappingDriftProbe::probe(
            &customer_ir(),
            &catalog(&[
                ("CUSTOMER_ID", "VARCHAR"),
                ("EMAILS", "VARCHAR"),
                ("SIGNUP_DATE", "DATE"),
            ]),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].event_type, DriftEventType::ColumnRenamed);
        assert_eq!(findings[0].details["from"], "email");
        assert_eq!(findings[0].details["to"], "emails");
    }

    #[test]
    fn test_rename_rejected_on_type_mismatch() {
        // Same small distance but different coarse type: two events
        let findings = MappingDriftProbe::probe(
            &customer_ir(),
            &catalog(&[
                ("CUSTOMER_ID", "VARCHAR"),
                ("EMAILS", "NUMBER(38,0)"),
                ("SIGNUP_DATE", "DATE"),
            ]),
        );
        assert_eq!(findings.len(), 2);
        assert!(findings
            .iter()
            .any(|f| f.event_type == DriftEventType::ColumnDropped));
        assert!(findings
            .iter()
            .any(|f| f.event_type == DriftEventType::ColumnAdded));
    }

    #[test]
    fn test_rename_rejected_beyond_distance() {
        // email -> contact_email is way past the threshold
        let findings = MappingDriftProbe::probe(
            &customer_ir(),
            &catalog(&[
                ("CUSTOMER_ID", "VARCHAR"),
                ("CONTACT_EMAIL", "VARCHAR"),
                ("SIGNUP_DATE", "DATE"),
            ]),
        );
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_missing_table() {
        let ir = customer_ir();
        let findings = MappingDriftProbe::probe(&ir, &CatalogSnapshot::new());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].event_type, DriftEventType::TableMissing);
        assert_eq!(findings[0].details["table"], "customers");
    }

    #[test]
    fn test_type_change() {
        let findings = MappingDriftProbe::probe(
            &customer_ir(),
            &catalog(&[
                ("CUSTOMER_ID", "VARCHAR"),
                ("EMAIL", "VARCHAR"),
                ("SIGNUP_DATE", "VARCHAR"),
            ]),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].event_type, DriftEventType::ColumnTypeChanged);
        assert_eq!(findings[0].details["declared"], "temporal");
        assert_eq!(findings[0].details["live"], "text");
    }

    #[test]
    fn test_view_drift_ignores_comments() {
        let expected = "# header\nname: retail\ntables: []\n";
        let live = "name: retail\ntables: []\n";
        assert!(ViewDriftProbe::compare("retail", expected, live).is_none());
    }

    #[test]
    fn test_view_drift_detects_divergence() {
        let expected = "name: retail\ntables: []\n";
        let live = "name: retail_old\ntables: []\n";
        let finding = ViewDriftProbe::compare("retail", expected, live).expect("diverged");
        assert_eq!(finding.event_type, DriftEventType::YamlDiverged);
        assert!(!finding.details["diff"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_dedup_key_is_stable() {
        let finding = DriftFinding {
            event_type: DriftEventType::ColumnDropped,
            details: serde_json::json!({ "object": "Customer", "column": "email" }),
        };
        assert_eq!(finding.dedup_key("retail"), finding.dedup_key("retail"));
        assert_ne!(finding.dedup_key("retail"), finding.dedup_key("other"));
    }
}
