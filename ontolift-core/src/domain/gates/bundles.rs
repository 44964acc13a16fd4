// ontolift-core/src/domain/gates/bundles.rs

// The three predefined gate bundles. Gates re-assert invariants the
// validator already enforces on the ODL path: evaluation also runs on IRs
// built programmatically or loaded from older store snapshots.

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;

use crate::domain::diff::DiffReport;
use crate::domain::gates::profile::ThresholdProfile;
use crate::domain::gates::result::{EvalOutcome, GateCategory, GateResult};
use crate::domain::odl::ir::{OntologyIr, PropertyType};

/// Tokens that must never appear in a metric expression.
const EXPRESSION_DENYLIST: [&str; 3] = [";", "DROP ", "GRANT "];

pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(ir: &OntologyIr, profile: ThresholdProfile) -> EvalOutcome {
        Self::evaluate_with_diff(ir, None, profile)
    }

    /// Evaluation with the diff against the predecessor version, when the
    /// caller has one. Breaking evolution is a warning-level finding:
    /// strict refuses it, standard and lenient let it through.
    pub fn evaluate_with_diff(
        ir: &OntologyIr,
        diff: Option<&DiffReport>,
        profile: ThresholdProfile,
    ) -> EvalOutcome {
        let mut results = Vec::new();
        results.extend(Self::structural_gates(ir, diff));
        results.extend(Self::semantic_gates(ir));
        results.extend(Self::deployability_gates(ir));
        EvalOutcome::from_results(results, profile)
    }

    // --- STRUCTURAL ---

    fn structural_gates(ir: &OntologyIr, diff: Option<&DiffReport>) -> Vec<GateResult> {
        let cat = GateCategory::Structural;
        let mut results = Vec::new();

        // unique_names: no collisions within any entity collection
        let mut duplicates = Vec::new();
        duplicates.extend(find_duplicates("object", ir.objects.iter().map(|o| &o.name)));
        duplicates.extend(find_duplicates(
            "relationship",
            ir.relationships.iter().map(|r| &r.name),
        ));
        duplicates.extend(find_duplicates("metric", ir.metrics.iter().map(|m| &m.name)));
        duplicates.extend(find_duplicates(
            "dimension",
            ir.dimensions.iter().map(|d| &d.name),
        ));
        for obj in &ir.objects {
            duplicates.extend(find_duplicates(
                &format!("property of '{}'", obj.name),
                obj.properties.iter().map(|p| &p.name),
            ));
        }
        results.push(if duplicates.is_empty() {
            GateResult::pass("unique_names", cat)
        } else {
            GateResult::error("unique_names", cat, duplicates.join("; "))
        });

        // object_identifiers: every object declares at least one identifier
        let missing: Vec<&str> = ir
            .objects
            .iter()
            .filter(|o| o.identifiers.is_empty())
            .map(|o| o.name.as_str())
            .collect();
        results.push(if missing.is_empty() {
            GateResult::pass("object_identifiers", cat)
        } else {
            GateResult::error(
                "object_identifiers",
                cat,
                format!("objects without identifiers: {}", missing.join(", ")),
            )
        });

        // identifier_resolution: identifiers must name declared properties
        let mut dangling = Vec::new();
        for obj in &ir.objects {
            for ident in &obj.identifiers {
                if obj.property(ident).is_none() {
                    dangling.push(format!("{}.{}", obj.name, ident));
                }
            }
        }
        results.push(if dangling.is_empty() {
            GateResult::pass("identifier_resolution", cat)
        } else {
            GateResult::error(
                "identifier_resolution",
                cat,
                format!("identifiers without a property: {}", dangling.join(", ")),
            )
        });

        // object_properties: an object with no typed properties maps nothing
        let empty: Vec<&str> = ir
            .objects
            .iter()
            .filter(|o| o.properties.is_empty())
            .map(|o| o.name.as_str())
            .collect();
        results.push(if empty.is_empty() {
            GateResult::pass("object_properties", cat)
        } else {
            GateResult::error(
                "object_properties",
                cat,
                format!("objects without properties: {}", empty.join(", ")),
            )
        });

        // breaking_changes: only meaningful when the caller supplied the
        // diff against the predecessor version
        if let Some(report) = diff {
            results.push(if report.summary.has_breaking {
                let kinds: Vec<String> = report
                    .changes
                    .iter()
                    .filter(|c| c.severity == crate::domain::diff::Severity::Breaking)
                    .map(|c| format!("{} at {}", c.kind, c.path))
                    .collect();
                GateResult::warning(
                    "breaking_changes",
                    cat,
                    format!(
                        "{} breaking change(s): {}",
                        report.summary.breaking,
                        kinds.join("; ")
                    ),
                )
            } else {
                GateResult::pass("breaking_changes", cat)
            });
        }

        results
    }

    // --- SEMANTIC ---

    fn semantic_gates(ir: &OntologyIr) -> Vec<GateResult> {
        let cat = GateCategory::Semantic;
        let mut results = Vec::new();

        // join_key_compatibility
        let mut join_problems = Vec::new();
        for rel in &ir.relationships {
            let (Some(from_obj), Some(to_obj)) = (ir.object(&rel.from), ir.object(&rel.to))
            else {
                join_problems.push(format!("'{}' references an unknown object", rel.name));
                continue;
            };
            if rel.join_keys.is_empty() {
                join_problems.push(format!("'{}' declares no join keys", rel.name));
            }
            for key in &rel.join_keys {
                match (from_obj.property(key.from_prop()), to_obj.property(key.to_prop())) {
                    (Some(fp), Some(tp)) => {
                        if !PropertyType::join_compatible(fp.prop_type, tp.prop_type) {
                            join_problems.push(format!(
                                "'{}': {} vs {} on ({}, {})",
                                rel.name,
                                fp.prop_type.as_str(),
                                tp.prop_type.as_str(),
                                key.from_prop(),
                                key.to_prop()
                            ));
                        }
                    }
                    _ => join_problems.push(format!(
                        "'{}': join key ({}, {}) does not resolve",
                        rel.name,
                        key.from_prop(),
                        key.to_prop()
                    )),
                }
            }
        }
        results.push(if join_problems.is_empty() {
            GateResult::pass("join_key_compatibility", cat)
        } else {
            GateResult::error("join_key_compatibility", cat, join_problems.join("; "))
        });

        // dimension_resolution
        let unresolved: Vec<&str> = ir
            .dimensions
            .iter()
            .filter(|d| {
                d.source_parts()
                    .and_then(|(o, p)| ir.object(o).and_then(|obj| obj.property(p)))
                    .is_none()
            })
            .map(|d| d.name.as_str())
            .collect();
        results.push(if unresolved.is_empty() {
            GateResult::pass("dimension_resolution", cat)
        } else {
            GateResult::error(
                "dimension_resolution",
                cat,
                format!("unresolvable dimensions: {}", unresolved.join(", ")),
            )
        });

        // metric_grain
        let mut grain_problems = Vec::new();
        for metric in &ir.metrics {
            if metric.grain.is_empty() {
                grain_problems.push(format!("'{}' has an empty grain", metric.name));
            }
            for grain in &metric.grain {
                if ir.object(grain).is_none() {
                    grain_problems.push(format!(
                        "'{}' grain references unknown object '{}'",
                        metric.name, grain
                    ));
                }
            }
        }
        results.push(if grain_problems.is_empty() {
            GateResult::pass("metric_grain", cat)
        } else {
            GateResult::error("metric_grain", cat, grain_problems.join("; "))
        });

        // metric_expression: non-empty, no denylisted tokens, and parseable
        let mut expr_problems = Vec::new();
        for metric in &ir.metrics {
            if metric.expression.is_empty() {
                expr_problems.push(format!("'{}' has an empty expression", metric.name));
                continue;
            }
            let upper = metric.expression.to_uppercase();
            for token in EXPRESSION_DENYLIST {
                if upper.contains(token) {
                    expr_problems.push(format!(
                        "'{}' contains forbidden token '{}'",
                        metric.name,
                        token.trim()
                    ));
                }
            }
            if !expression_parses(&metric.expression) {
                expr_problems.push(format!(
                    "'{}' is not a parseable SQL expression",
                    metric.name
                ));
            }
        }
        results.push(if expr_problems.is_empty() {
            GateResult::pass("metric_expression", cat)
        } else {
            GateResult::error("metric_expression", cat, expr_problems.join("; "))
        });

        results
    }

    // --- DEPLOYABILITY ---

    fn deployability_gates(ir: &OntologyIr) -> Vec<GateResult> {
        let cat = GateCategory::Deployability;
        let mut results = Vec::new();
        let tm = &ir.target_mapping;

        // table_mapping_coverage
        let unmapped: Vec<&str> = ir
            .objects
            .iter()
            .filter(|o| {
                !tm.table_mappings.contains_key(&o.name)
                    && o.mapping.as_ref().and_then(|m| m.table.as_ref()).is_none()
            })
            .map(|o| o.name.as_str())
            .collect();
        results.push(if unmapped.is_empty() {
            GateResult::pass("table_mapping_coverage", cat)
        } else {
            GateResult::error(
                "table_mapping_coverage",
                cat,
                format!("objects without a table mapping: {}", unmapped.join(", ")),
            )
        });

        // target_location: database/schema must resolve for every object
        let mut unlocated = Vec::new();
        for obj in &ir.objects {
            let mapping = obj.mapping.as_ref();
            let database = mapping
                .and_then(|m| m.database.as_ref())
                .or(tm.database.as_ref());
            let schema = mapping
                .and_then(|m| m.schema.as_ref())
                .or(tm.schema.as_ref());
            if database.is_none() || schema.is_none() {
                unlocated.push(obj.name.as_str());
            }
        }
        results.push(if unlocated.is_empty() {
            GateResult::pass("target_location", cat)
        } else {
            GateResult::error(
                "target_location",
                cat,
                format!(
                    "no database/schema resolvable for: {}",
                    unlocated.join(", ")
                ),
            )
        });

        // warehouse_binding: allowed to be unset, but flagged
        results.push(match &tm.warehouse {
            Some(_) => GateResult::pass("warehouse_binding", cat),
            None => GateResult::warning(
                "warehouse_binding",
                cat,
                "targetMapping.warehouse is not set",
            ),
        });

        results
    }
}

fn find_duplicates<'a>(
    label: &str,
    names: impl Iterator<Item = &'a String>,
) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut dupes = Vec::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            dupes.push(format!("duplicate {} '{}'", label, name));
        }
    }
    dupes
}

fn expression_parses(expression: &str) -> bool {
    let dialect = GenericDialect {};
    Parser::parse_sql(&dialect, &format!("SELECT {}", expression)).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::gates::result::GateStatus;
    use crate::domain::odl::ir::{
        JoinKey, MetricDef, MetricType, ObjectDef, ObjectMapping, PropertyDef, RelationshipDef,
        TargetMapping,
    };
    use crate::domain::odl::ir::Cardinality;

    fn prop(name: &str, prop_type: PropertyType) -> PropertyDef {
        PropertyDef {
            name: name.to_string(),
            prop_type,
            description: None,
            nullable: true,
            required: false,
        }
    }

    fn deployable_ir() -> OntologyIr {
        OntologyIr {
            version: "1.0".into(),
            name: Some("retail".into()),
            description: None,
            objects: vec![
                ObjectDef {
                    name: "Customer".into(),
                    description: None,
                    identifiers: vec!["customer_id".into()],
                    properties: vec![
                        prop("customer_id", PropertyType::String),
                        prop("email", PropertyType::String),
                    ],
                    mapping: None,
                },
                ObjectDef {
                    name: "Order".into(),
                    description: None,
                    identifiers: vec!["order_id".into()],
                    properties: vec![
                        prop("order_id", PropertyType::String),
                        prop("customer_id", PropertyType::String),
                        prop("amount", PropertyType::Decimal),
                    ],
                    mapping: None,
                },
            ],
            relationships: vec![RelationshipDef {
                name: "placed_by".into(),
                from: "Order".into(),
                to: "Customer".into(),
                join_keys: vec![JoinKey("customer_id".into(), "customer_id".into())],
                cardinality: Cardinality::ManyToOne,
                description: None,
            }],
            metrics: vec![MetricDef {
                name: "TotalRevenue".into(),
                expression: "SUM(amount)".into(),
                grain: vec!["Order".into()],
                metric_type: MetricType::Sum,
                format: None,
                description: None,
            }],
            dimensions: vec![],
            target_mapping: TargetMapping {
                database: Some("RETAIL_DB".into()),
                schema: Some("PUBLIC".into()),
                warehouse: Some("ANALYTICS_WH".into()),
                table_mappings: [
                    ("Customer".to_string(), "customers".to_string()),
                    ("Order".to_string(), "orders".to_string()),
                ]
                .into_iter()
                .collect(),
            },
        }
    }

    #[test]
    fn test_deployable_ir_passes_all_profiles() {
        let ir = deployable_ir();
        for profile in [
            ThresholdProfile::Strict,
            ThresholdProfile::Standard,
            ThresholdProfile::Lenient,
        ] {
            let outcome = Evaluator::evaluate(&ir, profile);
            assert!(outcome.passed, "profile {} should pass", profile);
            assert!(outcome.first_failure.is_none());
        }
    }

    #[test]
    fn test_missing_warehouse_fails_strict_only() {
        let mut ir = deployable_ir();
        ir.target_mapping.warehouse = None;

        let strict = Evaluator::evaluate(&ir, ThresholdProfile::Strict);
        assert!(!strict.passed);
        assert_eq!(strict.first_failure.as_deref(), Some("warehouse_binding"));

        assert!(Evaluator::evaluate(&ir, ThresholdProfile::Standard).passed);
        assert!(Evaluator::evaluate(&ir, ThresholdProfile::Lenient).passed);
    }

    #[test]
    fn test_semantic_error_passes_lenient_only() {
        let mut ir = deployable_ir();
        ir.metrics[0].grain.clear();

        assert!(!Evaluator::evaluate(&ir, ThresholdProfile::Strict).passed);
        assert!(!Evaluator::evaluate(&ir, ThresholdProfile::Standard).passed);
        // Lenient only cares about deployability errors
        assert!(Evaluator::evaluate(&ir, ThresholdProfile::Lenient).passed);
    }

    #[test]
    fn test_deployability_error_fails_every_profile() {
        let mut ir = deployable_ir();
        ir.target_mapping.table_mappings.remove("Order");

        for profile in [
            ThresholdProfile::Strict,
            ThresholdProfile::Standard,
            ThresholdProfile::Lenient,
        ] {
            let outcome = Evaluator::evaluate(&ir, profile);
            assert!(!outcome.passed, "profile {} should fail", profile);
        }
    }

    #[test]
    fn test_per_object_mapping_covers_table_gate() {
        let mut ir = deployable_ir();
        ir.target_mapping.table_mappings.remove("Order");
        ir.objects[1].mapping = Some(ObjectMapping {
            table: Some("orders_raw".into()),
            schema: None,
            database: None,
        });
        assert!(Evaluator::evaluate(&ir, ThresholdProfile::Standard).passed);
    }

    #[test]
    fn test_duplicate_names_gate() {
        let mut ir = deployable_ir();
        let clone = ir.objects[0].clone();
        ir.objects.push(clone);
        let outcome = Evaluator::evaluate(&ir, ThresholdProfile::Standard);
        assert!(!outcome.passed);
        assert_eq!(outcome.first_failure.as_deref(), Some("unique_names"));
    }

    #[test]
    fn test_dangling_identifier_gate() {
        let mut ir = deployable_ir();
        ir.objects[0].identifiers = vec!["ghost_key".into()];
        let outcome = Evaluator::evaluate(&ir, ThresholdProfile::Standard);
        assert!(!outcome.passed);
        assert_eq!(
            outcome.first_failure.as_deref(),
            Some("identifier_resolution")
        );
    }

    #[test]
    fn test_forbidden_expression_tokens() {
        let mut ir = deployable_ir();
        ir.metrics[0].expression = "SUM(amount); DROP TABLE orders".into();
        let outcome = Evaluator::evaluate(&ir, ThresholdProfile::Standard);
        assert!(!outcome.passed);
        let semantic = &outcome.metrics["semantic"]["metric_expression"];
        assert_eq!(semantic.status, GateStatus::Error);
        assert!(semantic.message.as_deref().is_some_and(|m| m.contains("forbidden")));
    }

    #[test]
    fn test_unparseable_expression_is_semantic_error() {
        let mut ir = deployable_ir();
        ir.metrics[0].expression = "SUM((amount".into();
        let outcome = Evaluator::evaluate(&ir, ThresholdProfile::Standard);
        assert!(!outcome.passed);
        assert_eq!(
            outcome.first_failure.as_deref(),
            Some("metric_expression")
        );
    }

    #[test]
    fn test_breaking_diff_is_a_strict_only_rejection() {
        use crate::domain::diff::{ChangeKind, ChangeRecord, DiffReport, Severity};

        let ir = deployable_ir();
        let report = DiffReport::from_changes(vec![ChangeRecord {
            path: "objects/Customer/properties/email".into(),
            kind: ChangeKind::PropertyRemoved,
            severity: Severity::Breaking,
            detail: None,
        }]);

        let strict = Evaluator::evaluate_with_diff(&ir, Some(&report), ThresholdProfile::Strict);
        assert!(!strict.passed);
        assert_eq!(strict.first_failure.as_deref(), Some("breaking_changes"));

        // Standard tolerates breaking evolution (it is a warning)
        let standard =
            Evaluator::evaluate_with_diff(&ir, Some(&report), ThresholdProfile::Standard);
        assert!(standard.passed);

        // A non-breaking diff passes everywhere
        let benign = DiffReport::from_changes(vec![ChangeRecord {
            path: "objects/Customer/properties/phone".into(),
            kind: ChangeKind::PropertyAdded,
            severity: Severity::NonBreaking,
            detail: None,
        }]);
        let strict_ok = Evaluator::evaluate_with_diff(&ir, Some(&benign), ThresholdProfile::Strict);
        assert!(strict_ok.passed);
    }

    #[test]
    fn test_metrics_blob_contains_every_gate() {
        let outcome = Evaluator::evaluate(&deployable_ir(), ThresholdProfile::Standard);
        assert_eq!(outcome.metrics["structural"].len(), 4);
        assert_eq!(outcome.metrics["semantic"].len(), 4);
        assert_eq!(outcome.metrics["deployability"].len(), 3);
    }
}
