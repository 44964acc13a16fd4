// ontolift-core/src/domain/diff/engine.rs

// Structural diff between two normalized IRs. Deterministic: identical
// inputs produce identical output bytes (inputs are sorted by the
// normalizer, and the report re-sorts by path/kind).

use std::collections::BTreeSet;

use crate::domain::diff::change::{ChangeKind, ChangeRecord, DiffReport, Severity};
use crate::domain::odl::ir::{MetricDef, ObjectDef, OntologyIr, RelationshipDef};

/// Minimum property-name overlap for the rename heuristic.
const RENAME_OVERLAP_THRESHOLD: f64 = 0.8;

pub struct DiffEngine;

impl DiffEngine {
    pub fn diff(old: &OntologyIr, new: &OntologyIr) -> DiffReport {
        let mut changes = Vec::new();

        Self::diff_objects(old, new, &mut changes);
        Self::diff_relationships(&old.relationships, &new.relationships, &mut changes);
        Self::diff_metrics(&old.metrics, &new.metrics, &mut changes);
        Self::diff_dimensions(old, new, &mut changes);

        DiffReport::from_changes(changes)
    }

    // --- OBJECTS (with rename heuristic) ---

    fn diff_objects(old: &OntologyIr, new: &OntologyIr, changes: &mut Vec<ChangeRecord>) {
        let old_names: BTreeSet<&str> = old.objects.iter().map(|o| o.name.as_str()).collect();
        let new_names: BTreeSet<&str> = new.objects.iter().map(|o| o.name.as_str()).collect();

        let removed: Vec<&ObjectDef> = old
            .objects
            .iter()
            .filter(|o| !new_names.contains(o.name.as_str()))
            .collect();
        let added: Vec<&ObjectDef> = new
            .objects
            .iter()
            .filter(|o| !old_names.contains(o.name.as_str()))
            .collect();

        // Pair removed/added objects that look like the same object renamed:
        // identical identifiers plus a high property-name overlap. Ambiguous
        // candidates refuse the rename and fall back to removed + added.
        let mut consumed_added: BTreeSet<&str> = BTreeSet::new();
        let mut renamed: Vec<(&ObjectDef, &ObjectDef)> = Vec::new();

        for old_obj in &removed {
            let candidates: Vec<(&ObjectDef, f64)> = added
                .iter()
                .filter(|n| !consumed_added.contains(n.name.as_str()))
                .filter(|n| n.identifiers == old_obj.identifiers)
                .map(|n| (*n, Self::property_overlap(old_obj, n)))
                .filter(|(_, overlap)| *overlap >= RENAME_OVERLAP_THRESHOLD)
                .collect();

            let best = candidates
                .iter()
                .map(|(_, overlap)| *overlap)
                .fold(0.0_f64, f64::max);
            let mut at_best = candidates.iter().filter(|(_, o)| *o == best);

            match (at_best.next(), at_best.next()) {
                (Some((winner, _)), None) => {
                    consumed_added.insert(winner.name.as_str());
                    renamed.push((*old_obj, *winner));
                }
                // Zero candidates, or a tie: report removal below.
                _ => {}
            }
        }

        for (old_obj, new_obj) in &renamed {
            changes.push(ChangeRecord {
                path: format!("objects/{}", old_obj.name),
                kind: ChangeKind::ObjectRenamed,
                severity: Severity::Breaking,
                detail: Some(format!("renamed to '{}'", new_obj.name)),
            });
            Self::diff_object_contents(old_obj, new_obj, changes);
        }

        for old_obj in removed
            .iter()
            .filter(|o| !renamed.iter().any(|(r, _)| r.name == o.name))
        {
            changes.push(ChangeRecord {
                path: format!("objects/{}", old_obj.name),
                kind: ChangeKind::ObjectRemoved,
                severity: Severity::Breaking,
                detail: None,
            });
        }

        for new_obj in added
            .iter()
            .filter(|o| !consumed_added.contains(o.name.as_str()))
        {
            changes.push(ChangeRecord {
                path: format!("objects/{}", new_obj.name),
                kind: ChangeKind::ObjectAdded,
                severity: Severity::NonBreaking,
                detail: None,
            });
        }

        // Objects present on both sides, matched by name.
        for old_obj in &old.objects {
            if let Some(new_obj) = new.object(&old_obj.name) {
                Self::diff_object_contents(old_obj, new_obj, changes);
            }
        }
    }

    fn property_overlap(old: &ObjectDef, new: &ObjectDef) -> f64 {
        let old_props: BTreeSet<&str> = old.properties.iter().map(|p| p.name.as_str()).collect();
        let new_props: BTreeSet<&str> = new.properties.iter().map(|p| p.name.as_str()).collect();
        let shared = old_props.intersection(&new_props).count();
        let denom = old_props.len().max(new_props.len()).max(1);
        shared as f64 / denom as f64
    }

    fn diff_object_contents(
        old_obj: &ObjectDef,
        new_obj: &ObjectDef,
        changes: &mut Vec<ChangeRecord>,
    ) {
        let base = format!("objects/{}", new_obj.name);

        if old_obj.identifiers != new_obj.identifiers {
            changes.push(ChangeRecord {
                path: format!("{}/identifiers", base),
                kind: ChangeKind::IdentifierChanged,
                severity: Severity::Breaking,
                detail: Some(format!(
                    "{:?} -> {:?}",
                    old_obj.identifiers, new_obj.identifiers
                )),
            });
        }

        for old_prop in &old_obj.properties {
            match new_obj.property(&old_prop.name) {
                None => changes.push(ChangeRecord {
                    path: format!("{}/properties/{}", base, old_prop.name),
                    kind: ChangeKind::PropertyRemoved,
                    severity: Severity::Breaking,
                    detail: None,
                }),
                Some(new_prop) => {
                    let ppath = format!("{}/properties/{}", base, old_prop.name);

                    if old_prop.prop_type != new_prop.prop_type {
                        let widening = old_prop.prop_type.widens_to(new_prop.prop_type);
                        changes.push(ChangeRecord {
                            path: ppath.clone(),
                            kind: ChangeKind::PropertyTypeChanged,
                            severity: if widening {
                                Severity::NonBreaking
                            } else {
                                Severity::Breaking
                            },
                            detail: Some(format!(
                                "{} -> {}",
                                old_prop.prop_type.as_str(),
                                new_prop.prop_type.as_str()
                            )),
                        });
                    }

                    if old_prop.nullable != new_prop.nullable {
                        changes.push(ChangeRecord {
                            path: ppath.clone(),
                            kind: ChangeKind::PropertyNullableChanged,
                            // true -> false forbids existing NULLs
                            severity: if old_prop.nullable && !new_prop.nullable {
                                Severity::Breaking
                            } else {
                                Severity::NonBreaking
                            },
                            detail: Some(format!(
                                "nullable {} -> {}",
                                old_prop.nullable, new_prop.nullable
                            )),
                        });
                    }

                    if old_prop.required != new_prop.required {
                        changes.push(ChangeRecord {
                            path: ppath,
                            kind: ChangeKind::PropertyRequiredChanged,
                            severity: if !old_prop.required && new_prop.required {
                                Severity::Breaking
                            } else {
                                Severity::NonBreaking
                            },
                            detail: Some(format!(
                                "required {} -> {}",
                                old_prop.required, new_prop.required
                            )),
                        });
                    }
                }
            }
        }

        for new_prop in &new_obj.properties {
            if old_obj.property(&new_prop.name).is_none() {
                // Loose columns are additive; a mandatory non-nullable one is not.
                let breaking = !new_prop.nullable && new_prop.required;
                changes.push(ChangeRecord {
                    path: format!("{}/properties/{}", base, new_prop.name),
                    kind: ChangeKind::PropertyAdded,
                    severity: if breaking {
                        Severity::Breaking
                    } else {
                        Severity::NonBreaking
                    },
                    detail: None,
                });
            }
        }
    }

    // --- RELATIONSHIPS ---

    fn diff_relationships(
        old: &[RelationshipDef],
        new: &[RelationshipDef],
        changes: &mut Vec<ChangeRecord>,
    ) {
        for old_rel in old {
            let path = format!("relationships/{}", old_rel.name);
            match new.iter().find(|r| r.name == old_rel.name) {
                None => changes.push(ChangeRecord {
                    path,
                    kind: ChangeKind::RelationshipRemoved,
                    severity: Severity::Breaking,
                    detail: None,
                }),
                Some(new_rel) => {
                    let endpoints_changed =
                        old_rel.from != new_rel.from || old_rel.to != new_rel.to;
                    if endpoints_changed || old_rel.join_keys != new_rel.join_keys {
                        changes.push(ChangeRecord {
                            path: path.clone(),
                            kind: ChangeKind::RelationshipJoinKeysChanged,
                            severity: Severity::Breaking,
                            detail: endpoints_changed.then(|| {
                                format!(
                                    "endpoints {}->{} became {}->{}",
                                    old_rel.from, old_rel.to, new_rel.from, new_rel.to
                                )
                            }),
                        });
                    }
                    if old_rel.cardinality != new_rel.cardinality {
                        changes.push(ChangeRecord {
                            path,
                            kind: ChangeKind::RelationshipCardinalityChanged,
                            severity: if new_rel.cardinality.is_stricter_than(old_rel.cardinality)
                            {
                                Severity::Breaking
                            } else {
                                Severity::NonBreaking
                            },
                            detail: Some(format!(
                                "{} -> {}",
                                old_rel.cardinality.as_str(),
                                new_rel.cardinality.as_str()
                            )),
                        });
                    }
                }
            }
        }

        for new_rel in new {
            if !old.iter().any(|r| r.name == new_rel.name) {
                changes.push(ChangeRecord {
                    path: format!("relationships/{}", new_rel.name),
                    kind: ChangeKind::RelationshipAdded,
                    severity: Severity::NonBreaking,
                    detail: None,
                });
            }
        }
    }

    // --- METRICS ---

    fn diff_metrics(old: &[MetricDef], new: &[MetricDef], changes: &mut Vec<ChangeRecord>) {
        for old_metric in old {
            let path = format!("metrics/{}", old_metric.name);
            match new.iter().find(|m| m.name == old_metric.name) {
                None => changes.push(ChangeRecord {
                    path,
                    kind: ChangeKind::MetricRemoved,
                    severity: Severity::Breaking,
                    detail: None,
                }),
                Some(new_metric) => {
                    if old_metric.expression != new_metric.expression {
                        changes.push(ChangeRecord {
                            path: path.clone(),
                            kind: ChangeKind::MetricExpressionChanged,
                            // Numeric meaning may differ
                            severity: Severity::Breaking,
                            detail: None,
                        });
                    }
                    if old_metric.grain != new_metric.grain {
                        changes.push(ChangeRecord {
                            path,
                            kind: ChangeKind::MetricGrainChanged,
                            severity: Severity::Breaking,
                            detail: Some(format!(
                                "{:?} -> {:?}",
                                old_metric.grain, new_metric.grain
                            )),
                        });
                    }
                }
            }
        }

        for new_metric in new {
            if !old.iter().any(|m| m.name == new_metric.name) {
                changes.push(ChangeRecord {
                    path: format!("metrics/{}", new_metric.name),
                    kind: ChangeKind::MetricAdded,
                    severity: Severity::NonBreaking,
                    detail: None,
                });
            }
        }
    }

    // --- DIMENSIONS ---

    fn diff_dimensions(old: &OntologyIr, new: &OntologyIr, changes: &mut Vec<ChangeRecord>) {
        for old_dim in &old.dimensions {
            let path = format!("dimensions/{}", old_dim.name);
            match new.dimensions.iter().find(|d| d.name == old_dim.name) {
                None => changes.push(ChangeRecord {
                    path,
                    kind: ChangeKind::DimensionRemoved,
                    severity: Severity::Breaking,
                    detail: None,
                }),
                Some(new_dim) => {
                    if old_dim.source_property != new_dim.source_property {
                        changes.push(ChangeRecord {
                            path,
                            kind: ChangeKind::DimensionSourceChanged,
                            severity: Severity::Breaking,
                            detail: Some(format!(
                                "{} -> {}",
                                old_dim.source_property, new_dim.source_property
                            )),
                        });
                    }
                }
            }
        }

        for new_dim in &new.dimensions {
            if !old.dimensions.iter().any(|d| d.name == new_dim.name) {
                changes.push(ChangeRecord {
                    path: format!("dimensions/{}", new_dim.name),
                    kind: ChangeKind::DimensionAdded,
                    severity: Severity::NonBreaking,
                    detail: None,
                });
            }
        }
    }
}
