// ontolift-core/src/domain/odl/validator.rs

// Two-layer validation: structural (fields, patterns, vocabulary) then
// referential (cross-references between entities). All-or-nothing: callers
// either get a fully-populated IR or an ordered list of issues, never both.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::domain::error::{DomainError, ValidationIssue};
use crate::domain::odl::document::{
    OdlDimension, OdlDocument, OdlMetric, OdlObject, OdlRelationship,
};
use crate::domain::odl::ir::{
    Cardinality, DimensionDef, JoinKey, MetricDef, MetricType, ObjectDef, ObjectMapping,
    OntologyIr, PropertyDef, PropertyType, RelationshipDef, TargetMapping,
};

fn re_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("^[A-Za-z][A-Za-z0-9_]*$").unwrap_or_else(|_| {
            // This should never happen as the regex is hardcoded
            // and we avoid unwrap to satisfy the crate lints.
            Regex::new("$^").unwrap_or_else(|_| unreachable!())
        })
    })
}

pub struct OdlValidator;

impl OdlValidator {
    /// Validate an ODL document and produce the typed IR.
    pub fn validate(doc: &OdlDocument) -> Result<OntologyIr, DomainError> {
        let mut issues = Vec::new();

        let objects = Self::check_objects(&doc.objects, &mut issues);
        let relationships = Self::check_relationships(&doc.relationships, &mut issues);
        let metrics = Self::check_metrics(&doc.metrics, &mut issues);
        let dimensions = Self::check_dimensions(&doc.dimensions, &mut issues);
        let target_mapping = Self::build_target_mapping(doc);

        if !issues.is_empty() {
            return Err(DomainError::InvalidStructure(issues));
        }

        let ir = OntologyIr {
            version: doc.version.clone().unwrap_or_else(|| "1.0".to_string()),
            name: doc.name.clone(),
            description: doc.description.clone(),
            objects,
            relationships,
            metrics,
            dimensions,
            target_mapping,
        };

        let ref_issues = Self::check_references(&ir);
        if !ref_issues.is_empty() {
            return Err(DomainError::InvalidReference(ref_issues));
        }

        Ok(ir)
    }

    // --- LAYER 1: STRUCTURE ---

    fn require_name(
        raw: &Option<String>,
        location: String,
        issues: &mut Vec<ValidationIssue>,
    ) -> String {
        match raw {
            None => {
                issues.push(ValidationIssue {
                    location,
                    message: "missing required field 'name'".into(),
                });
                String::new()
            }
            Some(name) if !re_name().is_match(name) => {
                issues.push(ValidationIssue {
                    location,
                    message: format!(
                        "name '{}' does not match ^[A-Za-z][A-Za-z0-9_]*$",
                        name
                    ),
                });
                name.clone()
            }
            Some(name) => name.clone(),
        }
    }

    fn check_objects(objects: &[OdlObject], issues: &mut Vec<ValidationIssue>) -> Vec<ObjectDef> {
        let mut out = Vec::with_capacity(objects.len());
        for (i, obj) in objects.iter().enumerate() {
            let base = format!("/objects/{}", i);
            let name = Self::require_name(&obj.name, format!("{}/name", base), issues);

            if obj.identifiers.is_empty() {
                issues.push(ValidationIssue {
                    location: format!("{}/identifiers", base),
                    message: "identifiers must list at least one property name".into(),
                });
            }

            let mut properties = Vec::with_capacity(obj.properties.len());
            for (j, prop) in obj.properties.iter().enumerate() {
                let ploc = format!("{}/properties/{}", base, j);
                let pname = Self::require_name(&prop.name, format!("{}/name", ploc), issues);

                let prop_type = match prop.prop_type.as_deref() {
                    None => {
                        issues.push(ValidationIssue {
                            location: format!("{}/type", ploc),
                            message: "missing required field 'type'".into(),
                        });
                        PropertyType::String
                    }
                    Some(raw) => PropertyType::parse(raw).unwrap_or_else(|| {
                        issues.push(ValidationIssue {
                            location: format!("{}/type", ploc),
                            message: format!("unknown property type '{}'", raw),
                        });
                        PropertyType::String
                    }),
                };

                properties.push(PropertyDef {
                    name: pname,
                    prop_type,
                    description: prop.description.clone(),
                    nullable: prop.nullable.unwrap_or(true),
                    required: prop.required.unwrap_or(false),
                });
            }

            out.push(ObjectDef {
                name,
                description: obj.description.clone(),
                identifiers: obj.identifiers.clone(),
                properties,
                mapping: obj.mapping.as_ref().map(|m| ObjectMapping {
                    table: m.table.clone(),
                    schema: m.schema.clone(),
                    database: m.database.clone(),
                }),
            });
        }
        out
    }

    fn check_relationships(
        rels: &[OdlRelationship],
        issues: &mut Vec<ValidationIssue>,
    ) -> Vec<RelationshipDef> {
        let mut out = Vec::with_capacity(rels.len());
        for (i, rel) in rels.iter().enumerate() {
            let base = format!("/relationships/{}", i);
            let name = Self::require_name(&rel.name, format!("{}/name", base), issues);

            let from = rel.from.clone().unwrap_or_else(|| {
                issues.push(ValidationIssue {
                    location: format!("{}/from", base),
                    message: "missing required field 'from'".into(),
                });
                String::new()
            });
            let to = rel.to.clone().unwrap_or_else(|| {
                issues.push(ValidationIssue {
                    location: format!("{}/to", base),
                    message: "missing required field 'to'".into(),
                });
                String::new()
            });

            let cardinality = match rel.cardinality.as_deref() {
                None => Cardinality::ManyToOne,
                Some(raw) => Cardinality::parse(raw).unwrap_or_else(|| {
                    issues.push(ValidationIssue {
                        location: format!("{}/cardinality", base),
                        message: format!("unknown cardinality '{}'", raw),
                    });
                    Cardinality::ManyToOne
                }),
            };

            out.push(RelationshipDef {
                name,
                from,
                to,
                join_keys: rel
                    .join_keys
                    .iter()
                    .map(|(a, b)| JoinKey(a.clone(), b.clone()))
                    .collect(),
                cardinality,
                description: rel.description.clone(),
            });
        }
        out
    }

    fn check_metrics(metrics: &[OdlMetric], issues: &mut Vec<ValidationIssue>) -> Vec<MetricDef> {
        let mut out = Vec::with_capacity(metrics.len());
        for (i, metric) in metrics.iter().enumerate() {
            let base = format!("/metrics/{}", i);
            let name = Self::require_name(&metric.name, format!("{}/name", base), issues);

            let expression = metric.expression.clone().unwrap_or_else(|| {
                issues.push(ValidationIssue {
                    location: format!("{}/expression", base),
                    message: "missing required field 'expression'".into(),
                });
                String::new()
            });

            let metric_type = match metric.metric_type.as_deref() {
                None => MetricType::Custom,
                Some(raw) => MetricType::parse(raw).unwrap_or_else(|| {
                    issues.push(ValidationIssue {
                        location: format!("{}/type", base),
                        message: format!("unknown metric type '{}'", raw),
                    });
                    MetricType::Custom
                }),
            };

            out.push(MetricDef {
                name,
                expression,
                grain: metric.grain.clone(),
                metric_type,
                format: metric.format.clone(),
                description: metric.description.clone(),
            });
        }
        out
    }

    fn check_dimensions(
        dims: &[OdlDimension],
        issues: &mut Vec<ValidationIssue>,
    ) -> Vec<DimensionDef> {
        let mut out = Vec::with_capacity(dims.len());
        for (i, dim) in dims.iter().enumerate() {
            let base = format!("/dimensions/{}", i);
            let name = Self::require_name(&dim.name, format!("{}/name", base), issues);

            let source_property = match dim.source_property.as_deref() {
                None => {
                    issues.push(ValidationIssue {
                        location: format!("{}/sourceProperty", base),
                        message: "missing required field 'sourceProperty'".into(),
                    });
                    String::new()
                }
                Some(raw) if raw.split_once('.').is_none_or(|(o, p)| o.is_empty() || p.is_empty()) => {
                    issues.push(ValidationIssue {
                        location: format!("{}/sourceProperty", base),
                        message: format!("'{}' is not of the form 'Object.property'", raw),
                    });
                    raw.to_string()
                }
                Some(raw) => raw.to_string(),
            };

            let dim_type = match dim.dim_type.as_deref() {
                None => None,
                Some(raw) => match PropertyType::parse(raw) {
                    Some(t) => Some(t),
                    None => {
                        issues.push(ValidationIssue {
                            location: format!("{}/type", base),
                            message: format!("unknown property type '{}'", raw),
                        });
                        None
                    }
                },
            };

            out.push(DimensionDef {
                name,
                source_property,
                dim_type,
                description: dim.description.clone(),
            });
        }
        out
    }

    fn build_target_mapping(doc: &OdlDocument) -> TargetMapping {
        match &doc.target_mapping {
            None => TargetMapping::default(),
            Some(tm) => TargetMapping {
                database: tm.database.clone(),
                schema: tm.schema.clone(),
                warehouse: tm.warehouse.clone(),
                table_mappings: tm
                    .table_mappings
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<BTreeMap<_, _>>(),
            },
        }
    }

    // --- LAYER 2: REFERENCES ---

    fn check_references(ir: &OntologyIr) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (i, rel) in ir.relationships.iter().enumerate() {
            let base = format!("/relationships/{}", i);
            let from_obj = ir.object(&rel.from);
            let to_obj = ir.object(&rel.to);

            if from_obj.is_none() {
                issues.push(ValidationIssue {
                    location: format!("{}/from", base),
                    message: format!("unknown object '{}'", rel.from),
                });
            }
            if to_obj.is_none() {
                issues.push(ValidationIssue {
                    location: format!("{}/to", base),
                    message: format!("unknown object '{}'", rel.to),
                });
            }

            if let (Some(from_obj), Some(to_obj)) = (from_obj, to_obj) {
                for (j, key) in rel.join_keys.iter().enumerate() {
                    let kloc = format!("{}/joinKeys/{}", base, j);
                    let from_prop = from_obj.property(key.from_prop());
                    let to_prop = to_obj.property(key.to_prop());

                    if from_prop.is_none() {
                        issues.push(ValidationIssue {
                            location: kloc.clone(),
                            message: format!(
                                "property '{}' does not exist on object '{}'",
                                key.from_prop(),
                                from_obj.name
                            ),
                        });
                    }
                    if to_prop.is_none() {
                        issues.push(ValidationIssue {
                            location: kloc.clone(),
                            message: format!(
                                "property '{}' does not exist on object '{}'",
                                key.to_prop(),
                                to_obj.name
                            ),
                        });
                    }
                    if let (Some(fp), Some(tp)) = (from_prop, to_prop) {
                        if !PropertyType::join_compatible(fp.prop_type, tp.prop_type) {
                            issues.push(ValidationIssue {
                                location: kloc,
                                message: format!(
                                    "incompatible join key types: {} vs {}",
                                    fp.prop_type.as_str(),
                                    tp.prop_type.as_str()
                                ),
                            });
                        }
                    }
                }
            }
        }

        for (i, dim) in ir.dimensions.iter().enumerate() {
            let loc = format!("/dimensions/{}/sourceProperty", i);
            match dim.source_parts() {
                None => issues.push(ValidationIssue {
                    location: loc,
                    message: format!("'{}' is not resolvable", dim.source_property),
                }),
                Some((object, property)) => match ir.object(object) {
                    None => issues.push(ValidationIssue {
                        location: loc,
                        message: format!("unknown object '{}'", object),
                    }),
                    Some(obj) if obj.property(property).is_none() => {
                        issues.push(ValidationIssue {
                            location: loc,
                            message: format!(
                                "unknown property '{}.{}'",
                                object, property
                            ),
                        });
                    }
                    Some(_) => {}
                },
            }
        }

        for (i, metric) in ir.metrics.iter().enumerate() {
            for (j, grain) in metric.grain.iter().enumerate() {
                if ir.object(grain).is_none() {
                    issues.push(ValidationIssue {
                        location: format!("/metrics/{}/grain/{}", i, j),
                        message: format!("unknown object '{}'", grain),
                    });
                }
            }
        }

        for key in ir.target_mapping.table_mappings.keys() {
            if ir.object(key).is_none() {
                issues.push(ValidationIssue {
                    location: format!("/targetMapping/tableMappings/{}", key),
                    message: format!("unknown object '{}'", key),
                });
            }
        }

        issues
    }
}
