// ontolift-core/src/domain/compiler/logical.rs

// Logical mapping: objects become logical tables, identifiers become the
// primary key, properties map column-for-column. Database/schema resolve
// per object, falling back to the global target mapping.

use std::collections::BTreeMap;

use crate::domain::compiler::model::{
    BaseTable, CompiledDimension, CompiledMetric, JoinColumnPair, JoinPath, LogicalColumn,
    LogicalTable, PrimaryKey, SemanticModel,
};
use crate::domain::error::DomainError;
use crate::domain::odl::ir::{ObjectDef, OntologyIr};

pub struct LogicalMapper;

impl LogicalMapper {
    pub fn build(ir: &OntologyIr, model_name: &str) -> Result<SemanticModel, DomainError> {
        // object name -> mapped table name, resolved once and reused for
        // join paths, metric grains and dimension sources.
        let table_names: BTreeMap<&str, String> = ir
            .objects
            .iter()
            .map(|obj| (obj.name.as_str(), Self::table_name(ir, obj)))
            .collect();

        let mut tables = Vec::with_capacity(ir.objects.len());
        for obj in &ir.objects {
            let mapping = obj.mapping.as_ref();
            let database = mapping
                .and_then(|m| m.database.as_ref())
                .or(ir.target_mapping.database.as_ref())
                .cloned()
                .ok_or_else(|| {
                    DomainError::CompileFailed(format!(
                        "no database resolvable for object '{}'",
                        obj.name
                    ))
                })?;
            let schema = mapping
                .and_then(|m| m.schema.as_ref())
                .or(ir.target_mapping.schema.as_ref())
                .cloned()
                .ok_or_else(|| {
                    DomainError::CompileFailed(format!(
                        "no schema resolvable for object '{}'",
                        obj.name
                    ))
                })?;

            tables.push(LogicalTable {
                name: table_names[obj.name.as_str()].clone(),
                description: obj.description.clone(),
                base_table: BaseTable {
                    database,
                    schema,
                    table: table_names[obj.name.as_str()].clone(),
                },
                primary_key: PrimaryKey {
                    columns: obj.identifiers.clone(),
                },
                columns: obj
                    .properties
                    .iter()
                    .map(|p| LogicalColumn {
                        name: p.name.clone(),
                        data_type: p.prop_type.as_str().to_string(),
                        description: p.description.clone(),
                    })
                    .collect(),
            });
        }

        let relationships = ir
            .relationships
            .iter()
            .map(|rel| {
                let left = Self::lookup(&table_names, &rel.from, &rel.name)?;
                let right = Self::lookup(&table_names, &rel.to, &rel.name)?;
                Ok(JoinPath {
                    name: rel.name.clone(),
                    left_table: left,
                    right_table: right,
                    relationship_columns: rel
                        .join_keys
                        .iter()
                        .map(|k| JoinColumnPair {
                            left_column: k.from_prop().to_string(),
                            right_column: k.to_prop().to_string(),
                        })
                        .collect(),
                    cardinality: rel.cardinality.as_str().to_string(),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let metrics = ir
            .metrics
            .iter()
            .map(|metric| {
                let grain = metric
                    .grain
                    .iter()
                    .map(|g| Self::lookup(&table_names, g, &metric.name))
                    .collect::<Result<Vec<_>, DomainError>>()?;
                Ok(CompiledMetric {
                    name: metric.name.clone(),
                    expression: metric.expression.clone(),
                    metric_type: metric.metric_type.as_str().to_string(),
                    grain,
                    format: metric.format.clone(),
                    description: metric.description.clone(),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let dimensions = ir
            .dimensions
            .iter()
            .map(|dim| {
                let (object, property) = dim.source_parts().ok_or_else(|| {
                    DomainError::CompileFailed(format!(
                        "dimension '{}' source '{}' is not resolvable",
                        dim.name, dim.source_property
                    ))
                })?;
                let table = Self::lookup(&table_names, object, &dim.name)?;
                let data_type = dim
                    .dim_type
                    .or_else(|| {
                        ir.object(object)
                            .and_then(|o| o.property(property))
                            .map(|p| p.prop_type)
                    })
                    .map(|t| t.as_str().to_string());
                Ok(CompiledDimension {
                    name: dim.name.clone(),
                    table,
                    column: property.to_string(),
                    data_type,
                    description: dim.description.clone(),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(SemanticModel {
            name: model_name.to_string(),
            description: ir.description.clone(),
            tables,
            relationships,
            metrics,
            dimensions,
        })
    }

    fn table_name(ir: &OntologyIr, obj: &ObjectDef) -> String {
        obj.mapping
            .as_ref()
            .and_then(|m| m.table.clone())
            .or_else(|| ir.target_mapping.table_mappings.get(&obj.name).cloned())
            .unwrap_or_else(|| snake_case(&obj.name))
    }

    fn lookup(
        table_names: &BTreeMap<&str, String>,
        object: &str,
        owner: &str,
    ) -> Result<String, DomainError> {
        table_names.get(object).cloned().ok_or_else(|| {
            DomainError::CompileFailed(format!(
                "'{}' references unknown object '{}'",
                owner, object
            ))
        })
    }
}

/// CamelCase -> snake_case (OrderItem -> order_item).
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            for lower in c.to_lowercase() {
                out.push(lower);
            }
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}
