// ontolift-core/src/domain/compiler/model.rs

// The compiled semantic-view document, in the warehouse's native YAML
// dialect. Field order here IS the emission order, so keep it stable.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticModel {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tables: Vec<LogicalTable>,
    pub relationships: Vec<JoinPath>,
    pub metrics: Vec<CompiledMetric>,
    pub dimensions: Vec<CompiledDimension>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalTable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub base_table: BaseTable,
    pub primary_key: PrimaryKey,
    pub columns: Vec<LogicalColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseTable {
    pub database: String,
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalColumn {
    pub name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPath {
    pub name: String,
    pub left_table: String,
    pub right_table: String,
    pub relationship_columns: Vec<JoinColumnPair>,
    pub cardinality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinColumnPair {
    pub left_column: String,
    pub right_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledMetric {
    pub name: String,
    pub expression: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub grain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledDimension {
    pub name: String,
    pub table: String,
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
