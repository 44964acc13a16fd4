// ontolift-core/src/domain/odl/document.rs

// Raw ODL document as submitted by callers (or by the out-of-core generator).
// Everything is optional/stringly here on purpose: the validator owns the
// dynamic-to-static conversion and reports JSON-pointer locations instead of
// opaque serde failures.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::error::{DomainError, ValidationIssue};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlDocument {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub objects: Vec<OdlObject>,
    #[serde(default)]
    pub relationships: Vec<OdlRelationship>,
    #[serde(default)]
    pub metrics: Vec<OdlMetric>,
    #[serde(default)]
    pub dimensions: Vec<OdlDimension>,
    #[serde(default)]
    pub target_mapping: Option<OdlTargetMapping>,
}

impl OdlDocument {
    /// Parse an ODL payload from its JSON text.
    /// A malformed document (not even JSON-shaped) is an `INVALID_STRUCTURE`.
    pub fn from_json(payload: &str) -> Result<Self, DomainError> {
        serde_json::from_str(payload).map_err(|e| {
            DomainError::InvalidStructure(vec![ValidationIssue {
                location: "/".to_string(),
                message: format!("ODL payload is not valid JSON: {}", e),
            }])
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub properties: Vec<OdlProperty>,
    #[serde(default)]
    pub mapping: Option<OdlMapping>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlProperty {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub prop_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlMapping {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlRelationship {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub join_keys: Vec<(String, String)>,
    #[serde(default)]
    pub cardinality: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlMetric {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub grain: Vec<String>,
    #[serde(default, rename = "type")]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlDimension {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source_property: Option<String>,
    #[serde(default, rename = "type")]
    pub dim_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdlTargetMapping {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub table_mappings: BTreeMap<String, String>,
}
