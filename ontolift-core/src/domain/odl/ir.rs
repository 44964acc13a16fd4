// ontolift-core/src/domain/odl/ir.rs

// Typed intermediate representation of a validated ODL document.
// Serialization of the IR re-emits the ODL shape (camelCase keys), so
// normalize -> serialize -> parse -> normalize round-trips byte-for-byte.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyIr {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub objects: Vec<ObjectDef>,
    pub relationships: Vec<RelationshipDef>,
    pub metrics: Vec<MetricDef>,
    pub dimensions: Vec<DimensionDef>,
    pub target_mapping: TargetMapping,
}

impl OntologyIr {
    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.iter().find(|o| o.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub identifiers: Vec<String>,
    pub properties: Vec<PropertyDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<ObjectMapping>,
}

impl ObjectDef {
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub prop_type: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nullable: bool,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl ObjectMapping {
    pub fn is_empty(&self) -> bool {
        self.table.is_none() && self.schema.is_none() && self.database.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDef {
    pub name: String,
    pub from: String,
    pub to: String,
    pub join_keys: Vec<JoinKey>,
    pub cardinality: Cardinality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One (from-property, to-property) pair. Inner order is semantic and is
/// preserved; the outer list gets sorted by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct JoinKey(pub String, pub String);

impl JoinKey {
    pub fn from_prop(&self) -> &str {
        &self.0
    }
    pub fn to_prop(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDef {
    pub name: String,
    pub expression: String,
    pub grain: Vec<String>,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionDef {
    pub name: String,
    pub source_property: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub dim_type: Option<PropertyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DimensionDef {
    /// Split `Object.property` into its two halves.
    pub fn source_parts(&self) -> Option<(&str, &str)> {
        let (object, property) = self.source_property.split_once('.')?;
        if object.is_empty() || property.is_empty() {
            return None;
        }
        Some((object, property))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    pub table_mappings: BTreeMap<String, String>,
}

// --- ENUMS (the allowed vocabulary of ODL) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    Time,
    Array,
    Object,
}

impl PropertyType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "decimal" => Some(Self::Decimal),
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "timestamp" => Some(Self::Timestamp),
            "time" => Some(Self::Time),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Join-key compatibility: exact match, plus decimal <-> number.
    pub fn join_compatible(a: PropertyType, b: PropertyType) -> bool {
        if a == b {
            return true;
        }
        matches!(
            (a, b),
            (Self::Decimal, Self::Number) | (Self::Number, Self::Decimal)
        )
    }

    /// Safe widening for diff classification:
    /// integer -> decimal -> number, and date -> timestamp.
    pub fn widens_to(self, new: PropertyType) -> bool {
        matches!(
            (self, new),
            (Self::Integer, Self::Decimal)
                | (Self::Integer, Self::Number)
                | (Self::Decimal, Self::Number)
                | (Self::Date, Self::Timestamp)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_to_one" => Some(Self::OneToOne),
            "one_to_many" => Some(Self::OneToMany),
            "many_to_one" => Some(Self::ManyToOne),
            "many_to_many" => Some(Self::ManyToMany),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }

    /// (from side allows many, to side allows many)
    fn sides(&self) -> (bool, bool) {
        match self {
            Self::OneToOne => (false, false),
            Self::OneToMany => (false, true),
            Self::ManyToOne => (true, false),
            Self::ManyToMany => (true, true),
        }
    }

    /// A change is stricter when a side that allowed "many" now allows only
    /// "one" (existing data may violate the new constraint).
    pub fn is_stricter_than(&self, old: Cardinality) -> bool {
        let (old_from, old_to) = old.sides();
        let (new_from, new_to) = self.sides();
        (old_from && !new_from) || (old_to && !new_to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Sum,
    Count,
    Average,
    Min,
    Max,
    DistinctCount,
    Custom,
}

impl MetricType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "average" => Some(Self::Average),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "distinct_count" => Some(Self::DistinctCount),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
            Self::DistinctCount => "distinct_count",
            Self::Custom => "custom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_type_round_trip() {
        for name in [
            "string",
            "number",
            "integer",
            "decimal",
            "boolean",
            "date",
            "timestamp",
            "time",
            "array",
            "object",
        ] {
            let parsed = PropertyType::parse(name).expect("known type");
            assert_eq!(parsed.as_str(), name);
        }
        assert!(PropertyType::parse("varchar").is_none());
    }

    #[test]
    fn test_join_compatibility() {
        use PropertyType::*;
        assert!(PropertyType::join_compatible(String, String));
        assert!(PropertyType::join_compatible(Decimal, Number));
        assert!(PropertyType::join_compatible(Number, Decimal));
        assert!(!PropertyType::join_compatible(String, Integer));
        assert!(!PropertyType::join_compatible(Integer, Number));
    }

    #[test]
    fn test_widening_rules() {
        use PropertyType::*;
        assert!(Integer.widens_to(Decimal));
        assert!(Integer.widens_to(Number));
        assert!(Decimal.widens_to(Number));
        assert!(Date.widens_to(Timestamp));
        // Narrowing is never safe
        assert!(!Number.widens_to(Decimal));
        assert!(!Timestamp.widens_to(Date));
        assert!(!String.widens_to(Number));
    }

    #[test]
    fn test_cardinality_strictness() {
        use Cardinality::*;
        assert!(OneToOne.is_stricter_than(ManyToMany));
        assert!(ManyToOne.is_stricter_than(ManyToMany));
        assert!(ManyToOne.is_stricter_than(OneToMany)); // tightens the "to" side
        assert!(!ManyToMany.is_stricter_than(OneToOne)); // pure loosening
        assert!(!OneToMany.is_stricter_than(OneToOne));
        assert!(!ManyToOne.is_stricter_than(ManyToOne));
    }

    #[test]
    fn test_dimension_source_parts() {
        let dim = DimensionDef {
            name: "customer_email".into(),
            source_property: "Customer.email".into(),
            dim_type: None,
            description: None,
        };
        assert_eq!(dim.source_parts(), Some(("Customer", "email")));

        let broken = DimensionDef {
            name: "broken".into(),
            source_property: "no_dot_here".into(),
            dim_type: None,
            description: None,
        };
        assert_eq!(broken.source_parts(), None);
    }
}
