// ontolift-core/src/domain/normalize.rs

// Canonicalization of the IR. Every stored version goes through here first,
// so diffs and content hashes are reproducible across runs and processes.
//
// Canonical form:
//   - objects / properties / relationships / metrics / dimensions sorted by
//     name (lexicographic, case-sensitive)
//   - metric grains sorted (set semantics); identifiers keep their order
//     (semantic)
//   - joinKeys: outer list sorted by (from, to); inner pair order preserved
//   - surrounding whitespace trimmed from strings
//   - serialization: stable key order, two-space indent, LF, trailing newline

use sha2::{Digest, Sha256};

use crate::domain::odl::ir::OntologyIr;

pub struct Normalizer;

impl Normalizer {
    /// Produce the canonical form of an IR. Idempotent:
    /// `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(ir: &OntologyIr) -> OntologyIr {
        let mut out = ir.clone();

        out.version = out.version.trim().to_string();
        out.name = out.name.map(|s| s.trim().to_string());
        out.description = out.description.map(|s| s.trim().to_string());

        for obj in &mut out.objects {
            obj.name = obj.name.trim().to_string();
            obj.description = obj.description.take().map(|s| s.trim().to_string());
            for ident in &mut obj.identifiers {
                *ident = ident.trim().to_string();
            }
            for prop in &mut obj.properties {
                prop.name = prop.name.trim().to_string();
                prop.description = prop.description.take().map(|s| s.trim().to_string());
            }
            obj.properties.sort_by(|a, b| a.name.cmp(&b.name));
        }
        out.objects.sort_by(|a, b| a.name.cmp(&b.name));

        for rel in &mut out.relationships {
            rel.name = rel.name.trim().to_string();
            rel.from = rel.from.trim().to_string();
            rel.to = rel.to.trim().to_string();
            rel.description = rel.description.take().map(|s| s.trim().to_string());
            for key in &mut rel.join_keys {
                key.0 = key.0.trim().to_string();
                key.1 = key.1.trim().to_string();
            }
            rel.join_keys.sort();
        }
        out.relationships.sort_by(|a, b| a.name.cmp(&b.name));

        for metric in &mut out.metrics {
            metric.name = metric.name.trim().to_string();
            metric.expression = metric.expression.trim().to_string();
            metric.format = metric.format.take().map(|s| s.trim().to_string());
            metric.description = metric.description.take().map(|s| s.trim().to_string());
            for grain in &mut metric.grain {
                *grain = grain.trim().to_string();
            }
            metric.grain.sort();
        }
        out.metrics.sort_by(|a, b| a.name.cmp(&b.name));

        for dim in &mut out.dimensions {
            dim.name = dim.name.trim().to_string();
            dim.source_property = dim.source_property.trim().to_string();
            dim.description = dim.description.take().map(|s| s.trim().to_string());
        }
        out.dimensions.sort_by(|a, b| a.name.cmp(&b.name));

        let tm = &mut out.target_mapping;
        tm.database = tm.database.take().map(|s| s.trim().to_string());
        tm.schema = tm.schema.take().map(|s| s.trim().to_string());
        tm.warehouse = tm.warehouse.take().map(|s| s.trim().to_string());
        // BTreeMap keys are already sorted; trim values in place.
        tm.table_mappings = tm
            .table_mappings
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        out
    }

    /// Canonical ODL serialization of a (normalized) IR.
    pub fn canonical_json(ir: &OntologyIr) -> Result<String, serde_json::Error> {
        let mut payload = serde_json::to_string_pretty(ir)?;
        payload.push('\n');
        Ok(payload)
    }

    /// The content hash of a canonical payload (SHA-256, lowercase hex).
    pub fn content_hash(canonical_payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical_payload.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
