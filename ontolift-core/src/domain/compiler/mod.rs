// ontolift-core/src/domain/compiler/mod.rs

// The compiler is pure: identical IR + meta + environment list always emit
// bundles with identical content hashes. Anything time- or warehouse-
// dependent (metadata timestamps, rollback captures) stays out of the hash.

pub mod bundle;
pub mod logical;
pub mod model;
pub mod scripts;

pub use bundle::{ArtifactBundle, BundleFile, BundleMetadata};
pub use logical::{snake_case, LogicalMapper};
pub use scripts::ScriptBuilder;

use crate::domain::error::DomainError;
use crate::domain::odl::ir::OntologyIr;

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentTarget {
    /// None for the default (single-environment) bundle; Some for
    /// promotion-bundle environments (scripts land in `<name>/`).
    pub name: Option<String>,
    pub database: String,
    pub schema: String,
    pub view_name: String,
}

impl EnvironmentTarget {
    pub fn view_fqn(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.view_name)
    }
}

#[derive(Debug, Clone)]
pub struct CompileMeta {
    pub ontology: String,
    pub version_number: u32,
    pub content_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Extra environments for a promotion bundle. The default target from
    /// the ontology's targetMapping is always compiled at the bundle root.
    pub environments: Vec<EnvironmentTarget>,
}

pub struct Compiler;

impl Compiler {
    /// Derive the default deployment target from the IR's targetMapping.
    pub fn default_target(ir: &OntologyIr, meta: &CompileMeta) -> Result<EnvironmentTarget, DomainError> {
        let database = ir.target_mapping.database.clone().ok_or_else(|| {
            DomainError::CompileFailed("targetMapping.database is not set".into())
        })?;
        let schema = ir.target_mapping.schema.clone().ok_or_else(|| {
            DomainError::CompileFailed("targetMapping.schema is not set".into())
        })?;
        Ok(EnvironmentTarget {
            name: None,
            database,
            schema,
            view_name: format!("{}_view", Self::model_name(ir, meta)),
        })
    }

    pub fn compile(
        ir: &OntologyIr,
        meta: &CompileMeta,
        options: &CompileOptions,
    ) -> Result<ArtifactBundle, DomainError> {
        let model = LogicalMapper::build(ir, &Self::model_name(ir, meta))?;
        let yaml = Self::emit_yaml(&model, meta)?;

        let mut files = vec![BundleFile {
            path: "semantic_model.yaml".into(),
            content: yaml.clone(),
        }];

        let default_env = Self::default_target(ir, meta)?;
        let root_scripts = ScriptBuilder::build(&yaml, &default_env);
        files.push(BundleFile {
            path: "verify.sql".into(),
            content: root_scripts.verify,
        });
        files.push(BundleFile {
            path: "deploy.sql".into(),
            content: root_scripts.deploy,
        });
        files.push(BundleFile {
            path: "rollback.sql".into(),
            content: root_scripts.rollback,
        });

        for env in &options.environments {
            let Some(env_name) = env.name.as_deref() else {
                return Err(DomainError::CompileFailed(
                    "promotion environments must be named".into(),
                ));
            };
            let scripts = ScriptBuilder::build(&yaml, env);
            files.push(BundleFile {
                path: format!("{}/verify.sql", env_name),
                content: scripts.verify,
            });
            files.push(BundleFile {
                path: format!("{}/deploy.sql", env_name),
                content: scripts.deploy,
            });
            files.push(BundleFile {
                path: format!("{}/rollback.sql", env_name),
                content: scripts.rollback,
            });
        }

        let mut bundle = ArtifactBundle::new(files);

        let metadata = BundleMetadata {
            source_ontology: meta.ontology.clone(),
            version_number: meta.version_number,
            content_hash: bundle.content_hash.clone(),
            created_at: meta.created_at.clone(),
        };
        let metadata_json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| DomainError::CompileFailed(format!("metadata serialization: {}", e)))?;
        bundle.upsert("metadata.json", format!("{}\n", metadata_json));

        Ok(bundle)
    }

    fn model_name(ir: &OntologyIr, meta: &CompileMeta) -> String {
        snake_case(ir.name.as_deref().unwrap_or(meta.ontology.as_str()))
    }

    /// Byte-stable YAML with a provenance header.
    fn emit_yaml(
        model: &crate::domain::compiler::model::SemanticModel,
        meta: &CompileMeta,
    ) -> Result<String, DomainError> {
        let body = serde_yaml::to_string(model)
            .map_err(|e| DomainError::CompileFailed(format!("YAML emission: {}", e)))?;
        Ok(format!(
            "# Semantic view definition\n# ontology: {}\n# version: {}\n# content_hash: {}\n{}",
            meta.ontology, meta.version_number, meta.content_hash, body
        ))
    }
}
