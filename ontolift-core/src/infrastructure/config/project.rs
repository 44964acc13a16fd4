// ontolift-core/src/infrastructure/config/project.rs

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::infrastructure::error::InfrastructureError;

/// The immutable engine configuration, constructed once at startup and
/// threaded into components as a dependency.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Workspace identifier (tenant boundary)
    pub name: String,

    #[serde(default = "default_store_path")]
    pub store_path: String,

    #[serde(default = "default_target_path")]
    pub target_path: String,

    /// Default threshold profile: strict | standard | lenient
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Reject payloads whose normalized content already exists as a version
    #[serde(default = "default_true")]
    pub reject_duplicate_content: bool,

    #[serde(default)]
    pub limits: Limits,

    /// Promotion environments (optional)
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    #[serde(default = "default_verify_timeout")]
    pub verify_timeout_secs: u64,
    #[serde(default = "default_deploy_timeout")]
    pub deploy_timeout_secs: u64,
    #[serde(default = "default_question_timeout")]
    pub question_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_tasks: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            verify_timeout_secs: default_verify_timeout(),
            deploy_timeout_secs: default_deploy_timeout(),
            question_timeout_secs: default_question_timeout(),
            max_concurrent_tasks: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub database: String,
    pub schema: String,
    pub view_name: String,
}

fn default_store_path() -> String {
    ".ontolift".to_string()
}
fn default_target_path() -> String {
    "target".to_string()
}
fn default_profile() -> String {
    "standard".to_string()
}
fn default_true() -> bool {
    true
}
fn default_verify_timeout() -> u64 {
    30
}
fn default_deploy_timeout() -> u64 {
    120
}
fn default_question_timeout() -> u64 {
    60
}
fn default_concurrency() -> usize {
    4
}

// --- LOADER ---

#[instrument(skip(project_dir))] // Log automatique de l'entrée/sortie de la fonction
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project configuration");

    // 2. Chargement YAML Base
    let content = fs::read_to_string(&config_path).map_err(InfrastructureError::Io)?;
    let mut config: ProjectConfig =
        serde_yaml::from_str(&content).map_err(InfrastructureError::Yaml)?;

    // 3. Override via Variables d'Environnement (Pattern 'Layering')
    // Permet de faire: ONTOLIFT_PROFILE=strict ontolift evaluate ...
    apply_env_overrides(&mut config);

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    let candidates = ["ontolift.yaml", "ontolift_project.yaml"];
    for filename in candidates {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, candidates
    )))
}

fn apply_env_overrides(config: &mut ProjectConfig) {
    if let Ok(val) = std::env::var("ONTOLIFT_PROFILE") {
        info!(old = ?config.profile, new = ?val, "Overriding profile via ENV");
        config.profile = val;
    }
    if let Ok(val) = std::env::var("ONTOLIFT_STORE_PATH") {
        info!(old = ?config.store_path, new = ?val, "Overriding store path via ENV");
        config.store_path = val;
    }
}
