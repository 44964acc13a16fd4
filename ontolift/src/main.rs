// ontolift/src/main.rs

use clap::{Parser, Subcommand};
use comfy_table::Table;
use std::path::PathBuf;
use std::sync::Arc;

// Infrastructure (Config & Adapters)
use ontolift_core::infrastructure::adapters::ScriptedWarehouse;
use ontolift_core::infrastructure::config::{load_project_config, ProjectConfig};
use ontolift_core::infrastructure::store::{FileStore, StoreOptions};

// Domain (Enums for the CLI)
use ontolift_core::domain::compiler::{CompileMeta, CompileOptions, Compiler, EnvironmentTarget};
use ontolift_core::domain::gates::ThresholdProfile;
use ontolift_core::domain::normalize::Normalizer;
use ontolift_core::domain::odl::{OdlDocument, OdlValidator};

// Application (Use Cases)
use ontolift_core::application::{
    compile_version, create_version, deploy_version, diff_versions, evaluate_version,
    load_version_ir, run_drift_scan, run_regression, AsyncRunner, CancelFlag, QuestionSet,
    TaskState,
};
use ontolift_core::ports::store::VersionStore;

#[derive(Parser)]
#[command(name = "ontolift")]
#[command(about = "The Semantic-Model Lifecycle Engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Project directory
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🔎 Validates an ODL document without writing anything
    Validate {
        /// ODL JSON file
        #[arg(long)]
        file: PathBuf,
    },

    /// 📝 Submits an ODL document as the next version of an ontology
    Submit {
        #[arg(long)]
        file: PathBuf,

        /// Ontology name within the workspace
        #[arg(long)]
        ontology: String,

        #[arg(long, default_value = "cli")]
        author: String,

        #[arg(long)]
        notes: Option<String>,
    },

    /// 📜 Lists stored versions (latest first)
    Versions {
        #[arg(long)]
        ontology: String,
    },

    /// 🔀 Classifies the changes between two versions
    Diff {
        #[arg(long)]
        ontology: String,
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: u32,
    },

    /// 🚦 Evaluates a version against the gate bundles
    Evaluate {
        #[arg(long)]
        ontology: String,
        /// Version number (defaults to latest)
        #[arg(long)]
        version: Option<u32>,
        /// strict | standard | lenient (defaults to the project profile)
        #[arg(long)]
        profile: Option<String>,
    },

    /// 📦 Compiles a version into an artifact bundle
    Compile {
        #[arg(long)]
        ontology: String,
        #[arg(long)]
        version: Option<u32>,
        #[arg(long)]
        profile: Option<String>,
        /// Also emit per-environment promotion scripts from the project config
        #[arg(long, default_value = "false")]
        promote: bool,
    },

    /// 🚀 Runs the full promotion pipeline (evaluate, compile, deploy, drift)
    /// against the simulated warehouse, through the task runner
    Run {
        #[arg(long)]
        ontology: String,
        #[arg(long)]
        version: Option<u32>,
        #[arg(long)]
        profile: Option<String>,
    },

    /// 🛰️  Deploys a version to the simulated warehouse (verify, then deploy,
    /// with rollback capture)
    Deploy {
        #[arg(long)]
        ontology: String,
        #[arg(long)]
        version: Option<u32>,
        #[arg(long)]
        profile: Option<String>,
    },

    /// 🌊 Scans for drift between the ontology and a warehouse catalog
    Drift {
        #[arg(long)]
        ontology: String,
        /// YAML catalog fixture: table -> column -> type
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// 🧪 Runs a question set against the deployed view
    Regress {
        #[arg(long)]
        ontology: String,
        /// Question-set YAML file
        #[arg(long)]
        questions: PathBuf,
    },

    /// 🧹 Cleans build artifacts (target/ folder)
    Clean,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug ontolift run ... pour voir les détails
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let project_dir = cli.project_dir.clone();

    match cli.command {
        // --- USE CASE: VALIDATE (no store involved) ---
        Commands::Validate { file } => {
            let payload = std::fs::read_to_string(&file)?;
            match OdlDocument::from_json(&payload).and_then(|doc| OdlValidator::validate(&doc)) {
                Ok(ir) => {
                    let canonical = Normalizer::canonical_json(&Normalizer::normalize(&ir))?;
                    println!("✅ Valid ODL document");
                    println!(
                        "   objects: {}, relationships: {}, metrics: {}, dimensions: {}",
                        ir.objects.len(),
                        ir.relationships.len(),
                        ir.metrics.len(),
                        ir.dimensions.len()
                    );
                    println!("   content_hash: {}", Normalizer::content_hash(&canonical));
                }
                Err(e) => {
                    eprintln!("❌ {}", e);
                    std::process::exit(1);
                }
            }
        }

        // --- USE CASE: SUBMIT VERSION ---
        Commands::Submit {
            file,
            ontology,
            author,
            notes,
        } => {
            let (config, store) = open_store(&project_dir)?;
            let payload = std::fs::read_to_string(&file)?;

            match create_version(&store, &config.name, &ontology, &payload, &author, notes) {
                Ok((version, _)) => {
                    println!(
                        "✅ Stored '{}' version {} (hash {})",
                        ontology, version.version_number, version.content_hash
                    );
                }
                Err(e) => {
                    eprintln!("❌ Submit failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        // --- USE CASE: LIST VERSIONS ---
        Commands::Versions { ontology } => {
            let (config, store) = open_store(&project_dir)?;
            let versions = store.list_versions(&config.name, &ontology)?;
            if versions.is_empty() {
                println!("No versions stored for '{}'", ontology);
                return Ok(());
            }

            let mut table = Table::new();
            table.set_header(vec!["Version", "Hash", "Author", "Created", "Notes"]);
            for v in versions {
                table.add_row(vec![
                    v.version_number.to_string(),
                    v.content_hash.chars().take(12).collect(),
                    v.author,
                    v.created_at,
                    v.notes.unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }

        // --- USE CASE: DIFF ---
        Commands::Diff {
            ontology,
            from,
            to,
        } => {
            let (config, store) = open_store(&project_dir)?;
            let report = diff_versions(&store, &config.name, &ontology, from, to)?;

            if report.is_empty() {
                println!("✅ No structural changes between v{} and v{}", from, to);
                return Ok(());
            }

            let mut table = Table::new();
            table.set_header(vec!["Path", "Kind", "Severity", "Detail"]);
            for change in &report.changes {
                table.add_row(vec![
                    change.path.clone(),
                    change.kind.to_string(),
                    format!("{:?}", change.severity),
                    change.detail.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
            println!(
                "Breaking: {}, Non-breaking: {}{}",
                report.summary.breaking,
                report.summary.non_breaking,
                if report.summary.has_breaking {
                    "  ⚠️  BREAKING CHANGES"
                } else {
                    ""
                }
            );
        }

        // --- USE CASE: EVALUATE ---
        Commands::Evaluate {
            ontology,
            version,
            profile,
        } => {
            let (config, store) = open_store(&project_dir)?;
            let profile = resolve_profile(&config, profile)?;
            let number = resolve_version(&store, &config.name, &ontology, version)?;

            let run = evaluate_version(&store, &config.name, &ontology, number, profile)?;
            for (category, gates) in &run.outcome.metrics {
                println!("  [{}]", category);
                for (gate, metric) in gates {
                    println!(
                        "    {:?} {} {}",
                        metric.status,
                        gate,
                        metric.message.as_deref().unwrap_or("")
                    );
                }
            }
            if run.passed {
                println!("✅ PASS with profile '{}' (run {})", profile, run.id);
            } else {
                eprintln!(
                    "❌ FAIL with profile '{}': first failure at gate '{}'",
                    profile,
                    run.outcome.first_failure.as_deref().unwrap_or("unknown")
                );
                std::process::exit(1);
            }
        }

        // --- USE CASE: COMPILE ---
        Commands::Compile {
            ontology,
            version,
            profile,
            promote,
        } => {
            let (config, store) = open_store(&project_dir)?;
            let profile = resolve_profile(&config, profile)?;
            let number = resolve_version(&store, &config.name, &ontology, version)?;
            let environments = if promote {
                promotion_environments(&config)
            } else {
                vec![]
            };

            match compile_version(
                &store,
                &config.name,
                &ontology,
                number,
                profile,
                environments,
                &project_dir.join(&config.target_path),
            ) {
                Ok(output) => {
                    println!("✅ Bundle {} ({})", output.bundle.content_hash, output.run.id);
                    println!("   written to {}", output.bundle_dir.display());
                }
                Err(e) => {
                    eprintln!("❌ Compile failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        // --- USE CASE: FULL PIPELINE (via task runner) ---
        Commands::Run {
            ontology,
            version,
            profile,
        } => {
            let start = std::time::Instant::now();
            let (config, store) = open_store(&project_dir)?;
            let profile = resolve_profile(&config, profile)?;
            let number = resolve_version(&store, &config.name, &ontology, version)?;

            println!("🚀 Starting Pipeline ({} v{})...", ontology, number);
            let store = Arc::new(store);
            let warehouse = Arc::new(ScriptedWarehouse::new());
            let runner = AsyncRunner::new(config.limits.max_concurrent_tasks);

            let task_id = {
                let store = Arc::clone(&store);
                let warehouse = Arc::clone(&warehouse);
                let config = config.clone();
                let workspace = config.name.clone();
                let workspace_key = workspace.clone();
                let ontology = ontology.clone();
                let target_dir = project_dir.join(&config.target_path);

                runner.submit(
                    &workspace_key,
                    "promotion",
                    Box::new(move |cancel| {
                        Box::pin(async move {
                            // Sequential stages with checkpoints in between
                            let eval =
                                evaluate_version(&*store, &workspace, &ontology, number, profile)?;
                            if !eval.passed {
                                return Err(ontolift_core::domain::DomainError::GateFailed {
                                    gate_id: eval
                                        .outcome
                                        .first_failure
                                        .unwrap_or_else(|| "unknown".into()),
                                    message: format!("profile '{}' rejected", profile),
                                }
                                .into());
                            }
                            cancel.checkpoint()?;

                            let deploy = deploy_version(
                                &*store,
                                &*warehouse,
                                &workspace,
                                &ontology,
                                number,
                                profile,
                                &target_dir,
                                &config.limits,
                                &cancel,
                            )
                            .await?;
                            cancel.checkpoint()?;

                            let drift = run_drift_scan(
                                &*store,
                                &*warehouse,
                                &workspace,
                                &ontology,
                                &cancel,
                            )
                            .await?;

                            Ok(serde_json::json!({
                                "eval": eval.id,
                                "deploy": deploy.run.id,
                                "bundle": deploy.run.bundle_hash,
                                "drift_findings": drift.findings.len(),
                            }))
                        })
                    }),
                )
            };

            // Poll the task to completion
            loop {
                let Some(status) = runner.status(&task_id) else {
                    anyhow::bail!("task vanished");
                };
                if status.state.is_terminal() {
                    match status.state {
                        TaskState::Success => {
                            println!(
                                "✨ SUCCESS! Pipeline finished in {:.2?}",
                                start.elapsed()
                            );
                            println!(
                                "   {}",
                                serde_json::to_string(&status.result).unwrap_or_default()
                            );
                        }
                        _ => {
                            let error = status
                                .error
                                .map(|e| format!("{} ({})", e.message, e.code))
                                .unwrap_or_else(|| "canceled".into());
                            eprintln!("💥 CRITICAL PIPELINE ERROR: {}", error);
                            std::process::exit(1);
                        }
                    }
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        }

        // --- USE CASE: DEPLOY (simulated warehouse) ---
        Commands::Deploy {
            ontology,
            version,
            profile,
        } => {
            let (config, store) = open_store(&project_dir)?;
            let profile = resolve_profile(&config, profile)?;
            let number = resolve_version(&store, &config.name, &ontology, version)?;
            let warehouse = ScriptedWarehouse::new();

            // Replay the previously deployed definition so rollback capture
            // behaves like a live warehouse would.
            hydrate_live_view(&store, &config, &ontology, &warehouse)?;

            match deploy_version(
                &store,
                &warehouse,
                &config.name,
                &ontology,
                number,
                profile,
                &project_dir.join(&config.target_path),
                &config.limits,
                &CancelFlag::new(),
            )
            .await
            {
                Ok(output) => {
                    println!("✅ Deployed {} (run {})", output.deployed.view_fqn, output.run.id);
                    if output.rollback_captured {
                        println!("   rollback captured from the previous deployment");
                    } else {
                        println!("   ⚠️  no previous view: rollback.sql is drop-only");
                    }
                    println!("   bundle: {}", output.bundle_dir.display());
                }
                Err(e) => {
                    eprintln!("❌ Deploy failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        // --- USE CASE: DRIFT SCAN ---
        Commands::Drift { ontology, catalog } => {
            let (config, store) = open_store(&project_dir)?;
            let warehouse = ScriptedWarehouse::new();

            if let Some(catalog_path) = catalog {
                let content = std::fs::read_to_string(&catalog_path)?;
                let snapshot: ontolift_core::domain::drift::CatalogSnapshot =
                    serde_yaml::from_str(&content)?;
                warehouse.set_catalog(snapshot);
            }
            hydrate_live_view(&store, &config, &ontology, &warehouse)?;

            let report =
                run_drift_scan(&store, &warehouse, &config.name, &ontology, &CancelFlag::new())
                    .await?;
            if report.findings.is_empty() {
                println!("✅ No drift detected (v{})", report.version_number);
            } else {
                for finding in &report.findings {
                    println!("  ⚠️  {} {}", finding.event_type, finding.details);
                }
                println!(
                    "🌊 {} finding(s): {} new event(s), {} coalesced",
                    report.findings.len(),
                    report.new_events,
                    report.coalesced
                );
            }
        }

        // --- USE CASE: REGRESSION ---
        Commands::Regress {
            ontology,
            questions,
        } => {
            let (config, store) = open_store(&project_dir)?;
            let warehouse = ScriptedWarehouse::new();
            let set = QuestionSet::from_yaml(&std::fs::read_to_string(&questions)?)?;

            let run = run_regression(
                &store,
                &warehouse,
                &config.name,
                &ontology,
                &set,
                &config.limits,
                &CancelFlag::new(),
                &project_dir.join(&config.target_path).join("reports"),
            )
            .await?;

            println!(
                "🧪 {} question(s): {} passed, {} failed ({} ms total)",
                run.question_count, run.passed_count, run.failed_count, run.total_latency_ms
            );
            if let Some(junit) = &run.junit_path {
                println!("   report: {}", junit);
            }
            if !run.overall_pass {
                eprintln!("❌ REGRESSION FAILED");
                std::process::exit(1);
            }
            println!("✅ Overall pass");
        }

        // --- USE CASE: CLEAN ---
        Commands::Clean => {
            let config = load_project_config(&project_dir)?;
            let target = project_dir.join(&config.target_path);
            if target.exists() {
                std::fs::remove_dir_all(&target)?;
                println!("🗑️  Artifacts removed: {}", target.display());
            } else {
                println!("Nothing to clean");
            }
        }
    }

    Ok(())
}

// --- HELPERS ---

fn open_store(project_dir: &std::path::Path) -> anyhow::Result<(ProjectConfig, FileStore)> {
    let config = load_project_config(project_dir)?;
    let store_dir = project_dir.join(&config.store_path);
    tracing::debug!(workspace = %config.name, store = ?store_dir, "Opening version store");
    let store = FileStore::open(
        &store_dir,
        StoreOptions {
            reject_duplicate_content: config.reject_duplicate_content,
        },
    )?;
    store.ensure_workspace(&config.name, &config.name)?;
    Ok((config, store))
}

fn resolve_profile(
    config: &ProjectConfig,
    requested: Option<String>,
) -> anyhow::Result<ThresholdProfile> {
    let raw = requested.unwrap_or_else(|| config.profile.clone());
    ThresholdProfile::parse(&raw)
        .ok_or_else(|| anyhow::anyhow!("unknown profile '{}' (strict|standard|lenient)", raw))
}

fn resolve_version(
    store: &FileStore,
    workspace: &str,
    ontology: &str,
    requested: Option<u32>,
) -> anyhow::Result<u32> {
    if let Some(number) = requested {
        return Ok(number);
    }
    store
        .latest_version(workspace, ontology)?
        .map(|v| v.version_number)
        .ok_or_else(|| anyhow::anyhow!("no versions stored for '{}'", ontology))
}

fn promotion_environments(config: &ProjectConfig) -> Vec<EnvironmentTarget> {
    config
        .environments
        .iter()
        .map(|e| EnvironmentTarget {
            name: Some(e.name.clone()),
            database: e.database.clone(),
            schema: e.schema.clone(),
            view_name: e.view_name.clone(),
        })
        .collect()
}

/// Recompile the deployed version's YAML into the simulated warehouse so
/// exports and the view-drift probe see what a live warehouse would hold.
fn hydrate_live_view(
    store: &FileStore,
    config: &ProjectConfig,
    ontology: &str,
    warehouse: &ScriptedWarehouse,
) -> anyhow::Result<()> {
    let Some(view) = store.deployed_view(&config.name, ontology)? else {
        return Ok(());
    };
    let (version, ir) = load_version_ir(store, &config.name, ontology, view.version_number)?;
    let meta = CompileMeta {
        ontology: ontology.to_string(),
        version_number: version.version_number,
        content_hash: version.content_hash.clone(),
        created_at: version.created_at.clone(),
    };
    let bundle = Compiler::compile(&ir, &meta, &CompileOptions::default())?;
    if let Some(yaml) = bundle.file("semantic_model.yaml") {
        warehouse.put_view(&view.view_fqn, yaml);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_submit() {
        let args = Cli::parse_from([
            "ontolift",
            "submit",
            "--file",
            "odl/retail.json",
            "--ontology",
            "retail",
        ]);
        match args.command {
            Commands::Submit {
                file,
                ontology,
                author,
                ..
            } => {
                assert_eq!(file.to_string_lossy(), "odl/retail.json");
                assert_eq!(ontology, "retail");
                assert_eq!(author, "cli");
            }
            _ => panic!("Expected Submit command"),
        }
    }

    #[test]
    fn test_cli_parse_diff() {
        let args = Cli::parse_from([
            "ontolift", "diff", "--ontology", "retail", "--from", "1", "--to", "2",
        ]);
        match args.command {
            Commands::Diff { from, to, .. } => {
                assert_eq!(from, 1);
                assert_eq!(to, 2);
            }
            _ => panic!("Expected Diff command"),
        }
    }

    #[test]
    fn test_cli_parse_defaults() {
        let args = Cli::parse_from(["ontolift", "evaluate", "--ontology", "retail"]);
        assert_eq!(args.project_dir.to_string_lossy(), ".");
        match args.command {
            Commands::Evaluate {
                version, profile, ..
            } => {
                assert_eq!(version, None);
                assert_eq!(profile, None);
            }
            _ => panic!("Expected Evaluate command"),
        }
    }
}
