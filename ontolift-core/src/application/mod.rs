// ontolift-core/src/application/mod.rs

pub mod compile;
pub mod deploy;
pub mod drift;
pub mod evaluate;
pub mod regression;
pub mod runner;
pub mod versioning;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Cela permet au CLI de faire :
// `use ontolift_core::application::{create_version, compile_version, ...};`
// sans avoir à connaître la structure interne des fichiers.

pub use compile::{compile_version, CompileOutput};
pub use deploy::{deploy_version, DeployOutput};
pub use drift::{run_drift_scan, DriftScanReport};
pub use evaluate::evaluate_version;
pub use regression::{run_regression, QuestionSet};
pub use runner::{AsyncRunner, CancelFlag, TaskState, TaskStatus};
pub use versioning::{create_version, diff_versions, load_version_ir};
