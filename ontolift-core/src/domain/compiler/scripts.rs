// ontolift-core/src/domain/compiler/scripts.rs

// Generation of the warehouse-side SQL scripts. The YAML definition is
// inlined as a dollar-quoted string literal so the scripts are
// self-contained and runnable as-is.

use crate::domain::compiler::EnvironmentTarget;

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSet {
    pub verify: String,
    pub deploy: String,
    pub rollback: String,
}

pub struct ScriptBuilder;

impl ScriptBuilder {
    pub fn build(yaml: &str, env: &EnvironmentTarget) -> ScriptSet {
        ScriptSet {
            verify: Self::verify_script(yaml, env),
            deploy: Self::deploy_script(yaml, env),
            rollback: Self::rollback_script(env, None),
        }
    }

    /// Verify-only: targets `database.schema`, never creates the view.
    pub fn verify_script(yaml: &str, env: &EnvironmentTarget) -> String {
        format!(
            "-- verify.sql\n\
             -- Verify-only validation of the semantic view definition. No object is created.\n\
             CALL SYSTEM$CREATE_SEMANTIC_VIEW_FROM_YAML('{}.{}', $$\n{}$$, verify_only => TRUE);\n",
            env.database, env.schema, yaml
        )
    }

    pub fn deploy_script(yaml: &str, env: &EnvironmentTarget) -> String {
        format!(
            "-- deploy.sql\n\
             -- Create or replace the semantic view from the compiled definition.\n\
             CALL SYSTEM$CREATE_SEMANTIC_VIEW_FROM_YAML('{}', $$\n{}$$);\n",
            env.view_fqn(),
            yaml
        )
    }

    /// Drop, then re-create from the captured pre-deploy YAML when one exists.
    pub fn rollback_script(env: &EnvironmentTarget, captured_yaml: Option<&str>) -> String {
        let mut script = format!(
            "-- rollback.sql\nDROP SEMANTIC VIEW IF EXISTS {};\n",
            env.view_fqn()
        );
        if let Some(yaml) = captured_yaml {
            script.push_str(&format!(
                "CALL SYSTEM$CREATE_SEMANTIC_VIEW_FROM_YAML('{}', $$\n{}$$);\n",
                env.view_fqn(),
                yaml
            ));
        }
        script
    }
}
